//! Request and response bodies exchanged over the REST API.
//!
//! Field names follow the wire format clients already use: camelCase for referral and
//! analysis resources, and the registration form's `lastname` / `policy_number` keys.

use chrono::{DateTime, NaiveDate, Utc};
use medhelp_core::store::{Analysis, Doctor, Patient, StoredFile};
use medhelp_core::{IssuedToken, ReferralDetails};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrarForm {
    pub secret: String,
}

#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct PatientForm {
    pub lastname: String,
    pub policy_number: String,
}

/// Registration form. Exactly one of `registrar` or `patient` must be present.
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct RegistrationReq {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub registrar: Option<RegistrarForm>,
    #[serde(default)]
    pub patient: Option<PatientForm>,
}

#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticationReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRes {
    pub token: String,
    #[schema(value_type = String, format = DateTime)]
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for TokenRes {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            expires_at: issued.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientRes {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String, format = Date)]
    pub birth_date: NaiveDate,
    pub policy_number: String,
    pub tel: String,
}

impl From<Patient> for PatientRes {
    fn from(p: Patient) -> Self {
        Self {
            id: p.id.get(),
            first_name: p.first_name.into_string(),
            last_name: p.last_name.into_string(),
            birth_date: p.birth_date,
            policy_number: p.policy_number.into_string(),
            tel: p.tel,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DoctorRes {
    pub id: i64,
    pub name: String,
    pub specialty: String,
}

impl From<Doctor> for DoctorRes {
    fn from(d: Doctor) -> Self {
        Self {
            id: d.id.get(),
            name: d.name.into_string(),
            specialty: d.specialty.into_string(),
        }
    }
}

/// A referral ("direction") with its patient and doctor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectionRes {
    pub id: i64,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub icd_code: String,
    pub medical_organization: String,
    pub organization_contact: String,
    pub justification: String,
    pub status: i32,
    pub patient: PatientRes,
    pub doctor: DoctorRes,
}

impl From<ReferralDetails> for DirectionRes {
    fn from(details: ReferralDetails) -> Self {
        let r = details.referral;
        Self {
            id: r.id.get(),
            date: r.date,
            icd_code: r.icd_code,
            medical_organization: r.medical_organization,
            organization_contact: r.organization_contact,
            justification: r.justification,
            status: r.status.code(),
            patient: details.patient.into(),
            doctor: details.doctor.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRes {
    pub id: i64,
    pub name: String,
    pub direction_id: i64,
    pub is_checked: bool,
    pub file_id: Option<i64>,
}

impl From<Analysis> for AnalysisRes {
    fn from(a: Analysis) -> Self {
        Self {
            id: a.id.get(),
            name: a.name.into_string(),
            direction_id: a.referral_id.get(),
            is_checked: a.is_checked,
            file_id: a.file_id.map(|f| f.get()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPatientReq {
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = String, format = Date)]
    pub birth_date: NaiveDate,
    pub policy_number: String,
    #[serde(default)]
    pub tel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewDoctorReq {
    pub name: String,
    pub specialty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectionReq {
    pub patient: NewPatientReq,
    pub doctor: NewDoctorReq,
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    #[serde(default)]
    pub icd_code: String,
    #[serde(default)]
    pub medical_organization: String,
    #[serde(default)]
    pub organization_contact: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub analyses: Vec<String>,
}

impl From<CreateDirectionReq> for medhelp_core::NewReferral {
    fn from(req: CreateDirectionReq) -> Self {
        Self {
            patient: medhelp_core::PatientDetails {
                first_name: req.patient.first_name,
                last_name: req.patient.last_name,
                birth_date: req.patient.birth_date,
                policy_number: req.patient.policy_number,
                tel: req.patient.tel,
            },
            doctor: medhelp_core::DoctorDetails {
                name: req.doctor.name,
                specialty: req.doctor.specialty,
            },
            date: req.date,
            icd_code: req.icd_code,
            medical_organization: req.medical_organization,
            organization_contact: req.organization_contact,
            justification: req.justification,
            analyses: req.analyses,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDirectionRes {
    pub direction: DirectionRes,
    pub analyses: Vec<AnalysisRes>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusReq {
    pub direction_id: i64,
    pub status: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetCheckedReq {
    pub analysis_id: i64,
    pub checked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRes {
    pub id: i64,
    pub name: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub sha256: String,
}

impl From<StoredFile> for FileRes {
    fn from(f: StoredFile) -> Self {
        Self {
            id: f.id.get(),
            name: f.name,
            size_bytes: f.size_bytes,
            media_type: f.media_type,
            sha256: f.sha256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadRes {
    pub analysis: AnalysisRes,
    pub file: FileRes,
}
