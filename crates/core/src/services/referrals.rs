//! Referral ("direction") lifecycle.
//!
//! Registrars file referrals, read all of them and overwrite their status. Patients can only
//! read the referrals filed for them.

use crate::identity::Identity;
use crate::services::access::AccessService;
use crate::store::{
    Analysis, Doctor, NewDoctor, NewPatient, NewReferralRecord, Patient, RecordStore, Referral,
    ReferralStatus,
};
use crate::{CoreError, CoreResult};
use chrono::NaiveDate;
use medhelp_types::{NonEmptyText, ReferralId};
use std::sync::Arc;

/// Patient named on a new referral. Matched to an existing patient by policy number.
#[derive(Debug, Clone)]
pub struct PatientDetails {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub policy_number: String,
    pub tel: String,
}

/// Referring doctor. Matched to an existing doctor by `(name, specialty)`.
#[derive(Debug, Clone)]
pub struct DoctorDetails {
    pub name: String,
    pub specialty: String,
}

#[derive(Debug, Clone)]
pub struct NewReferral {
    pub patient: PatientDetails,
    pub doctor: DoctorDetails,
    pub date: NaiveDate,
    pub icd_code: String,
    pub medical_organization: String,
    pub organization_contact: String,
    pub justification: String,
    pub analyses: Vec<String>,
}

/// A referral joined with the patient and doctor it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralDetails {
    pub referral: Referral,
    pub patient: Patient,
    pub doctor: Doctor,
}

#[derive(Clone)]
pub struct ReferralService {
    store: Arc<dyn RecordStore>,
    access: AccessService,
}

impl ReferralService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let access = AccessService::new(store.clone());
        Self { store, access }
    }

    /// List the referrals visible to `identity`, ordered by date ascending.
    ///
    /// A registrar sees every referral; a patient sees only their own.
    pub fn list_referrals(&self, identity: &Identity) -> CoreResult<Vec<ReferralDetails>> {
        let referrals = match identity {
            Identity::Registrar => self.store.list_referrals()?,
            Identity::Patient { patient_id } => {
                self.store.list_referrals_for_patient(*patient_id)?
            }
        };

        referrals
            .into_iter()
            .map(|referral| self.details(referral))
            .collect()
    }

    /// Fetch one referral with its patient and doctor.
    ///
    /// # Errors
    ///
    /// - `CoreError::ReferralNotFound` if no referral has this id.
    /// - `CoreError::ReferralForbidden` if a patient asks for someone else's referral.
    pub fn get_referral(
        &self,
        identity: &Identity,
        referral_id: ReferralId,
    ) -> CoreResult<ReferralDetails> {
        let referral = self.accessible_referral(identity, referral_id)?;
        self.details(referral)
    }

    /// List the analyses ordered under a referral.
    ///
    /// # Errors
    ///
    /// Same as [`ReferralService::get_referral`].
    pub fn list_analyses(
        &self,
        identity: &Identity,
        referral_id: ReferralId,
    ) -> CoreResult<Vec<Analysis>> {
        self.accessible_referral(identity, referral_id)?;
        Ok(self.store.list_analyses(referral_id)?)
    }

    /// File a new referral together with the analyses it orders.
    ///
    /// The patient is reused when the policy number is already known and created otherwise;
    /// the doctor is reused by `(name, specialty)`. The referral starts with status
    /// [`ReferralStatus::NEW`]. A referral with no analyses is accepted.
    ///
    /// # Arguments
    ///
    /// * `identity` - Caller; must be a registrar
    /// * `new` - Referral fields plus patient, doctor and analysis names
    ///
    /// # Returns
    ///
    /// The stored referral joined with its patient and doctor, and the created analyses.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if:
    /// - the caller is not a registrar ([`CoreError::RegistrarOnly`])
    /// - a patient, doctor or analysis name is blank ([`CoreError::InvalidInput`])
    /// - the policy number is on file under another last name
    ///   ([`CoreError::PolicyNumberMismatch`])
    /// - the record store fails
    pub fn create_referral(
        &self,
        identity: &Identity,
        new: NewReferral,
    ) -> CoreResult<(ReferralDetails, Vec<Analysis>)> {
        require_registrar(identity)?;

        let patient = NewPatient {
            first_name: required("patient first name", &new.patient.first_name)?,
            last_name: required("patient last name", &new.patient.last_name)?,
            birth_date: new.patient.birth_date,
            policy_number: required("policy number", &new.patient.policy_number)?,
            tel: new.patient.tel.trim().to_owned(),
        };
        let doctor = NewDoctor {
            name: required("doctor name", &new.doctor.name)?,
            specialty: required("doctor specialty", &new.doctor.specialty)?,
        };
        let analyses = new
            .analyses
            .iter()
            .map(|name| required("analysis name", name))
            .collect::<CoreResult<Vec<_>>>()?;

        let patient = self.store.upsert_patient(patient)?;
        let doctor = self.store.upsert_doctor(doctor)?;

        let (referral, analyses) = self.store.insert_referral(NewReferralRecord {
            patient_id: patient.id,
            doctor_id: doctor.id,
            date: new.date,
            icd_code: new.icd_code.trim().to_owned(),
            medical_organization: new.medical_organization.trim().to_owned(),
            organization_contact: new.organization_contact.trim().to_owned(),
            justification: new.justification.trim().to_owned(),
            analyses,
        })?;

        tracing::info!(
            referral_id = %referral.id,
            patient_id = %patient.id,
            analyses = analyses.len(),
            "referral filed"
        );

        Ok((
            ReferralDetails {
                referral,
                patient,
                doctor,
            },
            analyses,
        ))
    }

    /// Overwrite the status of a referral.
    ///
    /// Any code may replace any other; there is no transition table.
    ///
    /// # Errors
    ///
    /// - `CoreError::RegistrarOnly` for patients.
    /// - `CoreError::ReferralNotFound` for an unknown id; nothing is changed.
    pub fn set_status(
        &self,
        identity: &Identity,
        referral_id: ReferralId,
        status: ReferralStatus,
    ) -> CoreResult<Referral> {
        require_registrar(identity)?;

        let referral = self.store.set_referral_status(referral_id, status)?;
        tracing::info!(referral_id = %referral_id, status = %status, "referral status changed");
        Ok(referral)
    }

    fn accessible_referral(
        &self,
        identity: &Identity,
        referral_id: ReferralId,
    ) -> CoreResult<Referral> {
        let referral = self
            .store
            .get_referral(referral_id)?
            .ok_or(CoreError::ReferralNotFound(referral_id))?;

        if !self.access.can_access_referral(identity, referral_id)? {
            tracing::warn!(%identity, referral_id = %referral_id, "referral access denied");
            return Err(CoreError::ReferralForbidden(referral_id));
        }

        Ok(referral)
    }

    fn details(&self, referral: Referral) -> CoreResult<ReferralDetails> {
        let patient = self.store.get_patient(referral.patient_id)?.ok_or_else(|| {
            CoreError::Store(crate::store::StoreError::DanglingReference(format!(
                "referral {} names missing patient {}",
                referral.id, referral.patient_id
            )))
        })?;
        let doctor = self.store.get_doctor(referral.doctor_id)?.ok_or_else(|| {
            CoreError::Store(crate::store::StoreError::DanglingReference(format!(
                "referral {} names missing doctor {}",
                referral.id, referral.doctor_id
            )))
        })?;

        Ok(ReferralDetails {
            referral,
            patient,
            doctor,
        })
    }
}

pub(crate) fn require_registrar(identity: &Identity) -> CoreResult<()> {
    if identity.is_registrar() {
        Ok(())
    } else {
        tracing::warn!(%identity, "registrar-only operation denied");
        Err(CoreError::RegistrarOnly)
    }
}

fn required(field: &str, value: &str) -> CoreResult<NonEmptyText> {
    NonEmptyText::new(value)
        .map_err(|_| CoreError::InvalidInput(format!("{field} cannot be empty")))
}
