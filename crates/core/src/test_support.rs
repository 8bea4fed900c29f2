//! Fixtures shared by the unit tests in this crate.

use crate::config::{CoreConfig, SigningKey};
use crate::services::{AccountService, AnalysisService, DoctorDetails, NewReferral, PatientDetails};
use crate::store::{LocalStore, NewDoctor, NewPatient, NewReferralRecord, RecordStore};
use crate::token::TokenCodec;
use chrono::{Duration, NaiveDate};
use medhelp_files::FilesService;
use medhelp_types::{AnalysisId, NonEmptyText, PatientId, ReferralId};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_SIGNING_KEY: &str = "unit-test-signing-key-0123456789abcdef";

pub fn test_config(data_dir: &Path) -> Arc<CoreConfig> {
    Arc::new(
        CoreConfig::new(
            data_dir.to_path_buf(),
            SigningKey::new(TEST_SIGNING_KEY).unwrap(),
            24,
        )
        .unwrap(),
    )
}

pub fn new_referral(last_name: &str, policy: &str, analyses: &[&str]) -> NewReferral {
    NewReferral {
        patient: PatientDetails {
            first_name: "John".into(),
            last_name: last_name.into(),
            birth_date: NaiveDate::from_ymd_opt(1985, 6, 15).unwrap(),
            policy_number: policy.into(),
            tel: "+7 900 000 00 00".into(),
        },
        doctor: DoctorDetails {
            name: "Dr. House".into(),
            specialty: "Diagnostics".into(),
        },
        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        icd_code: "R50.9".into(),
        medical_organization: "City Clinic No. 1".into(),
        organization_contact: "+7 495 000 00 00".into(),
        justification: "persistent fever".into(),
        analyses: analyses.iter().map(|a| a.to_string()).collect(),
    }
}

/// An in-memory record store plus a file store in a temp directory.
pub struct Clinic {
    pub store: Arc<dyn RecordStore>,
    pub files: Arc<FilesService>,
    _temp_dir: TempDir,
}

impl Clinic {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let files = FilesService::new(temp_dir.path()).expect("FilesService::new should succeed");
        Self {
            store: Arc::new(LocalStore::in_memory()),
            files: Arc::new(files),
            _temp_dir: temp_dir,
        }
    }

    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(
            SigningKey::new(TEST_SIGNING_KEY).unwrap(),
            Duration::hours(24),
        )
    }

    pub fn account_service(&self) -> AccountService {
        AccountService::new(self.store.clone(), self.codec())
    }

    pub fn analysis_service(&self) -> AnalysisService {
        AnalysisService::new(self.store.clone(), self.files.clone())
    }

    pub fn patient(&self, last_name: &str, policy: &str) -> PatientId {
        self.store
            .upsert_patient(NewPatient {
                first_name: NonEmptyText::new("John").unwrap(),
                last_name: NonEmptyText::new(last_name).unwrap(),
                birth_date: NaiveDate::from_ymd_opt(1985, 6, 15).unwrap(),
                policy_number: NonEmptyText::new(policy).unwrap(),
                tel: String::new(),
            })
            .expect("upsert_patient should succeed")
            .id
    }

    pub fn referral(
        &self,
        patient_id: PatientId,
        analyses: &[&str],
    ) -> (ReferralId, Vec<AnalysisId>) {
        let doctor = self
            .store
            .upsert_doctor(NewDoctor {
                name: NonEmptyText::new("Dr. House").unwrap(),
                specialty: NonEmptyText::new("Diagnostics").unwrap(),
            })
            .expect("upsert_doctor should succeed");

        let (referral, analyses) = self
            .store
            .insert_referral(NewReferralRecord {
                patient_id,
                doctor_id: doctor.id,
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                icd_code: "R50.9".into(),
                medical_organization: "City Clinic No. 1".into(),
                organization_contact: String::new(),
                justification: String::new(),
                analyses: analyses
                    .iter()
                    .map(|a| NonEmptyText::new(a).unwrap())
                    .collect(),
            })
            .expect("insert_referral should succeed");

        (referral.id, analyses.into_iter().map(|a| a.id).collect())
    }
}
