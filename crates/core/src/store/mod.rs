//! Record storage.
//!
//! Services talk to persistence only through the [`RecordStore`] trait. Each trait method is
//! a single atomic operation: it either applies completely or leaves the store untouched.
//! Uniqueness rules (usernames, one account per patient, one patient per policy number) are
//! enforced inside those operations so that two concurrent requests cannot both pass a
//! check made outside the store.

mod local;

pub use local::LocalStore;

use crate::identity::Role;
use chrono::NaiveDate;
use medhelp_types::{
    AccountId, AnalysisId, DoctorId, FileId, NonEmptyText, PatientId, ReferralId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status code of a referral.
///
/// Codes are opaque integers owned by clinic staff; only the initial value is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferralStatus(i32);

impl ReferralStatus {
    pub const NEW: ReferralStatus = ReferralStatus(crate::constants::NEW_REFERRAL_STATUS);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    pub const fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub role: Role,
    pub linked_patient_id: Option<PatientId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub birth_date: NaiveDate,
    pub policy_number: NonEmptyText,
    pub tel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub name: NonEmptyText,
    pub specialty: NonEmptyText,
}

/// A referral ("direction") issued by a doctor for a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub id: ReferralId,
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub icd_code: String,
    pub medical_organization: String,
    pub organization_contact: String,
    pub justification: String,
    pub status: ReferralStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,
    pub name: NonEmptyText,
    pub referral_id: ReferralId,
    pub is_checked: bool,
    pub file_id: Option<FileId>,
}

/// Record of an uploaded result file. The bytes live in the file store at `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    pub path: NonEmptyText,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub role: Role,
    pub linked_patient_id: Option<PatientId>,
}

#[derive(Debug, Clone)]
pub struct NewPatient {
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub birth_date: NaiveDate,
    pub policy_number: NonEmptyText,
    pub tel: String,
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: NonEmptyText,
    pub specialty: NonEmptyText,
}

/// A referral row plus the names of the analyses ordered under it.
#[derive(Debug, Clone)]
pub struct NewReferralRecord {
    pub patient_id: PatientId,
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub icd_code: String,
    pub medical_organization: String,
    pub organization_contact: String,
    pub justification: String,
    pub analyses: Vec<NonEmptyText>,
}

#[derive(Debug, Clone)]
pub struct NewStoredFile {
    pub name: String,
    pub path: NonEmptyText,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub sha256: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("patient {0} is already bound to an account")]
    PatientAlreadyBound(PatientId),
    #[error("policy number '{0}' belongs to a patient with a different last name")]
    PolicyNumberMismatch(String),
    #[error("referral {0} not found")]
    ReferralNotFound(ReferralId),
    #[error("analysis {0} not found")]
    AnalysisNotFound(AnalysisId),
    #[error("dangling reference: {0}")]
    DanglingReference(String),
    #[error("failed to read records file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write records file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize records: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize records: {0}")]
    Deserialization(serde_json::Error),
    #[error("record store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence capability consumed by the core services.
pub trait RecordStore: Send + Sync {
    fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>>;

    /// Insert an account.
    ///
    /// # Errors
    ///
    /// - `StoreError::UsernameTaken` if the username is in use.
    /// - `StoreError::PatientAlreadyBound` if `linked_patient_id` is already bound.
    /// - `StoreError::DanglingReference` if `linked_patient_id` names no patient.
    fn insert_account(&self, account: NewAccount) -> StoreResult<Account>;

    fn is_patient_bound(&self, patient_id: PatientId) -> StoreResult<bool>;

    fn get_patient(&self, id: PatientId) -> StoreResult<Option<Patient>>;

    /// Look up the patient a registration names by `(last_name, policy_number)`.
    fn find_patient_for_registration(
        &self,
        last_name: &str,
        policy_number: &str,
    ) -> StoreResult<Option<Patient>>;

    /// Return the patient holding `policy_number`, creating it if absent.
    ///
    /// # Errors
    ///
    /// `StoreError::PolicyNumberMismatch` if the policy number exists under another last name.
    fn upsert_patient(&self, patient: NewPatient) -> StoreResult<Patient>;

    fn get_doctor(&self, id: DoctorId) -> StoreResult<Option<Doctor>>;

    /// Return the doctor keyed by `(name, specialty)`, creating it if absent.
    fn upsert_doctor(&self, doctor: NewDoctor) -> StoreResult<Doctor>;

    /// Insert a referral with status [`ReferralStatus::NEW`] together with its analyses.
    fn insert_referral(
        &self,
        referral: NewReferralRecord,
    ) -> StoreResult<(Referral, Vec<Analysis>)>;

    fn get_referral(&self, id: ReferralId) -> StoreResult<Option<Referral>>;

    /// All referrals ordered by date ascending, ties broken by id.
    fn list_referrals(&self) -> StoreResult<Vec<Referral>>;

    /// Referrals naming `patient_id`, in the same order as [`RecordStore::list_referrals`].
    fn list_referrals_for_patient(&self, patient_id: PatientId) -> StoreResult<Vec<Referral>>;

    fn set_referral_status(&self, id: ReferralId, status: ReferralStatus) -> StoreResult<Referral>;

    fn get_analysis(&self, id: AnalysisId) -> StoreResult<Option<Analysis>>;

    fn list_analyses(&self, referral_id: ReferralId) -> StoreResult<Vec<Analysis>>;

    fn set_analysis_checked(&self, id: AnalysisId, checked: bool) -> StoreResult<Analysis>;

    fn set_analysis_file(&self, id: AnalysisId, file_id: FileId) -> StoreResult<Analysis>;

    fn insert_file(&self, file: NewStoredFile) -> StoreResult<StoredFile>;

    fn get_file(&self, id: FileId) -> StoreResult<Option<StoredFile>>;
}
