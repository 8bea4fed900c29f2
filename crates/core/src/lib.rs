//! # MedHelp Core
//!
//! Core business logic for the MedHelp referrals system.
//!
//! This crate decides, for every request, which referral, analysis and file records an
//! authenticated actor may read or mutate, and drives the two small lifecycles on top:
//! - Referral status, overwritten by registrars
//! - Analysis check state and attached result file
//!
//! It also owns registration and login, the identity token format, and the local record
//! store.
//!
//! **No API concerns**: HTTP servers, request parsing and status codes belong in `api-rest`
//! and `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod password;
pub mod services;
pub mod store;
pub mod token;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{token_ttl_hours_from_env_value, CoreConfig, SigningKey};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use identity::{Identity, Role};
pub use services::{
    AccessService, AccountService, AnalysisService, DoctorDetails, Download, DownloadFile,
    NewReferral, PatientDetails, ReferralDetails, ReferralService, Registration,
};
pub use store::{LocalStore, RecordStore, ReferralStatus};
pub use token::{DecodedToken, IssuedToken, TokenCodec, TokenError};

pub use medhelp_types::{
    AccountId, AnalysisId, DoctorId, FileId, NonEmptyText, PatientId, ReferralId,
};

use medhelp_files::FilesService;
use std::fs;
use std::sync::Arc;

/// All core services wired to one record store and one file store.
#[derive(Clone)]
pub struct ClinicServices {
    pub accounts: AccountService,
    pub referrals: ReferralService,
    pub analyses: AnalysisService,
    pub access: AccessService,
    pub codec: TokenCodec,
}

impl ClinicServices {
    /// Open the record store and file store under the configured data directory.
    ///
    /// The data directory and its `files/` subdirectory are created if missing.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if the directories cannot be created or an existing
    /// `records.json` cannot be loaded.
    pub fn open(cfg: Arc<CoreConfig>) -> CoreResult<Self> {
        let store = LocalStore::open(cfg.records_path())?;
        Self::with_store(cfg, Arc::new(store))
    }

    /// Wire services to an already opened record store.
    pub fn with_store(cfg: Arc<CoreConfig>, store: Arc<dyn RecordStore>) -> CoreResult<Self> {
        let files_dir = cfg.files_dir();
        fs::create_dir_all(&files_dir).map_err(CoreError::StorageDirCreation)?;
        let files = Arc::new(FilesService::new(&files_dir)?);

        let codec = TokenCodec::new(cfg.signing_key().clone(), cfg.token_ttl());

        Ok(Self {
            accounts: AccountService::new(store.clone(), codec.clone()),
            referrals: ReferralService::new(store.clone()),
            analyses: AnalysisService::new(store.clone(), files),
            access: AccessService::new(store),
            codec,
        })
    }

    /// Decode a bearer token into the caller's identity.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Token` if the token is malformed, tampered with or expired.
    pub fn authenticate(&self, token: &str) -> CoreResult<Identity> {
        Ok(self.codec.decode(token)?.identity)
    }
}
