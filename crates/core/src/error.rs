use crate::store::StoreError;
use crate::token::TokenError;
use medhelp_files::FilesError;
use medhelp_types::{AnalysisId, ReferralId, TextError};

/// Coarse classification of every core failure.
///
/// Outer layers map a kind to a transport status; the variant itself carries the detail
/// that goes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    BadInput,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid token: {0}")]
    Token(#[from] TokenError),
    #[error("unknown username")]
    UserNotFound,
    #[error("password does not match")]
    BadCredentials,

    #[error("operation requires the registrar role")]
    RegistrarOnly,
    #[error("referral {0} is not accessible to this account")]
    ReferralForbidden(ReferralId),
    #[error("analysis {0} is not accessible to this account")]
    AnalysisForbidden(AnalysisId),

    #[error("referral {0} not found")]
    ReferralNotFound(ReferralId),
    #[error("analysis {0} not found")]
    AnalysisNotFound(AnalysisId),
    #[error("no patient matches the given last name and policy number")]
    PatientNotFound,

    #[error("username is already taken")]
    UsernameTaken,
    #[error("patient already has an account")]
    AlreadyRegistered,
    #[error("policy number {0} is registered under a different last name")]
    PolicyNumberMismatch(String),

    #[error("patient account {0} is not linked to a patient record")]
    AccountNotLinked(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("record store error: {0}")]
    Store(StoreError),
    #[error("file storage error: {0}")]
    Files(#[from] FilesError),
    #[error("password hashing error: {0}")]
    Hashing(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidInput(_) => ErrorKind::BadInput,
            CoreError::Token(TokenError::ExpiryOutOfRange) => ErrorKind::Internal,
            CoreError::Token(_) | CoreError::UserNotFound | CoreError::BadCredentials => {
                ErrorKind::Unauthorized
            }
            CoreError::RegistrarOnly
            | CoreError::ReferralForbidden(_)
            | CoreError::AnalysisForbidden(_) => ErrorKind::Forbidden,
            CoreError::ReferralNotFound(_)
            | CoreError::AnalysisNotFound(_)
            | CoreError::PatientNotFound => ErrorKind::NotFound,
            CoreError::UsernameTaken
            | CoreError::AlreadyRegistered
            | CoreError::PolicyNumberMismatch(_) => ErrorKind::Conflict,
            CoreError::AccountNotLinked(_)
            | CoreError::StorageDirCreation(_)
            | CoreError::Store(_)
            | CoreError::Files(_)
            | CoreError::Hashing(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UsernameTaken(_) => CoreError::UsernameTaken,
            StoreError::PatientAlreadyBound(_) => CoreError::AlreadyRegistered,
            StoreError::PolicyNumberMismatch(policy) => CoreError::PolicyNumberMismatch(policy),
            StoreError::ReferralNotFound(id) => CoreError::ReferralNotFound(id),
            StoreError::AnalysisNotFound(id) => CoreError::AnalysisNotFound(id),
            other => CoreError::Store(other),
        }
    }
}

impl From<TextError> for CoreError {
    fn from(err: TextError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_share_the_unauthorized_kind() {
        assert_eq!(CoreError::UserNotFound.kind(), ErrorKind::Unauthorized);
        assert_eq!(CoreError::BadCredentials.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            CoreError::Token(TokenError::Expired).kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn unrepresentable_token_expiry_is_internal() {
        assert_eq!(
            CoreError::Token(TokenError::ExpiryOutOfRange).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn store_uniqueness_violations_become_conflicts() {
        let err: CoreError = StoreError::UsernameTaken("alice".into()).into();
        assert!(matches!(err, CoreError::UsernameTaken));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: CoreError =
            StoreError::PatientAlreadyBound(medhelp_types::PatientId::new(3)).into();
        assert!(matches!(err, CoreError::AlreadyRegistered));
    }

    #[test]
    fn store_missing_rows_become_not_found() {
        let err: CoreError = StoreError::ReferralNotFound(ReferralId::new(9)).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn blank_text_is_bad_input() {
        let err: CoreError = TextError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }
}
