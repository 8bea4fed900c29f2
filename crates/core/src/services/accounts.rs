//! Registration and authentication.
//!
//! Registration creates an account bound either to the registrar role or to an existing
//! patient record, and returns a fresh identity token. Authentication checks a username and
//! password and returns a fresh token.

use crate::identity::{Identity, Role};
use crate::password::{generate_salt, hash_password, verify_password};
use crate::store::{NewAccount, RecordStore};
use crate::token::{IssuedToken, TokenCodec};
use crate::validation::{validate_password, validate_username};
use crate::{CoreError, CoreResult};
use std::sync::Arc;

/// A registration request.
#[derive(Clone)]
pub enum Registration {
    Registrar {
        username: String,
        password: String,
        registrar_secret: String,
    },
    Patient {
        username: String,
        password: String,
        last_name: String,
        policy_number: String,
    },
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registration::Registrar { username, .. } => f
                .debug_struct("Registrar")
                .field("username", username)
                .finish_non_exhaustive(),
            Registration::Patient {
                username,
                last_name,
                policy_number,
                ..
            } => f
                .debug_struct("Patient")
                .field("username", username)
                .field("last_name", last_name)
                .field("policy_number", policy_number)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn RecordStore>,
    codec: TokenCodec,
}

impl AccountService {
    pub fn new(store: Arc<dyn RecordStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Register a new account and issue its first token.
    ///
    /// For the patient branch the patient record must already exist, matched by last name
    /// and policy number, and must not yet be bound to an account. The account insert and the
    /// patient binding happen in one store operation, so a failed registration leaves no
    /// account behind.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if:
    /// - username or password is blank or malformed ([`CoreError::InvalidInput`])
    /// - the username is taken ([`CoreError::UsernameTaken`])
    /// - no patient matches ([`CoreError::PatientNotFound`])
    /// - the patient already has an account ([`CoreError::AlreadyRegistered`])
    /// - the record store fails
    pub fn register(&self, registration: Registration) -> CoreResult<IssuedToken> {
        match registration {
            Registration::Registrar {
                username,
                password,
                registrar_secret: _,
            } => {
                // TODO: verify the registrar secret once the clinic's onboarding policy
                // defines where the expected value comes from.
                self.create_account(&username, &password, Identity::Registrar)
            }
            Registration::Patient {
                username,
                password,
                last_name,
                policy_number,
            } => {
                let username = validate_username(&username)?;
                validate_password(&password)?;
                self.ensure_username_free(&username)?;

                let patient = self
                    .store
                    .find_patient_for_registration(&last_name, &policy_number)?
                    .ok_or(CoreError::PatientNotFound)?;

                if self.store.is_patient_bound(patient.id)? {
                    return Err(CoreError::AlreadyRegistered);
                }

                self.create_account(
                    &username,
                    &password,
                    Identity::Patient {
                        patient_id: patient.id,
                    },
                )
            }
        }
    }

    /// Check credentials and issue a fresh token.
    ///
    /// # Errors
    ///
    /// - `CoreError::UserNotFound` if no account has this username.
    /// - `CoreError::BadCredentials` if the password does not match.
    /// - `CoreError::AccountNotLinked` if a patient account lost its patient binding.
    pub fn login(&self, username: &str, password: &str) -> CoreResult<IssuedToken> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "username and password are required".into(),
            ));
        }

        let account = self
            .store
            .find_account_by_username(username)?
            .ok_or(CoreError::UserNotFound)?;

        if !verify_password(password, &account.salt, &account.password_hash) {
            tracing::warn!(username = %account.username, "login rejected");
            return Err(CoreError::BadCredentials);
        }

        let identity = match (account.role, account.linked_patient_id) {
            (Role::Registrar, _) => Identity::Registrar,
            (Role::Patient, Some(patient_id)) => Identity::Patient { patient_id },
            (Role::Patient, None) => return Err(CoreError::AccountNotLinked(account.username)),
        };

        let token = self.codec.issue(&identity, &account.username)?;
        tracing::info!(username = %account.username, %identity, "login succeeded");
        Ok(token)
    }

    fn ensure_username_free(&self, username: &str) -> CoreResult<()> {
        if self.store.find_account_by_username(username)?.is_some() {
            return Err(CoreError::UsernameTaken);
        }
        Ok(())
    }

    fn create_account(
        &self,
        username: &str,
        password: &str,
        identity: Identity,
    ) -> CoreResult<IssuedToken> {
        let username = validate_username(username)?;
        validate_password(password)?;
        self.ensure_username_free(&username)?;

        let salt = generate_salt();
        let password_hash = hash_password(password, &salt);
        let token = self.codec.issue(&identity, &username)?;

        // Re-checks username uniqueness and the patient binding atomically.
        let account = self.store.insert_account(NewAccount {
            username,
            password_hash,
            salt,
            role: identity.role(),
            linked_patient_id: identity.patient_id(),
        })?;

        tracing::info!(account_id = %account.id, %identity, "account registered");
        Ok(token)
    }
}
