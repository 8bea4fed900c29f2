//! Core runtime configuration.
//!
//! This module defines configuration that is resolved once at process startup and then
//! passed into core services. Environment variables are never read during request handling;
//! the signing key in particular is set once and read-only afterwards.

use crate::constants::{
    DEFAULT_TOKEN_TTL_HOURS, FILES_DIR_NAME, MAX_TOKEN_TTL_HOURS, MIN_SIGNING_KEY_LEN,
    RECORDS_FILENAME,
};
use crate::{CoreError, CoreResult};
use chrono::Duration;
use std::fmt;
use std::path::{Path, PathBuf};

/// Secret used to sign and verify identity tokens.
///
/// `Debug` output is redacted so the key never ends up in logs.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wraps raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if the key is shorter than
    /// [`MIN_SIGNING_KEY_LEN`] bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> CoreResult<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SIGNING_KEY_LEN {
            return Err(CoreError::InvalidInput(format!(
                "signing key must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    signing_key: SigningKey,
    token_ttl: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if `token_ttl_hours` is not in
    /// `1..=MAX_TOKEN_TTL_HOURS`.
    pub fn new(
        data_dir: PathBuf,
        signing_key: SigningKey,
        token_ttl_hours: i64,
    ) -> CoreResult<Self> {
        let token_ttl = Some(token_ttl_hours)
            .filter(|hours| (1..=MAX_TOKEN_TTL_HOURS).contains(hours))
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "token lifetime must be between 1 and {MAX_TOKEN_TTL_HOURS} hours"
                ))
            })?;

        Ok(Self {
            data_dir,
            signing_key,
            token_ttl,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join(RECORDS_FILENAME)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join(FILES_DIR_NAME)
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }
}

/// Parse the token lifetime from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_TOKEN_TTL_HOURS`].
pub fn token_ttl_hours_from_env_value(value: Option<String>) -> CoreResult<i64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_TOKEN_TTL_HOURS),
        Some(v) => v.parse::<i64>().map_err(|_| {
            CoreError::InvalidInput(format!("token lifetime is not a whole number of hours: '{v}'"))
        }),
    }
}
