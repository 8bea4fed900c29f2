//! Input validation utilities.
//!
//! Credentials are validated before any store access so that malformed input never reaches
//! the record store or the password hasher.

use crate::constants::{MAX_PASSWORD_LEN, MAX_USERNAME_LEN};
use crate::{CoreError, CoreResult};

/// Validates a username and returns it trimmed.
///
/// Usernames are identifiers embedded in tokens and logs, so they are restricted to a
/// conservative ASCII set:
/// - Rejects empty or whitespace-only strings
/// - Bounds the length to [`MAX_USERNAME_LEN`]
/// - Allows only alphanumerics, '.', '-', '_' and '@'
///
/// # Errors
///
/// Returns `CoreError::InvalidInput` if the username is invalid.
pub fn validate_username(username: &str) -> CoreResult<String> {
    let username = username.trim();

    if username.is_empty() {
        return Err(CoreError::InvalidInput("username cannot be empty".into()));
    }

    if username.len() > MAX_USERNAME_LEN {
        return Err(CoreError::InvalidInput(format!(
            "username exceeds maximum length of {} characters",
            MAX_USERNAME_LEN
        )));
    }

    let ok = username
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_' | b'@'));

    if !ok {
        return Err(CoreError::InvalidInput(
            "username contains invalid characters (only alphanumeric, '.', '-', '_', '@' allowed)"
                .into(),
        ));
    }

    Ok(username.to_owned())
}

/// Validates a password.
///
/// Passwords are not trimmed; only a blank password or one longer than
/// [`MAX_PASSWORD_LEN`] bytes is rejected.
///
/// # Errors
///
/// Returns `CoreError::InvalidInput` if the password is invalid.
pub fn validate_password(password: &str) -> CoreResult<()> {
    if password.trim().is_empty() {
        return Err(CoreError::InvalidInput("password cannot be empty".into()));
    }

    if password.len() > MAX_PASSWORD_LEN {
        return Err(CoreError::InvalidInput(format!(
            "password exceeds maximum length of {} bytes",
            MAX_PASSWORD_LEN
        )));
    }

    Ok(())
}
