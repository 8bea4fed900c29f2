//! Bearer token parsing for the `Authorization` header.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error("Authorization header must use the Bearer scheme")]
    InvalidScheme,
    #[error("bearer token is empty")]
    EmptyToken,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = header_value.ok_or(AuthError::MissingHeader)?.trim_start();

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidScheme)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidScheme);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(bearer_token(Some("bearer   abc ")), Ok("abc"));
    }

    #[test]
    fn rejects_missing_or_foreign_schemes() {
        assert_eq!(bearer_token(None), Err(AuthError::MissingHeader));
        assert_eq!(bearer_token(Some("Basic dXNlcg==")), Err(AuthError::InvalidScheme));
        assert_eq!(bearer_token(Some("abc.def.ghi")), Err(AuthError::InvalidScheme));
        assert_eq!(bearer_token(Some("Bearer")), Err(AuthError::InvalidScheme));
        assert_eq!(bearer_token(Some("Bearer ")), Err(AuthError::EmptyToken));
        assert_eq!(bearer_token(Some("Bearer  \t")), Err(AuthError::EmptyToken));
    }
}
