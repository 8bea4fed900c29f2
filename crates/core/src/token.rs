//! Signed identity tokens.
//!
//! Tokens are compact JWS strings signed with HMAC-SHA256:
//!
//! ```text
//! base64url(header) . base64url(claims) . base64url(hmac(header.claims))
//! ```
//!
//! No session state is kept server side. A token is valid until its `exp` claim passes or
//! the signing key changes.

use crate::config::SigningKey;
use crate::identity::{Identity, Role};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use medhelp_types::PatientId;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
}

/// Claims carried in the token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    pub identity: Identity,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct TokenCodec {
    key: SigningKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: SigningKey, ttl: Duration) -> Self {
        Self { key, ttl }
    }

    /// Issue a token for `identity` valid from now until now + TTL.
    pub fn issue(&self, identity: &Identity, username: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(identity, username, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::ExpiryOutOfRange` if `now` + TTL is not a representable time.
    pub fn issue_at(
        &self,
        identity: &Identity,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims {
            sub: username.to_owned(),
            role: identity.role(),
            patient_id: identity.patient_id(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let claims_json = serde_json::to_vec(&claims)
            .map_err(|e| TokenError::Malformed(format!("claims serialisation failed: {e}")))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER_JSON.as_bytes()),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let mac = self.mac(signing_input.as_bytes())?;
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{signing_input}.{signature}"),
            expires_at,
        })
    }

    /// Verify and decode a token against the current time.
    pub fn decode(&self, token: &str) -> Result<DecodedToken, TokenError> {
        self.decode_at(token, Utc::now())
    }

    /// Verify and decode a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// - `TokenError::Malformed` if the token does not have three segments, the signature
    ///   does not verify, the payload is not valid claims, or a patient token lacks a
    ///   patient id.
    /// - `TokenError::Expired` if `now` is at or past the `exp` claim.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<DecodedToken, TokenError> {
        let token = token.trim();
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments".into()));
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed("signature is not base64url".into()))?;
        let signing_input_len = header_b64.len() + 1 + claims_b64.len();
        self.mac(token[..signing_input_len].as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| TokenError::Malformed("signature mismatch".into()))?;

        let header = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Malformed("header is not base64url".into()))?;
        let header: serde_json::Value = serde_json::from_slice(&header)
            .map_err(|_| TokenError::Malformed("header is not JSON".into()))?;
        if header.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
            return Err(TokenError::Malformed("unsupported algorithm".into()));
        }

        let claims = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::Malformed("claims are not base64url".into()))?;
        let claims: Claims = serde_json::from_slice(&claims)
            .map_err(|e| TokenError::Malformed(format!("invalid claims: {e}")))?;

        let identity = match (claims.role, claims.patient_id) {
            (Role::Registrar, _) => Identity::Registrar,
            (Role::Patient, Some(patient_id)) => Identity::Patient { patient_id },
            (Role::Patient, None) => {
                return Err(TokenError::Malformed("patient token without patient id".into()))
            }
        };

        let issued_at = timestamp(claims.iat)?;
        let expires_at = timestamp(claims.exp)?;
        if now >= expires_at {
            return Err(TokenError::Expired);
        }

        Ok(DecodedToken {
            identity,
            username: claims.sub,
            issued_at,
            expires_at,
        })
    }

    fn mac(&self, input: &[u8]) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|_| TokenError::Malformed("unusable signing key".into()))?;
        mac.update(input);
        Ok(mac)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| TokenError::Malformed(format!("timestamp out of range: {secs}")))
}
