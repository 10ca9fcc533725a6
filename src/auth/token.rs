//! Access tokens
//!
//! Short-lived HS256 JWTs carried in the `jwt` cookie. Verification is
//! stateless: signature, issuer, audience and expiry are checked against
//! the injected clock, never against the store.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Access token lifetime in seconds
pub const ACCESS_TTL_SECONDS: i64 = 3600;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Session id
    pub sid: String,
    /// User id
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies access tokens
///
/// The signing key is loaded once at startup and never changes.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl TokenIssuer {
    pub fn new(signing_key: &str, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // Expiry is judged against the injected clock in `verify`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(signing_key.as_bytes()),
            decoding: DecodingKey::from_secret(signing_key.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// Issue a token for a session
    ///
    /// `exp` is always `iat + ACCESS_TTL_SECONDS`.
    pub fn issue(
        &self,
        session_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let iat = now.timestamp();
        let claims = Claims {
            sid: session_id.to_string(),
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            exp: iat + ACCESS_TTL_SECONDS,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign access token: {e}")))
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    /// `InvalidToken` when the token is malformed, the signature does not
    /// match, `iss`/`aud` differ, or `exp` is not after `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AppError::InvalidToken
            })?;

        if claims.exp <= now.timestamp() {
            tracing::debug!(sid = %claims.sid, "Access token expired");
            return Err(AppError::InvalidToken);
        }

        Ok(claims)
    }
}
