//! Signed bearer tokens (HS256 JWT).
//!
//! The codec owns the signing secret and the validity window. Expiry is
//! checked against the `now` supplied by the caller rather than the system
//! clock, so decoding is deterministic.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};
use tracing::debug;

use super::{AuthError, Principal, Role};

/// Default validity window in minutes.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

/// Claims carried inside every token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Username of the token holder.
    pub sub: String,
    pub role: Role,
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the caller's clock in `decode`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["sub".to_string(), "exp".to_string()]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Sign a token for `principal`, expiring `ttl` after `issued_at`.
    ///
    /// # Errors
    /// Returns [`AuthError::ExpiryOutOfRange`] if `issued_at + ttl` does not
    /// fit a timestamp, and [`AuthError::Signing`] if the claims cannot be
    /// encoded.
    pub fn issue(
        &self,
        principal: &Principal,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        let claims = TokenClaims {
            sub: principal.username.clone(),
            role: principal.role,
            user_id: principal.id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    /// - [`AuthError::InvalidToken`] for a bad signature, malformed token or
    ///   missing subject.
    /// - [`AuthError::ExpiredToken`] if the signature is valid but `now` is
    ///   past the expiry.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|err| {
            debug!("token rejected: {:?}", err.kind());
            AuthError::InvalidToken
        })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        if now.timestamp() > claims.exp {
            return Err(AuthError::ExpiredToken);
        }

        Ok(claims)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &"HS256")
            .field("ttl_seconds", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}
