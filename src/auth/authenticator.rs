//! Login and registration.
//!
//! Flow Overview:
//! 1) Look the username up in the credential store.
//! 2) Verify (login) or hash (register) the password on the blocking pool.
//! 3) Issue a token (login) or insert the record (register).

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument};

use super::{password, AccessToken, AuthError, Principal, Role, TokenCodec, User};
use crate::store::{CredentialStore, StoreError};

/// Verified against when the username is unknown, so both failure paths run
/// one digest.
fn dummy_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| password::hash("taskgate-dummy"))
}

#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
}

impl Authenticator {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    /// Exchange a username and password for a bearer token issued now.
    ///
    /// # Errors
    /// Returns [`AuthError::AuthenticationFailed`] for an unknown user or a
    /// wrong password, and store or signing errors otherwise.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AccessToken, AuthError> {
        self.login_at(username, password, Utc::now()).await
    }

    /// Like [`Self::login`], with an explicit issue instant.
    ///
    /// # Errors
    /// See [`Self::login`].
    #[instrument(skip(self, password, now))]
    pub async fn login_at(
        &self,
        username: &str,
        password: &SecretString,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, AuthError> {
        let record = self.store.find_by_username(username).await?;

        let stored_hash = record
            .as_ref()
            .map_or_else(|| dummy_hash().to_string(), |record| record.password_hash.clone());
        let verified = verify_blocking(password, stored_hash).await?;

        let Some(record) = record.filter(|_| verified) else {
            debug!("login rejected");
            return Err(AuthError::AuthenticationFailed);
        };

        let token = self.codec.issue(&Principal::from(&record), now)?;
        info!(user_id = record.id, "login succeeded");

        Ok(AccessToken::bearer(token))
    }

    /// Create a new user.
    ///
    /// # Errors
    /// Returns [`AuthError::UsernameTaken`] if the username exists, whether
    /// found by the pre-check or rejected by the store on insert.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
        role: Role,
    ) -> Result<User, AuthError> {
        if self.store.find_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let plaintext = password.expose_secret().to_string();
        let password_hash = tokio::task::spawn_blocking(move || password::hash(&plaintext)).await?;

        let record = match self.store.insert(username, &password_hash, role).await {
            Ok(record) => record,
            Err(StoreError::UniqueViolation) => return Err(AuthError::UsernameTaken),
            Err(err) => return Err(err.into()),
        };
        info!(user_id = record.id, role = %record.role, "user registered");

        Ok(User::from(record))
    }
}

async fn verify_blocking(password: &SecretString, stored_hash: String) -> Result<bool, AuthError> {
    let plaintext = SecretString::from(password.expose_secret().to_string());
    let verified = tokio::task::spawn_blocking(move || {
        password::verify(plaintext.expose_secret(), &stored_hash)
    })
    .await?;

    Ok(verified)
}
