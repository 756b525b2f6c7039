use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{AuthError, Principal, TokenCodec};
use crate::store::CredentialStore;

/// Turns a bearer token into the principal for one request.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
}

impl SessionResolver {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    /// Decode `token` and re-fetch its subject.
    ///
    /// The principal's role comes from the stored record, so role changes
    /// apply on the next request even for tokens issued before the change.
    ///
    /// # Errors
    /// - [`AuthError::InvalidToken`] or [`AuthError::ExpiredToken`] from decoding.
    /// - [`AuthError::UserNotFound`] if the subject is gone or now names a
    ///   different account.
    #[instrument(skip_all)]
    pub async fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        let claims = self.codec.decode(token, now)?;

        let record = self
            .store
            .find_by_username(&claims.sub)
            .await?
            .filter(|record| record.id == claims.user_id)
            .ok_or_else(|| {
                debug!(user_id = claims.user_id, "token subject no longer resolves");
                AuthError::UserNotFound
            })?;

        Ok(Principal::from(&record))
    }
}
