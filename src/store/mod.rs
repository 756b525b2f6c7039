//! Persistence seams for users and tasks.
//!
//! The auth core only sees [`CredentialStore`]; the task handlers only see
//! [`TaskStore`]. Both are implemented by [`PgStore`] (production) and
//! [`MemoryStore`] (tests and `--memory` runs). Each store owns its own
//! concurrency control: username uniqueness is enforced at insert time by
//! the store itself, never by a caller-side pre-check alone.

mod memory;
mod model;
mod postgres;

pub use memory::MemoryStore;
pub use model::{NewTask, ParseTaskStatusError, Task, TaskChanges, TaskStatus, UserRecord};
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Role;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// User records as seen by the auth core.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a new user.
    ///
    /// # Errors
    /// Returns [`StoreError::UniqueViolation`] if the username already exists,
    /// including when a concurrent insert won the race.
    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserRecord, StoreError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Round trip to the backend, used by `/health`.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, owner_id: i64, task: NewTask) -> Result<Task, StoreError>;

    async fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError>;

    /// List tasks ordered by id; `None` lists every owner's tasks.
    async fn list_tasks(&self, owner_id: Option<i64>) -> Result<Vec<Task>, StoreError>;

    /// Apply the given changes; `Ok(None)` when the task does not exist.
    async fn update_task(&self, id: i64, changes: TaskChanges)
        -> Result<Option<Task>, StoreError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_task(&self, id: i64) -> Result<bool, StoreError>;
}
