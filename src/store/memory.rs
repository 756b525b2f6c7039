//! In-process store used by tests and `--memory` runs.
//!
//! All state sits behind one `RwLock`; the username check and the insert
//! happen inside the same write section, so concurrent registrations of one
//! username produce exactly one record.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{CredentialStore, NewTask, StoreError, Task, TaskChanges, TaskStore, UserRecord};
use crate::auth::Role;

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<i64, UserRecord>,
    tasks: BTreeMap<i64, Task>,
    last_user_id: i64,
    last_task_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|user| user.username == username) {
            return Err(StoreError::UniqueViolation);
        }

        inner.last_user_id += 1;
        let record = UserRecord {
            id: inner.last_user_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        inner.users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, owner_id: i64, task: NewTask) -> Result<Task, StoreError> {
        let mut inner = self.inner.write().await;
        inner.last_task_id += 1;
        let task = Task {
            id: inner.last_task_id,
            name: task.name,
            status: task.status,
            user_id: owner_id,
            created_at: Utc::now(),
        };
        inner.tasks.insert(task.id, task.clone());

        Ok(task)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        Ok(self.inner.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, owner_id: Option<i64>) -> Result<Vec<Task>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .values()
            .filter(|task| owner_id.map_or(true, |owner| task.user_id == owner))
            .cloned()
            .collect())
    }

    async fn update_task(
        &self,
        id: i64,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            task.name = name;
        }
        if let Some(status) = changes.status {
            task.status = status;
        }

        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.tasks.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TaskStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn insert_assigns_increasing_ids() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let alice = store.insert("alice", "s$d", Role::User).await?;
        let bob = store.insert("bob", "s$d", Role::Admin).await?;
        assert_eq!(alice.id, 1);
        assert_eq!(bob.id, 2);
        assert_eq!(
            store.find_by_username("bob").await?.map(|user| user.role),
            Some(Role::Admin)
        );
        assert_eq!(
            store.find_by_id(1).await?.map(|user| user.username),
            Some("alice".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.insert("alice", "s$d", Role::User).await?;
        let second = store.insert("alice", "s$other", Role::Admin).await;
        assert!(matches!(second, Err(StoreError::UniqueViolation)));
        assert_eq!(store.list_users().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_inserts_have_one_winner() -> Result<(), StoreError> {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert("carol", "s$d", Role::User).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if let Ok(Ok(_)) = handle.await {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.list_users().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn task_lifecycle() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let task = store
            .create_task(
                7,
                NewTask {
                    name: "Write docs".to_string(),
                    status: TaskStatus::Pending,
                },
            )
            .await?;
        store
            .create_task(
                8,
                NewTask {
                    name: "Other task".to_string(),
                    status: TaskStatus::Completed,
                },
            )
            .await?;

        assert_eq!(store.list_tasks(Some(7)).await?.len(), 1);
        assert_eq!(store.list_tasks(None).await?.len(), 2);

        let updated = store
            .update_task(
                task.id,
                TaskChanges {
                    status: Some(TaskStatus::Completed),
                    ..TaskChanges::default()
                },
            )
            .await?;
        assert_eq!(
            updated.map(|task| (task.name, task.status)),
            Some(("Write docs".to_string(), TaskStatus::Completed))
        );

        assert!(store.delete_task(task.id).await?);
        assert!(!store.delete_task(task.id).await?);
        assert!(store.get_task(task.id).await?.is_none());
        assert!(store
            .update_task(task.id, TaskChanges::default())
            .await?
            .is_none());
        Ok(())
    }
}
