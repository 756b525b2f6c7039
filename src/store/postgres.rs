//! Postgres-backed store.
//!
//! Username uniqueness is the `users_username_key` unique index; an insert
//! that loses a race surfaces as SQLSTATE `23505` and is reported as
//! [`StoreError::UniqueViolation`].

use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::time::Duration;
use tracing::{info_span, instrument, Instrument};

use super::{CredentialStore, NewTask, StoreError, Task, TaskChanges, TaskStatus, TaskStore, UserRecord};
use crate::auth::Role;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, username, hashed_password, role, created_at";
const TASK_COLUMNS: &str = "id, name, status, user_id, created_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await?;

        Ok(Self { pool })
    }

    /// Apply `sql/schema.sql`; every statement is `IF NOT EXISTS`.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in split_sql_statements(SCHEMA_SQL) {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DDL",
                db.statement = statement.as_str()
            );
            sqlx::query(&statement)
                .execute(&self.pool)
                .instrument(span)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(select_span(&query))
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(select_span(&query))
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserRecord, StoreError> {
        let query = format!(
            "INSERT INTO users (username, hashed_password, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(username)
            .bind(password_hash)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::UniqueViolation
                } else {
                    StoreError::Database(err)
                }
            })?;

        Ok(user_from_row(&row)?)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(select_span(&query))
            .await?;

        Ok(rows.iter().map(user_from_row).collect::<Result<_, _>>()?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;

        Ok(())
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, owner_id: i64, task: NewTask) -> Result<Task, StoreError> {
        let query = format!(
            "INSERT INTO tasks (name, status, user_id) VALUES ($1, $2, $3) RETURNING {TASK_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(&task.name)
            .bind(task.status.as_str())
            .bind(owner_id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;

        Ok(task_from_row(&row)?)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(select_span(&query))
            .await?;

        Ok(row.as_ref().map(task_from_row).transpose()?)
    }

    async fn list_tasks(&self, owner_id: Option<i64>) -> Result<Vec<Task>, StoreError> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE ($1::BIGINT IS NULL OR user_id = $1) ORDER BY id"
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .instrument(select_span(&query))
            .await?;

        Ok(rows.iter().map(task_from_row).collect::<Result<_, _>>()?)
    }

    async fn update_task(
        &self,
        id: i64,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        let query = format!(
            "UPDATE tasks SET name = COALESCE($1, name), status = COALESCE($2, status) WHERE id = $3 RETURNING {TASK_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(changes.name)
            .bind(changes.status.map(TaskStatus::as_str))
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(task_from_row).transpose()?)
    }

    async fn delete_task(&self, id: i64) -> Result<bool, StoreError> {
        let query = "DELETE FROM tasks WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn select_span(query: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    )
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("hashed_password")?,
        role: role
            .parse::<Role>()
            .map_err(|err| sqlx::Error::Decode(err.into()))?,
        created_at: row.try_get("created_at")?,
    })
}

fn task_from_row(row: &PgRow) -> Result<Task, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Task {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: status
            .parse::<TaskStatus>()
            .map_err(|err| sqlx::Error::Decode(err.into()))?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Split a schema file into statements, dropping `--` comment lines.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
