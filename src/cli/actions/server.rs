use crate::{
    api::{self, AppState},
    auth::TokenCodec,
    store::{CredentialStore, MemoryStore, PgStore, TaskStore},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fmt, sync::Arc};
use tracing::{info, warn};
use url::Url;

pub enum Backend {
    Postgres { dsn: String },
    Memory,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres { dsn } => f
                .debug_struct("Postgres")
                .field("dsn", &redact_dsn(dsn))
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend: Backend,
    pub token_secret: SecretString,
    pub token_ttl_minutes: i64,
    pub cors_origins: Vec<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be reached, the schema cannot be
/// applied, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let (users, tasks): (Arc<dyn CredentialStore>, Arc<dyn TaskStore>) = match &args.backend {
        Backend::Postgres { dsn } => {
            let store = Arc::new(
                PgStore::connect(dsn)
                    .await
                    .context("Failed to connect to database")?,
            );
            store
                .ensure_schema()
                .await
                .context("Failed to apply database schema")?;
            let users: Arc<dyn CredentialStore> = store.clone();
            let tasks: Arc<dyn TaskStore> = store;
            (users, tasks)
        }
        Backend::Memory => {
            warn!("Using the in-memory store; data is lost on exit");
            let store = Arc::new(MemoryStore::new());
            let users: Arc<dyn CredentialStore> = store.clone();
            let tasks: Arc<dyn TaskStore> = store;
            (users, tasks)
        }
    };

    let ttl = chrono::Duration::try_minutes(args.token_ttl_minutes)
        .context("Token TTL is out of range")?;
    let codec = Arc::new(TokenCodec::new(&args.token_secret, ttl));

    let state = AppState::new(users, tasks, codec);

    api::new(args.port, state, &args.cors_origins).await
}

fn log_startup_args(args: &Args) {
    let backend = match &args.backend {
        Backend::Postgres { dsn } => format!("postgres {}", redact_dsn(dsn)),
        Backend::Memory => "memory".to_string(),
    };
    let cors = if args.cors_origins.is_empty() {
        "disabled".to_string()
    } else {
        args.cors_origins.join(", ")
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("store", backend),
        ("token_ttl_minutes", args.token_ttl_minutes.to_string()),
        ("cors_origins", cors),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
