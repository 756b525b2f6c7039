//! Maps validated CLI matches to the action the binary runs.

use crate::cli::actions::{
    server::{Args, Backend},
    Action,
};
use crate::cli::commands::{auth, ARG_CORS_ORIGIN, ARG_DSN, ARG_MEMORY, ARG_PORT};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let backend = if matches.get_flag(ARG_MEMORY) {
        Backend::Memory
    } else {
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .cloned()
            .context("missing required argument: --dsn")?;
        Backend::Postgres { dsn }
    };

    let cors_origins = matches
        .get_many::<String>(ARG_CORS_ORIGIN)
        .map(|origins| origins.map(|origin| origin.trim().to_string()).collect())
        .unwrap_or_default();

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        backend,
        token_secret: auth_opts.token_secret,
        token_ttl_minutes: auth_opts.token_ttl_minutes,
        cors_origins,
    }))
}
