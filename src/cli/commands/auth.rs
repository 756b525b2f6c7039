use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};

use crate::auth::DEFAULT_TOKEN_TTL_MINUTES;

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL_MINUTES: &str = "token-ttl-minutes";

/// Shortest accepted signing secret, in bytes.
pub const MIN_TOKEN_SECRET_BYTES: usize = 32;

/// Longest accepted token validity window: one year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug)]
pub struct Options {
    pub token_secret: SecretString,
    pub token_ttl_minutes: i64,
}

impl Options {
    /// # Errors
    /// Returns an error if the secret is missing or too short, or the TTL is
    /// outside `1..=MAX_TOKEN_TTL_MINUTES`.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let token_secret = matches
            .get_one::<String>(ARG_TOKEN_SECRET)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --token-secret")?;

        if token_secret.expose_secret().len() < MIN_TOKEN_SECRET_BYTES {
            bail!("--{ARG_TOKEN_SECRET} must be at least {MIN_TOKEN_SECRET_BYTES} bytes");
        }

        let token_ttl_minutes = matches
            .get_one::<i64>(ARG_TOKEN_TTL_MINUTES)
            .copied()
            .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES);

        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&token_ttl_minutes) {
            bail!("--{ARG_TOKEN_TTL_MINUTES} must be between 1 and {MAX_TOKEN_TTL_MINUTES}");
        }

        Ok(Self {
            token_secret,
            token_ttl_minutes,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HS256 signing secret for access tokens (at least 32 bytes)")
                .env("TASKGATE_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_MINUTES)
                .long(ARG_TOKEN_TTL_MINUTES)
                .help("Access token validity window in minutes")
                .env("TASKGATE_TOKEN_TTL_MINUTES")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        )
}
