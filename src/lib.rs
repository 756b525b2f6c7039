//! # Taskgate (Todo API with token authentication)
//!
//! `taskgate` is a small Todo list service: users register with a username
//! and password, log in for a signed bearer token, and manage their own
//! tasks. Administrators can see and change every task.
//!
//! ## Authentication
//!
//! Passwords are stored as `<salt>$<sha256-hex>` and checked with a
//! constant-time comparison. A successful login returns an HS256 JWT carrying
//! the username, role and user id, valid for a fixed window (60 minutes by
//! default). Tokens are stateless: there is no server-side session table and
//! no revocation list.
//!
//! ## Authorization
//!
//! Every request re-resolves the token subject against the credential store.
//! Owned resources follow a single rule: the owner or an `admin` may access
//! them. Admin-only collections (listing users) are gated separately.
//!
//! The [`auth`] module holds the core and only talks to storage through the
//! [`store::CredentialStore`] trait, so it can be reused without the HTTP
//! layer in [`api`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
