//! Authentication and authorization core.
//!
//! - [`password`]: salted digests.
//! - [`TokenCodec`]: signs and verifies bearer tokens.
//! - [`Authenticator`]: login and registration against a [`CredentialStore`].
//! - [`SessionResolver`]: token to [`Principal`].
//! - [`policy`]: owner-or-admin rule.
//!
//! [`CredentialStore`]: crate::store::CredentialStore

mod authenticator;
mod error;
pub mod password;
pub mod policy;
mod session;
mod token;
mod types;

pub use authenticator::Authenticator;
pub use error::AuthError;
pub use session::SessionResolver;
pub use token::{TokenClaims, TokenCodec, DEFAULT_TOKEN_TTL_MINUTES};
pub use types::{AccessToken, ParseRoleError, Principal, Role, User};
