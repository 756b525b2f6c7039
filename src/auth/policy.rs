//! Ownership rules. Callers turn a `false` into [`super::AuthError::Forbidden`].

use super::{Principal, Role};

#[must_use]
pub fn is_admin(principal: &Principal) -> bool {
    principal.role == Role::Admin
}

/// Admins reach every resource; users reach only what they own.
#[must_use]
pub fn can_access(principal: &Principal, owner_id: i64) -> bool {
    is_admin(principal) || principal.id == owner_id
}
