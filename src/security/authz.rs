//! Role-based authorization.
//!
//! Privilege comes from the role claim on the identity, checked in one
//! place instead of per route.

use crate::identity::{Identity, Role};

/// Decides whether an identity holds a role.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, identity: &Identity, required: Role) -> bool;
}

/// Admins satisfy every role; users satisfy only `User`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn authorize(&self, identity: &Identity, required: Role) -> bool {
        match required {
            Role::User => true,
            Role::Admin => identity.role == Role::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_requires_claim() {
        let authz = RoleAuthorizer;
        let user = Identity::new("u1", "ops@rekonnlabs.com");
        let admin = Identity::new("u2", "someone@gmail.com").with_role(Role::Admin);

        assert!(authz.authorize(&user, Role::User));
        assert!(!authz.authorize(&user, Role::Admin));
        assert!(authz.authorize(&admin, Role::Admin));
        assert!(authz.authorize(&admin, Role::User));
    }
}
