/// Resolved caller identity, produced by an external token-decoding
/// collaborator. The engine trusts this result as-is and only branches on
/// it; it never decodes or validates tokens itself.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    pub is_authenticated: bool,
    pub is_admin: bool,
    /// Park codes this caller may administer, plus special roles such as
    /// `sysadmin`.
    pub roles: Vec<String>,
}

impl Permissions {
    /// An unauthenticated public visitor.
    pub fn public() -> Permissions {
        Permissions::default()
    }

    /// A system administrator (full access).
    pub fn sysadmin() -> Permissions {
        Permissions { is_authenticated: true, is_admin: true, roles: vec!["sysadmin".to_string()] }
    }

    /// Whether this caller may run administrative operations against the
    /// given park: sysadmins always, park operators when their role list
    /// names the park.
    pub fn can_manage(&self, park: &str) -> bool {
        self.is_authenticated && (self.is_admin || self.roles.iter().any(|r| r == park))
    }
}

/// Token-to-permissions resolution, implemented by an external identity
/// provider integration. Test doubles implement this directly.
pub trait Authorizer: std::fmt::Debug + Send + Sync {
    fn resolve(&self, token: &str) -> Permissions;
}

/// Authorizer handing out a fixed permission set regardless of token.
/// Used by the demo binary and in tests.
#[derive(Debug, Clone)]
pub struct StaticAuthorizer {
    pub permissions: Permissions,
}

impl Authorizer for StaticAuthorizer {
    fn resolve(&self, _token: &str) -> Permissions {
        self.permissions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn park_operator_manages_only_their_park() {
        let operator = Permissions {
            is_authenticated: true,
            is_admin: false,
            roles: vec!["0015".to_string()],
        };
        assert!(operator.can_manage("0015"));
        assert!(!operator.can_manage("0363"));
        assert!(Permissions::sysadmin().can_manage("0363"));
        assert!(!Permissions::public().can_manage("0015"));
    }
}
