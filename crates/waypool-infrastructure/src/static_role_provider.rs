//! Map-backed role provider.

use async_trait::async_trait;
use std::collections::HashSet;
use waypool_core::roles::RoleProvider;

/// A [`RoleProvider`] over fixed role sets, for deployments where roles are
/// resolved ahead of time and for tests.
///
/// System administrators implicitly hold the admin role as well.
#[derive(Debug, Default, Clone)]
pub struct StaticRoleProvider {
    admins: HashSet<String>,
    system_admins: HashSet<String>,
}

impl StaticRoleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, user_id: impl Into<String>) -> Self {
        self.admins.insert(user_id.into());
        self
    }

    pub fn with_system_admin(mut self, user_id: impl Into<String>) -> Self {
        self.system_admins.insert(user_id.into());
        self
    }
}

#[async_trait]
impl RoleProvider for StaticRoleProvider {
    async fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id) || self.system_admins.contains(user_id)
    }

    async fn is_system_admin(&self, user_id: &str) -> bool {
        self.system_admins.contains(user_id)
    }
}
