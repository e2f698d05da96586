//! Role lookup capability.
//!
//! Driver and rider membership is answered by the session document itself;
//! everything the engine needs to know beyond that is whether a user carries
//! an administrative role. The provider is constructor-injected into the
//! guard and the use cases rather than resolved per call.

use async_trait::async_trait;

/// Answers role questions about a user ID.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Whether the user holds the platform admin role.
    async fn is_admin(&self, user_id: &str) -> bool;

    /// Whether the user holds the system administrator role.
    ///
    /// Strictly stronger than [`is_admin`](Self::is_admin); required only for
    /// the hard-delete of a session.
    async fn is_system_admin(&self, user_id: &str) -> bool;
}
