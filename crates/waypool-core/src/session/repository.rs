//! Session repository trait.
//!
//! Defines the interface for session persistence operations.

use super::model::{RideSession, SessionStatus};
use crate::error::Result;
use async_trait::async_trait;

/// A mutation applied to one session under the store's per-session
/// serialization. If the closure returns an error, no change is persisted.
pub type SessionMutation = Box<dyn FnOnce(&mut RideSession) -> Result<()> + Send>;

/// An abstract store for ride session documents.
///
/// This trait decouples the engine from the storage mechanism. Two
/// guarantees implementations must provide:
///
/// - `insert` enforces one session per ride: a second insert for the same
///   `ride_id` fails with a `Conflict` error rather than relying on callers
///   to pre-check.
/// - `update` serializes mutations per session, so a precondition re-checked
///   inside the mutation closure cannot race with a concurrent writer.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts the full initial document atomically.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Session stored
    /// - `Err(Conflict)`: A session already exists for this ride
    async fn insert(&self, session: RideSession) -> Result<()>;

    /// Finds a session by its ID.
    async fn find_by_id(&self, session_id: &str) -> Result<Option<RideSession>>;

    /// Finds the session for a ride, if one exists.
    async fn find_by_ride_id(&self, ride_id: &str) -> Result<Option<RideSession>>;

    /// All sessions driven by `driver_id`.
    async fn find_by_driver(&self, driver_id: &str) -> Result<Vec<RideSession>>;

    /// All sessions in which `rider_id` is a rider.
    async fn find_by_rider(&self, rider_id: &str) -> Result<Vec<RideSession>>;

    /// All sessions in the given status.
    async fn find_by_status(&self, status: SessionStatus) -> Result<Vec<RideSession>>;

    /// Sessions eligible for the stale-location sweep: active, not finished,
    /// and holding at least one live-location entry.
    async fn find_sweepable(&self) -> Result<Vec<RideSession>>;

    /// Applies `mutation` to the session under the per-session lock and
    /// returns the updated document.
    ///
    /// # Returns
    ///
    /// - `Ok(RideSession)`: The document after the mutation
    /// - `Err(NotFound)`: No such session
    /// - `Err(_)`: The mutation itself rejected; nothing was persisted
    async fn update(&self, session_id: &str, mutation: SessionMutation) -> Result<RideSession>;

    /// Hard-deletes a session. Deleting a missing session is not an error.
    async fn delete(&self, session_id: &str) -> Result<()>;
}
