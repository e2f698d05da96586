//! In-memory session store.
//!
//! Documents live behind a per-session `tokio::sync::Mutex`, so every
//! mutation applied through [`SessionRepository::update`] runs serialized
//! against other writers of the same session. This closes the check-then-act
//! race on progress flags: preconditions re-checked inside the mutation
//! closure hold for the duration of the write.
//!
//! One-session-per-ride is a real uniqueness constraint here, enforced under
//! the store's write lock at insert time.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use waypool_core::error::{Result, WaypoolError};
use waypool_core::session::repository::SessionMutation;
use waypool_core::session::{RideSession, SessionRepository, SessionStatus};

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Arc<Mutex<RideSession>>>,
    /// ride_id -> session_id uniqueness index
    by_ride: HashMap<String, String>,
}

/// In-memory, concurrency-hardened [`SessionRepository`].
#[derive(Default)]
pub struct MemorySessionRepository {
    inner: RwLock<Inner>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle(&self, session_id: &str) -> Option<Arc<Mutex<RideSession>>> {
        self.inner.read().await.sessions.get(session_id).cloned()
    }

    async fn snapshot_where<F>(&self, keep: F) -> Vec<RideSession>
    where
        F: Fn(&RideSession) -> bool,
    {
        let handles: Vec<_> = {
            let inner = self.inner.read().await;
            inner.sessions.values().cloned().collect()
        };

        let mut out = Vec::new();
        for handle in handles {
            let session = handle.lock().await;
            if keep(&session) {
                out.push(session.clone());
            }
        }
        out
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(&self, session: RideSession) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.by_ride.contains_key(&session.ride_id) {
            return Err(WaypoolError::conflict(
                "A session already exists for this ride",
            ));
        }
        if inner.sessions.contains_key(&session.id) {
            return Err(WaypoolError::conflict("Session ID is already in use"));
        }

        tracing::debug!(session_id = %session.id, ride_id = %session.ride_id, "storing new ride session");
        inner
            .by_ride
            .insert(session.ride_id.clone(), session.id.clone());
        inner
            .sessions
            .insert(session.id.clone(), Arc::new(Mutex::new(session)));
        Ok(())
    }

    async fn find_by_id(&self, session_id: &str) -> Result<Option<RideSession>> {
        match self.handle(session_id).await {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn find_by_ride_id(&self, ride_id: &str) -> Result<Option<RideSession>> {
        let session_id = {
            let inner = self.inner.read().await;
            inner.by_ride.get(ride_id).cloned()
        };
        match session_id {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn find_by_driver(&self, driver_id: &str) -> Result<Vec<RideSession>> {
        Ok(self.snapshot_where(|s| s.driver_id == driver_id).await)
    }

    async fn find_by_rider(&self, rider_id: &str) -> Result<Vec<RideSession>> {
        Ok(self.snapshot_where(|s| s.has_rider(rider_id)).await)
    }

    async fn find_by_status(&self, status: SessionStatus) -> Result<Vec<RideSession>> {
        Ok(self.snapshot_where(|s| s.status == status).await)
    }

    async fn find_sweepable(&self) -> Result<Vec<RideSession>> {
        Ok(self
            .snapshot_where(|s| {
                s.status == SessionStatus::Active && !s.finished && !s.live_locations.is_empty()
            })
            .await)
    }

    async fn update(&self, session_id: &str, mutation: SessionMutation) -> Result<RideSession> {
        let handle = self
            .handle(session_id)
            .await
            .ok_or_else(|| WaypoolError::not_found("session", session_id))?;

        let mut session = handle.lock().await;
        // Mutate a working copy so a rejected mutation persists nothing.
        let mut updated = session.clone();
        mutation(&mut updated)?;
        *session = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(handle) = inner.sessions.remove(session_id) {
            let ride_id = handle.lock().await.ride_id.clone();
            inner.by_ride.remove(&ride_id);
            tracing::debug!(session_id, "deleted ride session");
        }
        Ok(())
    }
}
