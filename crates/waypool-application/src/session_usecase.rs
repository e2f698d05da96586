//! Session lifecycle controller.
//!
//! Orchestrates create/start/finish/cancel plus the low-level audit and
//! timeline operations. Every operation runs its guard checks in full before
//! issuing any write, and state preconditions are re-applied inside the
//! repository's serialized update closure so a stale guard read cannot slip
//! a second transition through.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use waypool_core::clock::Clock;
use waypool_core::error::{Result, WaypoolError};
use waypool_core::geo::GeoPoint;
use waypool_core::roles::RoleProvider;
use waypool_core::session::model::event_type;
use waypool_core::session::{
    Decision, RideSession, SessionEvent, SessionGuard, SessionRepository, SessionStatus,
};

/// Lifecycle state machine for ride sessions:
/// `created → active → completed`, with `cancelled` reachable from
/// `created` or `active`.
pub struct SessionLifecycle {
    sessions: Arc<dyn SessionRepository>,
    guard: Arc<SessionGuard>,
    roles: Arc<dyn RoleProvider>,
    clock: Arc<dyn Clock>,
}

fn access_denied(decision: Decision) -> WaypoolError {
    WaypoolError::access_denied(decision.reason_or_default())
}

fn validation(decision: Decision) -> WaypoolError {
    WaypoolError::validation(decision.reason_or_default())
}

impl SessionLifecycle {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        guard: Arc<SessionGuard>,
        roles: Arc<dyn RoleProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            guard,
            roles,
            clock,
        }
    }

    /// Creates a session for a ride: one atomic insert of the full document
    /// (progress records with fresh pickup codes included), then a
    /// `rideCreated` audit event carrying the actual creation location.
    ///
    /// The location is a safety-critical input, not optional metadata.
    pub async fn create(
        &self,
        user_id: &str,
        ride_id: &str,
        driver_id: &str,
        riders: Vec<String>,
        location: GeoPoint,
    ) -> Result<String> {
        if !location.is_valid() {
            return Err(WaypoolError::validation(
                "Valid location coordinates are required",
            ));
        }

        let decision = self
            .guard
            .can_create(user_id, ride_id, driver_id, &riders)
            .await?;
        if !decision.allowed {
            return Err(access_denied(decision));
        }

        let now = self.clock.now();
        let session_id = Uuid::new_v4().to_string();
        let session = RideSession::new(&session_id, ride_id, driver_id, riders, user_id, now);

        // The store enforces one-session-per-ride; a lost race surfaces
        // as a conflict here rather than a duplicate document.
        self.sessions.insert(session).await?;

        let event = SessionEvent {
            location,
            time: now,
            by: user_id.to_string(),
            rider_id: None,
            reason: None,
        };
        self.sessions
            .update(
                &session_id,
                Box::new(move |session| {
                    session.push_event(event_type::RIDE_CREATED, event);
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(session_id = %session_id, ride_id, "ride session created");
        Ok(session_id)
    }

    /// Transitions `created → active` and stamps `timeline.started`.
    pub async fn start(&self, user_id: &str, session_id: &str, location: GeoPoint) -> Result<bool> {
        if !location.is_valid() {
            return Err(WaypoolError::validation(
                "Valid location coordinates are required",
            ));
        }

        let decision = self.guard.can_start(user_id, session_id).await?;
        if !decision.allowed {
            return Err(access_denied(decision));
        }
        self.check_time_window(session_id).await?;

        let now = self.clock.now();
        let by = user_id.to_string();
        self.sessions
            .update(
                session_id,
                Box::new(move |session| {
                    if session.status != SessionStatus::Created
                        || session.timeline.started.is_some()
                    {
                        return Err(WaypoolError::validation(format!(
                            "Cannot start session with status: {}",
                            session.status
                        )));
                    }
                    session.status = SessionStatus::Active;
                    session.timeline.started = Some(now);
                    session.push_event(
                        event_type::RIDE_STARTED,
                        SessionEvent {
                            location,
                            time: now,
                            by,
                            rider_id: None,
                            reason: None,
                        },
                    );
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(session_id, "ride session started");
        Ok(true)
    }

    /// Transitions `active → completed`. Blocked while any rider remains in
    /// the active set.
    pub async fn finish(
        &self,
        user_id: &str,
        session_id: &str,
        location: GeoPoint,
    ) -> Result<bool> {
        if !location.is_valid() {
            return Err(WaypoolError::validation(
                "Valid location coordinates are required",
            ));
        }

        let decision = self.guard.can_finish(user_id, session_id).await?;
        if !decision.allowed {
            for warning in &decision.warnings {
                tracing::warn!(session_id, %warning, "finish rejected");
            }
            return Err(access_denied(decision));
        }
        self.check_time_window(session_id).await?;

        let now = self.clock.now();
        let by = user_id.to_string();
        self.sessions
            .update(
                session_id,
                Box::new(move |session| {
                    if session.finished {
                        return Err(WaypoolError::validation("Session is already finished"));
                    }
                    if session.status != SessionStatus::Active {
                        return Err(WaypoolError::validation(format!(
                            "Cannot finish session with status: {}",
                            session.status
                        )));
                    }
                    if !session.active_riders.is_empty() {
                        return Err(WaypoolError::validation(
                            "Cannot finish session while riders are still active",
                        ));
                    }
                    session.status = SessionStatus::Completed;
                    session.finished = true;
                    session.timeline.ended = Some(now);
                    session.push_event(
                        event_type::RIDE_COMPLETED,
                        SessionEvent {
                            location,
                            time: now,
                            by,
                            rider_id: None,
                            reason: None,
                        },
                    );
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(session_id, "ride session completed");
        Ok(true)
    }

    /// Transitions `created|active → cancelled`. A non-empty reason is
    /// mandatory and is recorded on the audit event.
    pub async fn cancel(
        &self,
        user_id: &str,
        session_id: &str,
        reason: &str,
        location: GeoPoint,
    ) -> Result<bool> {
        if !location.is_valid() {
            return Err(WaypoolError::validation(
                "Valid location coordinates are required",
            ));
        }

        let decision = self.guard.can_cancel(user_id, session_id, reason).await?;
        if !decision.allowed {
            return Err(access_denied(decision));
        }
        self.check_time_window(session_id).await?;

        let now = self.clock.now();
        let by = user_id.to_string();
        let reason = reason.to_string();
        self.sessions
            .update(
                session_id,
                Box::new(move |session| {
                    if session.status.is_terminal() {
                        return Err(WaypoolError::validation(format!(
                            "Cannot cancel session with status: {}",
                            session.status
                        )));
                    }
                    session.status = SessionStatus::Cancelled;
                    session.finished = true;
                    session.timeline.ended = Some(now);
                    session.push_event(
                        event_type::RIDE_CANCELLED,
                        SessionEvent {
                            location,
                            time: now,
                            by,
                            rider_id: None,
                            reason: Some(reason),
                        },
                    );
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(session_id, "ride session cancelled");
        Ok(true)
    }

    /// Low-level audit append, independently callable by any participant
    /// (driver, rider, or admin) of the session.
    pub async fn log_event(
        &self,
        user_id: &str,
        session_id: &str,
        kind: &str,
        location: GeoPoint,
        rider_id: Option<String>,
        reason: Option<String>,
    ) -> Result<bool> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| WaypoolError::not_found("session", session_id))?;

        if !session.is_participant(user_id) && !self.roles.is_admin(user_id).await {
            return Err(WaypoolError::access_denied(
                "You don't have permission to log events for this session",
            ));
        }
        self.check_time_window(session_id).await?;

        let event = SessionEvent {
            location,
            time: self.clock.now(),
            by: user_id.to_string(),
            rider_id,
            reason,
        };
        let kind = kind.to_string();
        self.sessions
            .update(
                session_id,
                Box::new(move |session| {
                    session.push_event(&kind, event);
                    Ok(())
                }),
            )
            .await?;
        Ok(true)
    }

    /// Stamps `timeline.arrived`. Driver or admin only.
    pub async fn update_timeline(
        &self,
        user_id: &str,
        session_id: &str,
        arrived: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let decision = self.guard.can_modify(user_id, session_id).await?;
        if !decision.allowed {
            return Err(access_denied(decision));
        }
        self.check_time_window(session_id).await?;

        self.sessions
            .update(
                session_id,
                Box::new(move |session| {
                    if let Some(arrived) = arrived {
                        session.timeline.arrived = Some(arrived);
                    }
                    Ok(())
                }),
            )
            .await?;
        Ok(true)
    }

    /// Hard delete, with no cascading effects. Restricted to system
    /// administrators, stricter than every other operation.
    pub async fn remove(&self, user_id: &str, session_id: &str) -> Result<bool> {
        if !self.roles.is_system_admin(user_id).await {
            return Err(WaypoolError::access_denied(
                "You must be a system administrator to delete ride sessions",
            ));
        }

        self.sessions.delete(session_id).await?;
        tracing::info!(session_id, "ride session removed");
        Ok(true)
    }

    async fn check_time_window(&self, session_id: &str) -> Result<()> {
        let decision = self.guard.validate_time_constraints(session_id).await?;
        if !decision.allowed {
            return Err(validation(decision));
        }
        Ok(())
    }
}
