//! Pickup verification engine.
//!
//! Lets a driver confirm that the physical person being picked up is the
//! intended rider without either party seeing the full secret up front: the
//! driver may request the first two digits as a hint, the rider proves
//! identity by supplying the last two. Five failed proofs trip a permanent
//! per-rider lockout latch.
//!
//! A code-less `pickup_rider` path exists for drivers and admins; both paths
//! converge on the same progress fields and are guarded against
//! double-application.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use waypool_core::clock::Clock;
use waypool_core::config::SafetyPolicy;
use waypool_core::error::{Result, WaypoolError};
use waypool_core::geo::GeoPoint;
use waypool_core::roles::RoleProvider;
use waypool_core::session::model::event_type;
use waypool_core::session::{
    code, Decision, RiderAction, RideSession, SessionEvent, SessionGuard, SessionRepository,
};

/// Result of a successful code verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub success: bool,
    pub message: String,
}

/// What a caller is allowed to learn about a rider's pickup code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeDisclosure {
    /// The driver sees only the first two digits, plus retry metadata.
    DriverHint {
        hint: String,
        attempts_remaining: u32,
        code_error: bool,
    },
    /// The rider themself, or an admin, sees the whole code.
    FullCode { code: String },
}

/// Pickup/drop-off operations with and without code verification.
pub struct PickupVerification {
    sessions: Arc<dyn SessionRepository>,
    guard: Arc<SessionGuard>,
    roles: Arc<dyn RoleProvider>,
    clock: Arc<dyn Clock>,
    policy: SafetyPolicy,
}

fn access_denied(decision: Decision) -> WaypoolError {
    WaypoolError::access_denied(decision.reason_or_default())
}

fn validation(decision: Decision) -> WaypoolError {
    WaypoolError::validation(decision.reason_or_default())
}

impl PickupVerification {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        guard: Arc<SessionGuard>,
        roles: Arc<dyn RoleProvider>,
        clock: Arc<dyn Clock>,
        policy: SafetyPolicy,
    ) -> Self {
        Self {
            sessions,
            guard,
            roles,
            clock,
            policy,
        }
    }

    async fn fetch(&self, session_id: &str) -> Result<RideSession> {
        self.sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| WaypoolError::not_found("session", session_id))
    }

    /// Verifies the rider-supplied trailing two digits and records the
    /// pickup on success.
    ///
    /// On mismatch the attempt counter is persisted even though an error is
    /// returned; at the policy limit the lockout latch trips and further
    /// verification for this rider is refused regardless of input.
    pub async fn verify_pickup_code(
        &self,
        user_id: &str,
        session_id: &str,
        rider_id: &str,
        last_two: &str,
        location: GeoPoint,
    ) -> Result<VerificationOutcome> {
        let session = self.fetch(session_id).await?;

        if !location.is_valid() {
            return Err(WaypoolError::validation(
                "Valid location coordinates are required",
            ));
        }

        let progress = session
            .progress_for(rider_id)
            .ok_or_else(|| WaypoolError::not_found("rider", rider_id))?;
        if progress.picked_up {
            return Err(WaypoolError::AlreadyPickedUp);
        }
        if progress.code_error {
            return Err(WaypoolError::CodeLockedOut);
        }

        let decision = self
            .guard
            .can_pickup(user_id, session_id, rider_id, Some(&location))
            .await?;
        if !decision.allowed {
            return Err(access_denied(decision));
        }
        self.check_time_window(session_id).await?;

        let max_attempts = self.policy.max_code_attempts;
        let now = self.clock.now();
        let by = user_id.to_string();
        let rider = rider_id.to_string();
        let proof = last_two.to_string();

        // The mismatch path must persist the attempt counter, so the
        // closure succeeds either way and the outcome is read back from the
        // updated document.
        let updated = self
            .sessions
            .update(
                session_id,
                Box::new(move |session| {
                    let progress = session
                        .progress
                        .get_mut(&rider)
                        .ok_or_else(|| WaypoolError::not_found("rider", rider.clone()))?;
                    if progress.picked_up {
                        return Err(WaypoolError::AlreadyPickedUp);
                    }
                    if progress.code_error {
                        return Err(WaypoolError::CodeLockedOut);
                    }

                    if code::proof_matches(&progress.code, &proof) {
                        progress.picked_up = true;
                        progress.pickup_time = Some(now);
                        session.push_event(
                            event_type::RIDER_PICKED_UP,
                            SessionEvent {
                                location,
                                time: now,
                                by,
                                rider_id: Some(rider.clone()),
                                reason: None,
                            },
                        );
                    } else {
                        progress.code_attempts += 1;
                        if progress.code_attempts >= max_attempts {
                            progress.code_error = true;
                        }
                    }
                    Ok(())
                }),
            )
            .await?;

        let progress = updated
            .progress_for(rider_id)
            .ok_or_else(|| WaypoolError::internal("rider progress vanished"))?;

        if progress.picked_up {
            tracing::info!(session_id, rider_id, "rider verified and picked up");
            return Ok(VerificationOutcome {
                success: true,
                message: "Rider verified and picked up".to_string(),
            });
        }

        if progress.code_error {
            tracing::warn!(session_id, rider_id, "pickup code locked out");
            return Err(WaypoolError::CodeLockedOut);
        }

        Err(WaypoolError::CodeMismatch {
            attempts_remaining: max_attempts.saturating_sub(progress.code_attempts),
        })
    }

    /// Differentiated code disclosure: the driver gets a hint, the rider
    /// themself or an admin gets the full code, anyone else is refused
    /// regardless of role claims.
    pub async fn code_hint(
        &self,
        user_id: &str,
        session_id: &str,
        rider_id: &str,
    ) -> Result<CodeDisclosure> {
        let session = self.fetch(session_id).await?;
        let progress = session
            .progress_for(rider_id)
            .ok_or_else(|| WaypoolError::not_found("rider", rider_id))?;

        if session.is_driver(user_id) {
            return Ok(CodeDisclosure::DriverHint {
                hint: code::hint(&progress.code).to_string(),
                attempts_remaining: self
                    .policy
                    .max_code_attempts
                    .saturating_sub(progress.code_attempts),
                code_error: progress.code_error,
            });
        }

        if user_id == rider_id || self.roles.is_admin(user_id).await {
            return Ok(CodeDisclosure::FullCode {
                code: progress.code.clone(),
            });
        }

        Err(WaypoolError::access_denied(
            "You don't have permission to view this pickup code",
        ))
    }

    /// Direct pickup without code verification, for drivers and admins.
    /// Passes through the guard, the sequence validator, and the time
    /// window; idempotence against an already-picked-up rider is re-checked
    /// inside the serialized update.
    pub async fn pickup_rider(
        &self,
        user_id: &str,
        session_id: &str,
        rider_id: &str,
        location: GeoPoint,
    ) -> Result<bool> {
        let session = self.fetch(session_id).await?;
        if session
            .progress_for(rider_id)
            .is_some_and(|p| p.picked_up)
        {
            return Err(WaypoolError::AlreadyPickedUp);
        }

        let decision = self
            .guard
            .can_pickup(user_id, session_id, rider_id, Some(&location))
            .await?;
        if !decision.allowed {
            return Err(access_denied(decision));
        }

        let decision = self
            .guard
            .validate_rider_sequence(session_id, rider_id, RiderAction::Pickup)
            .await?;
        if !decision.allowed {
            return Err(validation(decision));
        }
        self.check_time_window(session_id).await?;

        let now = self.clock.now();
        let by = user_id.to_string();
        let rider = rider_id.to_string();
        self.sessions
            .update(
                session_id,
                Box::new(move |session| {
                    let progress = session
                        .progress
                        .get_mut(&rider)
                        .ok_or_else(|| WaypoolError::not_found("rider", rider.clone()))?;
                    if progress.picked_up {
                        return Err(WaypoolError::AlreadyPickedUp);
                    }
                    if progress.dropped_off {
                        return Err(WaypoolError::validation(
                            "Cannot pickup a rider who has been dropped off",
                        ));
                    }
                    progress.picked_up = true;
                    progress.pickup_time = Some(now);
                    session.push_event(
                        event_type::RIDER_PICKED_UP,
                        SessionEvent {
                            location,
                            time: now,
                            by,
                            rider_id: Some(rider.clone()),
                            reason: None,
                        },
                    );
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(session_id, rider_id, "rider picked up");
        Ok(true)
    }

    /// Records a drop-off and retires the rider from the active set.
    pub async fn dropoff_rider(
        &self,
        user_id: &str,
        session_id: &str,
        rider_id: &str,
        location: GeoPoint,
    ) -> Result<bool> {
        let decision = self
            .guard
            .can_dropoff(user_id, session_id, rider_id, Some(&location))
            .await?;
        if !decision.allowed {
            return Err(access_denied(decision));
        }

        let decision = self
            .guard
            .validate_rider_sequence(session_id, rider_id, RiderAction::Dropoff)
            .await?;
        if !decision.allowed {
            return Err(validation(decision));
        }
        self.check_time_window(session_id).await?;

        let now = self.clock.now();
        let by = user_id.to_string();
        let rider = rider_id.to_string();
        self.sessions
            .update(
                session_id,
                Box::new(move |session| {
                    let progress = session
                        .progress
                        .get_mut(&rider)
                        .ok_or_else(|| WaypoolError::not_found("rider", rider.clone()))?;
                    if !progress.picked_up {
                        return Err(WaypoolError::validation(
                            "Rider must be picked up before dropoff",
                        ));
                    }
                    if progress.dropped_off {
                        return Err(WaypoolError::validation("Rider is already dropped off"));
                    }
                    progress.dropped_off = true;
                    progress.dropoff_time = Some(now);
                    session.retire_rider(&rider);
                    session.push_event(
                        event_type::RIDER_DROPPED_OFF,
                        SessionEvent {
                            location,
                            time: now,
                            by,
                            rider_id: Some(rider.clone()),
                            reason: None,
                        },
                    );
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(session_id, rider_id, "rider dropped off");
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
