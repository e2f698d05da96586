//! Live location ingestion with anti-spoofing.
//!
//! GPS spoofing is the primary integrity threat for a safety-relevant
//! pickup/drop-off flow. The gate here is cheap and local: compare each ping
//! against the caller's previous one and reject physically impossible jumps.
//! The rejection is deliberately silent (`Ok(false)`, never an error) so a
//! single bad fix degrades gracefully instead of aborting a live tracking
//! stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use waypool_core::clock::Clock;
use waypool_core::config::SafetyPolicy;
use waypool_core::error::{Result, WaypoolError};
use waypool_core::geo::{GeoPoint, LocationPing};
use waypool_core::roles::RoleProvider;
use waypool_core::session::{SessionRepository, SessionStatus};

/// Ingests per-participant GPS pings into the session's live-location map.
pub struct LiveLocationTracker {
    sessions: Arc<dyn SessionRepository>,
    roles: Arc<dyn RoleProvider>,
    clock: Arc<dyn Clock>,
    policy: SafetyPolicy,
}

impl LiveLocationTracker {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        roles: Arc<dyn RoleProvider>,
        clock: Arc<dyn Clock>,
        policy: SafetyPolicy,
    ) -> Self {
        Self {
            sessions,
            roles,
            clock,
            policy,
        }
    }

    /// Stores the caller's current position.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Ping stored
    /// - `Ok(false)`: Ping silently rejected as physically implausible;
    ///   the previous entry is left untouched
    /// - `Err(_)`: Invalid input, unknown session, or the caller is not a
    ///   participant
    pub async fn update_live_location(
        &self,
        user_id: &str,
        session_id: &str,
        location: GeoPoint,
        accuracy: Option<f64>,
    ) -> Result<bool> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| WaypoolError::not_found("session", session_id))?;

        if !location.is_valid() {
            return Err(WaypoolError::validation(
                "Valid location coordinates are required",
            ));
        }

        if !session.is_participant(user_id) && !self.roles.is_admin(user_id).await {
            return Err(WaypoolError::access_denied(
                "You don't have permission to update live location for this session",
            ));
        }

        if session.status != SessionStatus::Active {
            return Err(WaypoolError::validation(
                "Session must be active to update live location",
            ));
        }

        let now = self.clock.now();
        let min_interval = self.policy.min_speed_check_interval();
        let max_speed = self.policy.max_plausible_speed_mps;
        let participant = user_id.to_string();
        let rejected = Arc::new(AtomicBool::new(false));
        let rejected_flag = rejected.clone();

        self.sessions
            .update(
                session_id,
                Box::new(move |session| {
                    if let Some(previous) = session.live_locations.get(&participant) {
                        let elapsed = now - previous.timestamp;
                        // Sub-second duplicates are sensor jitter, not
                        // spoofing evidence; anything at or beyond the
                        // interval is gated.
                        if elapsed >= min_interval {
                            let distance = previous.point().distance_m(&location);
                            let secs = elapsed.num_milliseconds() as f64 / 1000.0;
                            if distance / secs > max_speed {
                                rejected_flag.store(true, Ordering::SeqCst);
                                return Ok(());
                            }
                        }
                    }
                    session.live_locations.insert(
                        participant.clone(),
                        LocationPing {
                            lat: location.lat,
                            lng: location.lng,
                            timestamp: now,
                            accuracy,
                        },
                    );
                    Ok(())
                }),
            )
            .await?;

        if rejected.load(Ordering::SeqCst) {
            tracing::warn!(
                session_id,
                user_id,
                "rejected implausible location jump"
            );
            return Ok(false);
        }
        Ok(true)
    }
}
