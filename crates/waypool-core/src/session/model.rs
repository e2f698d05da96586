//! Ride session domain model.
//!
//! `RideSession` is the aggregate root tracking one ride's execution from
//! creation through per-rider pickup and drop-off to completion or
//! cancellation. Serialized field names follow the persisted document shape
//! (camelCase).

use super::code;
use crate::geo::{GeoPoint, LocationPing};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Lifecycle state of a session.
///
/// Transitions are `created → active → completed`, with `cancelled`
/// reachable from `created` or `active`. `completed` and `cancelled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Per-rider pickup/drop-off progress.
///
/// Invariants: `dropped_off` implies `picked_up`; once `code_error` is set
/// it never reverts, and it is only set when `code_attempts` has reached the
/// policy's attempt limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderProgress {
    pub picked_up: bool,
    pub dropped_off: bool,
    pub pickup_time: Option<DateTime<Utc>>,
    pub dropoff_time: Option<DateTime<Utc>>,
    /// Private 4-digit pickup code, fixed for the session.
    pub code: String,
    /// Failed verification attempts so far; monotonically non-decreasing.
    pub code_attempts: u32,
    /// One-way lockout latch.
    pub code_error: bool,
}

impl RiderProgress {
    fn new(code: String) -> Self {
        Self {
            picked_up: false,
            dropped_off: false,
            pickup_time: None,
            dropoff_time: None,
            code,
            code_attempts: 0,
            code_error: false,
        }
    }
}

/// Session milestones. `created` is set at construction; the rest are filled
/// at most once by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub arrived: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
}

impl Timeline {
    fn new(created: DateTime<Utc>) -> Self {
        Self {
            created,
            started: None,
            arrived: None,
            ended: None,
        }
    }
}

/// Audit event types appended by the lifecycle controller and the
/// verification engine.
pub mod event_type {
    pub const RIDE_CREATED: &str = "rideCreated";
    pub const RIDE_STARTED: &str = "rideStarted";
    pub const RIDE_COMPLETED: &str = "rideCompleted";
    pub const RIDE_CANCELLED: &str = "rideCancelled";
    pub const RIDER_PICKED_UP: &str = "riderPickedUp";
    pub const RIDER_DROPPED_OFF: &str = "riderDroppedOff";
}

/// One audit-trail entry. Appended under a key combining the event type and
/// a high-resolution timestamp; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub location: GeoPoint,
    pub time: DateTime<Utc>,
    /// User ID of the actor who caused the event.
    pub by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The aggregate root: one tracked execution of a ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideSession {
    pub id: String,
    pub ride_id: String,
    pub driver_id: String,
    /// Rider IDs, fixed at creation.
    pub riders: Vec<String>,
    /// Riders not yet dropped off; always a subset of `riders`.
    pub active_riders: Vec<String>,
    /// Exactly one entry per rider in `riders`; keys never change.
    pub progress: HashMap<String, RiderProgress>,
    /// True iff `status` is terminal.
    pub finished: bool,
    pub timeline: Timeline,
    /// Append-only audit trail, keyed `{eventType}_{nanos}`.
    pub events: BTreeMap<String, SessionEvent>,
    /// Most-recent ping per participant; entries may be evicted by the sweep.
    #[serde(default)]
    pub live_locations: HashMap<String, LocationPing>,
    pub created_by: String,
    pub status: SessionStatus,
}

impl RideSession {
    /// Builds the full initial document for a new session, including a
    /// freshly generated pickup code per rider.
    pub fn new(
        id: impl Into<String>,
        ride_id: impl Into<String>,
        driver_id: impl Into<String>,
        riders: Vec<String>,
        created_by: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        let progress = riders
            .iter()
            .map(|rider_id| (rider_id.clone(), RiderProgress::new(code::generate())))
            .collect();

        Self {
            id: id.into(),
            ride_id: ride_id.into(),
            driver_id: driver_id.into(),
            active_riders: riders.clone(),
            riders,
            progress,
            finished: false,
            timeline: Timeline::new(created),
            events: BTreeMap::new(),
            live_locations: HashMap::new(),
            created_by: created_by.into(),
            status: SessionStatus::Created,
        }
    }

    pub fn is_driver(&self, user_id: &str) -> bool {
        self.driver_id == user_id
    }

    pub fn has_rider(&self, rider_id: &str) -> bool {
        self.riders.iter().any(|r| r == rider_id)
    }

    /// Driver or rider of this session.
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.is_driver(user_id) || self.has_rider(user_id)
    }

    pub fn progress_for(&self, rider_id: &str) -> Option<&RiderProgress> {
        self.progress.get(rider_id)
    }

    /// Appends an audit event under a `{eventType}_{nanos}` key. The
    /// nanosecond component keeps keys unique without a counter.
    pub fn push_event(&mut self, event_type: &str, event: SessionEvent) {
        let nanos = event.time.timestamp_nanos_opt().unwrap_or_default();
        self.events.insert(format!("{event_type}_{nanos}"), event);
    }

    /// Removes a rider from the active set (after drop-off).
    pub fn retire_rider(&mut self, rider_id: &str) {
        self.active_riders.retain(|r| r != rider_id);
    }
}
