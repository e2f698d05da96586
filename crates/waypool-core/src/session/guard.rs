//! Access control guard for ride session operations.
//!
//! Every check answers "is this action allowed from this state, by this
//! actor, given these prior facts?" and returns a [`Decision`] rather than an
//! error, so callers can decide how a rejection surfaces. Checks re-fetch the
//! session by ID on every call; nothing here acts on cached state.
//!
//! Actor authorization ("is this the driver?") and state legality ("is the
//! rider already picked up?") are split into separate checks so the
//! controller can compose them and tests can target each in isolation.

use super::model::{RideSession, SessionStatus};
use super::repository::SessionRepository;
use crate::clock::Clock;
use crate::config::SafetyPolicy;
use crate::error::Result;
use crate::geo::GeoPoint;
use crate::ride::RideDirectory;
use crate::roles::RoleProvider;
use std::sync::Arc;

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub warnings: Vec<String>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            warnings: Vec::new(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            warnings: Vec::new(),
        }
    }

    pub fn deny_with_warnings(reason: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            warnings,
        }
    }

    /// The rejection reason, or a generic fallback for a denied decision
    /// that carried none.
    pub fn reason_or_default(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| "Action is not allowed".to_string())
    }
}

/// Which half of the rider journey an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiderAction {
    Pickup,
    Dropoff,
}

/// Stateless predicate checks for every session operation.
pub struct SessionGuard {
    sessions: Arc<dyn SessionRepository>,
    roles: Arc<dyn RoleProvider>,
    rides: Arc<dyn RideDirectory>,
    clock: Arc<dyn Clock>,
    policy: SafetyPolicy,
}

impl SessionGuard {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        roles: Arc<dyn RoleProvider>,
        rides: Arc<dyn RideDirectory>,
        clock: Arc<dyn Clock>,
        policy: SafetyPolicy,
    ) -> Self {
        Self {
            sessions,
            roles,
            rides,
            clock,
            policy,
        }
    }

    fn authenticated(user_id: &str) -> bool {
        !user_id.trim().is_empty()
    }

    async fn fetch(&self, session_id: &str) -> Result<std::result::Result<RideSession, Decision>> {
        match self.sessions.find_by_id(session_id).await? {
            Some(session) => Ok(Ok(session)),
            None => Ok(Err(Decision::deny("Session not found"))),
        }
    }

    /// Driver of this session, or an admin.
    async fn driver_or_admin(&self, session: &RideSession, user_id: &str) -> bool {
        session.is_driver(user_id) || self.roles.is_admin(user_id).await
    }

    // ============================================================================
    // Session creation & lifecycle
    // ============================================================================

    /// May `user_id` create a session for `ride_id` with these riders?
    pub async fn can_create(
        &self,
        user_id: &str,
        ride_id: &str,
        driver_id: &str,
        riders: &[String],
    ) -> Result<Decision> {
        if !Self::authenticated(user_id) {
            return Ok(Decision::deny("User not authenticated"));
        }

        let Some(ride) = self.rides.find_ride(ride_id).await? else {
            return Ok(Decision::deny("Ride not found"));
        };

        let is_driver = ride.driver_id == user_id || driver_id == user_id;
        if !is_driver && !self.roles.is_admin(user_id).await {
            return Ok(Decision::deny(
                "Only the driver or admin can create a ride session",
            ));
        }

        // One session per ride. The storage layer enforces this for real at
        // insert time; this pre-check exists to give a readable reason.
        if self.sessions.find_by_ride_id(ride_id).await?.is_some() {
            return Ok(Decision::deny("A session already exists for this ride"));
        }

        let all_on_ride = riders.iter().all(|r| ride.rider_ids.contains(r));
        if !all_on_ride {
            return Ok(Decision::deny(
                "Some riders are not part of the original ride",
            ));
        }

        Ok(Decision::allow())
    }

    /// May `user_id` start this session?
    pub async fn can_start(&self, user_id: &str, session_id: &str) -> Result<Decision> {
        if !Self::authenticated(user_id) {
            return Ok(Decision::deny("User not authenticated"));
        }
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        if !self.driver_or_admin(&session, user_id).await {
            return Ok(Decision::deny(
                "Only the driver or admin can start the session",
            ));
        }

        if session.status != SessionStatus::Created {
            return Ok(Decision::deny(format!(
                "Cannot start session with status: {}",
                session.status
            )));
        }

        if session.timeline.started.is_some() {
            return Ok(Decision::deny("Session has already been started"));
        }

        Ok(Decision::allow())
    }

    /// May `user_id` finish this session? Rejected with a warning naming the
    /// count of riders still active.
    pub async fn can_finish(&self, user_id: &str, session_id: &str) -> Result<Decision> {
        if !Self::authenticated(user_id) {
            return Ok(Decision::deny("User not authenticated"));
        }
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        if !self.driver_or_admin(&session, user_id).await {
            return Ok(Decision::deny(
                "Only the driver or admin can finish the session",
            ));
        }

        if session.finished {
            return Ok(Decision::deny("Session is already finished"));
        }

        if session.status != SessionStatus::Active {
            return Ok(Decision::deny(format!(
                "Cannot finish session with status: {}",
                session.status
            )));
        }

        let still_active = session.active_riders.len();
        if still_active > 0 {
            return Ok(Decision::deny_with_warnings(
                "Cannot finish session while riders are still active",
                vec![format!(
                    "{still_active} riders still need to be dropped off"
                )],
            ));
        }

        Ok(Decision::allow())
    }

    /// May `user_id` cancel this session for `reason`?
    pub async fn can_cancel(
        &self,
        user_id: &str,
        session_id: &str,
        reason: &str,
    ) -> Result<Decision> {
        if !Self::authenticated(user_id) {
            return Ok(Decision::deny("User not authenticated"));
        }
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        if !self.driver_or_admin(&session, user_id).await {
            return Ok(Decision::deny(
                "Only the driver or admin can cancel the session",
            ));
        }

        if session.status.is_terminal() {
            return Ok(Decision::deny(format!(
                "Cannot cancel session with status: {}",
                session.status
            )));
        }

        if reason.trim().is_empty() {
            return Ok(Decision::deny("Cancellation reason is required"));
        }

        Ok(Decision::allow())
    }

    // ============================================================================
    // Rider management
    // ============================================================================

    /// May `user_id` pick up `rider_id` at `location`?
    pub async fn can_pickup(
        &self,
        user_id: &str,
        session_id: &str,
        rider_id: &str,
        location: Option<&GeoPoint>,
    ) -> Result<Decision> {
        if !Self::authenticated(user_id) {
            return Ok(Decision::deny("User not authenticated"));
        }
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        if !self.driver_or_admin(&session, user_id).await {
            return Ok(Decision::deny("Only the driver or admin can pickup riders"));
        }

        if !session.has_rider(rider_id) {
            return Ok(Decision::deny("Rider is not part of this session"));
        }

        if session
            .progress_for(rider_id)
            .is_some_and(|p| p.picked_up)
        {
            return Ok(Decision::deny("Rider has already been picked up"));
        }

        if session.status != SessionStatus::Active {
            return Ok(Decision::deny("Session must be active to pickup riders"));
        }

        if !location.is_some_and(GeoPoint::is_valid) {
            return Ok(Decision::deny("Valid location coordinates are required"));
        }

        Ok(Decision::allow())
    }

    /// May `user_id` drop off `rider_id` at `location`?
    pub async fn can_dropoff(
        &self,
        user_id: &str,
        session_id: &str,
        rider_id: &str,
        location: Option<&GeoPoint>,
    ) -> Result<Decision> {
        if !Self::authenticated(user_id) {
            return Ok(Decision::deny("User not authenticated"));
        }
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        if !self.driver_or_admin(&session, user_id).await {
            return Ok(Decision::deny(
                "Only the driver or admin can dropoff riders",
            ));
        }

        if !session.has_rider(rider_id) {
            return Ok(Decision::deny("Rider is not part of this session"));
        }

        let progress = session.progress_for(rider_id);
        if !progress.is_some_and(|p| p.picked_up) {
            return Ok(Decision::deny(
                "Rider must be picked up before being dropped off",
            ));
        }
        if progress.is_some_and(|p| p.dropped_off) {
            return Ok(Decision::deny("Rider has already been dropped off"));
        }

        if !location.is_some_and(GeoPoint::is_valid) {
            return Ok(Decision::deny("Valid location coordinates are required"));
        }

        Ok(Decision::allow())
    }

    // ============================================================================
    // Access control
    // ============================================================================

    /// May `user_id` view this session? Driver, any rider, or an admin.
    pub async fn can_view(&self, user_id: &str, session_id: &str) -> Result<Decision> {
        if !Self::authenticated(user_id) {
            return Ok(Decision::deny("User not authenticated"));
        }
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        if !session.is_participant(user_id) && !self.roles.is_admin(user_id).await {
            return Ok(Decision::deny(
                "You don't have permission to view this session",
            ));
        }

        Ok(Decision::allow())
    }

    /// May `user_id` modify this session (generic mutating access)?
    pub async fn can_modify(&self, user_id: &str, session_id: &str) -> Result<Decision> {
        if !Self::authenticated(user_id) {
            return Ok(Decision::deny("User not authenticated"));
        }
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        if !self.driver_or_admin(&session, user_id).await {
            return Ok(Decision::deny(
                "Only the driver or admin can modify the session",
            ));
        }

        Ok(Decision::allow())
    }

    // ============================================================================
    // Safety checks (actor-independent)
    // ============================================================================

    /// Second gate before mutating rider progress: pickup/drop-off ordering,
    /// regardless of who asks.
    pub async fn validate_rider_sequence(
        &self,
        session_id: &str,
        rider_id: &str,
        action: RiderAction,
    ) -> Result<Decision> {
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        let progress = session.progress_for(rider_id);

        match action {
            RiderAction::Pickup => {
                if progress.is_some_and(|p| p.picked_up) {
                    return Ok(Decision::deny("Rider is already picked up"));
                }
                if progress.is_some_and(|p| p.dropped_off) {
                    return Ok(Decision::deny(
                        "Cannot pickup a rider who has been dropped off",
                    ));
                }
            }
            RiderAction::Dropoff => {
                if !progress.is_some_and(|p| p.picked_up) {
                    return Ok(Decision::deny("Rider must be picked up before dropoff"));
                }
                if progress.is_some_and(|p| p.dropped_off) {
                    return Ok(Decision::deny("Rider is already dropped off"));
                }
            }
        }

        Ok(Decision::allow())
    }

    /// Requires the session to be in exactly `required` status.
    pub async fn validate_session_state(
        &self,
        session_id: &str,
        required: SessionStatus,
    ) -> Result<Decision> {
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        if session.status != required {
            return Ok(Decision::deny(format!(
                "Session must be in '{}' state, currently '{}'",
                required, session.status
            )));
        }

        Ok(Decision::allow())
    }

    /// Rejects any mutating action once the session is older than the policy
    /// window (24 hours by default). Sessions are not auto-cancelled; they
    /// simply stop being mutable.
    pub async fn validate_time_constraints(&self, session_id: &str) -> Result<Decision> {
        let session = match self.fetch(session_id).await? {
            Ok(s) => s,
            Err(decision) => return Ok(decision),
        };

        let age = self.clock.now() - session.timeline.created;
        if age > self.policy.max_session_age() {
            return Ok(Decision::deny(
                "Session is too old for this action. Sessions expire after 24 hours.",
            ));
        }

        Ok(Decision::allow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::WaypoolError;
    use crate::ride::RideInfo;
    use crate::session::repository::SessionMutation;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    // Mock SessionRepository for testing
    struct MockSessionRepository {
        sessions: Mutex<HashMap<String, RideSession>>,
    }

    impl MockSessionRepository {
        fn new() -> Self {
            Self {
                sessions: Mutex::new(HashMap::new()),
            }
        }

        fn with(session: RideSession) -> Self {
            let repo = Self::new();
            repo.sessions
                .lock()
                .unwrap()
                .insert(session.id.clone(), session);
            repo
        }
    }

    #[async_trait]
    impl SessionRepository for MockSessionRepository {
        async fn insert(&self, session: RideSession) -> crate::error::Result<()> {
            let mut sessions = self.sessions.lock().unwrap();
            if sessions.values().any(|s| s.ride_id == session.ride_id) {
                return Err(WaypoolError::conflict("duplicate ride"));
            }
            sessions.insert(session.id.clone(), session);
            Ok(())
        }

        async fn find_by_id(&self, session_id: &str) -> crate::error::Result<Option<RideSession>> {
            Ok(self.sessions.lock().unwrap().get(session_id).cloned())
        }

        async fn find_by_ride_id(&self, ride_id: &str) -> crate::error::Result<Option<RideSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .find(|s| s.ride_id == ride_id)
                .cloned())
        }

        async fn find_by_driver(&self, driver_id: &str) -> crate::error::Result<Vec<RideSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.driver_id == driver_id)
                .cloned()
                .collect())
        }

        async fn find_by_rider(&self, rider_id: &str) -> crate::error::Result<Vec<RideSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.has_rider(rider_id))
                .cloned()
                .collect())
        }

        async fn find_by_status(
            &self,
            status: SessionStatus,
        ) -> crate::error::Result<Vec<RideSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.status == status)
                .cloned()
                .collect())
        }

        async fn find_sweepable(&self) -> crate::error::Result<Vec<RideSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .values()
                .filter(|s| {
                    s.status == SessionStatus::Active
                        && !s.finished
                        && !s.live_locations.is_empty()
                })
                .cloned()
                .collect())
        }

        async fn update(
            &self,
            session_id: &str,
            mutation: SessionMutation,
        ) -> crate::error::Result<RideSession> {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| WaypoolError::not_found("session", session_id))?;
            let mut updated = session.clone();
            mutation(&mut updated)?;
            *session = updated.clone();
            Ok(updated)
        }

        async fn delete(&self, session_id: &str) -> crate::error::Result<()> {
            self.sessions.lock().unwrap().remove(session_id);
            Ok(())
        }
    }

    // Mock RoleProvider for testing
    struct MockRoleProvider {
        admins: HashSet<String>,
    }

    impl MockRoleProvider {
        fn none() -> Self {
            Self {
                admins: HashSet::new(),
            }
        }

        fn admin(user_id: &str) -> Self {
            Self {
                admins: HashSet::from([user_id.to_string()]),
            }
        }
    }

    #[async_trait]
    impl RoleProvider for MockRoleProvider {
        async fn is_admin(&self, user_id: &str) -> bool {
            self.admins.contains(user_id)
        }

        async fn is_system_admin(&self, _user_id: &str) -> bool {
            false
        }
    }

    // Mock RideDirectory for testing
    struct MockRideDirectory {
        rides: HashMap<String, RideInfo>,
    }

    impl MockRideDirectory {
        fn empty() -> Self {
            Self {
                rides: HashMap::new(),
            }
        }

        fn with(ride: RideInfo) -> Self {
            Self {
                rides: HashMap::from([(ride.id.clone(), ride)]),
            }
        }
    }

    #[async_trait]
    impl RideDirectory for MockRideDirectory {
        async fn find_ride(&self, ride_id: &str) -> crate::error::Result<Option<RideInfo>> {
            Ok(self.rides.get(ride_id).cloned())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    fn sample_ride() -> RideInfo {
        RideInfo {
            id: "R1".to_string(),
            driver_id: "driver-1".to_string(),
            rider_ids: vec!["a".to_string(), "b".to_string()],
        }
    }

    fn sample_session() -> RideSession {
        RideSession::new(
            "s1",
            "R1",
            "driver-1",
            vec!["a".to_string(), "b".to_string()],
            "driver-1",
            t0(),
        )
    }

    fn guard_with(
        repo: MockSessionRepository,
        roles: MockRoleProvider,
        rides: MockRideDirectory,
    ) -> SessionGuard {
        SessionGuard::new(
            Arc::new(repo),
            Arc::new(roles),
            Arc::new(rides),
            Arc::new(ManualClock::new(t0())),
            SafetyPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_create_requires_authentication() {
        let guard = guard_with(
            MockSessionRepository::new(),
            MockRoleProvider::none(),
            MockRideDirectory::with(sample_ride()),
        );
        let decision = guard.can_create("", "R1", "driver-1", &[]).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("User not authenticated"));
    }

    #[tokio::test]
    async fn test_create_requires_existing_ride() {
        let guard = guard_with(
            MockSessionRepository::new(),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard
            .can_create("driver-1", "R1", "driver-1", &[])
            .await
            .unwrap();
        assert_eq!(decision.reason.as_deref(), Some("Ride not found"));
    }

    #[tokio::test]
    async fn test_create_rejects_non_driver_non_admin() {
        let guard = guard_with(
            MockSessionRepository::new(),
            MockRoleProvider::none(),
            MockRideDirectory::with(sample_ride()),
        );
        let decision = guard
            .can_create("stranger", "R1", "driver-1", &[])
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Only the driver or admin can create a ride session")
        );
    }

    #[tokio::test]
    async fn test_create_allows_admin() {
        let guard = guard_with(
            MockSessionRepository::new(),
            MockRoleProvider::admin("admin-1"),
            MockRideDirectory::with(sample_ride()),
        );
        let decision = guard
            .can_create("admin-1", "R1", "driver-1", &["a".to_string()])
            .await
            .unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_session() {
        let guard = guard_with(
            MockSessionRepository::with(sample_session()),
            MockRoleProvider::none(),
            MockRideDirectory::with(sample_ride()),
        );
        let decision = guard
            .can_create("driver-1", "R1", "driver-1", &[])
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("A session already exists for this ride")
        );
    }

    #[tokio::test]
    async fn test_create_rejects_riders_not_on_ride() {
        let guard = guard_with(
            MockSessionRepository::new(),
            MockRoleProvider::none(),
            MockRideDirectory::with(sample_ride()),
        );
        let decision = guard
            .can_create(
                "driver-1",
                "R1",
                "driver-1",
                &["a".to_string(), "intruder".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Some riders are not part of the original ride")
        );
    }

    #[tokio::test]
    async fn test_start_only_from_created() {
        let mut session = sample_session();
        session.status = SessionStatus::Active;
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard.can_start("driver-1", "s1").await.unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Cannot start session with status: active")
        );
    }

    #[tokio::test]
    async fn test_start_rejects_double_start() {
        let mut session = sample_session();
        session.timeline.started = Some(t0());
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard.can_start("driver-1", "s1").await.unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Session has already been started")
        );
    }

    #[tokio::test]
    async fn test_finish_blocked_while_riders_active() {
        let mut session = sample_session();
        session.status = SessionStatus::Active;
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard.can_finish("driver-1", "s1").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(
            decision.warnings,
            vec!["2 riders still need to be dropped off".to_string()]
        );
    }

    #[tokio::test]
    async fn test_finish_allowed_when_all_dropped_off() {
        let mut session = sample_session();
        session.status = SessionStatus::Active;
        session.active_riders.clear();
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard.can_finish("driver-1", "s1").await.unwrap();
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn test_finish_requires_active_status() {
        // A created session with no riders has an empty active set, but it
        // still must be started before it can complete.
        let mut session = sample_session();
        session.riders.clear();
        session.active_riders.clear();
        session.progress.clear();
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard.can_finish("driver-1", "s1").await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Cannot finish session with status: created")
        );
    }

    #[tokio::test]
    async fn test_cancel_rejects_terminal_status() {
        let mut session = sample_session();
        session.status = SessionStatus::Completed;
        session.finished = true;
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard.can_cancel("driver-1", "s1", "late").await.unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Cannot cancel session with status: completed")
        );
    }

    #[tokio::test]
    async fn test_cancel_requires_reason() {
        let guard = guard_with(
            MockSessionRepository::with(sample_session()),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard.can_cancel("driver-1", "s1", "  ").await.unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Cancellation reason is required")
        );
    }

    #[tokio::test]
    async fn test_pickup_requires_active_session() {
        let guard = guard_with(
            MockSessionRepository::with(sample_session()),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard
            .can_pickup("driver-1", "s1", "a", Some(&GeoPoint::new(1.0, 2.0)))
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Session must be active to pickup riders")
        );
    }

    #[tokio::test]
    async fn test_pickup_requires_valid_location() {
        let mut session = sample_session();
        session.status = SessionStatus::Active;
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard
            .can_pickup("driver-1", "s1", "a", Some(&GeoPoint::new(91.0, 0.0)))
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Valid location coordinates are required")
        );

        let decision = guard.can_pickup("driver-1", "s1", "a", None).await.unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_pickup_rejects_unknown_rider() {
        let mut session = sample_session();
        session.status = SessionStatus::Active;
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard
            .can_pickup("driver-1", "s1", "nobody", Some(&GeoPoint::new(1.0, 2.0)))
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Rider is not part of this session")
        );
    }

    #[tokio::test]
    async fn test_dropoff_requires_prior_pickup() {
        let mut session = sample_session();
        session.status = SessionStatus::Active;
        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard
            .can_dropoff("driver-1", "s1", "a", Some(&GeoPoint::new(1.0, 2.0)))
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Rider must be picked up before being dropped off")
        );
    }

    #[tokio::test]
    async fn test_view_limited_to_participants_and_admins() {
        let guard = guard_with(
            MockSessionRepository::with(sample_session()),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        assert!(guard.can_view("driver-1", "s1").await.unwrap().allowed);
        assert!(guard.can_view("a", "s1").await.unwrap().allowed);
        assert!(!guard.can_view("stranger", "s1").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_rider_sequence_gates() {
        let mut session = sample_session();
        session.progress.get_mut("a").unwrap().picked_up = true;
        let mut dropped = session.clone();
        dropped.progress.get_mut("a").unwrap().dropped_off = true;

        let guard = guard_with(
            MockSessionRepository::with(session),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard
            .validate_rider_sequence("s1", "a", RiderAction::Pickup)
            .await
            .unwrap();
        assert_eq!(decision.reason.as_deref(), Some("Rider is already picked up"));

        let decision = guard
            .validate_rider_sequence("s1", "a", RiderAction::Dropoff)
            .await
            .unwrap();
        assert!(decision.allowed);

        let guard = guard_with(
            MockSessionRepository::with(dropped),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard
            .validate_rider_sequence("s1", "a", RiderAction::Dropoff)
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Rider is already dropped off")
        );
    }

    #[tokio::test]
    async fn test_session_state_validation() {
        let guard = guard_with(
            MockSessionRepository::with(sample_session()),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard
            .validate_session_state("s1", SessionStatus::Active)
            .await
            .unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Session must be in 'active' state, currently 'created'")
        );
    }

    #[tokio::test]
    async fn test_time_window_expires_after_24_hours() {
        let clock = Arc::new(ManualClock::new(t0()));
        let guard = SessionGuard::new(
            Arc::new(MockSessionRepository::with(sample_session())),
            Arc::new(MockRoleProvider::none()),
            Arc::new(MockRideDirectory::empty()),
            clock.clone(),
            SafetyPolicy::default(),
        );

        clock.advance(chrono::Duration::hours(23));
        assert!(guard.validate_time_constraints("s1").await.unwrap().allowed);

        clock.advance(chrono::Duration::hours(2));
        let decision = guard.validate_time_constraints("s1").await.unwrap();
        assert_eq!(
            decision.reason.as_deref(),
            Some("Session is too old for this action. Sessions expire after 24 hours.")
        );
    }

    #[tokio::test]
    async fn test_checks_refetch_missing_session() {
        let guard = guard_with(
            MockSessionRepository::new(),
            MockRoleProvider::none(),
            MockRideDirectory::empty(),
        );
        let decision = guard.can_start("driver-1", "ghost").await.unwrap();
        assert_eq!(decision.reason.as_deref(), Some("Session not found"));
    }
}
