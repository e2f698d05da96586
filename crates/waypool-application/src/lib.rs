//! Use-case layer for the Waypool session engine.
//!
//! Wires the domain guard and repository into the four caller-facing
//! components: the lifecycle controller, the pickup verification engine,
//! the live location tracker, and the stale-location sweeper.

pub mod session_usecase;
pub mod sweeper;
pub mod tracker;
pub mod verification;

pub use session_usecase::SessionLifecycle;
pub use sweeper::{StaleLocationSweeper, SweeperHandle};
pub use tracker::LiveLocationTracker;
pub use verification::{CodeDisclosure, PickupVerification, VerificationOutcome};
