//! Domain layer for the Waypool ride session engine.
//!
//! This crate holds the session aggregate, the access control guard, the
//! pickup code protocol, geo primitives, and the trait seams
//! (`SessionRepository`, `RoleProvider`, `RideDirectory`, `Clock`) that the
//! application and infrastructure crates plug into.

pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod ride;
pub mod roles;
pub mod session;

// Re-export common error type
pub use error::WaypoolError;
