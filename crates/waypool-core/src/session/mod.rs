//! Ride session domain: aggregate model, pickup codes, persistence trait,
//! and the access control guard.

pub mod code;
pub mod guard;
pub mod model;
pub mod repository;

pub use guard::{Decision, RiderAction, SessionGuard};
pub use model::{RideSession, RiderProgress, SessionEvent, SessionStatus, Timeline};
pub use repository::SessionRepository;
