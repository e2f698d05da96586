//! Error types for the Waypool ride session engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole engine.
///
/// Every caller-visible failure carries a stable kind (see [`WaypoolError::kind`])
/// plus a human-readable reason written as a complete sentence, suitable for
/// direct display.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum WaypoolError {
    /// Entity not found error with type information
    #[error("{entity_type} not found: '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The guard rejected the caller for this operation
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Malformed or missing required input, or an illegal state transition
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Submitted pickup code digits did not match
    #[error("Pickup code does not match. {attempts_remaining} attempts remaining.")]
    CodeMismatch { attempts_remaining: u32 },

    /// The rider's code verification is permanently locked after repeated failures
    #[error("Pickup code verification is locked for this rider after too many failed attempts.")]
    CodeLockedOut,

    /// The rider has already been picked up in this session
    #[error("Rider has already been picked up")]
    AlreadyPickedUp,

    /// A uniqueness constraint was violated (e.g. one session per ride)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WaypoolError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an AccessDenied error
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied(reason.into())
    }

    /// Creates a Validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an AccessDenied error
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }

    /// Check if this is a Validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a verification failure (mismatch or lockout).
    ///
    /// The lockout latch is a distinct variant so that clients can stop
    /// prompting for retries, but both share the `verification-failed` kind.
    pub fn is_verification_failed(&self) -> bool {
        matches!(self, Self::CodeMismatch { .. } | Self::CodeLockedOut)
    }

    /// Check if this is a Conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Stable machine-readable kind for transport layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not-found",
            Self::AccessDenied(_) => "access-denied",
            Self::Validation(_) => "validation-error",
            Self::CodeMismatch { .. } | Self::CodeLockedOut => "verification-failed",
            Self::AlreadyPickedUp => "already-picked-up",
            Self::Conflict(_) => "conflict",
            Self::DataAccess(_) => "data-access",
            Self::Internal(_) => "internal",
        }
    }
}

/// Conversion from anyhow::Error at application seams
impl From<anyhow::Error> for WaypoolError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, WaypoolError>`.
pub type Result<T> = std::result::Result<T, WaypoolError>;
