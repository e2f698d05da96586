//! Ride catalog lookup.
//!
//! The ride itself (seats, origin, destination, matching) is owned outside
//! this engine; session creation only needs to know that the ride exists,
//! who drives it, and who its riders are.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The slice of a ride the session engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideInfo {
    pub id: String,
    pub driver_id: String,
    pub rider_ids: Vec<String>,
}

/// Read-only access to the external ride catalog.
#[async_trait]
pub trait RideDirectory: Send + Sync {
    /// Finds a ride by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(RideInfo))`: Ride found
    /// - `Ok(None)`: Ride not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_ride(&self, ride_id: &str) -> Result<Option<RideInfo>>;
}
