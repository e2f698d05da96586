//! In-memory ride catalog.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use waypool_core::error::Result;
use waypool_core::ride::{RideDirectory, RideInfo};

/// A [`RideDirectory`] over an in-memory map, standing in for the external
/// ride catalog.
#[derive(Default)]
pub struct MemoryRideDirectory {
    rides: RwLock<HashMap<String, RideInfo>>,
}

impl MemoryRideDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a ride.
    pub async fn put_ride(&self, ride: RideInfo) {
        self.rides.write().await.insert(ride.id.clone(), ride);
    }
}

#[async_trait]
impl RideDirectory for MemoryRideDirectory {
    async fn find_ride(&self, ride_id: &str) -> Result<Option<RideInfo>> {
        Ok(self.rides.read().await.get(ride_id).cloned())
    }
}
