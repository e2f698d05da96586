//! Safety policy configuration.
//!
//! All tunable thresholds of the engine live here so that the guard, the
//! verification engine, the tracker, and the sweeper share one injected
//! policy. Defaults carry the reference constants.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable thresholds for session safety checks.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SafetyPolicy {
    /// Mutating actions are rejected once a session is older than this.
    #[serde(default = "default_max_session_age_secs")]
    pub max_session_age_secs: u64,

    /// Failed code submissions before the per-rider lockout latch trips.
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,

    /// Implied speeds above this reject a live-location update (m/s).
    #[serde(default = "default_max_plausible_speed_mps")]
    pub max_plausible_speed_mps: f64,

    /// Pings closer together than this skip the speed check entirely,
    /// so sensor jitter on rapid duplicate updates cannot false-positive.
    #[serde(default = "default_min_speed_check_interval_secs")]
    pub min_speed_check_interval_secs: u64,

    /// How often the stale-location sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Live-location entries older than this are evicted by the sweep.
    #[serde(default = "default_stale_location_after_secs")]
    pub stale_location_after_secs: u64,
}

fn default_max_session_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_code_attempts() -> u32 {
    5
}

fn default_max_plausible_speed_mps() -> f64 {
    300.0
}

fn default_min_speed_check_interval_secs() -> u64 {
    1
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_stale_location_after_secs() -> u64 {
    5 * 60
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            max_session_age_secs: default_max_session_age_secs(),
            max_code_attempts: default_max_code_attempts(),
            max_plausible_speed_mps: default_max_plausible_speed_mps(),
            min_speed_check_interval_secs: default_min_speed_check_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            stale_location_after_secs: default_stale_location_after_secs(),
        }
    }
}

impl SafetyPolicy {
    /// Parses a policy from a TOML document; absent keys take defaults.
    pub fn from_toml_str(input: &str) -> crate::error::Result<Self> {
        toml::from_str(input).map_err(|e| {
            crate::error::WaypoolError::validation(format!("Invalid safety policy: {e}"))
        })
    }

    pub fn max_session_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_session_age_secs as i64)
    }

    pub fn min_speed_check_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_speed_check_interval_secs as i64)
    }

    pub fn stale_location_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_location_after_secs as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
