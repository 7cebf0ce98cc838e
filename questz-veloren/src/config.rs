//! Veloren-specific configuration for the QUESTZ quest system.
//!
//! Wraps the core [`QuestzConfig`] with the server-side tuning that only the
//! integration layer cares about: how often markers are refreshed, how far
//! they reach, and how long a reachability check may run.

use std::time::Duration;

use questz_core::config::QuestzConfig;
use questz_core::error::{QuestzError, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Veloren Quest Configuration
// ---------------------------------------------------------------------------

/// Extended configuration for the Veloren integration layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelorenQuestConfig {
    /// Core quest engine configuration.
    #[serde(default)]
    pub core: QuestzConfig,
    /// How frequently (in server ticks) to run the marker sweep.
    #[serde(default = "default_sync_interval")]
    pub marker_sync_interval_ticks: u64,
    /// Radius (world units) around a player within which agents get markers.
    #[serde(default = "default_marker_radius")]
    pub marker_radius: f32,
    /// Radius (world units) within which a quest can be shared.
    #[serde(default = "default_share_radius")]
    pub share_radius: f32,
    /// Upper bound on a single pathfinding check, in milliseconds.
    #[serde(default = "default_reachability_timeout_ms")]
    pub reachability_timeout_ms: u64,
}

fn default_sync_interval() -> u64 { 100 }
fn default_marker_radius() -> f32 { 128.0 }
fn default_share_radius() -> f32 { 10.0 }
fn default_reachability_timeout_ms() -> u64 { 5_000 }

impl Default for VelorenQuestConfig {
    fn default() -> Self {
        Self {
            core: QuestzConfig::default(),
            marker_sync_interval_ticks: default_sync_interval(),
            marker_radius: default_marker_radius(),
            share_radius: default_share_radius(),
            reachability_timeout_ms: default_reachability_timeout_ms(),
        }
    }
}

impl VelorenQuestConfig {
    /// Parse from TOML. The core engine's sections live under `[core]`.
    ///
    /// # Errors
    /// Returns [`QuestzError::Config`] if parsing fails or a value is out of range.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| QuestzError::Config(e.to_string()))?;
        config.core.validate()?;
        if config.marker_sync_interval_ticks == 0 {
            return Err(QuestzError::Config(
                "marker_sync_interval_ticks must be at least 1".to_string(),
            ));
        }
        if config.marker_radius <= 0.0 || config.share_radius <= 0.0 {
            return Err(QuestzError::Config("radii must be positive".to_string()));
        }
        Ok(config)
    }

    /// Reachability timeout as a [`Duration`].
    #[must_use]
    pub const fn reachability_timeout(&self) -> Duration {
        Duration::from_millis(self.reachability_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
