//! Configuration for the QUESTZ quest system.
//!
//! Maps directly to `questz.toml`. Every field has a default, so a partial
//! file (or an empty one) is valid.

use crate::error::{QuestzError, Result};
use serde::{Deserialize, Serialize};

/// Top-level QUESTZ configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestzConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Quest generation tuning.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Reward bounds.
    #[serde(default)]
    pub rewards: RewardConfig,
    /// Offer cooldowns.
    #[serde(default)]
    pub cooldown: CooldownConfig,
    /// Build-site claims.
    #[serde(default)]
    pub areas: AreaConfig,
    /// Structure validation.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl QuestzConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `QuestzError::Config` if the TOML is invalid or fails
    /// [`validate`](Self::validate).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| QuestzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject settings no quest could be generated or validated with.
    ///
    /// # Errors
    /// Returns `QuestzError::Config` naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        let g = &self.generation;
        check_range("generation.*_build_width", g.min_build_width, g.max_build_width)?;
        check_range("generation.*_build_height", g.min_build_height, g.max_build_height)?;
        check_range(
            "generation.*_required_blocks",
            g.min_required_blocks,
            g.max_required_blocks,
        )?;
        if g.min_build_width < 3 || g.min_build_height < 3 {
            return Err(QuestzError::Config(
                "generation: buildings need at least 3 blocks per side".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&g.delivery_quest_chance) {
            return Err(QuestzError::Config(format!(
                "generation.delivery_quest_chance must be in [0, 1], got {}",
                g.delivery_quest_chance
            )));
        }
        if !(0.0..=1.0).contains(&g.max_obstruction_ratio) {
            return Err(QuestzError::Config(format!(
                "generation.max_obstruction_ratio must be in [0, 1], got {}",
                g.max_obstruction_ratio
            )));
        }
        if g.search_attempts == 0 {
            return Err(QuestzError::Config(
                "generation.search_attempts must be at least 1".to_string(),
            ));
        }

        let r = &self.rewards;
        check_range("rewards.building_*", r.building_min, r.building_max)?;
        check_range("rewards.delivery_*", r.delivery_min, r.delivery_max)?;

        if self.areas.buffer_zone < 0 {
            return Err(QuestzError::Config(
                "areas.buffer_zone must not be negative".to_string(),
            ));
        }
        if self.validation.max_flood_nodes == 0 {
            return Err(QuestzError::Config(
                "validation.max_flood_nodes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Cooldown as a duration.
    #[must_use]
    pub fn quest_cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.cooldown.quest_cooldown_minutes))
    }

    /// In-flight validation timeout as a duration.
    #[must_use]
    pub fn validation_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.validation.timeout_seconds))
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(name: &str, min: T, max: T) -> Result<()> {
    if min > max {
        return Err(QuestzError::Config(format!(
            "{name}: minimum {min} exceeds maximum {max}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the quest system is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Quest generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Offer building quests.
    #[serde(default = "default_true")]
    pub enable_building_quests: bool,
    /// Offer delivery quests.
    #[serde(default = "default_true")]
    pub enable_delivery_quests: bool,
    /// Chance of a delivery when both families are enabled.
    #[serde(default = "default_0_3")]
    pub delivery_quest_chance: f64,
    /// Smallest building footprint side.
    #[serde(default = "default_4")]
    pub min_build_width: i32,
    /// Largest building footprint side.
    #[serde(default = "default_15")]
    pub max_build_width: i32,
    /// Lowest building height.
    #[serde(default = "default_5")]
    pub min_build_height: i32,
    /// Tallest building height.
    #[serde(default = "default_10")]
    pub max_build_height: i32,
    /// Fewest building blocks asked for.
    #[serde(default = "default_20")]
    pub min_required_blocks: u32,
    /// Most building blocks asked for.
    #[serde(default = "default_50")]
    pub max_required_blocks: u32,
    /// Site search radius around the agent, in blocks.
    #[serde(default = "default_10")]
    pub search_radius: i32,
    /// Candidate sites tried per generation.
    #[serde(default = "default_20_usize")]
    pub search_attempts: usize,
    /// Largest ground height difference allowed across a site.
    #[serde(default = "default_2")]
    pub max_height_deviation: i32,
    /// Blocks above ground checked for obstructions.
    #[serde(default = "default_5")]
    pub clearance_height: i32,
    /// Largest fraction of the clearance volume that may be obstructed.
    #[serde(default = "default_0_2")]
    pub max_obstruction_ratio: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enable_building_quests: true,
            enable_delivery_quests: true,
            delivery_quest_chance: 0.3,
            min_build_width: 4,
            max_build_width: 15,
            min_build_height: 5,
            max_build_height: 10,
            min_required_blocks: 20,
            max_required_blocks: 50,
            search_radius: 10,
            search_attempts: 20,
            max_height_deviation: 2,
            clearance_height: 5,
            max_obstruction_ratio: 0.2,
        }
    }
}

/// Reward bounds per quest family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Smallest building reward.
    #[serde(default = "default_5_u32")]
    pub building_min: u32,
    /// Largest building reward.
    #[serde(default = "default_64")]
    pub building_max: u32,
    /// Smallest delivery reward.
    #[serde(default = "default_3_u32")]
    pub delivery_min: u32,
    /// Largest delivery reward.
    #[serde(default = "default_16")]
    pub delivery_max: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            building_min: 5,
            building_max: 64,
            delivery_min: 3,
            delivery_max: 16,
        }
    }
}

/// Offer cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Minutes an agent waits between offers.
    #[serde(default = "default_60")]
    pub quest_cooldown_minutes: u32,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            quest_cooldown_minutes: 60,
        }
    }
}

/// Build-site claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaConfig {
    /// Clearance kept between claims, in blocks.
    #[serde(default = "default_3")]
    pub buffer_zone: i32,
    /// Free a quest's site when it is cancelled, declined or its agent dies.
    #[serde(default)]
    pub release_on_cancel: bool,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            buffer_zone: 3,
            release_on_cancel: false,
        }
    }
}

/// Structure validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// How far outside the structure air may flow before it counts as a leak.
    #[serde(default = "default_3")]
    pub outer_margin: i32,
    /// Flood fill visit cap.
    #[serde(default = "default_10000")]
    pub max_flood_nodes: usize,
    /// Seconds before an in-flight check is considered abandoned.
    #[serde(default = "default_30")]
    pub timeout_seconds: u32,
    /// Fail structures whose interior air reaches the outside.
    #[serde(default = "default_true")]
    pub require_full_enclosure: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            outer_margin: 3,
            max_flood_nodes: 10_000,
            timeout_seconds: 30,
            require_full_enclosure: true,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            checksum_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_0_2() -> f64 { 0.2 }
fn default_0_3() -> f64 { 0.3 }
fn default_2() -> i32 { 2 }
fn default_3() -> i32 { 3 }
fn default_3_u32() -> u32 { 3 }
fn default_4() -> i32 { 4 }
fn default_5() -> i32 { 5 }
fn default_5_u32() -> u32 { 5 }
fn default_10() -> i32 { 10 }
fn default_15() -> i32 { 15 }
fn default_16() -> u32 { 16 }
fn default_20() -> u32 { 20 }
fn default_20_usize() -> usize { 20 }
fn default_30() -> u32 { 30 }
fn default_50() -> u32 { 50 }
fn default_60() -> u32 { 60 }
fn default_64() -> u32 { 64 }
fn default_10000() -> usize { 10_000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let c = QuestzConfig::from_toml("").expect("empty config is valid");
        assert_eq!(c.generation.min_build_width, 4);
        assert_eq!(c.generation.max_required_blocks, 50);
        assert!((c.generation.delivery_quest_chance - 0.3).abs() < f64::EPSILON);
        assert_eq!(c.areas.buffer_zone, 3);
        assert!(!c.areas.release_on_cancel);
        assert_eq!(c.validation.max_flood_nodes, 10_000);
        assert_eq!(c.quest_cooldown(), chrono::Duration::minutes(60));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let c = QuestzConfig::from_toml(
            r#"
            [generation]
            enable_delivery_quests = false

            [cooldown]
            quest_cooldown_minutes = 5
            "#,
        )
        .expect("valid");
        assert!(!c.generation.enable_delivery_quests);
        assert!(c.generation.enable_building_quests);
        assert_eq!(c.quest_cooldown(), chrono::Duration::minutes(5));
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let err = QuestzConfig::from_toml(
            r#"
            [generation]
            min_build_width = 12
            max_build_width = 6
            "#,
        )
        .expect_err("inverted");
        assert!(matches!(err, QuestzError::Config(_)));
    }

    #[test]
    fn probability_out_of_range_is_rejected() {
        let mut c = QuestzConfig::default();
        c.generation.delivery_quest_chance = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            QuestzConfig::from_toml("generation = 3"),
            Err(QuestzError::Config(_))
        ));
    }
}
