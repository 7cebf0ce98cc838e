//! # questz-veloren — Veloren Integration for QUESTZ
//!
//! This crate provides the integration layer between the game-agnostic
//! `questz-core` library and a Veloren server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Veloren server               │
//! │  ┌───────────────────────────────────┐  │
//! │  │       questz-veloren              │  │
//! │  │  ┌─────────────┐ ┌─────────────┐  │  │
//! │  │  │ Quest Rule  │ │   Systems   │  │  │
//! │  │  └──────┬──────┘ └──────┬──────┘  │  │
//! │  │         │               │         │  │
//! │  │         ▼               ▼         │  │
//! │  │    ┌─────────────────────────┐    │  │
//! │  │    │   questz-core shard     │    │  │
//! │  │    └─────────────────────────┘    │  │
//! │  └───────────────────────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `bridge` — Veloren professions, blocks, positions and IDs → QUESTZ types
//! - `config` — Server-side tuning (marker radius, sync interval, timeouts)
//! - `events` — Quest requests in, addressed replies out
//! - `quest_rule` — Routes requests into the world shard
//! - `systems` — Marker sync cadence and the async reachability check

pub mod bridge;
pub mod config;
pub mod events;
pub mod quest_rule;
pub mod systems;

use questz_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// `general.log_level`. Returns `false` if a subscriber was already installed.
pub fn init_logging(general: &GeneralConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&general.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if general.json_logs {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
