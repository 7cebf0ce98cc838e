//! Server-side systems for the QUESTZ quest layer.
//!
//! In a full Veloren integration these would implement `specs::System`.
//! For now, they are standalone pieces the server loop calls.
//!
//! ## System cadence:
//!
//! | System              | Frequency                         |
//! |---------------------|-----------------------------------|
//! | Marker sync         | Every `marker_sync_interval_ticks` and on player join |
//! | Reachability check  | Async, once per structural pass   |

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use questz_core::error::Result;
use questz_core::shard::{reachability_verdict, MarkerSnapshot, ReachVerdict, ReachabilityTicket};
use questz_core::Reachability;
use tracing::{debug, warn};

use crate::events::Addressed;
use crate::quest_rule::{GameContext, QuestRule};

// ---------------------------------------------------------------------------
// Marker sync
// ---------------------------------------------------------------------------

/// Tick counter that decides when the marker sweep runs.
#[derive(Debug, Clone)]
pub struct MarkerSync {
    interval: u64,
    ticks: u64,
    forced: bool,
}

impl MarkerSync {
    /// Sweep every `interval` ticks (at least 1).
    #[must_use]
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            ticks: 0,
            forced: false,
        }
    }

    /// Run the sweep on the next tick regardless of the interval (player join).
    pub fn force(&mut self) {
        self.forced = true;
    }

    /// Advance one tick. Returns `true` when the sweep is due.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        let due = self.forced || self.ticks >= self.interval;
        if due {
            self.ticks = 0;
            self.forced = false;
        }
        due
    }

    /// Advance one tick and, when due, sweep `rule`.
    ///
    /// # Errors
    /// Returns an error only when quest state cannot be saved.
    pub fn run<C: GameContext + ?Sized>(
        &mut self,
        rule: &mut QuestRule,
        ctx: &C,
    ) -> Result<Option<MarkerSnapshot>> {
        if !self.tick() {
            return Ok(None);
        }
        let snapshot = rule.sync_markers(ctx, Utc::now())?;
        debug!(
            offerable = snapshot.offerable.len(),
            active = snapshot.active.len(),
            "Marker sync"
        );
        Ok(Some(snapshot))
    }
}

// ---------------------------------------------------------------------------
// Reachability
// ---------------------------------------------------------------------------

/// Run the pathfinding half of a completion check off the server thread.
///
/// The pathfinder runs on the blocking pool under `timeout`. Whatever
/// happens (pass, fail, panic, timeout), the verdict is reported back to the
/// rule, which clears the quest's in-progress flag.
///
/// # Errors
/// Returns an error only when quest state cannot be saved.
pub async fn run_reachability_check(
    rule: Arc<Mutex<QuestRule>>,
    ticket: ReachabilityTicket,
    reach: Arc<dyn Reachability + Send + Sync>,
    timeout: Duration,
) -> Result<Vec<Addressed>> {
    let probe = tokio::task::spawn_blocking(move || reachability_verdict(reach.as_ref(), &ticket));

    let verdict = match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => {
            warn!(issuer = %ticket.issuer, error = %e, "Pathfinding task failed");
            ReachVerdict::Failed(format!("Pathfinding failed: {e}"))
        }
        Err(_) => {
            warn!(issuer = %ticket.issuer, timeout_ms = timeout.as_millis(), "Pathfinding timed out");
            ReachVerdict::TimedOut
        }
    };

    let mut rule = rule.lock();
    rule.finish_check(&ticket, verdict, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
