//! Offer cooldowns.
//!
//! After an agent offers or completes a quest it waits out a cooldown before
//! offering again. Eligibility is computed on demand; the "has marker" flag
//! only turns on during [`OfferCooldowns::refresh_markers`].

use crate::types::EntityId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-agent cooldown record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownEntry {
    /// Last offer or completion.
    pub last_stamp: DateTime<Utc>,
    /// Flagged as having a quest to offer.
    #[serde(default)]
    pub has_marker: bool,
}

/// Cooldown tracker for every agent in a shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferCooldowns {
    entries: HashMap<EntityId, CooldownEntry>,
    #[serde(skip, default = "default_cooldown")]
    cooldown: Duration,
}

fn default_cooldown() -> Duration {
    Duration::minutes(60)
}

impl Default for OfferCooldowns {
    fn default() -> Self {
        Self::new(default_cooldown())
    }
}

impl OfferCooldowns {
    /// Tracker with the given cooldown.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            cooldown,
        }
    }

    /// Configured cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Change the cooldown (used after loading persisted state).
    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    /// Whether the agent may offer a quest at `now`.
    #[must_use]
    pub fn can_offer(&self, agent: EntityId, now: DateTime<Utc>) -> bool {
        self.entries
            .get(&agent)
            .is_none_or(|e| now - e.last_stamp >= self.cooldown)
    }

    /// Time left until the agent may offer again. Zero once eligible.
    #[must_use]
    pub fn time_remaining(&self, agent: EntityId, now: DateTime<Utc>) -> Duration {
        self.entries.get(&agent).map_or_else(Duration::zero, |e| {
            (self.cooldown - (now - e.last_stamp)).max(Duration::zero())
        })
    }

    /// Stamp an offer.
    pub fn record_offer(&mut self, agent: EntityId, now: DateTime<Utc>) {
        self.stamp(agent, now);
    }

    /// Stamp a completion.
    pub fn record_completion(&mut self, agent: EntityId, now: DateTime<Utc>) {
        self.stamp(agent, now);
    }

    fn stamp(&mut self, agent: EntityId, now: DateTime<Utc>) {
        self.entries.insert(
            agent,
            CooldownEntry {
                last_stamp: now,
                has_marker: false,
            },
        );
    }

    /// Whether the agent is flagged as having a quest to offer.
    #[must_use]
    pub fn has_marker(&self, agent: EntityId) -> bool {
        self.entries.get(&agent).is_some_and(|e| e.has_marker)
    }

    /// Whether the tracker has seen this agent.
    #[must_use]
    pub fn is_tracked(&self, agent: EntityId) -> bool {
        self.entries.contains_key(&agent)
    }

    /// Flag every agent whose cooldown has run out. Returns how many flags
    /// turned on.
    pub fn refresh_markers(&mut self, now: DateTime<Utc>) -> usize {
        let mut flipped = 0;
        for entry in self.entries.values_mut() {
            if !entry.has_marker && now - entry.last_stamp >= self.cooldown {
                entry.has_marker = true;
                flipped += 1;
            }
        }
        flipped
    }

    /// Forget an agent.
    pub fn forget(&mut self, agent: EntityId) {
        self.entries.remove(&agent);
    }
}
