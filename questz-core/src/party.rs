//! Ownership and party tracking.
//!
//! Each player works at most one quest, identified by its issuer. A player
//! who shares a quest becomes the leader of a party; everyone they share with
//! is a member. Leader and members always map to the same issuer.

use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// Player → quest assignments and the parties built on top of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartyTracker {
    /// player → issuer of the quest they are working.
    assignments: HashMap<EntityId, EntityId>,
    /// leader → members (leader excluded).
    parties: HashMap<EntityId, HashSet<EntityId>>,
}

impl PartyTracker {
    /// Empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the player is working any quest.
    #[must_use]
    pub fn has_active_quest(&self, player: EntityId) -> bool {
        self.assignments.contains_key(&player)
    }

    /// Issuer of the player's quest.
    #[must_use]
    pub fn quest_of(&self, player: EntityId) -> Option<EntityId> {
        self.assignments.get(&player).copied()
    }

    /// Assign the player to the issuer's quest, unconditionally.
    pub fn assign(&mut self, player: EntityId, issuer: EntityId) {
        self.assignments.insert(player, issuer);
        debug!(player = %player, issuer = %issuer, "Assigned quest");
    }

    /// Remove every trace of the player: their assignment, the party they
    /// lead and their membership in someone else's party.
    pub fn complete(&mut self, player: EntityId) {
        self.assignments.remove(&player);
        self.parties.remove(&player);
        self.parties.retain(|_, members| {
            members.remove(&player);
            !members.is_empty()
        });
    }

    /// Add `target` to `owner`'s party on the owner's quest.
    ///
    /// Fails without side effects if the owner has no quest or the target
    /// already has one.
    pub fn share(&mut self, owner: EntityId, target: EntityId) -> bool {
        let Some(issuer) = self.quest_of(owner) else {
            return false;
        };
        if owner == target || self.has_active_quest(target) {
            return false;
        }

        let leader = self.leader_of(owner).unwrap_or(owner);
        self.parties.entry(leader).or_default().insert(target);
        self.assignments.insert(target, issuer);
        info!(owner = %owner, target = %target, issuer = %issuer, "Shared quest");
        true
    }

    /// The leader of the party `player` belongs to, if they are a member.
    fn leader_of(&self, player: EntityId) -> Option<EntityId> {
        self.parties
            .iter()
            .find(|(_, members)| members.contains(&player))
            .map(|(leader, _)| *leader)
    }

    /// Everyone in the player's party, the player included.
    #[must_use]
    pub fn party_of(&self, player: EntityId) -> BTreeSet<EntityId> {
        let mut party = BTreeSet::from([player]);
        let leader = if self.parties.contains_key(&player) {
            Some(player)
        } else {
            self.leader_of(player)
        };
        if let Some(leader) = leader {
            party.insert(leader);
            if let Some(members) = self.parties.get(&leader) {
                party.extend(members.iter().copied());
            }
        }
        party
    }

    /// Every player assigned to the issuer's quest, regardless of party.
    #[must_use]
    pub fn players_on_quest(&self, issuer: EntityId) -> BTreeSet<EntityId> {
        self.assignments
            .iter()
            .filter(|(_, q)| **q == issuer)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Clear every player on the issuer's quest. Returns who was cleared.
    pub fn clear_quest(&mut self, issuer: EntityId) -> BTreeSet<EntityId> {
        let players = self.players_on_quest(issuer);
        for p in &players {
            self.complete(*p);
        }
        players
    }

    /// Every assignment as `(player, issuer)`.
    pub fn assignments(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.assignments.iter().map(|(p, q)| (*p, *q))
    }
}
