//! Quest registry: issuer → current quest.
//!
//! At most one quest is indexed per issuer. The registry owns every status
//! transition except `validation_in_progress`, which the completion check
//! toggles through [`QuestRegistry::set_validation_in_progress`].

use crate::quest::Quest;
use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// A quest plus the registry's internal identifier for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredQuest {
    /// Internal identifier, fresh for every `add`.
    pub id: Uuid,
    /// The quest.
    pub quest: Quest,
}

/// Authoritative map of live quests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestRegistry {
    by_issuer: HashMap<EntityId, StoredQuest>,
}

impl QuestRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a quest under its issuer, replacing whatever was there.
    pub fn add(&mut self, quest: Quest) -> Uuid {
        let id = Uuid::new_v4();
        let issuer = quest.issuer;
        if self.by_issuer.insert(issuer, StoredQuest { id, quest }).is_some() {
            debug!(issuer = %issuer, "Replaced existing quest");
        }
        id
    }

    /// The issuer's quest.
    #[must_use]
    pub fn get_by_issuer(&self, issuer: EntityId) -> Option<&Quest> {
        self.by_issuer.get(&issuer).map(|s| &s.quest)
    }

    /// Internal identifier of the issuer's quest.
    #[must_use]
    pub fn internal_id(&self, issuer: EntityId) -> Option<Uuid> {
        self.by_issuer.get(&issuer).map(|s| s.id)
    }

    /// The issuer's quest exists, is active and is not completed.
    #[must_use]
    pub fn has_active(&self, issuer: EntityId) -> bool {
        self.get_by_issuer(issuer).is_some_and(Quest::is_open)
    }

    /// Mark the issuer's quest accepted. Returns whether a quest was found.
    pub fn activate(&mut self, issuer: EntityId) -> bool {
        self.by_issuer
            .get_mut(&issuer)
            .map(|s| s.quest.activate())
            .is_some()
    }

    /// Mark the issuer's quest finished. No-op when absent.
    pub fn complete(&mut self, issuer: EntityId) -> bool {
        self.by_issuer
            .get_mut(&issuer)
            .map(|s| s.quest.complete())
            .is_some()
    }

    /// Drop the issuer's quest.
    pub fn remove(&mut self, issuer: EntityId) -> Option<Quest> {
        self.by_issuer.remove(&issuer).map(|s| s.quest)
    }

    /// Set or clear the in-flight validation flag. Returns whether a quest
    /// was found.
    pub fn set_validation_in_progress(&mut self, issuer: EntityId, value: bool) -> bool {
        self.by_issuer
            .get_mut(&issuer)
            .map(|s| s.quest.validation_in_progress = value)
            .is_some()
    }

    /// Clear every in-flight validation flag. Returns how many were set.
    pub fn clear_all_validations(&mut self) -> usize {
        let mut cleared = 0;
        for stored in self.by_issuer.values_mut() {
            if stored.quest.validation_in_progress {
                stored.quest.validation_in_progress = false;
                cleared += 1;
            }
        }
        cleared
    }

    /// Iterate every quest.
    pub fn iter(&self) -> impl Iterator<Item = &Quest> {
        self.by_issuer.values().map(|s| &s.quest)
    }

    /// Number of quests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_issuer.len()
    }

    /// Registry holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_issuer.is_empty()
    }
}
