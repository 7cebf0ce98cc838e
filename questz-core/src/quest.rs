//! The quest record.
//!
//! A [`Quest`] is shaped once by the generator and afterwards only its status
//! flags move. `completed` and `active` are never both true.

use crate::material::Material;
use crate::types::{BlockPos, Bounds, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What kind of task the agent wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestType {
    /// A house with a bed.
    PersonalResidence,
    /// A workshop with the agent's workstation.
    Workplace,
    /// Hand over a set of goods.
    Delivery,
}

impl QuestType {
    /// Whether this quest is completed by building something.
    #[must_use]
    pub const fn is_building(self) -> bool {
        !matches!(self, Self::Delivery)
    }
}

impl fmt::Display for QuestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PersonalResidence => "Personal Residence",
            Self::Workplace => "Workplace",
            Self::Delivery => "Delivery",
        };
        f.write_str(s)
    }
}

/// One agent's quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    /// Agent that issued the quest.
    pub issuer: EntityId,
    /// Task kind.
    pub quest_type: QuestType,
    /// Minimum corner of the build site.
    pub site_min: BlockPos,
    /// Maximum corner of the build site.
    pub site_max: BlockPos,
    /// Material → quantity required.
    pub required_materials: BTreeMap<Material, u32>,
    /// Reward paid on completion.
    pub reward: u32,
    /// Who receives the goods. Set (to the issuer) for deliveries only.
    #[serde(default)]
    pub target_agent: Option<EntityId>,
    /// Accepted by a player and not yet completed.
    #[serde(default)]
    pub active: bool,
    /// Finished.
    #[serde(default)]
    pub completed: bool,
    /// An asynchronous completion check is running.
    #[serde(default)]
    pub validation_in_progress: bool,
}

impl Quest {
    /// A building quest on the given site. Created inactive.
    #[must_use]
    pub fn building(
        issuer: EntityId,
        quest_type: QuestType,
        site: Bounds,
        required_materials: BTreeMap<Material, u32>,
        reward: u32,
    ) -> Self {
        Self {
            issuer,
            quest_type,
            site_min: site.min,
            site_max: site.max,
            required_materials,
            reward,
            target_agent: None,
            active: false,
            completed: false,
            validation_in_progress: false,
        }
    }

    /// A delivery quest handed back to the issuer at `position`.
    #[must_use]
    pub fn delivery(
        issuer: EntityId,
        position: BlockPos,
        required_materials: BTreeMap<Material, u32>,
        reward: u32,
    ) -> Self {
        Self {
            issuer,
            quest_type: QuestType::Delivery,
            site_min: position,
            site_max: position,
            required_materials,
            reward,
            target_agent: Some(issuer),
            active: false,
            completed: false,
            validation_in_progress: false,
        }
    }

    /// The site as a normalised box.
    #[must_use]
    pub fn site(&self) -> Bounds {
        Bounds::from_corners(self.site_min, self.site_max)
    }

    /// Whether the quest is a delivery.
    #[must_use]
    pub fn is_delivery(&self) -> bool {
        self.quest_type == QuestType::Delivery
    }

    /// Total number of required items.
    #[must_use]
    pub fn total_required(&self) -> u32 {
        self.required_materials.values().sum()
    }

    /// Accepted and still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.active && !self.completed
    }

    /// Mark accepted.
    pub fn activate(&mut self) {
        if !self.completed {
            self.active = true;
        }
    }

    /// Mark finished. Clears `active`.
    pub fn complete(&mut self) {
        self.completed = true;
        self.active = false;
    }
}
