//! Quest requests coming in from clients and replies going back out.
//!
//! The network and UI layers translate their own messages into a
//! [`QuestRequest`], hand it to the quest rule, and render whatever
//! [`QuestReply`] values come back to the addressed players.

use std::collections::BTreeMap;

use questz_core::shard::QuestOffer;
use questz_core::{Bounds, EntityId, Material, QuestType};

/// Something a player (or the server) asks of the quest system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestRequest {
    /// Player right-clicked / talked to an agent.
    Interact {
        player: EntityId,
        agent: EntityId,
    },
    /// Player answered an offer screen.
    Respond {
        player: EntityId,
        agent: EntityId,
        accept: bool,
    },
    /// Player abandons their quest.
    Cancel {
        player: EntityId,
        agent: EntityId,
    },
    /// Player shares their quest with nearby players.
    Share {
        player: EntityId,
        agent: EntityId,
    },
    /// Player asks the agent to inspect their work.
    CheckCompletion {
        player: EntityId,
        agent: EntityId,
    },
    /// Player hands over items for a delivery quest.
    SubmitDelivery {
        player: EntityId,
        agent: EntityId,
        items: Vec<(Material, u32)>,
    },
    /// An agent died or despawned.
    AgentRemoved {
        agent: EntityId,
    },
}

impl QuestRequest {
    /// The player who sent the request, if any.
    #[must_use]
    pub const fn player(&self) -> Option<EntityId> {
        match self {
            Self::Interact { player, .. }
            | Self::Respond { player, .. }
            | Self::Cancel { player, .. }
            | Self::Share { player, .. }
            | Self::CheckCompletion { player, .. }
            | Self::SubmitDelivery { player, .. } => Some(*player),
            Self::AgentRemoved { .. } => None,
        }
    }

    /// The agent the request concerns.
    #[must_use]
    pub const fn agent(&self) -> EntityId {
        match self {
            Self::Interact { agent, .. }
            | Self::Respond { agent, .. }
            | Self::Cancel { agent, .. }
            | Self::Share { agent, .. }
            | Self::CheckCompletion { agent, .. }
            | Self::SubmitDelivery { agent, .. }
            | Self::AgentRemoved { agent } => *agent,
        }
    }
}

/// What to show or do for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestReply {
    /// Open the offer screen.
    OfferScreen(QuestOffer),
    /// Open the screen for the player's own quest.
    CurrentQuestScreen(QuestOffer),
    /// Open the delivery turn-in screen.
    DeliveryScreen {
        agent: EntityId,
        required: BTreeMap<Material, u32>,
        reward: u32,
    },
    /// The player took on a quest.
    Accepted {
        agent: EntityId,
        quest_type: QuestType,
    },
    /// Outcome of a completion check or delivery.
    Result {
        success: bool,
        reward: u32,
        reasons: Vec<String>,
    },
    /// Remove these items from the player's inventory.
    TakeItems(BTreeMap<Material, u32>),
    /// Place (or remove) the corner markers of a build site.
    SiteMarkers {
        site: Bounds,
        place: bool,
    },
    /// Plain chat / toast message.
    Message(String),
}

/// A reply addressed to one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressed {
    /// Recipient.
    pub to: EntityId,
    /// Payload.
    pub reply: QuestReply,
}

impl Addressed {
    /// Address `reply` to `to`.
    #[must_use]
    pub const fn new(to: EntityId, reply: QuestReply) -> Self {
        Self { to, reply }
    }

    /// A plain message for `to`.
    #[must_use]
    pub fn message(to: EntityId, text: impl Into<String>) -> Self {
        Self::new(to, QuestReply::Message(text.into()))
    }
}
