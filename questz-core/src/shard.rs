//! The per-world quest context.
//!
//! A [`QuestShard`] owns everything one world needs: the registry, the
//! claimed areas, player assignments, cooldowns and the store they are
//! saved to. Every entry point the game layer calls lives here. Each one
//! that mutates state saves the stores it touched before returning.
//!
//! Policy rejections are returned as [`Rejection`] values inside each
//! outcome; only storage failures surface as `Err`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::allocator::BuildingAreas;
use crate::config::QuestzConfig;
use crate::cooldown::OfferCooldowns;
use crate::error::Result;
use crate::generator::QuestGenerator;
use crate::material::Material;
use crate::party::PartyTracker;
use crate::persistence::{
    load_json, save_json, StateStore, AREAS_STORE, PLAYERS_STORE, QUESTS_STORE, STATUS_STORE,
};
use crate::quest::{Quest, QuestType};
use crate::registry::QuestRegistry;
use crate::types::{BlockPos, Bounds, EntityId};
use crate::validator::{delivery_shortfall, StructureValidator};
use crate::world::{Agent, Reachability, WorldView};

/// Reason given when the issuing agent is gone.
pub const AGENT_MISSING: &str = "The quest-giving villager could not be found!";
/// Reason given when the agent cannot walk to the furniture.
pub const CANNOT_REACH: &str = "The villager cannot reach the required furniture!";
/// Reason given when the agent cannot walk back out.
pub const CANNOT_RETURN: &str = "The villager cannot return from the building!";
/// Reason given when the reachability check took too long.
pub const CHECK_TIMED_OUT: &str = "The villager took too long to inspect the building. Try again.";

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The player already works another quest.
    PlayerBusy,
    /// Someone else accepted this agent's quest.
    QuestTaken,
    /// The agent has no quest.
    NoSuchQuest,
    /// The player does not hold this quest.
    NotOnQuest,
    /// A completion check for this quest is still running.
    ValidationInProgress,
    /// The quest is not a delivery.
    NotDelivery,
    /// A reachability result arrived for a check that already ended.
    StaleCheck,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PlayerBusy => {
                "You already have an active quest! Complete it before accepting another."
            }
            Self::QuestTaken => "This villager's quest has already been taken by another player.",
            Self::NoSuchQuest => "This villager has no quest for you.",
            Self::NotOnQuest => "You don't have this quest!",
            Self::ValidationInProgress => "Quest validation is already in progress...",
            Self::NotDelivery => "Invalid delivery quest!",
            Self::StaleCheck => "This quest check is no longer current.",
        };
        f.write_str(s)
    }
}

/// Everything a UI needs to render a quest offer or turn-in screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestOffer {
    /// Issuing agent.
    pub issuer: EntityId,
    /// Task kind.
    pub quest_type: QuestType,
    /// Build site, for building quests.
    pub site: Option<Bounds>,
    /// Site extent along x.
    pub width: i32,
    /// Site extent along z.
    pub length: i32,
    /// Site extent along y.
    pub height: i32,
    /// Required materials.
    pub required: BTreeMap<Material, u32>,
    /// Reward on completion.
    pub reward: u32,
    /// The viewing player already holds this quest.
    pub is_current: bool,
    /// The viewing player holds some quest.
    pub player_has_quest: bool,
    /// Other players in the viewer's party.
    pub party: Vec<EntityId>,
}

/// Result of a player interacting with an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferOutcome {
    /// A quest to accept or decline.
    Offered(QuestOffer),
    /// The player's own quest, for turning in.
    Current(QuestOffer),
    /// The agent is resting.
    Cooldown {
        /// Time until the agent offers again.
        remaining: Duration,
    },
    /// Nothing suitable could be generated right now.
    NoQuest,
    /// Refused.
    Rejected(Rejection),
}

/// Result of accepting or declining an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondOutcome {
    /// The player now works the quest.
    Accepted {
        /// Issuing agent.
        issuer: EntityId,
        /// Task kind.
        quest_type: QuestType,
        /// Site markers should be placed (building quests only).
        place_markers: bool,
        /// Build site for markers.
        site: Option<Bounds>,
    },
    /// The offer was dropped.
    Declined,
    /// Refused.
    Rejected(Rejection),
}

/// Result of cancelling a quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Quest removed; these players lost it.
    Cancelled {
        /// Everyone who was working it.
        affected: BTreeSet<EntityId>,
        /// Site, so markers can be removed.
        site: Option<Bounds>,
    },
    /// Refused.
    Rejected(Rejection),
}

/// Result of sharing a quest with nearby players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Players who joined. Empty when nobody was eligible.
    Shared(Vec<EntityId>),
    /// Refused.
    Rejected(Rejection),
}

/// A finished quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Issuing agent.
    pub issuer: EntityId,
    /// Task kind.
    pub quest_type: QuestType,
    /// Reward paid to each beneficiary.
    pub reward: u32,
    /// Every player who was working the quest.
    pub beneficiaries: BTreeSet<EntityId>,
    /// Site, so markers can be removed.
    pub site: Option<Bounds>,
}

/// Result of handing over delivery goods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Quest complete; take `consumed` from the player.
    Completed {
        /// Completion details.
        completion: Completion,
        /// Items to remove from the deliverer.
        consumed: BTreeMap<Material, u32>,
    },
    /// Not enough goods; `"<n>x <Material>"` per missing kind.
    Shortfall {
        /// Missing goods.
        missing: Vec<String>,
    },
    /// Refused.
    Rejected(Rejection),
}

/// A structural pass waiting on the pathfinding check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachabilityTicket {
    /// Identifies this check run.
    pub id: Uuid,
    /// Issuing agent.
    pub issuer: EntityId,
    /// Player who asked.
    pub player: EntityId,
    /// Agent's position when the check started.
    pub origin: BlockPos,
    /// Bed or workstation the agent must reach.
    pub furniture: BlockPos,
}

/// Answer from the pathfinding check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReachVerdict {
    /// Reached the furniture and got back out.
    Reached,
    /// Could not get to the furniture.
    CannotReachFurniture,
    /// Got in but could not get back out.
    CannotReturn,
    /// The check did not answer in time.
    TimedOut,
    /// The check itself failed.
    Failed(String),
}

/// Ask `reach` whether the agent can walk in to the furniture and back.
pub fn reachability_verdict<R: Reachability + ?Sized>(
    reach: &R,
    ticket: &ReachabilityTicket,
) -> ReachVerdict {
    if !reach.can_reach(ticket.origin, ticket.furniture) {
        ReachVerdict::CannotReachFurniture
    } else if !reach.can_reach(ticket.furniture, ticket.origin) {
        ReachVerdict::CannotReturn
    } else {
        ReachVerdict::Reached
    }
}

/// First half of a completion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionCheck {
    /// Delivery quest: open the turn-in screen.
    Delivery {
        /// Goods wanted.
        required: BTreeMap<Material, u32>,
        /// Reward on completion.
        reward: u32,
    },
    /// Structure failed; quest stays open.
    Failed {
        /// Every failing check.
        reasons: Vec<String>,
    },
    /// Structure passed; run the pathfinding check and report back through
    /// [`QuestShard::finish_completion_check`].
    AwaitingReachability(ReachabilityTicket),
    /// Refused.
    Rejected(Rejection),
}

/// Final answer of a completion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Delivery quest: open the turn-in screen.
    Delivery {
        /// Goods wanted.
        required: BTreeMap<Material, u32>,
        /// Reward on completion.
        reward: u32,
    },
    /// Quest complete.
    Completed(Completion),
    /// Quest stays open.
    Failed {
        /// Every failing check.
        reasons: Vec<String>,
    },
    /// Refused.
    Rejected(Rejection),
}

/// Agents to highlight, from a marker sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerSnapshot {
    /// Agents with a quest ready to offer.
    pub offerable: BTreeSet<EntityId>,
    /// Agents whose quest is being worked.
    pub active: BTreeSet<EntityId>,
}

// ---------------------------------------------------------------------------
// QuestShard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: Uuid,
    started: DateTime<Utc>,
}

/// All quest state for one world shard.
pub struct QuestShard {
    name: String,
    config: QuestzConfig,
    generator: QuestGenerator,
    validator: StructureValidator,
    registry: QuestRegistry,
    areas: BuildingAreas,
    parties: PartyTracker,
    cooldowns: OfferCooldowns,
    store: Box<dyn StateStore>,
    rng: StdRng,
    in_flight: HashMap<EntityId, InFlight>,
}

impl fmt::Debug for QuestShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestShard")
            .field("name", &self.name)
            .field("quests", &self.registry.len())
            .field("areas", &self.areas.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl QuestShard {
    /// Load (or start) the shard `name` from `store`.
    ///
    /// Validation flags left set by a previous run are cleared, and player
    /// assignments pointing at quests that no longer exist are dropped.
    ///
    /// # Errors
    /// Returns [`crate::QuestzError::Config`] for an invalid `config`, or an error if
    /// the store cannot be read or holds undecodable data.
    pub fn open(name: impl Into<String>, config: QuestzConfig, store: Box<dyn StateStore>) -> Result<Self> {
        Self::open_with_rng(name, config, store, StdRng::from_entropy())
    }

    /// Like [`open`](Self::open) with a deterministic random source.
    ///
    /// # Errors
    /// Returns [`crate::QuestzError::Config`] for an invalid `config`, or an error if
    /// the store cannot be read or holds undecodable data.
    pub fn open_seeded(
        name: impl Into<String>,
        config: QuestzConfig,
        store: Box<dyn StateStore>,
        seed: u64,
    ) -> Result<Self> {
        Self::open_with_rng(name, config, store, StdRng::seed_from_u64(seed))
    }

    fn open_with_rng(
        name: impl Into<String>,
        config: QuestzConfig,
        store: Box<dyn StateStore>,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let mut registry: QuestRegistry =
            load_json(store.as_ref(), &name, QUESTS_STORE)?.unwrap_or_default();
        let mut areas: BuildingAreas =
            load_json(store.as_ref(), &name, AREAS_STORE)?.unwrap_or_default();
        let parties: PartyTracker =
            load_json(store.as_ref(), &name, PLAYERS_STORE)?.unwrap_or_default();
        let mut cooldowns: OfferCooldowns =
            load_json(store.as_ref(), &name, STATUS_STORE)?.unwrap_or_default();

        areas.set_buffer(config.areas.buffer_zone);
        cooldowns.set_cooldown(config.quest_cooldown());
        let stale = registry.clear_all_validations();

        let mut shard = Self {
            generator: QuestGenerator::new(config.generation.clone(), config.rewards.clone()),
            validator: StructureValidator::new(&config.validation),
            name,
            config,
            registry,
            areas,
            parties,
            cooldowns,
            store,
            rng,
            in_flight: HashMap::new(),
        };

        if stale > 0 {
            warn!(shard = %shard.name, stale, "Cleared validation flags left by a previous run");
            shard.save_quests()?;
        }

        let dangling: Vec<EntityId> = shard
            .parties
            .assignments()
            .filter(|(_, issuer)| shard.registry.get_by_issuer(*issuer).is_none())
            .map(|(player, _)| player)
            .collect();
        for player in &dangling {
            warn!(shard = %shard.name, player = %player, "Dropping assignment to a missing quest");
            shard.parties.complete(*player);
        }
        if !dangling.is_empty() {
            shard.save_players()?;
        }

        info!(
            shard = %shard.name,
            quests = shard.registry.len(),
            areas = shard.areas.len(),
            "Quest shard opened"
        );
        Ok(shard)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Shard name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &QuestzConfig {
        &self.config
    }

    /// Quest registry.
    #[must_use]
    pub const fn registry(&self) -> &QuestRegistry {
        &self.registry
    }

    /// Claimed build areas.
    #[must_use]
    pub const fn areas(&self) -> &BuildingAreas {
        &self.areas
    }

    /// Player assignments and parties.
    #[must_use]
    pub const fn parties(&self) -> &PartyTracker {
        &self.parties
    }

    /// Offer cooldowns.
    #[must_use]
    pub const fn cooldowns(&self) -> &OfferCooldowns {
        &self.cooldowns
    }

    /// The quest the player is working, if any.
    #[must_use]
    pub fn quest_for_player(&self, player: EntityId) -> Option<&Quest> {
        self.parties
            .quest_of(player)
            .and_then(|issuer| self.registry.get_by_issuer(issuer))
    }

    // -----------------------------------------------------------------------
    // Offer / respond
    // -----------------------------------------------------------------------

    /// A player interacts with `agent`.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn offer<W: WorldView + ?Sized>(
        &mut self,
        player: EntityId,
        agent: &Agent,
        world: &W,
        now: DateTime<Utc>,
    ) -> Result<OfferOutcome> {
        if self.parties.quest_of(player) == Some(agent.id) {
            if let Some(quest) = self.registry.get_by_issuer(agent.id) {
                return Ok(OfferOutcome::Current(self.describe(quest, player)));
            }
            self.repair_dangling(player)?;
        }

        if self.registry.has_active(agent.id) {
            return Ok(OfferOutcome::Rejected(Rejection::QuestTaken));
        }

        if let Some(pending) = self
            .registry
            .get_by_issuer(agent.id)
            .filter(|q| !q.active && !q.completed)
        {
            return Ok(OfferOutcome::Offered(self.describe(pending, player)));
        }

        if !self.cooldowns.can_offer(agent.id, now) {
            let remaining = self.cooldowns.time_remaining(agent.id, now);
            return Ok(OfferOutcome::Cooldown { remaining });
        }

        if self.parties.has_active_quest(player) {
            return Ok(OfferOutcome::Rejected(Rejection::PlayerBusy));
        }

        let Some(quest) =
            self.generator
                .generate(agent, world, &mut self.areas, &mut self.rng, now)
        else {
            return Ok(OfferOutcome::NoQuest);
        };

        let offer = self.describe(&quest, player);
        let claimed = quest.quest_type.is_building();
        // A completed quest's claim stays with the finished building.
        self.registry.add(quest);
        self.save_quests()?;
        if claimed {
            self.save_areas()?;
        }
        Ok(OfferOutcome::Offered(offer))
    }

    /// The player accepts or declines the agent's pending quest.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn respond(
        &mut self,
        player: EntityId,
        issuer: EntityId,
        accept: bool,
        now: DateTime<Utc>,
    ) -> Result<RespondOutcome> {
        let Some(quest) = self.registry.get_by_issuer(issuer) else {
            return Ok(RespondOutcome::Rejected(Rejection::NoSuchQuest));
        };
        if quest.completed {
            return Ok(RespondOutcome::Rejected(Rejection::NoSuchQuest));
        }
        let taken = quest.active || !self.parties.players_on_quest(issuer).is_empty();
        let quest_type = quest.quest_type;
        let site = quest.quest_type.is_building().then(|| quest.site());

        if !accept {
            if !taken {
                self.drop_offer(issuer)?;
            }
            debug!(player = %player, issuer = %issuer, "Offer declined");
            return Ok(RespondOutcome::Declined);
        }

        if self.parties.has_active_quest(player) {
            if !taken {
                self.drop_offer(issuer)?;
            }
            return Ok(RespondOutcome::Rejected(Rejection::PlayerBusy));
        }
        if taken {
            return Ok(RespondOutcome::Rejected(Rejection::QuestTaken));
        }

        self.parties.assign(player, issuer);
        self.registry.activate(issuer);
        self.cooldowns.record_offer(issuer, now);
        self.save_quests()?;
        self.save_players()?;
        self.save_status()?;

        info!(player = %player, issuer = %issuer, quest_type = %quest_type, "Quest accepted");
        Ok(RespondOutcome::Accepted {
            issuer,
            quest_type,
            place_markers: quest_type.is_building(),
            site,
        })
    }

    /// Remove an unaccepted quest, releasing its claim when configured.
    fn drop_offer(&mut self, issuer: EntityId) -> Result<()> {
        self.registry.remove(issuer);
        self.save_quests()?;
        if self.config.areas.release_on_cancel && self.areas.release(issuer) > 0 {
            self.save_areas()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cancel / share
    // -----------------------------------------------------------------------

    /// The player abandons their quest for the whole party.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn cancel(&mut self, player: EntityId, issuer: EntityId) -> Result<CancelOutcome> {
        if self.parties.quest_of(player) != Some(issuer) {
            return Ok(CancelOutcome::Rejected(Rejection::NotOnQuest));
        }

        let mut affected = self.parties.party_of(player);
        affected.extend(self.parties.players_on_quest(issuer));
        for p in &affected {
            self.parties.complete(*p);
        }

        let site = self
            .registry
            .remove(issuer)
            .filter(|q| q.quest_type.is_building())
            .map(|q| q.site());
        self.in_flight.remove(&issuer);

        self.save_players()?;
        self.save_quests()?;
        if self.config.areas.release_on_cancel && self.areas.release(issuer) > 0 {
            self.save_areas()?;
        }

        info!(player = %player, issuer = %issuer, affected = affected.len(), "Quest cancelled");
        Ok(CancelOutcome::Cancelled { affected, site })
    }

    /// Share the owner's quest with every candidate who has none.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn share(
        &mut self,
        owner: EntityId,
        issuer: EntityId,
        candidates: &[EntityId],
    ) -> Result<ShareOutcome> {
        if self.parties.quest_of(owner) != Some(issuer) {
            return Ok(ShareOutcome::Rejected(Rejection::NotOnQuest));
        }

        let joined: Vec<EntityId> = candidates
            .iter()
            .copied()
            .filter(|c| *c != owner && self.parties.share(owner, *c))
            .collect();

        if !joined.is_empty() {
            self.save_players()?;
        }
        Ok(ShareOutcome::Shared(joined))
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// The player hands over `delivered` stacks for the agent's delivery quest.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn submit_delivery(
        &mut self,
        player: EntityId,
        issuer: EntityId,
        delivered: &[(Material, u32)],
        now: DateTime<Utc>,
    ) -> Result<DeliveryOutcome> {
        let Some(quest) = self.registry.get_by_issuer(issuer) else {
            if self.parties.quest_of(player) == Some(issuer) {
                self.repair_dangling(player)?;
            }
            return Ok(DeliveryOutcome::Rejected(Rejection::NoSuchQuest));
        };
        if !quest.is_delivery() {
            return Ok(DeliveryOutcome::Rejected(Rejection::NotDelivery));
        }
        if self.parties.quest_of(player) != Some(issuer) || !quest.is_open() {
            return Ok(DeliveryOutcome::Rejected(Rejection::NotOnQuest));
        }

        let missing = delivery_shortfall(&quest.required_materials, delivered);
        if !missing.is_empty() {
            debug!(player = %player, issuer = %issuer, missing = missing.len(), "Delivery short");
            return Ok(DeliveryOutcome::Shortfall { missing });
        }

        let consumed = quest.required_materials.clone();
        let completion = self.complete_for_all(issuer, now)?;
        Ok(DeliveryOutcome::Completed {
            completion,
            consumed,
        })
    }

    // -----------------------------------------------------------------------
    // Completion check
    // -----------------------------------------------------------------------

    /// Validate the player's building. On a structural pass the quest is
    /// locked and a ticket is returned for the pathfinding check.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn begin_completion_check<W: WorldView + ?Sized>(
        &mut self,
        player: EntityId,
        issuer: EntityId,
        agent_position: Option<BlockPos>,
        world: &W,
        now: DateTime<Utc>,
    ) -> Result<CompletionCheck> {
        let Some(quest) = self.registry.get_by_issuer(issuer) else {
            if self.parties.quest_of(player) == Some(issuer) {
                self.repair_dangling(player)?;
            }
            return Ok(CompletionCheck::Rejected(Rejection::NoSuchQuest));
        };
        if self.parties.quest_of(player) != Some(issuer) || !quest.is_open() {
            return Ok(CompletionCheck::Rejected(Rejection::NotOnQuest));
        }
        if quest.validation_in_progress {
            return Ok(CompletionCheck::Rejected(Rejection::ValidationInProgress));
        }
        if quest.is_delivery() {
            return Ok(CompletionCheck::Delivery {
                required: quest.required_materials.clone(),
                reward: quest.reward,
            });
        }

        let report = self.validator.validate(quest, world);
        if !report.valid {
            return Ok(CompletionCheck::Failed {
                reasons: report.reasons,
            });
        }
        let (Some(origin), Some(furniture)) = (agent_position, report.furniture) else {
            return Ok(CompletionCheck::Failed {
                reasons: vec![AGENT_MISSING.to_string()],
            });
        };

        let ticket = ReachabilityTicket {
            id: Uuid::new_v4(),
            issuer,
            player,
            origin,
            furniture,
        };
        self.registry.set_validation_in_progress(issuer, true);
        self.in_flight.insert(
            issuer,
            InFlight {
                ticket: ticket.id,
                started: now,
            },
        );
        self.save_quests()?;

        debug!(player = %player, issuer = %issuer, %furniture, "Structure passed; awaiting reachability");
        Ok(CompletionCheck::AwaitingReachability(ticket))
    }

    /// Report the pathfinding result for `ticket`. The quest is unlocked
    /// before anything else happens.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn finish_completion_check(
        &mut self,
        ticket: &ReachabilityTicket,
        verdict: ReachVerdict,
        now: DateTime<Utc>,
    ) -> Result<CheckOutcome> {
        let current = self
            .in_flight
            .get(&ticket.issuer)
            .is_some_and(|f| f.ticket == ticket.id);
        if !current {
            debug!(issuer = %ticket.issuer, "Ignoring result for a finished check");
            return Ok(CheckOutcome::Rejected(Rejection::StaleCheck));
        }

        self.in_flight.remove(&ticket.issuer);
        if !self.registry.set_validation_in_progress(ticket.issuer, false) {
            return Ok(CheckOutcome::Rejected(Rejection::NoSuchQuest));
        }
        self.save_quests()?;

        let reason = match verdict {
            ReachVerdict::Reached => {
                return self.complete_for_all(ticket.issuer, now).map(CheckOutcome::Completed);
            }
            ReachVerdict::CannotReachFurniture => CANNOT_REACH.to_string(),
            ReachVerdict::CannotReturn => CANNOT_RETURN.to_string(),
            ReachVerdict::TimedOut => CHECK_TIMED_OUT.to_string(),
            ReachVerdict::Failed(e) => {
                warn!(issuer = %ticket.issuer, error = %e, "Reachability check failed");
                e
            }
        };
        Ok(CheckOutcome::Failed {
            reasons: vec![reason],
        })
    }

    /// Both halves of the completion check, with an in-process pathfinder.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn check_completion<W, R>(
        &mut self,
        player: EntityId,
        issuer: EntityId,
        agent_position: Option<BlockPos>,
        world: &W,
        reach: &R,
        now: DateTime<Utc>,
    ) -> Result<CheckOutcome>
    where
        W: WorldView + ?Sized,
        R: Reachability + ?Sized,
    {
        match self.begin_completion_check(player, issuer, agent_position, world, now)? {
            CompletionCheck::AwaitingReachability(ticket) => {
                let verdict = reachability_verdict(reach, &ticket);
                self.finish_completion_check(&ticket, verdict, now)
            }
            CompletionCheck::Delivery { required, reward } => {
                Ok(CheckOutcome::Delivery { required, reward })
            }
            CompletionCheck::Failed { reasons } => Ok(CheckOutcome::Failed { reasons }),
            CompletionCheck::Rejected(r) => Ok(CheckOutcome::Rejected(r)),
        }
    }

    /// Unlock every check that has been running longer than the configured
    /// timeout. Returns the affected issuers.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn expire_stale_validations(&mut self, now: DateTime<Utc>) -> Result<Vec<EntityId>> {
        let timeout = self.config.validation_timeout();
        let stale: Vec<EntityId> = self
            .in_flight
            .iter()
            .filter(|(_, f)| now - f.started >= timeout)
            .map(|(issuer, _)| *issuer)
            .collect();

        for issuer in &stale {
            self.in_flight.remove(issuer);
            self.registry.set_validation_in_progress(*issuer, false);
            warn!(issuer = %issuer, "Completion check timed out");
        }
        if !stale.is_empty() {
            self.save_quests()?;
        }
        Ok(stale)
    }

    // -----------------------------------------------------------------------
    // Agent lifecycle / markers
    // -----------------------------------------------------------------------

    /// The agent died or despawned: drop its quest and everyone on it.
    /// Returns the players who lost the quest.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn on_agent_removed(&mut self, agent: EntityId) -> Result<BTreeSet<EntityId>> {
        let removed = self.registry.remove(agent);
        let cleared = self.parties.clear_quest(agent);
        self.in_flight.remove(&agent);
        self.cooldowns.forget(agent);

        if removed.is_some() {
            self.save_quests()?;
        }
        if !cleared.is_empty() {
            self.save_players()?;
        }
        self.save_status()?;
        if self.config.areas.release_on_cancel && self.areas.release(agent) > 0 {
            self.save_areas()?;
        }

        if removed.is_some() || !cleared.is_empty() {
            info!(issuer = %agent, players = cleared.len(), "Removed quest of departed agent");
        }
        Ok(cleared)
    }

    /// Periodic sweep: flag agents whose cooldown ended, time out stuck
    /// checks, and report which of `nearby` agents to highlight.
    ///
    /// An agent that has never offered counts as offerable.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn sweep(&mut self, nearby: &[EntityId], now: DateTime<Utc>) -> Result<MarkerSnapshot> {
        if self.cooldowns.refresh_markers(now) > 0 {
            self.save_status()?;
        }
        self.expire_stale_validations(now)?;

        let mut snapshot = MarkerSnapshot::default();
        for agent in nearby {
            if self.registry.has_active(*agent) {
                snapshot.active.insert(*agent);
            } else if self.cooldowns.can_offer(*agent, now)
                && (self.cooldowns.has_marker(*agent) || !self.cooldowns.is_tracked(*agent))
            {
                snapshot.offerable.insert(*agent);
            }
        }
        Ok(snapshot)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Finish the issuer's quest for every player on it.
    fn complete_for_all(&mut self, issuer: EntityId, now: DateTime<Utc>) -> Result<Completion> {
        self.registry.complete(issuer);
        self.cooldowns.record_completion(issuer, now);
        let beneficiaries = self.parties.clear_quest(issuer);

        let (quest_type, reward, site) = self
            .registry
            .get_by_issuer(issuer)
            .map(|q| (q.quest_type, q.reward, q.quest_type.is_building().then(|| q.site())))
            .unwrap_or((QuestType::Delivery, 0, None));

        self.save_quests()?;
        self.save_players()?;
        self.save_status()?;

        info!(
            issuer = %issuer,
            quest_type = %quest_type,
            reward,
            players = beneficiaries.len(),
            "Quest completed"
        );
        Ok(Completion {
            issuer,
            quest_type,
            reward,
            beneficiaries,
            site,
        })
    }

    fn describe(&self, quest: &Quest, viewer: EntityId) -> QuestOffer {
        let site = quest.site();
        let is_current = self.parties.quest_of(viewer) == Some(quest.issuer);
        let party = if is_current {
            self.parties
                .party_of(viewer)
                .into_iter()
                .filter(|p| *p != viewer)
                .collect()
        } else {
            Vec::new()
        };
        QuestOffer {
            issuer: quest.issuer,
            quest_type: quest.quest_type,
            site: quest.quest_type.is_building().then_some(site),
            width: site.width(),
            length: site.length(),
            height: site.height(),
            required: quest.required_materials.clone(),
            reward: quest.reward,
            is_current,
            player_has_quest: self.parties.has_active_quest(viewer),
            party,
        }
    }

    /// Drop the player's assignment if its quest no longer exists.
    fn repair_dangling(&mut self, player: EntityId) -> Result<()> {
        if let Some(issuer) = self.parties.quest_of(player) {
            if self.registry.get_by_issuer(issuer).is_none() {
                warn!(player = %player, issuer = %issuer, "Cleared assignment to a missing quest");
                self.parties.complete(player);
                self.save_players()?;
            }
        }
        Ok(())
    }

    fn save_quests(&self) -> Result<()> {
        save_json(self.store.as_ref(), &self.name, QUESTS_STORE, &self.registry)
    }

    fn save_areas(&self) -> Result<()> {
        save_json(self.store.as_ref(), &self.name, AREAS_STORE, &self.areas)
    }

    fn save_players(&self) -> Result<()> {
        save_json(self.store.as_ref(), &self.name, PLAYERS_STORE, &self.parties)
    }

    fn save_status(&self) -> Result<()> {
        save_json(self.store.as_ref(), &self.name, STATUS_STORE, &self.cooldowns)
    }
}
