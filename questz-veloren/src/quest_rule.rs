//! Quest Rule — routes Veloren quest requests into a [`QuestShard`].
//!
//! In a full Veloren integration this would implement `rtsim::Rule` and be
//! driven from the server's event handlers. Veloren-side state the rule
//! needs (block lookups, NPC positions, who is standing nearby, pathfinding)
//! comes in through [`GameContext`], so the rule itself stays testable
//! against a [`SparseWorld`](questz_core::world::SparseWorld).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use questz_core::error::Result;
use questz_core::persistence::StateStore;
use questz_core::shard::{
    CancelOutcome, CheckOutcome, Completion, CompletionCheck, DeliveryOutcome, MarkerSnapshot,
    OfferOutcome, ReachVerdict, ReachabilityTicket, RespondOutcome, ShareOutcome,
};
use questz_core::{Agent, EntityId, QuestShard, QuestType, Reachability, WorldView};
use tracing::{debug, info};

use crate::bridge::EntityRegistry;
use crate::config::VelorenQuestConfig;
use crate::events::{Addressed, QuestReply, QuestRequest};

/// Shown while the pathfinding check runs.
pub const CHECKING: &str = "The villager is checking the building...";
/// Sharing with nobody around.
pub const NOBODY_NEARBY: &str = "No players nearby to share quest with!";
/// Sharing where everyone nearby is busy.
pub const NOBODY_ELIGIBLE: &str = "No eligible players nearby (they may already have quests).";

// ---------------------------------------------------------------------------
// Game context
// ---------------------------------------------------------------------------

/// What the quest rule needs from the running game.
pub trait GameContext {
    /// Block lookups for the shard's world.
    fn world(&self) -> &dyn WorldView;

    /// Current identity, position and role of an agent, if it still exists.
    fn agent(&self, id: EntityId) -> Option<Agent>;

    /// Players within `radius` of `player`, excluding `player`.
    fn players_near(&self, player: EntityId, radius: f32) -> Vec<EntityId>;

    /// Agents within `radius` of `player`.
    fn agents_near(&self, player: EntityId, radius: f32) -> Vec<EntityId>;

    /// Everyone currently online.
    fn online_players(&self) -> Vec<EntityId>;

    /// Pathfinder for reachability checks. Runs off the server thread.
    fn reachability(&self) -> Arc<dyn Reachability + Send + Sync>;
}

/// What handling a request produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Handled {
    /// Replies to deliver.
    pub replies: Vec<Addressed>,
    /// A pathfinding check to run; see
    /// [`run_reachability_check`](crate::systems::run_reachability_check).
    pub pending: Option<ReachabilityTicket>,
}

impl Handled {
    fn reply(to: EntityId, reply: QuestReply) -> Self {
        Self {
            replies: vec![Addressed::new(to, reply)],
            pending: None,
        }
    }

    fn message(to: EntityId, text: impl Into<String>) -> Self {
        Self::reply(to, QuestReply::Message(text.into()))
    }
}

// ---------------------------------------------------------------------------
// Quest Rule
// ---------------------------------------------------------------------------

/// Central state for the quest rule: one shard plus Veloren-side lookups.
#[derive(Debug)]
pub struct QuestRule {
    shard: QuestShard,
    /// Veloren ↔ QUESTZ identity map.
    pub entities: EntityRegistry,
    config: VelorenQuestConfig,
}

impl QuestRule {
    /// Open the rule for world shard `name`.
    ///
    /// # Errors
    /// Returns an error if saved state cannot be loaded.
    pub fn open(
        name: impl Into<String>,
        config: VelorenQuestConfig,
        store: Box<dyn StateStore>,
    ) -> Result<Self> {
        let shard = QuestShard::open(name, config.core.clone(), store)?;
        Ok(Self {
            shard,
            entities: EntityRegistry::new(),
            config,
        })
    }

    /// Wrap an already opened shard.
    #[must_use]
    pub fn with_shard(shard: QuestShard, config: VelorenQuestConfig) -> Self {
        Self {
            shard,
            entities: EntityRegistry::new(),
            config,
        }
    }

    /// The underlying shard.
    #[must_use]
    pub const fn shard(&self) -> &QuestShard {
        &self.shard
    }

    /// Integration config.
    #[must_use]
    pub const fn config(&self) -> &VelorenQuestConfig {
        &self.config
    }

    /// Route one request.
    ///
    /// # Errors
    /// Returns an error only when quest state cannot be saved.
    pub fn handle<C: GameContext + ?Sized>(
        &mut self,
        request: QuestRequest,
        ctx: &C,
        now: DateTime<Utc>,
    ) -> Result<Handled> {
        if !self.config.core.general.enabled {
            return Ok(Handled::default());
        }
        debug!(?request, "Quest request");
        match request {
            QuestRequest::Interact { player, agent } => self.on_interact(player, agent, ctx, now),
            QuestRequest::Respond {
                player,
                agent,
                accept,
            } => self.on_respond(player, agent, accept, now),
            QuestRequest::Cancel { player, agent } => self.on_cancel(player, agent),
            QuestRequest::Share { player, agent } => self.on_share(player, agent, ctx),
            QuestRequest::CheckCompletion { player, agent } => {
                self.on_check(player, agent, ctx, now)
            }
            QuestRequest::SubmitDelivery {
                player,
                agent,
                items,
            } => self.on_delivery(player, agent, &items, now),
            QuestRequest::AgentRemoved { agent } => {
                let players = self.shard.on_agent_removed(agent)?;
                let replies = players
                    .into_iter()
                    .map(|p| Addressed::message(p, "Your quest giver is gone. The quest was lost."))
                    .collect();
                Ok(Handled {
                    replies,
                    pending: None,
                })
            }
        }
    }

    /// Report a pathfinding verdict for a ticket from [`handle`](Self::handle).
    ///
    /// # Errors
    /// Returns an error only when quest state cannot be saved.
    pub fn finish_check(
        &mut self,
        ticket: &ReachabilityTicket,
        verdict: ReachVerdict,
        now: DateTime<Utc>,
    ) -> Result<Vec<Addressed>> {
        let outcome = self.shard.finish_completion_check(ticket, verdict, now)?;
        Ok(match outcome {
            CheckOutcome::Completed(completion) => completion_replies(&completion),
            CheckOutcome::Failed { reasons } => vec![failure(ticket.player, reasons)],
            CheckOutcome::Rejected(r) => vec![Addressed::message(ticket.player, r.to_string())],
            CheckOutcome::Delivery { required, reward } => vec![Addressed::new(
                ticket.player,
                QuestReply::DeliveryScreen {
                    agent: ticket.issuer,
                    required,
                    reward,
                },
            )],
        })
    }

    /// Marker sweep over every agent near an online player.
    ///
    /// # Errors
    /// Returns an error only when quest state cannot be saved.
    pub fn sync_markers<C: GameContext + ?Sized>(
        &mut self,
        ctx: &C,
        now: DateTime<Utc>,
    ) -> Result<MarkerSnapshot> {
        let mut nearby: Vec<EntityId> = ctx
            .online_players()
            .into_iter()
            .flat_map(|p| ctx.agents_near(p, self.config.marker_radius))
            .collect();
        nearby.sort_unstable();
        nearby.dedup();
        self.shard.sweep(&nearby, now)
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn on_interact<C: GameContext + ?Sized>(
        &mut self,
        player: EntityId,
        agent_id: EntityId,
        ctx: &C,
        now: DateTime<Utc>,
    ) -> Result<Handled> {
        let Some(agent) = ctx.agent(agent_id) else {
            return Ok(Handled::message(player, questz_core::shard::AGENT_MISSING));
        };
        let handled = match self.shard.offer(player, &agent, ctx.world(), now)? {
            OfferOutcome::Offered(offer) => Handled::reply(player, QuestReply::OfferScreen(offer)),
            OfferOutcome::Current(offer) => {
                Handled::reply(player, QuestReply::CurrentQuestScreen(offer))
            }
            OfferOutcome::Cooldown { remaining } => Handled::message(
                player,
                format!(
                    "This villager has no quests available. Try again in {} minutes.",
                    remaining.num_minutes() + 1
                ),
            ),
            OfferOutcome::NoQuest => {
                Handled::message(player, "This villager has no quests available right now.")
            }
            OfferOutcome::Rejected(r) => Handled::message(player, r.to_string()),
        };
        Ok(handled)
    }

    fn on_respond(
        &mut self,
        player: EntityId,
        agent: EntityId,
        accept: bool,
        now: DateTime<Utc>,
    ) -> Result<Handled> {
        let handled = match self.shard.respond(player, agent, accept, now)? {
            RespondOutcome::Accepted {
                issuer,
                quest_type,
                place_markers,
                site,
            } => {
                let text = if quest_type == QuestType::Delivery {
                    "Delivery quest accepted! Check your Quest Book."
                } else {
                    "Quest accepted! Check your Quest Book for details."
                };
                let mut replies = vec![
                    Addressed::new(
                        player,
                        QuestReply::Accepted {
                            agent: issuer,
                            quest_type,
                        },
                    ),
                    Addressed::message(player, text),
                ];
                if let Some(site) = site.filter(|_| place_markers) {
                    replies.push(Addressed::new(
                        player,
                        QuestReply::SiteMarkers { site, place: true },
                    ));
                }
                Handled {
                    replies,
                    pending: None,
                }
            }
            RespondOutcome::Declined => Handled::default(),
            RespondOutcome::Rejected(r) => Handled::message(player, r.to_string()),
        };
        Ok(handled)
    }

    fn on_cancel(&mut self, player: EntityId, agent: EntityId) -> Result<Handled> {
        let handled = match self.shard.cancel(player, agent)? {
            CancelOutcome::Cancelled { affected, site } => {
                let mut replies: Vec<Addressed> = affected
                    .iter()
                    .map(|p| Addressed::message(*p, "Quest has been cancelled."))
                    .collect();
                if let Some(site) = site {
                    replies.push(Addressed::new(
                        player,
                        QuestReply::SiteMarkers { site, place: false },
                    ));
                }
                Handled {
                    replies,
                    pending: None,
                }
            }
            CancelOutcome::Rejected(_) => {
                Handled::message(player, "You don't have an active quest from this villager!")
            }
        };
        Ok(handled)
    }

    fn on_share<C: GameContext + ?Sized>(
        &mut self,
        player: EntityId,
        agent: EntityId,
        ctx: &C,
    ) -> Result<Handled> {
        let candidates = ctx.players_near(player, self.config.share_radius);
        if candidates.is_empty() {
            return Ok(Handled::message(player, NOBODY_NEARBY));
        }
        let handled = match self.shard.share(player, agent, &candidates)? {
            ShareOutcome::Shared(joined) if joined.is_empty() => {
                Handled::message(player, NOBODY_ELIGIBLE)
            }
            ShareOutcome::Shared(joined) => {
                info!(owner = %player, issuer = %agent, joined = joined.len(), "Quest shared");
                let mut replies = vec![Addressed::message(player, "Quest shared with nearby players!")];
                replies.extend(
                    joined
                        .into_iter()
                        .map(|p| Addressed::message(p, "A quest has been shared with you! Check your Quest Book.")),
                );
                Handled {
                    replies,
                    pending: None,
                }
            }
            ShareOutcome::Rejected(_) => Handled::message(player, "You don't have an active quest."),
        };
        Ok(handled)
    }

    fn on_check<C: GameContext + ?Sized>(
        &mut self,
        player: EntityId,
        agent: EntityId,
        ctx: &C,
        now: DateTime<Utc>,
    ) -> Result<Handled> {
        let position = ctx.agent(agent).map(|a| a.position);
        let handled = match self
            .shard
            .begin_completion_check(player, agent, position, ctx.world(), now)?
        {
            CompletionCheck::Delivery { required, reward } => Handled::reply(
                player,
                QuestReply::DeliveryScreen {
                    agent,
                    required,
                    reward,
                },
            ),
            CompletionCheck::Failed { reasons } => Handled {
                replies: vec![failure(player, reasons)],
                pending: None,
            },
            CompletionCheck::AwaitingReachability(ticket) => Handled {
                replies: vec![Addressed::message(player, CHECKING)],
                pending: Some(ticket),
            },
            CompletionCheck::Rejected(r) => Handled::message(player, r.to_string()),
        };
        Ok(handled)
    }

    fn on_delivery(
        &mut self,
        player: EntityId,
        agent: EntityId,
        items: &[(questz_core::Material, u32)],
        now: DateTime<Utc>,
    ) -> Result<Handled> {
        let handled = match self.shard.submit_delivery(player, agent, items, now)? {
            DeliveryOutcome::Completed {
                completion,
                consumed,
            } => {
                let mut replies = vec![Addressed::new(player, QuestReply::TakeItems(consumed))];
                replies.extend(completion_replies(&completion));
                Handled {
                    replies,
                    pending: None,
                }
            }
            DeliveryOutcome::Shortfall { missing } => Handled {
                replies: vec![failure(player, missing)],
                pending: None,
            },
            DeliveryOutcome::Rejected(r) => Handled::message(player, r.to_string()),
        };
        Ok(handled)
    }
}

fn failure(player: EntityId, reasons: Vec<String>) -> Addressed {
    Addressed::new(
        player,
        QuestReply::Result {
            success: false,
            reward: 0,
            reasons,
        },
    )
}

fn completion_replies(completion: &Completion) -> Vec<Addressed> {
    let mut replies: Vec<Addressed> = completion
        .beneficiaries
        .iter()
        .map(|p| {
            Addressed::new(
                *p,
                QuestReply::Result {
                    success: true,
                    reward: completion.reward,
                    reasons: Vec::new(),
                },
            )
        })
        .collect();
    if let Some(site) = completion.site {
        replies.extend(
            completion
                .beneficiaries
                .iter()
                .map(|p| Addressed::new(*p, QuestReply::SiteMarkers { site, place: false })),
        );
    }
    replies
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use questz_core::persistence::MemoryStore;
    use questz_core::world::SparseWorld;
    use questz_core::{BlockPos, Role};
    use std::collections::HashMap;

    /// A tiny stand-in for the Veloren server.
    pub(crate) struct TestGame {
        pub world: SparseWorld,
        pub agents: HashMap<EntityId, Agent>,
        pub players: Vec<EntityId>,
        pub reach: Arc<dyn Reachability + Send + Sync>,
    }

    impl TestGame {
        pub(crate) fn new() -> Self {
            Self {
                world: SparseWorld::flat(0),
                agents: HashMap::new(),
                players: Vec::new(),
                reach: Arc::new(|_: BlockPos, _: BlockPos| true),
            }
        }

        pub(crate) fn spawn(&mut self, role: Role) -> EntityId {
            let id = EntityId::new();
            self.agents
                .insert(id, Agent::new(id, BlockPos::new(0, 1, 0), role));
            id
        }

        pub(crate) fn join(&mut self) -> EntityId {
            let id = EntityId::new();
            self.players.push(id);
            id
        }
    }

    impl GameContext for TestGame {
        fn world(&self) -> &dyn WorldView {
            &self.world
        }

        fn agent(&self, id: EntityId) -> Option<Agent> {
            self.agents.get(&id).copied()
        }

        fn players_near(&self, player: EntityId, _radius: f32) -> Vec<EntityId> {
            self.players.iter().copied().filter(|p| *p != player).collect()
        }

        fn agents_near(&self, _player: EntityId, _radius: f32) -> Vec<EntityId> {
            self.agents.keys().copied().collect()
        }

        fn online_players(&self) -> Vec<EntityId> {
            self.players.clone()
        }

        fn reachability(&self) -> Arc<dyn Reachability + Send + Sync> {
            Arc::clone(&self.reach)
        }
    }

    pub(crate) fn delivery_rule() -> QuestRule {
        let mut config = VelorenQuestConfig::default();
        config.core.generation.enable_building_quests = false;
        QuestRule::open("test", config, Box::new(MemoryStore::new())).expect("open")
    }

    fn messages(handled: &Handled) -> Vec<&str> {
        handled
            .replies
            .iter()
            .filter_map(|a| match &a.reply {
                QuestReply::Message(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn interact_opens_offer_then_current_screen() {
        let mut game = TestGame::new();
        let mut rule = delivery_rule();
        let farmer = game.spawn(Role::Farmer);
        let player = game.join();
        let now = Utc::now();

        let first = rule
            .handle(QuestRequest::Interact { player, agent: farmer }, &game, now)
            .expect("interact");
        assert!(matches!(first.replies[0].reply, QuestReply::OfferScreen(_)));

        let accepted = rule
            .handle(QuestRequest::Respond { player, agent: farmer, accept: true }, &game, now)
            .expect("respond");
        assert_eq!(
            messages(&accepted),
            vec!["Delivery quest accepted! Check your Quest Book."]
        );

        let again = rule
            .handle(QuestRequest::Interact { player, agent: farmer }, &game, now)
            .expect("interact");
        assert!(matches!(again.replies[0].reply, QuestReply::CurrentQuestScreen(_)));
    }

    #[test]
    fn unknown_agent_is_reported() {
        let game = TestGame::new();
        let mut rule = delivery_rule();
        let player = EntityId::new();
        let handled = rule
            .handle(QuestRequest::Interact { player, agent: EntityId::new() }, &game, Utc::now())
            .expect("interact");
        assert_eq!(messages(&handled), vec![questz_core::shard::AGENT_MISSING]);
    }

    #[test]
    fn share_without_company_says_so() {
        let mut game = TestGame::new();
        let mut rule = delivery_rule();
        let farmer = game.spawn(Role::Farmer);
        let player = game.join();
        let now = Utc::now();
        rule.handle(QuestRequest::Interact { player, agent: farmer }, &game, now).expect("interact");
        rule.handle(QuestRequest::Respond { player, agent: farmer, accept: true }, &game, now)
            .expect("respond");

        let alone = rule
            .handle(QuestRequest::Share { player, agent: farmer }, &game, now)
            .expect("share");
        assert_eq!(messages(&alone), vec![NOBODY_NEARBY]);

        let friend = game.join();
        let shared = rule
            .handle(QuestRequest::Share { player, agent: farmer }, &game, now)
            .expect("share");
        assert_eq!(shared.replies.len(), 2);
        assert_eq!(rule.shard().parties().quest_of(friend), Some(farmer));
    }

    #[test]
    fn delivery_pays_everyone_and_takes_items_once() {
        let mut game = TestGame::new();
        let mut rule = delivery_rule();
        let farmer = game.spawn(Role::Farmer);
        let player = game.join();
        let now = Utc::now();
        rule.handle(QuestRequest::Interact { player, agent: farmer }, &game, now).expect("interact");
        rule.handle(QuestRequest::Respond { player, agent: farmer, accept: true }, &game, now)
            .expect("respond");

        let required = rule
            .shard()
            .quest_for_player(player)
            .expect("quest")
            .required_materials
            .clone();
        let handled = rule
            .handle(
                QuestRequest::SubmitDelivery {
                    player,
                    agent: farmer,
                    items: required.clone().into_iter().collect(),
                },
                &game,
                now,
            )
            .expect("deliver");
        assert_eq!(
            handled.replies[0],
            Addressed::new(player, QuestReply::TakeItems(required))
        );
        assert!(matches!(
            handled.replies[1].reply,
            QuestReply::Result { success: true, .. }
        ));
    }

    #[test]
    fn cooldown_message_rounds_up() {
        let mut game = TestGame::new();
        let mut rule = delivery_rule();
        let farmer = game.spawn(Role::Farmer);
        let player = game.join();
        let now = Utc::now();
        rule.handle(QuestRequest::Interact { player, agent: farmer }, &game, now).expect("interact");
        rule.handle(QuestRequest::Respond { player, agent: farmer, accept: true }, &game, now)
            .expect("respond");
        rule.handle(QuestRequest::Cancel { player, agent: farmer }, &game, now).expect("cancel");

        let later = now + chrono::Duration::seconds(30);
        let handled = rule
            .handle(QuestRequest::Interact { player, agent: farmer }, &game, later)
            .expect("interact");
        assert_eq!(
            messages(&handled),
            vec!["This villager has no quests available. Try again in 60 minutes."]
        );
    }

    #[test]
    fn markers_follow_quest_state() {
        let mut game = TestGame::new();
        let mut rule = delivery_rule();
        let farmer = game.spawn(Role::Farmer);
        let idle = game.spawn(Role::Librarian);
        let player = game.join();
        let now = Utc::now();
        rule.handle(QuestRequest::Interact { player, agent: farmer }, &game, now).expect("interact");
        rule.handle(QuestRequest::Respond { player, agent: farmer, accept: true }, &game, now)
            .expect("respond");

        let snapshot = rule.sync_markers(&game, now).expect("sync");
        assert!(snapshot.active.contains(&farmer));
        assert!(snapshot.offerable.contains(&idle));
        assert!(!snapshot.offerable.contains(&farmer));
    }
}
