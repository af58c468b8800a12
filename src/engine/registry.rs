//! Match Registry
//!
//! Owns every live match and routes requests to the coordinator for its
//! mode. The registry lock guards membership only: a handle is cloned out
//! and the registry lock released before the per-match lock is taken, so
//! the two are never held together.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::core::rng::{entropy_seed, DeterministicRng};
use crate::directory::{troops_for, PlayerDirectory, TemplateCatalog};
use crate::engine::action::{ActionOutcome, EnhancedAction, EnhancedResult, MatchAction, TurnAction, TurnResult};
use crate::engine::broadcast::EventBroadcaster;
use crate::engine::enhanced::{EnhancedCoordinator, EnhancedSession};
use crate::engine::simple::SimpleCoordinator;
use crate::engine::snapshot::MatchSnapshot;
use crate::error::EngineError;
use crate::game::combat::CombatResolver;
use crate::game::events::{EndReason, MatchEvent};
use crate::game::player::{Combatant, PlayerId};
use crate::game::state::{MatchId, MatchMode, MatchPhase, MatchState, Side, MATCH_CAPACITY};

/// A live match, locked independently of the registry.
#[derive(Clone, Debug)]
pub enum MatchHandle {
    /// Turn-based match.
    Simple(Arc<Mutex<MatchState>>),
    /// Real-time match with its timers.
    Enhanced(Arc<EnhancedSession>),
}

impl MatchHandle {
    /// Mode of the match.
    pub fn mode(&self) -> MatchMode {
        match self {
            MatchHandle::Simple(_) => MatchMode::Simple,
            MatchHandle::Enhanced(_) => MatchMode::Enhanced,
        }
    }
}

/// Result of a successful join.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Seat taken.
    pub side: Side,
    /// This join filled the match and started it.
    pub started: bool,
}

/// Registry-wide counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    /// Live matches.
    pub total_matches: usize,
    /// Matches in progress.
    pub active_matches: usize,
    /// Count per mode.
    pub matches_by_mode: BTreeMap<String, usize>,
    /// Count per lifecycle phase.
    pub matches_by_state: BTreeMap<String, usize>,
    /// Mean length of finished matches.
    pub average_duration_secs: Option<f64>,
}

/// All live matches.
pub struct MatchRegistry {
    matches: RwLock<BTreeMap<MatchId, MatchHandle>>,
    config: EngineConfig,
    directory: Arc<dyn PlayerDirectory>,
    catalog: Arc<dyn TemplateCatalog>,
    broadcaster: Arc<EventBroadcaster>,
    simple: SimpleCoordinator,
    enhanced: EnhancedCoordinator,
}

impl MatchRegistry {
    /// Create a registry. Construct once and share it behind an `Arc`.
    pub fn new(
        config: EngineConfig,
        directory: Arc<dyn PlayerDirectory>,
        catalog: Arc<dyn TemplateCatalog>,
    ) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let simple = SimpleCoordinator::new(
            config.simple.clone(),
            CombatResolver::new(config.enhanced.crit_multiplier),
            directory.clone(),
        );
        let enhanced = EnhancedCoordinator::new(config.enhanced.clone(), directory.clone(), broadcaster.clone());

        Self {
            matches: RwLock::new(BTreeMap::new()),
            config,
            directory,
            catalog,
            broadcaster,
            simple,
            enhanced,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The event broadcaster.
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Clone a match handle out under the registry read lock.
    async fn handle(&self, id: &MatchId) -> Result<MatchHandle, EngineError> {
        self.matches
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::MatchNotFound(id.clone()))
    }

    /// Create an empty match.
    #[instrument(skip(self))]
    pub async fn create_match(&self, id: &str, mode: MatchMode) -> Result<MatchId, EngineError> {
        let id = MatchId::parse(id)?;

        let mut matches = self.matches.write().await;
        if matches.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let base_seed = self.config.rng_seed.unwrap_or_else(entropy_seed);
        let game = MatchState::new(id.clone(), mode, DeterministicRng::for_match(base_seed, id.as_str()));
        let handle = match mode {
            MatchMode::Simple => MatchHandle::Simple(Arc::new(Mutex::new(game))),
            MatchMode::Enhanced => MatchHandle::Enhanced(EnhancedSession::new(game)),
        };
        matches.insert(id.clone(), handle);

        info!("Created {} match {}", mode, id);
        Ok(id)
    }

    /// Seat a player; the second join starts the match.
    #[instrument(skip(self))]
    pub async fn join_match(&self, id: &MatchId, player_id: &PlayerId) -> Result<JoinOutcome, EngineError> {
        let outcome = match self.handle(id).await? {
            MatchHandle::Simple(game) => {
                let mut game = game.lock().await;
                let from = game.events.len();

                let side = self.seat(&mut game, player_id)?;
                let started = game.player_count() == MATCH_CAPACITY;
                if started {
                    self.simple.start(&mut game)?;
                }

                self.broadcaster.publish_log(&game, from);
                JoinOutcome { side, started }
            }
            MatchHandle::Enhanced(session) => {
                let mut state = session.lock().await;
                let from = state.game.events.len();

                let side = self.seat(&mut state.game, player_id)?;
                let started = state.game.player_count() == MATCH_CAPACITY;
                if started {
                    self.enhanced.start(&session, &mut state)?;
                }

                self.broadcaster.publish_log(&state.game, from);
                JoinOutcome { side, started }
            }
        };

        info!("Player {} joined match {} as {:?}", player_id, id, outcome.side);
        Ok(outcome)
    }

    /// Capacity checks, directory lookup and seating. Caller holds the match lock.
    fn seat(&self, game: &mut MatchState, player_id: &PlayerId) -> Result<Side, EngineError> {
        if game.side_of(player_id).is_some() {
            return Err(EngineError::AlreadyJoined(player_id.clone()));
        }
        if game.phase != MatchPhase::Waiting || game.player_count() >= MATCH_CAPACITY {
            return Err(EngineError::MatchFull);
        }

        let player = self.directory.load_player(player_id)?;
        let troops = troops_for(&player, self.catalog.as_ref());
        if troops.is_empty() {
            return Err(EngineError::NoTroops(player_id.clone()));
        }

        let combatant = Combatant::new(player, troops, &self.catalog.tower_templates());
        game.add_player(combatant)
    }

    /// Route an action to the coordinator for the match's mode.
    #[instrument(skip(self))]
    pub async fn dispatch_action(
        &self,
        id: &MatchId,
        player_id: &PlayerId,
        action: MatchAction,
    ) -> Result<ActionOutcome, EngineError> {
        let outcome = match (self.handle(id).await?, action) {
            (MatchHandle::Simple(game), MatchAction::Turn(action)) => {
                let mut game = game.lock().await;
                let from = game.events.len();
                let result = self.simple.process_turn(&mut game, player_id, &action);
                self.broadcaster.publish_log(&game, from);
                ActionOutcome::Turn(result)
            }
            (MatchHandle::Enhanced(session), MatchAction::Enhanced(action)) => {
                let mut state = session.lock().await;
                let from = state.game.events.len();
                let result = self.enhanced.process_action(&mut state, player_id, &action, Instant::now());
                self.broadcaster.publish_log(&state.game, from);
                ActionOutcome::Enhanced(result)
            }
            (handle, action) => {
                return Err(EngineError::WrongMode {
                    expected: action.mode(),
                    actual: handle.mode(),
                })
            }
        };

        Ok(outcome)
    }

    /// Apply a simple mode turn.
    pub async fn process_turn(
        &self,
        id: &MatchId,
        player_id: &PlayerId,
        action: TurnAction,
    ) -> Result<TurnResult, EngineError> {
        match self.dispatch_action(id, player_id, action.into()).await? {
            ActionOutcome::Turn(result) => Ok(result),
            ActionOutcome::Enhanced(_) => Err(EngineError::WrongMode {
                expected: MatchMode::Simple,
                actual: MatchMode::Enhanced,
            }),
        }
    }

    /// Apply an enhanced mode action.
    pub async fn process_enhanced_action(
        &self,
        id: &MatchId,
        player_id: &PlayerId,
        action: EnhancedAction,
    ) -> Result<EnhancedResult, EngineError> {
        match self.dispatch_action(id, player_id, action.into()).await? {
            ActionOutcome::Enhanced(result) => Ok(result),
            ActionOutcome::Turn(_) => Err(EngineError::WrongMode {
                expected: MatchMode::Enhanced,
                actual: MatchMode::Simple,
            }),
        }
    }

    /// Actions the turn holder of a simple match may take.
    pub async fn available_actions(&self, id: &MatchId, player_id: &PlayerId) -> Result<Vec<String>, EngineError> {
        match self.handle(id).await? {
            MatchHandle::Simple(game) => {
                let game = game.lock().await;
                Ok(self.simple.available_actions(&game, player_id)?)
            }
            MatchHandle::Enhanced(_) => Err(EngineError::WrongMode {
                expected: MatchMode::Simple,
                actual: MatchMode::Enhanced,
            }),
        }
    }

    /// Snapshot of a match. Enhanced matches catch up on mana first.
    pub async fn get_state(&self, id: &MatchId) -> Result<MatchSnapshot, EngineError> {
        match self.handle(id).await? {
            MatchHandle::Simple(game) => {
                let game = game.lock().await;
                Ok(MatchSnapshot::capture(&game, None))
            }
            MatchHandle::Enhanced(session) => {
                let mut state = session.lock().await;
                let now = Instant::now();
                state.regenerate(now, self.config.enhanced.mana_regen_per_sec);
                Ok(MatchSnapshot::capture(&state.game, Some(state.time_left_secs(now))))
            }
        }
    }

    /// End a match on request and close its subscriber channels.
    #[instrument(skip(self))]
    pub async fn end_match(&self, id: &MatchId, reason: &str) -> Result<(), EngineError> {
        let reason = EndReason::Requested(reason.to_string());

        match self.handle(id).await? {
            MatchHandle::Simple(game) => {
                let mut game = game.lock().await;
                let from = game.events.len();
                self.simple.end_game(&mut game, reason)?;
                self.broadcaster.publish_log(&game, from);
            }
            MatchHandle::Enhanced(session) => {
                let mut state = session.lock().await;
                let from = state.game.events.len();
                self.enhanced.end_game(&mut state, reason)?;
                self.broadcaster.publish_log(&state.game, from);
            }
        }

        self.broadcaster.cleanup_match(id);
        info!("Match {} ended on request", id);
        Ok(())
    }

    /// Stop timers, close subscribers and forget a match. Returns `false`
    /// if there was no such match.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, id: &MatchId) -> bool {
        let removed = self.matches.write().await.remove(id);
        let Some(handle) = removed else {
            return false;
        };

        if let MatchHandle::Enhanced(session) = handle {
            let mut state = session.lock().await;
            self.enhanced.cleanup(&mut state);
        }
        self.broadcaster.cleanup_match(id);

        info!("Match {} cleaned up", id);
        true
    }

    /// Subscribe to a match's events through a new bounded channel.
    pub async fn subscribe(&self, id: &MatchId, capacity: usize) -> Result<mpsc::Receiver<MatchEvent>, EngineError> {
        self.handle(id).await?;
        Ok(self.broadcaster.subscribe_channel(id, capacity))
    }

    /// Subscribe an existing sender. Returns `false` if it was already registered.
    pub async fn subscribe_sender(&self, id: &MatchId, sender: mpsc::Sender<MatchEvent>) -> Result<bool, EngineError> {
        self.handle(id).await?;
        Ok(self.broadcaster.subscribe(id, sender))
    }

    /// Remove a sender. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: &MatchId, sender: &mpsc::Sender<MatchEvent>) -> bool {
        self.broadcaster.unsubscribe(id, sender)
    }

    /// Live matches.
    pub async fn match_count(&self) -> usize {
        self.matches.read().await.len()
    }

    /// Totals by mode and phase, plus the mean length of finished matches.
    pub async fn stats(&self) -> RegistryStats {
        let handles: Vec<MatchHandle> = self.matches.read().await.values().cloned().collect();

        let mut stats = RegistryStats {
            total_matches: handles.len(),
            ..RegistryStats::default()
        };
        let mut total_secs = 0.0;
        let mut finished = 0usize;

        for handle in handles {
            let (phase, elapsed) = match &handle {
                MatchHandle::Simple(game) => {
                    let game = game.lock().await;
                    (game.phase, game.elapsed_secs())
                }
                MatchHandle::Enhanced(session) => {
                    let state = session.lock().await;
                    (state.game.phase, state.game.elapsed_secs())
                }
            };

            *stats.matches_by_mode.entry(handle.mode().to_string()).or_default() += 1;
            *stats.matches_by_state.entry(phase_name(phase).to_string()).or_default() += 1;
            if phase == MatchPhase::InProgress {
                stats.active_matches += 1;
            }
            if let Some(secs) = elapsed {
                total_secs += secs;
                finished += 1;
            }
        }

        if finished > 0 {
            stats.average_duration_secs = Some(total_secs / finished as f64);
        }
        stats
    }
}

fn phase_name(phase: MatchPhase) -> &'static str {
    match phase {
        MatchPhase::Waiting => "waiting",
        MatchPhase::InProgress => "in_progress",
        MatchPhase::Finished => "finished",
    }
}
