//! Enhanced Mode Coordinator
//!
//! Real-time matches. Each match runs two background tasks while it is in
//! progress: a one-shot deadline that ends the match when the clock runs
//! out, and a 1 Hz ticker that regenerates mana. Both hold only a weak
//! reference to the session, take the same per-match mutex as requests do,
//! and exit on the stop signal or once the match is marked ended.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::EnhancedConfig;
use crate::directory::PlayerDirectory;
use crate::engine::action::{EnhancedAction, EnhancedResult, ACTION_SPAWN_TROOP};
use crate::engine::broadcast::EventBroadcaster;
use crate::engine::outcome::{settle, ExperienceAward};
use crate::error::{EngineError, RuleViolation};
use crate::game::combat::{self, CombatResolver};
use crate::game::events::EndReason;
use crate::game::player::PlayerId;
use crate::game::state::{MatchId, MatchPhase, MatchState, Side, MATCH_CAPACITY};

/// Mana regeneration period.
pub const REGEN_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// SESSION
// =============================================================================

/// An enhanced match and its timers behind one mutex.
#[derive(Debug)]
pub struct EnhancedSession {
    match_id: MatchId,
    state: Mutex<EnhancedState>,
}

impl EnhancedSession {
    /// Wrap a freshly created match.
    pub fn new(game: MatchState) -> Arc<Self> {
        Arc::new(Self {
            match_id: game.id.clone(),
            state: Mutex::new(EnhancedState::new(game)),
        })
    }

    /// Match id.
    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    /// Take the match lock.
    pub async fn lock(&self) -> MutexGuard<'_, EnhancedState> {
        self.state.lock().await
    }
}

/// Stop signal and handles of a running match's background tasks.
#[derive(Debug)]
struct MatchTimers {
    stop_tx: broadcast::Sender<()>,
    deadline: JoinHandle<()>,
    regen: JoinHandle<()>,
}

impl MatchTimers {
    /// Signal both tasks; they exit on their next wake.
    fn stop(self) {
        let _ = self.stop_tx.send(());
    }

    /// Cancel both tasks outright.
    fn abort(self) {
        let _ = self.stop_tx.send(());
        self.deadline.abort();
        self.regen.abort();
    }
}

/// Mutable state of one enhanced match.
#[derive(Debug)]
pub struct EnhancedState {
    /// The match.
    pub game: MatchState,
    started_at: Option<Instant>,
    last_regen: Option<Instant>,
    ended: bool,
    ended_at: Option<Instant>,
    timers: Option<MatchTimers>,
}

impl EnhancedState {
    fn new(game: MatchState) -> Self {
        Self {
            game,
            started_at: None,
            last_regen: None,
            ended: false,
            ended_at: None,
            timers: None,
        }
    }

    /// Has the match been finalized or cleaned up?
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Are the deadline and ticker armed?
    pub fn timers_active(&self) -> bool {
        self.timers.is_some()
    }

    /// When the clock started.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// When regeneration last ran.
    pub fn last_regen(&self) -> Option<Instant> {
        self.last_regen
    }

    /// Credit mana earned up to `now` to both combatants.
    ///
    /// The single regeneration path, used by the ticker and by every read
    /// or action. Callers hold the match lock.
    pub fn regenerate(&mut self, now: Instant, rate: f64) {
        if self.ended || self.game.phase != MatchPhase::InProgress {
            return;
        }
        for combatant in self.game.combatants_mut() {
            combatant.regenerate(now, rate);
        }
        self.last_regen = Some(now);
    }

    /// Whole seconds left on the clock, zero once it has run out.
    ///
    /// The clock freezes at the instant the match ended.
    pub fn time_left_secs(&self, now: Instant) -> u64 {
        let duration = self.game.duration_secs.unwrap_or(0);
        let until = self.ended_at.map_or(now, |ended| ended.min(now));
        match self.started_at {
            Some(start) => duration.saturating_sub(until.saturating_duration_since(start).as_secs()),
            None => duration,
        }
    }

    fn mark_ended(&mut self, now: Instant) {
        self.ended = true;
        self.ended_at.get_or_insert(now);
    }

    fn stop_timers(&mut self) {
        if let Some(timers) = self.timers.take() {
            timers.stop();
        }
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Runs enhanced mode matches.
#[derive(Clone)]
pub struct EnhancedCoordinator {
    resolver: CombatResolver,
    config: Arc<EnhancedConfig>,
    directory: Arc<dyn PlayerDirectory>,
    broadcaster: Arc<EventBroadcaster>,
}

impl EnhancedCoordinator {
    /// Create a coordinator.
    pub fn new(
        config: EnhancedConfig,
        directory: Arc<dyn PlayerDirectory>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            resolver: CombatResolver::new(config.crit_multiplier),
            config: Arc::new(config),
            directory,
            broadcaster,
        }
    }

    /// Enhanced rules in effect.
    pub fn config(&self) -> &EnhancedConfig {
        &self.config
    }

    /// Start a full match: reset mana, stamp the duration, arm the timers.
    ///
    /// The caller holds the session lock and passes the guarded state in.
    pub fn start(&self, session: &Arc<EnhancedSession>, state: &mut EnhancedState) -> Result<(), EngineError> {
        if state.game.phase != MatchPhase::Waiting || state.ended {
            return Err(EngineError::AlreadyStarted);
        }
        let seated = state.game.player_count();
        if seated != MATCH_CAPACITY {
            return Err(EngineError::NotEnoughPlayers(seated));
        }
        if let Some(empty) = state.game.combatants().find(|c| c.troops.is_empty()) {
            return Err(EngineError::NoTroops(empty.id().clone()));
        }

        let now = Instant::now();
        for combatant in state.game.combatants_mut() {
            combatant.reset_mana(self.config.mana_start, self.config.mana_max, now);
        }
        state.game.duration_secs = Some(self.config.duration_secs);
        state.game.begin(Utc::now());
        state.started_at = Some(now);
        state.last_regen = Some(now);
        state.timers = Some(self.arm_timers(session, now));

        info!(
            "Enhanced match {} started ({}s, regen {}/s)",
            state.game.id, self.config.duration_secs, self.config.mana_regen_per_sec
        );
        Ok(())
    }

    fn arm_timers(&self, session: &Arc<EnhancedSession>, now: Instant) -> MatchTimers {
        let (stop_tx, _) = broadcast::channel(1);

        let deadline = {
            let weak = Arc::downgrade(session);
            let coordinator = self.clone();
            let mut stop_rx = stop_tx.subscribe();
            let at = now + self.config.duration();

            tokio::spawn(async move {
                tokio::select! {
                    _ = sleep_until(at) => {
                        if let Some(session) = weak.upgrade() {
                            coordinator.end_by_timeout(&session).await;
                        }
                    }
                    _ = stop_rx.recv() => {}
                }
            })
        };

        let regen = {
            let weak: Weak<EnhancedSession> = Arc::downgrade(session);
            let rate = self.config.mana_regen_per_sec;
            let mut stop_rx = stop_tx.subscribe();

            tokio::spawn(async move {
                let mut ticker = interval_at(now + REGEN_INTERVAL, REGEN_INTERVAL);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let Some(session) = weak.upgrade() else { break };
                            let mut state = session.lock().await;
                            if state.ended {
                                break;
                            }
                            state.regenerate(Instant::now(), rate);
                        }
                        _ = stop_rx.recv() => break,
                    }
                }
            })
        };

        MatchTimers { stop_tx, deadline, regen }
    }

    /// Apply one `spawn_troop` action from `player_id` at `now`.
    pub fn process_action(
        &self,
        state: &mut EnhancedState,
        player_id: &PlayerId,
        action: &EnhancedAction,
        now: Instant,
    ) -> EnhancedResult {
        if state.ended || !state.game.is_in_progress() {
            return EnhancedResult::rejected(RuleViolation::GameEnded);
        }
        let Some(side) = state.game.side_of(player_id) else {
            return EnhancedResult::rejected(RuleViolation::PlayerNotFound);
        };

        state.regenerate(now, self.config.mana_regen_per_sec);
        let mana = state.game.combatant(side).map_or(0, |c| c.mana);
        let time_left = state.time_left_secs(now);
        let reject = |violation: RuleViolation| EnhancedResult {
            player_mana: mana,
            time_left_secs: time_left,
            ..EnhancedResult::rejected(violation)
        };

        if action.action_type != ACTION_SPAWN_TROOP {
            return reject(RuleViolation::InvalidAction(action.action_type.clone()));
        }
        let Some(troop) = state.game.combatant(side).and_then(|c| c.troop(&action.troop_id)) else {
            return reject(RuleViolation::TroopNotFound(action.troop_id.clone()));
        };
        if troop.mana_cost > mana {
            return reject(RuleViolation::InsufficientResource { need: troop.mana_cost, have: mana });
        }

        let battle = match self.resolver.resolve_attack(&mut state.game, player_id, &action.troop_id, action.target_tower) {
            Ok(battle) => battle,
            Err(violation) => {
                debug!("Action rejected in match {}: {}", state.game.id, violation);
                return reject(violation);
            }
        };

        let game_ended = battle.game_ended;
        let winner = battle.winner.clone();
        if game_ended {
            self.finalize(state, Some(side), EndReason::KingTowerDestroyed);
        }

        EnhancedResult {
            success: true,
            player_mana: state.game.combatant(side).map_or(0, |c| c.mana),
            time_left_secs: state.time_left_secs(now),
            battle_result: Some(battle),
            game_ended,
            winner,
            error: None,
            error_code: None,
        }
    }

    /// Deadline handler: decide by towers destroyed and finalize.
    ///
    /// No-op if the match already ended. Publishes the events it appends,
    /// since no request is in flight to do so.
    pub async fn end_by_timeout(&self, session: &Arc<EnhancedSession>) {
        let mut state = session.lock().await;
        if state.ended {
            return;
        }

        let from = state.game.events.len();
        let winner = combat::winner(&state.game);
        self.finalize(&mut state, winner, EndReason::TimeUp);
        info!("Enhanced match {} timed out", session.match_id());

        self.broadcaster.publish_log(&state.game, from);
    }

    /// End a match on request, deciding by towers destroyed.
    pub fn end_game(&self, state: &mut EnhancedState, reason: EndReason) -> Result<(), EngineError> {
        if state.ended {
            return Err(EngineError::AlreadyFinished);
        }
        let winner = state.game.winner.or_else(|| combat::winner(&state.game));
        self.finalize(state, winner, reason);
        Ok(())
    }

    /// Finish the match once: stop timers, record the result, award
    /// experience and save both players. Returns `false` if already ended.
    pub fn finalize(&self, state: &mut EnhancedState, winner: Option<Side>, reason: EndReason) -> bool {
        if state.ended {
            return false;
        }
        state.mark_ended(Instant::now());
        state.stop_timers();

        let was_running = state.game.is_in_progress();
        let reason_str = reason.as_str().to_string();
        state.game.finish(winner, reason, Utc::now());

        if was_running {
            let award = ExperienceAward {
                win: self.config.exp_win,
                draw: self.config.exp_draw,
            };
            settle(&mut state.game, self.directory.as_ref(), Some(award));
        }

        match state.game.winner_id() {
            Some(id) => info!("Enhanced match {} won by {} ({})", state.game.id, id, reason_str),
            None => info!("Enhanced match {} ended in a draw ({})", state.game.id, reason_str),
        }
        true
    }

    /// Cancel the timers and mark the match ended without deciding it.
    pub fn cleanup(&self, state: &mut EnhancedState) {
        if let Some(timers) = state.timers.take() {
            timers.abort();
        }
        state.mark_ended(Instant::now());
        debug!("Enhanced match {} cleaned up", state.game.id);
    }
}
