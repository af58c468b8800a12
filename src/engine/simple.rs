//! Simple Mode Coordinator
//!
//! Turn-based matches: players alternate, a fallen tower grants another
//! move, and targets must be taken in slot order. Entirely request-driven;
//! the caller holds the match lock for the duration of each call.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::SimpleConfig;
use crate::directory::PlayerDirectory;
use crate::engine::action::{TurnAction, TurnResult, ACTION_ATTACK};
use crate::engine::outcome::settle;
use crate::error::{EngineError, RuleViolation};
use crate::game::combat::{self, CombatResolver};
use crate::game::events::{EndReason, GameEvent, GameEventData};
use crate::game::player::{PlayerId, DEFAULT_MANA_MAX, DEFAULT_MANA_START};
use crate::game::state::{MatchPhase, MatchState, Side, MATCH_CAPACITY};
use crate::TROOPS_PER_PLAYER;

/// Runs simple mode matches.
#[derive(Clone)]
pub struct SimpleCoordinator {
    resolver: CombatResolver,
    config: SimpleConfig,
    directory: Arc<dyn PlayerDirectory>,
}

impl SimpleCoordinator {
    /// Create a coordinator.
    pub fn new(config: SimpleConfig, resolver: CombatResolver, directory: Arc<dyn PlayerDirectory>) -> Self {
        Self { resolver, config, directory }
    }

    /// Start a full match: draw troops, reset mana, hand the first turn to home.
    pub fn start(&self, game: &mut MatchState) -> Result<(), EngineError> {
        if game.phase != MatchPhase::Waiting {
            return Err(EngineError::AlreadyStarted);
        }
        let seated = game.player_count();
        if seated != MATCH_CAPACITY {
            return Err(EngineError::NotEnoughPlayers(seated));
        }
        if let Some(empty) = game.combatants().find(|c| c.troops.is_empty()) {
            return Err(EngineError::NoTroops(empty.id().clone()));
        }

        let now = Instant::now();
        for side in Side::BOTH {
            game.draw_troops(side, TROOPS_PER_PLAYER);
        }
        // Mana is unused in simple mode but kept coherent for snapshots
        for combatant in game.combatants_mut() {
            combatant.reset_mana(DEFAULT_MANA_START, DEFAULT_MANA_MAX, now);
        }

        game.begin(Utc::now());
        info!("Simple match {} started", game.id);
        Ok(())
    }

    /// Apply one turn from `player_id`.
    pub fn process_turn(&self, game: &mut MatchState, player_id: &PlayerId, action: &TurnAction) -> TurnResult {
        if !game.is_in_progress() {
            return TurnResult::rejected(RuleViolation::GameEnded);
        }
        if game.side_of(player_id) != Some(game.current_turn) {
            return TurnResult::rejected(RuleViolation::NotYourTurn);
        }
        if action.action_type != ACTION_ATTACK {
            return TurnResult::rejected(RuleViolation::InvalidAction(action.action_type.clone()));
        }

        let battle = match self.resolver.resolve_attack(game, player_id, &action.troop_id, action.target_tower) {
            Ok(battle) => battle,
            Err(violation) => {
                debug!("Turn rejected in match {}: {}", game.id, violation);
                return TurnResult::rejected(violation);
            }
        };

        if battle.game_ended {
            let winner = game.current_turn;
            game.finish(Some(winner), EndReason::KingTowerDestroyed, Utc::now());
            settle(game, self.directory.as_ref(), None);
            info!("Simple match {} won by {}", game.id, player_id);

            return TurnResult {
                success: true,
                battle_result: Some(battle),
                can_continue: false,
                next_player: None,
                turn_remaining_secs: 0,
                error: None,
                error_code: None,
            };
        }

        if !battle.tower_destroyed {
            game.current_turn = game.current_turn.opponent();
            if let Some(next) = game.combatant(game.current_turn).map(|c| c.id().clone()) {
                game.record(GameEvent::new(None, GameEventData::TurnChanged { current_player: next }));
            }
        }

        TurnResult {
            success: true,
            can_continue: battle.can_continue,
            battle_result: Some(battle),
            next_player: game.combatant(game.current_turn).map(|c| c.id().clone()),
            turn_remaining_secs: self.config.turn_time_secs,
            error: None,
            error_code: None,
        }
    }

    /// End a match early. The winner, unless already set, comes from the board.
    pub fn end_game(&self, game: &mut MatchState, reason: EndReason) -> Result<(), EngineError> {
        if game.is_finished() {
            return Err(EngineError::AlreadyFinished);
        }

        let was_running = game.is_in_progress();
        let winner = game.winner.or_else(|| combat::winner(game));
        game.finish(winner, reason, Utc::now());
        if was_running {
            settle(game, self.directory.as_ref(), None);
        }

        info!("Simple match {} ended", game.id);
        Ok(())
    }

    /// Actions the turn holder may take: `attack_with_<troop_id>` per usable troop.
    pub fn available_actions(&self, game: &MatchState, player_id: &PlayerId) -> Result<Vec<String>, RuleViolation> {
        if !game.is_in_progress() {
            return Err(RuleViolation::GameEnded);
        }
        if game.side_of(player_id) != Some(game.current_turn) {
            return Err(RuleViolation::NotYourTurn);
        }

        let actions = game
            .combatant(game.current_turn)
            .map(|c| {
                c.troops
                    .iter()
                    .filter(|t| t.is_alive())
                    .map(|t| format!("attack_with_{}", t.id))
                    .collect()
            })
            .unwrap_or_default();

        Ok(actions)
    }

    /// Turn length reported to clients.
    pub fn turn_time_secs(&self) -> u64 {
        self.config.turn_time_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use crate::directory::MemoryDirectory;
    use crate::game::player::{Combatant, Player};
    use crate::game::state::{MatchId, MatchMode};
    use crate::game::tower::TowerTemplates;
    use crate::game::troop::{default_troops, Troop};

    fn coordinator() -> (SimpleCoordinator, Arc<MemoryDirectory>) {
        let dir = Arc::new(MemoryDirectory::new());
        let coord = SimpleCoordinator::new(SimpleConfig::default(), CombatResolver::default(), dir.clone());
        (coord, dir)
    }

    fn seat(game: &mut MatchState, id: &str, troops: Vec<Troop>) {
        let c = Combatant::new(Player::new(id, id), troops, &TowerTemplates::default());
        game.add_player(c).unwrap();
    }

    fn goblins_only() -> Vec<Troop> {
        default_troops().into_iter().filter(|t| t.id == "goblin").collect()
    }

    fn started() -> (SimpleCoordinator, Arc<MemoryDirectory>, MatchState) {
        let (coord, dir) = coordinator();
        let mut game = MatchState::new(MatchId::from("m1"), MatchMode::Simple, DeterministicRng::new(5));
        seat(&mut game, "p1", goblins_only());
        seat(&mut game, "p2", goblins_only());
        coord.start(&mut game).unwrap();
        (coord, dir, game)
    }

    fn p(id: &str) -> PlayerId {
        PlayerId::from(id)
    }

    #[test]
    fn test_start_requires_two_players() {
        let (coord, _) = coordinator();
        let mut game = MatchState::new(MatchId::from("m1"), MatchMode::Simple, DeterministicRng::new(5));
        seat(&mut game, "p1", default_troops());

        assert_eq!(coord.start(&mut game), Err(EngineError::NotEnoughPlayers(1)));
        assert_eq!(game.phase, MatchPhase::Waiting);
    }

    #[test]
    fn test_start_requires_troops() {
        let (coord, _) = coordinator();
        let mut game = MatchState::new(MatchId::from("m1"), MatchMode::Simple, DeterministicRng::new(5));
        seat(&mut game, "p1", default_troops());
        seat(&mut game, "p2", Vec::new());

        assert_eq!(coord.start(&mut game), Err(EngineError::NoTroops(p("p2"))));
    }

    #[test]
    fn test_start_draws_three_troops() {
        let (coord, _) = coordinator();
        let mut game = MatchState::new(MatchId::from("m1"), MatchMode::Simple, DeterministicRng::new(5));
        seat(&mut game, "p1", default_troops());
        seat(&mut game, "p2", default_troops());
        coord.start(&mut game).unwrap();

        assert!(game.is_in_progress());
        assert_eq!(game.current_turn, Side::Home);
        assert!(game.combatants().all(|c| c.troops.len() == 3 && c.mana == 5 && c.max_mana == 10));
        assert_eq!(coord.start(&mut game), Err(EngineError::AlreadyStarted));
    }

    #[test]
    fn test_turns_alternate() {
        let (coord, _, mut game) = started();

        let first = coord.process_turn(&mut game, &p("p1"), &TurnAction::attack("goblin", 0));
        assert!(first.success);
        assert!(!first.can_continue);
        assert_eq!(first.next_player, Some(p("p2")));
        assert_eq!(first.turn_remaining_secs, 30);

        let again = coord.process_turn(&mut game, &p("p1"), &TurnAction::attack("goblin", 0));
        assert_eq!(again.error_code, Some("NOT_YOUR_TURN"));
        assert_eq!(game.events.last().unwrap().kind(), "turn_changed");
    }

    #[test]
    fn test_invalid_action_type() {
        let (coord, _, mut game) = started();
        let mut action = TurnAction::attack("goblin", 0);
        action.action_type = "defend".into();

        let result = coord.process_turn(&mut game, &p("p1"), &action);
        assert!(!result.success);
        assert_eq!(result.error_code, Some("INVALID_ACTION"));
        assert_eq!(game.current_turn, Side::Home);
    }

    #[test]
    fn test_destroying_tower_keeps_turn() {
        let (coord, _, mut game) = started();
        game.away.as_mut().unwrap().towers[0].hp = 20;

        let result = coord.process_turn(&mut game, &p("p1"), &TurnAction::attack("goblin", 0));
        assert!(result.can_continue);
        assert_eq!(result.next_player, Some(p("p1")));
        assert_eq!(game.current_turn, Side::Home);
    }

    #[test]
    fn test_king_kill_finishes_and_settles() {
        let (coord, dir, mut game) = started();
        {
            let away = game.away.as_mut().unwrap();
            away.towers[0].hp = 0;
            away.towers[1].hp = 0;
            away.towers[2].hp = 15;
        }

        let result = coord.process_turn(&mut game, &p("p1"), &TurnAction::attack("goblin", 2));
        assert!(result.success);
        assert!(result.battle_result.as_ref().unwrap().game_ended);
        assert_eq!(result.next_player, None);
        assert!(game.is_finished());
        assert!(game.ended_at.is_some());
        assert_eq!(game.winner_id(), Some(p("p1")));

        let saved = dir.get(&p("p1")).unwrap();
        assert_eq!(saved.stats.games_won, 1);
        assert_eq!(saved.experience, 0);

        let late = coord.process_turn(&mut game, &p("p2"), &TurnAction::attack("goblin", 0));
        assert_eq!(late.error_code, Some("GAME_ENDED"));
    }

    #[test]
    fn test_end_game_twice() {
        let (coord, _, mut game) = started();

        coord.end_game(&mut game, EndReason::Requested("admin".into())).unwrap();
        assert!(game.is_finished());
        assert_eq!(game.winner, None);
        assert_eq!(
            coord.end_game(&mut game, EndReason::Requested("admin".into())),
            Err(EngineError::AlreadyFinished)
        );
    }

    #[test]
    fn test_available_actions() {
        let (coord, _, game) = started();

        assert_eq!(coord.available_actions(&game, &p("p1")).unwrap(), vec!["attack_with_goblin"]);
        assert_eq!(coord.available_actions(&game, &p("p2")), Err(RuleViolation::NotYourTurn));
    }
}
