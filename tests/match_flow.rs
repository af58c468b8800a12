//! End-to-end match flows through the registry.

use std::sync::Arc;
use std::time::Duration;

use tower_clash::engine::{ActionOutcome, MatchAction};
use tower_clash::game::events::MatchEvent;
use tower_clash::game::tower::TowerTemplates;
use tower_clash::game::troop::{default_troops, Troop};
use tower_clash::{
    DefaultCatalog, EngineConfig, EngineError, EnhancedAction, MatchId, MatchMode, MatchPhase, MatchRegistry,
    MemoryDirectory, Player, PlayerId, TemplateCatalog, TurnAction,
};

fn setup(config: EngineConfig) -> (MatchRegistry, Arc<MemoryDirectory>) {
    let directory = Arc::new(MemoryDirectory::new());
    directory.insert(Player::new("alice", "Alice"));
    directory.insert(Player::new("bob", "Bob"));
    let registry = MatchRegistry::new(config, directory.clone(), Arc::new(DefaultCatalog));
    (registry, directory)
}

fn seeded() -> EngineConfig {
    EngineConfig { rng_seed: Some(2024), ..EngineConfig::default() }
}

fn alice() -> PlayerId {
    PlayerId::from("alice")
}

fn bob() -> PlayerId {
    PlayerId::from("bob")
}

async fn started(registry: &MatchRegistry, id: &str, mode: MatchMode) -> MatchId {
    let id = registry.create_match(id, mode).await.unwrap();
    registry.join_match(&id, &alice()).await.unwrap();
    let outcome = registry.join_match(&id, &bob()).await.unwrap();
    assert!(outcome.started);
    id
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<MatchEvent>) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.event.kind());
    }
    kinds
}

/// First troop a player was dealt.
async fn first_troop(registry: &MatchRegistry, id: &MatchId, player: &PlayerId) -> String {
    let snapshot = registry.get_state(id).await.unwrap();
    snapshot.player(player).unwrap().troops[0].id.clone()
}

#[tokio::test]
async fn test_snapshot_after_simple_start() {
    let (registry, _) = setup(seeded());
    let id = started(&registry, "fresh", MatchMode::Simple).await;

    let snapshot = registry.get_state(&id).await.unwrap();
    assert_eq!(snapshot.state, MatchPhase::InProgress);
    assert_eq!(snapshot.current_turn, Some(0));
    assert_eq!(snapshot.current_player, Some(alice()));
    assert_eq!(snapshot.players.len(), 2);

    for player in &snapshot.players {
        let hp: Vec<_> = player.towers.iter().map(|t| (t.hp, t.max_hp, t.alive)).collect();
        assert_eq!(hp, vec![(300, 300, true), (300, 300, true), (500, 500, true)]);
        assert_eq!(player.troops.len(), 3);
    }
}

/// Hands out goblins only, so every dealt hand is known.
struct GoblinCatalog;

impl TemplateCatalog for GoblinCatalog {
    fn troop_templates(&self) -> Vec<Troop> {
        default_troops().into_iter().filter(|t| t.id == "goblin").collect()
    }

    fn tower_templates(&self) -> TowerTemplates {
        TowerTemplates::default()
    }
}

#[tokio::test]
async fn test_goblin_chips_guard_and_turns_alternate() {
    let directory = Arc::new(MemoryDirectory::new());
    directory.insert(Player::new("alice", "Alice"));
    directory.insert(Player::new("bob", "Bob"));
    let registry = MatchRegistry::new(seeded(), directory, Arc::new(GoblinCatalog));

    let id = started(&registry, "chip", MatchMode::Simple).await;
    let mut rx = registry.subscribe(&id, 64).await.unwrap();

    let hits = [(alice(), bob()), (bob(), alice()), (alice(), bob())];
    for (attacker, next) in hits {
        let result = registry
            .process_turn(&id, &attacker, TurnAction::attack("goblin", 0))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.battle_result.as_ref().unwrap().damage, 20);
        assert!(!result.can_continue);
        assert_eq!(result.next_player, Some(next));
    }

    let snapshot = registry.get_state(&id).await.unwrap();
    let bob_guard = &snapshot.player(&bob()).unwrap().towers[0];
    assert_eq!(bob_guard.hp, 260);
    let alice_guard = &snapshot.player(&alice()).unwrap().towers[0];
    assert_eq!(alice_guard.hp, 280);

    // One more exchange leaves bob's guard at 300 - 3 * 20
    for attacker in [bob(), alice()] {
        registry.process_turn(&id, &attacker, TurnAction::attack("goblin", 0)).await.unwrap();
    }
    let snapshot = registry.get_state(&id).await.unwrap();
    assert_eq!(snapshot.player(&bob()).unwrap().towers[0].hp, 240);
    assert!(snapshot.player(&bob()).unwrap().towers[0].alive);

    let kinds = drain(&mut rx);
    assert_eq!(kinds.iter().filter(|k| **k == "attack_made").count(), 5);
    assert_eq!(kinds.iter().filter(|k| **k == "turn_changed").count(), 5);
}

#[tokio::test]
async fn test_out_of_order_targets_rejected() {
    let (registry, _) = setup(seeded());
    let id = started(&registry, "order", MatchMode::Simple).await;
    let troop = first_troop(&registry, &id, &alice()).await;

    let right = registry.process_turn(&id, &alice(), TurnAction::attack(&troop, 1)).await.unwrap();
    assert!(!right.success);
    assert_eq!(right.error_code, Some("INVALID_TARGET"));

    let king = registry.process_turn(&id, &alice(), TurnAction::attack(&troop, 2)).await.unwrap();
    assert_eq!(king.error_code, Some("INVALID_TARGET"));

    let wrong_player = registry.process_turn(&id, &bob(), TurnAction::attack(&troop, 0)).await.unwrap();
    assert_eq!(wrong_player.error_code, Some("NOT_YOUR_TURN"));

    // Nothing changed
    let snapshot = registry.get_state(&id).await.unwrap();
    assert_eq!(snapshot.current_player, Some(alice()));
    assert!(snapshot.players.iter().all(|p| p.towers.iter().all(|t| t.hp == t.max_hp)));
}

#[tokio::test]
async fn test_simple_match_played_to_king_kill() {
    let (registry, directory) = setup(seeded());
    let id = started(&registry, "full", MatchMode::Simple).await;
    let mut rx = registry.subscribe(&id, 1024).await.unwrap();

    let mut last = None;
    for _ in 0..1000 {
        let snapshot = registry.get_state(&id).await.unwrap();
        let Some(player) = snapshot.current_player.clone() else {
            break;
        };
        let target = snapshot.valid_targets.as_ref().unwrap()[0];
        let troop = snapshot.player(&player).unwrap().troops[0].id.clone();

        let result = registry
            .process_turn(&id, &player, TurnAction::attack(&troop, target as i32))
            .await
            .unwrap();
        assert!(result.success);
        last = Some((player, result));
    }

    let (winner, result) = last.unwrap();
    let battle = result.battle_result.unwrap();
    assert!(battle.game_ended);
    assert_eq!(battle.target_tower, 2);
    assert_eq!(battle.winner, Some(winner.clone()));
    assert_eq!(result.next_player, None);

    let snapshot = registry.get_state(&id).await.unwrap();
    assert_eq!(snapshot.state, MatchPhase::Finished);
    assert!(snapshot.ended_at.is_some());
    assert_eq!(snapshot.winner, Some(winner.clone()));

    let saved = directory.get(&winner).unwrap();
    assert_eq!(saved.stats.games_won, 1);
    assert_eq!(saved.experience, 0);

    let kinds = drain(&mut rx);
    assert_eq!(kinds.last(), Some(&"match_ended"));
    assert!(kinds.iter().filter(|k| **k == "tower_destroyed").count() >= 3);

    assert_eq!(registry.end_match(&id, "late").await, Err(EngineError::AlreadyFinished));
}

#[tokio::test(start_paused = true)]
async fn test_enhanced_regeneration_caps_at_max() {
    let (registry, _) = setup(seeded());
    let id = started(&registry, "regen", MatchMode::Enhanced).await;

    let snapshot = registry.get_state(&id).await.unwrap();
    assert!(snapshot.players.iter().all(|p| p.mana == 5 && p.max_mana == 10));
    assert_eq!(snapshot.time_left_secs, Some(180));

    tokio::time::sleep(Duration::from_secs(5)).await;

    let snapshot = registry.get_state(&id).await.unwrap();
    assert!(snapshot.players.iter().all(|p| p.mana == 10));
    assert_eq!(snapshot.time_left_secs, Some(175));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = registry.get_state(&id).await.unwrap();
    assert!(snapshot.players.iter().all(|p| p.mana == 10));
}

#[tokio::test(start_paused = true)]
async fn test_enhanced_insufficient_mana_changes_nothing() {
    let (registry, _) = setup(seeded());
    let id = started(&registry, "broke", MatchMode::Enhanced).await;

    let result = registry
        .process_enhanced_action(&id, &alice(), EnhancedAction::spawn("dragon", 2))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error_code, Some("INSUFFICIENT_MANA"));
    assert_eq!(result.player_mana, 5);

    let snapshot = registry.get_state(&id).await.unwrap();
    assert_eq!(snapshot.player(&alice()).unwrap().mana, 5);
    assert!(snapshot.player(&bob()).unwrap().towers.iter().all(|t| t.hp == t.max_hp));
}

#[tokio::test(start_paused = true)]
async fn test_enhanced_timeout_is_a_draw() {
    let config = EngineConfig {
        rng_seed: Some(1),
        enhanced: tower_clash::EnhancedConfig { duration_secs: 30, ..Default::default() },
        ..EngineConfig::default()
    };
    let (registry, directory) = setup(config);
    let id = started(&registry, "clock", MatchMode::Enhanced).await;
    let mut rx = registry.subscribe(&id, 64).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;

    let snapshot = registry.get_state(&id).await.unwrap();
    assert_eq!(snapshot.state, MatchPhase::Finished);
    assert_eq!(snapshot.winner, None);
    assert_eq!(snapshot.time_left_secs, Some(0));
    let lost = snapshot.towers_lost.unwrap();
    assert!(lost.values().all(|&n| n == 0));

    for player in [alice(), bob()] {
        let saved = directory.get(&player).unwrap();
        assert_eq!(saved.experience, 10);
        assert_eq!(saved.stats.games_drawn, 1);
    }

    assert_eq!(drain(&mut rx), vec!["match_ended"]);

    let late = registry
        .process_enhanced_action(&id, &alice(), EnhancedAction::spawn("goblin", 0))
        .await
        .unwrap();
    assert_eq!(late.error_code, Some("GAME_ENDED"));
}

#[tokio::test(start_paused = true)]
async fn test_enhanced_king_kill_awards_winner_once() {
    let (registry, directory) = setup(seeded());
    let id = started(&registry, "rush", MatchMode::Enhanced).await;

    // Dragons straight at the king: 70 - 15 = 55 per hit (66 on a crit)
    let mut ended = None;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_secs(7)).await;
        let result = registry
            .process_enhanced_action(&id, &alice(), EnhancedAction::spawn("dragon", 2))
            .await
            .unwrap();
        assert!(result.success, "{:?}", result.error);
        if result.game_ended {
            ended = Some(result);
            break;
        }
    }

    let result = ended.expect("king falls before the clock runs out");
    assert_eq!(result.winner, Some(alice()));

    let snapshot = registry.get_state(&id).await.unwrap();
    assert_eq!(snapshot.state, MatchPhase::Finished);
    let lost = snapshot.towers_lost.unwrap();
    assert_eq!(lost[&bob()], 1);

    // The deadline later fires into an ended match and changes nothing
    tokio::time::sleep(Duration::from_secs(200)).await;
    let alice_saved = directory.get(&alice()).unwrap();
    let bob_saved = directory.get(&bob()).unwrap();
    assert_eq!(alice_saved.experience, 30);
    assert_eq!(alice_saved.stats.games_played, 1);
    assert_eq!(bob_saved.experience, 0);
    assert_eq!(bob_saved.stats.games_lost, 1);
}

#[tokio::test]
async fn test_mode_mismatch_and_missing_match() {
    let (registry, _) = setup(seeded());
    let id = started(&registry, "modes", MatchMode::Enhanced).await;

    let wrong = registry
        .dispatch_action(&id, &alice(), MatchAction::Turn(TurnAction::attack("goblin", 0)))
        .await;
    assert_eq!(
        wrong,
        Err(EngineError::WrongMode { expected: MatchMode::Simple, actual: MatchMode::Enhanced })
    );

    let missing = registry
        .dispatch_action(&MatchId::from("nope"), &alice(), EnhancedAction::spawn("goblin", 0).into())
        .await;
    assert_eq!(missing, Err(EngineError::MatchNotFound(MatchId::from("nope"))));

    let ok = registry
        .dispatch_action(&id, &alice(), EnhancedAction::spawn("goblin", 0).into())
        .await
        .unwrap();
    assert!(matches!(ok, ActionOutcome::Enhanced(ref r) if r.success));

    registry.cleanup(&id).await;
}

#[tokio::test]
async fn test_concurrent_joins_seat_exactly_two() {
    let directory = Arc::new(MemoryDirectory::new());
    for i in 0..8 {
        directory.insert(Player::new(format!("p{}", i), "anon"));
    }
    let registry = Arc::new(MatchRegistry::new(seeded(), directory, Arc::new(DefaultCatalog)));
    let id = registry.create_match("crowd", MatchMode::Simple).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let registry = registry.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            registry.join_match(&id, &PlayerId::from(format!("p{}", i))).await
        }));
    }

    let mut seated = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => seated += 1,
            Err(EngineError::MatchFull) => full += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!((seated, full), (2, 6));

    let snapshot = registry.get_state(&id).await.unwrap();
    assert_eq!(snapshot.state, MatchPhase::InProgress);
}
