//! Tower Clash Server
//!
//! Demo driver for the match engine: plays one simple match to the end and
//! one short enhanced match until its clock runs out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tower_clash::{
    DefaultCatalog, EngineConfig, EnhancedAction, MatchMode, MatchRegistry, MemoryDirectory, Player,
    PlayerId, TurnAction, VERSION,
};

/// Turn cap for the simple demo.
const MAX_DEMO_TURNS: usize = 500;

/// Clock for the enhanced demo.
const DEMO_DURATION_SECS: u64 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Tower Clash Server v{}", VERSION);

    let mut config = EngineConfig::from_env();
    config.enhanced.duration_secs = config.enhanced.duration_secs.min(DEMO_DURATION_SECS);
    info!(
        "Turn time {}s, enhanced duration {}s, mana {}/{} at {}/s",
        config.simple.turn_time_secs,
        config.enhanced.duration_secs,
        config.enhanced.mana_start,
        config.enhanced.mana_max,
        config.enhanced.mana_regen_per_sec
    );

    let directory = Arc::new(MemoryDirectory::new());
    directory.insert(Player::new("alice", "Alice"));
    directory.insert(Player::new("bob", "Bob"));

    let registry = Arc::new(MatchRegistry::new(config, directory.clone(), Arc::new(DefaultCatalog)));

    demo_simple(&registry).await?;
    demo_enhanced(&registry).await?;

    for id in ["alice", "bob"] {
        if let Some(player) = directory.get(&PlayerId::from(id)) {
            info!(
                "{}: level {}, {} exp, {}W/{}L/{}D",
                player.username,
                player.level,
                player.experience,
                player.stats.games_won,
                player.stats.games_lost,
                player.stats.games_drawn
            );
        }
    }

    info!("Registry stats: {}", serde_json::to_string(&registry.stats().await)?);
    Ok(())
}

/// Play a simple match: each turn uses the first troop on the only legal target.
async fn demo_simple(registry: &MatchRegistry) -> anyhow::Result<()> {
    info!("=== Simple Match ===");

    let id = registry.create_match("demo-simple", MatchMode::Simple).await?;
    let alice = PlayerId::from("alice");
    let bob = PlayerId::from("bob");
    registry.join_match(&id, &alice).await?;
    registry.join_match(&id, &bob).await?;

    for turn in 0..MAX_DEMO_TURNS {
        let snapshot = registry.get_state(&id).await?;
        let (Some(player), Some(targets)) = (snapshot.current_player.clone(), snapshot.valid_targets.clone()) else {
            break;
        };
        let Some(&target) = targets.first() else {
            bail!("no legal target on turn {}", turn);
        };
        let Some(troop) = snapshot.player(&player).and_then(|p| p.troops.first()).map(|t| t.id.clone()) else {
            bail!("player {} has no troops", player);
        };

        let result = registry.process_turn(&id, &player, TurnAction::attack(&troop, target as i32)).await?;
        let Some(battle) = result.battle_result else {
            warn!("Turn rejected: {:?}", result.error);
            break;
        };
        info!(
            "Turn {}: {} hits tower {} with {} for {}{}",
            turn,
            player,
            battle.target_tower,
            battle.troop_used,
            battle.damage,
            if battle.tower_destroyed { " (destroyed)" } else { "" }
        );
        if battle.game_ended {
            break;
        }
    }

    let snapshot = registry.get_state(&id).await?;
    info!("Simple match finished: {:?}, winner {:?}", snapshot.state, snapshot.winner);
    registry.cleanup(&id).await;
    Ok(())
}

/// Play an enhanced match: both players spend mana as it arrives until the clock runs out.
async fn demo_enhanced(registry: &MatchRegistry) -> anyhow::Result<()> {
    info!("=== Enhanced Match ===");

    let id = registry.create_match("demo-enhanced", MatchMode::Enhanced).await?;
    let mut events = registry.subscribe(&id, 64).await?;
    let players = [PlayerId::from("alice"), PlayerId::from("bob")];
    for player in &players {
        registry.join_match(&id, player).await?;
    }

    let listener = tokio::spawn(async move {
        let mut seen = 0usize;
        while let Some(event) = events.recv().await {
            seen += 1;
            if event.event.is_terminal() {
                info!("Subscriber saw match end after {} events", seen);
                break;
            }
        }
        seen
    });

    loop {
        let snapshot = registry.get_state(&id).await?;
        if snapshot.state == tower_clash::MatchPhase::Finished {
            break;
        }

        for player in &players {
            let action = EnhancedAction::spawn("goblin", 0);
            let result = registry.process_enhanced_action(&id, player, action).await?;
            if result.success {
                info!("{} spawned goblin, mana left {}", player, result.player_mana);
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let snapshot = registry.get_state(&id).await?;
    info!(
        "Enhanced match finished: winner {:?}, towers lost {:?}",
        snapshot.winner, snapshot.towers_lost
    );

    let seen = listener.await.context("event listener panicked")?;
    info!("Delivered {} events", seen);
    registry.cleanup(&id).await;
    Ok(())
}
