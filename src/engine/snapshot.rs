//! Match State Snapshots
//!
//! Read-only, serializable view of a match for clients.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::game::combat::{count_destroyed, valid_targets};
use crate::game::player::{Combatant, PlayerId};
use crate::game::state::{MatchId, MatchMode, MatchPhase, MatchState};
use crate::game::tower::{Tower, TowerKind};
use crate::game::troop::Troop;

/// Tower as shown to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TowerSnapshot {
    /// Kind.
    pub kind: TowerKind,
    /// Display name.
    pub name: String,
    /// Hit points.
    pub hp: u32,
    /// Full hit points.
    pub max_hp: u32,
    /// Slot.
    pub position: usize,
    /// Still standing.
    pub alive: bool,
}

impl From<&Tower> for TowerSnapshot {
    fn from(t: &Tower) -> Self {
        Self {
            kind: t.kind,
            name: t.name.clone(),
            hp: t.hp,
            max_hp: t.max_hp,
            position: t.position,
            alive: t.is_alive(),
        }
    }
}

/// Troop as shown to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TroopSnapshot {
    /// Catalog id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Hit points.
    pub hp: u32,
    /// Attack.
    pub attack: u32,
    /// Defense.
    pub defense: u32,
    /// Critical chance.
    pub crit_chance: f64,
    /// Mana cost.
    pub mana_cost: u32,
    /// Usable.
    pub alive: bool,
}

impl From<&Troop> for TroopSnapshot {
    fn from(t: &Troop) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            hp: t.hp,
            attack: t.attack,
            defense: t.defense,
            crit_chance: t.crit_chance,
            mana_cost: t.mana_cost,
            alive: t.is_alive(),
        }
    }
}

/// One seat as shown to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    /// Player id.
    pub id: PlayerId,
    /// Display name.
    pub username: String,
    /// Current mana.
    pub mana: u32,
    /// Mana cap.
    pub max_mana: u32,
    /// Towers in slot order.
    pub towers: Vec<TowerSnapshot>,
    /// Usable troops.
    pub troops: Vec<TroopSnapshot>,
}

impl From<&Combatant> for PlayerSnapshot {
    fn from(c: &Combatant) -> Self {
        Self {
            id: c.id().clone(),
            username: c.player.username.clone(),
            mana: c.mana,
            max_mana: c.max_mana,
            towers: c.towers.iter().map(TowerSnapshot::from).collect(),
            troops: c.troops.iter().map(TroopSnapshot::from).collect(),
        }
    }
}

/// Whole match as shown to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchSnapshot {
    /// Match id.
    pub match_id: MatchId,
    /// Rule set.
    pub mode: MatchMode,
    /// Lifecycle phase.
    pub state: MatchPhase,
    /// Seated players in seat order.
    pub players: Vec<PlayerSnapshot>,
    /// Simple mode: seat index holding the turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_turn: Option<usize>,
    /// Simple mode: player holding the turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_player: Option<PlayerId>,
    /// Simple mode: slots the turn holder may attack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_targets: Option<Vec<usize>>,
    /// Enhanced mode: declared length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// Enhanced mode: seconds remaining.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left_secs: Option<u64>,
    /// When the match started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the match finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Winner once finished, `None` on a draw.
    pub winner: Option<PlayerId>,
    /// Enhanced mode, once finished: towers each player lost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub towers_lost: Option<BTreeMap<PlayerId, usize>>,
}

impl MatchSnapshot {
    /// Capture a match. `time_left_secs` is only used for enhanced matches.
    pub fn capture(game: &MatchState, time_left_secs: Option<u64>) -> Self {
        let mut snapshot = Self {
            match_id: game.id.clone(),
            mode: game.mode,
            state: game.phase,
            players: game.combatants().map(PlayerSnapshot::from).collect(),
            current_turn: None,
            current_player: None,
            valid_targets: None,
            duration_secs: None,
            time_left_secs: None,
            started_at: game.started_at,
            ended_at: game.ended_at,
            winner: game.winner_id(),
            towers_lost: None,
        };

        match game.mode {
            MatchMode::Simple => {
                if game.is_in_progress() {
                    let turn = game.current_turn;
                    snapshot.current_turn = Some(turn.index());
                    snapshot.current_player = game.combatant(turn).map(|c| c.id().clone());
                    snapshot.valid_targets = Some(valid_targets(game, turn.opponent()));
                }
            }
            MatchMode::Enhanced => {
                snapshot.duration_secs = game.duration_secs;
                snapshot.time_left_secs = time_left_secs;
                if game.is_finished() {
                    snapshot.towers_lost = Some(
                        game.combatants()
                            .map(|c| (c.id().clone(), count_destroyed(c)))
                            .collect(),
                    );
                }
            }
        }

        snapshot
    }

    /// Snapshot of one player.
    pub fn player(&self, id: &PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| &p.id == id)
    }
}
