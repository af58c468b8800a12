//! Game Events
//!
//! Append-only match log. The same records are fanned out to subscribers
//! wrapped in a [`MatchEvent`].

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::game::combat::BattleResult;
use crate::game::player::PlayerId;
use crate::game::state::{MatchId, MatchMode};

/// Why a match ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A king tower fell.
    KingTowerDestroyed,
    /// Enhanced mode clock ran out.
    TimeUp,
    /// Ended by the registry with a caller-supplied reason.
    Requested(String),
}

impl EndReason {
    /// Reason as a flat string.
    pub fn as_str(&self) -> &str {
        match self {
            EndReason::KingTowerDestroyed => "king_tower_destroyed",
            EndReason::TimeUp => "time_up",
            EndReason::Requested(reason) => reason,
        }
    }
}

/// Event payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventData {
    /// A player took a seat.
    PlayerJoined {
        /// Display name.
        username: String,
    },

    /// Both players seated, match running.
    MatchStarted {
        /// Rule set.
        mode: MatchMode,
    },

    /// Simple mode turn passed.
    TurnChanged {
        /// Player now holding the turn.
        current_player: PlayerId,
    },

    /// An attack was resolved.
    AttackMade(BattleResult),

    /// A tower reached zero hit points.
    TowerDestroyed {
        /// Owner of the tower.
        owner: PlayerId,
        /// Slot of the tower.
        position: usize,
    },

    /// Terminal event.
    MatchEnded {
        /// Winner, `None` on a draw.
        winner: Option<PlayerId>,
        /// Why it ended.
        reason: EndReason,
    },
}

/// A logged event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Player that caused the event, if any.
    pub player_id: Option<PlayerId>,
    /// Wall-clock time the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Payload.
    pub data: GameEventData,
}

impl GameEvent {
    /// Event stamped now.
    pub fn new(player_id: Option<PlayerId>, data: GameEventData) -> Self {
        Self {
            player_id,
            timestamp: Utc::now(),
            data,
        }
    }

    /// Type tag of the payload.
    pub fn kind(&self) -> &'static str {
        match &self.data {
            GameEventData::PlayerJoined { .. } => "player_joined",
            GameEventData::MatchStarted { .. } => "match_started",
            GameEventData::TurnChanged { .. } => "turn_changed",
            GameEventData::AttackMade(_) => "attack_made",
            GameEventData::TowerDestroyed { .. } => "tower_destroyed",
            GameEventData::MatchEnded { .. } => "match_ended",
        }
    }

    /// Is this the terminal event?
    pub fn is_terminal(&self) -> bool {
        matches!(self.data, GameEventData::MatchEnded { .. })
    }
}

/// Event delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Match the event belongs to.
    pub match_id: MatchId,
    /// The logged event.
    pub event: GameEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_tagged() {
        let event = GameEvent::new(
            Some(PlayerId::from("p1")),
            GameEventData::TowerDestroyed { owner: PlayerId::from("p2"), position: 0 },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["type"], "tower_destroyed");
        assert_eq!(json["data"]["owner"], "p2");
        assert_eq!(event.kind(), "tower_destroyed");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_end_reason_strings() {
        assert_eq!(EndReason::TimeUp.as_str(), "time_up");
        assert_eq!(EndReason::KingTowerDestroyed.as_str(), "king_tower_destroyed");
        assert_eq!(EndReason::Requested("admin".into()).as_str(), "admin");
    }
}
