//! Player Actions and Results
//!
//! Actions are decoded from client JSON; results go back the same way.
//! Rule violations travel inside a result with `success = false`.

use serde::{Serialize, Deserialize};

use crate::error::RuleViolation;
use crate::game::combat::BattleResult;
use crate::game::player::PlayerId;
use crate::game::state::MatchMode;

/// Action type accepted in simple mode.
pub const ACTION_ATTACK: &str = "attack";
/// Action type accepted in enhanced mode.
pub const ACTION_SPAWN_TROOP: &str = "spawn_troop";

/// A simple mode turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAction {
    /// Must be `"attack"`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Troop to attack with.
    pub troop_id: String,
    /// Tower slot to hit.
    pub target_tower: i32,
}

impl TurnAction {
    /// An `attack` action.
    pub fn attack(troop_id: &str, target_tower: i32) -> Self {
        Self {
            action_type: ACTION_ATTACK.to_string(),
            troop_id: troop_id.to_string(),
            target_tower,
        }
    }
}

/// An enhanced mode action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedAction {
    /// Must be `"spawn_troop"`.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Troop to deploy.
    pub troop_id: String,
    /// Tower slot to hit.
    pub target_tower: i32,
}

impl EnhancedAction {
    /// A `spawn_troop` action.
    pub fn spawn(troop_id: &str, target_tower: i32) -> Self {
        Self {
            action_type: ACTION_SPAWN_TROOP.to_string(),
            troop_id: troop_id.to_string(),
            target_tower,
        }
    }
}

/// Either kind of action, as routed by the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchAction {
    /// Simple mode turn.
    Turn(TurnAction),
    /// Enhanced mode action.
    Enhanced(EnhancedAction),
}

impl MatchAction {
    /// Mode the action was written for.
    pub fn mode(&self) -> MatchMode {
        match self {
            MatchAction::Turn(_) => MatchMode::Simple,
            MatchAction::Enhanced(_) => MatchMode::Enhanced,
        }
    }
}

impl From<TurnAction> for MatchAction {
    fn from(action: TurnAction) -> Self {
        MatchAction::Turn(action)
    }
}

impl From<EnhancedAction> for MatchAction {
    fn from(action: EnhancedAction) -> Self {
        MatchAction::Enhanced(action)
    }
}

/// Result of a simple mode turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TurnResult {
    /// Was the turn applied?
    pub success: bool,
    /// Attack outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battle_result: Option<BattleResult>,
    /// The same player moves again.
    pub can_continue: bool,
    /// Player to move next, `None` once the match is over.
    pub next_player: Option<PlayerId>,
    /// Advisory turn length.
    pub turn_remaining_secs: u64,
    /// Rejection message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable rejection code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl TurnResult {
    /// A rejected turn.
    pub fn rejected(violation: RuleViolation) -> Self {
        Self {
            success: false,
            error: Some(violation.to_string()),
            error_code: Some(violation.code()),
            ..Self::default()
        }
    }
}

/// Result of an enhanced mode action.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EnhancedResult {
    /// Was the action applied?
    pub success: bool,
    /// Attack outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battle_result: Option<BattleResult>,
    /// Actor's mana after the action.
    pub player_mana: u32,
    /// Seconds left on the clock.
    pub time_left_secs: u64,
    /// Match is over.
    pub game_ended: bool,
    /// Winner when over, `None` on a draw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
    /// Rejection message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable rejection code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl EnhancedResult {
    /// A rejected action.
    pub fn rejected(violation: RuleViolation) -> Self {
        Self {
            success: false,
            error: Some(violation.to_string()),
            error_code: Some(violation.code()),
            ..Self::default()
        }
    }
}

/// Result of a dispatched action.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionOutcome {
    /// Simple mode.
    Turn(TurnResult),
    /// Enhanced mode.
    Enhanced(EnhancedResult),
}

impl ActionOutcome {
    /// Was the action applied?
    pub fn success(&self) -> bool {
        match self {
            ActionOutcome::Turn(r) => r.success,
            ActionOutcome::Enhanced(r) => r.success,
        }
    }

    /// Stable rejection code, if rejected.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            ActionOutcome::Turn(r) => r.error_code,
            ActionOutcome::Enhanced(r) => r.error_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_turn_action() {
        let json = r#"{"type":"attack","troop_id":"goblin","target_tower":0}"#;
        let action: TurnAction = serde_json::from_str(json).unwrap();
        assert_eq!(action, TurnAction::attack("goblin", 0));
        assert_eq!(MatchAction::from(action).mode(), MatchMode::Simple);
    }

    #[test]
    fn test_rejected_result_serializes_code() {
        let result = EnhancedResult::rejected(RuleViolation::InsufficientResource { need: 7, have: 3 });
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "INSUFFICIENT_MANA");
        assert!(json.get("battle_result").is_none());
    }
}
