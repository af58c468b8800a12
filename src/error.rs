//! Engine Errors
//!
//! Two tiers. [`EngineError`] is structural: the operation is aborted and no
//! match state changes. [`RuleViolation`] is a rejected move: it travels back
//! inside a result with `success = false` and also leaves state untouched.

use thiserror::Error;

use crate::game::player::PlayerId;
use crate::game::state::{MatchId, MatchMode};

/// Structural failures surfaced to callers as client-facing errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// No live match with this id.
    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    /// A live match already uses this id.
    #[error("match {0} already exists")]
    AlreadyExists(MatchId),

    /// Match id failed validation.
    #[error("invalid match id: {0}")]
    InvalidMatchId(String),

    /// Both player slots are taken.
    #[error("match is full")]
    MatchFull,

    /// Player is already seated in this match.
    #[error("player {0} already in match")]
    AlreadyJoined(PlayerId),

    /// Action shape does not fit the match mode.
    #[error("match is in {actual} mode, action was for {expected} mode")]
    WrongMode {
        /// Mode the action was written for.
        expected: MatchMode,
        /// Mode of the match.
        actual: MatchMode,
    },

    /// Start was attempted without exactly two players.
    #[error("need exactly 2 players, got {0}")]
    NotEnoughPlayers(usize),

    /// A player has no troops to fight with.
    #[error("no troops available for player {0}")]
    NoTroops(PlayerId),

    /// Start was attempted on a match that is no longer waiting.
    #[error("match already started")]
    AlreadyStarted,

    /// The match has already been finalized.
    #[error("match already finished")]
    AlreadyFinished,

    /// Player directory lookup failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// A query the rules refuse, such as listing actions out of turn.
    #[error("rejected: {0}")]
    Rejected(#[from] RuleViolation),
}

/// Failures reported by a player directory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectoryError {
    /// No record for this player.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// Backing store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// A move the rules reject. Never mutates the match.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleViolation {
    /// Attacker or defender could not be resolved from the match.
    #[error("invalid players")]
    PlayersInvalid,

    /// Acting player is not part of the match.
    #[error("player not found")]
    PlayerNotFound,

    /// Troop is not in the attacker's usable pool.
    #[error("troop not found: {0}")]
    TroopNotFound(String),

    /// Tower slot outside `[0, 2]`.
    #[error("invalid tower index: {0}")]
    InvalidTarget(i32),

    /// King tower targeted while a guard tower stands.
    #[error("must destroy guard towers before attacking king tower")]
    GuardTowersStanding,

    /// Right guard targeted while the left guard stands.
    #[error("must destroy left guard tower before right guard tower")]
    LeftGuardStanding,

    /// Target tower is already at zero hit points.
    #[error("target tower is already destroyed")]
    TargetAlreadyDestroyed,

    /// Not enough mana for the troop.
    #[error("insufficient mana: need {need}, have {have}")]
    InsufficientResource {
        /// Troop cost.
        need: u32,
        /// Mana on hand.
        have: u32,
    },

    /// Simple mode: someone else holds the turn.
    #[error("not your turn")]
    NotYourTurn,

    /// Action type is not defined for this mode.
    #[error("invalid action type: {0}")]
    InvalidAction(String),

    /// Match is over (or has not started).
    #[error("game has ended")]
    GameEnded,
}

impl RuleViolation {
    /// Stable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            RuleViolation::PlayersInvalid => "PLAYERS_INVALID",
            RuleViolation::PlayerNotFound => "PLAYER_NOT_FOUND",
            RuleViolation::TroopNotFound(_) => "TROOP_NOT_FOUND",
            RuleViolation::InvalidTarget(_)
            | RuleViolation::GuardTowersStanding
            | RuleViolation::LeftGuardStanding
            | RuleViolation::TargetAlreadyDestroyed => "INVALID_TARGET",
            RuleViolation::InsufficientResource { .. } => "INSUFFICIENT_MANA",
            RuleViolation::NotYourTurn => "NOT_YOUR_TURN",
            RuleViolation::InvalidAction(_) => "INVALID_ACTION",
            RuleViolation::GameEnded => "GAME_ENDED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages() {
        let err = RuleViolation::InsufficientResource { need: 4, have: 2 };
        assert_eq!(err.to_string(), "insufficient mana: need 4, have 2");
        assert_eq!(err.code(), "INSUFFICIENT_MANA");
        assert_eq!(RuleViolation::LeftGuardStanding.code(), "INVALID_TARGET");
    }

    #[test]
    fn test_directory_error_converts() {
        let err: EngineError = DirectoryError::NotFound(PlayerId::from("ghost")).into();
        assert!(matches!(err, EngineError::Directory(DirectoryError::NotFound(_))));
        assert_eq!(err.to_string(), "directory error: player ghost not found");
    }
}
