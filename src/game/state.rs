//! Match State Definitions
//!
//! The match record: mode, lifecycle phase, the two seats, turn holder,
//! timestamps and the event log. All mutators keep the lifecycle
//! one-directional and the seat count at two or fewer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::error::EngineError;
use crate::game::events::{EndReason, GameEvent, GameEventData};
use crate::game::player::{Combatant, PlayerId};

/// Longest accepted match id.
pub const MAX_MATCH_ID_LEN: usize = 50;
/// Players in every match. The match starts when this many are seated.
pub const MATCH_CAPACITY: usize = 2;

// =============================================================================
// MATCH ID
// =============================================================================

/// Caller-supplied match identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl MatchId {
    /// Validate and wrap an id: 1 to 50 characters of `[A-Za-z0-9_-]`.
    pub fn parse(id: &str) -> Result<Self, EngineError> {
        if id.is_empty() {
            return Err(EngineError::InvalidMatchId("match id cannot be empty".into()));
        }
        if id.len() > MAX_MATCH_ID_LEN {
            return Err(EngineError::InvalidMatchId(format!(
                "match id too long (max {} characters)",
                MAX_MATCH_ID_LEN
            )));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(EngineError::InvalidMatchId(format!(
                "match id {:?} contains invalid characters",
                id
            )));
        }
        Ok(Self(id.to_string()))
    }

    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// MODE / PHASE / SIDE
// =============================================================================

/// Rule set a match runs under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Turn-based.
    Simple,
    /// Real-time with mana and a clock.
    Enhanced,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Simple => f.write_str("simple"),
            MatchMode::Enhanced => f.write_str("enhanced"),
        }
    }
}

/// Match lifecycle. Only moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Waiting for players.
    #[default]
    Waiting,
    /// Match running.
    InProgress,
    /// Terminal.
    Finished,
}

/// One of the two seats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// First to join; moves first in simple mode.
    Home,
    /// Second to join.
    Away,
}

impl Side {
    /// Both seats in join order.
    pub const BOTH: [Side; 2] = [Side::Home, Side::Away];

    /// The other seat.
    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    /// Seat index, 0 for home and 1 for away.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Side::Home => 0,
            Side::Away => 1,
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of one match.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Identifier.
    pub id: MatchId,
    /// Rule set.
    pub mode: MatchMode,
    /// Lifecycle phase.
    pub phase: MatchPhase,
    /// First seat.
    pub home: Option<Combatant>,
    /// Second seat.
    pub away: Option<Combatant>,
    /// Turn holder (simple mode).
    pub current_turn: Side,
    /// Declared length (enhanced mode).
    pub duration_secs: Option<u64>,
    /// When the match started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the match finished.
    pub ended_at: Option<DateTime<Utc>>,
    /// Winning side, `None` while running or on a draw.
    pub winner: Option<Side>,
    /// Append-only event log.
    pub events: Vec<GameEvent>,
    /// Match RNG for troop draws and critical rolls.
    pub rng: DeterministicRng,
}

impl MatchState {
    /// Create an empty match waiting for players.
    pub fn new(id: MatchId, mode: MatchMode, rng: DeterministicRng) -> Self {
        Self {
            id,
            mode,
            phase: MatchPhase::Waiting,
            home: None,
            away: None,
            current_turn: Side::Home,
            duration_secs: None,
            started_at: None,
            ended_at: None,
            winner: None,
            events: Vec::new(),
            rng,
        }
    }

    /// Seated players.
    pub fn player_count(&self) -> usize {
        self.home.is_some() as usize + self.away.is_some() as usize
    }

    /// Is the match running?
    #[inline]
    pub fn is_in_progress(&self) -> bool {
        self.phase == MatchPhase::InProgress
    }

    /// Has the match finished?
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.phase == MatchPhase::Finished
    }

    /// Seat a player in the first free slot and log `player_joined`.
    pub fn add_player(&mut self, combatant: Combatant) -> Result<Side, EngineError> {
        if self.side_of(combatant.id()).is_some() {
            return Err(EngineError::AlreadyJoined(combatant.id().clone()));
        }
        if self.phase != MatchPhase::Waiting {
            return Err(EngineError::MatchFull);
        }

        let side = match (&self.home, &self.away) {
            (None, _) => Side::Home,
            (Some(_), None) => Side::Away,
            (Some(_), Some(_)) => return Err(EngineError::MatchFull),
        };

        let id = combatant.id().clone();
        let username = combatant.player.username.clone();
        *self.seat_mut(side) = Some(combatant);
        self.record(GameEvent::new(Some(id), GameEventData::PlayerJoined { username }));

        Ok(side)
    }

    /// Seat of a player, if seated.
    pub fn side_of(&self, player_id: &PlayerId) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|&side| self.combatant(side).is_some_and(|c| c.id() == player_id))
    }

    /// Combatant in a seat.
    pub fn combatant(&self, side: Side) -> Option<&Combatant> {
        match side {
            Side::Home => self.home.as_ref(),
            Side::Away => self.away.as_ref(),
        }
    }

    /// Mutable combatant in a seat.
    pub fn combatant_mut(&mut self, side: Side) -> Option<&mut Combatant> {
        self.seat_mut(side).as_mut()
    }

    fn seat_mut(&mut self, side: Side) -> &mut Option<Combatant> {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }

    /// Both seated combatants in seat order.
    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.home.iter().chain(self.away.iter())
    }

    /// Mutable access to every seated combatant.
    pub fn combatants_mut(&mut self) -> impl Iterator<Item = &mut Combatant> {
        self.home.iter_mut().chain(self.away.iter_mut())
    }

    /// Split borrow for an attack: attacker, defender and the match RNG.
    pub fn battle_parts(
        &mut self,
        attacker: Side,
    ) -> Option<(&mut Combatant, &mut Combatant, &mut DeterministicRng)> {
        let (home, away) = (self.home.as_mut()?, self.away.as_mut()?);
        match attacker {
            Side::Home => Some((home, away, &mut self.rng)),
            Side::Away => Some((away, home, &mut self.rng)),
        }
    }

    /// Keep `count` distinct troops drawn at random from a seat's pool
    /// (all of them if the pool is smaller).
    pub fn draw_troops(&mut self, side: Side, count: usize) {
        let rng = &mut self.rng;
        let seat = match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        };
        if let Some(combatant) = seat.as_mut() {
            let picks = rng.sample_indices(combatant.troops.len(), count);
            combatant.troops = picks.into_iter().map(|i| combatant.troops[i].clone()).collect();
        }
    }

    /// Move to in-progress and log `match_started`.
    pub fn begin(&mut self, now: DateTime<Utc>) {
        if self.phase != MatchPhase::Waiting {
            return;
        }
        self.phase = MatchPhase::InProgress;
        self.started_at = Some(now);
        self.current_turn = Side::Home;
        self.record(GameEvent::new(None, GameEventData::MatchStarted { mode: self.mode }));
    }

    /// Move to finished, stamp the end time and log `match_ended`.
    ///
    /// No-op on an already finished match.
    pub fn finish(&mut self, winner: Option<Side>, reason: EndReason, now: DateTime<Utc>) {
        if self.is_finished() {
            return;
        }
        self.phase = MatchPhase::Finished;
        self.ended_at = Some(now);
        self.winner = winner;

        let winner_id = self.winner_id();
        self.record(GameEvent::new(
            winner_id.clone(),
            GameEventData::MatchEnded { winner: winner_id, reason },
        ));
    }

    /// Winner's player id.
    pub fn winner_id(&self) -> Option<PlayerId> {
        self.winner
            .and_then(|side| self.combatant(side))
            .map(|c| c.id().clone())
    }

    /// Append to the event log.
    #[inline]
    pub fn record(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Seconds between start and end, for finished matches.
    pub fn elapsed_secs(&self) -> Option<f64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }
}
