//! Players
//!
//! [`Player`] is the persistent account record owned by the player directory.
//! [`Combatant`] wraps a player for the lifetime of one match and carries the
//! match-scoped towers, troops and mana.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tokio::time::Instant;

use crate::game::tower::{raise_towers, Tower, TowerKind, TowerTemplates, TOWER_COUNT};
use crate::game::troop::Troop;

/// Mana a combatant starts a match with.
pub const DEFAULT_MANA_START: u32 = 5;
/// Default mana cap.
pub const DEFAULT_MANA_MAX: u32 = 10;
/// Experience needed per level.
pub const EXP_PER_LEVEL: u32 = 100;

/// Scale a base stat to an upgrade level: +10% per level above 1, truncated.
pub fn scale_stat(base: u32, level: u32) -> u32 {
    let level = level.max(1);
    let multiplier = 1.0 + 0.1 * f64::from(level - 1);
    (f64::from(base) * multiplier) as u32
}

// =============================================================================
// PLAYER ID
// =============================================================================

/// Player identifier as issued by the account subsystem.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Borrow as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// PLAYER (persistent)
// =============================================================================

/// Win/loss/draw counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Finished matches.
    pub games_played: u32,
    /// Wins.
    pub games_won: u32,
    /// Losses.
    pub games_lost: u32,
    /// Draws.
    pub games_drawn: u32,
}

/// Persistent player record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Identity.
    pub id: PlayerId,
    /// Display name.
    pub username: String,
    /// Accumulated experience.
    pub experience: u32,
    /// Level derived from experience. Never decreases.
    pub level: u32,
    /// Upgrade level per troop id. Missing entries mean level 1.
    #[serde(default)]
    pub troop_levels: BTreeMap<String, u32>,
    /// Upgrade level per tower kind. Missing entries mean level 1.
    #[serde(default)]
    pub tower_levels: BTreeMap<TowerKind, u32>,
    /// Match counters.
    #[serde(default)]
    pub stats: PlayerStats,
}

impl Player {
    /// New level 1 player with no experience.
    pub fn new(id: impl Into<PlayerId>, username: &str) -> Self {
        Self {
            id: id.into(),
            username: username.to_string(),
            experience: 0,
            level: 1,
            troop_levels: BTreeMap::new(),
            tower_levels: BTreeMap::new(),
            stats: PlayerStats::default(),
        }
    }

    /// Add experience and level up every [`EXP_PER_LEVEL`] points.
    pub fn add_experience(&mut self, exp: u32) {
        self.experience = self.experience.saturating_add(exp);
        let new_level = self.experience / EXP_PER_LEVEL + 1;
        if new_level > self.level {
            self.level = new_level;
        }
    }

    /// Upgrade level for a troop id.
    pub fn troop_level(&self, troop_id: &str) -> u32 {
        self.troop_levels.get(troop_id).copied().unwrap_or(1)
    }

    /// Upgrade level for a tower kind.
    pub fn tower_level(&self, kind: TowerKind) -> u32 {
        self.tower_levels.get(&kind).copied().unwrap_or(1)
    }
}

// =============================================================================
// COMBATANT (match-scoped)
// =============================================================================

/// A player seated in a match, with everything the match owns for them.
#[derive(Clone, Debug)]
pub struct Combatant {
    /// The persistent record; progression changes are written back at the end.
    pub player: Player,
    /// Towers in slot order.
    pub towers: [Tower; TOWER_COUNT],
    /// Troops usable this match (leveled copies).
    pub troops: Vec<Troop>,
    /// Current mana.
    pub mana: u32,
    /// Mana cap.
    pub max_mana: u32,
    /// Instant up to which regeneration has been credited.
    pub last_mana_update: Instant,
}

impl Combatant {
    /// Seat a player with their troop pool and freshly raised towers.
    pub fn new(player: Player, troops: Vec<Troop>, templates: &TowerTemplates) -> Self {
        let towers = raise_towers(
            templates,
            player.tower_level(TowerKind::Guard),
            player.tower_level(TowerKind::King),
        );
        Self {
            player,
            towers,
            troops,
            mana: DEFAULT_MANA_START,
            max_mana: DEFAULT_MANA_MAX,
            last_mana_update: Instant::now(),
        }
    }

    /// Player id.
    #[inline]
    pub fn id(&self) -> &PlayerId {
        &self.player.id
    }

    /// Find a usable troop by id.
    pub fn troop(&self, troop_id: &str) -> Option<&Troop> {
        self.troops.iter().find(|t| t.id == troop_id)
    }

    /// Number of this combatant's towers at zero hit points.
    pub fn towers_destroyed(&self) -> usize {
        self.towers.iter().filter(|t| !t.is_alive()).count()
    }

    /// Reset mana for a new match.
    pub fn reset_mana(&mut self, start: u32, max: u32, now: Instant) {
        self.max_mana = max;
        self.mana = start.min(max);
        self.last_mana_update = now;
    }

    /// Deduct mana if affordable.
    pub fn spend_mana(&mut self, cost: u32) -> bool {
        if self.mana >= cost {
            self.mana -= cost;
            true
        } else {
            false
        }
    }

    /// Credit mana earned since the last update at `rate` per second.
    ///
    /// Only whole units are credited and the clock advances by exactly the
    /// time they represent, so calling this twice for the same instant never
    /// credits twice. A full pool does not bank time. Returns mana added.
    pub fn regenerate(&mut self, now: Instant, rate: f64) -> u32 {
        if self.mana >= self.max_mana || !rate.is_finite() || rate <= 0.0 {
            self.last_mana_update = now;
            return 0;
        }

        let elapsed = now.saturating_duration_since(self.last_mana_update).as_secs_f64();
        let earned = (elapsed * rate).floor();
        if earned < 1.0 {
            return 0;
        }

        let room = self.max_mana - self.mana;
        let credited = if earned >= f64::from(room) { room } else { earned as u32 };
        self.mana += credited;

        if self.mana >= self.max_mana {
            self.last_mana_update = now;
        } else {
            let consumed = Duration::from_secs_f64(f64::from(credited) / rate);
            self.last_mana_update = (self.last_mana_update + consumed).min(now);
        }

        credited
    }
}
