//! Towers
//!
//! Each side defends three towers in fixed slots: two guards and the king.

use serde::{Serialize, Deserialize};

use crate::game::player::scale_stat;

/// Slot of the left guard tower.
pub const LEFT_GUARD: usize = 0;
/// Slot of the right guard tower.
pub const RIGHT_GUARD: usize = 1;
/// Slot of the king tower.
pub const KING: usize = 2;
/// Towers per side.
pub const TOWER_COUNT: usize = 3;

/// Tower kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TowerKind {
    /// Primary tower; losing it loses the match.
    #[serde(rename = "king_tower")]
    King,
    /// Secondary tower guarding the king.
    #[serde(rename = "guard_tower")]
    Guard,
}

/// Base stats for one tower kind before level scaling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerTemplate {
    /// Hit points.
    pub hp: u32,
    /// Attack.
    pub attack: u32,
    /// Defense.
    pub defense: u32,
    /// Critical hit chance in [0, 1].
    pub crit_chance: f64,
}

/// Templates for both tower kinds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerTemplates {
    /// Guard tower stats.
    pub guard: TowerTemplate,
    /// King tower stats.
    pub king: TowerTemplate,
}

impl Default for TowerTemplates {
    fn default() -> Self {
        Self {
            guard: TowerTemplate { hp: 300, attack: 20, defense: 10, crit_chance: 0.05 },
            king: TowerTemplate { hp: 500, attack: 25, defense: 15, crit_chance: 0.10 },
        }
    }
}

impl TowerTemplates {
    /// Template for a kind.
    pub fn for_kind(&self, kind: TowerKind) -> &TowerTemplate {
        match kind {
            TowerKind::King => &self.king,
            TowerKind::Guard => &self.guard,
        }
    }
}

/// A tower instance owned by one side of one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tower {
    /// Kind.
    pub kind: TowerKind,
    /// Display name.
    pub name: String,
    /// Current hit points. Never negative.
    pub hp: u32,
    /// Hit points at full health.
    pub max_hp: u32,
    /// Attack.
    pub attack: u32,
    /// Defense subtracted from incoming troop attack.
    pub defense: u32,
    /// Critical hit chance.
    pub crit_chance: f64,
    /// Upgrade level applied.
    pub level: u32,
    /// Slot: 0 left guard, 1 right guard, 2 king.
    pub position: usize,
}

impl Tower {
    /// Build a tower from its template at the owner's upgrade level.
    pub fn from_template(
        kind: TowerKind,
        name: &str,
        position: usize,
        template: &TowerTemplate,
        level: u32,
    ) -> Self {
        let level = level.max(1);
        let hp = scale_stat(template.hp, level);
        Self {
            kind,
            name: name.to_string(),
            hp,
            max_hp: hp,
            attack: scale_stat(template.attack, level),
            defense: scale_stat(template.defense, level),
            crit_chance: template.crit_chance,
            level,
            position,
        }
    }

    /// Is the tower still standing?
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Apply damage, clamping at zero. Returns hit points actually removed.
    pub fn take_damage(&mut self, damage: u32) -> u32 {
        let applied = damage.min(self.hp);
        self.hp -= applied;
        applied
    }
}

/// Raise the standard three towers for one side.
pub fn raise_towers(
    templates: &TowerTemplates,
    guard_level: u32,
    king_level: u32,
) -> [Tower; TOWER_COUNT] {
    [
        Tower::from_template(TowerKind::Guard, "Left Guard Tower", LEFT_GUARD, &templates.guard, guard_level),
        Tower::from_template(TowerKind::Guard, "Right Guard Tower", RIGHT_GUARD, &templates.guard, guard_level),
        Tower::from_template(TowerKind::King, "King Tower", KING, &templates.king, king_level),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_towers() {
        let towers = raise_towers(&TowerTemplates::default(), 1, 1);

        assert_eq!(towers[LEFT_GUARD].hp, 300);
        assert_eq!(towers[RIGHT_GUARD].max_hp, 300);
        assert_eq!(towers[KING].hp, 500);
        assert_eq!(towers[KING].kind, TowerKind::King);
        assert!(towers.iter().all(Tower::is_alive));
        assert_eq!(towers.iter().map(|t| t.position).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_level_scaling() {
        let towers = raise_towers(&TowerTemplates::default(), 3, 0);

        // +10% per level above 1
        assert_eq!(towers[LEFT_GUARD].hp, 360);
        assert_eq!(towers[LEFT_GUARD].defense, 12);
        assert_eq!(towers[LEFT_GUARD].level, 3);

        // Level 0 is treated as level 1
        assert_eq!(towers[KING].hp, 500);
        assert_eq!(towers[KING].level, 1);
    }

    #[test]
    fn test_damage_clamps_at_zero() {
        let mut tower = Tower::from_template(
            TowerKind::Guard, "Left Guard Tower", LEFT_GUARD, &TowerTemplates::default().guard, 1,
        );

        assert_eq!(tower.take_damage(120), 120);
        assert_eq!(tower.hp, 180);

        assert_eq!(tower.take_damage(1000), 180);
        assert_eq!(tower.hp, 0);
        assert!(!tower.is_alive());
    }
}
