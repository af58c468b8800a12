//! Troops
//!
//! Offensive units. The catalog holds shared templates; every match works on
//! leveled copies so the templates are never touched.

use serde::{Serialize, Deserialize};

use crate::game::player::scale_stat;

/// A troop template or a per-match troop instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Troop {
    /// Catalog identifier, e.g. `"goblin"`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Hit points.
    pub hp: u32,
    /// Hit points at full health.
    pub max_hp: u32,
    /// Attack.
    pub attack: u32,
    /// Defense.
    pub defense: u32,
    /// Critical hit chance in [0, 1].
    pub crit_chance: f64,
    /// Mana spent to deploy (enhanced mode).
    pub mana_cost: u32,
    /// Flavor text.
    #[serde(default)]
    pub description: String,
    /// Upgrade level applied.
    pub level: u32,
}

impl Troop {
    /// Create a level 1 troop.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        name: &str,
        hp: u32,
        attack: u32,
        defense: u32,
        crit_chance: f64,
        mana_cost: u32,
        description: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            hp,
            max_hp: hp,
            attack,
            defense,
            crit_chance,
            mana_cost,
            description: description.to_string(),
            level: 1,
        }
    }

    /// Copy of this template scaled to `level` (+10% per level above 1).
    pub fn leveled(&self, level: u32) -> Troop {
        let level = level.max(1);
        let hp = scale_stat(self.max_hp, level);
        Troop {
            hp,
            max_hp: hp,
            attack: scale_stat(self.attack, level),
            defense: scale_stat(self.defense, level),
            level,
            ..self.clone()
        }
    }

    /// Is the troop still usable?
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }
}

/// The stock troop catalog.
pub fn default_troops() -> Vec<Troop> {
    vec![
        Troop::new("goblin", "Goblin", 100, 30, 5, 0.10, 2, "Fast and cheap melee unit"),
        Troop::new("archer", "Archer", 80, 35, 3, 0.15, 3, "Ranged attacker"),
        Troop::new("knight", "Knight", 200, 40, 15, 0.10, 4, "Armored frontline fighter"),
        Troop::new("wizard", "Wizard", 120, 55, 5, 0.20, 5, "Area damage spellcaster"),
        Troop::new("dragon", "Dragon", 300, 70, 20, 0.15, 7, "Flying heavy hitter"),
    ]
}
