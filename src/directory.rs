//! External Collaborators
//!
//! The engine reaches player records and templates only through these
//! traits. Account storage and template files live outside the engine.
//!
//! ```text
//! engine calls:            host implements:
//! ┌──────────────────┐    ┌──────────────────┐
//! │ PlayerDirectory  │ ←─ │ accounts / DB     │
//! │ TemplateCatalog  │ ←─ │ template files    │
//! └──────────────────┘    └──────────────────┘
//! ```

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::DirectoryError;
use crate::game::player::{Player, PlayerId};
use crate::game::tower::TowerTemplates;
use crate::game::troop::{default_troops, Troop};

/// Source and sink of persistent player records.
pub trait PlayerDirectory: Send + Sync {
    /// Load a player by id.
    fn load_player(&self, id: &PlayerId) -> Result<Player, DirectoryError>;

    /// Persist a player record.
    fn save_player(&self, player: &Player) -> Result<(), DirectoryError>;
}

/// Source of troop and tower templates.
pub trait TemplateCatalog: Send + Sync {
    /// Every troop template.
    fn troop_templates(&self) -> Vec<Troop>;

    /// Tower templates.
    fn tower_templates(&self) -> TowerTemplates;
}

/// Leveled copies of every catalog troop for one player.
pub fn troops_for(player: &Player, catalog: &dyn TemplateCatalog) -> Vec<Troop> {
    catalog
        .troop_templates()
        .iter()
        .map(|t| t.leveled(player.troop_level(&t.id)))
        .collect()
}

// =============================================================================
// IN-MEMORY IMPLEMENTATIONS
// =============================================================================

/// Player directory backed by a map. Used by tests and the demo binary.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    players: RwLock<BTreeMap<PlayerId, Player>>,
}

impl MemoryDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, player: Player) {
        self.players.write().insert(player.id.clone(), player);
    }

    /// Snapshot of a record.
    pub fn get(&self, id: &PlayerId) -> Option<Player> {
        self.players.read().get(id).cloned()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    /// Is the directory empty?
    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }
}

impl PlayerDirectory for MemoryDirectory {
    fn load_player(&self, id: &PlayerId) -> Result<Player, DirectoryError> {
        self.get(id).ok_or_else(|| DirectoryError::NotFound(id.clone()))
    }

    fn save_player(&self, player: &Player) -> Result<(), DirectoryError> {
        self.insert(player.clone());
        Ok(())
    }
}

/// Catalog serving the stock templates.
#[derive(Debug, Clone, Default)]
pub struct DefaultCatalog;

impl TemplateCatalog for DefaultCatalog {
    fn troop_templates(&self) -> Vec<Troop> {
        default_troops()
    }

    fn tower_templates(&self) -> TowerTemplates {
        TowerTemplates::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_directory_round_trip() {
        let dir = MemoryDirectory::new();
        assert!(dir.is_empty());

        let mut player = Player::new("p1", "alice");
        dir.insert(player.clone());

        player.add_experience(150);
        dir.save_player(&player).unwrap();

        let loaded = dir.load_player(&PlayerId::from("p1")).unwrap();
        assert_eq!(loaded.level, 2);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_missing_player() {
        let dir = MemoryDirectory::new();
        assert_eq!(
            dir.load_player(&PlayerId::from("ghost")),
            Err(DirectoryError::NotFound(PlayerId::from("ghost")))
        );
    }

    #[test]
    fn test_troops_scaled_per_player() {
        let mut player = Player::new("p1", "alice");
        player.troop_levels.insert("goblin".into(), 2);

        let troops = troops_for(&player, &DefaultCatalog);
        assert_eq!(troops.len(), 5);

        let goblin = troops.iter().find(|t| t.id == "goblin").unwrap();
        assert_eq!(goblin.attack, 33);
        let archer = troops.iter().find(|t| t.id == "archer").unwrap();
        assert_eq!(archer.attack, 35);
    }
}
