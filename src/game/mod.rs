//! Game Logic Module
//!
//! Entity model and combat rules. Nothing here awaits or locks; the engine
//! layer owns concurrency.
//!
//! ## Module Structure
//!
//! - `player`: Persistent player record and the match-scoped combatant
//! - `tower`: Tower kinds, templates and instances
//! - `troop`: Troop templates and the default catalog
//! - `state`: Match state, seats and lifecycle
//! - `combat`: Damage, target legality and winner detection
//! - `events`: Event log records

pub mod player;
pub mod tower;
pub mod troop;
pub mod state;
pub mod combat;
pub mod events;

// Re-export key types
pub use player::{Combatant, Player, PlayerId, PlayerStats};
pub use tower::{Tower, TowerKind, TowerTemplate, TowerTemplates};
pub use troop::Troop;
pub use state::{MatchId, MatchMode, MatchPhase, MatchState, Side};
pub use combat::{BattleResult, CombatResolver};
pub use events::{EndReason, GameEvent, GameEventData, MatchEvent};
