//! # Tower Clash Match Engine
//!
//! Authoritative in-memory engine for two-player tower-destruction matches,
//! in a turn-based "simple" mode and a real-time "enhanced" mode with mana
//! regeneration and a match clock.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TOWER CLASH ENGINE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  └── rng.rs      - Xorshift128+ PRNG, per-match seeding      │
//! │                                                              │
//! │  game/           - Rules (no locking, no awaiting)           │
//! │  ├── player.rs   - Player record and match combatant         │
//! │  ├── tower.rs    - Towers and templates                      │
//! │  ├── troop.rs    - Troops and the default catalog            │
//! │  ├── state.rs    - Match state and lifecycle                 │
//! │  ├── combat.rs   - Damage, targeting, winner detection       │
//! │  └── events.rs   - Event log records                         │
//! │                                                              │
//! │  engine/         - Coordination (async)                      │
//! │  ├── registry.rs - Live matches, mode dispatch               │
//! │  ├── simple.rs   - Turn-based coordinator                    │
//! │  ├── enhanced.rs - Real-time coordinator and timers          │
//! │  ├── broadcast.rs- Subscriber fan-out                        │
//! │  └── snapshot.rs - Client view                               │
//! │                                                              │
//! │  directory.rs    - Player and template collaborators         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//!
//! The registry lock guards membership only. Each match has its own mutex,
//! taken after the registry lock is released. Enhanced timers take the
//! same match mutex as requests, so every mutation of a match is serialized.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod directory;
pub mod engine;
pub mod error;
pub mod game;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig, EnhancedConfig, SimpleConfig};
pub use crate::core::rng::DeterministicRng;
pub use directory::{DefaultCatalog, MemoryDirectory, PlayerDirectory, TemplateCatalog};
pub use engine::{MatchRegistry, MatchSnapshot, EnhancedAction, TurnAction, MatchAction};
pub use error::{DirectoryError, EngineError, RuleViolation};
pub use game::{MatchId, MatchMode, MatchPhase, Player, PlayerId, Side};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Troops each player keeps for a simple mode match.
pub const TROOPS_PER_PLAYER: usize = 3;
