//! Match Engine
//!
//! Concurrency and coordination over the game rules.
//!
//! - `registry`: Live matches, mode dispatch, at most one match per id
//! - `simple`: Turn-based coordinator
//! - `enhanced`: Real-time coordinator with deadline and mana ticker
//! - `broadcast`: Event fan-out to subscribers
//! - `snapshot`: Client view of a match
//! - `action`: Player actions and their results
//! - `outcome`: Stats, experience and persistence at match end

pub mod action;
pub mod broadcast;
pub mod enhanced;
pub mod outcome;
pub mod registry;
pub mod simple;
pub mod snapshot;

pub use action::{ActionOutcome, EnhancedAction, EnhancedResult, MatchAction, TurnAction, TurnResult};
pub use broadcast::EventBroadcaster;
pub use enhanced::{EnhancedCoordinator, EnhancedSession, EnhancedState};
pub use registry::{JoinOutcome, MatchHandle, MatchRegistry, RegistryStats};
pub use simple::SimpleCoordinator;
pub use snapshot::MatchSnapshot;
