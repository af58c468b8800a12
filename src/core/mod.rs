//! Core primitives shared by every match.

pub mod rng;

pub use rng::DeterministicRng;
