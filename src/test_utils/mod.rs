//! Helpers for known-answer tests.

pub mod det_rng;

pub use det_rng::DeterministicRng;
