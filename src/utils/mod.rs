//! Shared utilities for the graph engine.
//!
//! This module provides common helpers like random number generation
//! used across the network builders and demos.

pub mod rng;

pub use rng::SimpleRng;
