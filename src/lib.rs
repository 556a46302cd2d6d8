//! Scalar Neural Graph Library
//!
//! This library provides a mutable directed graph of weighted connections
//! between scalar computation nodes, organized into layers, with forward
//! signal propagation and backward error propagation (gradient descent with
//! momentum). Beyond plain feed-forward stacks it supports recurrent context
//! banks, sparse random echo reservoirs, and competitive self-organizing maps.
//!
//! # Modules
//!
//! - `activation`: Activation functions and their numeric guards
//! - `weight`: Weighted connections with pending-change accumulation
//! - `node`: Scalar computation nodes and their connection caches
//! - `layer`: Layer membership and per-variant parameters
//! - `network`: The graph arena, passes, and topology builders
//! - `config`: JSON topology configuration and network building
//! - `utils`: Shared utilities (RNG)

pub mod activation;
pub mod config;
pub mod layer;
pub mod network;
pub mod node;
pub mod utils;
pub mod weight;

pub use activation::{Activation, ActivationError};
pub use layer::{Layer, LayerId, LayerKind};
pub use network::Network;
pub use node::{Direction, Node, NodeId, NodeKind};
pub use utils::rng::SimpleRng;
pub use weight::{Weight, WeightId};
