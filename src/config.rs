//! Topology configuration structures
//!
//! This module provides configuration structures for defining network
//! topologies via JSON configuration files. This enables topology
//! experimentation without code changes. Layers are chained in the order
//! they appear: each layer feeds the next one.

use crate::activation::Activation;
use crate::layer::LayerKind;
use crate::network::Network;
use crate::node::{Direction, NodeKind};
use crate::utils::rng::SimpleRng;
use serde::Deserialize;
use std::error::Error;
use std::fs;

/// Configuration for a single layer in the network.
///
/// Defines the layer type and its parameters. Different layer types require
/// different fields:
///
/// - **base**: Requires `nodes`; optional `bias` adds a bias node with that
///   constant
/// - **output**: Requires `nodes`
/// - **recurrent_context**: Requires `levels` and `context_of` (index of an
///   earlier layer whose nodes are shadowed)
/// - **som**: Requires `nodes` (a perfect square); optional `max_distance`
///   (default 1.0), `min_distance` (default 0.0), `suppression` (default 1.0)
/// - **echo_reservoir**: Requires `nodes` and `connectivity` (probability of
///   each internal connection, range [0.0, 1.0])
///
/// The activation is shared by every node the layer creates:
///
/// - **linear**: No parameters (default)
/// - **step**: Optional `threshold` (default 0.0)
/// - **tanh**: No parameters
/// - **elliott**: Optional `scale` (default 1.0)
/// - **gaussian**: Optional `steepness` (default 1.0)
///
/// # Examples
///
/// ```json
/// {
///   "layer_type": "base",
///   "nodes": 2,
///   "activation": "tanh"
/// }
/// ```
///
/// ```json
/// {
///   "layer_type": "echo_reservoir",
///   "nodes": 50,
///   "connectivity": 0.1,
///   "activation": "tanh"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "base", "output", "recurrent_context", "som", or
    /// "echo_reservoir"
    pub layer_type: String,

    /// Number of nodes the layer creates (not used by recurrent_context)
    pub nodes: Option<usize>,

    /// Activation function: "linear", "step", "tanh", "elliott", or
    /// "gaussian" (default: "linear")
    pub activation: Option<String>,

    /// Threshold for the step activation (default: 0.0)
    pub threshold: Option<f64>,

    /// Scale for the elliott activation (default: 1.0)
    pub scale: Option<f64>,

    /// Steepness for the gaussian activation (default: 1.0)
    pub steepness: Option<f64>,

    /// Constant for an extra bias node appended to a base layer
    pub bias: Option<f64>,

    // Recurrent context parameters
    /// Bank depth per shadowed source node
    pub levels: Option<usize>,
    /// Index of the earlier layer whose nodes this bank shadows
    pub context_of: Option<usize>,

    // SOM parameters
    /// Upper bound of the learning-distance band (default: 1.0)
    pub max_distance: Option<f64>,
    /// Lower bound of the learning-distance band (default: 0.0)
    pub min_distance: Option<f64>,
    /// Neighbourhood suppression factor in [0.0, 1.0] (default: 1.0)
    pub suppression: Option<f64>,

    // Echo reservoir parameters
    /// Probability of each internal node-to-node connection
    pub connectivity: Option<f64>,
}

/// Configuration for the entire network topology.
///
/// Contains a sequence of layer configurations plus the training
/// hyperparameters. Layers feed each other in the order they appear.
///
/// # Example
///
/// ```json
/// {
///   "learning_rate": 0.3,
///   "momentum": 0.0,
///   "weight_variance": 1.0,
///   "layers": [
///     { "layer_type": "base", "nodes": 2, "activation": "linear" },
///     { "layer_type": "base", "nodes": 2, "activation": "tanh" },
///     { "layer_type": "output", "nodes": 1, "activation": "tanh" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Sequence of layer configurations defining the topology
    pub layers: Vec<LayerConfig>,

    /// Learning rate applied by reverse passes (default: 0.1)
    pub learning_rate: Option<f64>,

    /// Momentum factor applied by weight commits (default: 0.0)
    pub momentum: Option<f64>,

    /// Scale of the initial random weights (default: 1.0)
    pub weight_variance: Option<f64>,

    /// Draw initial weights from U(0,1) instead of U(-1,1) (default: false)
    pub positive_weights: Option<bool>,
}

/// Loads a topology configuration from a JSON file.
///
/// Reads the file at `path` and deserializes its JSON contents into a
/// `NetworkConfig`, then validates it.
///
/// # Returns
///
/// `Ok(NetworkConfig)` on success, or an error if the file cannot be read,
/// the JSON is invalid, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use neural_graph::config::load_topology;
///
/// let cfg = load_topology("config/xor.json").unwrap();
/// assert_eq!(cfg.layers.len(), 3);
/// ```
pub fn load_topology(path: &str) -> Result<NetworkConfig, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config: NetworkConfig = serde_json::from_str(&contents)?;
    validate_topology(&config)?;
    Ok(config)
}

/// Validates a topology configuration.
///
/// Checks that:
/// - The topology has at least one layer
/// - Each layer has the required fields for its type
/// - Parameter values are within valid ranges
/// - Context banks only shadow earlier layers
///
/// # Errors
///
/// Returns an error if validation fails with a descriptive message.
fn validate_topology(config: &NetworkConfig) -> Result<(), Box<dyn Error>> {
    if config.layers.is_empty() {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Topology must have at least one layer",
        )));
    }

    for (i, layer) in config.layers.iter().enumerate() {
        validate_layer(layer, i)?;
    }

    if let Some(learning_rate) = config.learning_rate {
        if learning_rate <= 0.0 {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "learning_rate must be positive",
            )));
        }
    }

    if let Some(momentum) = config.momentum {
        if !(0.0..=1.0).contains(&momentum) {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "momentum must be in range [0.0, 1.0]",
            )));
        }
    }

    if let Some(variance) = config.weight_variance {
        if variance < 0.0 {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "weight_variance must be non-negative",
            )));
        }
    }

    Ok(())
}

/// Validates a single layer configuration.
fn validate_layer(layer: &LayerConfig, index: usize) -> Result<(), Box<dyn Error>> {
    let layer_type = layer.layer_type.to_lowercase();

    match layer_type.as_str() {
        "base" | "output" => {
            if layer.nodes.map_or(true, |n| n == 0) {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "Layer {}: {} layer requires 'nodes' greater than 0",
                        index, layer.layer_type
                    ),
                )));
            }
        }
        "recurrent_context" => {
            if layer.levels.map_or(true, |l| l == 0) {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "Layer {}: recurrent_context layer requires 'levels' greater than 0",
                        index
                    ),
                )));
            }
            match layer.context_of {
                None => {
                    return Err(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(
                            "Layer {}: recurrent_context layer requires 'context_of'",
                            index
                        ),
                    )));
                }
                Some(source) if source >= index => {
                    return Err(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(
                            "Layer {}: 'context_of' must point at an earlier layer (got {})",
                            index, source
                        ),
                    )));
                }
                Some(_) => {}
            }
        }
        "som" => {
            let nodes = match layer.nodes {
                Some(n) if n > 0 => n,
                _ => {
                    return Err(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Layer {}: som layer requires 'nodes' greater than 0", index),
                    )));
                }
            };
            let side = (nodes as f64).sqrt() as usize;
            if side * side != nodes {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "Layer {}: som layer requires a square 'nodes' count (got {})",
                        index, nodes
                    ),
                )));
            }
            if let Some(suppression) = layer.suppression {
                if !(0.0..=1.0).contains(&suppression) {
                    return Err(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Layer {}: suppression must be in range [0.0, 1.0]", index),
                    )));
                }
            }
            let max = layer.max_distance.unwrap_or(1.0);
            let min = layer.min_distance.unwrap_or(0.0);
            if max < min {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "Layer {}: max_distance must not be below min_distance",
                        index
                    ),
                )));
            }
        }
        "echo_reservoir" => {
            if layer.nodes.map_or(true, |n| n == 0) {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "Layer {}: echo_reservoir layer requires 'nodes' greater than 0",
                        index
                    ),
                )));
            }
            match layer.connectivity {
                None => {
                    return Err(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(
                            "Layer {}: echo_reservoir layer requires 'connectivity'",
                            index
                        ),
                    )));
                }
                Some(p) if !(0.0..=1.0).contains(&p) => {
                    return Err(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(
                            "Layer {}: connectivity must be in range [0.0, 1.0]",
                            index
                        ),
                    )));
                }
                Some(_) => {}
            }
        }
        _ => {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Layer {}: Invalid layer type '{}'. Must be one of: base, output, recurrent_context, som, echo_reservoir",
                    index, layer.layer_type
                ),
            )));
        }
    }

    parse_activation(layer).map(|_| ())
}

/// Resolves the activation named by a layer configuration.
fn parse_activation(layer: &LayerConfig) -> Result<Activation, Box<dyn Error>> {
    let name = layer.activation.as_deref().unwrap_or("linear");
    match name.to_lowercase().as_str() {
        "linear" => Ok(Activation::Linear),
        "step" => Ok(Activation::Step {
            threshold: layer.threshold.unwrap_or(0.0),
        }),
        "tanh" => Ok(Activation::Tanh),
        "elliott" => Ok(Activation::Elliott {
            scale: layer.scale.unwrap_or(1.0),
        }),
        "gaussian" => Ok(Activation::Gaussian {
            steepness: layer.steepness.unwrap_or(1.0),
        }),
        other => Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Invalid activation '{}'. Must be one of: linear, step, tanh, elliott, gaussian",
                other
            ),
        ))),
    }
}

/// Builds a network from a topology configuration.
///
/// Creates every layer with its nodes, chains each layer into the next,
/// wires the node-level connections, and randomises the initial weights
/// using the provided RNG. Connections into each layer are built before the
/// connections of the layers feeding it, so populating never orphans an
/// already-built link.
///
/// Echo-reservoir layers keep their random internal wiring: their outgoing
/// connections are added without the purge a populate would perform.
///
/// # Arguments
///
/// * `config` - Topology configuration defining the layer sequence
/// * `rng` - Random number generator for reservoir wiring and weight values
///
/// # Returns
///
/// `Ok(Network)` ready for forward/reverse passes, or an error when the
/// configuration is invalid.
pub fn build_network(
    config: &NetworkConfig,
    rng: &mut SimpleRng,
) -> Result<Network, Box<dyn Error>> {
    validate_topology(config)?;

    let mut net = Network::new();
    if let Some(learning_rate) = config.learning_rate {
        net.set_learning_rate(learning_rate);
    }
    if let Some(momentum) = config.momentum {
        net.set_momentum(momentum);
    }

    let mut handles = Vec::with_capacity(config.layers.len());
    for (index, layer) in config.layers.iter().enumerate() {
        let activation = parse_activation(layer)?;
        let layer_type = layer.layer_type.to_lowercase();
        match layer_type.as_str() {
            "base" => {
                let id = net.add_layer(LayerKind::Base);
                for _ in 0..layer.nodes.unwrap_or(0) {
                    net.add_node(id, NodeKind::Base, activation);
                }
                if let Some(constant) = layer.bias {
                    net.add_node(id, NodeKind::Bias { constant }, activation);
                }
                handles.push(id);
            }
            "output" => {
                let id = net.add_layer(LayerKind::Base);
                for _ in 0..layer.nodes.unwrap_or(0) {
                    net.add_node(id, NodeKind::Output { target: 0.0 }, activation);
                }
                handles.push(id);
            }
            "recurrent_context" => {
                let id = net.add_layer(LayerKind::RecurrentContext {
                    sources: Vec::new(),
                    levels: 0,
                });
                let source_layer = handles[layer.context_of.unwrap_or(0)];
                let sources = net.layer(source_layer).nodes().to_vec();
                for source in sources {
                    net.register_context_source(id, source);
                }
                net.build_context_bank(id, layer.levels.unwrap_or(0));
                handles.push(id);
            }
            "som" => {
                let id = net.add_layer(LayerKind::Som {
                    side: 0,
                    max_distance: layer.max_distance.unwrap_or(1.0),
                    min_distance: layer.min_distance.unwrap_or(0.0),
                    suppression: layer.suppression.unwrap_or(1.0),
                });
                net.build_som_grid(id, layer.nodes.unwrap_or(0), activation);
                handles.push(id);
            }
            "echo_reservoir" => {
                let id = net.add_layer(LayerKind::EchoReservoir);
                net.build_reservoir(
                    id,
                    layer.nodes.unwrap_or(0),
                    layer.connectivity.unwrap_or(0.0),
                    activation,
                    rng,
                );
                handles.push(id);
            }
            _ => {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Layer {}: Invalid layer type '{}'", index, layer.layer_type),
                )));
            }
        }
    }

    for i in 0..handles.len().saturating_sub(1) {
        net.connect_forward_layer(handles[i], handles[i + 1]);
    }

    for i in (0..handles.len()).rev() {
        if config.layers[i].layer_type.to_lowercase() == "echo_reservoir" {
            let members = net.layer(handles[i]).nodes().to_vec();
            let forward = net.layer(handles[i]).forward_layers().to_vec();
            for &n in &members {
                for &fl in &forward {
                    let targets = net.layer(fl).nodes().to_vec();
                    for t in targets {
                        net.connect_nodes(n, t, Direction::Forward, 0.0);
                    }
                }
            }
        } else {
            net.populate_node_connections(handles[i]);
        }
    }

    let variance = config.weight_variance.unwrap_or(1.0);
    net.randomise_weights(rng, variance, config.positive_weights.unwrap_or(false));

    Ok(net)
}
