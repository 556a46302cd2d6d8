//! Layers: ordered node membership and inter-layer wiring.
//!
//! A [`Layer`] owns the ordered list of its node handles plus the forward and
//! reverse links to neighbouring layers. The [`LayerKind`] variant selects
//! which reverse-pass rule the network applies and carries the per-variant
//! parameters (context sources and bank depth, SOM grid geometry and
//! neighbourhood controls).

use crate::node::NodeId;

/// Handle into the network's layer arena. Stable across removals of other
/// layers; slots are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub(crate) usize);

impl LayerId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Behavioural variant of a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// Plain gradient-trained layer.
    Base,
    /// Bank of exponentially-smoothed copies of registered source nodes.
    RecurrentContext { sources: Vec<NodeId>, levels: usize },
    /// Competitive square grid.
    Som {
        side: usize,
        max_distance: f64,
        min_distance: f64,
        suppression: f64,
    },
    /// Sparse random recurrent pool; error never propagates past it.
    EchoReservoir,
}

/// A layer of nodes inside the network graph.
#[derive(Debug, Clone)]
pub struct Layer {
    kind: LayerKind,
    sequence: Option<usize>,
    nodes: Vec<NodeId>,
    forward_layers: Vec<LayerId>,
    reverse_layers: Vec<LayerId>,
}

impl Layer {
    /// Create an empty layer. A sequence number is assigned on the first
    /// structure update after the layer joins a network.
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            sequence: None,
            nodes: Vec::new(),
            forward_layers: Vec::new(),
            reverse_layers: Vec::new(),
        }
    }

    /// Behavioural variant of this layer.
    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut LayerKind {
        &mut self.kind
    }

    /// Sequence number assigned by the network, if any.
    pub fn sequence(&self) -> Option<usize> {
        self.sequence
    }

    pub(crate) fn assign_sequence(&mut self, sequence: usize) {
        if self.sequence.is_none() {
            self.sequence = Some(sequence);
        }
    }

    /// Node handles in insertion order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub(crate) fn push_node(&mut self, id: NodeId) {
        self.nodes.push(id);
    }

    pub(crate) fn set_nodes(&mut self, nodes: Vec<NodeId>) {
        self.nodes = nodes;
    }

    /// Layers this one feeds, in connection order.
    pub fn forward_layers(&self) -> &[LayerId] {
        &self.forward_layers
    }

    /// Layers feeding this one, in connection order.
    pub fn reverse_layers(&self) -> &[LayerId] {
        &self.reverse_layers
    }

    pub(crate) fn link_forward(&mut self, other: LayerId) {
        if !self.forward_layers.contains(&other) {
            self.forward_layers.push(other);
        }
    }

    pub(crate) fn link_reverse(&mut self, other: LayerId) {
        if !self.reverse_layers.contains(&other) {
            self.reverse_layers.push(other);
        }
    }

    pub(crate) fn unlink(&mut self, other: LayerId) {
        self.forward_layers.retain(|&l| l != other);
        self.reverse_layers.retain(|&l| l != other);
    }
}
