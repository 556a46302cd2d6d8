//! Scalar computation nodes.
//!
//! A [`Node`] holds its current value and error, its activation, and the
//! connection bookkeeping: live forward/reverse weight-handle lists plus
//! baked snapshot copies behind a validity flag. Passes iterate only the
//! baked snapshots, so any connection mutation on either endpoint must
//! invalidate the cache before the next traversal reads it.
//!
//! The per-kind value and error rules need access to neighbouring nodes and
//! weights, so they live on [`crate::network::Network`]; this module keeps
//! the node-local state those rules read and write.

use crate::activation::Activation;
use crate::weight::WeightId;

/// Handle into the network's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Direction of a requested connection relative to the initiating node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Initiator feeds the other node.
    Forward,
    /// The other node feeds the initiator.
    Reverse,
}

/// Behavioural variant of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Plain hidden/input node.
    Base,
    /// Emits a fixed constant and accepts no incoming connections.
    Bias { constant: f64 },
    /// Backprop root; error is `target - value`.
    Output { target: f64 },
    /// Exponentially-smoothed copy of one source node, updated manually.
    RecurrentContext { source: NodeId, rate: f64 },
    /// Competitive map unit; error is a match distance, not a gradient.
    Som,
}

/// A single scalar computation node.
#[derive(Debug, Clone)]
pub struct Node {
    value: f64,
    error: f64,
    activation: Activation,
    kind: NodeKind,
    forward: Vec<WeightId>,
    reverse: Vec<WeightId>,
    forward_baked: Vec<WeightId>,
    reverse_baked: Vec<WeightId>,
    snapshot_valid: bool,
}

impl Node {
    /// Create a node with zero value and error.
    pub fn new(kind: NodeKind, activation: Activation) -> Self {
        Self {
            value: 0.0,
            error: 0.0,
            activation,
            kind,
            forward: Vec::new(),
            reverse: Vec::new(),
            forward_baked: Vec::new(),
            reverse_baked: Vec::new(),
            snapshot_valid: false,
        }
    }

    /// Raw stored value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Overwrite the stored value (used to clamp inputs).
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Value presented to connected nodes. A bias emits its constant
    /// regardless of the stored value.
    pub fn signal(&self) -> f64 {
        match self.kind {
            NodeKind::Bias { constant } => constant,
            _ => self.value,
        }
    }

    /// Current error term. A bias never carries error.
    pub fn error(&self) -> f64 {
        match self.kind {
            NodeKind::Bias { .. } => 0.0,
            _ => self.error,
        }
    }

    pub(crate) fn set_error(&mut self, error: f64) {
        self.error = error;
    }

    /// Behavioural variant of this node.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Activation applied by the value pass.
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Set the constant a bias node emits. Ignored for other kinds.
    pub fn set_bias_constant(&mut self, constant: f64) {
        if let NodeKind::Bias { constant: ref mut c } = self.kind {
            *c = constant;
        }
    }

    /// Set the training target of an output node. Ignored for other kinds.
    pub fn set_target_value(&mut self, target: f64) {
        if let NodeKind::Output { target: ref mut t } = self.kind {
            *t = target;
        }
    }

    pub(crate) fn push_forward(&mut self, id: WeightId) {
        self.forward.push(id);
        self.snapshot_valid = false;
    }

    pub(crate) fn push_reverse(&mut self, id: WeightId) {
        self.reverse.push(id);
        self.snapshot_valid = false;
    }

    pub(crate) fn remove_forward(&mut self, id: WeightId) {
        self.forward.retain(|&w| w != id);
        self.snapshot_valid = false;
    }

    pub(crate) fn remove_reverse(&mut self, id: WeightId) {
        self.reverse.retain(|&w| w != id);
        self.snapshot_valid = false;
    }

    pub(crate) fn take_links(&mut self) -> (Vec<WeightId>, Vec<WeightId>) {
        self.snapshot_valid = false;
        self.forward_baked.clear();
        self.reverse_baked.clear();
        (
            std::mem::take(&mut self.forward),
            std::mem::take(&mut self.reverse),
        )
    }

    /// Rebuild the baked snapshots if a mutation invalidated them.
    pub(crate) fn refresh_snapshot(&mut self) {
        if !self.snapshot_valid {
            self.forward_baked = self.forward.clone();
            self.reverse_baked = self.reverse.clone();
            self.snapshot_valid = true;
        }
    }

    /// Baked forward-weight handles. Call [`Self::refresh_snapshot`] first.
    pub(crate) fn forward_baked(&self) -> &[WeightId] {
        &self.forward_baked
    }

    /// Baked reverse-weight handles. Call [`Self::refresh_snapshot`] first.
    pub(crate) fn reverse_baked(&self) -> &[WeightId] {
        &self.reverse_baked
    }

    pub(crate) fn forward_len(&self) -> usize {
        self.forward.len()
    }

    #[cfg(test)]
    pub(crate) fn snapshot_valid(&self) -> bool {
        self.snapshot_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn base_node() -> Node {
        Node::new(NodeKind::Base, Activation::Linear)
    }

    #[test]
    fn test_new_node_is_zeroed() {
        let n = base_node();
        assert_relative_eq!(n.value(), 0.0);
        assert_relative_eq!(n.error(), 0.0);
        assert!(!n.snapshot_valid());
    }

    #[test]
    fn test_bias_signal_ignores_value() {
        let mut n = Node::new(NodeKind::Bias { constant: 1.0 }, Activation::Linear);
        n.set_value(42.0);
        assert_relative_eq!(n.signal(), 1.0);

        n.set_bias_constant(-0.5);
        assert_relative_eq!(n.signal(), -0.5);
    }

    #[test]
    fn test_bias_error_always_zero() {
        let mut n = Node::new(NodeKind::Bias { constant: 1.0 }, Activation::Linear);
        n.set_error(3.0);
        assert_relative_eq!(n.error(), 0.0);
    }

    #[test]
    fn test_target_setter_only_touches_output() {
        let mut out = Node::new(NodeKind::Output { target: 0.0 }, Activation::Tanh);
        out.set_target_value(0.9);
        assert_eq!(out.kind(), NodeKind::Output { target: 0.9 });

        let mut plain = base_node();
        plain.set_target_value(0.9);
        assert_eq!(plain.kind(), NodeKind::Base);
    }

    #[test]
    fn test_snapshot_rebuilds_after_mutation() {
        let mut n = base_node();
        n.push_forward(WeightId(0));
        n.refresh_snapshot();
        assert_eq!(n.forward_baked(), &[WeightId(0)]);

        n.push_forward(WeightId(1));
        assert!(!n.snapshot_valid());
        // Stale copy until the next refresh.
        assert_eq!(n.forward_baked(), &[WeightId(0)]);

        n.refresh_snapshot();
        assert_eq!(n.forward_baked(), &[WeightId(0), WeightId(1)]);
    }

    #[test]
    fn test_removal_invalidates_snapshot() {
        let mut n = base_node();
        n.push_reverse(WeightId(3));
        n.push_reverse(WeightId(4));
        n.refresh_snapshot();

        n.remove_reverse(WeightId(3));
        assert!(!n.snapshot_valid());
        n.refresh_snapshot();
        assert_eq!(n.reverse_baked(), &[WeightId(4)]);
    }

    #[test]
    fn test_take_links_clears_everything() {
        let mut n = base_node();
        n.push_forward(WeightId(0));
        n.push_reverse(WeightId(1));
        n.refresh_snapshot();

        let (fwd, rev) = n.take_links();
        assert_eq!(fwd, vec![WeightId(0)]);
        assert_eq!(rev, vec![WeightId(1)]);

        n.refresh_snapshot();
        assert!(n.forward_baked().is_empty());
        assert!(n.reverse_baked().is_empty());
    }
}
