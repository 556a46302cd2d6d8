//! Weighted connections between nodes.
//!
//! A [`Weight`] joins a source node to a target node and carries the scalar
//! multiplier applied during signal propagation. Gradient updates are not
//! written directly: they accumulate as pending changes and are folded in as
//! a mean when the owning pass commits, so several presentations can be
//! batched before a single update.

use crate::node::NodeId;

/// Handle into the network's weight arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeightId(pub(crate) usize);

impl WeightId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// A directed weighted connection from `source` to `target`.
#[derive(Debug, Clone)]
pub struct Weight {
    value: f64,
    initial_value: f64,
    pending_sum: f64,
    pending_count: usize,
    last_applied_change: f64,
    source: NodeId,
    target: NodeId,
}

impl Weight {
    /// Create a connection with the given endpoints and starting value.
    pub fn new(source: NodeId, target: NodeId, initial_value: f64) -> Self {
        Self {
            value: initial_value,
            initial_value,
            pending_sum: 0.0,
            pending_count: 0,
            last_applied_change: 0.0,
            source,
            target,
        }
    }

    /// Current multiplier applied to the source value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Overwrite the value directly.
    ///
    /// Used by the momentum pre-step and by weight randomisation; pending
    /// changes are left untouched.
    pub fn set_weight(&mut self, value: f64) {
        self.value = value;
    }

    /// Accumulate one gradient delta into the pending pool.
    pub fn add_pending_change(&mut self, delta: f64) {
        self.pending_sum += delta;
        self.pending_count += 1;
    }

    /// Fold the mean of accumulated deltas into the value.
    ///
    /// The mean is zero when nothing is pending. The applied amount is
    /// recorded for the next momentum pre-step and the accumulator is
    /// cleared.
    pub fn apply_pending_changes(&mut self) {
        let mean = if self.pending_count == 0 {
            0.0
        } else {
            self.pending_sum / self.pending_count as f64
        };
        self.value += mean;
        self.last_applied_change = mean;
        self.pending_sum = 0.0;
        self.pending_count = 0;
    }

    /// Momentum pre-step followed by the pending commit.
    ///
    /// The previous applied change, scaled by `momentum`, is added before the
    /// new mean is folded in. Runs for every weight on every committing pass.
    pub fn update(&mut self, momentum: f64) {
        self.set_weight(self.value + self.last_applied_change * momentum);
        self.apply_pending_changes();
    }

    /// Net drift since construction.
    pub fn total_change(&self) -> f64 {
        self.value - self.initial_value
    }

    /// Mean delta folded in by the most recent commit.
    pub fn last_applied_change(&self) -> f64 {
        self.last_applied_change
    }

    /// Node this connection reads from.
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Node this connection feeds into.
    pub fn target(&self) -> NodeId {
        self.target
    }
}
