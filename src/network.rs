//! The network graph arena and its propagation passes.
//!
//! [`Network`] owns every layer, node and weight, handing out `Copy` handles
//! instead of shared references. All per-kind value/error rules live here as
//! exhaustive matches over [`NodeKind`] and [`LayerKind`], so the dispatch
//! for a pass is visible in one place.
//!
//! The engine is single-threaded and synchronous. Passes are plain recursive
//! traversals driven from the detected bottom (forward) or top (reverse)
//! layer sets; traversal order is insertion order throughout, which keeps
//! accumulation order reproducible.

use crate::activation::{Activation, ActivationError};
use crate::layer::{Layer, LayerId, LayerKind};
use crate::node::{Direction, Node, NodeId, NodeKind};
use crate::utils::rng::SimpleRng;
use crate::weight::{Weight, WeightId};

/// A mutable directed graph of weighted connections between scalar nodes.
///
/// Node and layer handles stay valid for the lifetime of the network.
/// Removing a layer detaches its nodes and frees their weight slots; the
/// node storage itself is retained so no handle ever dangles. Freed weight
/// slots are reused through a free list.
pub struct Network {
    layers: Vec<Layer>,
    members: Vec<LayerId>,
    nodes: Vec<Node>,
    weights: Vec<Option<Weight>>,
    free_weights: Vec<usize>,
    top_layers: Vec<LayerId>,
    bottom_layers: Vec<LayerId>,
    next_sequence: usize,
    learning_rate: f64,
    momentum: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Create an empty network with learning rate 0.1 and no momentum.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            members: Vec::new(),
            nodes: Vec::new(),
            weights: Vec::new(),
            free_weights: Vec::new(),
            top_layers: Vec::new(),
            bottom_layers: Vec::new(),
            next_sequence: 0,
            learning_rate: 0.1,
            momentum: 0.0,
        }
    }

    /// Current learning rate used by the reverse pass.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Set the learning rate used by the reverse pass.
    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    /// Current momentum factor used by weight commits.
    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    /// Set the momentum factor used by weight commits.
    pub fn set_momentum(&mut self, momentum: f64) {
        self.momentum = momentum;
    }

    // ---- structure -------------------------------------------------------

    /// Add a fresh layer and return its handle.
    pub fn add_layer(&mut self, kind: LayerKind) -> LayerId {
        let id = LayerId(self.layers.len());
        self.layers.push(Layer::new(kind));
        self.members.push(id);
        self.structure_update();
        id
    }

    /// Remove a layer: destroy its nodes' connections, unlink it from every
    /// neighbour, and drop it from the membership list. Silently does
    /// nothing when the layer is not a member.
    pub fn remove_layer(&mut self, id: LayerId) {
        if !self.members.contains(&id) {
            return;
        }
        let node_list = self.layers[id.index()].nodes().to_vec();
        for n in node_list {
            self.destroy_all_connections(n);
        }
        let mut neighbours = self.layers[id.index()].forward_layers().to_vec();
        neighbours.extend_from_slice(self.layers[id.index()].reverse_layers());
        for other in neighbours {
            self.layers[other.index()].unlink(id);
            self.layers[id.index()].unlink(other);
        }
        self.layers[id.index()].set_nodes(Vec::new());
        self.members.retain(|&l| l != id);
        self.structure_update();
    }

    /// Layer handles in insertion order.
    pub fn current_layers(&self) -> &[LayerId] {
        &self.members
    }

    /// Read access to a layer.
    pub fn layer(&self, id: LayerId) -> &Layer {
        &self.layers[id.index()]
    }

    /// Layers with no forward connections; roots of the reverse pass.
    pub fn detected_top_layers(&self) -> &[LayerId] {
        &self.top_layers
    }

    /// Layers with no reverse connections; roots of the forward pass.
    pub fn detected_bottom_layers(&self) -> &[LayerId] {
        &self.bottom_layers
    }

    /// Link `from` as a feeder of `to`.
    pub fn connect_forward_layer(&mut self, from: LayerId, to: LayerId) {
        self.layers[from.index()].link_forward(to);
        self.layers[to.index()].link_reverse(from);
        self.structure_update();
    }

    /// Link `from` as being fed by `to`.
    pub fn connect_reverse_layer(&mut self, from: LayerId, to: LayerId) {
        self.layers[from.index()].link_reverse(to);
        self.layers[to.index()].link_forward(from);
        self.structure_update();
    }

    fn structure_update(&mut self) {
        self.top_layers.clear();
        self.bottom_layers.clear();
        let members = self.members.clone();
        for l in members {
            if self.layers[l.index()].sequence().is_none() {
                let seq = self.next_sequence;
                self.next_sequence += 1;
                self.layers[l.index()].assign_sequence(seq);
            }
            if self.layers[l.index()].forward_layers().is_empty() {
                self.top_layers.push(l);
            }
            if self.layers[l.index()].reverse_layers().is_empty() {
                self.bottom_layers.push(l);
            }
        }
    }

    // ---- nodes and connections -------------------------------------------

    /// Create a node inside `layer` and return its handle.
    pub fn add_node(&mut self, layer: LayerId, kind: NodeKind, activation: Activation) -> NodeId {
        let id = self.alloc_node(Node::new(kind, activation));
        self.layers[layer.index()].push_node(id);
        id
    }

    /// Connect two nodes. `Forward` makes `a` feed `b`; `Reverse` makes `b`
    /// feed `a`. A request whose would-be target is a bias node is silently
    /// ignored, since a bias has no inputs.
    pub fn connect_nodes(
        &mut self,
        a: NodeId,
        b: NodeId,
        direction: Direction,
        initial_weight: f64,
    ) {
        let (source, target) = match direction {
            Direction::Forward => (a, b),
            Direction::Reverse => (b, a),
        };
        if matches!(self.nodes[target.index()].kind(), NodeKind::Bias { .. }) {
            return;
        }
        let wid = self.alloc_weight(Weight::new(source, target, initial_weight));
        self.nodes[source.index()].push_forward(wid);
        self.nodes[target.index()].push_reverse(wid);
    }

    /// Drop every connection touching `node`, freeing the weight slots and
    /// removing the links from each neighbour's opposite list.
    pub fn destroy_all_connections(&mut self, node: NodeId) {
        let (fwd, rev) = self.nodes[node.index()].take_links();
        for wid in fwd {
            if let Some(w) = self.weights[wid.index()].take() {
                self.free_weights.push(wid.index());
                let other = w.target();
                if other != node {
                    self.nodes[other.index()].remove_reverse(wid);
                }
            }
        }
        for wid in rev {
            // A self-loop weight was already freed by the forward sweep.
            if let Some(w) = self.weights[wid.index()].take() {
                self.free_weights.push(wid.index());
                let other = w.source();
                if other != node {
                    self.nodes[other.index()].remove_forward(wid);
                }
            }
        }
    }

    /// Value presented by `node` (a bias reports its constant).
    pub fn value(&self, node: NodeId) -> f64 {
        self.nodes[node.index()].signal()
    }

    /// Overwrite the stored value of `node` (used to clamp inputs).
    pub fn set_value(&mut self, node: NodeId, value: f64) {
        self.nodes[node.index()].set_value(value);
    }

    /// Current error term of `node`.
    pub fn error(&self, node: NodeId) -> f64 {
        self.nodes[node.index()].error()
    }

    /// Set the training target of an output node. Ignored otherwise.
    pub fn set_target_value(&mut self, node: NodeId, target: f64) {
        self.nodes[node.index()].set_target_value(target);
    }

    /// Set the constant emitted by a bias node. Ignored otherwise.
    pub fn set_bias_constant(&mut self, node: NodeId, constant: f64) {
        self.nodes[node.index()].set_bias_constant(constant);
    }

    /// Behavioural variant of `node`.
    pub fn node_kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node.index()].kind()
    }

    /// Snapshot of the outgoing connections of `node`.
    pub fn forward_weights(&mut self, node: NodeId) -> Vec<WeightId> {
        self.nodes[node.index()].refresh_snapshot();
        self.nodes[node.index()].forward_baked().to_vec()
    }

    /// Snapshot of the incoming connections of `node`.
    pub fn reverse_weights(&mut self, node: NodeId) -> Vec<WeightId> {
        self.nodes[node.index()].refresh_snapshot();
        self.nodes[node.index()].reverse_baked().to_vec()
    }

    /// Inspect a weight; `None` when the slot has been freed.
    pub fn weight(&self, id: WeightId) -> Option<&Weight> {
        self.weights.get(id.index()).and_then(|w| w.as_ref())
    }

    /// Number of forward weights across every node of every member layer.
    pub fn weight_count(&self) -> usize {
        self.members
            .iter()
            .flat_map(|l| self.layers[l.index()].nodes())
            .map(|n| self.nodes[n.index()].forward_len())
            .sum()
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn alloc_weight(&mut self, weight: Weight) -> WeightId {
        match self.free_weights.pop() {
            Some(slot) => {
                self.weights[slot] = Some(weight);
                WeightId(slot)
            }
            None => {
                self.weights.push(Some(weight));
                WeightId(self.weights.len() - 1)
            }
        }
    }

    fn weight_at(&self, id: WeightId) -> &Weight {
        self.weights[id.index()]
            .as_ref()
            .expect("weight handle points at a freed slot")
    }

    fn weight_at_mut(&mut self, id: WeightId) -> &mut Weight {
        self.weights[id.index()]
            .as_mut()
            .expect("weight handle points at a freed slot")
    }

    // ---- connection builders ---------------------------------------------

    /// Rebuild node connections for every member layer.
    ///
    /// Layers are populated in reverse insertion order: populating purges a
    /// layer's existing connections in both directions, so target layers
    /// must be rebuilt before the layers feeding them.
    pub fn build_node_connections(&mut self) {
        let order: Vec<LayerId> = self.members.iter().rev().copied().collect();
        for l in order {
            self.populate_node_connections(l);
        }
    }

    /// Purge every connection of the layer's nodes, then fully connect each
    /// of them to every node of every forward-connected layer with an
    /// initial weight of zero.
    pub fn populate_node_connections(&mut self, layer: LayerId) {
        let members = self.layers[layer.index()].nodes().to_vec();
        for &n in &members {
            self.destroy_all_connections(n);
        }
        let forward = self.layers[layer.index()].forward_layers().to_vec();
        for &n in &members {
            for &fl in &forward {
                let targets = self.layers[fl.index()].nodes().to_vec();
                for t in targets {
                    self.connect_nodes(n, t, Direction::Forward, 0.0);
                }
            }
        }
    }

    /// Register `node` as an input the context layer should shadow.
    pub fn register_context_source(&mut self, layer: LayerId, node: NodeId) {
        if let LayerKind::RecurrentContext { sources, .. } = self.layers[layer.index()].kind_mut()
        {
            if !sources.contains(&node) {
                sources.push(node);
            }
        }
    }

    /// Create `levels` smoothed copies of every registered source node.
    ///
    /// Level `i` of `L` gets smoothing rate `(1/L) * i`, so level 0 is a
    /// frozen store and higher levels track their source ever faster.
    pub fn build_context_bank(&mut self, layer: LayerId, levels: usize) {
        if levels == 0 {
            return;
        }
        let sources = match self.layers[layer.index()].kind() {
            LayerKind::RecurrentContext { sources, .. } => sources.clone(),
            _ => return,
        };
        if let LayerKind::RecurrentContext { levels: stored, .. } =
            self.layers[layer.index()].kind_mut()
        {
            *stored = levels;
        }
        for src in sources {
            for level in 0..levels {
                let rate = (1.0 / levels as f64) * level as f64;
                let kind = NodeKind::RecurrentContext { source: src, rate };
                let id = self.alloc_node(Node::new(kind, Activation::Linear));
                self.layers[layer.index()].push_node(id);
            }
        }
    }

    /// Advance every context node of `layer` one smoothing step.
    ///
    /// Must be invoked by the caller once per timestep; the forward pass
    /// never drives it.
    pub fn update_context(&mut self, layer: LayerId) {
        let members = self.layers[layer.index()].nodes().to_vec();
        for n in members {
            if let NodeKind::RecurrentContext { source, rate } = self.nodes[n.index()].kind() {
                let src = self.nodes[source.index()].signal();
                let v = self.nodes[n.index()].value();
                self.nodes[n.index()].set_value(v * (1.0 - rate) + src * rate);
            }
        }
    }

    /// Fill a SOM layer with a square grid of `node_count` map units.
    pub fn build_som_grid(&mut self, layer: LayerId, node_count: usize, activation: Activation) {
        let grid_side = (node_count as f64).sqrt() as usize;
        match self.layers[layer.index()].kind_mut() {
            LayerKind::Som { side, .. } => *side = grid_side,
            _ => return,
        }
        for _ in 0..node_count {
            let id = self.alloc_node(Node::new(NodeKind::Som, activation));
            self.layers[layer.index()].push_node(id);
        }
    }

    /// Set the neighbourhood suppression of a SOM layer. Drive this from 1
    /// toward 0 over training to anneal the updated neighbourhood.
    pub fn set_som_suppression(&mut self, layer: LayerId, value: f64) {
        if let LayerKind::Som { suppression, .. } = self.layers[layer.index()].kind_mut() {
            *suppression = value;
        }
    }

    /// Set the learning-distance band of a SOM layer.
    pub fn set_som_distances(&mut self, layer: LayerId, max: f64, min: f64) {
        if let LayerKind::Som {
            max_distance,
            min_distance,
            ..
        } = self.layers[layer.index()].kind_mut()
        {
            *max_distance = max;
            *min_distance = min;
        }
    }

    /// Fill a reservoir layer with `n` nodes and sparse random internal
    /// wiring: every ordered node pair, self-loops included, receives a
    /// forward connection with probability `connectivity`.
    pub fn build_reservoir(
        &mut self,
        layer: LayerId,
        n: usize,
        connectivity: f64,
        activation: Activation,
        rng: &mut SimpleRng,
    ) {
        let mut created = Vec::with_capacity(n);
        for _ in 0..n {
            let id = self.alloc_node(Node::new(NodeKind::Base, activation));
            self.layers[layer.index()].push_node(id);
            created.push(id);
        }
        for &a in &created {
            for &b in &created {
                if rng.gen_bool(connectivity) {
                    self.connect_nodes(a, b, Direction::Forward, 0.0);
                }
            }
        }
    }

    /// Overwrite every forward weight with a fresh random value scaled by
    /// `variance`; samples come from U(0,1) when `positive_only`, U(-1,1)
    /// otherwise.
    pub fn randomise_weights(&mut self, rng: &mut SimpleRng, variance: f64, positive_only: bool) {
        let member_layers = self.members.clone();
        for l in member_layers {
            let nodes = self.layers[l.index()].nodes().to_vec();
            for n in nodes {
                self.nodes[n.index()].refresh_snapshot();
                let fwd = self.nodes[n.index()].forward_baked().to_vec();
                for wid in fwd {
                    let sample = if positive_only {
                        rng.next_f64()
                    } else {
                        rng.gen_range_f64(-1.0, 1.0)
                    };
                    self.weight_at_mut(wid).set_weight(variance * sample);
                }
            }
        }
    }

    // ---- passes ----------------------------------------------------------

    /// Propagate values from the bottom layers upward.
    pub fn forward_pass(&mut self) -> Result<(), ActivationError> {
        let bottoms = self.bottom_layers.clone();
        for l in bottoms {
            self.layer_forward(l)?;
        }
        Ok(())
    }

    fn layer_forward(&mut self, id: LayerId) -> Result<(), ActivationError> {
        let nodes = self.layers[id.index()].nodes().to_vec();
        for n in nodes {
            self.calculate_value(n)?;
        }
        let next = self.layers[id.index()].forward_layers().to_vec();
        for l in next {
            self.layer_forward(l)?;
        }
        Ok(())
    }

    /// Propagate errors from the top layers downward and train the weights.
    ///
    /// With `delay_weight_update` the gradient contributions only accumulate
    /// as pending changes; a later pass without the flag commits them.
    pub fn reverse_pass(&mut self, delay_weight_update: bool) {
        let tops = self.top_layers.clone();
        let (lr, momentum) = (self.learning_rate, self.momentum);
        for l in tops {
            self.layer_reverse(l, lr, momentum, true, delay_weight_update);
        }
    }

    fn layer_reverse(&mut self, id: LayerId, lr: f64, momentum: f64, recurse: bool, delay: bool) {
        let kind = self.layers[id.index()].kind().clone();
        match kind {
            LayerKind::Som { .. } => self.som_reverse(id, lr, momentum, delay),
            LayerKind::EchoReservoir => self.base_reverse(id, lr, momentum, false, delay),
            LayerKind::Base | LayerKind::RecurrentContext { .. } => {
                self.base_reverse(id, lr, momentum, recurse, delay)
            }
        }
    }

    fn base_reverse(&mut self, id: LayerId, lr: f64, momentum: f64, recurse: bool, delay: bool) {
        let nodes = self.layers[id.index()].nodes().to_vec();
        for &n in &nodes {
            self.calculate_error(n);
        }
        for &n in &nodes {
            self.adjust_weights(n, lr);
        }
        if !delay {
            for &n in &nodes {
                self.update_node_weights(n, momentum);
            }
        }
        if recurse {
            let prev = self.layers[id.index()].reverse_layers().to_vec();
            for l in prev {
                self.layer_reverse(l, lr, momentum, recurse, delay);
            }
        }
    }

    fn som_reverse(&mut self, id: LayerId, lr: f64, momentum: f64, delay: bool) {
        let nodes = self.layers[id.index()].nodes().to_vec();
        for &n in &nodes {
            self.calculate_error(n);
        }
        let (side, max_d, min_d, suppression) = match *self.layers[id.index()].kind() {
            LayerKind::Som {
                side,
                max_distance,
                min_distance,
                suppression,
            } => (side, max_distance, min_distance, suppression),
            _ => return,
        };
        if side == 0 || nodes.is_empty() {
            self.base_reverse(id, lr, momentum, false, delay);
            return;
        }

        // Best matching unit: minimum match distance, first hit wins in the
        // row-major scan.
        let mut best = 0usize;
        let mut best_err = f64::INFINITY;
        for (i, &n) in nodes.iter().enumerate() {
            let e = self.nodes[n.index()].error();
            if e < best_err {
                best_err = e;
                best = i;
            }
        }
        let (bx, by) = ((best % side) as i64, (best / side) as i64);
        let radius = max_d.ceil() as i64;
        let threshold = (max_d - min_d) * suppression + min_d;

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let x = bx + dx;
                let y = by + dy;
                if x < 0 || y < 0 || x >= side as i64 || y >= side as i64 {
                    continue;
                }
                let idx = (y as usize) * side + (x as usize);
                if idx >= nodes.len() {
                    continue;
                }
                let dist = ((dx * dx + dy * dy) as f64).sqrt() + 1.0;
                if dist > threshold {
                    continue;
                }
                let n = nodes[idx];
                self.nodes[n.index()].refresh_snapshot();
                let rev = self.nodes[n.index()].reverse_baked().to_vec();
                for wid in rev {
                    let (src, wv) = {
                        let w = self.weight_at(wid);
                        (w.source(), w.value())
                    };
                    let delta = (self.nodes[src.index()].signal() - wv) * lr / dist;
                    self.weight_at_mut(wid).add_pending_change(delta);
                }
            }
        }
        self.base_reverse(id, lr, momentum, false, delay);
    }

    fn calculate_value(&mut self, id: NodeId) -> Result<(), ActivationError> {
        // Context nodes move only in their explicit smoothing step.
        if matches!(
            self.nodes[id.index()].kind(),
            NodeKind::RecurrentContext { .. }
        ) {
            return Ok(());
        }
        self.nodes[id.index()].refresh_snapshot();
        let reverse = self.nodes[id.index()].reverse_baked().to_vec();
        // A node with no inputs is a source; its clamped value stands.
        if reverse.is_empty() {
            return Ok(());
        }
        let mut sum = 0.0;
        for wid in reverse {
            let w = self.weight_at(wid);
            sum += w.value() * self.nodes[w.source().index()].signal();
        }
        let value = self.nodes[id.index()].activation().compute(sum)?;
        self.nodes[id.index()].set_value(value);
        Ok(())
    }

    fn calculate_error(&mut self, id: NodeId) {
        match self.nodes[id.index()].kind() {
            NodeKind::Output { target } => {
                let v = self.nodes[id.index()].value();
                self.nodes[id.index()].set_error(target - v);
            }
            NodeKind::Bias { .. } => {
                self.nodes[id.index()].set_error(0.0);
            }
            NodeKind::Som => {
                self.nodes[id.index()].refresh_snapshot();
                let rev = self.nodes[id.index()].reverse_baked().to_vec();
                let mut sum = 0.0;
                for wid in rev {
                    let (src, wv) = {
                        let w = self.weight_at(wid);
                        (w.source(), w.value())
                    };
                    let d = wv - self.nodes[src.index()].signal();
                    sum += d * d;
                }
                self.nodes[id.index()].set_error(sum);
            }
            NodeKind::Base | NodeKind::RecurrentContext { .. } => {
                self.nodes[id.index()].refresh_snapshot();
                let fwd = self.nodes[id.index()].forward_baked().to_vec();
                let mut sum = 0.0;
                for &wid in &fwd {
                    let (target, wv) = {
                        let w = self.weight_at(wid);
                        (w.target(), w.value())
                    };
                    sum += wv * self.nodes[target.index()].error();
                }
                let mean = sum / fwd.len() as f64;
                let v = self.nodes[id.index()].value();
                let e = self.nodes[id.index()].activation().derivative(v) * mean;
                self.nodes[id.index()].set_error(e);
            }
        }
    }

    fn adjust_weights(&mut self, id: NodeId, lr: f64) {
        // Map units are not gradient-trained; their weights move in the
        // competitive nudge instead.
        if matches!(self.nodes[id.index()].kind(), NodeKind::Som) {
            return;
        }
        self.nodes[id.index()].refresh_snapshot();
        let fwd = self.nodes[id.index()].forward_baked().to_vec();
        let value = self.nodes[id.index()].signal();
        for wid in fwd {
            let target_error = {
                let w = self.weight_at(wid);
                self.nodes[w.target().index()].error()
            };
            self.weight_at_mut(wid)
                .add_pending_change(value * target_error * lr);
        }
    }

    fn update_node_weights(&mut self, id: NodeId, momentum: f64) {
        self.nodes[id.index()].refresh_snapshot();
        // A map unit owns its incoming weight vector; everything else
        // commits its outgoing weights.
        let list = match self.nodes[id.index()].kind() {
            NodeKind::Som => self.nodes[id.index()].reverse_baked().to_vec(),
            _ => self.nodes[id.index()].forward_baked().to_vec(),
        };
        for wid in list {
            self.weight_at_mut(wid).update(momentum);
        }
    }
}
