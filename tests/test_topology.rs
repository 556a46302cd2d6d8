// Tests for graph structure: connection symmetry, cache coherence,
// populate rebuilds, and top/bottom set maintenance.

use approx::assert_relative_eq;
use neural_graph::{Activation, Direction, LayerId, LayerKind, Network, NodeId, NodeKind};

fn layer_with_nodes(net: &mut Network, count: usize) -> (LayerId, Vec<NodeId>) {
    let layer = net.add_layer(LayerKind::Base);
    let nodes = (0..count)
        .map(|_| net.add_node(layer, NodeKind::Base, Activation::Linear))
        .collect();
    (layer, nodes)
}

#[test]
fn test_connections_are_symmetric() {
    let mut net = Network::new();
    let (l0, a) = layer_with_nodes(&mut net, 1);
    let (l1, b) = layer_with_nodes(&mut net, 1);
    net.connect_forward_layer(l0, l1);

    net.connect_nodes(a[0], b[0], Direction::Forward, 0.5);
    let forward = net.forward_weights(a[0]);
    let reverse = net.reverse_weights(b[0]);
    assert_eq!(forward, reverse);

    let w = net.weight(forward[0]).unwrap();
    assert_eq!(w.source(), a[0]);
    assert_eq!(w.target(), b[0]);

    // A reverse-direction request lands on the same lists.
    net.connect_nodes(b[0], a[0], Direction::Reverse, 0.25);
    assert_eq!(net.forward_weights(a[0]).len(), 2);
    assert_eq!(net.reverse_weights(b[0]).len(), 2);
}

#[test]
fn test_snapshots_track_mutations() {
    let mut net = Network::new();
    let (l0, a) = layer_with_nodes(&mut net, 1);
    let (l1, b) = layer_with_nodes(&mut net, 2);
    net.connect_forward_layer(l0, l1);

    net.connect_nodes(a[0], b[0], Direction::Forward, 0.1);
    assert_eq!(net.forward_weights(a[0]).len(), 1);

    net.connect_nodes(a[0], b[1], Direction::Forward, 0.2);
    assert_eq!(net.forward_weights(a[0]).len(), 2);

    net.destroy_all_connections(a[0]);
    assert!(net.forward_weights(a[0]).is_empty());
    assert!(net.reverse_weights(b[0]).is_empty());
    assert!(net.reverse_weights(b[1]).is_empty());
}

#[test]
fn test_populate_purges_and_fully_connects() {
    let mut net = Network::new();
    let (l0, a) = layer_with_nodes(&mut net, 2);
    let (l1, b) = layer_with_nodes(&mut net, 3);
    net.connect_forward_layer(l0, l1);

    // Stray duplicate links are wiped by the rebuild.
    net.connect_nodes(a[0], b[0], Direction::Forward, 0.9);
    net.connect_nodes(a[0], b[0], Direction::Forward, 0.9);

    net.populate_node_connections(l0);
    assert_eq!(net.weight_count(), 6);
    for &n in &a {
        for wid in net.forward_weights(n) {
            assert_relative_eq!(net.weight(wid).map(|w| w.value()).unwrap_or(1.0), 0.0);
        }
    }
}

#[test]
fn test_add_remove_layer_restores_structure_sets() {
    let mut net = Network::new();
    let (l0, _) = layer_with_nodes(&mut net, 1);
    let (l1, _) = layer_with_nodes(&mut net, 1);
    net.connect_forward_layer(l0, l1);
    let tops_before = net.detected_top_layers().to_vec();
    let bottoms_before = net.detected_bottom_layers().to_vec();

    let extra = net.add_layer(LayerKind::Base);
    assert!(net.detected_top_layers().contains(&extra));
    assert!(net.detected_bottom_layers().contains(&extra));

    net.remove_layer(extra);
    assert_eq!(net.detected_top_layers(), &tops_before[..]);
    assert_eq!(net.detected_bottom_layers(), &bottoms_before[..]);
}

#[test]
fn test_removing_middle_layer_splits_chain() {
    let mut net = Network::new();
    let (l0, a) = layer_with_nodes(&mut net, 1);
    let (l1, b) = layer_with_nodes(&mut net, 1);
    let (l2, c) = layer_with_nodes(&mut net, 1);
    net.connect_forward_layer(l0, l1);
    net.connect_forward_layer(l1, l2);
    net.connect_nodes(a[0], b[0], Direction::Forward, 0.5);
    net.connect_nodes(b[0], c[0], Direction::Forward, 0.5);

    net.remove_layer(l1);
    assert_eq!(net.current_layers(), &[l0, l2]);
    assert_eq!(net.detected_top_layers(), &[l0, l2]);
    assert_eq!(net.detected_bottom_layers(), &[l0, l2]);
    assert_eq!(net.weight_count(), 0);

    // Surviving layers keep their sequence numbers; new ones continue on.
    assert_eq!(net.layer(l2).sequence(), Some(2));
    let fresh = net.add_layer(LayerKind::Base);
    assert_eq!(net.layer(fresh).sequence(), Some(3));
}

#[test]
fn test_weight_count_tracks_destroys() {
    let mut net = Network::new();
    let (l0, a) = layer_with_nodes(&mut net, 1);
    let (l1, b) = layer_with_nodes(&mut net, 2);
    net.connect_forward_layer(l0, l1);

    net.connect_nodes(a[0], b[0], Direction::Forward, 0.1);
    net.connect_nodes(a[0], b[1], Direction::Forward, 0.2);
    net.connect_nodes(b[0], b[1], Direction::Forward, 0.3);
    assert_eq!(net.weight_count(), 3);

    net.destroy_all_connections(a[0]);
    assert_eq!(net.weight_count(), 1);
}
