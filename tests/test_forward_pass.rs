// Tests for forward propagation: weighted sums, bias feeding, source
// clamping, and bit-identical determinism.

use approx::assert_relative_eq;
use neural_graph::config::{build_network, NetworkConfig};
use neural_graph::{Activation, Direction, LayerKind, Network, NodeId, NodeKind, SimpleRng};

// Two inputs feeding one linear output through hand-set weights.
fn two_input_net() -> (Network, NodeId, NodeId, NodeId) {
    let mut net = Network::new();
    let bottom = net.add_layer(LayerKind::Base);
    let top = net.add_layer(LayerKind::Base);
    net.connect_forward_layer(bottom, top);

    let x1 = net.add_node(bottom, NodeKind::Base, Activation::Linear);
    let x2 = net.add_node(bottom, NodeKind::Base, Activation::Linear);
    let out = net.add_node(top, NodeKind::Output { target: 0.0 }, Activation::Linear);
    net.connect_nodes(x1, out, Direction::Forward, 2.0);
    net.connect_nodes(x2, out, Direction::Forward, 4.0);
    (net, x1, x2, out)
}

#[test]
fn test_weighted_sum() {
    let (mut net, x1, x2, out) = two_input_net();
    net.set_value(x1, 0.25);
    net.set_value(x2, -0.5);
    net.forward_pass().unwrap();
    assert_relative_eq!(net.value(out), 2.0 * 0.25 + 4.0 * (-0.5));
}

#[test]
fn test_source_nodes_left_untouched() {
    let (mut net, x1, x2, _) = two_input_net();
    net.set_value(x1, 0.25);
    net.set_value(x2, -0.5);
    net.forward_pass().unwrap();
    assert_relative_eq!(net.value(x1), 0.25);
    assert_relative_eq!(net.value(x2), -0.5);
}

#[test]
fn test_bias_feeds_constant() {
    let mut net = Network::new();
    let bottom = net.add_layer(LayerKind::Base);
    let top = net.add_layer(LayerKind::Base);
    net.connect_forward_layer(bottom, top);

    let a = net.add_node(bottom, NodeKind::Base, Activation::Linear);
    let bias = net.add_node(bottom, NodeKind::Bias { constant: 0.7 }, Activation::Linear);
    let out = net.add_node(top, NodeKind::Output { target: 0.0 }, Activation::Linear);
    net.connect_nodes(a, out, Direction::Forward, 2.0);
    net.connect_nodes(bias, out, Direction::Forward, 1.0);

    net.set_value(a, 0.5);
    net.forward_pass().unwrap();
    assert_relative_eq!(net.value(out), 2.0 * 0.5 + 0.7);

    // The stored value of a bias never leaks into its signal.
    net.set_value(bias, 9.9);
    net.forward_pass().unwrap();
    assert_relative_eq!(net.value(out), 2.0 * 0.5 + 0.7);
}

#[test]
fn test_tanh_chain() {
    let mut net = Network::new();
    let l0 = net.add_layer(LayerKind::Base);
    let l1 = net.add_layer(LayerKind::Base);
    let l2 = net.add_layer(LayerKind::Base);
    net.connect_forward_layer(l0, l1);
    net.connect_forward_layer(l1, l2);

    let a = net.add_node(l0, NodeKind::Base, Activation::Linear);
    let h = net.add_node(l1, NodeKind::Base, Activation::Tanh);
    let o = net.add_node(l2, NodeKind::Output { target: 0.0 }, Activation::Tanh);
    net.connect_nodes(a, h, Direction::Forward, 0.5);
    net.connect_nodes(h, o, Direction::Forward, 1.5);

    net.set_value(a, 2.0);
    net.forward_pass().unwrap();
    let hidden = (0.5f64 * 2.0).tanh();
    assert_relative_eq!(net.value(h), hidden);
    assert_relative_eq!(net.value(o), (1.5 * hidden).tanh());
}

#[test]
fn test_repeat_passes_are_bit_identical() {
    let cfg: NetworkConfig = serde_json::from_str(
        r#"{
            "layers": [
                { "layer_type": "base", "nodes": 2, "activation": "linear" },
                { "layer_type": "base", "nodes": 3, "activation": "tanh" },
                { "layer_type": "output", "nodes": 1, "activation": "tanh" }
            ]
        }"#,
    )
    .unwrap();

    let mut rng = SimpleRng::new(11);
    let mut net = build_network(&cfg, &mut rng).unwrap();
    let inputs = net.layer(net.detected_bottom_layers()[0]).nodes().to_vec();
    let out = net.layer(net.detected_top_layers()[0]).nodes()[0];

    net.set_value(inputs[0], 0.3);
    net.set_value(inputs[1], -0.8);
    net.forward_pass().unwrap();
    let first = net.value(out);
    net.forward_pass().unwrap();
    assert_eq!(first.to_bits(), net.value(out).to_bits());

    // A rebuild from the same seed reproduces the exact output.
    let mut rng = SimpleRng::new(11);
    let mut rebuilt = build_network(&cfg, &mut rng).unwrap();
    let inputs = rebuilt
        .layer(rebuilt.detected_bottom_layers()[0])
        .nodes()
        .to_vec();
    let out = rebuilt.layer(rebuilt.detected_top_layers()[0]).nodes()[0];
    rebuilt.set_value(inputs[0], 0.3);
    rebuilt.set_value(inputs[1], -0.8);
    rebuilt.forward_pass().unwrap();
    assert_eq!(first.to_bits(), rebuilt.value(out).to_bits());
}
