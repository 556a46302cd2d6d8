use neural_graph::config::{build_network, load_topology};
use neural_graph::{ActivationError, LayerId, Network, NodeId, SimpleRng};
use std::error::Error;

// Self-organizing map that arranges random colors on a 4x4 grid.
const CONFIG_PATH: &str = "config/som_colors.json";
// Training hyperparameters.
const EPOCHS: usize = 500;
const SAMPLES_PER_EPOCH: usize = 20;
const SEED: u64 = 42;

// Squared match distance between a color and a map unit's weight vector.
fn unit_distance(net: &mut Network, unit: NodeId, color: &[f64; 3]) -> f64 {
    let mut sum = 0.0;
    for (i, wid) in net.reverse_weights(unit).into_iter().enumerate() {
        if let Some(w) = net.weight(wid) {
            let d = w.value() - color[i];
            sum += d * d;
        }
    }
    sum
}

// Index of the map unit whose weight vector best matches `color`.
fn best_matching_unit(net: &mut Network, units: &[NodeId], color: &[f64; 3]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &unit) in units.iter().enumerate() {
        let d = unit_distance(net, unit, color);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

// Competitive training on random colors with an annealed neighbourhood.
fn train(
    net: &mut Network,
    som_layer: LayerId,
    inputs: &[NodeId],
    units: &[NodeId],
    rng: &mut SimpleRng,
) -> Result<(), ActivationError> {
    for epoch in 0..EPOCHS {
        // Shrink the updated neighbourhood from the full band to the winner alone.
        net.set_som_suppression(som_layer, 1.0 - epoch as f64 / EPOCHS as f64);

        let mut total_errors = 0.0;
        for _ in 0..SAMPLES_PER_EPOCH {
            let color = [rng.next_f64(), rng.next_f64(), rng.next_f64()];
            for (&node, &channel) in inputs.iter().zip(color.iter()) {
                net.set_value(node, channel);
            }
            net.forward_pass()?;
            net.reverse_pass(false);

            // The smallest post-pass unit error is the winner's match distance.
            let best = units
                .iter()
                .map(|&u| net.error(u))
                .fold(f64::INFINITY, f64::min);
            total_errors += best;
        }

        if (epoch + 1) % 100 == 0 {
            let loss = total_errors / SAMPLES_PER_EPOCH as f64;
            println!("Epoch {}, Error: {:.6}", epoch + 1, loss);
        }
    }
    Ok(())
}

// Dump the learned weight vectors as a grid of RGB triples.
fn print_map(net: &mut Network, units: &[NodeId]) {
    let side = (units.len() as f64).sqrt() as usize;
    println!("\nLearned color map:");
    for y in 0..side {
        let mut row = String::new();
        for x in 0..side {
            let unit = units[y * side + x];
            let mut rgb = [0.0; 3];
            for (i, wid) in net.reverse_weights(unit).into_iter().enumerate().take(3) {
                if let Some(w) = net.weight(wid) {
                    rgb[i] = w.value();
                }
            }
            row.push_str(&format!(" ({:.2} {:.2} {:.2})", rgb[0], rgb[1], rgb[2]));
        }
        println!("{}", row);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut rng = SimpleRng::new(SEED);
    let config = load_topology(CONFIG_PATH)?;
    let mut net = build_network(&config, &mut rng)?;

    let input_layer = net.detected_bottom_layers()[0];
    let som_layer = net.detected_top_layers()[0];
    let inputs = net.layer(input_layer).nodes().to_vec();
    let units = net.layer(som_layer).nodes().to_vec();

    train(&mut net, som_layer, &inputs, &units, &mut rng)?;
    print_map(&mut net, &units);

    let side = (units.len() as f64).sqrt() as usize;
    println!("\nReference colors:");
    for (name, color) in [
        ("red", [1.0, 0.0, 0.0]),
        ("green", [0.0, 1.0, 0.0]),
        ("blue", [0.0, 0.0, 1.0]),
        ("white", [1.0, 1.0, 1.0]),
    ] {
        let bmu = best_matching_unit(&mut net, &units, &color);
        println!("{} settles at cell ({}, {})", name, bmu % side, bmu / side);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use neural_graph::{Activation, Direction, LayerKind, NodeKind};

    fn color_net() -> (Network, Vec<NodeId>, LayerId, Vec<NodeId>) {
        let mut net = Network::new();
        let bottom = net.add_layer(LayerKind::Base);
        let som = net.add_layer(LayerKind::Som {
            side: 0,
            max_distance: 1.0,
            min_distance: 0.0,
            suppression: 1.0,
        });
        net.connect_forward_layer(bottom, som);
        let inputs: Vec<NodeId> = (0..3)
            .map(|_| net.add_node(bottom, NodeKind::Base, Activation::Linear))
            .collect();
        net.build_som_grid(som, 4, Activation::Linear);
        let units = net.layer(som).nodes().to_vec();
        (net, inputs, som, units)
    }

    #[test]
    fn test_unit_distance_by_hand() {
        let mut net = Network::new();
        let bottom = net.add_layer(LayerKind::Base);
        let som = net.add_layer(LayerKind::Som {
            side: 1,
            max_distance: 1.0,
            min_distance: 0.0,
            suppression: 1.0,
        });
        net.connect_forward_layer(bottom, som);
        let unit = net.add_node(som, NodeKind::Som, Activation::Linear);
        for value in [0.5, 0.25, 1.0] {
            let src = net.add_node(bottom, NodeKind::Base, Activation::Linear);
            net.connect_nodes(src, unit, Direction::Forward, value);
        }

        let d = unit_distance(&mut net, unit, &[1.0, 0.25, 0.0]);
        assert_relative_eq!(d, 0.25 + 0.0 + 1.0);
    }

    #[test]
    fn test_best_matching_unit_picks_closest() {
        let (mut net, inputs, _, units) = color_net();
        net.build_node_connections();

        // Leave every weight at zero except the third unit, pinned to pure red.
        let red_unit = units[2];
        net.destroy_all_connections(red_unit);
        for (i, &src) in inputs.iter().enumerate() {
            let value = if i == 0 { 1.0 } else { 0.0 };
            net.connect_nodes(src, red_unit, Direction::Forward, value);
        }

        assert_eq!(best_matching_unit(&mut net, &units, &[1.0, 0.05, 0.0]), 2);
        assert_eq!(best_matching_unit(&mut net, &units, &[0.0, 0.0, 0.05]), 0);
    }

    #[test]
    fn test_training_pulls_winner_toward_sample() {
        let (mut net, inputs, _som, units) = color_net();
        net.build_node_connections();
        net.set_learning_rate(0.2);
        let mut rng = SimpleRng::new(3);
        net.randomise_weights(&mut rng, 1.0, true);

        let color = [0.9, 0.1, 0.5];
        let before = units
            .iter()
            .map(|&u| unit_distance(&mut net, u, &color))
            .fold(f64::INFINITY, f64::min);

        for _ in 0..50 {
            for (&node, &channel) in inputs.iter().zip(color.iter()) {
                net.set_value(node, channel);
            }
            net.forward_pass().unwrap();
            net.reverse_pass(false);
        }

        let after = units
            .iter()
            .map(|&u| unit_distance(&mut net, u, &color))
            .fold(f64::INFINITY, f64::min);
        assert!(after <= before);
        assert!(after < 1e-6, "winner never locked on, distance {}", after);
    }
}
