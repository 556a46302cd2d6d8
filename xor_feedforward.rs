use neural_graph::{Activation, ActivationError, LayerKind, Network, NodeId, NodeKind, SimpleRng};
use std::error::Error;

// Small feedforward graph that learns XOR (educational example).
const NUM_SAMPLES: usize = 4;
// Training hyperparameters.
const LEARNING_RATE: f64 = 0.3;
const WEIGHT_VARIANCE: f64 = 1.0;
const EPOCHS: usize = 2_000;
const SEED: u64 = 42;

// Graph plus the node handles the training loop needs to reach.
struct XorNetwork {
    net: Network,
    inputs: [NodeId; 2],
    output: NodeId,
}

// Build a fully-connected 2-2-1 graph with tanh hidden and output nodes.
fn initialize_network(rng: &mut SimpleRng) -> XorNetwork {
    let mut net = Network::new();
    net.set_learning_rate(LEARNING_RATE);

    let input = net.add_layer(LayerKind::Base);
    let hidden = net.add_layer(LayerKind::Base);
    let output = net.add_layer(LayerKind::Base);
    net.connect_forward_layer(input, hidden);
    net.connect_forward_layer(hidden, output);

    let i0 = net.add_node(input, NodeKind::Base, Activation::Linear);
    let i1 = net.add_node(input, NodeKind::Base, Activation::Linear);
    net.add_node(hidden, NodeKind::Base, Activation::Tanh);
    net.add_node(hidden, NodeKind::Base, Activation::Tanh);
    let out = net.add_node(output, NodeKind::Output { target: 0.0 }, Activation::Tanh);

    net.build_node_connections();
    net.randomise_weights(rng, WEIGHT_VARIANCE, false);

    XorNetwork {
        net,
        inputs: [i0, i1],
        output: out,
    }
}

// Online training, one reverse pass per sample.
fn train(
    xor: &mut XorNetwork,
    samples: &[([f64; 2], f64); NUM_SAMPLES],
) -> Result<(), ActivationError> {
    for epoch in 0..EPOCHS {
        let mut total_errors = 0.0;

        for &(input, expected) in samples {
            xor.net.set_value(xor.inputs[0], input[0]);
            xor.net.set_value(xor.inputs[1], input[1]);
            xor.net.forward_pass()?;

            let error = expected - xor.net.value(xor.output);
            total_errors += error * error;

            xor.net.set_target_value(xor.output, expected);
            xor.net.reverse_pass(false);
        }

        // Average loss per epoch, printed every 200 epochs.
        let loss = total_errors / NUM_SAMPLES as f64;
        if (epoch + 1) % 200 == 0 {
            println!("Epoch {}, Error: {:.6}", epoch + 1, loss);
        }
    }
    Ok(())
}

// Simple evaluation on the four XOR samples.
fn test(
    xor: &mut XorNetwork,
    samples: &[([f64; 2], f64); NUM_SAMPLES],
) -> Result<(), ActivationError> {
    println!("\nTesting the trained network:");
    for &(input, expected) in samples {
        xor.net.set_value(xor.inputs[0], input[0]);
        xor.net.set_value(xor.inputs[1], input[1]);
        xor.net.forward_pass()?;

        println!(
            "Input: {:.1}, {:.1}, Expected Output: {:.1}, Predicted Output: {:.3}",
            input[0],
            input[1],
            expected,
            xor.net.value(xor.output)
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // Fixed seed so the printed run is reproducible.
    let mut rng = SimpleRng::new(SEED);

    // XOR dataset (binary inputs and expected outputs).
    let samples: [([f64; 2], f64); NUM_SAMPLES] = [
        ([0.0, 0.0], 0.0),
        ([0.0, 1.0], 1.0),
        ([1.0, 0.0], 1.0),
        ([1.0, 1.0], 0.0),
    ];

    // Training and testing in the same process.
    let mut xor = initialize_network(&mut rng);
    train(&mut xor, &samples)?;
    test(&mut xor, &samples)?;
    Ok(())
}
