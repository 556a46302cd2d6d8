//! Activation functions for scalar computation nodes.
//!
//! Each node carries one [`Activation`] used to squash its weighted input sum
//! during the forward pass and to scale its error during the backward pass.
//! Elliott and Gaussian can overflow to non-finite values for extreme inputs,
//! so their `compute` checks the result and reports an [`ActivationError`].
//! Linear, Step and Tanh cannot fail.

use std::error::Error;
use std::fmt;

/// Error produced when a guarded activation yields a non-finite result.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationError {
    function: &'static str,
    input: f64,
}

impl ActivationError {
    fn new(function: &'static str, input: f64) -> Self {
        Self { function, input }
    }
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} activation produced a non-finite value for input {}",
            self.function, self.input
        )
    }
}

impl Error for ActivationError {}

/// Activation function applied by a node.
///
/// The derivative is always invoked with the node's current value; each
/// formula keeps its own interpretation of that argument. Tanh reads it as
/// the activation output, Elliott and Gaussian as the pre-activation input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// Identity passthrough.
    Linear,
    /// Heaviside step at `threshold`.
    Step { threshold: f64 },
    /// Hyperbolic tangent.
    Tanh,
    /// Elliott sigmoid-like curve with slope `scale`.
    Elliott { scale: f64 },
    /// Gaussian bump with width controlled by `steepness`.
    Gaussian { steepness: f64 },
}

impl Activation {
    /// Apply the activation to a weighted input sum.
    ///
    /// # Arguments
    ///
    /// * `x` - The weighted input sum to squash
    ///
    /// # Returns
    ///
    /// The activated value, or an [`ActivationError`] if a guarded function
    /// produced NaN or infinity.
    pub fn compute(&self, x: f64) -> Result<f64, ActivationError> {
        match *self {
            Activation::Linear => Ok(x),
            Activation::Step { threshold } => Ok(if x >= threshold { 1.0 } else { 0.0 }),
            Activation::Tanh => Ok(x.tanh()),
            Activation::Elliott { scale } => {
                let y = x * scale / (1.0 + (x * scale).abs());
                if y.is_finite() {
                    Ok(y)
                } else {
                    Err(ActivationError::new("elliott", x))
                }
            }
            Activation::Gaussian { steepness } => {
                let y = (-(steepness * x).powi(2)).exp();
                if y.is_finite() {
                    Ok(y)
                } else {
                    Err(ActivationError::new("gaussian", x))
                }
            }
        }
    }

    /// Evaluate the activation's derivative.
    ///
    /// Callers pass the node's current value. Linear and Step report a unit
    /// slope so raw error flows through unscaled.
    pub fn derivative(&self, x: f64) -> f64 {
        match *self {
            Activation::Linear => 1.0,
            Activation::Step { .. } => 1.0,
            Activation::Tanh => 1.0 - x * x,
            Activation::Elliott { scale } => scale / (1.0 + (x * scale).abs()).powi(2),
            Activation::Gaussian { steepness } => {
                let y = (-(steepness * x).powi(2)).exp();
                -2.0 * x * steepness * y * x
            }
        }
    }
}
