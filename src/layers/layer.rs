use ndarray::ArrayView1;
use rand::RngCore;

use crate::{Parameters, Result};

/// The shape of a layer's output, consumed by the next layer to size itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    dimensions: Vec<usize>,
}

impl OutputInfo {
    /// Creates a new `OutputInfo` for a possibly multidimensional output.
    pub fn new(dimensions: Vec<usize>) -> Self {
        Self { dimensions }
    }

    /// Creates a new `OutputInfo` for a flat output of `n` values.
    pub fn flat(n: usize) -> Self {
        Self::new(vec![n])
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// Returns the total amount of output values.
    pub fn outputs(&self) -> usize {
        self.dimensions.iter().product()
    }
}

/// A differentiable building block of a feed-forward network.
///
/// The lifecycle is `initialize` once, then any amount of `forward_propagate` calls each
/// optionally followed by a `backpropagate` call. Both propagation methods overwrite the
/// layer's internal buffers and return views into them, valid until the next call.
pub trait Layer {
    /// Registers the layer's parameters in `params` and initializes them.
    ///
    /// # Arguments
    /// * `params` - The buffer that owns every trainable scalar of the network.
    /// * `rng` - A random number generator for the initial weights.
    ///
    /// # Returns
    /// The shape of this layer's output.
    fn initialize(&mut self, params: &mut Parameters, rng: &mut dyn RngCore)
    -> Result<OutputInfo>;

    /// Computes the layer's output for `x` and caches what the backward pass needs.
    fn forward_propagate(
        &mut self,
        params: &Parameters,
        x: ArrayView1<f64>,
    ) -> Result<ArrayView1<'_, f64>>;

    /// Accumulates the gradient of the loss with respect to this layer's parameters into
    /// `params` and returns the gradient with respect to the last input.
    ///
    /// # Arguments
    /// * `params` - The buffer the layer registered its parameters in.
    /// * `ein` - The gradient of the loss with respect to this layer's output.
    fn backpropagate(
        &mut self,
        params: &mut Parameters,
        ein: ArrayView1<f64>,
    ) -> Result<ArrayView1<'_, f64>>;
}
