use std::ops::Range;

use log::trace;

use crate::{NnErr, Result};

/// A handle to a contiguous range of scalars registered in a `Parameters` buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamHandle {
    range: Range<usize>,
}

impl ParamHandle {
    /// Returns the range this handle covers in the flat buffers.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Returns the amount of scalars behind this handle.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// The flat parameter and gradient buffers of every layer.
///
/// Layers do not own their trainable scalars: they register how many they need and keep the
/// returned `ParamHandle`. The owner of this struct exposes both buffers as single flat slices
/// so an optimizer can update every parameter at once, the gradient at `i` always belongs to
/// the parameter at `i`.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    params: Vec<f64>,
    grad: Vec<f64>,
}

impl Parameters {
    /// Creates an empty `Parameters`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `n` zeroed parameters and their gradients.
    ///
    /// # Returns
    /// The handle to the reserved range.
    pub fn register(&mut self, n: usize) -> ParamHandle {
        let start = self.params.len();
        let end = start + n;

        self.params.resize(end, 0.0);
        self.grad.resize(end, 0.0);

        trace!(start = start, end = end; "registered parameters");
        ParamHandle { range: start..end }
    }

    /// Returns the total amount of registered parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [f64] {
        &mut self.params
    }

    pub fn grad(&self) -> &[f64] {
        &self.grad
    }

    pub fn grad_mut(&mut self) -> &mut [f64] {
        &mut self.grad
    }

    /// Returns the parameters behind `handle`.
    ///
    /// # Returns
    /// The slice or `NnErr::DimensionMismatch` if `handle` was registered in a different,
    /// larger `Parameters`.
    pub fn slice(&self, handle: &ParamHandle) -> Result<&[f64]> {
        let len = self.len();
        self.params
            .get(handle.range())
            .ok_or_else(|| Self::foreign(handle, len))
    }

    /// Returns the parameters behind `handle`, mutably.
    pub fn slice_mut(&mut self, handle: &ParamHandle) -> Result<&mut [f64]> {
        let len = self.len();
        self.params
            .get_mut(handle.range())
            .ok_or_else(|| Self::foreign(handle, len))
    }

    /// Returns the gradient behind `handle`.
    pub fn grad_slice(&self, handle: &ParamHandle) -> Result<&[f64]> {
        let len = self.len();
        self.grad
            .get(handle.range())
            .ok_or_else(|| Self::foreign(handle, len))
    }

    /// Returns the parameters and the gradient behind `handle` at the same time.
    pub fn split_mut(&mut self, handle: &ParamHandle) -> Result<(&[f64], &mut [f64])> {
        let len = self.len();
        let range = handle.range();

        match (self.params.get(range.clone()), self.grad.get_mut(range)) {
            (Some(params), Some(grad)) => Ok((params, grad)),
            _ => Err(Self::foreign(handle, len)),
        }
    }

    fn foreign(handle: &ParamHandle, len: usize) -> NnErr {
        NnErr::DimensionMismatch {
            what: "parameters",
            got: len,
            expected: handle.range.end,
        }
    }

    /// Zeros out every gradient. Layers only ever accumulate into the gradient buffer, so the
    /// owner must call this between optimization steps.
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }
}
