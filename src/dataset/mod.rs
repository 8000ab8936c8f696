mod direct;
mod partition;
mod view;

pub use direct::DirectStorageDataSet;
pub use partition::{group_range, merge, split, split_ratio};
pub use view::DataSetView;

use ndarray::{Array1, ArrayView1, ArrayViewMut1};

use crate::Result;

/// Anything that can be trained: datasets only need to query its predictions at the end of an
/// iteration.
pub trait Learner {
    /// Computes the learner's output for a single instance.
    ///
    /// # Arguments
    /// * `x` - An instance with as many elements as the dataset's `inputs`.
    ///
    /// # Returns
    /// The predicted output or an error if the instance does not fit the learner.
    fn predict(&mut self, x: ArrayView1<f64>) -> Result<Array1<f64>>;
}

/// Read access to a collection of supervised samples.
///
/// Every sample is a pair of an *instance* (the input vector) and a *target* (the expected
/// output vector). Implementors only provide access, they do not define how samples are
/// batched or consumed.
pub trait DataSet {
    /// Returns the number of samples.
    fn samples(&self) -> usize;

    /// Returns the dimension of every instance.
    fn inputs(&self) -> usize;

    /// Returns the dimension of every target.
    fn outputs(&self) -> usize;

    /// Returns the instance at `i`.
    ///
    /// # Errors
    /// `NnErr::IndexOutOfRange` if `i >= self.samples()`.
    fn instance(&self, i: usize) -> Result<ArrayView1<'_, f64>>;

    /// Returns the target at `i`.
    ///
    /// # Errors
    /// `NnErr::IndexOutOfRange` if `i >= self.samples()`.
    fn target(&self, i: usize) -> Result<ArrayView1<'_, f64>>;
}

/// Write access to a dataset's samples and its per-iteration bookkeeping.
pub trait DataSetMut: DataSet {
    /// Returns a mutable alias to the instance at `i`, writes go to the original storage.
    ///
    /// # Errors
    /// `NnErr::IndexOutOfRange` if `i >= self.samples()`.
    fn instance_mut(&mut self, i: usize) -> Result<ArrayViewMut1<'_, f64>>;

    /// Returns a mutable alias to the target at `i`, writes go to the original storage.
    ///
    /// # Errors
    /// `NnErr::IndexOutOfRange` if `i >= self.samples()`.
    fn target_mut(&mut self, i: usize) -> Result<ArrayViewMut1<'_, f64>>;

    /// Hook called by the training loop once an iteration over the dataset is over.
    ///
    /// # Arguments
    /// * `learner` - The learner being trained with this dataset.
    fn finish_iteration(&mut self, learner: &mut dyn Learner);
}
