use std::ops::{Deref, DerefMut};

use log::trace;
use ndarray::{ArrayView1, ArrayViewMut1};
use rand::{Rng, seq::SliceRandom};

use super::{DataSet, DataSetMut, Learner};
use crate::{NnErr, Result};

/// An index-based window into another dataset.
///
/// The view only owns a sequence of indices into the referenced dataset, samples are never
/// copied. `R` is the handle to the dataset: a shared reference (`&D`) or an `Rc<D>` allows
/// many views of the same dataset at once, while an exclusive reference (`&mut D`) also grants
/// write access to the samples and forwards `finish_iteration`.
#[derive(Debug, Clone)]
pub struct DataSetView<R> {
    indices: Vec<usize>,
    dataset: R,
}

impl<R> DataSetView<R>
where
    R: Deref,
    R::Target: DataSet,
{
    /// Creates an empty view on `dataset`.
    pub fn new(dataset: R) -> Self {
        Self {
            indices: Vec::new(),
            dataset,
        }
    }

    /// Creates a view on `dataset` holding the given indices, in order.
    ///
    /// # Arguments
    /// * `dataset` - The referenced dataset.
    /// * `indices` - Indices into `dataset`.
    ///
    /// # Returns
    /// The new view or `NnErr::IndexOutOfRange` if any index is invalid for `dataset`.
    pub fn with_indices<I>(dataset: R, indices: I) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut view = Self::new(dataset);
        view.push_indices(indices)?;
        Ok(view)
    }

    /// Builds a view from indices that are already known to be valid.
    pub(super) fn from_trusted(dataset: R, indices: Vec<usize>) -> Self {
        debug_assert!(indices.iter().all(|&i| i < dataset.samples()));
        Self { indices, dataset }
    }

    /// Returns the indices into the referenced dataset, in view order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Returns the referenced dataset.
    pub fn dataset(&self) -> &R::Target {
        &self.dataset
    }

    /// Creates a view holding the same indices, in the same order, on another handle.
    ///
    /// This is how a view built over a shared handle, such as the ones `split` returns, gets
    /// write access or forwards `finish_iteration`: re-target it onto `&mut D`.
    ///
    /// # Returns
    /// The new view or `NnErr::IndexOutOfRange` if any index is invalid for `dataset`.
    pub fn with_dataset<S>(&self, dataset: S) -> Result<DataSetView<S>>
    where
        S: Deref,
        S::Target: DataSet,
    {
        DataSetView::with_indices(dataset, self.indices.iter().copied())
    }

    /// Shuffles the order of the samples within this view, the referenced dataset and every
    /// other view of it stay untouched.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// This view, for chaining.
    pub fn shuffle<G: Rng + ?Sized>(&mut self, rng: &mut G) -> &mut Self {
        self.indices.shuffle(rng);
        self
    }

    /// Appends every index of every group, in group order and then in view order.
    ///
    /// Indices are not deduplicated.
    ///
    /// # Returns
    /// `NnErr::IndexOutOfRange` if an index is invalid for this view's dataset, in which case
    /// the view is left unchanged.
    pub fn extend_from<'a, S, I>(&mut self, groups: I) -> Result<()>
    where
        S: 'a,
        I: IntoIterator<Item = &'a DataSetView<S>>,
    {
        let start = self.indices.len();
        let res = self.push_indices(
            groups
                .into_iter()
                .flat_map(|group| group.indices.iter().copied()),
        );

        match res {
            Ok(()) => {
                trace!(appended = self.indices.len() - start; "merged views");
                Ok(())
            }
            Err(e) => {
                self.indices.truncate(start);
                Err(e)
            }
        }
    }

    fn push_indices<I>(&mut self, indices: I) -> Result<()>
    where
        I: IntoIterator<Item = usize>,
    {
        let len = self.dataset.samples();

        for index in indices {
            if index >= len {
                return Err(NnErr::IndexOutOfRange { index, len });
            }

            self.indices.push(index);
        }

        Ok(())
    }

    fn translate(&self, i: usize) -> Result<usize> {
        self.indices
            .get(i)
            .copied()
            .ok_or(NnErr::IndexOutOfRange {
                index: i,
                len: self.indices.len(),
            })
    }
}

impl<R> DataSet for DataSetView<R>
where
    R: Deref,
    R::Target: DataSet,
{
    fn samples(&self) -> usize {
        self.indices.len()
    }

    fn inputs(&self) -> usize {
        self.dataset.inputs()
    }

    fn outputs(&self) -> usize {
        self.dataset.outputs()
    }

    fn instance(&self, i: usize) -> Result<ArrayView1<'_, f64>> {
        let index = self.translate(i)?;
        self.dataset.instance(index)
    }

    fn target(&self, i: usize) -> Result<ArrayView1<'_, f64>> {
        let index = self.translate(i)?;
        self.dataset.target(index)
    }
}

impl<R> DataSetMut for DataSetView<R>
where
    R: DerefMut,
    R::Target: DataSetMut,
{
    fn instance_mut(&mut self, i: usize) -> Result<ArrayViewMut1<'_, f64>> {
        let index = self.translate(i)?;
        self.dataset.instance_mut(index)
    }

    fn target_mut(&mut self, i: usize) -> Result<ArrayViewMut1<'_, f64>> {
        let index = self.translate(i)?;
        self.dataset.target_mut(index)
    }

    fn finish_iteration(&mut self, learner: &mut dyn Learner) {
        self.dataset.finish_iteration(learner);
    }
}
