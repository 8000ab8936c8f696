use std::{
    num::NonZeroUsize,
    ops::{Deref, Range},
};

use log::debug;
use rand::{Rng, seq::SliceRandom};

use super::{DataSet, DataSetView};
use crate::{NnErr, Result};

/// Returns the slice of `[0..total)` that belongs to the `group`-th of `groups` groups.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - Sizes differ by at most 1, the first `total % groups` groups hold the extra sample.
///
/// # Panics
/// If `group >= groups`.
pub fn group_range(total: usize, group: usize, groups: NonZeroUsize) -> Range<usize> {
    let groups = groups.get();
    assert!(group < groups, "group {group} out of range for {groups} groups");

    let base = total / groups;
    let rem = total % groups;

    let start = group * base + group.min(rem);
    let extra = if group < rem { 1 } else { 0 };

    start..start + base + extra
}

/// Returns every index of `dataset`, shuffled if requested.
fn universe<D, G>(dataset: &D, shuffling: bool, rng: &mut G) -> Vec<usize>
where
    D: DataSet + ?Sized,
    G: Rng + ?Sized,
{
    let mut indices: Vec<usize> = (0..dataset.samples()).collect();
    if shuffling {
        indices.shuffle(rng);
    }

    indices
}

/// Splits a dataset into `groups` views of balanced size.
///
/// Each view holds a disjoint and contiguous slice of the dataset's indices, if `shuffling`
/// is set the indices are permuted before being sliced so group membership is random. Every
/// sample of `dataset` ends up in exactly one group.
///
/// # Arguments
/// * `dataset` - A cloneable handle to the dataset, every view gets a copy of it.
/// * `groups` - The amount of views to create.
/// * `shuffling` - Whether to shuffle the indices before slicing them.
/// * `rng` - A random number generator, only used when `shuffling` is set.
///
/// # Returns
/// The views, in group order.
pub fn split<R, G>(
    dataset: R,
    groups: NonZeroUsize,
    shuffling: bool,
    rng: &mut G,
) -> Vec<DataSetView<R>>
where
    R: Deref + Clone,
    R::Target: DataSet,
    G: Rng + ?Sized,
{
    let indices = universe(&*dataset, shuffling, rng);
    let total = indices.len();

    debug!(samples = total, groups = groups.get(), shuffling = shuffling; "splitting dataset");

    (0..groups.get())
        .map(|group| {
            let range = group_range(total, group, groups);
            DataSetView::from_trusted(dataset.clone(), indices[range].to_vec())
        })
        .collect()
}

/// Splits a dataset into two views, the first one holding `round(ratio * samples)` samples
/// and the second one the rest.
///
/// # Arguments
/// * `dataset` - A cloneable handle to the dataset, both views get a copy of it.
/// * `ratio` - The share of samples that goes to the first view, in `[0, 1]`.
/// * `shuffling` - Whether to shuffle the indices before slicing them.
/// * `rng` - A random number generator, only used when `shuffling` is set.
///
/// # Returns
/// Both views or `NnErr::InvalidRatio` if the ratio is outside of `[0, 1]`.
pub fn split_ratio<R, G>(
    dataset: R,
    ratio: f64,
    shuffling: bool,
    rng: &mut G,
) -> Result<(DataSetView<R>, DataSetView<R>)>
where
    R: Deref + Clone,
    R::Target: DataSet,
    G: Rng + ?Sized,
{
    if !(0.0..=1.0).contains(&ratio) {
        return Err(NnErr::InvalidRatio(ratio));
    }

    let mut indices = universe(&*dataset, shuffling, rng);
    let total = indices.len();
    let first = ((ratio * total as f64).round() as usize).min(total);

    debug!(samples = total, first = first, ratio = ratio, shuffling = shuffling; "splitting dataset by ratio");

    let rest = indices.split_off(first);
    Ok((
        DataSetView::from_trusted(dataset.clone(), indices),
        DataSetView::from_trusted(dataset, rest),
    ))
}

/// Appends every index of every view in `groups` to `merging`, in group order and then in view
/// order. The destination keeps referencing its own dataset and overlapping groups produce
/// duplicated indices.
///
/// # Returns
/// `NnErr::IndexOutOfRange` if a group holds an index that is invalid for `merging`'s dataset,
/// in which case `merging` is left unchanged.
pub fn merge<R, S>(merging: &mut DataSetView<R>, groups: &[DataSetView<S>]) -> Result<()>
where
    R: Deref,
    R::Target: DataSet,
{
    merging.extend_from(groups)
}
