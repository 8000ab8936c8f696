use log::{info, warn};
use ndarray::{Array2, ArrayView1, ArrayViewMut1};

use super::{DataSet, DataSetMut, Learner};
use crate::{NnErr, Result};

/// An in-memory dataset, one row per sample.
#[derive(Debug, Clone)]
pub struct DirectStorageDataSet {
    instances: Array2<f64>,
    targets: Array2<f64>,
    evaluate: bool,
    iteration: usize,
}

impl DirectStorageDataSet {
    /// Creates a new `DirectStorageDataSet`.
    ///
    /// # Arguments
    /// * `instances` - A `samples x inputs` matrix.
    /// * `targets` - A `samples x outputs` matrix.
    ///
    /// # Returns
    /// A new dataset or an error if both matrices have a different amount of rows.
    pub fn new(instances: Array2<f64>, targets: Array2<f64>) -> Result<Self> {
        if instances.nrows() != targets.nrows() {
            return Err(NnErr::DimensionMismatch {
                what: "target rows",
                got: targets.nrows(),
                expected: instances.nrows(),
            });
        }

        Ok(Self {
            instances,
            targets,
            evaluate: false,
            iteration: 0,
        })
    }

    /// Creates a new `DirectStorageDataSet` from row-major raw buffers.
    ///
    /// # Arguments
    /// * `xs` - The instances, `x_size` values per sample.
    /// * `ys` - The targets, `y_size` values per sample.
    /// * `x_size` - The dimension of every instance.
    /// * `y_size` - The dimension of every target.
    ///
    /// A zero-sized side carries no row count of its own, it takes the other side's amount of
    /// samples and its buffer must be empty. If both sizes are zero the dataset is empty.
    pub fn from_vecs(xs: Vec<f64>, ys: Vec<f64>, x_size: usize, y_size: usize) -> Result<Self> {
        let x_rows = (x_size > 0).then(|| xs.len() / x_size);
        let y_rows = (y_size > 0).then(|| ys.len() / y_size);

        let instances =
            Array2::from_shape_vec((x_rows.or(y_rows).unwrap_or(0), x_size), xs)?;
        let targets = Array2::from_shape_vec((y_rows.or(x_rows).unwrap_or(0), y_size), ys)?;
        Self::new(instances, targets)
    }

    /// Enables logging the learner's mean squared error each time an iteration finishes.
    pub fn with_evaluation(mut self) -> Self {
        self.evaluate = true;
        self
    }

    /// Returns how many iterations have finished over this dataset.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    fn check(&self, i: usize) -> Result<()> {
        let len = self.samples();
        if i >= len {
            return Err(NnErr::IndexOutOfRange { index: i, len });
        }

        Ok(())
    }

    fn mse(&self, learner: &mut dyn Learner) -> Result<f64> {
        let mut total = 0.0;

        for (x, t) in self.instances.rows().into_iter().zip(self.targets.rows()) {
            let y = learner.predict(x)?;
            if y.len() != t.len() {
                return Err(NnErr::DimensionMismatch {
                    what: "prediction",
                    got: y.len(),
                    expected: t.len(),
                });
            }

            total += (&y - &t).mapv(|d| d * d).sum();
        }

        Ok(total / self.samples().max(1) as f64)
    }
}

impl DataSet for DirectStorageDataSet {
    fn samples(&self) -> usize {
        self.instances.nrows()
    }

    fn inputs(&self) -> usize {
        self.instances.ncols()
    }

    fn outputs(&self) -> usize {
        self.targets.ncols()
    }

    fn instance(&self, i: usize) -> Result<ArrayView1<'_, f64>> {
        self.check(i)?;
        Ok(self.instances.row(i))
    }

    fn target(&self, i: usize) -> Result<ArrayView1<'_, f64>> {
        self.check(i)?;
        Ok(self.targets.row(i))
    }
}

impl DataSetMut for DirectStorageDataSet {
    fn instance_mut(&mut self, i: usize) -> Result<ArrayViewMut1<'_, f64>> {
        self.check(i)?;
        Ok(self.instances.row_mut(i))
    }

    fn target_mut(&mut self, i: usize) -> Result<ArrayViewMut1<'_, f64>> {
        self.check(i)?;
        Ok(self.targets.row_mut(i))
    }

    fn finish_iteration(&mut self, learner: &mut dyn Learner) {
        self.iteration += 1;

        if !self.evaluate {
            return;
        }

        match self.mse(learner) {
            Ok(mse) => info!(iteration = self.iteration, mse = mse; "finished iteration"),
            Err(e) => warn!("could not evaluate iteration {}: {e}", self.iteration),
        }
    }
}
