use std::{env, error::Error, fs, rc::Rc};

use log::info;
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Deserialize;

use nn_core::{
    Parameters, Result,
    config::{self, ActFnSpec, LayerSpec, SplitSpec},
    dataset::{DataSet, DataSetMut, DataSetView, DirectStorageDataSet, Learner, merge},
    layers::{FullyConnected, Layer, OutputInfo},
};

/// Everything the demo needs, read from the JSON file given as first argument.
#[derive(Debug, Deserialize)]
struct DemoSpec {
    samples: usize,
    layer: LayerSpec,
    split: SplitSpec,
    seed: Option<u64>,
}

impl Default for DemoSpec {
    fn default() -> Self {
        Self {
            samples: 100,
            layer: LayerSpec::FullyConnected {
                outputs: 1,
                bias: true,
                act_fn: ActFnSpec::Tanh,
                std_dev: 0.5,
            },
            split: SplitSpec::Ratio {
                ratio: 0.8,
                shuffle: true,
            },
            seed: None,
        }
    }
}

/// Evaluates a single initialized layer.
struct LayerLearner<'a> {
    layer: &'a mut FullyConnected,
    params: &'a Parameters,
}

impl Learner for LayerLearner<'_> {
    fn predict(&mut self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        Ok(self.layer.forward_propagate(self.params, x)?.to_owned())
    }
}

/// Mean squared error of `learner` over the samples of `view`.
fn view_mse<D: DataSet + ?Sized>(view: &D, learner: &mut dyn Learner) -> Result<f64> {
    let mut total = 0.0;
    for i in 0..view.samples() {
        let y = learner.predict(view.instance(i)?)?;
        total += (&y - &view.target(i)?).mapv(|d| d * d).sum();
    }

    Ok(total / view.samples().max(1) as f64)
}

/// Samples `n` points in `[-1, 1]^2` labeled with `tanh(x0 - x1)`.
fn synthetic(n: usize, rng: &mut StdRng) -> Result<DirectStorageDataSet> {
    let xs = Array2::from_shape_fn((n, 2), |_| rng.random_range(-1.0f64..1.0));
    let ys = Array2::from_shape_fn((n, 1), |(i, _)| (xs[[i, 0]] - xs[[i, 1]]).tanh());
    DirectStorageDataSet::new(xs, ys)
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    env_logger::init();

    let spec = match env::args().nth(1) {
        Some(path) => config::from_json(&fs::read_to_string(path)?)?,
        None => DemoSpec::default(),
    };

    let mut rng = match spec.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // The folds share a read-only snapshot, evaluation goes through the original.
    let mut dataset = synthetic(spec.samples, &mut rng)?.with_evaluation();
    let snapshot = Rc::new(dataset.clone());
    let folds = spec.split.split(Rc::clone(&snapshot), &mut rng)?;
    info!("split {} samples into {} groups", snapshot.samples(), folds.len());

    let mut params = Parameters::new();
    let mut layer = spec.layer.build(&OutputInfo::flat(snapshot.inputs()))?;
    layer.initialize(&mut params, &mut rng)?;

    // Each group takes a turn being left out of the gradient computation.
    for (k, held_out) in folds.iter().enumerate() {
        let mut training = DataSetView::new(Rc::clone(&snapshot));
        merge(
            &mut training,
            &folds
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != k)
                .map(|(_, fold)| fold.clone())
                .collect::<Vec<_>>(),
        )?;
        training.shuffle(&mut rng);

        params.zero_grad();
        for i in 0..training.samples() {
            let y = layer.forward_propagate(&params, training.instance(i)?)?;
            let ein = &y - &training.target(i)?;
            layer.backpropagate(&mut params, ein.view())?;
        }

        let norm = params.grad().iter().map(|g| g * g).sum::<f64>().sqrt();
        let mut learner = LayerLearner {
            layer: &mut layer,
            params: &params,
        };
        let mse = view_mse(held_out, &mut learner)?;

        info!(
            fold = k,
            samples = training.samples(),
            held_out = held_out.samples(),
            held_out_mse = mse,
            grad_norm = norm;
            "accumulated gradient"
        );

        // Reports the error over the whole dataset.
        held_out
            .with_dataset(&mut dataset)?
            .finish_iteration(&mut learner);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    struct Constant(f64);

    impl Learner for Constant {
        fn predict(&mut self, _x: ArrayView1<f64>) -> Result<Array1<f64>> {
            Ok(array![self.0])
        }
    }

    #[test]
    fn synthetic_labels_follow_tanh() {
        let mut rng = StdRng::seed_from_u64(42);
        let ds = synthetic(20, &mut rng).unwrap();

        assert_eq!(ds.samples(), 20);
        assert_eq!(ds.inputs(), 2);
        for i in 0..ds.samples() {
            let x = ds.instance(i).unwrap();
            assert!(x.iter().all(|v| (-1.0..1.0).contains(v)));
            assert_eq!(ds.target(i).unwrap()[0], (x[0] - x[1]).tanh());
        }
    }

    #[test]
    fn view_mse_only_sees_the_view() {
        let ds = DirectStorageDataSet::new(
            Array2::zeros((3, 1)),
            array![[1.0], [3.0], [100.0]],
        )
        .unwrap();
        let view = DataSetView::with_indices(&ds, [0, 1]).unwrap();

        assert_eq!(view_mse(&view, &mut Constant(1.0)).unwrap(), 2.0);
        assert_eq!(view_mse(&DataSetView::new(&ds), &mut Constant(1.0)).unwrap(), 0.0);
    }
}
