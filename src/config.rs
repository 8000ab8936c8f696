use std::{num::NonZeroUsize, ops::Deref};

use rand::Rng;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    ActFn, Result,
    dataset::{DataSet, DataSetView, split, split_ratio},
    layers::{FullyConnected, OutputInfo},
};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Logistic,
    Tanh,
    ScaledTanh,
    Rectifier,
    Linear,
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::Logistic => ActFn::Logistic,
            ActFnSpec::Tanh => ActFn::Tanh,
            ActFnSpec::ScaledTanh => ActFn::ScaledTanh,
            ActFnSpec::Rectifier => ActFn::Rectifier,
            ActFnSpec::Linear => ActFn::Linear,
        }
    }
}

/// The specification for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    FullyConnected {
        outputs: usize,
        #[serde(default = "enabled")]
        bias: bool,
        act_fn: ActFnSpec,
        #[serde(default = "default_std_dev")]
        std_dev: f64,
    },
}

impl LayerSpec {
    /// Builds the specified layer on top of a previous layer's output.
    ///
    /// # Arguments
    /// * `info` - The output shape of the previous layer.
    pub fn build(&self, info: &OutputInfo) -> Result<FullyConnected> {
        match *self {
            LayerSpec::FullyConnected {
                outputs,
                bias,
                act_fn,
                std_dev,
            } => FullyConnected::new(info, outputs, bias, act_fn.into(), std_dev),
        }
    }
}

/// The specification for partitioning a dataset into views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSpec {
    Groups {
        groups: NonZeroUsize,
        #[serde(default = "enabled")]
        shuffle: bool,
    },
    Ratio {
        ratio: f64,
        #[serde(default = "enabled")]
        shuffle: bool,
    },
}

impl SplitSpec {
    /// Partitions `dataset` as specified, a ratio split always yields two views.
    ///
    /// # Arguments
    /// * `dataset` - A cloneable handle to the dataset.
    /// * `rng` - A random number generator used for shuffling.
    pub fn split<R, G>(&self, dataset: R, rng: &mut G) -> Result<Vec<DataSetView<R>>>
    where
        R: Deref + Clone,
        R::Target: DataSet,
        G: Rng + ?Sized,
    {
        match *self {
            SplitSpec::Groups { groups, shuffle } => {
                Ok(split(dataset, groups, shuffle, rng))
            }
            SplitSpec::Ratio { ratio, shuffle } => {
                let (first, second) = split_ratio(dataset, ratio, shuffle, rng)?;
                Ok(vec![first, second])
            }
        }
    }
}

fn enabled() -> bool {
    true
}

fn default_std_dev() -> f64 {
    0.05
}

/// Parses a specification from a JSON document.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}
