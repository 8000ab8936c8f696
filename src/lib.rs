mod activation;
pub mod config;
pub mod dataset;
pub mod error;
pub mod layers;
mod parameters;

pub use activation::ActFn;
pub use error::{NnErr, Result};
pub use parameters::{ParamHandle, Parameters};
