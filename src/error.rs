use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, NnErr>;

/// The crate's error type.
///
/// Every variant describes a broken caller contract: none of them are recoverable by
/// retrying the same call.
#[derive(Debug)]
pub enum NnErr {
    /// A dataset or view was queried with an index outside `[0, len)`.
    IndexOutOfRange { index: usize, len: usize },
    /// A vector's length does not match the size a layer was configured with.
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A propagate method was called before `initialize`.
    UninitializedLayer,
    /// `initialize` was called on a layer that already registered its parameters.
    AlreadyInitialized,
    /// `backpropagate` was called without a previous `forward_propagate`.
    MissingForwardPass,
    /// The split ratio lies outside `[0, 1]`.
    InvalidRatio(f64),
    /// The initialization standard deviation is negative or not finite.
    InvalidStdDev(f64),
    /// A buffer could not be interpreted with the requested shape.
    InvalidShape(String),
    /// A configuration document could not be parsed.
    Config(String),
}

impl Display for NnErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnErr::IndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for {len} samples")
            }
            NnErr::DimensionMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "dimension mismatch for {what}: got {got}, expected {expected}"
            ),
            NnErr::UninitializedLayer => write!(f, "the layer was used before initialization"),
            NnErr::AlreadyInitialized => write!(f, "the layer is already initialized"),
            NnErr::MissingForwardPass => {
                write!(f, "backpropagation requires a previous forward pass")
            }
            NnErr::InvalidRatio(ratio) => {
                write!(f, "split ratio {ratio} is outside of the [0, 1] range")
            }
            NnErr::InvalidStdDev(std_dev) => {
                write!(f, "invalid standard deviation {std_dev} for weight initialization")
            }
            NnErr::InvalidShape(msg) => write!(f, "invalid shape: {msg}"),
            NnErr::Config(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for NnErr {}

impl From<ShapeError> for NnErr {
    fn from(value: ShapeError) -> Self {
        Self::InvalidShape(value.to_string())
    }
}

impl From<serde_json::Error> for NnErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}
