mod fully_connected;
mod layer;

pub use fully_connected::FullyConnected;
pub use layer::{Layer, OutputInfo};
