//! Incremental pose-graph optimizer: the merged-id-space factor replay
//! algorithm and the Gauss-Newton SE(3) smoother it drives.

mod replay;
mod smoother;

pub use replay::replay;
pub use smoother::{IncrementalSmoother, OptimizeError, SmootherConfig};
