//! Per-session keyframe storage, the factor/vertex data model shared by
//! the loop detector and factor-graph optimizer, and the on-disk
//! persistence layout.

mod factor;
mod fg;
mod scd;
mod session;

pub use factor::{Factor, FactorKind};
pub use fg::{read_factor_graph, write_factor_graph, FgError};
pub use scd::{read_scd, write_scd};
pub use session::{
    load_prior, load_stitch, save, LoadError, LoadedSession, SaveError, SaveRequest,
    SessionKeyframes, CURRENT_NUM_DIGITS,
};

use types::VertexId;

/// Vertex id offset of the stitch session in the merged id space
/// (`Np`): the prior session occupies `[0, Np)`.
pub fn rebase(local_id: VertexId, offset: VertexId) -> VertexId {
    local_id + offset
}
