use keyframe_store::{LoadError, SaveError};
use pgo::OptimizeError;
use relocalize::RelocalizeError;
use thiserror::Error;

/// Terminal errors from a stitching run.
///
/// Per-keyframe re-localization and loop attempts are recovered locally
/// and never surface here; only conditions that abort the whole run do.
/// Persisted state is left untouched whenever this is returned: `save`
/// is the last step of [`crate::StitchRun::run`] and nothing is written
/// before every preceding stage has succeeded.
#[derive(Debug, Error)]
pub enum StitchError {
    #[error("failed to load prior/stitch session: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Loop(#[from] LoopError),
    #[error("re-localization failed for every stitch keyframe: {0}")]
    Relocalize(#[from] RelocalizeError),
    #[error("pose-graph optimization failed: {0}")]
    Optimize(#[from] OptimizeError),
    #[error("failed to persist stitching result: {0}")]
    Save(#[from] SaveError),
}

/// Loop-closure outcomes that abort a run. Thin loop coverage (fewer
/// than 2 factors, or all of them clustered within 10 keyframes) is not
/// fatal and is only logged via `tracing::warn!` at the call site.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("no loop closures were found between the stitch and prior sessions")]
    NoLoopsFound,
}
