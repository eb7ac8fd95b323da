//! Map-stitching orchestration: ties the keyframe store,
//! descriptor index, re-localizer, loop detector/aligner, and
//! factor-graph optimizer crates together into one stitching run.
//!
//! [`StitchRun`] is an owned run context: construct one per invocation,
//! call [`StitchRun::run`] once, and discard it. No long-lived
//! singletons.

mod config;
mod error;
mod run;

pub use config::StitchConfig;
pub use error::{LoopError, StitchError};
pub use run::{rewrite_pose, StitchOutcome, StitchRun};
