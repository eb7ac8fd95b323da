//! Scan-context-style rotation-invariant place descriptors.
//!
//! A descriptor is a polar histogram (ring × sector) of a keyframe's
//! point cloud, plus a "ring-key" (per-ring row mean) used to cheaply
//! screen candidates before the more expensive column-shift comparison.
//! Comparing two descriptors by minimum column-shift distance recovers
//! both a similarity score and the yaw offset between the two frames,
//! which is what makes this descriptor useful for loop closure across
//! sessions recorded with unrelated heading references.

mod index;
mod scancontext;

pub use index::{DetectConfig, ScanContextIndex};
pub use scancontext::{make_descriptor, Descriptor, ScanContextConfig};
