//! Keyframe point clouds and the geometric primitives the map-stitching
//! core treats as black boxes: voxel downsampling, nearest-neighbor
//! search, and point-to-point ICP alignment.
//!
//! These are deliberately simple stand-ins for a production point-cloud
//! library (PCL's octree voxel filter, `KdTreeFLANN`, `GeneralizedICP`):
//! brute-force search is fine at keyframe-submap scale and keeps this
//! crate dependency-free beyond `nalgebra`.

mod cloud;
mod icp;
mod io;
mod neighbors;

pub use cloud::PointCloud;
pub use icp::{align, IcpConfig, IcpResult};
pub use io::{read_cloud, read_trajectory, write_cloud, write_trajectory, CloudIoError};
pub use neighbors::{KdTree3, NeighborIndex};

use nalgebra::Vector3;
use transforms::Transform3D;

/// Transform every point of `cloud` by `tf`, returning a new cloud.
///
/// A keyframe's cloud is stored in its own LiDAR frame and must be
/// transformed into world frame before it can be aggregated into a
/// submap or global map.
pub fn transform_cloud(cloud: &PointCloud, tf: &Transform3D) -> PointCloud {
    let points: Vec<Vector3<f64>> = cloud
        .points
        .iter()
        .map(|p| tf.transform_point(*p))
        .collect();
    PointCloud::from_points(points)
}

/// Concatenate clouds in order.
pub fn concat(clouds: impl IntoIterator<Item = PointCloud>) -> PointCloud {
    let mut out = PointCloud::new();
    for cloud in clouds {
        out.points.extend(cloud.points);
    }
    out
}
