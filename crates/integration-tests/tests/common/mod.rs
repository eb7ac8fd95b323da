//! Shared test utilities for the map-stitching end-to-end scenario tests:
//! synthetic keyframe clouds and session directories built with the real
//! `keyframe_store`/`descriptor` crates rather than hand-rolled fixtures.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::path::Path;

use descriptor::{make_descriptor, ScanContextConfig};
use keyframe_store::{save, Factor, SaveRequest, SessionKeyframes};
use nalgebra::Vector3;
use pointcloud::PointCloud;
use transforms::Transform3D;
use types::{Pose6D, VertexId};

/// A keyframe cloud used for every synthetic keyframe that should
/// descriptor-match and ICP-align against the prior map: a dense,
/// rotationally-uniform disc (concentric rings at two heights) for bulk
/// point density, plus a single off-axis marker cluster that breaks the
/// disc's rotational symmetry. Without the marker, a uniform ring of
/// evenly-spaced points at constant height populates every scan-context
/// sector identically, leaving column-shift distance unable to prefer
/// one shift over another; the marker gives both the descriptor and
/// point-to-point ICP a genuine angular landmark to lock onto, the same
/// role a building facade or pole cluster plays in a real scan.
///
/// Dense enough to clear the loop aligner's target (>= 1000 points) and
/// source (>= 300 points) minimums.
pub fn disc_cloud() -> PointCloud {
    let radii = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
    let heights = [0.5, 1.5];
    let points_per_ring = 150;

    let mut points = Vec::with_capacity(radii.len() * heights.len() * points_per_ring + 80);
    for &r in &radii {
        for i in 0..points_per_ring {
            let theta = i as f64 / points_per_ring as f64 * TAU;
            let (x, y) = (r * theta.cos(), r * theta.sin());
            for &z in &heights {
                points.push(Vector3::new(x, y, z));
            }
        }
    }

    // Marker cluster: a compact, tall pillar at a fixed bearing
    // (theta = 0) and a radius well clear of the disc rings, so it
    // lands in a scan-context ring bin the disc never populates. That
    // keeps its signature from being diluted by the disc's own
    // (rotation-invariant) ring values.
    let marker_theta: f64 = 0.0;
    let marker_radius = 30.0;
    for i in 0..40 {
        let dx = (i % 5) as f64 * 0.05;
        let dz = (i / 5) as f64 * 0.3;
        let (x, y) = (marker_radius * marker_theta.cos() + dx, marker_radius * marker_theta.sin());
        points.push(Vector3::new(x, y, 5.0 + dz));
    }

    PointCloud::from_points(points)
}

/// A rotation of [`disc_cloud`]'s points by `angle` radians about `z`, in
/// the keyframe's own sensor frame. Used to synthesize a stitch session
/// recorded under a different heading convention than the prior.
pub fn rotated_disc_cloud(angle: f64) -> PointCloud {
    let (sin_a, cos_a) = angle.sin_cos();
    let points = disc_cloud()
        .points
        .iter()
        .map(|p| Vector3::new(p.x * cos_a - p.y * sin_a, p.x * sin_a + p.y * cos_a, p.z))
        .collect();
    PointCloud::from_points(points)
}

/// A handful of points nothing like [`disc_cloud`]: too few, too far
/// away, no angular structure at all. Guarantees both index-screening
/// (ring-key) and acceptance (column-shift distance) reject it.
pub fn foreign_cloud() -> PointCloud {
    PointCloud::from_points(vec![
        Vector3::new(500.0, 500.0, 5.0),
        Vector3::new(500.2, 500.1, 5.0),
        Vector3::new(499.8, 499.9, 5.2),
        Vector3::new(500.1, 499.7, 4.8),
        Vector3::new(499.9, 500.3, 5.1),
    ])
}

/// `n` keyframe poses on a straight line along `+x`, `spacing` meters
/// apart and one second apart, starting at `(x0, y0, 0)`.
pub fn straight_line_poses(n: usize, spacing: f64, x0: f64, y0: f64) -> Vec<Pose6D> {
    (0..n)
        .map(|i| {
            Pose6D::new(x0 + i as f64 * spacing, y0, 0.0, 0.0, 0.0, 0.0)
                .with_time(i as f64)
                .with_intensity(i as f64)
        })
        .collect()
}

/// A `Prior(0) + Between(i-1, i)` odometry chain matching `poses` exactly
/// (zero residual at the recorded poses), with a small fixed noise.
pub fn odometry_chain(poses: &[Pose6D]) -> Vec<Factor> {
    let mut factors = vec![Factor::prior(0, Transform3D::from_pose(&poses[0]), vec![1e-6; 6])];
    for i in 1..poses.len() {
        let a = Transform3D::from_pose(&poses[i - 1]);
        let b = Transform3D::from_pose(&poses[i]);
        factors.push(Factor::between(i - 1, i, a.between(&b), vec![1e-4; 6]));
    }
    factors
}

/// Write a complete session directory (`trajectory.pcd`, `keyframe/`,
/// `scancontext/`, `factor_graph.fg`) given poses, a per-keyframe cloud
/// generator, and a factor list already in the session's own local id
/// space (`0..poses.len()`).
pub fn write_session(dir: &Path, poses: &[Pose6D], cloud_for: impl Fn(usize) -> PointCloud, factors: &[Factor]) {
    let sc_config = ScanContextConfig::default();
    let clouds: Vec<PointCloud> = (0..poses.len()).map(&cloud_for).collect();
    let descriptors = clouds.iter().map(|c| make_descriptor(c, &sc_config)).collect();
    let keyframes = SessionKeyframes {
        poses: poses.to_vec(),
        clouds,
        descriptors,
    };
    let vertices: BTreeMap<VertexId, Transform3D> = poses
        .iter()
        .enumerate()
        .map(|(id, pose)| (id as VertexId, Transform3D::from_pose(pose)))
        .collect();
    let request = SaveRequest {
        keyframes: &keyframes,
        vertices: &vertices,
        factors,
        save_globalmap: false,
        save_resolution: 0.1,
    };
    save(dir, &request).expect("failed to write synthetic session");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disc_cloud_clears_loop_aligner_minimums() {
        assert!(disc_cloud().len() >= 1000);
        assert!(foreign_cloud().len() < 300);
    }
}
