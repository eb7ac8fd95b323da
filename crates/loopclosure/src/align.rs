use crate::LoopConfig;
use keyframe_store::Factor;
use pointcloud::{align, concat, transform_cloud, IcpConfig, PointCloud};
use std::collections::BTreeMap;
use transforms::Transform3D;
use types::VertexId;

/// Build the local target submap: `2*keyframe_search_num + 1` prior
/// keyframes centered on `center`, transformed into world frame and
/// voxel-downsampled at `icp_downsamp_size`.
pub fn aggregate_submap(
    prior_clouds: &[PointCloud],
    prior_poses: &BTreeMap<VertexId, Transform3D>,
    center: VertexId,
    half_window: usize,
    voxel_size: f64,
) -> PointCloud {
    if prior_clouds.is_empty() {
        return PointCloud::new();
    }
    let lo = center.saturating_sub(half_window);
    let hi = (center + half_window).min(prior_clouds.len() - 1);

    let world_clouds = (lo..=hi).filter_map(|id| {
        prior_poses
            .get(&id)
            .map(|tf| transform_cloud(&prior_clouds[id], tf))
    });
    concat(world_clouds).voxel_downsample(voxel_size)
}

/// Validate a loop candidate via point-to-point ICP against a locally
/// aggregated submap, and on acceptance build the `Loop` factor.
///
/// `initial_guess` seeds the refinement; when absent (Detector 1, which
/// carries no yaw hypothesis) the stitch keyframe's own pre-aligned pose
/// is used as the seed.
pub fn try_align(
    stitch_id: VertexId,
    stitch_cloud: &PointCloud,
    stitch_pose: &Transform3D,
    candidate_prior_id: VertexId,
    initial_guess: Option<Transform3D>,
    prior_clouds: &[PointCloud],
    prior_poses: &BTreeMap<VertexId, Transform3D>,
    config: &LoopConfig,
) -> Option<Factor> {
    let target = aggregate_submap(
        prior_clouds,
        prior_poses,
        candidate_prior_id,
        config.keyframe_search_num,
        config.icp_downsamp_size,
    );

    if target.len() < 1000 || stitch_cloud.len() < 300 {
        return None;
    }

    let icp_config = IcpConfig {
        max_correspondence_distance: 2.0 * config.loop_closure_search_radius,
        max_iterations: 100,
        transformation_epsilon: 1e-6,
        euclidean_fitness_epsilon: 1e-6,
    };

    let seed = initial_guess.unwrap_or(*stitch_pose);
    let result = align(stitch_cloud, &target, seed, &icp_config);

    if !result.converged || result.fitness > config.loop_closure_fitness_score_thld {
        return None;
    }

    let prior_pose = prior_poses.get(&candidate_prior_id)?;
    let value = result.transform.between(prior_pose);
    let noise = vec![result.fitness; 6];

    Some(Factor::loop_closure(stitch_id, candidate_prior_id, value, noise))
}
