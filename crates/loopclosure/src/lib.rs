//! Cross-session loop-closure discovery and constraint generation:
//! two independent detectors, a shared GICP-style aligner over locally
//! aggregated prior submaps, and the loop-record bookkeeping preserved
//! for visualization.

mod align;
mod window;

pub use align::{aggregate_submap, try_align};
pub use window::is_period_active;

use descriptor::{make_descriptor, DetectConfig, ScanContextConfig, ScanContextIndex};
use keyframe_store::{Factor, FactorKind};
use pointcloud::{KdTree3, NeighborIndex, PointCloud};
use std::collections::BTreeMap;
use transforms::Transform3D;
use types::VertexId;

/// The exhaustive set of recognized loop-closure configuration knobs.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub loop_closure_search_radius: f64,
    pub keyframe_search_num: usize,
    pub loop_closure_fitness_score_thld: f64,
    pub icp_downsamp_size: f64,
    pub loop_keyframe_num_thld: usize,
    pub sc_dist_thres: f64,
    pub odom_period: Vec<f64>,
    pub scancontext_period: Vec<f64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            loop_closure_search_radius: 10.0,
            keyframe_search_num: 20,
            loop_closure_fitness_score_thld: 0.05,
            icp_downsamp_size: 0.1,
            loop_keyframe_num_thld: 50,
            sc_dist_thres: 0.13,
            odom_period: Vec::new(),
            scancontext_period: Vec::new(),
        }
    }
}

impl LoopConfig {
    fn scancontext(&self) -> ScanContextConfig {
        ScanContextConfig::default()
    }

    fn detect(&self) -> DetectConfig {
        DetectConfig {
            min_candidates: self.loop_keyframe_num_thld,
            exclude_recent: 0,
            num_candidates: 10,
            dist_threshold: self.sc_dist_thres,
        }
    }
}

/// Three `id -> id` maps preserved across a run for later visualization:
/// loop edges already persisted from the prior session, loop edges
/// already persisted from the stitch session, and loops newly detected
/// this run.
#[derive(Debug, Clone, Default)]
pub struct LoopRecords {
    pub prior_internal: BTreeMap<VertexId, VertexId>,
    pub stitch_internal: BTreeMap<VertexId, VertexId>,
    pub newly_added: BTreeMap<VertexId, VertexId>,
}

impl LoopRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a loaded session's already-persisted `Loop` factors by
    /// which session they belong to (`offset == 0` is the prior).
    pub fn classify_loaded(&mut self, factors: &[Factor], offset: VertexId) {
        let target = if offset == 0 {
            &mut self.prior_internal
        } else {
            &mut self.stitch_internal
        };
        for f in factors.iter().filter(|f| f.kind == FactorKind::Loop) {
            target.insert(f.from_id, f.to_id);
        }
    }

    pub fn record_new(&mut self, from_id: VertexId, to_id: VertexId) {
        self.newly_added.insert(from_id, to_id);
    }
}

/// Everything a single stitch keyframe's loop scan needs that doesn't
/// change across keyframes within a run.
pub struct LoopContext<'a> {
    pub prior_tree: &'a KdTree3,
    pub prior_poses: &'a BTreeMap<VertexId, Transform3D>,
    pub prior_clouds: &'a [PointCloud],
    pub prior_index: &'a ScanContextIndex,
    pub config: &'a LoopConfig,
}

/// Scan one stitch keyframe against the prior session with both
/// detectors, returning up to two `Loop` factors.
pub fn scan_keyframe(
    stitch_id: VertexId,
    stitch_time: f64,
    stitch_pose: &Transform3D,
    stitch_cloud: &PointCloud,
    ctx: &LoopContext,
) -> Vec<Factor> {
    let mut factors = Vec::new();

    if is_period_active(&ctx.config.odom_period, stitch_time) {
        if let Some(candidate_id) = detect_by_radius(stitch_pose, ctx) {
            if let Some(factor) = try_align(
                stitch_id,
                stitch_cloud,
                stitch_pose,
                candidate_id,
                None,
                ctx.prior_clouds,
                ctx.prior_poses,
                ctx.config,
            ) {
                factors.push(factor);
            }
        }
    }

    if is_period_active(&ctx.config.scancontext_period, stitch_time) {
        if let Some((candidate_id, initial_guess)) = detect_by_descriptor(stitch_cloud, ctx) {
            if let Some(factor) = try_align(
                stitch_id,
                stitch_cloud,
                stitch_pose,
                candidate_id,
                Some(initial_guess),
                ctx.prior_clouds,
                ctx.prior_poses,
                ctx.config,
            ) {
                factors.push(factor);
            }
        }
    }

    factors
}

/// Detector 1: nearest prior pose within `loop_closure_search_radius`.
fn detect_by_radius(stitch_pose: &Transform3D, ctx: &LoopContext) -> Option<VertexId> {
    if ctx.prior_tree.is_empty() {
        return None;
    }
    let hits = ctx.prior_tree.radius_search(stitch_pose.translation(), ctx.config.loop_closure_search_radius);
    hits.first().map(|(local_id, _)| *local_id as VertexId)
}

/// Detector 2: nearest descriptor candidate, with an initial guess
/// composed from the candidate's pose and the recovered yaw offset.
fn detect_by_descriptor(stitch_cloud: &PointCloud, ctx: &LoopContext) -> Option<(VertexId, Transform3D)> {
    let descriptor = make_descriptor(stitch_cloud, &ctx.config.scancontext());
    let (candidate_id, yaw_offset) = ctx.prior_index.detect_closest(&descriptor, &ctx.config.detect())?;
    let candidate_pose = ctx.prior_poses.get(&candidate_id)?;
    let initial_guess = candidate_pose.compose(&Transform3D::new(0.0, 0.0, 0.0, 0.0, 0.0, yaw_offset));
    Some((candidate_id, initial_guess))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn flat_grid_cloud(n: usize, spacing: f64) -> PointCloud {
        let mut points = Vec::with_capacity(n * n);
        for x in 0..n {
            for y in 0..n {
                points.push(Vector3::new(x as f64 * spacing, y as f64 * spacing, 0.0));
            }
        }
        PointCloud::from_points(points)
    }

    #[test]
    fn radius_detector_finds_nearby_prior_pose() {
        let prior_poses: BTreeMap<VertexId, Transform3D> =
            (0..5).map(|id| (id, Transform3D::new(id as f64 * 2.0, 0.0, 0.0, 0.0, 0.0, 0.0))).collect();
        let tree = KdTree3::build(prior_poses.values().map(|tf| tf.translation()).collect());
        let prior_clouds = vec![flat_grid_cloud(40, 0.2); 5];
        let index = ScanContextIndex::new();
        let config = LoopConfig::default();

        let ctx = LoopContext {
            prior_tree: &tree,
            prior_poses: &prior_poses,
            prior_clouds: &prior_clouds,
            prior_index: &index,
            config: &config,
        };

        let stitch_pose = Transform3D::new(2.05, 0.0, 0.0, 0.0, 0.0, 0.0);
        let candidate = detect_by_radius(&stitch_pose, &ctx);
        assert_eq!(candidate, Some(1));
    }

    #[test]
    fn scan_keyframe_is_empty_with_no_prior_candidates() {
        let prior_poses = BTreeMap::new();
        let tree = KdTree3::build(Vec::new());
        let prior_clouds: Vec<PointCloud> = Vec::new();
        let index = ScanContextIndex::new();
        let config = LoopConfig::default();

        let ctx = LoopContext {
            prior_tree: &tree,
            prior_poses: &prior_poses,
            prior_clouds: &prior_clouds,
            prior_index: &index,
            config: &config,
        };

        let factors = scan_keyframe(100, 0.0, &Transform3D::identity(), &flat_grid_cloud(20, 0.2), &ctx);
        assert!(factors.is_empty());
    }
}
