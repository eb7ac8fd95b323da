use std::collections::BTreeMap;
use std::path::Path;

use descriptor::ScanContextIndex;
use keyframe_store::{load_prior, load_stitch, save, Factor, SaveRequest, SessionKeyframes};
use loopclosure::{scan_keyframe, LoopContext, LoopRecords};
use pgo::replay;
use pointcloud::{concat, transform_cloud, KdTree3, PointCloud};
use tracing::{info, warn};
use transforms::Transform3D;
use types::{Pose6D, VertexId};

use crate::config::StitchConfig;
use crate::error::{LoopError, StitchError};

/// Outcome of a successful stitching run: the merged trajectory (prior
/// keyframes followed by stitch keyframes, in the shared id space) and
/// the loop-record maps carried forward for visualization.
pub struct StitchOutcome {
    pub merged: SessionKeyframes,
    pub records: LoopRecords,
    pub np: VertexId,
    pub ns: VertexId,
}

/// An owned run context for a single stitching invocation. Construct with [`StitchRun::new`] and consume with
/// [`StitchRun::run`].
pub struct StitchRun {
    config: StitchConfig,
}

impl StitchRun {
    pub fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    /// Run the full data flow: load prior (keyframe store +
    /// descriptor index + factor graph) → ingest stitch session →
    /// re-localize the first feasible stitch keyframe → rewrite stitch
    /// poses into the prior frame → scan every stitch keyframe for loops
    /// → add loop factors → replay all factors into the optimizer in
    /// global-id order → persist.
    pub fn run(&self, prior_dir: &Path, stitch_dir: &Path, out_dir: &Path) -> Result<StitchOutcome, StitchError> {
        let prior = load_prior(prior_dir)?;
        let np = prior.keyframes.len() as VertexId;
        info!(np, "loaded prior session");

        let stitch = load_stitch(stitch_dir, np)?;
        let ns = stitch.keyframes.len() as VertexId;
        info!(ns, "loaded stitch session");

        let mut prior_index = ScanContextIndex::new();
        for (id, descriptor) in prior.keyframes.descriptors.iter().enumerate() {
            prior_index.push(id, descriptor.clone());
        }

        let prior_poses: BTreeMap<VertexId, Transform3D> = prior.vertices.clone();
        let prior_map = build_prior_map(&prior.keyframes.clouds, &prior_poses);

        // 1. re-localize the first recoverable stitch keyframe.
        let (j0, reloc_pose) =
            relocalize_first_feasible(&stitch.keyframes.clouds, &prior_index, &prior_poses, &prior_map, &self.config)?;
        info!(j0, "re-localized first feasible stitch keyframe");

        // 2. rewrite every stitch pose into the prior frame.
        let pose_ref = Transform3D::from_pose(&stitch.keyframes.poses[j0]);
        let rigid_offset = reloc_pose.compose(&pose_ref.inverse());

        let mut stitch_poses = stitch.keyframes.poses.clone();
        let mut stitch_estimates: BTreeMap<VertexId, Transform3D> = BTreeMap::new();
        for (k, pose) in stitch_poses.iter_mut().enumerate() {
            let original = Transform3D::from_pose(pose);
            let rewritten = rigid_offset.compose(&original);
            *pose = rewritten.to_pose(pose.time, pose.intensity);
            stitch_estimates.insert(np + k as VertexId, rewritten);
        }

        // 3. scan every stitch keyframe from j0 onward for cross-session loops.
        // the original's `run_loop` loop starts at the re-localization index
        // for the same reason pre-alignment does: the keyframes before it
        // never got a usable pose to search from.
        let prior_tree = KdTree3::build(prior_poses.values().map(|tf| tf.translation()).collect());
        let loop_config = self.config.loopclosure();
        let ctx = LoopContext {
            prior_tree: &prior_tree,
            prior_poses: &prior_poses,
            prior_clouds: &prior.keyframes.clouds,
            prior_index: &prior_index,
            config: &loop_config,
        };

        let mut records = LoopRecords::new();
        records.classify_loaded(&prior.factors, 0);
        records.classify_loaded(&stitch.factors, np);

        let mut loop_factors = Vec::new();
        for k in j0..stitch.keyframes.len() {
            let global_id = np + k as VertexId;
            let pose = stitch_estimates[&global_id];
            let found = scan_keyframe(global_id, stitch_poses[k].time, &pose, &stitch.keyframes.clouds[k], &ctx);
            for factor in found {
                records.record_new(factor.from_id, factor.to_id);
                loop_factors.push(factor);
            }
        }

        check_loop_outcome(&loop_factors)?;

        // 4. replay all factors into the optimizer in ascending global-id
        // order.
        let mut initial_estimates = prior_poses.clone();
        initial_estimates.extend(stitch_estimates);

        let mut factors: Vec<Factor> = Vec::with_capacity(prior.factors.len() + stitch.factors.len() + loop_factors.len());
        factors.extend(prior.factors.iter().cloned());
        factors.extend(stitch.factors.iter().cloned());
        factors.extend(loop_factors);

        let smoother = replay(&initial_estimates, factors.clone(), np, self.config.smoother())?;
        let optimized = smoother.estimate();

        // 5. split optimized poses back into the merged trajectory, keeping
        // `time` and renumbering `intensity` to the global id.
        let mut merged_poses = Vec::with_capacity((np + ns) as usize);
        for (id, pose) in prior.keyframes.poses.iter().enumerate() {
            let tf = optimized.get(&(id as VertexId)).copied().unwrap_or_else(|| Transform3D::from_pose(pose));
            merged_poses.push(tf.to_pose(pose.time, id as f64));
        }
        for (k, pose) in stitch_poses.iter().enumerate() {
            let global_id = np + k as VertexId;
            let tf = optimized.get(&global_id).copied().unwrap_or_else(|| Transform3D::from_pose(pose));
            merged_poses.push(tf.to_pose(pose.time, k as f64));
        }

        let mut merged_clouds = prior.keyframes.clouds.clone();
        merged_clouds.extend(stitch.keyframes.clouds.clone());
        let mut merged_descriptors = prior.keyframes.descriptors.clone();
        merged_descriptors.extend(stitch.keyframes.descriptors.clone());

        let merged = SessionKeyframes {
            poses: merged_poses,
            clouds: merged_clouds,
            descriptors: merged_descriptors,
        };

        let merged_vertices: BTreeMap<VertexId, Transform3D> = optimized.clone();
        let request = SaveRequest {
            keyframes: &merged,
            vertices: &merged_vertices,
            factors: &factors,
            save_globalmap: self.config.save_globalmap_en,
            save_resolution: self.config.save_resolution,
        };
        save(out_dir, &request)?;
        info!(vertices = merged_vertices.len(), edges = factors.len(), "stitching run complete");

        Ok(StitchOutcome { merged, records, np, ns })
    }
}

fn build_prior_map(clouds: &[PointCloud], poses: &BTreeMap<VertexId, Transform3D>) -> PointCloud {
    let world_clouds = clouds
        .iter()
        .enumerate()
        .filter_map(|(id, cloud)| poses.get(&(id as VertexId)).map(|tf| transform_cloud(cloud, tf)));
    concat(world_clouds).voxel_downsample(0.3)
}

/// Try every stitch keyframe in order until one re-localizes against the
/// prior map; the caller retries on the next keyframe on any failure.
/// The first success fixes the single rigid transform applied to the
/// whole stitch trajectory.
fn relocalize_first_feasible(
    stitch_clouds: &[PointCloud],
    prior_index: &ScanContextIndex,
    prior_poses: &BTreeMap<VertexId, Transform3D>,
    prior_map: &PointCloud,
    config: &StitchConfig,
) -> Result<(usize, Transform3D), StitchError> {
    let reloc_config = config.relocalize();
    let mut last_err = relocalize::RelocalizeError::NoCandidate;

    for (k, cloud) in stitch_clouds.iter().enumerate() {
        match relocalize::run(cloud, prior_index, prior_poses, prior_map, None, config.relocalize_timeout_ms, &reloc_config) {
            Ok(pose) => return Ok((k, pose)),
            Err(err) => {
                warn!(keyframe = k, error = %err, "re-localization attempt failed, trying next keyframe");
                last_err = err;
            }
        }
    }

    Err(StitchError::Relocalize(last_err))
}

fn check_loop_outcome(loop_factors: &[Factor]) -> Result<(), LoopError> {
    if loop_factors.is_empty() {
        return Err(LoopError::NoLoopsFound);
    }
    if loop_factors.len() < 2 {
        warn!("loop constraint count less than 2");
        return Ok(());
    }
    let min_id = loop_factors.iter().map(|f| f.from_id).min().unwrap();
    let max_id = loop_factors.iter().map(|f| f.from_id).max().unwrap();
    if max_id - min_id < 10 {
        warn!("all detected loops are clustered within 10 keyframes of each other");
    }
    Ok(())
}

/// Exposed for test scenarios that only want the timestamp-stamped
/// re-written pose without running a whole stitching job.
pub fn rewrite_pose(pose: &Pose6D, rigid_offset: &Transform3D) -> Pose6D {
    let rewritten = rigid_offset.compose(&Transform3D::from_pose(pose));
    rewritten.to_pose(pose.time, pose.intensity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyframe_store::Factor;

    #[test]
    fn empty_loop_factors_is_no_loops_found() {
        let err = check_loop_outcome(&[]).unwrap_err();
        assert!(matches!(err, LoopError::NoLoopsFound));
    }

    #[test]
    fn single_loop_factor_is_ok_but_warns() {
        assert!(check_loop_outcome(&[Factor::loop_closure(10, 0, Transform3D::identity(), vec![0.01; 6])]).is_ok());
    }

    #[test]
    fn clustered_loops_within_ten_keyframes_is_ok() {
        let factors = vec![
            Factor::loop_closure(100, 0, Transform3D::identity(), vec![0.01; 6]),
            Factor::loop_closure(105, 1, Transform3D::identity(), vec![0.01; 6]),
        ];
        assert!(check_loop_outcome(&factors).is_ok());
    }

    #[test]
    fn rewrite_pose_applies_rigid_offset() {
        let pose = Pose6D::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0).with_time(1.0).with_intensity(0.0);
        let offset = Transform3D::new(5.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let rewritten = rewrite_pose(&pose, &offset);
        assert!((rewritten.x - 6.0).abs() < 1e-9);
        assert_eq!(rewritten.time, 1.0);
    }
}
