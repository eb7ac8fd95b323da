use crate::factor::{Factor, FactorKind};
use crate::fg::{read_factor_graph, write_factor_graph, FgError};
use crate::scd::{read_scd, write_scd};
use descriptor::Descriptor;
use pointcloud::{concat, read_cloud, read_trajectory, transform_cloud, write_cloud, write_trajectory, CloudIoError, PointCloud};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use transforms::Transform3D;
use types::{Pose6D, VertexId};

/// Width of the zero-padded keyframe id used in `keyframe/` and
/// `scancontext/` file names.
pub const CURRENT_NUM_DIGITS: usize = 6;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("trajectory.pcd has fewer than 10 poses")]
    TrajectoryMissing,
    #[error("descriptor directory is missing")]
    DescriptorMissing,
    #[error("descriptor count does not match pose count")]
    Mismatch,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Cloud(#[from] CloudIoError),
    #[error(transparent)]
    Fg(#[from] FgError),
}

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Cloud(#[from] CloudIoError),
    #[error(transparent)]
    Fg(#[from] FgError),
}

/// A session's keyframe sequence: one pose, cloud, and descriptor per
/// keyframe, indexed by local (session-relative) id.
#[derive(Debug, Clone, Default)]
pub struct SessionKeyframes {
    pub poses: Vec<Pose6D>,
    pub clouds: Vec<PointCloud>,
    pub descriptors: Vec<Descriptor>,
}

impl SessionKeyframes {
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

/// Everything `load_prior`/`load_stitch` recovers from a session
/// directory: the keyframe sequence plus the merged-id-space vertex and
/// factor data needed to feed the optimizer.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub keyframes: SessionKeyframes,
    pub vertices: BTreeMap<VertexId, Transform3D>,
    pub factors: Vec<Factor>,
}

pub struct SaveRequest<'a> {
    pub keyframes: &'a SessionKeyframes,
    pub vertices: &'a BTreeMap<VertexId, Transform3D>,
    pub factors: &'a [Factor],
    pub save_globalmap: bool,
    pub save_resolution: f64,
}

fn keyframe_path(dir: &Path, id: usize) -> PathBuf {
    dir.join("keyframe").join(format!("{:0width$}.pcd", id, width = CURRENT_NUM_DIGITS))
}

fn descriptor_path(dir: &Path, id: usize) -> PathBuf {
    dir.join("scancontext").join(format!("{:0width$}.scd", id, width = CURRENT_NUM_DIGITS))
}

fn load_keyframes(dir: &Path) -> Result<SessionKeyframes, LoadError> {
    let poses = read_trajectory(&dir.join("trajectory.pcd"))?;
    if poses.len() < 10 {
        return Err(LoadError::TrajectoryMissing);
    }
    warn!(poses = poses.len(), "load trajectory poses successfully");
    if !dir.join("scancontext").is_dir() {
        return Err(LoadError::DescriptorMissing);
    }

    let mut clouds = Vec::with_capacity(poses.len());
    let mut descriptors = Vec::with_capacity(poses.len());
    for id in 0..poses.len() {
        clouds.push(read_cloud(&keyframe_path(dir, id))?);
        descriptors.push(read_scd(&descriptor_path(dir, id))?);
    }
    if descriptors.len() != poses.len() {
        return Err(LoadError::Mismatch);
    }
    warn!(descriptors = descriptors.len(), "load keyframe descriptors successfully");

    Ok(SessionKeyframes { poses, clouds, descriptors })
}

/// Load the prior session: vertex ids and factors are used as-is, since
/// the prior occupies `[0, Np)` of the merged id space.
pub fn load_prior(dir: &Path) -> Result<LoadedSession, LoadError> {
    let keyframes = load_keyframes(dir)?;
    let (vertices, factors) = read_factor_graph(&dir.join("factor_graph.fg"))?;
    warn!(vertices = vertices.len(), factors = factors.len(), "load prior factor graph successfully");
    info!(dir = %dir.display(), "prior map load finished");
    Ok(LoadedSession { keyframes, vertices, factors })
}

/// Load the stitch session, rebasing every vertex id and factor
/// endpoint by `offset` (`Np`, the prior session's vertex count).
///
/// The stitch session's own `Prior` factor anchors its first keyframe to
/// its local origin; once merged into the shared frame that anchor would
/// double-constrain the optimizer against the re-localized pose computed
/// in `§4.5`, so it's dropped here rather than rebased.
pub fn load_stitch(dir: &Path, offset: VertexId) -> Result<LoadedSession, LoadError> {
    let keyframes = load_keyframes(dir)?;
    let (fg_vertices, fg_factors) = read_factor_graph(&dir.join("factor_graph.fg"))?;
    warn!(vertices = fg_vertices.len(), factors = fg_factors.len(), offset, "load stitch factor graph successfully");

    let vertices = fg_vertices.into_iter().map(|(id, tf)| (id + offset, tf)).collect();
    let factors = fg_factors
        .into_iter()
        .filter(|f| f.kind != FactorKind::Prior)
        .map(|f| f.rebased(offset))
        .collect();

    info!(dir = %dir.display(), "stitch session load finished");
    Ok(LoadedSession { keyframes, vertices, factors })
}

/// Persist a session's keyframes, optimized vertices, and factor graph,
/// and optionally a merged global map at `save_resolution`.
pub fn save(dir: &Path, request: &SaveRequest) -> Result<(), SaveError> {
    fs::create_dir_all(dir.join("keyframe"))?;
    fs::create_dir_all(dir.join("scancontext"))?;

    write_trajectory(&dir.join("trajectory.pcd"), &request.keyframes.poses)?;
    for (id, cloud) in request.keyframes.clouds.iter().enumerate() {
        write_cloud(&keyframe_path(dir, id), cloud)?;
    }
    for (id, descriptor) in request.keyframes.descriptors.iter().enumerate() {
        write_scd(&descriptor_path(dir, id), descriptor)?;
    }
    write_factor_graph(&dir.join("factor_graph.fg"), request.vertices, request.factors)?;

    if request.save_globalmap {
        let world_clouds = request
            .keyframes
            .clouds
            .iter()
            .enumerate()
            .filter_map(|(id, cloud)| request.vertices.get(&id).map(|tf| transform_cloud(cloud, tf)));
        let merged = concat(world_clouds).voxel_downsample(request.save_resolution);
        write_cloud(&dir.join("globalmap.pcd"), &merged)?;
    }

    warn!(path = %dir.display(), "success save results");
    Ok(())
}
