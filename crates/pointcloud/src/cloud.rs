use nalgebra::Vector3;
use std::collections::HashMap;

/// A keyframe point cloud in its own sensor frame.
///
/// Points are stored as `f64` triples rather than PCL's `PointXYZI`;
/// the `intensity` channel the original carries per-point is not needed
/// here (keyframe identity lives on [`types::Pose6D::intensity`], not on
/// individual points).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Vector3<f64>>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Vector3<f64>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Voxel-grid downsample: average the points falling in each
    /// `leaf_size`-sided cube, one output point per occupied cell.
    ///
    /// Stands in for `octreeDownsampling` in the original; a hash-grid
    /// mean filter rather than a full octree, since we only need
    /// "one representative point per cell", not octree traversal.
    pub fn voxel_downsample(&self, leaf_size: f64) -> PointCloud {
        if self.points.is_empty() || leaf_size <= 0.0 {
            return self.clone();
        }

        let mut cells: HashMap<(i64, i64, i64), (Vector3<f64>, usize)> = HashMap::new();
        for p in &self.points {
            let key = (
                (p.x / leaf_size).floor() as i64,
                (p.y / leaf_size).floor() as i64,
                (p.z / leaf_size).floor() as i64,
            );
            let entry = cells.entry(key).or_insert((Vector3::zeros(), 0));
            entry.0 += p;
            entry.1 += 1;
        }

        let points = cells
            .into_values()
            .map(|(sum, count)| sum / count as f64)
            .collect();
        PointCloud::from_points(points)
    }
}
