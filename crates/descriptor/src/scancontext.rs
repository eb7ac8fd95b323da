use nalgebra::DMatrix;
use pointcloud::PointCloud;
use std::f64::consts::PI;

/// Ring/sector resolution and radius cutoff for [`make_descriptor`].
#[derive(Debug, Clone, Copy)]
pub struct ScanContextConfig {
    pub num_rings: usize,
    pub num_sectors: usize,
    pub max_radius: f64,
}

impl Default for ScanContextConfig {
    fn default() -> Self {
        Self {
            num_rings: 20,
            num_sectors: 60,
            max_radius: 80.0,
        }
    }
}

/// A single keyframe's place descriptor: a `rings x sectors` matrix of
/// max point height per polar bin, plus its ring-key (row means).
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub matrix: DMatrix<f64>,
    pub ring_key: Vec<f64>,
}

impl Descriptor {
    pub fn num_rings(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn num_sectors(&self) -> usize {
        self.matrix.ncols()
    }
}

/// Build the polar-histogram descriptor for a keyframe cloud.
///
/// Points beyond `config.max_radius` are dropped (matches the original
/// scan-context manager's `PC_MAX_RADIUS` cutoff). Each bin holds the
/// maximum point height seen in that ring/sector, a cheap proxy for
/// local structure that remains stable under modest viewpoint changes.
pub fn make_descriptor(cloud: &PointCloud, config: &ScanContextConfig) -> Descriptor {
    let mut matrix = DMatrix::from_element(config.num_rings, config.num_sectors, f64::MIN);

    for p in &cloud.points {
        let r = (p.x * p.x + p.y * p.y).sqrt();
        if r > config.max_radius {
            continue;
        }
        let mut theta = p.y.atan2(p.x);
        if theta < 0.0 {
            theta += 2.0 * PI;
        }

        let ring = ((r / config.max_radius) * config.num_rings as f64)
            .floor()
            .min((config.num_rings - 1) as f64)
            .max(0.0) as usize;
        let sector = ((theta / (2.0 * PI)) * config.num_sectors as f64)
            .floor()
            .min((config.num_sectors - 1) as f64)
            .max(0.0) as usize;

        if p.z > matrix[(ring, sector)] {
            matrix[(ring, sector)] = p.z;
        }
    }

    // Empty bins (no points fell in them) read as height 0, not f64::MIN.
    for v in matrix.iter_mut() {
        if *v == f64::MIN {
            *v = 0.0;
        }
    }

    let ring_key = (0..config.num_rings)
        .map(|r| matrix.row(r).mean())
        .collect();

    Descriptor { matrix, ring_key }
}

/// Minimum column-shift distance between two descriptors, and the shift
/// (in sectors) that achieves it.
///
/// Distance per shift is `1 - mean column cosine similarity`, skipping
/// columns where either side is all-zero (an empty sector pair carries
/// no information, matching the scan-context reference implementation's
/// handling of zero columns).
pub fn column_shift_distance(a: &Descriptor, b: &Descriptor) -> (f64, i32) {
    let num_sectors = a.num_sectors();
    debug_assert_eq!(num_sectors, b.num_sectors());
    debug_assert_eq!(a.num_rings(), b.num_rings());

    let mut best_dist = f64::INFINITY;
    let mut best_shift = 0i32;

    for shift in 0..num_sectors {
        let mut sim_sum = 0.0;
        let mut valid_cols = 0usize;

        for col in 0..num_sectors {
            let shifted_col = (col + shift) % num_sectors;
            let col_a = a.matrix.column(col);
            let col_b = b.matrix.column(shifted_col);

            let norm_a = col_a.norm();
            let norm_b = col_b.norm();
            if norm_a == 0.0 || norm_b == 0.0 {
                continue;
            }

            let cos_sim = col_a.dot(&col_b) / (norm_a * norm_b);
            sim_sum += cos_sim;
            valid_cols += 1;
        }

        if valid_cols == 0 {
            continue;
        }

        let dist = 1.0 - sim_sum / valid_cols as f64;
        if dist < best_dist {
            best_dist = dist;
            best_shift = shift as i32;
        }
    }

    if best_dist.is_infinite() {
        best_dist = 1.0;
    }

    (best_dist, best_shift)
}

/// Convert a column shift to a yaw offset in radians.
///
/// Shifting the candidate descriptor's columns right by `shift` sectors
/// corresponds to rotating the query's LiDAR frame left by the same
/// angle to align the two scans (the sign convention the original's
/// `detect_loop_by_scancontext` comment documents as "sc右移 <=> lidar左转").
pub fn yaw_offset_from_shift(shift: i32, num_sectors: usize) -> f64 {
    shift as f64 * (2.0 * PI / num_sectors as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn ring_of_points(n: usize, radius: f64, height: f64) -> PointCloud {
        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            let theta = i as f64 / n as f64 * 2.0 * PI;
            points.push(Vector3::new(radius * theta.cos(), radius * theta.sin(), height));
        }
        PointCloud::from_points(points)
    }

    #[test]
    fn identical_descriptors_have_zero_distance_at_shift_zero() {
        let config = ScanContextConfig::default();
        let cloud = ring_of_points(200, 10.0, 1.0);
        let a = make_descriptor(&cloud, &config);
        let b = make_descriptor(&cloud, &config);
        let (dist, shift) = column_shift_distance(&a, &b);
        assert_relative_eq!(dist, 0.0, epsilon = 1e-9);
        assert_eq!(shift, 0);
    }

    #[test]
    fn rotated_cloud_recovers_yaw_offset() {
        let config = ScanContextConfig::default();
        let cloud_a = ring_of_points(600, 10.0, 1.0);

        let rotation = PI / 6.0; // 30 degrees
        let cloud_b = PointCloud::from_points(
            cloud_a
                .points
                .iter()
                .map(|p| {
                    let x = p.x * rotation.cos() - p.y * rotation.sin();
                    let y = p.x * rotation.sin() + p.y * rotation.cos();
                    Vector3::new(x, y, p.z)
                })
                .collect(),
        );

        let a = make_descriptor(&cloud_a, &config);
        let b = make_descriptor(&cloud_b, &config);
        let (dist, shift) = column_shift_distance(&a, &b);
        assert!(dist < 0.05, "expected near-zero distance, got {dist}");

        let recovered = yaw_offset_from_shift(shift, config.num_sectors);
        // the 30 degree rotation should show up as a shift of ~ num_sectors/12
        let expected_sectors = (rotation / (2.0 * PI) * config.num_sectors as f64).round() as i32;
        let shift_diff = (shift - expected_sectors).abs().min(
            (shift - expected_sectors + config.num_sectors as i32).abs(),
        );
        assert!(shift_diff <= 1, "shift {shift} far from expected {expected_sectors}");
        assert!(recovered >= 0.0);
    }

    #[test]
    fn empty_cloud_yields_zero_matrix() {
        let config = ScanContextConfig::default();
        let descriptor = make_descriptor(&PointCloud::new(), &config);
        assert!(descriptor.matrix.iter().all(|&v| v == 0.0));
    }
}
