use crate::cloud::PointCloud;
use nalgebra::{Matrix3, Rotation3, Vector3};
use transforms::Transform3D;

/// Parameters for [`align`].
///
/// Names and defaults mirror `pcl::GeneralizedIterativeClosestPoint`'s
/// setters, since both the re-localizer and the loop aligner configure
/// this the same way the original's `perform_loop_closure` configures
/// its `gicp` object.
#[derive(Debug, Clone, Copy)]
pub struct IcpConfig {
    pub max_correspondence_distance: f64,
    pub max_iterations: usize,
    pub transformation_epsilon: f64,
    pub euclidean_fitness_epsilon: f64,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_correspondence_distance: 20.0,
            max_iterations: 100,
            transformation_epsilon: 1e-6,
            euclidean_fitness_epsilon: 1e-6,
        }
    }
}

/// Outcome of [`align`].
#[derive(Debug, Clone, Copy)]
pub struct IcpResult {
    pub transform: Transform3D,
    pub converged: bool,
    /// Mean squared correspondence distance at the final iterate, the
    /// same quantity `gicp.getFitnessScore()` returns in the original.
    pub fitness: f64,
    pub iterations: usize,
}

/// Point-to-point iterative closest point, with closed-form per-iteration
/// rigid alignment (Kabsch/SVD) in place of GICP's plane-to-plane
/// covariance weighting.
///
/// This is the one place in the workspace where the aligner knowingly
/// trades accuracy for simplicity: true generalized ICP needs per-point
/// covariance estimation from local surface normals,
/// which needs a kd-tree-backed neighborhood query tuned for that
/// purpose. Point-to-point ICP keeps the same interface (correspondence
/// distance cutoff, convergence epsilons, fitness-score acceptance) so
/// the loop-closure and re-localization call sites are unaffected; see
/// `DESIGN.md` for the tradeoff.
pub fn align(
    source: &PointCloud,
    target: &PointCloud,
    initial_guess: Transform3D,
    config: &IcpConfig,
) -> IcpResult {
    let mut current = initial_guess;

    if source.is_empty() || target.is_empty() {
        return IcpResult {
            transform: current,
            converged: false,
            fitness: f64::INFINITY,
            iterations: 0,
        };
    }

    let mut prev_fitness = f64::INFINITY;
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        let transformed: Vec<Vector3<f64>> = source
            .points
            .iter()
            .map(|p| current.transform_point(*p))
            .collect();

        let mut src_matches = Vec::with_capacity(transformed.len());
        let mut tgt_matches = Vec::with_capacity(transformed.len());
        let mut sq_dist_sum = 0.0;

        for (orig, moved) in source.points.iter().zip(transformed.iter()) {
            if let Some((best, dist)) = nearest(target, *moved) {
                if dist <= config.max_correspondence_distance {
                    src_matches.push(*orig);
                    tgt_matches.push(best);
                    sq_dist_sum += dist * dist;
                }
            }
        }

        if src_matches.len() < 3 {
            return IcpResult {
                transform: current,
                converged: false,
                fitness: f64::INFINITY,
                iterations,
            };
        }

        let fitness = sq_dist_sum / src_matches.len() as f64;
        let candidate = kabsch(&src_matches, &tgt_matches);

        let delta = current.inverse().compose(&candidate);
        let (dx, dy, dz) = (
            delta.translation().x,
            delta.translation().y,
            delta.translation().z,
        );
        let translation_step = (dx * dx + dy * dy + dz * dz).sqrt();
        let (r, p, y) = delta.rotation_rpy();
        let rotation_step = (r * r + p * p + y * y).sqrt();

        current = candidate;

        let fitness_delta = (prev_fitness - fitness).abs();
        prev_fitness = fitness;

        if translation_step < config.transformation_epsilon
            && rotation_step < config.transformation_epsilon
        {
            converged = true;
            break;
        }
        if fitness_delta < config.euclidean_fitness_epsilon && iter > 0 {
            converged = true;
            break;
        }
    }

    IcpResult {
        transform: current,
        converged,
        fitness: prev_fitness,
        iterations,
    }
}

fn nearest(cloud: &PointCloud, query: Vector3<f64>) -> Option<(Vector3<f64>, f64)> {
    cloud
        .points
        .iter()
        .map(|p| (*p, (p - query).norm()))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
}

/// Closed-form rigid transform minimizing `sum |R*src_i + t - tgt_i|^2`.
fn kabsch(src: &[Vector3<f64>], tgt: &[Vector3<f64>]) -> Transform3D {
    let n = src.len() as f64;
    let centroid_src: Vector3<f64> = src.iter().sum::<Vector3<f64>>() / n;
    let centroid_tgt: Vector3<f64> = tgt.iter().sum::<Vector3<f64>>() / n;

    let mut h = Matrix3::zeros();
    for (s, t) in src.iter().zip(tgt.iter()) {
        let ds = s - centroid_src;
        let dt = t - centroid_tgt;
        h += ds * dt.transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u.unwrap();
    let v_t = svd.v_t.unwrap();
    let mut r = v_t.transpose() * u.transpose();

    if r.determinant() < 0.0 {
        let mut v = v_t.transpose();
        for i in 0..3 {
            v[(i, 2)] = -v[(i, 2)];
        }
        r = v * u.transpose();
    }

    let rotation = Rotation3::from_matrix_unchecked(r);
    let translation = centroid_tgt - r * centroid_src;
    Transform3D::from_isometry(nalgebra::Isometry3::from_parts(
        translation.into(),
        nalgebra::UnitQuaternion::from_rotation_matrix(&rotation),
    ))
}
