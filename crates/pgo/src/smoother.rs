use keyframe_store::{Factor, FactorKind};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use transforms::Transform3D;
use types::VertexId;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("linear system was singular during relinearization")]
    SingularSystem,
}

/// Tunables for the Gauss-Newton pass inside each `update()`.
#[derive(Debug, Clone, Copy)]
pub struct SmootherConfig {
    pub max_iterations: usize,
    pub convergence_threshold: f64,
    pub damping: f64,
    pub gauge_fix_weight: f64,
    /// Extra relinearization passes run after a loop/GPS factor closes.
    pub extra_passes_after_loop: usize,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            convergence_threshold: 1e-4,
            damping: 1e-3,
            gauge_fix_weight: 1e10,
            extra_passes_after_loop: 5,
        }
    }
}

/// From-scratch Gauss-Newton SE(3) smoother standing in for a Bayes-tree
/// incremental solver: `update_with` accepts newly surfaced factors and
/// values, `update` re-linearizes the currently known variables in
/// place. Both return after a bounded number of Gauss-Newton iterations
/// (not a single linearization), following a damped-LU pose-graph solve
/// generalized from SE(2) to SE(3).
pub struct IncrementalSmoother {
    config: SmootherConfig,
    values: BTreeMap<VertexId, Transform3D>,
    factors: Vec<Factor>,
    bare_update_calls: usize,
}

impl IncrementalSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            values: BTreeMap::new(),
            factors: Vec::new(),
            bare_update_calls: 0,
        }
    }

    /// Insert newly eligible initial estimates and factors, then run one
    /// relinearization pass. Mirrors gtsam's `ISAM2::update(graph, values)`.
    pub fn update_with(
        &mut self,
        new_values: &BTreeMap<VertexId, Transform3D>,
        new_factors: &[Factor],
    ) -> Result<(), OptimizeError> {
        for (&id, &pose) in new_values {
            self.values.entry(id).or_insert(pose);
        }
        self.factors.extend_from_slice(new_factors);
        self.relinearize()
    }

    /// Re-linearize the currently known graph without adding anything
    /// new. Counted separately; the exact number of these bare calls
    /// is a testable property of a loop closing on the last vertex.
    pub fn update(&mut self) -> Result<(), OptimizeError> {
        self.bare_update_calls += 1;
        self.relinearize()
    }

    pub fn bare_update_calls(&self) -> usize {
        self.bare_update_calls
    }

    pub fn estimate(&self) -> &BTreeMap<VertexId, Transform3D> {
        &self.values
    }

    fn relinearize(&mut self) -> Result<(), OptimizeError> {
        if self.values.is_empty() {
            return Ok(());
        }

        let ids: Vec<VertexId> = self.values.keys().copied().collect();
        let index: BTreeMap<VertexId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        for iteration in 0..self.config.max_iterations {
            let (h, b) = self.build_linear_system(&index);

            let n = h.nrows();
            let mut h_damped = h;
            for i in 0..n {
                h_damped[(i, i)] += self.config.damping;
            }
            if let Some(&gauge_idx) = index.get(&0) {
                for k in 0..6 {
                    h_damped[(gauge_idx * 6 + k, gauge_idx * 6 + k)] += self.config.gauge_fix_weight;
                }
            }

            let dx = h_damped.lu().solve(&(-&b)).ok_or(OptimizeError::SingularSystem)?;
            let delta_norm = dx.norm();

            for (&id, &idx) in &index {
                let base = idx * 6;
                let delta = Transform3D::new(dx[base], dx[base + 1], dx[base + 2], dx[base + 3], dx[base + 4], dx[base + 5]);
                let updated = self.values[&id].compose(&delta);
                self.values.insert(id, updated);
            }

            if delta_norm < self.config.convergence_threshold {
                debug!(iterations = iteration + 1, "smoother relinearization converged");
                break;
            }
        }

        Ok(())
    }

    fn build_linear_system(&self, index: &BTreeMap<VertexId, usize>) -> (DMatrix<f64>, DVector<f64>) {
        let n = index.len() * 6;
        let mut h = DMatrix::<f64>::zeros(n, n);
        let mut b = DVector::<f64>::zeros(n);

        for factor in &self.factors {
            match factor.kind {
                FactorKind::Between | FactorKind::Loop => {
                    let (Some(&i), Some(&j)) = (index.get(&factor.from_id), index.get(&factor.to_id)) else {
                        continue;
                    };
                    let pose_i = self.values[&factor.from_id];
                    let pose_j = self.values[&factor.to_id];
                    let predicted = pose_i.between(&pose_j);
                    let residual = predicted.between(&factor.value);
                    let e = vector6_from_transform(&residual);
                    let omega = diagonal_information(&factor.noise, 6);
                    accumulate_pairwise(&mut h, &mut b, i, j, &e, &omega);
                }
                FactorKind::Prior => {
                    let Some(&i) = index.get(&factor.to_id) else { continue };
                    let pose = self.values[&factor.to_id];
                    let residual = pose.between(&factor.value);
                    let e = vector6_from_transform(&residual);
                    let omega = diagonal_information(&factor.noise, 6);
                    accumulate_unary(&mut h, &mut b, i, 0, &e, &omega);
                }
                FactorKind::Gps => {
                    let Some(&i) = index.get(&factor.to_id) else { continue };
                    let pose = self.values[&factor.to_id];
                    let diff = factor.value.translation() - pose.translation();
                    let e = DVector::from_column_slice(&[diff.x, diff.y, diff.z]);
                    let omega = diagonal_information(&factor.noise, 3);
                    accumulate_unary(&mut h, &mut b, i, 0, &e, &omega);
                }
            }
        }

        (h, b)
    }
}

fn vector6_from_transform(tf: &Transform3D) -> DVector<f64> {
    let t = tf.translation();
    let (roll, pitch, yaw) = tf.rotation_rpy();
    DVector::from_column_slice(&[t.x, t.y, t.z, roll, pitch, yaw])
}

fn diagonal_information(noise: &[f64], dims: usize) -> DMatrix<f64> {
    let mut m = DMatrix::<f64>::zeros(dims, dims);
    for k in 0..dims {
        let variance = noise.get(k).copied().unwrap_or(1.0).max(1e-9);
        m[(k, k)] = 1.0 / variance;
    }
    m
}

/// `J_i = -I`, `J_j = I` (small-error approximation, a common
/// linearization shortcut for pairwise pose constraints).
fn accumulate_pairwise(h: &mut DMatrix<f64>, b: &mut DVector<f64>, i: usize, j: usize, e: &DVector<f64>, omega: &DMatrix<f64>) {
    let dims = e.len();
    let ib = i * 6;
    let jb = j * 6;

    let h_ii = omega.clone();
    let h_ij = -omega.clone();
    let h_jj = omega.clone();

    add_block(h, ib, ib, &h_ii, dims);
    add_block(h, ib, jb, &h_ij, dims);
    add_block(h, jb, ib, &h_ij, dims);
    add_block(h, jb, jb, &h_jj, dims);

    let b_i = -(omega * e);
    let b_j = omega * e;
    add_vec(b, ib, &b_i);
    add_vec(b, jb, &b_j);
}

fn accumulate_unary(h: &mut DMatrix<f64>, b: &mut DVector<f64>, i: usize, offset: usize, e: &DVector<f64>, omega: &DMatrix<f64>) {
    let dims = e.len();
    let ib = i * 6 + offset;
    add_block(h, ib, ib, omega, dims);
    let b_i = -(omega * e);
    add_vec(b, ib, &b_i);
}

fn add_block(h: &mut DMatrix<f64>, row0: usize, col0: usize, block: &DMatrix<f64>, dims: usize) {
    for r in 0..dims {
        for c in 0..dims {
            h[(row0 + r, col0 + c)] += block[(r, c)];
        }
    }
}

fn add_vec(b: &mut DVector<f64>, row0: usize, v: &DVector<f64>) {
    for r in 0..v.len() {
        b[row0 + r] += v[r];
    }
}
