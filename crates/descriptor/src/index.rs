use crate::scancontext::{column_shift_distance, yaw_offset_from_shift, Descriptor};

/// Parameters for [`ScanContextIndex::detect_closest`].
#[derive(Debug, Clone, Copy)]
pub struct DetectConfig {
    /// Minimum index size before any candidate is returned
    /// (`loop_keyframe_num_thld`, default 50).
    pub min_candidates: usize,
    /// How many of the index's most-recently-added entries to exclude
    /// from the ring-key search. Cross-session stitching always passes
    /// 0 here (the whole prior index is eligible); a value > 0 recovers
    /// the intra-session "don't match yourself" guard the underlying
    /// scan-context manager also supports.
    pub exclude_recent: usize,
    /// How many ring-key nearest neighbors to check exactly via
    /// column-shift distance.
    pub num_candidates: usize,
    /// Acceptance threshold on column-shift distance (`SC_DIST_THRES`).
    pub dist_threshold: f64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            min_candidates: 50,
            exclude_recent: 0,
            num_candidates: 10,
            dist_threshold: 0.13,
        }
    }
}

/// Append-only index of keyframe descriptors, queryable by nearest
/// candidate under column-shift distance.
///
/// Ids are whatever the caller chooses (global or per-session); the
/// index itself only tracks insertion order for `exclude_recent`.
#[derive(Debug, Clone, Default)]
pub struct ScanContextIndex {
    ids: Vec<usize>,
    descriptors: Vec<Descriptor>,
}

impl ScanContextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: usize, descriptor: Descriptor) {
        self.ids.push(id);
        self.descriptors.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Descriptor> {
        self.descriptors.get(position)
    }

    /// Find the nearest candidate to `query`, returning its id and the
    /// yaw offset (radians) that rotates the query frame left to align
    /// with the candidate.
    ///
    /// Gates on index size, screens candidates in ring-key space, then
    /// refines with exact column-shift distance and accepts only below
    /// `dist_threshold`.
    pub fn detect_closest(&self, query: &Descriptor, config: &DetectConfig) -> Option<(usize, f64)> {
        let searchable = self.len().saturating_sub(config.exclude_recent);
        if searchable < config.min_candidates {
            tracing::debug!(searchable, min_candidates = config.min_candidates, "index too small, skipping detection");
            return None;
        }

        let mut by_ringkey: Vec<(usize, f64)> = (0..searchable)
            .map(|i| (i, ring_key_distance(&self.descriptors[i].ring_key, &query.ring_key)))
            .collect();
        by_ringkey.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        by_ringkey.truncate(config.num_candidates.max(1));

        let mut best: Option<(usize, f64, i32)> = None;
        for (position, _) in by_ringkey {
            let (dist, shift) = column_shift_distance(&self.descriptors[position], query);
            if best.map(|(_, best_dist, _)| dist < best_dist).unwrap_or(true) {
                best = Some((position, dist, shift));
            }
        }

        let (position, dist, shift) = best?;
        if dist >= config.dist_threshold {
            tracing::warn!(dist, threshold = config.dist_threshold, "best candidate exceeded distance threshold");
            return None;
        }

        let yaw_offset = yaw_offset_from_shift(shift, query.num_sectors());
        Some((self.ids[position], yaw_offset))
    }
}

fn ring_key_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}
