use nalgebra::Vector3;

/// Common interface for the two neighbor-search needs in this workspace:
/// radius search over prior poses (loop detector 1) and nearest-K search
/// over descriptor ring-keys (place-descriptor index).
pub trait NeighborIndex {
    fn radius_search(&self, query: Vector3<f64>, radius: f64) -> Vec<(usize, f64)>;
    fn nearest_k(&self, query: Vector3<f64>, k: usize) -> Vec<(usize, f64)>;
}

/// Brute-force stand-in for `pcl::KdTreeFLANN`.
///
/// The original rebuilds this tree lazily once per stitching run over the
/// (read-only, for the run's duration) prior poses; at the scale of a
/// single prior session (thousands, not millions, of keyframes) brute
/// force is well within budget and keeps this crate free of an external
/// spatial-index dependency.
#[derive(Debug, Clone, Default)]
pub struct KdTree3 {
    points: Vec<Vector3<f64>>,
}

impl KdTree3 {
    pub fn build(points: Vec<Vector3<f64>>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

impl NeighborIndex for KdTree3 {
    /// All points within `radius` of `query`, ordered nearest-first (so
    /// "pick the first" in the caller matches "pick the nearest").
    fn radius_search(&self, query: Vector3<f64>, radius: f64) -> Vec<(usize, f64)> {
        let mut hits: Vec<(usize, f64)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, (p - query).norm()))
            .filter(|(_, d)| *d <= radius)
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        hits
    }

    fn nearest_k(&self, query: Vector3<f64>, k: usize) -> Vec<(usize, f64)> {
        let mut all: Vec<(usize, f64)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, (p - query).norm()))
            .collect();
        all.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        all.truncate(k);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_search_orders_nearest_first() {
        let tree = KdTree3::build(vec![
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(5.0, 0.0, 0.0),
        ]);
        let hits = tree.radius_search(Vector3::zeros(), 6.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
    }

    #[test]
    fn nearest_k_truncates() {
        let tree = KdTree3::build(vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(3.0, 0.0, 0.0),
        ]);
        let hits = tree.nearest_k(Vector3::zeros(), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
    }
}
