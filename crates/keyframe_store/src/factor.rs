use transforms::Transform3D;
use types::VertexId;

/// Discriminant for [`Factor`]; declaration order doubles as the on-disk
/// `kind` code (`0..=3`) and the tie-break order in the factor priority
/// queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FactorKind {
    Prior = 0,
    Between = 1,
    Loop = 2,
    Gps = 3,
}

impl FactorKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Prior),
            1 => Some(Self::Between),
            2 => Some(Self::Loop),
            3 => Some(Self::Gps),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A pose-graph factor: `Prior`/`Gps` carry `from_id == to_id`;
/// `Between`/`Loop` constrain two distinct vertices.
///
/// `noise` holds variances (length 6 for pose factors, 3 for `Gps`); the
/// on-disk format stores standard deviations, so the codec in `fg.rs`
/// squares on read and square-roots on write.
#[derive(Debug, Clone)]
pub struct Factor {
    pub kind: FactorKind,
    pub from_id: VertexId,
    pub to_id: VertexId,
    pub value: Transform3D,
    pub noise: Vec<f64>,
}

impl Factor {
    /// `(max(from_id, to_id), min(from_id, to_id), kind)` ascending: a
    /// factor is eligible for replay exactly when both endpoints have
    /// been inserted as vertices with id `<=` the first element of this
    /// key.
    pub fn order_key(&self) -> (VertexId, VertexId, FactorKind) {
        let hi = self.from_id.max(self.to_id);
        let lo = self.from_id.min(self.to_id);
        (hi, lo, self.kind)
    }

    pub fn prior(id: VertexId, value: Transform3D, noise: Vec<f64>) -> Self {
        Self {
            kind: FactorKind::Prior,
            from_id: id,
            to_id: id,
            value,
            noise,
        }
    }

    pub fn between(from_id: VertexId, to_id: VertexId, value: Transform3D, noise: Vec<f64>) -> Self {
        Self {
            kind: FactorKind::Between,
            from_id,
            to_id,
            value,
            noise,
        }
    }

    pub fn loop_closure(from_id: VertexId, to_id: VertexId, value: Transform3D, noise: Vec<f64>) -> Self {
        Self {
            kind: FactorKind::Loop,
            from_id,
            to_id,
            value,
            noise,
        }
    }

    pub fn gps(id: VertexId, value: Transform3D, noise: Vec<f64>) -> Self {
        Self {
            kind: FactorKind::Gps,
            from_id: id,
            to_id: id,
            value,
            noise,
        }
    }

    /// Rebase both endpoints by `offset` (stitch-session ids on load).
    pub fn rebased(&self, offset: VertexId) -> Self {
        Self {
            kind: self.kind,
            from_id: self.from_id + offset,
            to_id: self.to_id + offset,
            value: self.value,
            noise: self.noise.clone(),
        }
    }
}
