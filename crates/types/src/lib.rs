//! Shared pose and identifier types for the map-stitching core.

use serde::{Deserialize, Serialize};

/// Dense, non-negative vertex id in the merged (prior + stitch) id space.
///
/// The prior session occupies `[0, Np)`; the stitch session occupies
/// `[Np, Np+Ns)`. Rebasing a stitch-local id is just `local_id + Np`.
pub type VertexId = usize;

/// A 6-DoF keyframe pose, with the overloaded `intensity` field used
/// downstream for KD-tree/id bookkeeping (see [`Pose6D::intensity`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose6D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    /// Seconds since session start.
    pub time: f64,
    /// Carries this pose's id for KD-tree bookkeeping. Not a measurement.
    pub intensity: f64,
}

impl Default for Pose6D {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            time: 0.0,
            intensity: 0.0,
        }
    }
}

impl Pose6D {
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            x,
            y,
            z,
            roll,
            pitch,
            yaw,
            ..Default::default()
        }
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    /// Translation component as `(x, y, z)`.
    pub fn translation(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Rotation component as `(roll, pitch, yaw)`.
    pub fn rotation(&self) -> (f64, f64, f64) {
        (self.roll, self.pitch, self.yaw)
    }
}

/// Which session a keyframe belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Session {
    Prior,
    Stitch,
}

/// Normalize an angle to `(-PI, PI]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle;
    while a > std::f64::consts::PI {
        a -= 2.0 * std::f64::consts::PI;
    }
    while a <= -std::f64::consts::PI {
        a += 2.0 * std::f64::consts::PI;
    }
    a
}
