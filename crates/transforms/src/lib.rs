//! Rigid 3-D pose transforms for the map-stitching core.
//!
//! Every keyframe pose, odometry edge, loop-closure correction, and
//! re-localization result is a rigid transform between two frames: the
//! stitch session's own trajectory frame, the prior map's world frame, and
//! individual keyframe LiDAR frames. This module provides one type,
//! [`Transform3D`], to represent all of them, following the same
//! thin-wrapper-over-`nalgebra` shape as the 2-D `Transform2D` it replaces.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use types::Pose6D;

/// A 3-D rigid body transform (translation + rotation).
///
/// Roll/pitch/yaw follow `nalgebra::Rotation3::from_euler_angles`'s
/// convention: `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
#[derive(Debug, Clone, Copy)]
pub struct Transform3D {
    inner: Isometry3<f64>,
}

impl Transform3D {
    /// Create the identity transform.
    pub fn identity() -> Self {
        Self {
            inner: Isometry3::identity(),
        }
    }

    /// Create a transform from translation and roll/pitch/yaw (radians).
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        let rotation = UnitQuaternion::from_euler_angles(roll, pitch, yaw);
        Self {
            inner: Isometry3::from_parts(Translation3::new(x, y, z), rotation),
        }
    }

    /// Create from a [`Pose6D`] (time/intensity are ignored).
    pub fn from_pose(pose: &Pose6D) -> Self {
        Self::new(pose.x, pose.y, pose.z, pose.roll, pose.pitch, pose.yaw)
    }

    /// Convert to a [`Pose6D`], carrying over `time`/`intensity` from a
    /// reference pose (they are not part of the rigid transform itself).
    pub fn to_pose(&self, time: f64, intensity: f64) -> Pose6D {
        let (roll, pitch, yaw) = self.inner.rotation.euler_angles();
        Pose6D {
            x: self.inner.translation.x,
            y: self.inner.translation.y,
            z: self.inner.translation.z,
            roll,
            pitch,
            yaw,
            time,
            intensity,
        }
    }

    /// Get the underlying `nalgebra::Isometry3`.
    pub fn as_isometry(&self) -> &Isometry3<f64> {
        &self.inner
    }

    /// Create from a `nalgebra::Isometry3`.
    pub fn from_isometry(inner: Isometry3<f64>) -> Self {
        Self { inner }
    }

    /// Translation component.
    pub fn translation(&self) -> Vector3<f64> {
        self.inner.translation.vector
    }

    /// Roll/pitch/yaw in radians.
    pub fn rotation_rpy(&self) -> (f64, f64, f64) {
        self.inner.rotation.euler_angles()
    }

    /// Compute the inverse transform.
    pub fn inverse(&self) -> Self {
        Self {
            inner: self.inner.inverse(),
        }
    }

    /// Compose transforms: `self * other`. If `self` is A->B and `other` is
    /// B->C, the result is A->C.
    pub fn compose(&self, other: &Transform3D) -> Transform3D {
        Transform3D {
            inner: self.inner * other.inner,
        }
    }

    /// Transform a point from this transform's child frame to its parent frame.
    pub fn transform_point(&self, point: Vector3<f64>) -> Vector3<f64> {
        self.inner.transform_point(&nalgebra::Point3::from(point)).coords
    }

    /// Relative transform from `self` to `other`, both expressed in the same
    /// parent frame: `self.inverse() * other`.
    pub fn relative_to(&self, other: &Transform3D) -> Transform3D {
        Transform3D {
            inner: self.inner.inverse() * other.inner,
        }
    }

    /// GTSAM-style `between`: the transform that takes `self` to `other`.
    /// Equivalent to [`Transform3D::relative_to`], named to match the
    /// pose-graph factor convention used throughout the optimizer.
    pub fn between(&self, other: &Transform3D) -> Transform3D {
        self.relative_to(other)
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Transform3D;
    fn mul(self, rhs: Transform3D) -> Transform3D {
        self.compose(&rhs)
    }
}

impl std::ops::Mul<&Transform3D> for Transform3D {
    type Output = Transform3D;
    fn mul(self, rhs: &Transform3D) -> Transform3D {
        self.compose(rhs)
    }
}

impl std::ops::Mul<Transform3D> for &Transform3D {
    type Output = Transform3D;
    fn mul(self, rhs: Transform3D) -> Transform3D {
        self.compose(&rhs)
    }
}

impl std::ops::Mul<&Transform3D> for &Transform3D {
    type Output = Transform3D;
    fn mul(self, rhs: &Transform3D) -> Transform3D {
        self.compose(rhs)
    }
}

/// Normalize an angle to `(-PI, PI]`.
pub fn normalize_angle(angle: f64) -> f64 {
    types::normalize_angle(angle)
}
