//! Axis-system conversion between the headset and the robot
//!
//! The headset reports poses in a left-handed, y-up frame. The robot expects a
//! right-handed, z-up frame. A fixed orthogonal change of basis `M` maps one
//! into the other.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

use xrlink_core::{XrlinkError, XrlinkResult};
use xrlink_wire::RawJoint;

/// Norm below which a position or quaternion is considered degenerate
pub const NEAR_ZERO: f64 = 1e-6;

/// Tolerance for the orthogonality check on a custom basis
pub const ORTHOGONALITY_TOLERANCE: f64 = 1e-9;

/// Fixed change of basis from device axes to robot axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConversion {
    m: Matrix3<f64>,
}

impl AxisConversion {
    /// Headset (x right, y up, z forward) → robot (x forward, y left, z up)
    pub fn device_to_robot() -> Self {
        Self {
            m: Matrix3::new(0.0, 0.0, 1.0, -1.0, 0.0, 0.0, 0.0, 1.0, 0.0),
        }
    }

    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Use a custom basis; it must be orthogonal so that `Mᵀ = M⁻¹`
    pub fn new(m: Matrix3<f64>) -> XrlinkResult<Self> {
        let conv = Self { m };
        if !conv.is_orthogonal(ORTHOGONALITY_TOLERANCE) {
            return Err(XrlinkError::InvalidConfig(
                "axis conversion matrix is not orthogonal".into(),
            ));
        }
        Ok(conv)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// `M·Mᵀ = I` within `tolerance`
    pub fn is_orthogonal(&self, tolerance: f64) -> bool {
        (self.m * self.m.transpose() - Matrix3::identity()).amax() <= tolerance
    }

    #[inline]
    pub fn position(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.m * p
    }

    #[inline]
    pub fn rotation(&self, r: &Matrix3<f64>) -> Matrix3<f64> {
        self.m * r * self.m.transpose()
    }
}

impl Default for AxisConversion {
    fn default() -> Self {
        Self::device_to_robot()
    }
}

/// Wire position as a vector
pub fn position_from_raw(raw: &RawJoint) -> Vector3<f64> {
    Vector3::new(
        raw.position[0] as f64,
        raw.position[1] as f64,
        raw.position[2] as f64,
    )
}

/// Wire quaternion (x, y, z, w) as a rotation.
///
/// Near-unit quaternions are normalized. A near-zero quaternion is kept as
/// given rather than replaced; callers flag it via [`Degeneracy`].
pub fn rotation_from_raw(raw: &RawJoint) -> UnitQuaternion<f64> {
    let [x, y, z, w] = raw.rotation;
    let q = Quaternion::new(w as f64, x as f64, y as f64, z as f64);
    if q.norm() >= NEAR_ZERO {
        UnitQuaternion::from_quaternion(q)
    } else {
        UnitQuaternion::new_unchecked(q)
    }
}

/// Malformed-input flags for one joint sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Degeneracy {
    pub zero_position: bool,
    pub zero_rotation: bool,
}

impl Degeneracy {
    pub fn of(raw: &RawJoint) -> Self {
        let pos = position_from_raw(raw);
        let [x, y, z, w] = raw.rotation;
        let q_norm = Quaternion::new(w as f64, x as f64, y as f64, z as f64).norm();
        Self {
            zero_position: pos.norm() < NEAR_ZERO,
            zero_rotation: q_norm < NEAR_ZERO,
        }
    }

    pub fn any(&self) -> bool {
        self.zero_position || self.zero_rotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_device_to_robot_is_orthogonal() {
        let conv = AxisConversion::device_to_robot();
        assert!(conv.is_orthogonal(1e-12));
        assert_eq!(conv.matrix() * conv.matrix().transpose(), Matrix3::identity());
    }

    #[test]
    fn test_axis_mapping() {
        let conv = AxisConversion::device_to_robot();
        // device forward (z) is robot x, device up (y) is robot z
        assert_eq!(conv.position(&Vector3::z()), Vector3::x());
        assert_eq!(conv.position(&Vector3::y()), Vector3::z());
        assert_eq!(conv.position(&Vector3::x()), -Vector3::y());
    }

    #[test]
    fn test_rotation_conjugation_preserves_identity() {
        let conv = AxisConversion::device_to_robot();
        assert_eq!(conv.rotation(&Matrix3::identity()), Matrix3::identity());
    }

    #[test]
    fn test_rejects_non_orthogonal_basis() {
        let skew = Matrix3::new(1.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(AxisConversion::new(skew).is_err());
        assert!(AxisConversion::new(Matrix3::identity()).is_ok());
    }

    #[test]
    fn test_rotation_from_raw_normalizes() {
        let raw = RawJoint::new([0.0; 3], [0.0, 0.0, 0.0, 2.0]);
        let q = rotation_from_raw(&raw);
        assert!((q.into_inner().norm() - 1.0).abs() < 1e-12);
        assert!(q.angle().abs() < 1e-12);
    }

    #[test]
    fn test_zero_quaternion_kept_and_flagged() {
        let raw = RawJoint::new([0.0; 3], [0.0; 4]);
        let q = rotation_from_raw(&raw);
        assert_eq!(q.into_inner().norm(), 0.0);

        let flags = Degeneracy::of(&raw);
        assert!(flags.zero_position);
        assert!(flags.zero_rotation);
        assert!(flags.any());
    }

    #[test]
    fn test_healthy_joint_not_flagged() {
        let raw = RawJoint::new([0.1, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]);
        assert!(!Degeneracy::of(&raw).any());
    }

    proptest! {
        #[test]
        fn prop_converted_rotation_stays_orthogonal(
            x in -1.0f32..1.0, y in -1.0f32..1.0, z in -1.0f32..1.0, w in -1.0f32..1.0,
        ) {
            let raw = RawJoint::new([0.0; 3], [x, y, z, w]);
            prop_assume!(!Degeneracy::of(&raw).zero_rotation);

            let conv = AxisConversion::device_to_robot();
            let r = rotation_from_raw(&raw).to_rotation_matrix().into_inner();
            let converted = conv.rotation(&r);
            let err = (converted * converted.transpose() - Matrix3::identity()).amax();
            prop_assert!(err < 1e-9);
        }
    }
}
