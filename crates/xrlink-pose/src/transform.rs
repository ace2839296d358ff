//! Rigid transforms in the robot frame

use nalgebra::{Matrix3, Matrix4, Vector3};

/// Position + rotation of one joint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTransform {
    pub position: Vector3<f64>,
    pub rotation: Matrix3<f64>,
}

impl JointTransform {
    pub fn new(position: Vector3<f64>, rotation: Matrix3<f64>) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Matrix3::identity(),
        }
    }

    /// 4×4 homogeneous form `[R t; 0 1]`
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.position);
        m
    }

    pub fn from_homogeneous(m: &Matrix4<f64>) -> Self {
        Self {
            position: m.fixed_view::<3, 1>(0, 3).into_owned(),
            rotation: m.fixed_view::<3, 3>(0, 0).into_owned(),
        }
    }

    /// Rigid inverse `[Rᵀ -Rᵀt; 0 1]`.
    ///
    /// Total even for a degenerate rotation, where a general inverse would not
    /// exist.
    pub fn inverse(&self) -> Self {
        let rt = self.rotation.transpose();
        Self {
            position: -(rt * self.position),
            rotation: rt,
        }
    }

    /// `self · other`
    pub fn compose(&self, other: &JointTransform) -> Self {
        Self {
            position: self.position + self.rotation * other.position,
            rotation: self.rotation * other.rotation,
        }
    }

    /// This transform expressed in `base`'s frame: `inverse(T_base) · T_self`
    pub fn relative_to(&self, base: &JointTransform) -> Self {
        base.inverse().compose(self)
    }

    /// Local x axis (first rotation column)
    pub fn x_axis(&self) -> Vector3<f64> {
        self.rotation.column(0).into_owned()
    }
}

impl Default for JointTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    fn approx_eq(a: &Matrix4<f64>, b: &Matrix4<f64>) -> bool {
        (a - b).amax() < 1e-12
    }

    fn sample() -> JointTransform {
        let r = Rotation3::from_euler_angles(0.3, -0.2, 1.1).into_inner();
        JointTransform::new(Vector3::new(0.5, -1.0, 2.0), r)
    }

    #[test]
    fn test_homogeneous_layout() {
        let t = sample();
        let m = t.to_homogeneous();
        assert_eq!(m[(0, 3)], 0.5);
        assert_eq!(m[(2, 3)], 2.0);
        assert_eq!(m[(3, 3)], 1.0);
        assert_eq!(m[(3, 0)], 0.0);
        assert_eq!(JointTransform::from_homogeneous(&m), t);
    }

    #[test]
    fn test_inverse_matches_general_inverse() {
        let t = sample();
        let general = t.to_homogeneous().try_inverse().unwrap();
        assert!(approx_eq(&t.inverse().to_homogeneous(), &general));
    }

    #[test]
    fn test_relative_to_matches_matrix_product() {
        let wrist = sample();
        let joint = JointTransform::new(
            Vector3::new(0.1, 0.2, 0.3),
            Rotation3::from_euler_angles(-0.4, 0.9, 0.0).into_inner(),
        );

        let expected = wrist.to_homogeneous().try_inverse().unwrap() * joint.to_homogeneous();
        assert!(approx_eq(&joint.relative_to(&wrist).to_homogeneous(), &expected));
    }

    #[test]
    fn test_relative_to_self_is_identity() {
        let t = sample();
        assert!(approx_eq(
            &t.relative_to(&t).to_homogeneous(),
            &Matrix4::identity()
        ));
    }

    #[test]
    fn test_inverse_of_degenerate_rotation_is_finite() {
        let t = JointTransform::new(Vector3::new(1.0, 2.0, 3.0), Matrix3::zeros());
        let inv = t.inverse();
        assert!(inv.position.iter().all(|v| v.is_finite()));
    }
}
