//! Closed-form retargeting onto a 7-DOF robotic hand
//!
//! The target hand drives six actuators: two on the thumb and one on each
//! remaining finger. Each angle is read directly off one joint's geometry
//! relative to the wrist, then clamped to the actuator's travel.
//!
//! The bounds and offsets are hardware calibration and are applied verbatim.

use std::f64::consts::{PI, TAU};

use crate::skeleton::{FingerGroup, HandPose, Handedness};
use crate::transform::JointTransform;

/// Output order of [`RetargetedJoints`]
pub const JOINT_NAMES: [&str; 6] = ["thumb_base", "thumb_tip", "index", "middle", "ring", "little"];

/// Per-joint divisor for the normalized output, degrees
pub const NORMALIZATION_RANGE_DEG: [f64; 6] = [70.0, 50.0, 180.0, 180.0, 180.0, 180.0];

/// Angles above this are a wrapped small negative and read as fully open
const WRAP_THRESHOLD_DEG: f64 = 270.0;

/// Thumb base: `thumb[1]`
const THUMB_BASE: (FingerGroup, usize) = (FingerGroup::Thumb, 1);
/// Thumb tip: `thumb[3]`
const THUMB_TIP: (FingerGroup, usize) = (FingerGroup::Thumb, 3);
/// Distal joint sampled on the four fingers
const DISTAL: usize = 4;

const FINGERS: [FingerGroup; 4] = [
    FingerGroup::Index,
    FingerGroup::Middle,
    FingerGroup::Ring,
    FingerGroup::Little,
];

/// Clamp profile of one actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointLimit {
    /// `[-10°, 60°]`
    ThumbBase,
    /// `[0°, 50°]`, wrapped negatives read as 0
    ThumbTip,
    /// `[0°, 180°]`, wrapped negatives read as 0
    Finger,
}

impl JointLimit {
    /// `(min, max)` in radians
    pub fn bounds(self) -> (f64, f64) {
        match self {
            JointLimit::ThumbBase => ((-10.0f64).to_radians(), 60.0f64.to_radians()),
            JointLimit::ThumbTip => (0.0, 50.0f64.to_radians()),
            JointLimit::Finger => (0.0, 180.0f64.to_radians()),
        }
    }

    pub fn clamp(self, angle: f64) -> f64 {
        let (min, max) = self.bounds();
        match self {
            JointLimit::ThumbBase => {
                if angle < min {
                    min
                } else if angle > max {
                    max
                } else {
                    angle
                }
            }
            JointLimit::ThumbTip | JointLimit::Finger => {
                if angle > WRAP_THRESHOLD_DEG.to_radians() || angle < min {
                    0.0
                } else if angle > max {
                    max
                } else {
                    angle
                }
            }
        }
    }
}

/// Six actuator angles in [`JOINT_NAMES`] order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetargetedJoints {
    /// Radians
    pub angles: [f64; 6],
    /// `angles` divided by [`NORMALIZATION_RANGE_DEG`]. Roughly `[0, 1]`; the
    /// thumb base can dip below 0 since its clamp starts at -10°.
    pub normalized: [f64; 6],
}

impl RetargetedJoints {
    pub fn from_angles(angles: [f64; 6]) -> Self {
        let mut normalized = [0.0; 6];
        for (n, (a, range)) in normalized
            .iter_mut()
            .zip(angles.iter().zip(NORMALIZATION_RANGE_DEG.iter()))
        {
            *n = a / range.to_radians();
        }
        Self { angles, normalized }
    }

    pub fn degrees(&self) -> [f64; 6] {
        self.angles.map(f64::to_degrees)
    }

    pub fn thumb_base(&self) -> f64 {
        self.angles[0]
    }

    pub fn thumb_tip(&self) -> f64 {
        self.angles[1]
    }

    /// Index, middle, ring, little
    pub fn fingers(&self) -> [f64; 4] {
        [self.angles[2], self.angles[3], self.angles[4], self.angles[5]]
    }
}

/// Map into `[0, 2π)`
#[inline]
pub fn wrap_to_two_pi(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

/// Angle of the translation in the y-z plane: `atan2(t_z, t_y)`
#[inline]
pub fn x_angle_from_position(t: &JointTransform) -> f64 {
    t.position.z.atan2(t.position.y)
}

/// Angle of the local x axis in the x-z plane: `atan2(n_z, n_x)`
#[inline]
pub fn y_angle_from_x_axis(t: &JointTransform) -> f64 {
    let n = t.x_axis();
    n.z.atan2(n.x)
}

/// Thumb base angle from `thumb[1]` in the wrist frame.
///
/// The two hands are mirror images, so the left takes a half-turn offset and
/// the right a sign flip.
pub fn thumb_base_angle(in_wrist: &JointTransform, hand: Handedness) -> f64 {
    let x = x_angle_from_position(in_wrist);
    let raw = match hand {
        Handedness::Left => wrap_to_two_pi(x - PI),
        Handedness::Right => wrap_to_two_pi(-x),
    };
    JointLimit::ThumbBase.clamp(raw)
}

/// Thumb tip angle from `thumb[3]` expressed in `thumb[1]`'s frame
pub fn thumb_tip_angle(tip_in_base: &JointTransform) -> f64 {
    JointLimit::ThumbTip.clamp(-y_angle_from_x_axis(tip_in_base))
}

/// Flexion of one finger from its distal joint in the wrist frame
pub fn finger_angle(distal_in_wrist: &JointTransform) -> f64 {
    JointLimit::Finger.clamp(wrap_to_two_pi(-y_angle_from_x_axis(distal_in_wrist)))
}

/// Retarget one hand.
///
/// The headset reports every joint below the wrist already expressed in the
/// wrist's frame, so each sampled joint is read as sent ([`HandPose::offset`])
/// rather than composed down the bone tree. Either chain mode gives the same
/// result.
pub fn retarget(pose: &HandPose, hand: Handedness) -> RetargetedJoints {
    let in_wrist = |(group, local): (FingerGroup, usize)| {
        group
            .joint(local)
            .and_then(|i| pose.offset(i))
            .unwrap_or_default()
    };

    let base = in_wrist(THUMB_BASE);
    let tip = in_wrist(THUMB_TIP);

    let mut angles = [0.0; 6];
    angles[0] = thumb_base_angle(&base, hand);
    angles[1] = thumb_tip_angle(&tip.relative_to(&base));
    for (slot, finger) in angles[2..].iter_mut().zip(FINGERS) {
        *slot = finger_angle(&in_wrist((finger, DISTAL)));
    }

    RetargetedJoints::from_angles(angles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisConversion;
    use crate::skeleton::{recover_hand, ChainMode};
    use nalgebra::{Matrix3, Rotation3, Vector3};
    use proptest::prelude::*;
    use xrlink_core::HAND_JOINT_COUNT;
    use xrlink_wire::{HandChain, RawJoint};

    const EPS: f64 = 1e-5;

    fn rot_x(theta: f64) -> [f32; 4] {
        [(theta / 2.0).sin() as f32, 0.0, 0.0, (theta / 2.0).cos() as f32]
    }

    /// Device-axis offset that lands on `target` in robot axes
    fn device_offset(target: Vector3<f64>) -> [f32; 3] {
        let s = AxisConversion::device_to_robot().matrix().transpose() * target;
        [s.x as f32, s.y as f32, s.z as f32]
    }

    fn pose_from(chain: &HandChain) -> HandPose {
        recover_hand(chain, ChainMode::Absolute, &AxisConversion::device_to_robot())
    }

    #[test]
    fn test_clamp_bounds() {
        let deg = f64::to_radians;
        assert_eq!(JointLimit::ThumbBase.clamp(deg(-30.0)), deg(-10.0));
        assert_eq!(JointLimit::ThumbBase.clamp(deg(75.0)), deg(60.0));
        assert_eq!(JointLimit::ThumbBase.clamp(deg(20.0)), deg(20.0));

        assert_eq!(JointLimit::ThumbTip.clamp(deg(300.0)), 0.0);
        assert_eq!(JointLimit::ThumbTip.clamp(deg(-5.0)), 0.0);
        assert_eq!(JointLimit::ThumbTip.clamp(deg(70.0)), deg(50.0));

        assert_eq!(JointLimit::Finger.clamp(deg(271.0)), 0.0);
        assert_eq!(JointLimit::Finger.clamp(deg(200.0)), deg(180.0));
        assert_eq!(JointLimit::Finger.clamp(deg(90.0)), deg(90.0));
    }

    #[test]
    fn test_normalization_keeps_asymmetry() {
        let mut angles = [0.0; 6];
        angles[0] = (-10.0f64).to_radians();
        angles[2] = 90.0f64.to_radians();
        let out = RetargetedJoints::from_angles(angles);
        assert!((out.normalized[0] - (-10.0 / 70.0)).abs() < 1e-12);
        assert!((out.normalized[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_distal_joint_matches_formula() {
        // identity wrist, distal joint one unit along y in the wrist frame
        let mut joints = [JointTransform::identity(); HAND_JOINT_COUNT];
        joints[10] = JointTransform::new(Vector3::new(0.0, 1.0, 0.0), Matrix3::identity());
        let pose = HandPose::from_joints(ChainMode::Absolute, joints);

        let expected = JointLimit::Finger.clamp(wrap_to_two_pi(-(0.0f64).atan2(1.0)));
        let out = retarget(&pose, Handedness::Right);
        assert!((out.angles[2] - expected).abs() < EPS);
        assert_eq!(out.angles[2], 0.0);
    }

    #[test]
    fn test_distal_joint_flexion() {
        let mut joints = [JointTransform::identity(); HAND_JOINT_COUNT];
        joints[15] = JointTransform::new(
            Vector3::new(0.0, 1.0, 0.0),
            Rotation3::from_axis_angle(&Vector3::y_axis(), 0.8).into_inner(),
        );
        let pose = HandPose::from_joints(ChainMode::Absolute, joints);
        let out = retarget(&pose, Handedness::Left);
        assert!((out.angles[3] - 0.8).abs() < EPS);
    }

    #[test]
    fn test_finger_curl_through_chain() {
        let theta = 40.0f64.to_radians();
        let mut chain = HandChain::default();
        chain.joints[10] = RawJoint::new([0.0, 0.0, 0.03], rot_x(theta));
        chain.joints[25] = RawJoint::new([0.0, 0.0, 0.03], rot_x(-theta));

        let out = retarget(&pose_from(&chain), Handedness::Right);
        assert!((out.angles[2] - theta).abs() < EPS);
        // bent backwards wraps above 270° and reads as open
        assert_eq!(out.angles[5], 0.0);
    }

    #[test]
    fn test_thumb_base_right() {
        let mut chain = HandChain::default();
        chain.joints[3] = RawJoint::new(device_offset(Vector3::new(0.0, 0.866_025, -0.5)), [0.0, 0.0, 0.0, 1.0]);

        let out = retarget(&pose_from(&chain), Handedness::Right);
        assert!((out.thumb_base() - 30.0f64.to_radians()).abs() < EPS);
    }

    #[test]
    fn test_thumb_base_left_is_mirrored() {
        let mut chain = HandChain::default();
        chain.joints[3] = RawJoint::new(device_offset(Vector3::new(0.0, -0.866_025, -0.5)), [0.0, 0.0, 0.0, 1.0]);

        let out = retarget(&pose_from(&chain), Handedness::Left);
        assert!((out.thumb_base() - 30.0f64.to_radians()).abs() < EPS);
    }

    #[test]
    fn test_thumb_tip_relative_to_base() {
        let base = 0.5;
        let mut chain = HandChain::default();
        // both joints arrive in the wrist frame; only their difference counts
        chain.joints[3] = RawJoint::new([0.0, 0.0, 0.02], rot_x(base));
        chain.joints[5] = RawJoint::new([0.0, 0.0, 0.04], rot_x(base + 30.0f64.to_radians()));

        let out = retarget(&pose_from(&chain), Handedness::Right);
        assert!((out.thumb_tip() - 30.0f64.to_radians()).abs() < EPS);

        chain.joints[5].rotation = rot_x(base + 70.0f64.to_radians());
        let out = retarget(&pose_from(&chain), Handedness::Right);
        assert!((out.thumb_tip() - 50.0f64.to_radians()).abs() < EPS);

        chain.joints[5].rotation = rot_x(base - 20.0f64.to_radians());
        let out = retarget(&pose_from(&chain), Handedness::Right);
        assert_eq!(out.thumb_tip(), 0.0);
    }

    /// A whole hand as the headset sends it: wrist turned away from the
    /// device axes, every finger joint expressed in the wrist's frame.
    fn wrist_frame_chain(bend: f64) -> HandChain {
        let half = std::f64::consts::FRAC_PI_4;
        // wrist turned 90° about device y
        let wrist = RawJoint::new([0.2, 1.1, 0.4], [0.0, half.sin() as f32, 0.0, half.cos() as f32]);
        let mut chain = HandChain::at_root(wrist);
        for group in [FingerGroup::Index, FingerGroup::Middle, FingerGroup::Ring, FingerGroup::Little] {
            for (k, &j) in group.joints().iter().enumerate() {
                chain.joints[j] = RawJoint::new([0.0, 0.0, 0.02 * (k + 1) as f32], rot_x(bend));
            }
        }
        // thumb splayed 30° below the palm plane, in robot axes
        let splay = Vector3::new(0.0, 0.866_025, -0.5);
        for (k, &j) in FingerGroup::Thumb.joints().iter().enumerate() {
            chain.joints[j] = RawJoint::new(device_offset(splay * 0.025 * (k + 1) as f64), rot_x(bend));
        }
        chain
    }

    #[test]
    fn test_wrist_frame_chain_reads_joints_as_sent() {
        let bend = 20.0f64.to_radians();
        let chain = wrist_frame_chain(bend);
        let conv = AxisConversion::device_to_robot();

        for mode in [ChainMode::Absolute, ChainMode::Relative] {
            let out = retarget(&recover_hand(&chain, mode, &conv), Handedness::Right);
            for (finger, angle) in JOINT_NAMES[2..].iter().zip(out.fingers()) {
                assert!((angle - bend).abs() < EPS, "{:?} {}: {}", mode, finger, angle.to_degrees());
            }
            let splay = 30.0f64.to_radians();
            assert!((out.thumb_base() - splay).abs() < EPS, "{:?}: {}", mode, out.thumb_base().to_degrees());
            // thumb[3] bent like thumb[1]
            assert!(out.thumb_tip().abs() < EPS, "{:?}: {}", mode, out.thumb_tip().to_degrees());
        }
    }

    #[test]
    fn test_rotated_wrist_does_not_leak_into_fingers() {
        let theta = 30.0f64.to_radians();
        let half = std::f64::consts::FRAC_PI_4;
        let mut chain = HandChain::at_root(RawJoint::new(
            [0.0, 1.0, 0.0],
            [0.0, half.sin() as f32, 0.0, half.cos() as f32],
        ));
        chain.joints[10] = RawJoint::new([0.0, 0.0, 0.09], rot_x(theta));

        let conv = AxisConversion::device_to_robot();
        for mode in [ChainMode::Absolute, ChainMode::Relative] {
            let out = retarget(&recover_hand(&chain, mode, &conv), Handedness::Right);
            assert!((out.angles[2] - theta).abs() < EPS, "{:?}", mode);
        }
    }

    #[test]
    fn test_open_hand() {
        let out = retarget(&pose_from(&HandChain::default()), Handedness::Right);
        assert_eq!(out.angles, [0.0; 6]);

        // atan2(0, 0) = 0, minus π wraps to π, clamped to the upper bound
        let out = retarget(&pose_from(&HandChain::default()), Handedness::Left);
        assert!((out.thumb_base() - 60.0f64.to_radians()).abs() < EPS);
    }

    proptest! {
        #[test]
        fn prop_clamp_idempotent(angle in -10.0f64..10.0) {
            for limit in [JointLimit::ThumbBase, JointLimit::ThumbTip, JointLimit::Finger] {
                let once = limit.clamp(angle);
                prop_assert_eq!(limit.clamp(once), once);
                let (min, max) = limit.bounds();
                prop_assert!(once >= min && once <= max);
            }
        }

        #[test]
        fn prop_retarget_output_in_bounds(
            q in prop::array::uniform4(-1.0f32..1.0),
            p in prop::array::uniform3(-0.1f32..0.1),
            idx in 1usize..HAND_JOINT_COUNT,
        ) {
            let mut chain = HandChain::default();
            chain.joints[idx] = RawJoint::new(p, q);
            let out = retarget(&pose_from(&chain), Handedness::Left);
            let limits = [
                JointLimit::ThumbBase,
                JointLimit::ThumbTip,
                JointLimit::Finger,
                JointLimit::Finger,
                JointLimit::Finger,
                JointLimit::Finger,
            ];
            for (angle, limit) in out.angles.iter().zip(limits) {
                let (min, max) = limit.bounds();
                prop_assert!(*angle >= min && *angle <= max);
            }
        }
    }
}
