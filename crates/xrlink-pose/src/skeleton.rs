//! Hand skeleton: bone tree and pose recovery
//!
//! The device sends each hand as 26 joints. Joint 0 (wrist) is absolute;
//! every other joint is an offset from its parent in the bone tree below.
//!
//! ```text
//!            0 wrist
//!            |
//!            1 hand
//!   ┌───────┬┴──────┬───────┬───────┐
//!   2 thumb 6 index 11 mid  16 ring 21 little
//!   3       7       12      17      22
//!   4       8       13      18      23
//!   5       9       14      19      24
//!           10      15      20      25
//! ```

use std::fmt;
use std::str::FromStr;

use nalgebra::{UnitQuaternion, Vector3};
use tracing::warn;

use xrlink_core::{XrlinkError, XrlinkResult, HAND_JOINT_COUNT};
use xrlink_wire::{HandChain, PosePacket, RawJoint};

use crate::axis::{position_from_raw, rotation_from_raw, AxisConversion, Degeneracy};
use crate::transform::JointTransform;

/// Parent of each joint; the wrist has none
pub const PARENTS: [Option<usize>; HAND_JOINT_COUNT] = [
    None,
    Some(0),
    // thumb
    Some(1),
    Some(2),
    Some(3),
    Some(4),
    // index
    Some(1),
    Some(6),
    Some(7),
    Some(8),
    Some(9),
    // middle
    Some(1),
    Some(11),
    Some(12),
    Some(13),
    Some(14),
    // ring
    Some(1),
    Some(16),
    Some(17),
    Some(18),
    Some(19),
    // little
    Some(1),
    Some(21),
    Some(22),
    Some(23),
    Some(24),
];

/// Links drawn by visualization consumers: the bone tree plus four
/// transverse palm links
pub const BONE_LINKS: [(usize, usize); 29] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (4, 5),
    (1, 6),
    (6, 7),
    (7, 8),
    (8, 9),
    (9, 10),
    (1, 11),
    (11, 12),
    (12, 13),
    (13, 14),
    (14, 15),
    (1, 16),
    (16, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (1, 21),
    (21, 22),
    (22, 23),
    (23, 24),
    (24, 25),
    // palm
    (2, 6),
    (6, 11),
    (11, 16),
    (16, 21),
];

/// End-effector joints: index, middle, ring, thumb
pub const FINGERTIPS: [usize; 4] = [10, 15, 20, 5];

/// Named joint groups of the hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerGroup {
    Wrist,
    Hand,
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl FingerGroup {
    pub const ALL: [FingerGroup; 7] = [
        FingerGroup::Wrist,
        FingerGroup::Hand,
        FingerGroup::Thumb,
        FingerGroup::Index,
        FingerGroup::Middle,
        FingerGroup::Ring,
        FingerGroup::Little,
    ];

    /// Chain indices belonging to this group, proximal first
    pub fn joints(self) -> &'static [usize] {
        match self {
            FingerGroup::Wrist => &[0],
            FingerGroup::Hand => &[1],
            FingerGroup::Thumb => &[2, 3, 4, 5],
            FingerGroup::Index => &[6, 7, 8, 9, 10],
            FingerGroup::Middle => &[11, 12, 13, 14, 15],
            FingerGroup::Ring => &[16, 17, 18, 19, 20],
            FingerGroup::Little => &[21, 22, 23, 24, 25],
        }
    }

    /// Chain index of the `local`-th joint of this group
    pub fn joint(self, local: usize) -> Option<usize> {
        self.joints().get(local).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            FingerGroup::Wrist => "wrist",
            FingerGroup::Hand => "hand",
            FingerGroup::Thumb => "thumb",
            FingerGroup::Index => "index",
            FingerGroup::Middle => "middle",
            FingerGroup::Ring => "ring",
            FingerGroup::Little => "little",
        }
    }
}

/// Which hand of the packet to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Left => write!(f, "left"),
            Handedness::Right => write!(f, "right"),
        }
    }
}

impl FromStr for Handedness {
    type Err = XrlinkError;

    fn from_str(s: &str) -> XrlinkResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Handedness::Left),
            "right" | "r" => Ok(Handedness::Right),
            other => Err(XrlinkError::InvalidConfig(format!(
                "hand must be 'left' or 'right', got '{}'",
                other
            ))),
        }
    }
}

/// How joints 1-25 are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainMode {
    /// Parent-relative offsets as sent, no composition
    Relative,
    /// Composed down the bone tree into the wrist's space
    #[default]
    Absolute,
}

/// One hand in robot axes
#[derive(Debug, Clone, PartialEq)]
pub struct HandPose {
    pub mode: ChainMode,
    pub joints: [JointTransform; HAND_JOINT_COUNT],
    /// Malformed-input flags of the raw sample behind each joint
    pub degeneracy: [Degeneracy; HAND_JOINT_COUNT],
}

impl HandPose {
    /// Build from already-converted transforms
    pub fn from_joints(mode: ChainMode, joints: [JointTransform; HAND_JOINT_COUNT]) -> Self {
        Self {
            mode,
            joints,
            degeneracy: [Degeneracy::default(); HAND_JOINT_COUNT],
        }
    }

    pub fn joint(&self, index: usize) -> Option<&JointTransform> {
        self.joints.get(index)
    }

    pub fn wrist(&self) -> &JointTransform {
        &self.joints[0]
    }

    /// `local`-th joint of a group
    pub fn group_joint(&self, group: FingerGroup, local: usize) -> Option<&JointTransform> {
        group.joint(local).and_then(|i| self.joint(i))
    }

    /// Joint `index` as it arrived on the wire, in robot axes: the wrist's
    /// absolute pose, or a joint's offset from its parent. Identical in both
    /// chain modes.
    pub fn offset(&self, index: usize) -> Option<JointTransform> {
        let joint = self.joint(index)?;
        Some(match (self.mode, PARENTS[index]) {
            (ChainMode::Absolute, Some(p)) => joint.relative_to(&self.joints[p]),
            _ => *joint,
        })
    }

    /// `inverse(T_wrist) · T_joint`
    pub fn transform_in_wrist(&self, index: usize) -> Option<JointTransform> {
        let joint = self.joint(index)?;
        match self.mode {
            ChainMode::Absolute => Some(joint.relative_to(self.wrist())),
            ChainMode::Relative => {
                // offsets below the wrist composed down to `index`
                let mut in_wrist = JointTransform::identity();
                let mut at = index;
                while let Some(parent) = PARENTS[at] {
                    in_wrist = self.joints[at].compose(&in_wrist);
                    at = parent;
                }
                Some(in_wrist)
            }
        }
    }

    /// Fingertip positions in the wrist frame, ordered as [`FINGERTIPS`]
    pub fn fingertips(&self) -> [Vector3<f64>; 4] {
        FINGERTIPS.map(|i| self.transform_in_wrist(i).unwrap_or_default().position)
    }

    pub fn degenerate_joints(&self) -> impl Iterator<Item = usize> + '_ {
        self.degeneracy
            .iter()
            .enumerate()
            .filter(|(_, d)| d.any())
            .map(|(i, _)| i)
    }

    pub fn is_degenerate(&self) -> bool {
        self.degeneracy.iter().any(Degeneracy::any)
    }
}

/// Recover one hand from its wire chain.
///
/// Composition happens in device axes; every resulting joint is then mapped
/// to robot axes. Degenerate samples are processed as given and reported with
/// a single warning per call.
pub fn recover_hand(chain: &HandChain, mode: ChainMode, conv: &AxisConversion) -> HandPose {
    let mut positions = [Vector3::zeros(); HAND_JOINT_COUNT];
    let mut rotations = [UnitQuaternion::identity(); HAND_JOINT_COUNT];
    let mut degeneracy = [Degeneracy::default(); HAND_JOINT_COUNT];

    for (i, raw) in chain.joints.iter().enumerate() {
        degeneracy[i] = Degeneracy::of(raw);
        let rel_pos = position_from_raw(raw);
        let rel_rot = rotation_from_raw(raw);

        match (mode, PARENTS[i]) {
            (ChainMode::Absolute, Some(p)) => {
                // parents always precede children
                positions[i] = positions[p] + rotations[p] * rel_pos;
                rotations[i] = rotations[p] * rel_rot;
            }
            _ => {
                positions[i] = rel_pos;
                rotations[i] = rel_rot;
            }
        }
    }

    let joints = std::array::from_fn(|i| {
        JointTransform::new(
            conv.position(&positions[i]),
            conv.rotation(rotations[i].to_rotation_matrix().matrix()),
        )
    });

    let pose = HandPose {
        mode,
        joints,
        degeneracy,
    };
    if pose.is_degenerate() {
        let flagged: Vec<usize> = pose.degenerate_joints().collect();
        warn!(joints = ?flagged, "near-zero position or quaternion in hand pose");
    }
    pose
}

/// Head pose in robot axes
pub fn recover_head(raw: &RawJoint, conv: &AxisConversion) -> JointTransform {
    let flags = Degeneracy::of(raw);
    if flags.any() {
        warn!(
            zero_position = flags.zero_position,
            zero_rotation = flags.zero_rotation,
            "near-zero position or quaternion in head pose"
        );
    }
    JointTransform::new(
        conv.position(&position_from_raw(raw)),
        conv.rotation(rotation_from_raw(raw).to_rotation_matrix().matrix()),
    )
}

/// A whole packet in robot axes
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPose {
    pub timestamp: f64,
    pub left: HandPose,
    pub right: HandPose,
    pub head: JointTransform,
}

impl TrackedPose {
    pub fn hand(&self, hand: Handedness) -> &HandPose {
        match hand {
            Handedness::Left => &self.left,
            Handedness::Right => &self.right,
        }
    }
}

pub fn recover_packet(packet: &PosePacket, mode: ChainMode, conv: &AxisConversion) -> TrackedPose {
    TrackedPose {
        timestamp: packet.timestamp,
        left: recover_hand(&packet.left, mode, conv),
        right: recover_hand(&packet.right, mode, conv),
        head: recover_head(&packet.head, conv),
    }
}
