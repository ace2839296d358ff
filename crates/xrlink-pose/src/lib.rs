//! XRLink Pose
//!
//! Pose datagram → robot joint angles.
//!
//! # Pipeline
//!
//! 1. Decoded [`HandChain`](xrlink_wire::HandChain): wrist absolute,
//!    joints 1-25 parent-relative, device axes
//! 2. Skeleton recovery: compose along the bone tree
//! 3. Axis conversion: `p' = M·p`, `R' = M·R·Mᵀ`
//! 4. Wrist-relative transforms: `inverse(T_wrist)·T_joint`
//! 5. Closed-form retargeting to six actuator angles
//!
//! Nothing here is stateful; every packet is processed from scratch.

pub mod axis;
pub mod retarget;
pub mod skeleton;
pub mod transform;

pub use axis::*;
pub use retarget::*;
pub use skeleton::*;
pub use transform::*;
