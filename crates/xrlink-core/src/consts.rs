//! Protocol constants shared by the wire, transport, and pose crates

use std::time::Duration;

/// Fragment header: frame_id (4) + fragment_index (2) + fragment_count (2)
pub const FRAGMENT_HEADER_SIZE: usize = 8;

/// Largest fragment_count representable in the header
pub const MAX_FRAGMENTS_PER_FRAME: usize = u16::MAX as usize;

/// Default fragment payload, keeps a datagram under a typical Ethernet MTU
pub const DEFAULT_MAX_PAYLOAD: usize = 1400;

/// Leading magic of a pose datagram
pub const POSE_MAGIC_HEAD: [u8; 4] = *b"HND0";

/// Trailing magic of a pose datagram
pub const POSE_MAGIC_TAIL: [u8; 4] = *b"HND1";

/// Joints per hand chain
pub const HAND_JOINT_COUNT: usize = 26;

/// Floats per joint: position (3) + quaternion x, y, z, w (4)
pub const JOINT_STRIDE: usize = 7;

/// Floats per hand chain
pub const HAND_FLOATS: usize = HAND_JOINT_COUNT * JOINT_STRIDE;

/// Floats for the head pose
pub const HEAD_FLOATS: usize = JOINT_STRIDE;

/// Floats in the pose payload: left hand + right hand + head
pub const POSE_FLOATS: usize = 2 * HAND_FLOATS + HEAD_FLOATS;

/// Exact size of a pose datagram: magic + timestamp + payload + magic
pub const POSE_PACKET_SIZE: usize = 4 + 8 + POSE_FLOATS * 4 + 4;

/// Payload written by the keep-alive task
pub const KEEPALIVE_PAYLOAD: &[u8] = b"ping";

/// Default UDP port the device streams video to
pub const DEFAULT_VIDEO_PORT: u16 = 9003;

/// Default UDP port for the pose stream
pub const DEFAULT_POSE_PORT: u16 = 9001;

/// Default TCP port the device listens on for display parameters
pub const DEFAULT_DISPLAY_PARAMS_PORT: u16 = 9004;

/// Default interval between keep-alive probes
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

/// Default bound on a single receive wait
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound on the sender's wait for a new frame
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default deadline for joining a worker on close
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);
