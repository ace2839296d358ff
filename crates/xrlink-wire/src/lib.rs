//! XRLink Wire Protocol - Binary datagram formats
//!
//! Two formats travel over UDP:
//! - Fragment datagrams (host → device): 8-byte big-endian header + JPEG slice
//! - Pose datagrams (device → host): fixed 1500 bytes framed by `HND0`/`HND1`
//!
//! Neither format carries a checksum beyond UDP's own. Both are best-effort:
//! a datagram that does not parse is dropped, never repaired.

pub mod fragment;
pub mod pose_packet;
pub mod reassembly;

pub use fragment::*;
pub use pose_packet::*;
pub use reassembly::*;
