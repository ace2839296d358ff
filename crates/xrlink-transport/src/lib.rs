//! XRLink Transport - UDP endpoints and the control channel
//!
//! This crate provides:
//! - `FrameSender`: single-slot frame queue and background encode/send task
//! - `PoseReceiver`: keep-alive probes and a latest-packet receive task
//! - Arrival statistics for the pose stream
//! - JSON control RPC and display-parameter push over TCP
//!
//! Every endpoint owns exactly one socket. Workers run as tokio tasks and are
//! stopped through a cancellation token with a bounded join on close.

pub mod control;
pub mod receiver;
pub mod sender;
pub mod slot;
mod socket;
pub mod stats;

pub use control::*;
pub use receiver::*;
pub use sender::*;
pub use slot::LatestSlot;
pub use stats::*;
