//! XRLink Core - Fundamental types and constants
//!
//! This crate defines what every other XRLink crate shares:
//! - The error taxonomy (`XrlinkError`, `XrlinkResult`)
//! - Protocol constants for the frame and pose datagrams
//! - Default network endpoints and timings

pub mod consts;
pub mod error;

pub use consts::*;
pub use error::*;
