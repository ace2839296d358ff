//! XRLink Video
//!
//! Turns raw camera frames into JPEG bytes for the fragment stream.
//!
//! # Pipeline
//!
//! Frame (any size) → resize to target (only if needed) → JPEG encode
//!
//! The codec is a strategy chosen once at startup with [`select_encoder`]:
//! a hardware-backed [`FrameEncoder`] supplied by the caller is preferred when
//! it reports itself available, and [`SoftwareJpegEncoder`] is the fallback.
//! An encode failure only costs the current frame; the caller skips it.

pub mod encoder;
pub mod frame;
pub mod pattern;

pub use encoder::*;
pub use frame::*;
pub use pattern::*;
