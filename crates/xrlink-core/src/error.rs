//! Error types for XRLink
//!
//! Only setup and precondition failures reach the caller. Steady-state loss
//! (a bad datagram, a failed send, a frame that would not encode) is absorbed
//! by the worker that observed it.

use thiserror::Error;

/// Core XRLink errors
#[derive(Error, Debug)]
pub enum XrlinkError {
    // Precondition errors
    #[error("Transport not open")]
    NotOpen,

    #[error("Transport not connected")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Wire errors
    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Frame needs {required} fragments, header allows at most {max}")]
    FragmentOverflow { required: usize, max: usize },

    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    // Media errors
    #[error("Frame encoding failed: {0}")]
    EncodeFailed(String),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Control channel error: {0}")]
    ControlError(String),
}

impl XrlinkError {
    /// True for errors caused by calling an operation in the wrong lifecycle state
    pub fn is_precondition(&self) -> bool {
        matches!(self, XrlinkError::NotOpen | XrlinkError::NotConnected)
    }
}

impl From<std::io::Error> for XrlinkError {
    fn from(e: std::io::Error) -> Self {
        XrlinkError::TransportError(e.to_string())
    }
}

/// Result type for XRLink operations
pub type XrlinkResult<T> = Result<T, XrlinkError>;
