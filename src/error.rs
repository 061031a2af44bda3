//! Error types for the QAP1 protocol.

use std::io;

/// Errors that can occur during QAP1 protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum QapError {
    /// Connection, resolution, handshake, or partial-I/O failure.
    ///
    /// `code` is the OS error number when one is available, 0 otherwise;
    /// `detail` is the OS error string for `code`.
    #[error("network error: {message} (os error {code}: {detail})")]
    Network {
        message: String,
        code: i32,
        detail: String,
    },

    /// A value cannot be represented in the wire form it was asked to fill.
    #[error("encode error: {0}")]
    Decode(String),

    /// A non-applicable operation was requested on a value.
    #[error("logic error: {0}")]
    Logic(String),
}

impl QapError {
    /// Wraps an I/O failure, surfacing its OS error number.
    pub fn network(message: impl Into<String>, err: &io::Error) -> Self {
        Self::Network {
            message: message.into(),
            code: err.raw_os_error().unwrap_or(0),
            detail: err.to_string(),
        }
    }

    /// A network-layer failure with no OS error attached (handshake
    /// mismatch, broken framing, peer reset detected as zero progress).
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: 0,
            detail: String::new(),
        }
    }

    /// The OS error number carried by a network error, 0 elsewhere.
    pub fn os_code(&self) -> i32 {
        match self {
            Self::Network { code, .. } => *code,
            _ => 0,
        }
    }
}

impl From<io::Error> for QapError {
    fn from(err: io::Error) -> Self {
        Self::network("I/O failure", &err)
    }
}
