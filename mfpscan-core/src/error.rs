//! Error types for mfpscan-core

/// Result type alias for mfpscan-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Rendered command block does not fit the caller's buffer
    #[error("Buffer too small: need {needed} bytes, have {available} bytes")]
    BufferTooSmall {
        needed: usize,
        available: usize,
    },

    /// Fixed-shape response has the wrong length
    #[error("Unexpected response length: expected {expected} bytes, got {actual} bytes")]
    ResponseLength {
        expected: usize,
        actual: usize,
    },

    /// Response bytes match none of the legal patterns
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Unknown command opcode
    #[error("Unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// Command block framing is broken
    #[error("Malformed command block: {0}")]
    MalformedCommand(String),

    /// Requested feature does not exist on this device family
    #[error("{feature} is not supported by {family}")]
    Unsupported {
        family: &'static str,
        feature: String,
    },

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),
}
