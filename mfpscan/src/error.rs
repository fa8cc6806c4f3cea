//! High-level error types

use std::fmt;

use mfpscan_core::FaultKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] mfpscan_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] mfpscan_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] mfpscan_types::Error),

    /// Operation not allowed in the current state
    #[error("Device busy: {0}")]
    Busy(String),

    #[error("Invalid data: {0}")]
    Invalid(String),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Paper jam")]
    PaperJam,

    #[error("Cover open")]
    CoverOpen,

    #[error("No documents")]
    NoDocuments,

    #[error("Scan cancelled")]
    Cancelled,

    /// Normal end of a frame or job
    #[error("End of stream")]
    EndOfStream,
}

/// Caller-facing classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Busy,
    Invalid,
    Io,
    OutOfMemory,
    Unsupported,
    PaperJam,
    CoverOpen,
    NoDocuments,
    Cancelled,
    EndOfStream,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use mfpscan_core::Error as CoreError;

        match self {
            Self::Core(CoreError::Unsupported { .. }) => ErrorKind::Unsupported,
            Self::Core(CoreError::InvalidSessionState(_)) => ErrorKind::Busy,
            Self::Core(_) => ErrorKind::Invalid,
            Self::Transport(_) => ErrorKind::Io,
            Self::Types(_) => ErrorKind::Invalid,
            Self::Busy(_) => ErrorKind::Busy,
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::OutOfMemory => ErrorKind::OutOfMemory,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::PaperJam => ErrorKind::PaperJam,
            Self::CoverOpen => ErrorKind::CoverOpen,
            Self::NoDocuments => ErrorKind::NoDocuments,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::EndOfStream => ErrorKind::EndOfStream,
        }
    }

    /// Normal completion rather than a failure
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl From<FaultKind> for Error {
    fn from(fault: FaultKind) -> Self {
        match fault {
            FaultKind::PaperJam => Self::PaperJam,
            FaultKind::CoverOpen => Self::CoverOpen,
            FaultKind::NoDocuments => Self::NoDocuments,
        }
    }
}
