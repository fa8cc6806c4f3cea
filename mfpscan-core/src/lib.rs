//! # mfpscan-core
//!
//! Core protocol implementation for multifunction scanners.
//!
//! This crate provides the protocol engine without any I/O:
//! - Command block rendering and fixed-shape response parsing
//! - Scan-data block headers and the streaming dispatcher
//! - Payload codecs (raw, run-length, interleaved color, JPEG)
//! - Device family profiles
//! - The driver session state machine

pub mod codec;
pub mod command;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod family;
pub mod header;
pub mod outcome;
pub mod response;
pub mod session;

pub use command::{CommandBlock, Opcode};
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use family::{DeviceFamily, FamilyProfile};
pub use header::{BlockHeader, BlockKind, HeaderStatus};
pub use outcome::{DecodeOutcome, Decoded, FaultKind, StreamCursor};
pub use response::{BasicParameters, SessionStatus, SourceStatus};
pub use session::{Session, SessionState};

/// Default port of network-attached devices
pub const DEFAULT_PORT: u16 = 54921;
