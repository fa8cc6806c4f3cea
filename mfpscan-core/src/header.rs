//! Scan-data block headers

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::{
    constants::block_type,
    family::FamilyProfile,
    outcome::{DecodeOutcome, FaultKind},
};

/// Payload encoding of a data-carrying block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    GrayRaw,
    GrayRunLength,
    ColorRgb,
    ColorYcbcr,
    ColorJpeg,
}

impl BlockKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            block_type::GRAY_RAW => Some(Self::GrayRaw),
            block_type::GRAY_RLENGTH => Some(Self::GrayRunLength),
            block_type::COLOR_RGB => Some(Self::ColorRgb),
            block_type::COLOR_YCBCR => Some(Self::ColorYcbcr),
            block_type::COLOR_JPEG => Some(Self::ColorJpeg),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GrayRaw => "GRAY_RAW",
            Self::GrayRunLength => "GRAY_RLENGTH",
            Self::ColorRgb => "COLOR_RGB",
            Self::ColorYcbcr => "COLOR_YCBCR",
            Self::ColorJpeg => "COLOR_JPEG",
        }
    }
}

/// Outcome carried by a sentinel tag, if the tag is a sentinel at all
pub fn sentinel_outcome(tag: u8) -> Option<DecodeOutcome> {
    let outcome = match tag {
        block_type::END_OF_DATA => DecodeOutcome::EndOfData,
        block_type::END_OF_FRAME => DecodeOutcome::EndOfFrame { more_frames: true },
        block_type::END_OF_FRAME_LAST => DecodeOutcome::EndOfFrame { more_frames: false },
        block_type::CANCEL_ACK => DecodeOutcome::Cancelled,
        block_type::NO_DOCUMENTS => DecodeOutcome::Fault(FaultKind::NoDocuments),
        block_type::PAPER_JAM => DecodeOutcome::Fault(FaultKind::PaperJam),
        block_type::COVER_OPEN => DecodeOutcome::Fault(FaultKind::CoverOpen),
        _ => return None,
    };
    Some(outcome)
}

/// Header of a data-carrying block
///
/// # Layout
///
/// ```text
/// ┌──────────┬──────────────────────┬─────────────┬──────────────┐
/// │   Tag    │  family-specific     │   Length    │   Payload    │
/// │  1 byte  │  length_offset - 1   │  2 bytes LE │ Length bytes │
/// └──────────┴──────────────────────┴─────────────┴──────────────┘
/// ```
///
/// Sentinel blocks are the tag alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_type: u8,
    pub kind: BlockKind,
    pub length: usize,
}

/// What the front of the scan-data stream holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// A complete data header
    Block(BlockHeader),

    /// A sentinel block and its outcome
    Sentinel(DecodeOutcome),

    /// Not enough bytes to tell yet
    Truncated,

    /// Unknown tag (`Invalid`) or a tag this family never emits (`Unsupported`)
    Rejected(DecodeOutcome),
}

impl BlockHeader {
    /// Parse the header at the front of `src`
    ///
    /// Returns the bytes the header occupies together with its status.
    /// Only `Block` and `Sentinel` consume anything.
    pub fn decode(profile: &FamilyProfile, src: &[u8]) -> (usize, HeaderStatus) {
        let Some(&tag) = src.first() else {
            return (0, HeaderStatus::Truncated);
        };

        if let Some(outcome) = sentinel_outcome(tag) {
            if !profile.emits_sentinel(tag) {
                return (0, HeaderStatus::Rejected(DecodeOutcome::Invalid));
            }
            if src.len() < profile.sentinel_len {
                return (0, HeaderStatus::Truncated);
            }
            return (profile.sentinel_len, HeaderStatus::Sentinel(outcome));
        }

        let Some(kind) = BlockKind::from_tag(tag) else {
            return (0, HeaderStatus::Rejected(DecodeOutcome::Invalid));
        };
        if !profile.emits_data(tag) {
            return (0, HeaderStatus::Rejected(DecodeOutcome::Unsupported));
        }

        let header_len = profile.header_len();
        if src.len() < header_len {
            return (0, HeaderStatus::Truncated);
        }

        let length = LittleEndian::read_u16(&src[profile.length_offset..header_len]) as usize;
        let header = Self {
            block_type: tag,
            kind,
            length,
        };
        (header_len, HeaderStatus::Block(header))
    }
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block[{}](tag=0x{:02X}, len={})",
            self.kind.name(),
            self.block_type,
            self.length
        )
    }
}
