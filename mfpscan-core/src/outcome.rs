//! Decode outcomes and byte accounting
//!
//! Every codec and the scan-data dispatcher report progress the same way:
//! bytes consumed from the input, bytes produced into the output, and a
//! [`DecodeOutcome`]. The counts always come from a [`StreamCursor`], which
//! derives them from the slice lengths at entry and exit.

use std::fmt;

/// Device-reported fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    PaperJam,
    CoverOpen,
    NoDocuments,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PaperJam => "paper jam",
            Self::CoverOpen => "cover open",
            Self::NoDocuments => "no documents",
        };
        f.write_str(name)
    }
}

/// Result vocabulary shared by all decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeOutcome {
    /// More work is possible (usually: give me more output space)
    Continue,

    /// Input is truncated, wait for more transport bytes
    NeedMoreInput,

    /// Scan job complete
    EndOfData,

    /// Frame complete
    EndOfFrame { more_frames: bool },

    /// Device acknowledged a cancel
    Cancelled,

    /// Device reported a fault
    Fault(FaultKind),

    /// Stream uses something this family cannot decode
    Unsupported,

    /// Stream is malformed
    Invalid,

    /// A bounded buffer would overflow
    OutOfMemory,
}

impl DecodeOutcome {
    /// Whether the stream can be resumed with another call
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::Continue | Self::NeedMoreInput)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_resumable()
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Unsupported | Self::Invalid | Self::OutOfMemory)
    }
}

impl fmt::Display for DecodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("continue"),
            Self::NeedMoreInput => f.write_str("need more input"),
            Self::EndOfData => f.write_str("end of data"),
            Self::EndOfFrame { more_frames } => write!(f, "end of frame (more={})", more_frames),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Fault(kind) => write!(f, "fault: {}", kind),
            Self::Unsupported => f.write_str("unsupported"),
            Self::Invalid => f.write_str("invalid"),
            Self::OutOfMemory => f.write_str("out of memory"),
        }
    }
}

/// Progress report of one decode call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub consumed: usize,
    pub produced: usize,
    pub outcome: DecodeOutcome,
}

impl Decoded {
    /// Nothing consumed, nothing produced
    pub fn idle(outcome: DecodeOutcome) -> Self {
        Self {
            consumed: 0,
            produced: 0,
            outcome,
        }
    }
}

/// Input/output window of one decode call
///
/// Both slices shrink from the front as bytes are consumed and produced.
pub struct StreamCursor<'s, 'd> {
    src: &'s [u8],
    dst: &'d mut [u8],
    src_start: usize,
    dst_start: usize,
}

impl<'s, 'd> StreamCursor<'s, 'd> {
    pub fn new(src: &'s [u8], dst: &'d mut [u8]) -> Self {
        Self {
            src_start: src.len(),
            dst_start: dst.len(),
            src,
            dst,
        }
    }

    /// Unconsumed input
    pub fn src(&self) -> &'s [u8] {
        self.src
    }

    /// Unused output space
    pub fn dst(&mut self) -> &mut [u8] {
        &mut *self.dst
    }

    pub fn dst_remaining(&self) -> usize {
        self.dst.len()
    }

    pub fn consume(&mut self, n: usize) {
        self.src = &self.src[n..];
    }

    pub fn produce(&mut self, n: usize) {
        let dst = std::mem::take(&mut self.dst);
        self.dst = &mut dst[n..];
    }

    /// Copy `data` into the output and advance past it
    pub fn emit(&mut self, data: &[u8]) {
        self.dst[..data.len()].copy_from_slice(data);
        self.produce(data.len());
    }

    /// Write `n` copies of `byte` and advance past them
    pub fn fill(&mut self, byte: u8, n: usize) {
        self.dst[..n].fill(byte);
        self.produce(n);
    }

    pub fn consumed(&self) -> usize {
        self.src_start - self.src.len()
    }

    pub fn produced(&self) -> usize {
        self.dst_start - self.dst.len()
    }

    /// Any bytes moved so far in this call
    pub fn progressed(&self) -> bool {
        self.consumed() > 0 || self.produced() > 0
    }

    pub fn finish(self, outcome: DecodeOutcome) -> Decoded {
        Decoded {
            consumed: self.consumed(),
            produced: self.produced(),
            outcome,
        }
    }

    /// Finish a call that stopped without a terminal condition
    ///
    /// Reports `NeedMoreInput` only when nothing moved and there was room
    /// to write, so an empty output window always yields `Continue`.
    pub fn settle(self) -> Decoded {
        let outcome = if self.progressed() || self.dst.is_empty() {
            DecodeOutcome::Continue
        } else {
            DecodeOutcome::NeedMoreInput
        };
        self.finish(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_accounting() {
        let src = [1u8, 2, 3, 4, 5];
        let mut dst = [0u8; 4];
        let mut cursor = StreamCursor::new(&src, &mut dst);

        cursor.consume(2);
        cursor.emit(&[9, 9]);
        cursor.fill(7, 1);

        assert_eq!(cursor.src(), &[3, 4, 5]);
        assert_eq!(cursor.dst_remaining(), 1);

        let decoded = cursor.finish(DecodeOutcome::Continue);
        assert_eq!(decoded.consumed, 2);
        assert_eq!(decoded.produced, 3);
        assert_eq!(dst, [9, 9, 7, 0]);
    }

    #[test]
    fn test_settle_without_progress() {
        let mut dst = [0u8; 4];
        let cursor = StreamCursor::new(&[], &mut dst);
        assert_eq!(cursor.settle().outcome, DecodeOutcome::NeedMoreInput);

        let mut empty: [u8; 0] = [];
        let cursor = StreamCursor::new(&[1, 2], &mut empty);
        assert_eq!(cursor.settle(), Decoded::idle(DecodeOutcome::Continue));
    }

    #[test]
    fn test_outcome_classes() {
        assert!(DecodeOutcome::Continue.is_resumable());
        assert!(DecodeOutcome::NeedMoreInput.is_resumable());
        assert!(DecodeOutcome::EndOfFrame { more_frames: true }.is_terminal());
        assert!(DecodeOutcome::Fault(FaultKind::PaperJam).is_terminal());
        assert!(!DecodeOutcome::Cancelled.is_error());
        assert!(DecodeOutcome::Invalid.is_error());
    }
}
