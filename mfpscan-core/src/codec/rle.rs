//! Run-length compressed samples
//!
//! ```text
//! 0x00..=0x7F  L    then L+1 literal bytes
//! 0x80..=0xFF  L B  then 257-L copies of B
//! ```

use super::Codec;
use crate::outcome::{Decoded, StreamCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Init,
    CopyLiteral { left: usize },
    ExpandFill { byte: u8, left: usize },
}

/// Decoder for the byte-oriented run-length scheme
#[derive(Debug)]
pub struct RunLengthCodec {
    state: RunState,
}

impl RunLengthCodec {
    pub fn new() -> Self {
        Self {
            state: RunState::Init,
        }
    }

    /// Bytes still owed by the current run
    pub fn pending(&self) -> usize {
        match self.state {
            RunState::Init => 0,
            RunState::CopyLiteral { left } | RunState::ExpandFill { left, .. } => left,
        }
    }
}

impl Default for RunLengthCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for RunLengthCodec {
    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Decoded {
        let mut cursor = StreamCursor::new(src, dst);

        while cursor.dst_remaining() > 0 {
            match self.state {
                RunState::Init => {
                    let input = cursor.src();
                    let Some(&len) = input.first() else { break };
                    if len & 0x80 == 0 {
                        cursor.consume(1);
                        self.state = RunState::CopyLiteral {
                            left: len as usize + 1,
                        };
                    } else {
                        // Fill header is only taken whole
                        let Some(&byte) = input.get(1) else { break };
                        cursor.consume(2);
                        self.state = RunState::ExpandFill {
                            byte,
                            left: 257 - len as usize,
                        };
                    }
                }
                RunState::CopyLiteral { left } => {
                    let input = cursor.src();
                    let n = left.min(input.len()).min(cursor.dst_remaining());
                    if n == 0 {
                        break;
                    }
                    cursor.emit(&input[..n]);
                    cursor.consume(n);
                    self.state = match left - n {
                        0 => RunState::Init,
                        left => RunState::CopyLiteral { left },
                    };
                }
                RunState::ExpandFill { byte, left } => {
                    let n = left.min(cursor.dst_remaining());
                    cursor.fill(byte, n);
                    self.state = match left - n {
                        0 => RunState::Init,
                        left => RunState::ExpandFill { byte, left },
                    };
                }
            }
        }

        cursor.settle()
    }

    fn reset(&mut self) {
        self.state = RunState::Init;
    }
}
