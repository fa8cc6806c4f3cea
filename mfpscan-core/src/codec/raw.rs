//! Uncompressed samples

use super::Codec;
use crate::outcome::{Decoded, StreamCursor};

/// Pure copy
#[derive(Debug, Default)]
pub struct RawCodec;

impl RawCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for RawCodec {
    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Decoded {
        let mut cursor = StreamCursor::new(src, dst);
        let n = src.len().min(cursor.dst_remaining());
        cursor.emit(&src[..n]);
        cursor.consume(n);
        cursor.settle()
    }

    fn reset(&mut self) {}
}
