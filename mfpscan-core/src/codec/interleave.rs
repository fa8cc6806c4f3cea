//! Planar-to-interleaved color
//!
//! The device sends each scanline as whole channel planes back to back
//! (`RRRR… GGGG… BBBB…`). Callers want `RGBRGB…`, which can only be built
//! once every plane of the line has arrived.

use super::Codec;
use crate::outcome::{DecodeOutcome, Decoded, StreamCursor};

/// Per-pixel conversion applied while interleaving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTransform {
    None,

    /// Full-range YCbCr (JFIF) to RGB, three channels only
    YcbcrToRgb,
}

/// Buffers one multi-channel scanline and emits it interleaved
#[derive(Debug)]
pub struct InterleaveCodec {
    channels: usize,
    pixel_width: usize,
    transform: ColorTransform,

    /// Incoming planes of the current line
    planes: Vec<u8>,
    filled: usize,

    /// Interleaved line waiting to be emitted
    line: Vec<u8>,
    emitted: usize,
}

impl InterleaveCodec {
    pub fn new(channels: usize, transform: ColorTransform) -> Self {
        Self {
            channels,
            pixel_width: 0,
            transform,
            planes: Vec::new(),
            filled: 0,
            line: Vec::new(),
            emitted: 0,
        }
    }

    /// Start a frame with a new line width, reallocating the line buffers
    pub fn new_page(&mut self, pixel_width: usize) {
        self.pixel_width = pixel_width;
        self.reset();
    }

    fn line_len(&self) -> usize {
        self.pixel_width * self.channels
    }

    fn interleave(&mut self) {
        let width = self.pixel_width;
        let channels = self.channels;

        for px in 0..width {
            for ch in 0..channels {
                self.line[px * channels + ch] = self.planes[ch * width + px];
            }
        }

        if self.transform == ColorTransform::YcbcrToRgb && channels == 3 {
            for pixel in self.line.chunks_exact_mut(3) {
                let rgb = ycbcr_to_rgb(pixel[0], pixel[1], pixel[2]);
                pixel.copy_from_slice(&rgb);
            }
        }

        self.filled = 0;
        self.emitted = 0;
    }
}

/// JFIF conversion in 16.16 fixed point
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    const HALF: i32 = 1 << 15;

    let y = i32::from(y);
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;

    // 1.402, 0.344136, 0.714136, 1.772
    let r = y + ((91_881 * cr + HALF) >> 16);
    let g = y - ((22_554 * cb + 46_802 * cr + HALF) >> 16);
    let b = y + ((116_130 * cb + HALF) >> 16);

    [clamp(r), clamp(g), clamp(b)]
}

fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

impl Codec for InterleaveCodec {
    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Decoded {
        if dst.is_empty() {
            return Decoded::idle(DecodeOutcome::Continue);
        }
        if self.line_len() == 0 {
            return Decoded::idle(DecodeOutcome::Invalid);
        }

        let mut cursor = StreamCursor::new(src, dst);
        loop {
            if self.emitted < self.line.len() {
                let n = (self.line.len() - self.emitted).min(cursor.dst_remaining());
                cursor.emit(&self.line[self.emitted..self.emitted + n]);
                self.emitted += n;
                if self.emitted < self.line.len() {
                    break;
                }
            }

            let input = cursor.src();
            if input.is_empty() {
                break;
            }
            let n = (self.planes.len() - self.filled).min(input.len());
            self.planes[self.filled..self.filled + n].copy_from_slice(&input[..n]);
            self.filled += n;
            cursor.consume(n);

            if self.filled == self.planes.len() {
                self.interleave();
            }
        }

        cursor.settle()
    }

    fn reset(&mut self) {
        let len = self.line_len();
        self.planes = vec![0; len];
        self.line = vec![0; len];
        self.filled = 0;
        // Nothing pending
        self.emitted = len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_three_planes_across_calls() {
        let mut codec = InterleaveCodec::new(3, ColorTransform::None);
        codec.new_page(6);
        let mut dst = [0u8; 18];

        let decoded = codec.decode(b"123456", &mut dst);
        assert_eq!((decoded.consumed, decoded.produced), (6, 0));
        let decoded = codec.decode(b"ABCDEF", &mut dst);
        assert_eq!((decoded.consumed, decoded.produced), (6, 0));
        let decoded = codec.decode(b"MNOPQR", &mut dst);
        assert_eq!((decoded.consumed, decoded.produced), (6, 18));
        assert_eq!(&dst, b"1AM2BN3CO4DP5EQ6FR");
    }

    #[test]
    fn test_partial_emit_holds_input() {
        let mut codec = InterleaveCodec::new(3, ColorTransform::None);
        codec.new_page(2);
        let mut dst = [0u8; 4];

        // One full line plus the first plane of the next
        let decoded = codec.decode(b"abcdefgh", &mut dst);
        assert_eq!((decoded.consumed, decoded.produced), (6, 4));
        assert_eq!(&dst, b"aceb");

        // Line still pending: finish it before taking more input
        let mut dst = [0u8; 16];
        let decoded = codec.decode(b"gh", &mut dst);
        assert_eq!((decoded.consumed, decoded.produced), (2, 2));
        assert_eq!(&dst[..2], b"df");
    }

    #[test]
    fn test_multiple_lines_in_one_call() {
        let mut codec = InterleaveCodec::new(2, ColorTransform::None);
        codec.new_page(2);
        let mut dst = [0u8; 16];
        let decoded = codec.decode(b"abABcdCD", &mut dst);
        assert_eq!((decoded.consumed, decoded.produced), (8, 8));
        assert_eq!(&dst[..8], b"aAbBcCdD");
    }

    #[test]
    fn test_ycbcr_conversion() {
        assert_eq!(ycbcr_to_rgb(100, 128, 128), [100, 100, 100]);
        assert_eq!(ycbcr_to_rgb(255, 128, 255), [255, 164, 255]);
        assert_eq!(ycbcr_to_rgb(0, 0, 128), [0, 44, 0]);
        // Pure red in JFIF YCbCr
        let [r, g, b] = ycbcr_to_rgb(76, 85, 255);
        assert!(r >= 253 && g <= 2 && b <= 2, "{:?}", (r, g, b));
    }

    #[test]
    fn test_ycbcr_line() {
        let mut codec = InterleaveCodec::new(3, ColorTransform::YcbcrToRgb);
        codec.new_page(2);
        let mut dst = [0u8; 6];
        let decoded = codec.decode(&[10, 200, 128, 128, 128, 128], &mut dst);
        assert_eq!(decoded.produced, 6);
        assert_eq!(dst, [10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn test_reset_discards_partial_line() {
        let mut codec = InterleaveCodec::new(3, ColorTransform::None);
        codec.new_page(2);
        let mut dst = [0u8; 6];
        codec.decode(b"xyz", &mut dst);
        codec.reset();

        let decoded = codec.decode(b"abcdef", &mut dst);
        assert_eq!(decoded.produced, 6);
        assert_eq!(&dst, b"acebdf");
    }

    #[test]
    fn test_empty_output_and_unsized_page() {
        let mut codec = InterleaveCodec::new(3, ColorTransform::None);
        assert_eq!(
            codec.decode(b"abc", &mut [0u8; 4]),
            Decoded::idle(DecodeOutcome::Invalid)
        );
        codec.new_page(4);
        assert_eq!(codec.decode(b"abc", &mut []), Decoded::idle(DecodeOutcome::Continue));
        assert_eq!(
            codec.decode(&[], &mut [0u8; 4]),
            Decoded::idle(DecodeOutcome::NeedMoreInput)
        );
    }
}
