//! JPEG-compressed color
//!
//! Adapter around the `image` crate's JPEG decoder. The decoder wants the
//! whole image up front, so the stream is collected in a bounded scratch
//! buffer until the end-of-image marker shows up. The decoded raster is then
//! handed out one scanline at a time. Decoder failures never leave this
//! module: they come back as `Invalid` or `Unsupported`.

use std::io::Cursor;

use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use tracing::{debug, warn};

use super::Codec;
use crate::constants::DEFAULT_JPEG_SCRATCH_LIMIT;
use crate::outcome::{DecodeOutcome, Decoded, StreamCursor};

const MARKER: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;

/// Decoded image being handed out line by line
#[derive(Debug)]
struct Raster {
    pixels: Vec<u8>,
    line_len: usize,
    cursor: usize,
}

impl Raster {
    fn is_drained(&self) -> bool {
        self.cursor == self.pixels.len()
    }

    /// Rest of the scanline the cursor is in
    fn current_line(&self) -> &[u8] {
        let line_end = (self.cursor / self.line_len + 1) * self.line_len;
        &self.pixels[self.cursor..line_end.min(self.pixels.len())]
    }
}

#[derive(Debug)]
pub struct JpegCodec {
    scratch: Vec<u8>,
    scratch_limit: usize,
    raster: Option<Raster>,
    width: u32,
    height: u32,
}

impl JpegCodec {
    pub fn new() -> Self {
        Self::with_scratch_limit(DEFAULT_JPEG_SCRATCH_LIMIT)
    }

    pub fn with_scratch_limit(scratch_limit: usize) -> Self {
        Self {
            scratch: Vec::new(),
            scratch_limit,
            raster: None,
            width: 0,
            height: 0,
        }
    }

    /// Dimensions of the last decoded image
    pub fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bytes collected for the image in progress
    pub fn buffered(&self) -> usize {
        self.scratch.len()
    }

    /// Offset just past the end-of-image marker in `src`, if it is there
    fn find_eoi(&self, src: &[u8]) -> Option<usize> {
        if self.scratch.last() == Some(&MARKER) && src.first() == Some(&EOI) {
            return Some(1);
        }
        src.windows(2)
            .position(|w| w == [MARKER, EOI])
            .map(|pos| pos + 2)
    }

    fn decode_image(&mut self) -> DecodeOutcome {
        let (outcome, raster) = match self.run_decoder() {
            Ok(raster) => (DecodeOutcome::Continue, Some(raster)),
            Err(outcome) => (outcome, None),
        };
        self.scratch.clear();
        self.raster = raster;
        outcome
    }

    fn run_decoder(&mut self) -> Result<Raster, DecodeOutcome> {
        if !self.scratch.starts_with(&[MARKER, SOI]) {
            warn!("JPEG stream does not start with SOI");
            return Err(DecodeOutcome::Invalid);
        }

        let decoder = JpegDecoder::new(Cursor::new(self.scratch.as_slice())).map_err(|e| {
            warn!("JPEG header rejected: {}", e);
            DecodeOutcome::Invalid
        })?;

        let (width, height) = decoder.dimensions();
        let channels = match decoder.color_type() {
            ColorType::L8 => 1,
            ColorType::Rgb8 => 3,
            other => {
                warn!("JPEG color type {:?} not supported", other);
                return Err(DecodeOutcome::Unsupported);
            }
        };

        let total = usize::try_from(decoder.total_bytes()).map_err(|_| DecodeOutcome::OutOfMemory)?;
        let mut pixels = vec![0u8; total];
        decoder.read_image(&mut pixels).map_err(|e| {
            warn!("JPEG decode failed: {}", e);
            DecodeOutcome::Invalid
        })?;

        let line_len = width as usize * channels;
        if line_len == 0 {
            return Err(DecodeOutcome::Invalid);
        }

        debug!(width, height, channels, "Decoded JPEG frame");
        self.width = width;
        self.height = height;

        Ok(Raster {
            pixels,
            line_len,
            cursor: 0,
        })
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for JpegCodec {
    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Decoded {
        let mut cursor = StreamCursor::new(src, dst);

        while cursor.dst_remaining() > 0 {
            if let Some(raster) = self.raster.as_mut() {
                while !raster.is_drained() && cursor.dst_remaining() > 0 {
                    let line = raster.current_line();
                    let n = line.len().min(cursor.dst_remaining());
                    cursor.emit(&line[..n]);
                    raster.cursor += n;
                }
                if !raster.is_drained() {
                    break;
                }
                self.raster = None;
                continue;
            }

            let input = cursor.src();
            if input.is_empty() {
                break;
            }

            let eoi = self.find_eoi(input);
            let take = eoi.unwrap_or(input.len());
            if self.scratch.len() + take > self.scratch_limit {
                warn!(
                    limit = self.scratch_limit,
                    "JPEG frame exceeds scratch buffer"
                );
                return cursor.finish(DecodeOutcome::OutOfMemory);
            }
            self.scratch.extend_from_slice(&input[..take]);
            cursor.consume(take);

            if eoi.is_some() {
                let outcome = self.decode_image();
                if outcome.is_terminal() {
                    return cursor.finish(outcome);
                }
            }
        }

        cursor.settle()
    }

    fn reset(&mut self) {
        self.scratch.clear();
        self.raster = None;
        self.width = 0;
        self.height = 0;
    }
}
