//! Protocol encoder/decoder for one device family
//!
//! The [`Encoder`] renders command blocks from the current
//! [`ScanParameters`], parses the fixed-shape responses, and runs the
//! scan-data dispatcher that routes block payloads to the sub-codecs.
//! Families only change the constants in their [`FamilyProfile`].

use mfpscan_types::{ButtonState, ScanMode, ScanParameters, ScanSource};
use tracing::{debug, trace};

use crate::{
    codec::{Codec, ColorTransform, InterleaveCodec, JpegCodec, RawCodec, RunLengthCodec},
    command::{CommandBlock, Opcode},
    constants::DEFAULT_JPEG_SCRATCH_LIMIT,
    error::{Error, Result},
    family::{DeviceFamily, FamilyProfile},
    header::{BlockHeader, BlockKind, HeaderStatus},
    outcome::{DecodeOutcome, Decoded, StreamCursor},
    response::{self, BasicParameters, SessionStatus, SourceStatus},
};

/// Data block whose payload has not been fully consumed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenBlock {
    header: BlockHeader,
    remaining: usize,
}

/// Per-family command renderer and scan-data decoder
#[derive(Debug)]
pub struct Encoder {
    family: DeviceFamily,
    profile: &'static FamilyProfile,
    params: ScanParameters,

    open_block: Option<OpenBlock>,

    /// Codec of the most recent data block, drained before the next header
    active: Option<BlockKind>,

    raw: RawCodec,
    rle: RunLengthCodec,
    rgb: InterleaveCodec,
    ycc: InterleaveCodec,
    jpeg: JpegCodec,
}

impl Encoder {
    pub fn new(family: DeviceFamily) -> Self {
        Self::with_jpeg_scratch_limit(family, DEFAULT_JPEG_SCRATCH_LIMIT)
    }

    pub fn with_jpeg_scratch_limit(family: DeviceFamily, limit: usize) -> Self {
        let mut encoder = Self {
            family,
            profile: family.profile(),
            params: ScanParameters::default(),
            open_block: None,
            active: None,
            raw: RawCodec::new(),
            rle: RunLengthCodec::new(),
            rgb: InterleaveCodec::new(3, ColorTransform::None),
            ycc: InterleaveCodec::new(3, ColorTransform::YcbcrToRgb),
            jpeg: JpegCodec::with_scratch_limit(limit),
        };
        encoder.new_page();
        encoder
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn profile(&self) -> &'static FamilyProfile {
        self.profile
    }

    pub fn parameters(&self) -> &ScanParameters {
        &self.params
    }

    /// Parameters every following block is rendered from
    ///
    /// Takes effect for the scan-data decoder at the next [`new_page`](Self::new_page).
    pub fn set_parameters(&mut self, params: ScanParameters) {
        self.params = params;
    }

    /// Reset every codec and drop the open block for a fresh frame
    pub fn new_page(&mut self) {
        let width = self.params.crop.width as usize;

        self.raw.reset();
        self.rle.reset();
        self.rgb.new_page(width);
        self.ycc.new_page(width);
        self.jpeg.reset();

        self.open_block = None;
        self.active = None;
    }

    /// Whether a data block is waiting for more payload
    pub fn has_open_block(&self) -> bool {
        self.open_block.is_some()
    }

    // ---- Command blocks ----

    pub fn encode_session_start(&self, buf: &mut [u8]) -> Result<usize> {
        render(&CommandBlock::new(Opcode::SessionOpen), buf)
    }

    pub fn encode_session_stop(&self, buf: &mut [u8]) -> Result<usize> {
        render(&CommandBlock::new(Opcode::SessionClose), buf)
    }

    pub fn encode_cancel(&self, buf: &mut [u8]) -> Result<usize> {
        render(&CommandBlock::new(Opcode::Cancel), buf)
    }

    pub fn encode_button_query(&self, buf: &mut [u8]) -> Result<usize> {
        render(&CommandBlock::new(Opcode::ButtonQuery), buf)
    }

    /// `ESC I`: resolution and mode, answered by the page geometry
    pub fn encode_basic_parameter_block(&self, buf: &mut [u8]) -> Result<usize> {
        let block = CommandBlock::new(Opcode::BasicParameters)
            .field("R", self.resolution_field())
            .field("M", mode_token(self.params.mode));
        render(&block, buf)
    }

    /// `ESC D`: ask the feeder whether documents are loaded
    pub fn encode_source_select_block(&self, buf: &mut [u8]) -> Result<usize> {
        render(&CommandBlock::new(Opcode::SourceSelect).word("ADF"), buf)
    }

    /// `ESC X`: full parameter set, starts acquisition
    pub fn encode_parameter_block(&self, buf: &mut [u8]) -> Result<usize> {
        let params = &self.params;
        let (x0, y0, x1, y1) = params.crop.corners();

        let mut block = CommandBlock::new(Opcode::Parameters)
            .field("R", self.resolution_field())
            .field("M", mode_token(params.mode))
            .field("C", self.compression_token())
            .field("B", params.brightness() - ScanParameters::ADJUST_MIN)
            .field("N", params.contrast() - ScanParameters::ADJUST_MIN)
            .field("A", format!("{},{},{},{}", x0, y0, x1, y1));

        if self.profile.duplex {
            let sides = match params.source {
                ScanSource::AdfDuplex => "DUP",
                _ => "SIN",
            };
            block = block.field("D", sides);
        } else if params.source == ScanSource::AdfDuplex {
            return Err(Error::Unsupported {
                family: self.profile.name,
                feature: "duplex scanning".into(),
            });
        }

        debug!("Rendering {}", block);
        render(&block, buf)
    }

    /// `ESC X` with no fields: next frame, same parameters
    pub fn encode_parameter_block_blank(&self, buf: &mut [u8]) -> Result<usize> {
        render(&CommandBlock::new(Opcode::Parameters), buf)
    }

    fn resolution_field(&self) -> String {
        format!("{},{}", self.params.resolution.x, self.params.resolution.y)
    }

    fn compression_token(&self) -> &'static str {
        let params = &self.params;
        match (params.compression, params.mode.is_color()) {
            (true, true) if self.profile.jpeg => "JPEG",
            (true, false) => "RLENGTH",
            _ => "NONE",
        }
    }

    // ---- Responses ----

    pub fn decode_session_resp(&self, data: &[u8]) -> Result<SessionStatus> {
        response::decode_session(data)
    }

    pub fn decode_source_status_resp(&self, data: &[u8]) -> Result<SourceStatus> {
        response::decode_source_status(data)
    }

    pub fn decode_button_query_resp(&self, data: &[u8]) -> Result<()> {
        response::decode_button_query(data)
    }

    pub fn decode_button_state_resp(&self, data: &[u8]) -> Result<ButtonState> {
        response::decode_button_state(data)
    }

    pub fn decode_basic_parameter_resp(&self, data: &[u8]) -> Result<BasicParameters> {
        response::decode_basic_parameters(data)
    }

    // ---- Scan data ----

    /// Identify the block at the front of `src`
    pub fn decode_scan_data_header(&self, src: &[u8]) -> (usize, HeaderStatus) {
        BlockHeader::decode(self.profile, src)
    }

    /// Decode as much of `src` into `dst` as both allow
    ///
    /// Stops when the output is full, the input holds no complete header,
    /// a codec makes no output on an open block, or a terminal outcome is
    /// reached. Bytes owed by the previous block's codec are always handed
    /// out before the next header is looked at.
    pub fn decode_scan_data(&mut self, src: &[u8], dst: &mut [u8]) -> Decoded {
        let mut cursor = StreamCursor::new(src, dst);

        while cursor.dst_remaining() > 0 {
            let Some(mut block) = self.open_block else {
                if let Some(kind) = self.active {
                    let drained = self.codec_mut(kind).decode(&[], cursor.dst());
                    cursor.produce(drained.produced);
                    if drained.outcome.is_terminal() {
                        return cursor.finish(drained.outcome);
                    }
                    if drained.produced > 0 {
                        continue;
                    }
                }

                let (len, status) = self.decode_scan_data_header(cursor.src());
                match status {
                    HeaderStatus::Block(header) => {
                        cursor.consume(len);
                        trace!("Scan data {}", header);
                        self.active = Some(header.kind);
                        if header.length > 0 {
                            self.open_block = Some(OpenBlock {
                                header,
                                remaining: header.length,
                            });
                        }
                    }
                    HeaderStatus::Sentinel(outcome) => {
                        cursor.consume(len);
                        debug!("Scan data sentinel: {}", outcome);
                        self.active = None;
                        return cursor.finish(outcome);
                    }
                    HeaderStatus::Truncated => break,
                    HeaderStatus::Rejected(outcome) => {
                        debug!(
                            "Rejected scan data header 0x{:02X}: {}",
                            cursor.src()[0],
                            outcome
                        );
                        return cursor.finish(outcome);
                    }
                }
                continue;
            };

            let input = cursor.src();
            let block_buffered = block.remaining <= input.len();
            let feed = &input[..block.remaining.min(input.len())];
            let decoded = self.codec_mut(block.header.kind).decode(feed, cursor.dst());
            cursor.consume(decoded.consumed);
            cursor.produce(decoded.produced);

            block.remaining -= decoded.consumed;
            self.open_block = (block.remaining > 0).then_some(block);

            if decoded.outcome.is_terminal() {
                return cursor.finish(decoded.outcome);
            }
            // Whole rest of the block is here and the codec cannot take it:
            // a record is split across the block boundary
            if block_buffered && decoded.consumed == 0 && decoded.produced == 0 {
                debug!(
                    remaining = block.remaining,
                    "Scan data {} ends inside a record",
                    block.header
                );
                return cursor.finish(DecodeOutcome::Invalid);
            }
            // A block that stays open without yielding output cannot go further
            if decoded.produced == 0 && self.open_block.is_some() {
                break;
            }
        }

        cursor.settle()
    }

    fn codec_mut(&mut self, kind: BlockKind) -> &mut dyn Codec {
        match kind {
            BlockKind::GrayRaw => &mut self.raw,
            BlockKind::GrayRunLength => &mut self.rle,
            BlockKind::ColorRgb => &mut self.rgb,
            BlockKind::ColorYcbcr => &mut self.ycc,
            BlockKind::ColorJpeg => &mut self.jpeg,
        }
    }
}

fn mode_token(mode: ScanMode) -> &'static str {
    match mode {
        ScanMode::Color => "CGRAY",
        ScanMode::Gray => "GRAY64",
        ScanMode::GrayDithered => "ERRDIF",
        ScanMode::Text => "TEXT",
    }
}

fn render(block: &CommandBlock, buf: &mut [u8]) -> Result<usize> {
    let encoded = block.encode();
    if encoded.len() > buf.len() {
        return Err(Error::BufferTooSmall {
            needed: encoded.len(),
            available: buf.len(),
        });
    }

    buf[..encoded.len()].copy_from_slice(&encoded);
    trace!("{} -> {}", block.opcode, hex::encode(&encoded));
    Ok(encoded.len())
}
