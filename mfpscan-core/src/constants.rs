//! Protocol constants

/// Escape byte that opens every command block
pub const ESC: u8 = 0x1B;

/// Sentinel byte that terminates every command block
pub const BLOCK_END: u8 = 0x80;

/// Separator between fields of a command block
pub const FIELD_SEPARATOR: u8 = b'\n';

/// Largest command block the encoder will render
pub const MAX_COMMAND_LEN: usize = 256;

/// Default command/response timeout (seconds)
pub const DEFAULT_TIMEOUT: u64 = 5;

/// Default per-poll timeout while flushing stale bytes (milliseconds)
pub const DEFAULT_FLUSH_POLL_MS: u64 = 200;

/// Default hard ceiling for one flush, independent of the poll timeout (seconds)
pub const DEFAULT_FLUSH_CEILING: u64 = 5;

/// Default staging buffer capacity
pub const DEFAULT_STAGING_CAPACITY: usize = 64 * 1024;

/// Default bound on the JPEG accumulation buffer
pub const DEFAULT_JPEG_SCRATCH_LIMIT: usize = 64 * 1024 * 1024;

/// Scan-data block-type tags
pub mod block_type {
    /// Gray, raw samples
    pub const GRAY_RAW: u8 = 0x40;

    /// Gray, run-length compressed
    pub const GRAY_RLENGTH: u8 = 0x42;

    /// Color, one R, G and B plane per scanline
    pub const COLOR_RGB: u8 = 0x44;

    /// Color, one Y, Cb and Cr plane per scanline
    pub const COLOR_YCBCR: u8 = 0x48;

    /// Color, JPEG stream fragment
    pub const COLOR_JPEG: u8 = 0x64;

    /// Job complete
    pub const END_OF_DATA: u8 = 0x80;

    /// Frame complete, another one follows
    pub const END_OF_FRAME: u8 = 0x82;

    /// Frame complete, nothing follows
    pub const END_OF_FRAME_LAST: u8 = 0x83;

    /// Device acknowledged a cancel
    pub const CANCEL_ACK: u8 = 0x86;

    pub const NO_DOCUMENTS: u8 = 0xC2;
    pub const PAPER_JAM: u8 = 0xC3;
    pub const COVER_OPEN: u8 = 0xC4;
}

/// Fixed response shapes
pub mod response {
    pub const SESSION_LEN: usize = 5;

    /// Session accepted
    pub const SESSION_READY: [u8; SESSION_LEN] = [0x05, 0x10, 0x01, 0x02, 0x00];

    /// Device is serving someone else
    pub const SESSION_BUSY: [u8; SESSION_LEN] = [0x05, 0x10, 0x81, 0x02, 0x00];

    pub const SOURCE_STATUS_LEN: usize = 1;

    /// Feeder has documents
    pub const SOURCE_READY: u8 = 0x80;

    /// Feeder is empty
    pub const SOURCE_EMPTY: u8 = 0xC2;

    pub const BUTTON_QUERY: [u8; 4] = [0x04, 0x10, 0x03, 0x00];

    pub const BUTTON_STATE_LEN: usize = 9;

    /// Everything before the button mask
    pub const BUTTON_STATE_PREFIX: [u8; 4] = [0x09, 0x10, 0x03, 0x20];

    /// Longest basic-parameter response accepted, terminator included
    pub const BASIC_PARAMETERS_MAX_LEN: usize = 256;

    /// Terminates the basic-parameter response
    pub const BASIC_PARAMETERS_END: u8 = 0x00;
}
