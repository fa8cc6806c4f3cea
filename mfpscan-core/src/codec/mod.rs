//! Scan-data payload codecs
//!
//! One stateful decoder per payload encoding. All of them follow the same
//! contract:
//!
//! - `decode(src, dst)` reports consumed/produced bytes and an outcome.
//! - An empty `src` drains whatever the codec still holds.
//! - An empty `dst` returns `(0, 0, Continue)` and touches nothing.
//! - A record is only consumed once its meaning can be committed, so a
//!   truncated call returns `NeedMoreInput` and the caller retries later.
//! - `reset()` starts a fresh frame.

mod interleave;
mod jpeg;
mod raw;
mod rle;

pub use interleave::{ColorTransform, InterleaveCodec};
pub use jpeg::JpegCodec;
pub use raw::RawCodec;
pub use rle::RunLengthCodec;

use crate::outcome::Decoded;

/// Restartable streaming decoder
pub trait Codec {
    fn decode(&mut self, src: &[u8], dst: &mut [u8]) -> Decoded;

    /// Drop all state for a new frame
    fn reset(&mut self);
}
