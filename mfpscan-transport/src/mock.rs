//! Scripted in-memory transport
//!
//! Replies are queued ahead of time and released one per write, which is
//! how the device behaves: every command block is answered (possibly with
//! nothing) before the next one is sent. Clones share the same script, so
//! a test can keep a handle after moving the transport into a driver.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::trace;

use crate::{Transport, error::*};

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    fail_open: bool,

    /// Zero-based index of the write that fails
    fail_write_at: Option<usize>,
    write_count: usize,
    writes: Vec<Bytes>,

    /// Released into `inbox` one per write
    replies: VecDeque<Bytes>,

    /// Readable now
    inbox: BytesMut,

    /// Largest read handed out at once
    read_chunk: Option<usize>,

    /// Sent over and over whenever `inbox` is empty
    chatter: Option<Bytes>,
    chatter_pos: usize,

    fail_next_read: bool,
}

/// In-memory transport with a shared script
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes the device answers the next unanswered write with
    ///
    /// An empty reply stands for a command the device does not answer.
    pub fn queue_reply(&self, data: impl AsRef<[u8]>) -> &Self {
        self.state
            .lock()
            .replies
            .push_back(Bytes::copy_from_slice(data.as_ref()));
        self
    }

    /// Bytes readable right away, without a write
    pub fn push_read(&self, data: impl AsRef<[u8]>) -> &Self {
        self.state.lock().inbox.extend_from_slice(data.as_ref());
        self
    }

    /// Make the write with this zero-based index fail
    pub fn fail_write(&self, index: usize) {
        self.state.lock().fail_write_at = Some(index);
    }

    /// Make the next read fail
    pub fn fail_read(&self) {
        self.state.lock().fail_next_read = true;
    }

    /// Keep the device talking: `pattern` repeats forever once the inbox
    /// runs dry, so a read never comes back empty
    pub fn set_chatter(&self, pattern: impl AsRef<[u8]>) {
        let mut state = self.state.lock();
        state.chatter = Some(Bytes::copy_from_slice(pattern.as_ref())).filter(|p| !p.is_empty());
        state.chatter_pos = 0;
    }

    pub fn clear_chatter(&self) {
        self.state.lock().chatter = None;
    }

    /// Make the next `open` fail
    pub fn fail_open(&self) {
        self.state.lock().fail_open = true;
    }

    /// Hand out at most `chunk` bytes per read
    pub fn set_read_chunk(&self, chunk: usize) {
        self.state.lock().read_chunk = Some(chunk.max(1));
    }

    /// Everything written so far, one entry per write
    pub fn writes(&self) -> Vec<Bytes> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// Bytes readable right now
    pub fn pending_read(&self) -> usize {
        self.state.lock().inbox.len()
    }

    /// Replies not yet released
    pub fn pending_replies(&self) -> usize {
        self.state.lock().replies.len()
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.open {
            return Err(Error::AlreadyConnected);
        }
        if std::mem::take(&mut state.fail_open) {
            return Err(Error::ConnectionTimeout);
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::NotConnected);
        }

        let index = state.write_count;
        state.write_count += 1;
        if state.fail_write_at == Some(index) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }

        trace!("Mock write {}: {}", index, hex::encode(data));
        state.writes.push(Bytes::copy_from_slice(data));
        if let Some(reply) = state.replies.pop_front() {
            state.inbox.extend_from_slice(&reply);
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::NotConnected);
        }

        if std::mem::take(&mut state.fail_next_read) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "scripted read failure",
            )));
        }

        let chunk = state.read_chunk.unwrap_or(usize::MAX);
        if state.inbox.is_empty() {
            if let Some(pattern) = state.chatter.clone() {
                let n = buf.len().min(chunk);
                let mut pos = state.chatter_pos;
                for byte in &mut buf[..n] {
                    *byte = pattern[pos];
                    pos = (pos + 1) % pattern.len();
                }
                state.chatter_pos = pos;
                return Ok(n);
            }
        }

        let n = buf.len().min(state.inbox.len()).min(chunk);
        buf[..n].copy_from_slice(&state.inbox[..n]);
        state.inbox.advance(n);
        Ok(n)
    }

    fn remote_addr(&self) -> String {
        "mock".to_string()
    }
}
