//! Transport layer for mfpscan
//!
//! Byte pipes to the device. No framing knowledge lives here: reads return
//! whatever the device has sent so far.

pub mod error;
pub mod mock;
pub mod tcp;

pub use error::{Error, Result};
pub use mock::MockTransport;
pub use tcp::TcpTransport;

use std::time::Duration;

/// Blocking byte transport
pub trait Transport: Send {
    /// Open the connection to the device
    fn open(&mut self) -> Result<()>;

    /// Close the connection
    fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Send raw bytes, returns bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Receive whatever is available within `timeout`
    ///
    /// Returns `Ok(0)` when nothing arrived in time. A zero timeout makes a
    /// single non-blocking attempt.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}
