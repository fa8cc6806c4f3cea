//! # mfpscan
//!
//! Protocol engine for network-attached multifunction scanners.
//!
//! ## Features
//!
//! - Command encoding and response parsing for four device families
//! - Streaming scan-data decoding: raw, run-length, planar color and JPEG
//! - Blocking driver with a session state machine and cancellation
//! - Scriptable mock transport for testing without hardware
//!
//! ## Quick Start
//!
//! ```no_run
//! use mfpscan::{DeviceFamily, DriverConfig, ScanMode, Scanner};
//!
//! fn main() -> mfpscan::Result<()> {
//!     // Connect to device
//!     let mut scanner = Scanner::tcp(
//!         "192.168.1.50",
//!         mfpscan::DEFAULT_PORT,
//!         DriverConfig::new(DeviceFamily::Family4),
//!     );
//!     scanner.connect()?;
//!
//!     // Scan one gray page
//!     scanner.set_scan_mode(ScanMode::Gray)?;
//!     scanner.start_scan()?;
//!
//!     let mut page = Vec::new();
//!     let mut buf = [0u8; 16 * 1024];
//!     loop {
//!         match scanner.read_scan_data(&mut buf) {
//!             Ok(n) => page.extend_from_slice(&buf[..n]),
//!             Err(e) if e.is_end_of_stream() => break,
//!             Err(e) => return Err(e),
//!         }
//!     }
//!     println!("{} bytes", page.len());
//!
//!     scanner.disconnect()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod scanner;
pub mod staging;

// Re-exports
pub use config::DriverConfig;
pub use error::{Error, ErrorKind, Result};
pub use scanner::Scanner;
pub use staging::StagingBuffer;

// Re-export protocol and transport types
pub use mfpscan_core::{BasicParameters, DEFAULT_PORT, DeviceFamily, SessionState};
pub use mfpscan_transport::{MockTransport, TcpTransport, Transport};
pub use mfpscan_types::{ButtonState, CropArea, Resolution, ScanMode, ScanParameters, ScanSource};
