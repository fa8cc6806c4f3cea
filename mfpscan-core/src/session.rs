//! Driver lifecycle state
//!
//! ```text
//! Closed -> Open -> Session <-> Idle
//!                      |         ^
//!                      v         |
//!                   Scanning ----+
//! ```
//!
//! The cancel latch is orthogonal to the state. It is set when a scan is
//! cancelled and gates scan-data reads until the next scan starts.

use std::fmt;

use crate::error::{Error, Result};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Transport closed
    #[default]
    Closed,

    /// Transport open, no session exchanged yet
    Open,

    /// Device session open, commands accepted
    Session,

    /// Connected, no session open
    Idle,

    /// Scan data is streaming
    Scanning,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Session => "session",
            Self::Idle => "idle",
            Self::Scanning => "scanning",
        };
        f.write_str(name)
    }
}

/// Session state machine
///
/// Owned by exactly one driver, so plain fields suffice.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
    cancelled: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Transport is open
    pub fn is_open(&self) -> bool {
        self.state != SessionState::Closed
    }

    /// A device session is open (with or without a scan)
    pub fn in_session(&self) -> bool {
        matches!(self.state, SessionState::Session | SessionState::Scanning)
    }

    pub fn is_scanning(&self) -> bool {
        self.state == SessionState::Scanning
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn transition(&mut self, from: &[SessionState], to: SessionState) -> Result<()> {
        if !from.contains(&self.state) {
            return Err(Error::InvalidSessionState(format!(
                "cannot go from {} to {}",
                self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Transport came up
    pub fn transport_opened(&mut self) -> Result<()> {
        self.transition(&[SessionState::Closed], SessionState::Open)
    }

    /// Device accepted a session
    pub fn session_opened(&mut self) -> Result<()> {
        self.transition(&[SessionState::Open, SessionState::Idle], SessionState::Session)
    }

    /// Parameters negotiated, scan data follows
    pub fn scan_started(&mut self) -> Result<()> {
        self.transition(&[SessionState::Session], SessionState::Scanning)
    }

    /// Session stopped or torn down
    pub fn session_closed(&mut self) -> Result<()> {
        self.transition(
            &[SessionState::Session, SessionState::Scanning],
            SessionState::Idle,
        )
    }

    pub fn set_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn clear_cancelled(&mut self) {
        self.cancelled = false;
    }

    /// Transport closed, from any state
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.cancelled = false;
    }
}
