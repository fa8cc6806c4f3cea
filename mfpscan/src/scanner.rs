//! High-level scanner interface

use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use mfpscan_core::{
    BasicParameters, DecodeOutcome, DeviceFamily, Encoder, Session, SessionState, SessionStatus,
    SourceStatus,
    constants::{MAX_COMMAND_LEN, response},
};
use mfpscan_transport::{Error as TransportError, TcpTransport, Transport};
use mfpscan_types::{ButtonState, ScanMode, ScanParameters, ScanSource};

use crate::{
    config::{DriverConfig, MIN_STAGING_CAPACITY},
    error::{Error, Result},
    staging::StagingBuffer,
};

/// Where the current job stands while `Scanning`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Streaming,
    FrameEnded { more_frames: bool },
    JobDone,
}

/// Multifunction scanner
///
/// Drives one device through one transport. Not shared between threads:
/// one scan is driven by one caller making repeated
/// [`read_scan_data`](Self::read_scan_data) calls.
///
/// # Examples
///
/// ```no_run
/// use mfpscan::{DeviceFamily, DriverConfig, Scanner};
///
/// fn main() -> mfpscan::Result<()> {
///     let config = DriverConfig::new(DeviceFamily::Family4);
///     let mut scanner = Scanner::tcp("192.168.1.50", 54921, config);
///
///     scanner.connect()?;
///     scanner.set_resolution(300, 300)?;
///     scanner.start_scan()?;
///
///     let mut image = Vec::new();
///     let mut buf = [0u8; 8192];
///     loop {
///         match scanner.read_scan_data(&mut buf) {
///             Ok(n) => image.extend_from_slice(&buf[..n]),
///             Err(e) if e.is_end_of_stream() => break,
///             Err(e) => return Err(e),
///         }
///     }
///
///     scanner.cancel_scan()?;
///     scanner.disconnect()?;
///     Ok(())
/// }
/// ```
pub struct Scanner {
    transport: Box<dyn Transport>,
    encoder: Encoder,
    session: Session,
    params: ScanParameters,
    config: DriverConfig,
    staging: Option<StagingBuffer>,
    frame: FrameState,

    /// Terminal outcome held back while its data went out first
    pending: Option<DecodeOutcome>,

    /// Geometry reported for the current job
    geometry: Option<BasicParameters>,
}

impl Scanner {
    pub fn new(transport: impl Transport + 'static, mut config: DriverConfig) -> Self {
        config.staging_capacity = config.staging_capacity.max(MIN_STAGING_CAPACITY);
        Self {
            transport: Box::new(transport),
            encoder: Encoder::with_jpeg_scratch_limit(config.family, config.jpeg_scratch_limit),
            session: Session::new(),
            params: ScanParameters::default(),
            config,
            staging: None,
            frame: FrameState::JobDone,
            pending: None,
            geometry: None,
        }
    }

    /// Create a scanner on a network-attached device
    pub fn tcp(addr: impl Into<String>, port: u16, config: DriverConfig) -> Self {
        let transport = TcpTransport::new(addr, port).with_connect_timeout(config.timeout);
        Self::new(transport, config)
    }

    pub fn family(&self) -> DeviceFamily {
        self.config.family
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn parameters(&self) -> &ScanParameters {
        &self.params
    }

    /// Page geometry the device reported for the current job
    pub fn geometry(&self) -> Option<&BasicParameters> {
        self.geometry.as_ref()
    }

    pub fn is_staging_allocated(&self) -> bool {
        self.staging.is_some()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.session.is_open() && self.transport.is_open()
    }

    // Parameters

    fn ensure_configurable(&self) -> Result<()> {
        if self.session.in_session() {
            return Err(Error::Busy(format!(
                "parameters are fixed while {}",
                self.session.state()
            )));
        }
        Ok(())
    }

    pub fn set_scan_mode(&mut self, mode: ScanMode) -> Result<()> {
        self.ensure_configurable()?;
        self.params.mode = mode;
        Ok(())
    }

    pub fn set_resolution(&mut self, x: u32, y: u32) -> Result<()> {
        self.ensure_configurable()?;
        self.params.set_resolution(x, y)?;
        Ok(())
    }

    pub fn set_brightness(&mut self, value: i32) -> Result<()> {
        self.ensure_configurable()?;
        self.params.set_brightness(value)?;
        Ok(())
    }

    pub fn set_contrast(&mut self, value: i32) -> Result<()> {
        self.ensure_configurable()?;
        self.params.set_contrast(value)?;
        Ok(())
    }

    pub fn set_source(&mut self, source: ScanSource) -> Result<()> {
        self.ensure_configurable()?;
        if source == ScanSource::AdfDuplex && !self.encoder.profile().duplex {
            return Err(Error::Unsupported(format!(
                "{} has no duplex feeder",
                self.config.family
            )));
        }
        self.params.source = source;
        Ok(())
    }

    pub fn set_compression(&mut self, enabled: bool) -> Result<()> {
        self.ensure_configurable()?;
        self.params.compression = enabled;
        Ok(())
    }

    /// Set the crop rectangle in device pixels
    pub fn set_scan_dimensions(
        &mut self,
        offset_x: u32,
        width: u32,
        offset_y: u32,
        height: u32,
    ) -> Result<()> {
        self.ensure_configurable()?;
        self.params.set_crop(offset_x, width, offset_y, height)?;
        Ok(())
    }

    // Lifecycle

    /// Connect to device
    ///
    /// Opens the transport and checks the device answers a session
    /// handshake. On failure the connection is torn down again and the
    /// original error returned.
    pub fn connect(&mut self) -> Result<()> {
        if self.session.is_open() {
            return Err(Error::Busy("already connected".into()));
        }

        info!("Connecting to {}...", self.transport.remote_addr());

        if let Err(e) = self.try_connect() {
            if let Err(cleanup) = self.disconnect() {
                warn!("Cleanup after failed connect also failed: {}", cleanup);
            }
            return Err(e);
        }

        info!("Connected to {} ({})", self.transport.remote_addr(), self.config.family);
        Ok(())
    }

    fn try_connect(&mut self) -> Result<()> {
        self.transport.open()?;
        self.session.transport_opened()?;
        self.open_session()?;
        self.stop_session()
    }

    /// Disconnect from device
    ///
    /// A scan in progress is cancelled first.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.session.is_scanning() {
            if let Err(e) = self.cancel_scan() {
                warn!("Failed to cancel scan: {}", e);
            }
        }
        if self.session.in_session() {
            if let Err(e) = self.stop_session() {
                warn!("Failed to stop session: {}", e);
            }
        }
        self.release_staging();

        let result = self.transport.close();
        self.session.close();

        info!("Disconnected");
        Ok(result?)
    }

    /// Start a scan, or the next frame of a multi-page job
    pub fn start_scan(&mut self) -> Result<()> {
        match self.session.state() {
            SessionState::Idle => self.start_job(),
            SessionState::Scanning => self.start_next_frame(),
            state => Err(Error::Busy(format!("cannot start a scan while {}", state))),
        }
    }

    fn start_job(&mut self) -> Result<()> {
        info!("Starting scan: {}", self.params);

        self.session.clear_cancelled();
        self.pending = None;

        if let Err(e) = self.negotiate() {
            warn!("Scan start failed: {}", e);
            self.teardown();
            return Err(e);
        }

        info!("Scanning");
        Ok(())
    }

    /// Session, flush, then basic parameters, source select and main
    /// parameters in that order
    fn negotiate(&mut self) -> Result<()> {
        self.open_session()?;
        self.flush()?;

        self.encoder.set_parameters(self.params.clone());

        let mut cmd = [0u8; MAX_COMMAND_LEN];
        let n = self.encoder.encode_basic_parameter_block(&mut cmd)?;
        self.send(&cmd[..n])?;
        let reply = self.read_until_nul(response::BASIC_PARAMETERS_MAX_LEN)?;
        let geometry = self.encoder.decode_basic_parameter_resp(&reply)?;
        debug!("Device geometry: {}", geometry);

        let n = self.encoder.encode_source_select_block(&mut cmd)?;
        self.send(&cmd[..n])?;
        let reply = self.read_exact(response::SOURCE_STATUS_LEN)?;
        let status = self.encoder.decode_source_status_resp(&reply)?;
        let source = self.resolve_source(status)?;

        let mut params = self.params.clone();
        params.source = source;
        self.encoder.set_parameters(params);

        let n = self.encoder.encode_parameter_block(&mut cmd)?;
        self.send(&cmd[..n])?;

        self.encoder.new_page();
        self.staging = Some(StagingBuffer::new(self.config.staging_capacity));
        self.frame = FrameState::Streaming;
        self.geometry = Some(geometry);
        self.session.scan_started()?;
        Ok(())
    }

    fn resolve_source(&self, status: SourceStatus) -> Result<ScanSource> {
        let loaded = status == SourceStatus::DocumentsLoaded;
        debug!("Feeder {}", if loaded { "loaded" } else { "empty" });

        match self.params.source {
            ScanSource::Auto if loaded => Ok(ScanSource::AdfSimplex),
            ScanSource::Auto | ScanSource::Flatbed => Ok(ScanSource::Flatbed),
            source if loaded => Ok(source),
            _ => Err(Error::NoDocuments),
        }
    }

    fn start_next_frame(&mut self) -> Result<()> {
        match self.frame {
            FrameState::Streaming => Err(Error::Busy("current frame is still streaming".into())),
            FrameState::FrameEnded { more_frames: true } => {
                let mut cmd = [0u8; MAX_COMMAND_LEN];
                let sent = self
                    .encoder
                    .encode_parameter_block_blank(&mut cmd)
                    .map_err(Error::from)
                    .and_then(|n| self.send(&cmd[..n]));
                if let Err(e) = sent {
                    self.teardown();
                    return Err(e);
                }

                self.encoder.new_page();
                self.frame = FrameState::Streaming;
                info!("Scanning next frame");
                Ok(())
            }
            FrameState::FrameEnded { more_frames: false } => {
                debug!("No frames left in this job");
                self.teardown();
                Err(Error::NoDocuments)
            }
            FrameState::JobDone => {
                self.teardown();
                self.start_job()
            }
        }
    }

    /// Read decoded image bytes
    ///
    /// Returns the number of bytes written into `buf`, which may be zero
    /// while the device has nothing new. The end of a frame or job is
    /// reported as [`Error::EndOfStream`].
    pub fn read_scan_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.session.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(outcome) = self.pending.take() {
            return self.finish_outcome(outcome);
        }
        if !self.session.is_scanning() || self.frame != FrameState::Streaming {
            return Err(Error::EndOfStream);
        }

        let Some(staging) = self.staging.as_mut() else {
            return Err(Error::EndOfStream);
        };

        if !staging.is_full() {
            match self.transport.read(staging.spare_mut(), Duration::ZERO) {
                Ok(n) => staging.commit(n),
                Err(e) => {
                    warn!("Transport failed mid-scan: {}", e);
                    self.teardown();
                    return Err(e.into());
                }
            }
        }

        let decoded = self.encoder.decode_scan_data(staging.data(), buf);
        staging.consume(decoded.consumed);
        trace!(
            consumed = decoded.consumed,
            produced = decoded.produced,
            buffered = staging.len(),
            "Decoded scan data: {}",
            decoded.outcome
        );

        if decoded.outcome.is_terminal() && decoded.produced > 0 {
            // Hand out the data first, report the outcome next call
            self.pending = Some(decoded.outcome);
            return Ok(decoded.produced);
        }
        if decoded.outcome.is_resumable() {
            return Ok(decoded.produced);
        }
        self.finish_outcome(decoded.outcome)
    }

    fn finish_outcome(&mut self, outcome: DecodeOutcome) -> Result<usize> {
        match outcome {
            DecodeOutcome::Continue | DecodeOutcome::NeedMoreInput => Ok(0),
            DecodeOutcome::EndOfFrame { more_frames } => {
                info!("End of frame (more frames: {})", more_frames);
                self.frame = FrameState::FrameEnded { more_frames };
                Err(Error::EndOfStream)
            }
            DecodeOutcome::EndOfData => {
                info!("End of scan data");
                self.frame = FrameState::JobDone;
                Err(Error::EndOfStream)
            }
            DecodeOutcome::Cancelled => {
                info!("Device acknowledged cancel");
                self.teardown();
                self.session.set_cancelled();
                Err(Error::Cancelled)
            }
            DecodeOutcome::Fault(fault) => {
                warn!("Device fault: {}", fault);
                self.teardown();
                Err(fault.into())
            }
            DecodeOutcome::Unsupported => {
                self.teardown();
                Err(Error::Unsupported(format!(
                    "scan data encoding not supported by {}",
                    self.config.family
                )))
            }
            DecodeOutcome::Invalid => {
                self.teardown();
                Err(Error::Invalid("malformed scan data".into()))
            }
            DecodeOutcome::OutOfMemory => {
                self.teardown();
                Err(Error::OutOfMemory)
            }
        }
    }

    /// Cancel the current scan
    ///
    /// Does nothing unless scanning. Otherwise the cancel block is sent,
    /// trailing bytes are flushed and the session is stopped. The driver is
    /// `Idle` afterwards even if one of those steps failed; the first
    /// failure is returned.
    pub fn cancel_scan(&mut self) -> Result<()> {
        if !self.session.is_scanning() {
            debug!("No scan to cancel");
            return Ok(());
        }

        info!("Cancelling scan...");
        let mut first_error = None;

        if matches!(
            self.frame,
            FrameState::Streaming | FrameState::FrameEnded { more_frames: true }
        ) {
            let mut cmd = [0u8; MAX_COMMAND_LEN];
            let sent = self
                .encoder
                .encode_cancel(&mut cmd)
                .map_err(Error::from)
                .and_then(|n| self.send(&cmd[..n]));
            if let Err(e) = sent {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.flush() {
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.stop_session() {
            first_error.get_or_insert(e);
        }
        self.release_staging();
        self.session.set_cancelled();

        info!("Scan cancelled");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Read the front-panel buttons
    pub fn check_sensor(&mut self) -> Result<ButtonState> {
        if !self.session.is_idle() {
            return Err(Error::Busy(format!(
                "cannot query buttons while {}",
                self.session.state()
            )));
        }

        self.open_session()?;
        let result = self.query_buttons();
        let stopped = self.stop_session();

        let buttons = result?;
        stopped?;
        debug!("Buttons: {}", buttons);
        Ok(buttons)
    }

    fn query_buttons(&mut self) -> Result<ButtonState> {
        let mut cmd = [0u8; MAX_COMMAND_LEN];
        let n = self.encoder.encode_button_query(&mut cmd)?;
        self.send(&cmd[..n])?;

        let reply = self.read_exact(response::BUTTON_QUERY.len())?;
        self.encoder.decode_button_query_resp(&reply)?;

        let reply = self.read_exact(response::BUTTON_STATE_LEN)?;
        Ok(self.encoder.decode_button_state_resp(&reply)?)
    }

    // Helper methods

    fn open_session(&mut self) -> Result<()> {
        let mut cmd = [0u8; MAX_COMMAND_LEN];
        let n = self.encoder.encode_session_start(&mut cmd)?;
        self.send(&cmd[..n])?;

        let reply = self.read_exact(response::SESSION_LEN)?;
        match self.encoder.decode_session_resp(&reply)? {
            SessionStatus::Ready => {
                self.session.session_opened()?;
                debug!("Session open");
                Ok(())
            }
            SessionStatus::Busy => Err(Error::Busy("device is serving another client".into())),
        }
    }

    /// Stop the session; the state is `Idle` afterwards either way
    fn stop_session(&mut self) -> Result<()> {
        let result = self.send_session_stop();
        if self.session.in_session() {
            self.session.session_closed()?;
        }
        debug!("Session closed");
        result
    }

    fn send_session_stop(&mut self) -> Result<()> {
        let mut cmd = [0u8; MAX_COMMAND_LEN];
        let n = self.encoder.encode_session_stop(&mut cmd)?;
        self.send(&cmd[..n])?;

        let reply = self.read_exact(response::SESSION_LEN)?;
        if self.encoder.decode_session_resp(&reply)? == SessionStatus::Busy {
            debug!("Device reported busy while closing the session");
        }
        Ok(())
    }

    /// Best-effort return to `Idle` after a failed or finished job
    fn teardown(&mut self) {
        if self.session.in_session() {
            if let Err(e) = self.flush() {
                warn!("Flush during teardown failed: {}", e);
            }
            if let Err(e) = self.stop_session() {
                warn!("Failed to stop session: {}", e);
            }
        }
        self.release_staging();
    }

    fn release_staging(&mut self) {
        if self.staging.take().is_some() {
            debug!("Released staging buffer");
        }
        self.encoder.new_page();
        self.frame = FrameState::JobDone;
        self.pending = None;
        self.geometry = None;
    }

    fn send(&mut self, block: &[u8]) -> Result<()> {
        trace!("Sending block: {}", hex::encode(block));
        self.transport.write(block)?;
        Ok(())
    }

    fn deadline_remaining(deadline: Instant) -> Result<Duration> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::ReadTimeout.into());
        }
        Ok(remaining)
    }

    /// Read exactly `len` bytes within the command timeout
    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.config.timeout;
        let mut buf = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            let remaining = Self::deadline_remaining(deadline)?;
            filled += self.transport.read(&mut buf[filled..], remaining)?;
        }

        trace!("Received: {}", hex::encode(&buf));
        Ok(buf)
    }

    /// Read up to and including a NUL terminator
    ///
    /// One byte at a time, so nothing after the terminator is taken.
    fn read_until_nul(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.config.timeout;
        let mut reply = Vec::new();
        let mut byte = [0u8; 1];

        while reply.last() != Some(&response::BASIC_PARAMETERS_END) {
            if reply.len() == max_len {
                return Err(Error::Invalid(format!(
                    "response not terminated within {} bytes",
                    max_len
                )));
            }
            let remaining = Self::deadline_remaining(deadline)?;
            if self.transport.read(&mut byte, remaining)? == 1 {
                reply.push(byte[0]);
            }
        }

        trace!("Received: {:?}", String::from_utf8_lossy(&reply));
        Ok(reply)
    }

    /// Drain stale bytes until the device stays quiet for one poll
    ///
    /// Bounded by the flush ceiling even if data keeps arriving.
    fn flush(&mut self) -> Result<usize> {
        let ceiling = Instant::now() + self.config.flush_ceiling;
        let mut scratch = [0u8; 512];
        let mut dropped = 0;

        loop {
            let left = ceiling.saturating_duration_since(Instant::now());
            if left.is_zero() {
                warn!("Device still sending after flush ceiling, {} bytes dropped", dropped);
                break;
            }
            let n = self.transport.read(&mut scratch, self.config.flush_poll.min(left))?;
            if n == 0 {
                break;
            }
            dropped += n;
        }

        if dropped > 0 {
            debug!("Flushed {} stale bytes", dropped);
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use mfpscan_core::{CommandBlock, Opcode, constants::block_type};
    use mfpscan_transport::MockTransport;
    use mockall::mock;
    use pretty_assertions::assert_eq;

    const READY: [u8; 5] = response::SESSION_READY;
    const GEOMETRY: &[u8] = b"300,300,2,209,2480,294,3507,\0";
    const LOADED: [u8; 1] = [response::SOURCE_READY];
    const EMPTY: [u8; 1] = [response::SOURCE_EMPTY];

    fn config(family: DeviceFamily) -> DriverConfig {
        DriverConfig::new(family)
            .with_timeout(Duration::from_millis(50))
            .with_flush_poll(Duration::from_millis(1))
            .with_flush_ceiling(Duration::from_millis(20))
    }

    fn connected(family: DeviceFamily) -> (Scanner, MockTransport) {
        let mock = MockTransport::new();
        mock.queue_reply(READY).queue_reply(READY);

        let mut scanner = Scanner::new(mock.clone(), config(family));
        scanner.set_scan_mode(ScanMode::Gray).unwrap();
        scanner.set_scan_dimensions(0, 4, 0, 1).unwrap();
        scanner.connect().unwrap();
        mock.clear_writes();
        (scanner, mock)
    }

    /// Replies for K, I and D, then `scan_data` released by the X block
    fn script_job(mock: &MockTransport, feeder: [u8; 1], scan_data: &[u8]) {
        mock.queue_reply(READY)
            .queue_reply(GEOMETRY)
            .queue_reply(feeder)
            .queue_reply(scan_data);
    }

    fn gray_block(family: DeviceFamily, payload: &[u8]) -> Vec<u8> {
        let profile = family.profile();
        let mut block = vec![0u8; profile.header_len()];
        block[0] = block_type::GRAY_RAW;
        block[profile.length_offset..].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        block.extend_from_slice(payload);
        block
    }

    fn opcodes(mock: &MockTransport) -> Vec<Opcode> {
        mock.writes()
            .iter()
            .map(|w| CommandBlock::decode(w).unwrap().opcode)
            .collect()
    }

    /// Read until the frame ends or an error shows up
    fn read_frame(scanner: &mut Scanner) -> (Vec<u8>, Error) {
        let mut image = Vec::new();
        let mut buf = [0u8; 64];
        for _ in 0..1000 {
            match scanner.read_scan_data(&mut buf) {
                Ok(n) => image.extend_from_slice(&buf[..n]),
                Err(e) => return (image, e),
            }
        }
        panic!("Scan never finished");
    }

    #[test]
    fn test_connect_and_disconnect() {
        let (mut scanner, mock) = connected(DeviceFamily::Family2);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert!(scanner.is_connected());

        scanner.disconnect().unwrap();
        assert_eq!(scanner.state(), SessionState::Closed);
        assert!(!mock.is_open());
        // No session was open, so nothing to stop
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_busy_device_on_connect() {
        let mock = MockTransport::new();
        mock.queue_reply(response::SESSION_BUSY);
        let mut scanner = Scanner::new(mock.clone(), config(DeviceFamily::Family2));

        let err = scanner.connect().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Busy);
        assert_eq!(scanner.state(), SessionState::Closed);
        assert!(!mock.is_open());
    }

    #[test]
    fn test_single_page_scan() {
        let family = DeviceFamily::Family2;
        let (mut scanner, mock) = connected(family);

        let mut data = gray_block(family, b"abcd");
        data.extend_from_slice(&gray_block(family, b"efgh"));
        data.push(block_type::END_OF_FRAME_LAST);
        script_job(&mock, EMPTY, &data);

        scanner.start_scan().unwrap();
        assert_eq!(scanner.state(), SessionState::Scanning);
        assert!(scanner.is_staging_allocated());
        assert_eq!(scanner.geometry().map(|g| g.width_px), Some(2480));
        assert_eq!(
            opcodes(&mock),
            vec![
                Opcode::SessionOpen,
                Opcode::BasicParameters,
                Opcode::SourceSelect,
                Opcode::Parameters
            ]
        );

        let params = CommandBlock::decode(&mock.writes()[3]).unwrap();
        assert_eq!(params.get("M"), Some("GRAY64"));
        assert_eq!(params.get("C"), Some("RLENGTH"));
        assert_eq!(params.get("A"), Some("0,0,4,1"));

        let (image, end) = read_frame(&mut scanner);
        assert_eq!(image, b"abcdefgh");
        assert!(end.is_end_of_stream());

        // Feeder exhausted: next frame request ends the job
        mock.queue_reply(READY);
        assert_eq!(scanner.start_scan().unwrap_err().kind(), ErrorKind::NoDocuments);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert!(!scanner.is_staging_allocated());
    }

    #[test]
    fn test_fragmented_scan_data() {
        let family = DeviceFamily::Family4;
        let (mut scanner, mock) = connected(family);
        mock.set_read_chunk(3);

        let payload: Vec<u8> = (0..100u8).collect();
        let mut data = gray_block(family, &payload);
        data.push(block_type::END_OF_DATA);
        script_job(&mock, EMPTY, &data);

        scanner.start_scan().unwrap();
        let (image, end) = read_frame(&mut scanner);
        assert_eq!(image, payload);
        assert!(end.is_end_of_stream());
    }

    #[test]
    fn test_failed_parameter_exchange_leaves_idle() {
        let family = DeviceFamily::Family2;
        let (mut scanner, mock) = connected(family);

        // Writes so far: K, E. This job: K(2), I(3), D(4), X(5)
        mock.fail_write(5);
        mock.queue_reply(READY)
            .queue_reply(GEOMETRY)
            .queue_reply(EMPTY)
            .queue_reply(READY);

        let err = scanner.start_scan().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert!(!scanner.is_staging_allocated());
        assert_eq!(mock.writes().last().map(|w| w.to_vec()), Some(b"\x1bE\n\x80".to_vec()));

        let mut data = gray_block(family, b"ok");
        data.push(block_type::END_OF_DATA);
        script_job(&mock, EMPTY, &data);

        scanner.start_scan().unwrap();
        assert_eq!(scanner.state(), SessionState::Scanning);
        assert!(scanner.is_staging_allocated());
        assert_eq!(read_frame(&mut scanner).0, b"ok");
    }

    #[test]
    fn test_data_before_cancel_ack() {
        let family = DeviceFamily::Family3;
        let (mut scanner, mock) = connected(family);

        let mut data = gray_block(family, b"last");
        data.push(block_type::CANCEL_ACK);
        script_job(&mock, EMPTY, &data);
        mock.queue_reply(READY);

        scanner.start_scan().unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(scanner.read_scan_data(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"last");

        assert_eq!(scanner.read_scan_data(&mut buf).unwrap_err().kind(), ErrorKind::Cancelled);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert!(!scanner.is_staging_allocated());

        // Latched until the next scan
        assert_eq!(scanner.read_scan_data(&mut buf).unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_cancel_mid_scan() {
        let family = DeviceFamily::Family2;
        let (mut scanner, mock) = connected(family);

        // Block announces more than is ever sent
        let data = gray_block(family, &[7u8; 40]);
        script_job(&mock, EMPTY, &data[..20]);

        scanner.start_scan().unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(scanner.read_scan_data(&mut buf).unwrap(), 17);

        // Cancel is answered by trailing data and the ack, both flushed
        mock.queue_reply([7, 7, 7, block_type::CANCEL_ACK]).queue_reply(READY);
        mock.clear_writes();
        scanner.cancel_scan().unwrap();

        assert_eq!(opcodes(&mock), vec![Opcode::Cancel, Opcode::SessionClose]);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert!(!scanner.is_staging_allocated());
        assert_eq!(mock.pending_read(), 0);
        assert_eq!(scanner.read_scan_data(&mut buf).unwrap_err().kind(), ErrorKind::Cancelled);

        // Idempotent
        scanner.cancel_scan().unwrap();
        assert_eq!(mock.writes().len(), 2);

        // A new scan clears the latch
        let mut data = gray_block(family, b"next");
        data.push(block_type::END_OF_DATA);
        script_job(&mock, EMPTY, &data);
        scanner.start_scan().unwrap();
        assert_eq!(read_frame(&mut scanner).0, b"next");
    }

    #[test]
    fn test_multi_page_feeder() {
        let family = DeviceFamily::Family4;
        let (mut scanner, mock) = connected(family);
        scanner.set_source(ScanSource::AdfSimplex).unwrap();

        let mut page1 = gray_block(family, b"page");
        page1.push(block_type::END_OF_FRAME);
        script_job(&mock, LOADED, &page1);

        scanner.start_scan().unwrap();
        let params = CommandBlock::decode(&mock.writes()[3]).unwrap();
        assert_eq!(params.get("D"), Some("SIN"));

        let (image, end) = read_frame(&mut scanner);
        assert_eq!(image, b"page");
        assert!(end.is_end_of_stream());
        assert!(scanner.read_scan_data(&mut [0u8; 8]).unwrap_err().is_end_of_stream());

        let mut page2 = gray_block(family, b"two!");
        page2.push(block_type::END_OF_FRAME_LAST);
        mock.queue_reply(&page2);
        mock.clear_writes();

        scanner.start_scan().unwrap();
        assert_eq!(mock.writes(), vec![&b"\x1bX\n\x80"[..]]);
        assert_eq!(read_frame(&mut scanner).0, b"two!");

        mock.queue_reply(READY);
        assert_eq!(scanner.start_scan().unwrap_err().kind(), ErrorKind::NoDocuments);
        assert_eq!(scanner.state(), SessionState::Idle);
    }

    #[test]
    fn test_empty_feeder() {
        let (mut scanner, mock) = connected(DeviceFamily::Family4);
        scanner.set_source(ScanSource::AdfDuplex).unwrap();
        mock.queue_reply(READY)
            .queue_reply(GEOMETRY)
            .queue_reply(EMPTY)
            .queue_reply(READY);

        assert_eq!(scanner.start_scan().unwrap_err().kind(), ErrorKind::NoDocuments);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert_eq!(
            opcodes(&mock),
            vec![
                Opcode::SessionOpen,
                Opcode::BasicParameters,
                Opcode::SourceSelect,
                Opcode::SessionClose
            ]
        );
    }

    #[test]
    fn test_auto_source_falls_back_to_flatbed() {
        let family = DeviceFamily::Family5;
        let (mut scanner, mock) = connected(family);
        script_job(&mock, EMPTY, &[block_type::END_OF_DATA]);

        scanner.start_scan().unwrap();
        assert_eq!(scanner.state(), SessionState::Scanning);
        assert!(read_frame(&mut scanner).1.is_end_of_stream());
    }

    #[test]
    fn test_paper_jam_mid_scan() {
        let family = DeviceFamily::Family2;
        let (mut scanner, mock) = connected(family);
        script_job(&mock, EMPTY, &[block_type::PAPER_JAM]);
        mock.queue_reply(READY);

        scanner.start_scan().unwrap();
        let (image, err) = read_frame(&mut scanner);
        assert!(image.is_empty());
        assert_eq!(err.kind(), ErrorKind::PaperJam);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert!(!scanner.is_staging_allocated());
    }

    #[test]
    fn test_malformed_source_status() {
        let (mut scanner, mock) = connected(DeviceFamily::Family2);
        mock.queue_reply(READY)
            .queue_reply(GEOMETRY)
            .queue_reply([0x81])
            .queue_reply(READY);

        assert_eq!(scanner.start_scan().unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(scanner.state(), SessionState::Idle);
    }

    #[test]
    fn test_stale_bytes_are_flushed() {
        let family = DeviceFamily::Family2;
        let (mut scanner, mock) = connected(family);

        let mut session_reply = READY.to_vec();
        session_reply.extend_from_slice(&[block_type::GRAY_RAW, 0xFF, 0xFF, 1, 2, 3]);
        let mut data = gray_block(family, b"good");
        data.push(block_type::END_OF_DATA);
        mock.queue_reply(session_reply)
            .queue_reply(GEOMETRY)
            .queue_reply(EMPTY)
            .queue_reply(&data);

        scanner.start_scan().unwrap();
        assert_eq!(read_frame(&mut scanner).0, b"good");
    }

    #[test]
    fn test_parameters_fixed_during_scan() {
        let family = DeviceFamily::Family2;
        let (mut scanner, mock) = connected(family);
        script_job(&mock, EMPTY, &gray_block(family, b"abcd"));
        scanner.start_scan().unwrap();

        assert_eq!(scanner.set_resolution(600, 600).unwrap_err().kind(), ErrorKind::Busy);
        assert_eq!(scanner.set_scan_mode(ScanMode::Color).unwrap_err().kind(), ErrorKind::Busy);
        assert_eq!(scanner.start_scan().unwrap_err().kind(), ErrorKind::Busy);
        assert_eq!(scanner.check_sensor().unwrap_err().kind(), ErrorKind::Busy);
    }

    #[test]
    fn test_parameter_validation() {
        let mut scanner = Scanner::new(MockTransport::new(), config(DeviceFamily::Family2));
        assert_eq!(scanner.set_brightness(51).unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(scanner.set_contrast(-51).unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(scanner.set_resolution(0, 300).unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(
            scanner.set_scan_dimensions(0, 0, 0, 10).unwrap_err().kind(),
            ErrorKind::Invalid
        );
        assert_eq!(
            scanner.set_source(ScanSource::AdfDuplex).unwrap_err().kind(),
            ErrorKind::Unsupported
        );

        scanner.set_brightness(-50).unwrap();
        scanner.set_compression(false).unwrap();
        assert_eq!(scanner.parameters().brightness(), -50);
        assert!(!scanner.parameters().compression);
    }

    #[test]
    fn test_start_scan_requires_connection() {
        let mut scanner = Scanner::new(MockTransport::new(), config(DeviceFamily::Family2));
        assert_eq!(scanner.start_scan().unwrap_err().kind(), ErrorKind::Busy);
        assert!(scanner.read_scan_data(&mut [0u8; 4]).unwrap_err().is_end_of_stream());
        scanner.cancel_scan().unwrap();
    }

    #[test]
    fn test_check_sensor() {
        let (mut scanner, mock) = connected(DeviceFamily::Family4);
        let mut buttons = response::BUTTON_QUERY.to_vec();
        buttons.extend_from_slice(&[0x09, 0x10, 0x03, 0x20, 0x05, 0, 0, 0, 0]);
        mock.queue_reply(READY).queue_reply(&buttons).queue_reply(READY);

        let state = scanner.check_sensor().unwrap();
        assert!(state.file && state.image);
        assert!(!state.email && !state.ocr);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert_eq!(
            opcodes(&mock),
            vec![Opcode::SessionOpen, Opcode::ButtonQuery, Opcode::SessionClose]
        );
    }

    #[test]
    fn test_transport_failure_mid_scan() {
        let family = DeviceFamily::Family4;
        let (mut scanner, mock) = connected(family);
        let data = gray_block(family, &[1u8; 32]);
        script_job(&mock, EMPTY, &data[..20]);

        scanner.start_scan().unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(scanner.read_scan_data(&mut buf).unwrap(), 8);

        mock.fail_read();
        mock.queue_reply(READY);
        let err = scanner.read_scan_data(&mut buf).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(scanner.state(), SessionState::Idle);
        assert!(!scanner.is_staging_allocated());
        assert_eq!(mock.writes().last().map(|w| w.to_vec()), Some(b"\x1bE\n\x80".to_vec()));
        assert!(scanner.read_scan_data(&mut buf).unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_flush_ceiling_bounds_chatty_device() {
        let family = DeviceFamily::Family2;
        let (mut scanner, mock) = connected(family);
        let ceiling = Duration::from_millis(20);
        let limit = ceiling + Duration::from_secs(2);

        script_job(&mock, EMPTY, b"");
        mock.set_chatter([0xAAu8]);

        let started = Instant::now();
        scanner.start_scan().unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= ceiling && elapsed < limit, "{:?}", elapsed);
        assert_eq!(scanner.state(), SessionState::Scanning);

        // Nothing answers the cancel itself, the session close does
        mock.queue_reply(b"").queue_reply(READY);
        let started = Instant::now();
        scanner.cancel_scan().unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= ceiling && elapsed < limit, "{:?}", elapsed);

        assert_eq!(scanner.state(), SessionState::Idle);
        assert!(!scanner.is_staging_allocated());
    }

    #[test]
    fn test_undersized_staging_is_clamped() {
        let family = DeviceFamily::Family4;
        let mut undersized = config(family);
        undersized.staging_capacity = 4;

        let mock = MockTransport::new();
        mock.queue_reply(READY).queue_reply(READY);
        let mut scanner = Scanner::new(mock.clone(), undersized);
        scanner.set_scan_mode(ScanMode::Gray).unwrap();
        scanner.connect().unwrap();

        let payload: Vec<u8> = (0..150u8).collect();
        let mut data = gray_block(family, &payload);
        data.push(block_type::END_OF_DATA);
        script_job(&mock, EMPTY, &data);

        scanner.start_scan().unwrap();
        let (image, end) = read_frame(&mut scanner);
        assert_eq!(image, payload);
        assert!(end.is_end_of_stream());
    }

    #[test]
    fn test_disconnect_cancels_running_scan() {
        let family = DeviceFamily::Family2;
        let (mut scanner, mock) = connected(family);
        let data = gray_block(family, &[5u8; 40]);
        script_job(&mock, EMPTY, &data[..30]);
        scanner.start_scan().unwrap();

        // Unread scan data is still queued when the cancel goes out
        mock.queue_reply(b"").queue_reply(READY);
        mock.clear_writes();
        scanner.disconnect().unwrap();

        assert_eq!(opcodes(&mock), vec![Opcode::Cancel, Opcode::SessionClose]);
        assert_eq!(scanner.state(), SessionState::Closed);
        assert!(!scanner.is_staging_allocated());
        assert!(!mock.is_open());
    }

    mock! {
        Link {}

        impl Transport for Link {
            fn open(&mut self) -> mfpscan_transport::Result<()>;
            fn close(&mut self) -> mfpscan_transport::Result<()>;
            fn is_open(&self) -> bool;
            fn write(&mut self, data: &[u8]) -> mfpscan_transport::Result<usize>;
            fn read(&mut self, buf: &mut [u8], timeout: Duration) -> mfpscan_transport::Result<usize>;
            fn remote_addr(&self) -> String;
        }
    }

    #[test]
    fn test_connect_failure_keeps_original_error() {
        let mut link = MockLink::new();
        link.expect_remote_addr().returning(|| "link".to_string());
        link.expect_is_open().returning(|| false);
        link.expect_open().times(1).returning(|| Ok(()));
        link.expect_write().times(1).returning(|_| {
            Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "link down",
            )))
        });
        // Cleanup fails too, but must not replace the write error
        link.expect_close()
            .times(1)
            .returning(|| Err(TransportError::ConnectionClosed));

        let mut scanner = Scanner::new(link, config(DeviceFamily::Family2));
        let err = scanner.connect().unwrap_err();

        assert!(matches!(err, Error::Transport(TransportError::Io(_))));
        assert_eq!(scanner.state(), SessionState::Closed);
    }
}
