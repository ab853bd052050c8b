use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camlink_frame::ChannelKind;
use camlink_transport::LinkStream;
use tracing::{debug, info, trace, warn};

use crate::device::{CaptureGuard, MicDevice};
use crate::error::{connection_lost, Result, SessionError};
use crate::session::{log_session_end, ClientSlot, SessionState};

const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(5);

/// Settings shared by both audio channels.
///
/// There is no write timeout: a slow reader on the uplink holds back the
/// capture loop instead of being disconnected.
#[derive(Debug, Clone)]
pub struct AudioChannelConfig {
    pub buffer_bytes: usize,
    /// Applied to downlink sockets only.
    pub read_timeout: Option<Duration>,
    pub handoff_timeout: Duration,
}

/// Streams microphone PCM to one client at a time.
pub struct UplinkChannel {
    slot: ClientSlot<SessionState>,
    device: Arc<dyn MicDevice>,
    config: AudioChannelConfig,
}

impl UplinkChannel {
    pub fn new(device: Arc<dyn MicDevice>, config: AudioChannelConfig) -> Self {
        Self {
            slot: ClientSlot::new(),
            device,
            config,
        }
    }

    /// Replace the current client with `stream` and start streaming to it on
    /// a new thread.
    pub fn handle_connection(self: &Arc<Self>, stream: LinkStream) -> Result<()> {
        let state = Arc::new(SessionState::new(ChannelKind::MicAudio, &stream)?);
        let previous = self.slot.install(Arc::clone(&state));
        info!(
            channel = %ChannelKind::MicAudio,
            session = state.id(),
            peer = ?state.peer(),
            "client connected"
        );

        let channel = Arc::clone(self);
        let worker = Arc::clone(&state);
        let spawned = thread::Builder::new()
            .name("camlink-mic-session".to_string())
            .spawn(move || {
                if let Some(previous) = previous {
                    channel.await_handoff(&previous);
                }
                let result = channel.stream_capture(&worker, stream);
                log_session_end(&worker, &result);
                channel.slot.finish(&worker);
            });
        if let Err(err) = spawned {
            self.slot.finish(&state);
            return Err(SessionError::Spawn(err));
        }
        Ok(())
    }

    fn await_handoff(&self, previous: &SessionState) {
        if !previous.wait_ended(self.config.handoff_timeout) {
            warn!(
                session = previous.id(),
                "previous mic session still holds the device"
            );
        }
    }

    fn stream_capture(&self, state: &SessionState, mut stream: LinkStream) -> Result<()> {
        if !state.is_streaming() {
            return Ok(());
        }
        let mut capture = CaptureGuard::new(self.device.open()?);
        debug!(session = state.id(), "microphone opened");

        let mut buf = vec![0u8; self.config.buffer_bytes];
        while state.is_streaming() {
            let read = capture.read_samples(&mut buf)?;
            if read == 0 {
                // Nothing is written while the mic is silent, so a vanished peer
                // goes unnoticed until samples flow again.
                trace!(session = state.id(), "microphone returned no samples");
                thread::sleep(EMPTY_READ_BACKOFF);
                continue;
            }
            stream.write_all(&buf[..read]).map_err(connection_lost)?;
        }
        Ok(())
    }

    pub(crate) fn close_current(&self, timeout: Duration) {
        if let Some(state) = self.slot.close_current() {
            if !state.wait_ended(timeout) {
                warn!(session = state.id(), "mic session did not end in time");
            }
        }
    }
}
