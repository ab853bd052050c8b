use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camlink_frame::ChannelKind;
use camlink_transport::LinkStream;
use tracing::{debug, info, trace, warn};

use crate::device::{PlaybackGuard, SpeakerDevice};
use crate::error::{connection_lost, Result, SessionError};
use crate::session::{log_session_end, ClientSlot, SessionState};
use crate::uplink::AudioChannelConfig;

/// Plays PCM received from one client at a time.
pub struct DownlinkChannel {
    slot: ClientSlot<SessionState>,
    device: Arc<dyn SpeakerDevice>,
    config: AudioChannelConfig,
}

impl DownlinkChannel {
    pub fn new(device: Arc<dyn SpeakerDevice>, config: AudioChannelConfig) -> Self {
        Self {
            slot: ClientSlot::new(),
            device,
            config,
        }
    }

    /// Replace the current client with `stream` and start playing what it
    /// sends on a new thread.
    pub fn handle_connection(self: &Arc<Self>, stream: LinkStream) -> Result<()> {
        stream.set_read_timeout(self.config.read_timeout)?;
        let state = Arc::new(SessionState::new(ChannelKind::PcAudio, &stream)?);
        let previous = self.slot.install(Arc::clone(&state));
        info!(
            channel = %ChannelKind::PcAudio,
            session = state.id(),
            peer = ?state.peer(),
            "client connected"
        );

        let channel = Arc::clone(self);
        let worker = Arc::clone(&state);
        let spawned = thread::Builder::new()
            .name("camlink-speaker-session".to_string())
            .spawn(move || {
                if let Some(previous) = previous {
                    if !previous.wait_ended(channel.config.handoff_timeout) {
                        warn!(
                            session = previous.id(),
                            "previous speaker session still holds the device"
                        );
                    }
                }
                let result = channel.play_stream(&worker, stream);
                log_session_end(&worker, &result);
                channel.slot.finish(&worker);
            });
        if let Err(err) = spawned {
            self.slot.finish(&state);
            return Err(SessionError::Spawn(err));
        }
        Ok(())
    }

    fn play_stream(&self, state: &SessionState, mut stream: LinkStream) -> Result<()> {
        if !state.is_streaming() {
            return Ok(());
        }
        let mut playback = PlaybackGuard::new(self.device.open()?);
        debug!(session = state.id(), "playback opened");

        let mut buf = vec![0u8; self.config.buffer_bytes];
        let mut total = 0u64;
        while state.is_streaming() {
            let read = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(connection_lost(err)),
            };
            playback.play_samples(&buf[..read])?;
            total += read as u64;
            trace!(session = state.id(), size = read, "played samples");
        }
        debug!(session = state.id(), bytes = total, "playback stream ended");
        Ok(())
    }

    pub(crate) fn close_current(&self, timeout: Duration) {
        if let Some(state) = self.slot.close_current() {
            if !state.wait_ended(timeout) {
                warn!(session = state.id(), "speaker session did not end in time");
            }
        }
    }
}
