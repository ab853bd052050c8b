use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use camlink_frame::{ChannelKind, CommandReader, FrameConfig, FrameError, FrameWriter};
use camlink_transport::LinkStream;
use tracing::{debug, info, trace, warn};

use crate::command::{Command, ControlHandle};
use crate::device::{CapturedFrame, FrameSource};
use crate::error::{Result, SessionError};
use crate::session::{log_session_end, ClientSlot, SessionState, SlotEntry};

/// One connected video client: its state plus the only handle frames are
/// written through.
pub struct VideoSession {
    state: SessionState,
    writer: Mutex<FrameWriter<LinkStream>>,
}

impl SlotEntry for VideoSession {
    fn state(&self) -> &SessionState {
        &self.state
    }
}

/// The video channel: frames out, commands in, one client at a time.
pub struct VideoChannel {
    slot: ClientSlot<VideoSession>,
    frame_config: FrameConfig,
    control: ControlHandle,
}

impl VideoChannel {
    pub fn new(frame_config: FrameConfig, control: ControlHandle) -> Self {
        Self {
            slot: ClientSlot::new(),
            frame_config,
            control,
        }
    }

    /// Take over `stream` as the current client, replacing any previous one,
    /// and start its command reader.
    pub fn handle_connection(self: &Arc<Self>, stream: LinkStream) -> Result<()> {
        let state = SessionState::new(ChannelKind::Video, &stream)?;
        let reader_stream = stream.try_clone()?;
        reader_stream.set_read_timeout(self.frame_config.read_timeout)?;
        let writer = FrameWriter::with_config_link(stream, self.frame_config.clone())?;

        let session = Arc::new(VideoSession {
            state,
            writer: Mutex::new(writer),
        });
        self.slot.install(Arc::clone(&session));
        info!(
            channel = %ChannelKind::Video,
            session = session.state.id(),
            peer = ?session.state.peer(),
            "client connected"
        );

        let channel = Arc::clone(self);
        let worker = Arc::clone(&session);
        let spawned = thread::Builder::new()
            .name("camlink-video-session".to_string())
            .spawn(move || {
                let result = channel.run_command_loop(&worker.state, reader_stream);
                log_session_end(&worker.state, &result);
                channel.slot.finish(&worker.state);
            });
        if let Err(err) = spawned {
            self.slot.finish(&session.state);
            return Err(SessionError::Spawn(err));
        }
        Ok(())
    }

    fn run_command_loop(&self, state: &SessionState, stream: LinkStream) -> Result<()> {
        let mut reader = CommandReader::new(stream);
        while state.is_streaming() {
            let text = match reader.read_command() {
                Ok(text) => text,
                Err(FrameError::ConnectionClosed) => return Ok(()),
                Err(err) => {
                    let err = SessionError::from(err);
                    if err.is_connection_terminal() {
                        return Err(err);
                    }
                    warn!(session = state.id(), error = %err, "skipping bad command message");
                    continue;
                }
            };
            let command = Command::parse(&text);
            debug!(session = state.id(), command = ?command, "command received");
            if command.is_recognized() && !self.control.dispatch(command) {
                warn!(session = state.id(), "control dispatcher stopped, dropping command");
            }
        }
        Ok(())
    }

    /// Send one frame to the current client without waiting.
    ///
    /// Returns `false` when there is no streaming client, when another frame
    /// is still being written (the new one is dropped), or when the write
    /// failed. A failed write closes the session.
    pub fn try_send(&self, payload: &[u8]) -> bool {
        let Some(session) = self.slot.current() else {
            return false;
        };
        if !session.state.is_streaming() {
            return false;
        }

        let mut writer = match session.writer.try_lock() {
            Ok(writer) => writer,
            Err(TryLockError::WouldBlock) => {
                trace!(session = session.state.id(), "writer busy, dropping frame");
                return false;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        match writer.send(payload) {
            Ok(()) => {
                trace!(session = session.state.id(), size = payload.len(), "frame sent");
                true
            }
            Err(FrameError::PayloadTooLarge { size, max }) => {
                warn!(session = session.state.id(), size, max, "frame too large, dropped");
                false
            }
            Err(err) => {
                drop(writer);
                debug!(session = session.state.id(), error = %err, "frame write failed");
                session.state.close();
                false
            }
        }
    }

    pub fn has_client(&self) -> bool {
        self.slot
            .current()
            .is_some_and(|session| session.state.is_streaming())
    }

    /// Close the current client and wait for its reader to exit.
    pub(crate) fn close_current(&self, timeout: Duration) {
        if let Some(session) = self.slot.close_current() {
            if !session.state.wait_ended(timeout) {
                warn!(session = session.state.id(), "video session did not end in time");
            }
        }
    }
}

/// Cheap handle the capture side uses to push frames.
#[derive(Clone)]
pub struct FrameSender {
    channel: Arc<VideoChannel>,
}

impl FrameSender {
    pub(crate) fn new(channel: Arc<VideoChannel>) -> Self {
        Self { channel }
    }

    /// See [`VideoChannel::try_send`].
    pub fn try_send(&self, payload: &[u8]) -> bool {
        self.channel.try_send(payload)
    }

    pub fn send_captured(&self, frame: &CapturedFrame) -> bool {
        self.channel.try_send(&frame.jpeg)
    }

    /// True while a client is connected and streaming.
    pub fn has_client(&self) -> bool {
        self.channel.has_client()
    }
}

/// Counters from [`run_capture_loop`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub captured: u64,
    pub sent: u64,
    pub dropped: u64,
}

/// Pull frames from `source` every `interval` and offer them to `sender`
/// until `running` goes false.
///
/// Frames are only captured while a client is connected.
pub fn run_capture_loop(
    source: &mut dyn FrameSource,
    sender: &FrameSender,
    running: &AtomicBool,
    interval: Duration,
) -> CaptureStats {
    let mut stats = CaptureStats::default();
    while running.load(Ordering::Acquire) {
        let tick = Instant::now();
        if sender.has_client() {
            if let Some(frame) = source.capture_frame() {
                stats.captured += 1;
                if sender.send_captured(&frame) {
                    stats.sent += 1;
                } else {
                    stats.dropped += 1;
                }
            }
        }
        if let Some(rest) = interval.checked_sub(tick.elapsed()) {
            thread::sleep(rest);
        }
    }
    debug!(
        captured = stats.captured,
        sent = stats.sent,
        dropped = stats.dropped,
        "capture loop stopped"
    );
    stats
}
