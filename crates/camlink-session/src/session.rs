use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use camlink_frame::ChannelKind;
use camlink_transport::LinkStream;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SessionError};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// State shared between a session's worker thread and whoever may end it.
#[derive(Debug)]
pub struct SessionState {
    id: u64,
    channel: ChannelKind,
    peer: Option<SocketAddr>,
    control: LinkStream,
    streaming: AtomicBool,
    ended: Mutex<bool>,
    ended_cv: Condvar,
}

impl SessionState {
    /// New streaming session over `stream`. Keeps a clone of the socket so
    /// [`close`](Self::close) can interrupt blocked reads and writes.
    pub fn new(channel: ChannelKind, stream: &LinkStream) -> camlink_transport::Result<Self> {
        Ok(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            channel,
            peer: stream.peer_addr(),
            control: stream.try_clone()?,
            streaming: AtomicBool::new(true),
            ended: Mutex::new(false),
            ended_cv: Condvar::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Stop streaming and shut the socket down. Safe to call repeatedly and
    /// from any thread.
    pub fn close(&self) {
        if self.streaming.swap(false, Ordering::AcqRel) {
            debug!(channel = %self.channel, session = self.id, "closing session");
        }
        self.control.shutdown();
    }

    /// Called by the worker thread once it has released everything it held.
    pub fn mark_ended(&self) {
        *lock(&self.ended) = true;
        self.ended_cv.notify_all();
    }

    /// Block until the worker has ended. Returns `false` on timeout.
    pub fn wait_ended(&self, timeout: Duration) -> bool {
        let guard = lock(&self.ended);
        match self
            .ended_cv
            .wait_timeout_while(guard, timeout, |ended| !*ended)
        {
            Ok((ended, _)) => *ended,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }
}

/// Anything a [`ClientSlot`] can hold.
pub trait SlotEntry: Send + Sync {
    fn state(&self) -> &SessionState;
}

impl SlotEntry for SessionState {
    fn state(&self) -> &SessionState {
        self
    }
}

/// Holds the single current client of a channel.
///
/// Installing a new session closes the previous one under the same lock, so
/// there is never more than one live session per channel.
pub struct ClientSlot<S> {
    current: Mutex<Option<Arc<S>>>,
}

impl<S: SlotEntry> ClientSlot<S> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Make `session` the current client. Returns the session it replaced,
    /// already closed.
    pub fn install(&self, session: Arc<S>) -> Option<Arc<S>> {
        let mut current = lock(&self.current);
        let previous = current.replace(session);
        if let Some(old) = &previous {
            let old_state = old.state();
            warn!(
                channel = %old_state.channel(),
                session = old_state.id(),
                peer = ?old_state.peer(),
                "new client connected, closing previous session"
            );
            old_state.close();
        }
        previous
    }

    pub fn current(&self) -> Option<Arc<S>> {
        lock(&self.current).clone()
    }

    /// Clear the slot if it still holds session `id`.
    pub fn release(&self, id: u64) -> bool {
        let mut current = lock(&self.current);
        match current.as_ref() {
            Some(session) if session.state().id() == id => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    /// Close and remove the current client, if any.
    pub fn close_current(&self) -> Option<Arc<S>> {
        let session = lock(&self.current).take();
        if let Some(session) = &session {
            session.state().close();
        }
        session
    }

    /// Tear down a session whose worker is exiting: close it, vacate the slot
    /// if it is still the current client, then signal anyone waiting on it.
    pub fn finish(&self, state: &SessionState) {
        state.close();
        self.release(state.id());
        state.mark_ended();
        info!(
            channel = %state.channel(),
            session = state.id(),
            peer = ?state.peer(),
            "client disconnected"
        );
    }
}

impl<S: SlotEntry> Default for ClientSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Log how a session worker ended.
///
/// Errors after the session was closed from outside (preempted or shut down)
/// are expected and only logged at debug.
pub(crate) fn log_session_end(state: &SessionState, result: &Result<()>) {
    let Err(err) = result else {
        return;
    };
    if !state.is_streaming() {
        debug!(channel = %state.channel(), session = state.id(), error = %err, "session ended after close");
        return;
    }
    match err {
        SessionError::DeviceUnavailable(_) | SessionError::DeviceFailed(_) => {
            error!(channel = %state.channel(), session = state.id(), error = %err, "device error, closing session")
        }
        err if err.is_connection_terminal() => {
            info!(channel = %state.channel(), session = state.id(), error = %err, "connection lost")
        }
        _ => warn!(channel = %state.channel(), session = state.id(), error = %err, "session failed"),
    }
}

// Nothing guarded here is left half-updated by a panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::thread;

    use camlink_transport::{connect, TcpTransport};

    use super::*;

    fn pair(listener: &TcpTransport) -> (LinkStream, LinkStream) {
        let addr = listener.local_addr();
        let client = thread::spawn(move || connect(addr).unwrap());
        let server = listener.accept().unwrap();
        (server, client.join().unwrap())
    }

    #[test]
    fn install_closes_previous_session() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let (server_a, mut client_a) = pair(&listener);
        let (server_b, _client_b) = pair(&listener);

        let slot = ClientSlot::new();
        let first = Arc::new(SessionState::new(ChannelKind::MicAudio, &server_a).unwrap());
        let second = Arc::new(SessionState::new(ChannelKind::MicAudio, &server_b).unwrap());

        assert!(slot.install(Arc::clone(&first)).is_none());
        let replaced = slot.install(Arc::clone(&second)).unwrap();

        assert_eq!(replaced.id(), first.id());
        assert!(!first.is_streaming());
        assert!(second.is_streaming());
        assert_eq!(slot.current().unwrap().id(), second.id());

        let mut buf = [0u8; 1];
        assert_eq!(client_a.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn release_only_clears_matching_session() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let (server_a, _client_a) = pair(&listener);
        let (server_b, _client_b) = pair(&listener);

        let slot = ClientSlot::new();
        let first = Arc::new(SessionState::new(ChannelKind::Video, &server_a).unwrap());
        let second = Arc::new(SessionState::new(ChannelKind::Video, &server_b).unwrap());
        slot.install(Arc::clone(&first));
        slot.install(Arc::clone(&second));

        assert!(!slot.release(first.id()));
        assert_eq!(slot.current().unwrap().id(), second.id());
        assert!(slot.release(second.id()));
        assert!(slot.current().is_none());
    }

    #[test]
    fn wait_ended_times_out_then_observes_mark() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let (server, _client) = pair(&listener);
        let state = Arc::new(SessionState::new(ChannelKind::PcAudio, &server).unwrap());

        assert!(!state.wait_ended(Duration::from_millis(20)));

        let worker = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                state.mark_ended();
            })
        };
        assert!(state.wait_ended(Duration::from_secs(5)));
        assert!(state.wait_ended(Duration::ZERO));
        worker.join().unwrap();
    }

    #[test]
    fn close_current_empties_slot() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let (server, _client) = pair(&listener);
        let slot = ClientSlot::new();
        let state = Arc::new(SessionState::new(ChannelKind::Video, &server).unwrap());
        slot.install(Arc::clone(&state));

        let closed = slot.close_current().unwrap();
        assert_eq!(closed.id(), state.id());
        assert!(!state.is_streaming());
        assert!(slot.close_current().is_none());
    }
}
