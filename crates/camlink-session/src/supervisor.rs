use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use camlink_frame::{ChannelKind, FrameConfig};
use camlink_transport::{LinkStream, TcpTransport};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::command::{CameraControl, ControlDispatcher};
use crate::config::SessionConfig;
use crate::device::{MicDevice, SpeakerDevice};
use crate::downlink::DownlinkChannel;
use crate::error::{Result, SessionError};
use crate::uplink::{AudioChannelConfig, UplinkChannel};
use crate::video::{FrameSender, VideoChannel};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// The platform collaborators the supervisor drives.
pub struct Devices {
    pub camera: Box<dyn CameraControl>,
    pub mic: Arc<dyn MicDevice>,
    pub speaker: Arc<dyn SpeakerDevice>,
}

/// Where each channel ended up listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalAddrs {
    pub video: SocketAddr,
    pub mic: SocketAddr,
    pub speaker: SocketAddr,
}

/// A channel the accept loop can hand connections to.
trait Channel: Send + Sync + 'static {
    fn accept(self: &Arc<Self>, stream: LinkStream) -> Result<()>;
}

impl Channel for VideoChannel {
    fn accept(self: &Arc<Self>, stream: LinkStream) -> Result<()> {
        self.handle_connection(stream)
    }
}

impl Channel for UplinkChannel {
    fn accept(self: &Arc<Self>, stream: LinkStream) -> Result<()> {
        self.handle_connection(stream)
    }
}

impl Channel for DownlinkChannel {
    fn accept(self: &Arc<Self>, stream: LinkStream) -> Result<()> {
        self.handle_connection(stream)
    }
}

/// Owns the three channel listeners and everything running behind them.
///
/// Dropping the supervisor shuts it down.
pub struct Supervisor {
    running: Arc<AtomicBool>,
    video: Arc<VideoChannel>,
    uplink: Arc<UplinkChannel>,
    downlink: Arc<DownlinkChannel>,
    listeners: Vec<Arc<TcpTransport>>,
    accept_threads: Vec<JoinHandle<()>>,
    dispatcher: ControlDispatcher,
    addrs: LocalAddrs,
    close_timeout: Duration,
    stopped: bool,
}

impl Supervisor {
    /// Check the devices, bind all three channels and start accepting.
    ///
    /// Nothing is left running if any step fails.
    pub fn start(config: SessionConfig, devices: Devices) -> Result<Self> {
        config.validate()?;
        devices.mic.probe()?;
        devices.speaker.probe()?;

        let video_listener = bind(&config, ChannelKind::Video)?;
        let mic_listener = bind(&config, ChannelKind::MicAudio)?;
        let speaker_listener = bind(&config, ChannelKind::PcAudio)?;
        let addrs = LocalAddrs {
            video: video_listener.local_addr(),
            mic: mic_listener.local_addr(),
            speaker: speaker_listener.local_addr(),
        };

        let dispatcher = ControlDispatcher::spawn(devices.camera)?;
        let frame_config = FrameConfig {
            max_payload_size: config.max_frame_payload,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            resync: false,
        };
        let audio_config = AudioChannelConfig {
            buffer_bytes: config.audio_buffer_bytes,
            read_timeout: config.read_timeout(),
            handoff_timeout: config.handoff_timeout(),
        };

        let mut supervisor = Self {
            running: Arc::new(AtomicBool::new(true)),
            video: Arc::new(VideoChannel::new(frame_config, dispatcher.handle())),
            uplink: Arc::new(UplinkChannel::new(devices.mic, audio_config.clone())),
            downlink: Arc::new(DownlinkChannel::new(devices.speaker, audio_config)),
            listeners: Vec::with_capacity(3),
            accept_threads: Vec::with_capacity(3),
            dispatcher,
            addrs,
            close_timeout: config.handoff_timeout(),
            stopped: false,
        };

        let video = Arc::clone(&supervisor.video);
        supervisor.spawn_accept_loop(ChannelKind::Video, video_listener, video)?;
        let uplink = Arc::clone(&supervisor.uplink);
        supervisor.spawn_accept_loop(ChannelKind::MicAudio, mic_listener, uplink)?;
        let downlink = Arc::clone(&supervisor.downlink);
        supervisor.spawn_accept_loop(ChannelKind::PcAudio, speaker_listener, downlink)?;

        info!(
            video = %addrs.video,
            mic = %addrs.mic,
            speaker = %addrs.speaker,
            "camlink channels listening"
        );
        Ok(supervisor)
    }

    fn spawn_accept_loop<C: Channel>(
        &mut self,
        kind: ChannelKind,
        listener: TcpTransport,
        channel: Arc<C>,
    ) -> Result<()> {
        let listener = Arc::new(listener);
        let running = Arc::clone(&self.running);
        let accept_listener = Arc::clone(&listener);
        let handle = thread::Builder::new()
            .name(format!("camlink-{kind}-accept"))
            .spawn(move || run_accept_loop(kind, &accept_listener, &channel, &running))
            .map_err(SessionError::Spawn)?;
        self.listeners.push(listener);
        self.accept_threads.push(handle);
        Ok(())
    }

    /// Handle the capture side uses to push frames to the video client.
    pub fn frame_sender(&self) -> FrameSender {
        FrameSender::new(Arc::clone(&self.video))
    }

    pub fn local_addrs(&self) -> LocalAddrs {
        self.addrs
    }

    /// Stop accepting, close every client and stop the control dispatcher.
    ///
    /// Idempotent. Frames or samples in flight may be cut off.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.running.store(false, Ordering::Release);

        for listener in &self.listeners {
            listener.wake();
        }
        for handle in self.accept_threads.drain(..) {
            if handle.join().is_err() {
                warn!("accept thread panicked");
            }
        }

        self.video.close_current(self.close_timeout);
        self.uplink.close_current(self.close_timeout);
        self.downlink.close_current(self.close_timeout);
        self.dispatcher.shutdown();
        self.listeners.clear();
        info!("camlink supervisor stopped");
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bind(config: &SessionConfig, kind: ChannelKind) -> Result<TcpTransport> {
    let listener = TcpTransport::bind(&config.bind_host, config.port(kind))?;
    debug!(channel = %kind, addr = %listener.local_addr(), "channel bound");
    Ok(listener)
}

fn run_accept_loop<C: Channel>(
    kind: ChannelKind,
    listener: &TcpTransport,
    channel: &Arc<C>,
    running: &AtomicBool,
) {
    while running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok(stream) => {
                if !running.load(Ordering::Acquire) {
                    stream.shutdown();
                    break;
                }
                if let Err(err) = channel.accept(stream) {
                    warn!(channel = %kind, error = %err, "failed to start session");
                }
            }
            Err(err) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                warn!(channel = %kind, error = %err, "accept failed");
                thread::sleep(ACCEPT_ERROR_BACKOFF);
            }
        }
    }
    debug!(channel = %kind, "accept loop stopped");
}
