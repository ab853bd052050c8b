//! PC-side ends of the three channels.
//!
//! The viewer reads frames leniently: it scans for the marker and drops
//! oversized frames instead of failing the connection.

use std::fmt::Debug;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use camlink_frame::{CommandWriter, Frame, FrameConfig, FrameReader, DEFAULT_MAX_PAYLOAD};
use camlink_transport::{connect_timeout, LinkStream};
use tracing::debug;

use crate::command::Command;
use crate::error::Result;

/// Frame settings the viewer uses.
pub fn viewer_frame_config() -> FrameConfig {
    FrameConfig {
        max_payload_size: DEFAULT_MAX_PAYLOAD,
        read_timeout: None,
        write_timeout: None,
        resync: true,
    }
}

/// Connection to a device's video channel.
pub struct VideoClient {
    frames: FrameReader<LinkStream>,
    commands: CommandWriter<LinkStream>,
    peer: Option<SocketAddr>,
}

impl VideoClient {
    /// Connect with [`viewer_frame_config`].
    pub fn connect(addr: impl ToSocketAddrs + Debug, timeout: Duration) -> Result<Self> {
        let stream = connect_timeout(addr, timeout)?;
        Self::with_config(stream, viewer_frame_config())
    }

    pub fn with_config(stream: LinkStream, config: FrameConfig) -> Result<Self> {
        let peer = stream.peer_addr();
        let command_stream = stream.try_clone()?;
        command_stream.set_write_timeout(config.write_timeout)?;
        let frames = FrameReader::with_config_link(stream, config)?;
        debug!(peer = ?peer, "video client connected");
        Ok(Self {
            frames,
            commands: CommandWriter::new(command_stream),
            peer,
        })
    }

    /// Block until the next frame arrives.
    pub fn read_frame(&mut self) -> Result<Frame> {
        Ok(self.frames.read_frame()?)
    }

    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        self.send_raw(&command.to_wire_text())
    }

    /// Send arbitrary command text.
    pub fn send_raw(&mut self, text: &str) -> Result<()> {
        self.commands.send(text)?;
        Ok(())
    }

    /// Bytes skipped looking for frame markers so far.
    pub fn skipped_bytes(&self) -> u64 {
        self.frames.skipped_bytes()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Close both directions of the connection.
    pub fn shutdown(&self) {
        self.frames.get_ref().shutdown();
    }
}

/// Connect to the microphone channel; read raw PCM from the stream.
pub fn connect_mic(addr: impl ToSocketAddrs + Debug, timeout: Duration) -> Result<LinkStream> {
    let stream = connect_timeout(addr, timeout)?;
    debug!(peer = ?stream.peer_addr(), "mic client connected");
    Ok(stream)
}

/// Connect to the PC audio channel; write raw PCM to the stream.
pub fn connect_speaker(addr: impl ToSocketAddrs + Debug, timeout: Duration) -> Result<LinkStream> {
    let stream = connect_timeout(addr, timeout)?;
    stream.set_nodelay(true)?;
    debug!(peer = ?stream.peer_addr(), "speaker client connected");
    Ok(stream)
}
