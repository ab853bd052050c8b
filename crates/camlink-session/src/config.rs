use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use camlink_frame::{ChannelKind, DEFAULT_MAX_PAYLOAD};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Default size of one audio transfer unit in bytes (~23 ms of mono s16 PCM).
pub const DEFAULT_AUDIO_BUFFER_BYTES: usize = 4096;

/// Controls how the supervisor binds its channels and runs sessions.
///
/// Every field has a default, so a JSON config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// IP address all three listeners bind to.
    pub bind_host: String,
    /// Video channel port. 0 picks an ephemeral port.
    pub video_port: u16,
    /// Microphone uplink port.
    pub mic_port: u16,
    /// PC audio downlink port.
    pub speaker_port: u16,
    /// Bytes moved per read/write on the audio channels.
    pub audio_buffer_bytes: usize,
    /// Largest frame the video channel will put on the wire.
    pub max_frame_payload: usize,
    /// Write timeout on video client sockets; bounds how long a stalled viewer
    /// can hold the frame writer. Audio uplink writes always block.
    pub write_timeout_ms: Option<u64>,
    /// Read timeout on client sockets; an idle peer is dropped after this long.
    pub read_timeout_ms: Option<u64>,
    /// How long a new audio session waits for the previous one to release its device.
    pub handoff_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            video_port: ChannelKind::Video.default_port(),
            mic_port: ChannelKind::MicAudio.default_port(),
            speaker_port: ChannelKind::PcAudio.default_port(),
            audio_buffer_bytes: DEFAULT_AUDIO_BUFFER_BYTES,
            max_frame_payload: DEFAULT_MAX_PAYLOAD,
            write_timeout_ms: Some(2_000),
            read_timeout_ms: None,
            handoff_timeout_ms: 2_000,
        }
    }
}

impl SessionConfig {
    /// Loopback binding on ephemeral ports.
    pub fn loopback() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            video_port: 0,
            mic_port: 0,
            speaker_port: 0,
            ..Self::default()
        }
    }

    /// Parse a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| SessionError::Config(format!("invalid config JSON: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            SessionError::Config(format!("failed reading {}: {err}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Port configured for a channel.
    pub fn port(&self, channel: ChannelKind) -> u16 {
        match channel {
            ChannelKind::Video => self.video_port,
            ChannelKind::MicAudio => self.mic_port,
            ChannelKind::PcAudio => self.speaker_port,
        }
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    /// Check the config for values no session could run with.
    pub fn validate(&self) -> Result<()> {
        self.bind_host.parse::<IpAddr>().map_err(|_| {
            SessionError::Config(format!("bind_host {:?} is not an IP address", self.bind_host))
        })?;

        if self.audio_buffer_bytes == 0 {
            return Err(SessionError::Config(
                "audio_buffer_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_frame_payload == 0 || self.max_frame_payload > u32::MAX as usize {
            return Err(SessionError::Config(format!(
                "max_frame_payload must be between 1 and {}",
                u32::MAX
            )));
        }
        if self.write_timeout_ms == Some(0) || self.read_timeout_ms == Some(0) {
            return Err(SessionError::Config(
                "socket timeouts must be greater than zero (omit them to disable)".to_string(),
            ));
        }

        let ports = [self.video_port, self.mic_port, self.speaker_port];
        for (i, port) in ports.iter().enumerate() {
            if *port != 0 && ports[i + 1..].contains(port) {
                return Err(SessionError::Config(format!(
                    "port {port} is assigned to more than one channel"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_ports() {
        let config = SessionConfig::default();
        assert_eq!(config.port(ChannelKind::Video), 6677);
        assert_eq!(config.port(ChannelKind::MicAudio), 6678);
        assert_eq!(config.port(ChannelKind::PcAudio), 6679);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            SessionConfig::from_json_str(r#"{"video_port": 7000, "read_timeout_ms": 1500}"#)
                .unwrap();
        assert_eq!(config.video_port, 7000);
        assert_eq!(config.mic_port, 6678);
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.audio_buffer_bytes, DEFAULT_AUDIO_BUFFER_BYTES);
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = SessionConfig::from_json_str(r#"{"video_prot": 7000}"#).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn duplicate_ports_rejected() {
        let config = SessionConfig {
            mic_port: 6677,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn ephemeral_ports_may_repeat() {
        assert!(SessionConfig::loopback().validate().is_ok());
    }

    #[test]
    fn bad_host_and_zero_buffer_rejected() {
        let bad_host = SessionConfig {
            bind_host: "phone.local".to_string(),
            ..SessionConfig::default()
        };
        assert!(bad_host.validate().is_err());

        let zero_buffer = SessionConfig {
            audio_buffer_bytes: 0,
            ..SessionConfig::default()
        };
        assert!(zero_buffer.validate().is_err());
    }
}
