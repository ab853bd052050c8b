//! The three camlink channels and the PCM format of the audio ones.
//!
//! Each channel is its own TCP listener on the device. The audio channels
//! carry an unframed stream of signed 16-bit little-endian mono samples.

/// Default port of the video channel (frames out, commands in).
pub const VIDEO_PORT: u16 = 6677;

/// Default port of the microphone uplink (device → peer PCM).
pub const MIC_AUDIO_PORT: u16 = 6678;

/// Default port of the PC audio downlink (peer → device PCM).
pub const PC_AUDIO_PORT: u16 = 6679;

/// Sample rate of both audio channels.
pub const PCM_SAMPLE_RATE: u32 = 44_100;

/// Channel count of both audio channels.
pub const PCM_CHANNELS: u16 = 1;

/// Bytes per sample (s16le).
pub const PCM_BYTES_PER_SAMPLE: usize = 2;

/// One of the device's socket services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Video,
    MicAudio,
    PcAudio,
}

impl ChannelKind {
    /// Port the channel listens on unless configured otherwise.
    pub fn default_port(self) -> u16 {
        match self {
            ChannelKind::Video => VIDEO_PORT,
            ChannelKind::MicAudio => MIC_AUDIO_PORT,
            ChannelKind::PcAudio => PC_AUDIO_PORT,
        }
    }

    /// Short name used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::Video => "video",
            ChannelKind::MicAudio => "mic-audio",
            ChannelKind::PcAudio => "pc-audio",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bytes of PCM produced per second on an audio channel.
pub fn pcm_bytes_per_second() -> usize {
    PCM_SAMPLE_RATE as usize * PCM_CHANNELS as usize * PCM_BYTES_PER_SAMPLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_are_distinct() {
        assert_eq!(ChannelKind::Video.default_port(), 6677);
        assert_eq!(ChannelKind::MicAudio.default_port(), 6678);
        assert_eq!(ChannelKind::PcAudio.default_port(), 6679);
    }

    #[test]
    fn pcm_rate_is_mono_s16() {
        assert_eq!(pcm_bytes_per_second(), 88_200);
    }
}
