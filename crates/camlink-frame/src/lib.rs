//! Wire formats for the camlink video connection.
//!
//! Two message types share the video socket, one per direction:
//! - device → peer: image frames, a 2-byte marker (`BE EF`), a 4-byte
//!   big-endian length and the JPEG payload;
//! - peer → device: command messages, a 2-byte big-endian length and UTF-8
//!   text.
//!
//! The audio channels carry raw PCM and need no framing; their format
//! constants live in [`channel`].

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use channel::{
    pcm_bytes_per_second, ChannelKind, MIC_AUDIO_PORT, PCM_BYTES_PER_SAMPLE, PCM_CHANNELS,
    PCM_SAMPLE_RATE, PC_AUDIO_PORT, VIDEO_PORT,
};
pub use codec::{
    decode_command, decode_frame, encode_command, encode_frame, skip_to_marker, Frame, FrameConfig,
    COMMAND_HEADER_SIZE, DEFAULT_MAX_PAYLOAD, FRAME_HEADER_SIZE, MAGIC, MAX_COMMAND_LEN,
};
pub use error::{FrameError, Result};
pub use reader::{read_command_length, read_command_payload, CommandReader, FrameReader};
pub use writer::{CommandWriter, FrameWriter};
