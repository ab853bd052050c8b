//! Device-side channel sessions for camlink.
//!
//! A [`Supervisor`] listens on three TCP channels and serves at most one
//! client on each:
//! - video: JPEG frames out through [`FrameSender`], camera commands in;
//! - mic audio: microphone PCM out;
//! - PC audio: PCM in, played on the speaker.
//!
//! The camera, microphone and speaker are supplied by the embedding
//! application through the traits in [`command`] and [`device`].

pub mod client;
pub mod command;
pub mod config;
pub mod device;
pub mod downlink;
pub mod error;
pub mod session;
pub mod supervisor;
pub mod uplink;
pub mod video;

pub use client::{connect_mic, connect_speaker, viewer_frame_config, VideoClient};
pub use command::{CameraControl, Command, ControlDispatcher, ControlHandle, ControlState};
pub use config::SessionConfig;
pub use device::{
    CapturedFrame, FrameSource, MicCapture, MicDevice, SpeakerDevice, SpeakerPlayback,
};
pub use error::{DeviceError, Result, SessionError};
pub use session::{ClientSlot, SessionState};
pub use supervisor::{Devices, LocalAddrs, Supervisor};
pub use uplink::AudioChannelConfig;
pub use video::{run_capture_loop, CaptureStats, FrameSender};
