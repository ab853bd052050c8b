//! Collaborator interfaces for the platform devices.
//!
//! The channels never talk to a camera, microphone or speaker directly. The
//! embedding application implements these traits over whatever platform API
//! it has; the CLI implements them over files.

use bytes::Bytes;

use crate::error::DeviceError;

/// One camera frame, already JPEG-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub jpeg: Bytes,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    pub fn new(jpeg: impl Into<Bytes>, width: u32, height: u32) -> Self {
        Self {
            jpeg: jpeg.into(),
            width,
            height,
        }
    }
}

/// Produces camera frames on demand.
pub trait FrameSource: Send {
    /// Capture and encode the next frame. `None` means no frame is ready.
    fn capture_frame(&mut self) -> Option<CapturedFrame>;
}

/// Factory for microphone capture sessions.
pub trait MicDevice: Send + Sync {
    /// Check the device can be opened at all (permissions, presence).
    fn probe(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Acquire the microphone and start recording.
    fn open(&self) -> Result<Box<dyn MicCapture>, DeviceError>;
}

/// An open microphone.
pub trait MicCapture: Send {
    /// Fill `buf` with PCM bytes; returns the number written.
    ///
    /// Should block until samples are available. Returning 0 is allowed but
    /// makes the uplink poll the device every few milliseconds.
    fn read_samples(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// Stop recording and release the device.
    fn stop(&mut self);
}

/// Factory for playback sessions.
pub trait SpeakerDevice: Send + Sync {
    /// Check the device can be opened at all.
    fn probe(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Acquire the output device and start playback.
    fn open(&self) -> Result<Box<dyn SpeakerPlayback>, DeviceError>;
}

/// An open playback stream.
pub trait SpeakerPlayback: Send {
    /// Queue PCM bytes for playback, in order.
    fn play_samples(&mut self, buf: &[u8]) -> Result<(), DeviceError>;

    /// Stop playback and release the device.
    fn stop(&mut self);
}

/// Holds an open capture and stops it exactly once when dropped.
pub(crate) struct CaptureGuard(Box<dyn MicCapture>);

impl CaptureGuard {
    pub(crate) fn new(capture: Box<dyn MicCapture>) -> Self {
        Self(capture)
    }

    pub(crate) fn read_samples(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.0.read_samples(buf)
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Holds an open playback and stops it exactly once when dropped.
pub(crate) struct PlaybackGuard(Box<dyn SpeakerPlayback>);

impl PlaybackGuard {
    pub(crate) fn new(playback: Box<dyn SpeakerPlayback>) -> Self {
        Self(playback)
    }

    pub(crate) fn play_samples(&mut self, buf: &[u8]) -> Result<(), DeviceError> {
        self.0.play_samples(buf)
    }
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        self.0.stop();
    }
}
