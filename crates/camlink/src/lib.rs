//! Use a phone as a PC camera, microphone and speaker.
//!
//! The phone runs three TCP services: JPEG frames out and camera commands in
//! on the video channel, microphone PCM out, and PC audio in. This crate
//! bundles the layers that implement them.
//!
//! # Crate Structure
//!
//! - [`transport`]: blocking TCP listeners and streams
//! - [`frame`]: frame and command wire formats
//! - [`session`]: channel sessions, the supervisor and PC-side clients
//!   (behind the `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use camlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use camlink_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use camlink_session::*;
}
