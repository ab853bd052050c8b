//! Blocking TCP transport for camlink channels.
//!
//! Every camlink channel (video, mic audio, PC audio) is a plain TCP socket.
//! This crate wraps the std listener and stream so the layers above get
//! consistent errors, logging, and the handful of socket operations they need:
//! timeouts, cloning a handle for a second thread, and shutting a connection
//! down from outside the thread that is blocked on it.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::LinkStream;
pub use tcp::{connect, connect_timeout, TcpTransport};
