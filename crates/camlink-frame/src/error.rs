/// Errors that can occur during frame and command encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream is not positioned at a frame marker.
    #[error("protocol desync: expected frame marker 0xBEEF, found {found:02X?}")]
    ProtocolDesync { found: [u8; 2] },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Command text does not fit the 16-bit length prefix.
    #[error("command too long ({len} bytes, max 65535)")]
    CommandTooLong { len: usize },

    /// The connection closed part-way through a message.
    #[error("truncated read: expected {expected} bytes, received {received}")]
    TruncatedRead { expected: usize, received: usize },

    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed cleanly between messages.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
