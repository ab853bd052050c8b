use camlink_frame::FrameError;

/// Errors reported by device collaborators (camera, microphone, speaker).
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device is busy, missing, or permission was denied.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// The device failed while in use.
    #[error("device failed: {0}")]
    Failed(String),

    /// An I/O error from a file- or socket-backed device.
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur in channel sessions and the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] camlink_transport::TransportError),

    /// Frame- or command-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Peer closed the connection or the network failed.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A command that parsed but cannot be applied, or could not be parsed.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    /// Capture or playback device could not be opened.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Capture or playback device failed mid-session.
    #[error("device failed: {0}")]
    DeviceFailed(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A worker thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(std::io::Error),
}

impl From<DeviceError> for SessionError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Unavailable(msg) => SessionError::DeviceUnavailable(msg),
            other => SessionError::DeviceFailed(other.to_string()),
        }
    }
}

impl SessionError {
    /// True when the error ends the session it happened in.
    ///
    /// Malformed commands are logged and the command loop keeps going;
    /// everything that breaks the stream or the device ends that one session.
    pub fn is_connection_terminal(&self) -> bool {
        match self {
            SessionError::MalformedCommand(_) | SessionError::Config(_) => false,
            SessionError::Frame(err) => !matches!(
                err,
                FrameError::PayloadTooLarge { .. } | FrameError::CommandTooLong { .. }
            ),
            _ => true,
        }
    }
}

pub(crate) fn connection_lost(err: std::io::Error) -> SessionError {
    SessionError::ConnectionLost(err.to_string())
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_device_maps_to_device_unavailable() {
        let err: SessionError = DeviceError::Unavailable("mic busy".to_string()).into();
        assert!(matches!(err, SessionError::DeviceUnavailable(ref m) if m == "mic busy"));
    }

    #[test]
    fn malformed_command_is_not_terminal() {
        assert!(!SessionError::MalformedCommand("ZOOM:abc".to_string()).is_connection_terminal());
        assert!(SessionError::ConnectionLost("reset".to_string()).is_connection_terminal());
        assert!(SessionError::Frame(FrameError::TruncatedRead {
            expected: 13,
            received: 2
        })
        .is_connection_terminal());
        assert!(SessionError::Frame(FrameError::ProtocolDesync { found: [0, 0] })
            .is_connection_terminal());
    }
}
