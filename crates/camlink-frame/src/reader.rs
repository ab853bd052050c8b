use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use camlink_transport::LinkStream;
use tracing::debug;

use crate::codec::{
    decode_frame, skip_to_marker, Frame, FrameConfig, COMMAND_HEADER_SIZE, FRAME_HEADER_SIZE,
    MAGIC,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Reads complete image frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    skipped: u64,
}

impl<T: Read> FrameReader<T> {
    /// Wrap `inner` with [`FrameConfig::default`].
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            skipped: 0,
        }
    }

    /// Block until one whole frame has arrived.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` on EOF between frames and
    /// `Err(FrameError::TruncatedRead)` on EOF inside one.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if self.config.resync {
                self.skipped += skip_to_marker(&mut self.buf) as u64;
            }

            match decode_frame(&mut self.buf, self.config.max_payload_size) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(FrameError::PayloadTooLarge { size, max }) if self.config.resync => {
                    debug!(size, max, "dropping oversized frame header");
                    self.buf.advance(MAGIC.len());
                    self.skipped += MAGIC.len() as u64;
                    continue;
                }
                Err(err) => return Err(err),
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                return Err(FrameError::TruncatedRead {
                    expected: self.pending_frame_len(),
                    received: self.buf.len(),
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes discarded while resynchronising on the frame marker.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// The stream frames come from.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    fn pending_frame_len(&self) -> usize {
        if self.buf.len() < FRAME_HEADER_SIZE {
            return FRAME_HEADER_SIZE;
        }
        let len = (&self.buf[2..6]).get_u32() as usize;
        FRAME_HEADER_SIZE + len
    }
}

impl FrameReader<LinkStream> {
    /// Same as [`with_config`](Self::with_config), also applying `config.read_timeout` to the socket.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

/// Reads command messages (16-bit length + UTF-8 text) from any `Read` stream.
///
/// Unbuffered: each call consumes exactly one message and nothing past it.
pub struct CommandReader<T> {
    inner: T,
}

impl<T: Read> CommandReader<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Read one command message and return its raw payload.
    pub fn read_command_bytes(&mut self) -> Result<Bytes> {
        let len = read_command_length(&mut self.inner)?;
        read_command_payload(&mut self.inner, len)
    }

    /// Read one command message as text. Invalid UTF-8 is replaced, never an error.
    pub fn read_command(&mut self) -> Result<String> {
        let payload = self.read_command_bytes()?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }
}

/// Read the 16-bit big-endian length prefix of a command message.
///
/// EOF before the first byte is `ConnectionClosed`; EOF after it is
/// `TruncatedRead`.
pub fn read_command_length<R: Read>(stream: &mut R) -> Result<u16> {
    let mut header = [0u8; COMMAND_HEADER_SIZE];
    let filled = read_full(stream, &mut header)?;
    match filled {
        0 => Err(FrameError::ConnectionClosed),
        COMMAND_HEADER_SIZE => Ok(u16::from_be_bytes(header)),
        received => Err(FrameError::TruncatedRead {
            expected: COMMAND_HEADER_SIZE,
            received,
        }),
    }
}

/// Read exactly `length` payload bytes of a command message.
pub fn read_command_payload<R: Read>(stream: &mut R, length: u16) -> Result<Bytes> {
    let mut payload = vec![0u8; usize::from(length)];
    let filled = read_full(stream, &mut payload)?;
    if filled < payload.len() {
        return Err(FrameError::TruncatedRead {
            expected: payload.len(),
            received: filled,
        });
    }
    Ok(Bytes::from(payload))
}

fn read_full<R: Read>(stream: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(filled)
}

pub(crate) fn transport_to_frame_error(err: camlink_transport::TransportError) -> FrameError {
    match err {
        camlink_transport::TransportError::Io(io)
        | camlink_transport::TransportError::Accept(io) => FrameError::Io(io),
        camlink_transport::TransportError::Bind { source, .. }
        | camlink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
