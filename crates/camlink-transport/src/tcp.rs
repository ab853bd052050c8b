use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// A bound, listening TCP socket for one camlink channel.
///
/// `accept` blocks. To stop a thread parked in `accept`, flip whatever flag
/// the loop checks and call [`TcpTransport::wake`].
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `host:port`. Port 0 picks an ephemeral port.
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        let display = format!("{host}:{port}");
        let listener = TcpListener::bind((host, port)).map_err(|e| TransportError::Bind {
            addr: display.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: display,
            source: e,
        })?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(peer = %addr, local = %self.local_addr, "accepted connection");
        Ok(LinkStream::from_tcp(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Unblock a thread waiting in [`TcpTransport::accept`] by connecting to ourselves.
    ///
    /// The accepted wake-up connection is indistinguishable from a real one,
    /// so callers must check their running flag right after `accept` returns.
    pub fn wake(&self) {
        let target = wake_target(self.local_addr);
        match TcpStream::connect_timeout(&target, Duration::from_millis(500)) {
            Ok(stream) => {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
            Err(err) => debug!(%target, error = %err, "wake connection failed"),
        }
    }
}

/// Connect to a listening camlink channel (blocking, OS default timeout).
pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<LinkStream> {
    let target = resolve(&addr)?;
    let stream = TcpStream::connect(target).map_err(|e| TransportError::Connect {
        addr: target,
        source: e,
    })?;
    debug!(%target, "connected to tcp socket");
    Ok(LinkStream::from_tcp(stream))
}

/// Connect with an explicit timeout.
pub fn connect_timeout(
    addr: impl ToSocketAddrs + std::fmt::Debug,
    timeout: Duration,
) -> Result<LinkStream> {
    let target = resolve(&addr)?;
    let stream =
        TcpStream::connect_timeout(&target, timeout).map_err(|e| TransportError::Connect {
            addr: target,
            source: e,
        })?;
    debug!(%target, ?timeout, "connected to tcp socket");
    Ok(LinkStream::from_tcp(stream))
}

fn resolve(addr: &(impl ToSocketAddrs + std::fmt::Debug)) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|_| TransportError::Resolve(format!("{addr:?}")))?
        .next()
        .ok_or_else(|| TransportError::Resolve(format!("{addr:?}")))
}

fn wake_target(local: SocketAddr) -> SocketAddr {
    match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local.port())
        }
        _ => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let handle = std::thread::spawn(move || {
            let mut client = connect(addr).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert!(server.peer_addr().is_some());

        handle.join().unwrap();
    }

    #[test]
    fn test_bind_port_in_use_fails() {
        let first = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let result = TcpTransport::bind("127.0.0.1", first.local_addr().port());
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_connect_refused() {
        let port = {
            let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
            listener.local_addr().port()
        };
        let result = connect_timeout(("127.0.0.1", port), Duration::from_millis(200));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_wake_unblocks_accept() {
        let listener = std::sync::Arc::new(TcpTransport::bind("0.0.0.0", 0).unwrap());
        let acceptor = {
            let listener = std::sync::Arc::clone(&listener);
            std::thread::spawn(move || listener.accept().is_ok())
        };

        std::thread::sleep(Duration::from_millis(20));
        listener.wake();
        assert!(acceptor.join().unwrap());
    }

    #[test]
    fn test_shutdown_unblocks_reader() {
        let listener = TcpTransport::bind("127.0.0.1", 0).unwrap();
        let addr = listener.local_addr();
        let _client = connect(addr).unwrap();
        let server = listener.accept().unwrap();
        let mut reader = server.try_clone().unwrap();

        let blocked = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            reader.read(&mut buf)
        });

        std::thread::sleep(Duration::from_millis(20));
        server.shutdown();
        let result = blocked.join().unwrap();
        assert!(matches!(result, Ok(0) | Err(_)));
    }
}
