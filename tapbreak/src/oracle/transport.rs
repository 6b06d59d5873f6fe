use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

/// Opens byte streams to the oracle service.
pub trait Connector: Send + Sync {
    type Stream: Read + Write + Send + 'static;

    fn connect(&self) -> io::Result<Self::Stream>;
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: SocketAddr,
    timeout: Option<Duration>,
}

impl TcpConnector {
    /// Resolves `addr` once; every session connects to the first address.
    pub fn new<A: ToSocketAddrs>(addr: A, timeout: Option<Duration>) -> io::Result<Self> {
        let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        })?;
        Ok(Self { addr, timeout })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self) -> io::Result<TcpStream> {
        let stream = match self.timeout {
            Some(t) => TcpStream::connect_timeout(&self.addr, t)?,
            None => TcpStream::connect(self.addr)?,
        };
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        stream.set_nodelay(true)?;
        debug!("connected to {}", self.addr);
        Ok(stream)
    }
}
