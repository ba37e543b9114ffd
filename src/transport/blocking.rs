//! Blocking Transport
//!
//! The synchronous counterpart of [`Transport`](super::Transport): the same
//! framing rules over a `std::net::TcpStream`, with every call blocking the
//! calling thread. Useful for simple tools and for driving a server from
//! plain threads.

use super::stream::{TransportError, MAX_BUFFER_SIZE};
use bytes::Bytes;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// A blocking byte-stream endpoint.
#[derive(Debug)]
pub struct BlockingTransport {
    reader: BufReader<TcpStream>,
}

impl BlockingTransport {
    /// Connects to `endpoint`, blocking until the connection is established.
    pub fn connect(endpoint: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(endpoint)?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Sets a timeout for blocking reads. `None` blocks indefinitely.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    /// Writes the whole payload and returns the number of bytes written.
    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let stream = self.reader.get_mut();
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(bytes.len())
    }

    /// Reads until `delimiter` and returns everything up to and including it.
    pub fn read_until(&mut self, delimiter: u8) -> Result<Bytes, TransportError> {
        let mut line = Vec::new();
        self.reader
            .by_ref()
            .take(MAX_BUFFER_SIZE as u64)
            .read_until(delimiter, &mut line)?;

        if line.last() == Some(&delimiter) {
            Ok(Bytes::from(line))
        } else if line.len() >= MAX_BUFFER_SIZE {
            Err(TransportError::BufferFull)
        } else {
            Err(TransportError::UnexpectedEof)
        }
    }

    /// Shuts the connection down in the given direction.
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        self.reader.get_ref().shutdown(how)
    }

    /// Closes the transport.
    pub fn close(self) {
        drop(self);
    }
}
