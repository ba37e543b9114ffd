//! Cancellable Stream Transport
//!
//! [`Transport`] wraps a non-blocking byte stream with an inbound buffer and
//! a [`CancelSignal`]. Every operation completes on whichever worker polls it.
//!
//! ## Cancellation
//!
//! ```text
//!   Canceller::cancel_pending()
//!            │
//!            ▼  (watch channel, sticky)
//!   ┌──────────────────────────────┐
//!   │ connect()     -> Cancelled   │  aborted while pending
//!   │ read_until()  -> Cancelled   │  aborted while pending
//!   │ write_all()   -> completes   │  bytes already in flight are sent
//!   └──────────────────────────────┘
//! ```
//!
//! A cancelled write is observed by the caller at its next checkpoint.

use bytes::{Bytes, BytesMut};
use std::io;
use std::net::{Shutdown, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::watch;
use tracing::trace;

/// Maximum number of bytes buffered while waiting for a delimiter (64 KB)
pub const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial inbound buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Errors produced by transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The operation was aborted by a cancellation request
    #[error("operation cancelled")]
    Cancelled,

    /// The peer closed the stream before a delimiter arrived
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The inbound buffer filled up without a delimiter
    #[error("buffer size limit exceeded")]
    BufferFull,
}

impl TransportError {
    /// Returns true if this error came from a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }

    /// Converts this error into an `io::Error`.
    pub fn into_io(self) -> io::Error {
        match self {
            TransportError::Io(e) => e,
            TransportError::Cancelled => {
                io::Error::new(io::ErrorKind::Interrupted, "operation cancelled")
            }
            TransportError::UnexpectedEof => io::ErrorKind::UnexpectedEof.into(),
            TransportError::BufferFull => {
                io::Error::new(io::ErrorKind::InvalidData, "buffer size limit exceeded")
            }
        }
    }
}

/// Requests cancellation of a transport's pending operations.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    /// Aborts the pending connect or read, and any that start later.
    pub fn cancel_pending(&self) {
        self.tx.send_replace(true);
    }
}

/// The transport side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested.
    ///
    /// Stays pending forever if the [`Canceller`] is dropped without
    /// cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Creates a connected [`Canceller`] / [`CancelSignal`] pair.
pub fn cancel_pair() -> (Canceller, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancelSignal { rx })
}

/// A non-blocking byte-stream endpoint.
///
/// Generic over the stream so it can run over a `TcpStream` in production
/// and over in-memory streams in tests.
#[derive(Debug)]
pub struct Transport<S = TcpStream> {
    stream: S,

    /// Bytes received but not yet returned by `read_until`
    inbound: BytesMut,

    /// How much of `inbound` is known not to contain the delimiter
    scanned: usize,

    signal: CancelSignal,
}

impl Transport<TcpStream> {
    /// Opens an unconnected socket of the endpoint's address family.
    pub fn open(endpoint: &SocketAddr) -> io::Result<TcpSocket> {
        match endpoint {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
    }

    /// Opens a socket and connects it to `endpoint`.
    ///
    /// Completes with [`TransportError::Cancelled`] if cancellation is
    /// requested before the connection is established.
    pub async fn connect(
        endpoint: SocketAddr,
        mut signal: CancelSignal,
    ) -> Result<Self, TransportError> {
        let socket = Self::open(&endpoint)?;

        let stream = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(TransportError::Cancelled),
            connected = socket.connect(endpoint) => connected?,
        };
        stream.set_nodelay(true)?;

        trace!(%endpoint, "Connected");
        Ok(Self::new(stream, signal))
    }

    /// The remote address of the connection.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Shuts the connection down in the given direction and closes it.
    pub fn shutdown(self, how: Shutdown) -> io::Result<()> {
        let stream = self.stream.into_std()?;
        stream.shutdown(how)
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an already-connected stream.
    pub fn new(stream: S, signal: CancelSignal) -> Self {
        Self {
            stream,
            inbound: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            scanned: 0,
            signal,
        }
    }

    /// Writes the whole payload and returns the number of bytes written.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        trace!(bytes = bytes.len(), "Wrote data");
        Ok(bytes.len())
    }

    /// Reads until `delimiter` and returns everything up to and including it.
    pub async fn read_until(&mut self, delimiter: u8) -> Result<Bytes, TransportError> {
        loop {
            if let Some(pos) = self.inbound[self.scanned..]
                .iter()
                .position(|&b| b == delimiter)
            {
                let end = self.scanned + pos + 1;
                self.scanned = 0;
                return Ok(self.inbound.split_to(end).freeze());
            }
            self.scanned = self.inbound.len();

            if self.inbound.len() >= MAX_BUFFER_SIZE {
                return Err(TransportError::BufferFull);
            }

            // Ensure we have some capacity
            if self.inbound.capacity() - self.inbound.len() < 1024 {
                self.inbound.reserve(INITIAL_BUFFER_SIZE);
            }

            let n = tokio::select! {
                biased;
                _ = self.signal.cancelled() => return Err(TransportError::Cancelled),
                read = self.stream.read_buf(&mut self.inbound) => read?,
            };

            if n == 0 {
                return Err(TransportError::UnexpectedEof);
            }
            trace!(bytes = n, buffered = self.inbound.len(), "Read data");
        }
    }

    /// Bytes received past the last returned delimiter.
    pub fn buffered(&self) -> &[u8] {
        &self.inbound
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Closes the transport without a shutdown handshake.
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_read_until_across_chunks() {
        let mock = tokio_test::io::Builder::new()
            .read(b"PO")
            .read(b"NG\nEXTRA")
            .build();
        let mut transport = Transport::new(mock, CancelSignal::never());

        let line = transport.read_until(b'\n').await.unwrap();
        assert_eq!(&line[..], b"PONG\n");

        // Bytes past the delimiter stay buffered
        assert_eq!(transport.buffered(), b"EXTRA");
    }

    #[tokio::test]
    async fn test_read_until_consecutive_lines() {
        let mock = tokio_test::io::Builder::new().read(b"one\ntwo\n").build();
        let mut transport = Transport::new(mock, CancelSignal::never());

        assert_eq!(&transport.read_until(b'\n').await.unwrap()[..], b"one\n");
        assert_eq!(&transport.read_until(b'\n').await.unwrap()[..], b"two\n");
        assert!(transport.buffered().is_empty());
    }

    #[tokio::test]
    async fn test_read_until_eof() {
        let mock = tokio_test::io::Builder::new().read(b"partial").build();
        let mut transport = Transport::new(mock, CancelSignal::never());

        let err = transport.read_until(b'\n').await.unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_read_until_buffer_full() {
        let data = vec![b'a'; MAX_BUFFER_SIZE];
        let mock = tokio_test::io::Builder::new().read(&data).build();
        let mut transport = Transport::new(mock, CancelSignal::never());

        let err = transport.read_until(b'\n').await.unwrap_err();
        assert!(matches!(err, TransportError::BufferFull));
    }

    #[tokio::test]
    async fn test_write_all() {
        let mock = tokio_test::io::Builder::new().write(b"PING\n").build();
        let mut transport = Transport::new(mock, CancelSignal::never());

        let n = transport.write_all(b"PING\n").await.unwrap();
        assert_eq!(n, 5);
    }

    #[tokio::test]
    async fn test_cancel_pending_read() {
        let (_peer, stream) = tokio::io::duplex(64);
        let (canceller, signal) = cancel_pair();
        let mut transport = Transport::new(stream, signal);

        let read = tokio::spawn(async move { transport.read_until(b'\n').await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel_pending();

        let err = read.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_is_sticky() {
        let (mut peer, stream) = tokio::io::duplex(64);
        let (canceller, signal) = cancel_pair();
        let mut transport = Transport::new(stream, signal);

        canceller.cancel_pending();
        assert!(transport.is_cancelled());

        // Data is waiting, but the read still observes the cancellation
        peer.write_all(b"late\n").await.unwrap();
        let err = transport.read_until(b'\n').await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_canceller_never_cancels() {
        let (mut peer, stream) = tokio::io::duplex(64);
        let (canceller, signal) = cancel_pair();
        drop(canceller);
        let mut transport = Transport::new(stream, signal);

        peer.write_all(b"hello\n").await.unwrap();
        let line = transport.read_until(b'\n').await.unwrap();
        assert_eq!(&line[..], b"hello\n");
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).await.unwrap();
            stream.write_all(b"PONG\n").await.unwrap();
        });

        let mut transport = Transport::connect(addr, CancelSignal::never()).await.unwrap();
        assert_eq!(transport.peer_addr().unwrap(), addr);

        transport.write_all(b"PING\n").await.unwrap();
        let line = transport.read_until(b'\n').await.unwrap();
        assert_eq!(&line[..], b"PONG\n");

        transport.shutdown(Shutdown::Both).unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Grab a free port, then release it so nothing is listening there
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = Transport::connect(addr, CancelSignal::never())
            .await
            .unwrap_err();
        match err {
            TransportError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionRefused),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_connect_cancelled_before_start() {
        let (canceller, signal) = cancel_pair();
        canceller.cancel_pending();

        let err = Transport::connect("127.0.0.1:9".parse().unwrap(), signal)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_error_into_io() {
        assert_eq!(
            TransportError::UnexpectedEof.into_io().kind(),
            io::ErrorKind::UnexpectedEof
        );
        assert_eq!(
            TransportError::BufferFull.into_io().kind(),
            io::ErrorKind::InvalidData
        );
    }
}
