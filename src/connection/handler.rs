//! Connection Handler
//!
//! This module drives one accepted connection through a single
//! request/response exchange.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Acceptor accepts (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler created and started
//!        │
//!        ▼
//! 3. Read until '\n' ──── error ────┐
//!        │                          │
//!        ▼                          │
//! 4. Process (on this worker)       │
//!        │                          │
//!        ▼                          │
//! 5. Write response ───── error ────┤
//!        │                          │
//!        ▼                          ▼
//! 6. Self-release: socket closed, handler dropped
//! ```
//!
//! Errors are logged and end the exchange; they never reach the acceptor.

use crate::commands::Processor;
use crate::executor::EventLoop;
use crate::protocol::DELIMITER;
use crate::transport::{CancelSignal, Transport, TransportError};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, error, trace};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests processed
    pub requests_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
    /// Accept operations that completed with an error
    pub accept_errors: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn accept_failed(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serves a single accepted connection.
///
/// Holds the connection's inbound request buffer and outbound response.
/// Dropping the handler closes the connection.
pub struct ConnectionHandler {
    /// The transport for this connection
    transport: Transport<TcpStream>,

    /// Peer address (for logging)
    peer: SocketAddr,

    /// Response bytes for the current request
    response: Bytes,

    /// Request processor (shared across connections)
    processor: Arc<dyn Processor>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted TCP stream
    /// * `peer` - The peer's socket address
    /// * `processor` - Turns the request into the response
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        processor: Arc<dyn Processor>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            transport: Transport::new(stream, CancelSignal::never()),
            peer,
            response: Bytes::new(),
            processor,
            stats,
        }
    }

    /// Detaches the handler onto the event loop.
    ///
    /// Nothing outside the spawned chain refers to the handler afterwards.
    pub fn start(self, event_loop: &EventLoop) {
        event_loop.spawn(async move {
            let _ = self.run().await;
        });
    }

    /// Runs the read → process → write chain, then releases the handler.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(peer = %self.peer, "Handling connection");

        let result = self.exchange().await;

        match &result {
            Ok(()) => debug!(peer = %self.peer, "Response sent"),
            Err(e) => error!(peer = %self.peer, error = %e, "Connection error"),
        }

        result
    }

    async fn exchange(&mut self) -> Result<(), ConnectionError> {
        let request = self
            .transport
            .read_until(DELIMITER)
            .await
            .map_err(ConnectionError::Read)?;
        self.stats.bytes_read(request.len());
        trace!(peer = %self.peer, bytes = request.len(), "Request received");

        self.response = self.processor.process(&request);
        self.stats.request_processed();

        let written = self
            .transport
            .write_all(&self.response)
            .await
            .map_err(ConnectionError::Write)?;
        self.stats.bytes_written(written);

        Ok(())
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.stats.connection_closed();
        trace!(peer = %self.peer, "Connection handler released");
    }
}

/// Errors that can occur while serving a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Reading the request failed
    #[error("read failed: {0}")]
    Read(#[source] TransportError),

    /// Writing the response failed
    #[error("write failed: {0}")]
    Write(#[source] TransportError),
}
