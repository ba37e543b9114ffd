//! Server Module
//!
//! Accepts TCP connections and serves one request/response exchange on each,
//! all on a shared [`WorkerPool`].
//!
//! - `acceptor`: listening socket and the accept loop

mod acceptor;

pub use acceptor::{Acceptor, AcceptorState};

use crate::commands::{CommandProcessor, Processor};
use crate::config::{ConfigError, ServerConfig};
use crate::connection::ConnectionStats;
use crate::executor::WorkerPool;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Errors raised while starting a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The worker pool could not be created
    #[error("failed to start worker pool: {0}")]
    Pool(#[source] io::Error),

    /// Opening, binding or listening on the socket failed
    #[error("failed to bind: {0}")]
    Bind(#[source] io::Error),

    /// `start` was called on an acceptor that is not freshly created
    #[error("acceptor already started (state: {0:?})")]
    AlreadyStarted(AcceptorState),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A running server: worker pool plus acceptor.
pub struct Server {
    pool: WorkerPool,
    acceptor: Acceptor,
    local_addr: SocketAddr,
}

impl Server {
    /// Starts a server that executes line-protocol commands.
    pub fn start(config: &ServerConfig) -> Result<Self, ServerError> {
        Self::start_with(
            config,
            CommandProcessor::with_simulated_work(config.simulated_work),
        )
    }

    /// Starts a server that answers every request with `processor`.
    pub fn start_with(
        config: &ServerConfig,
        processor: impl Processor,
    ) -> Result<Self, ServerError> {
        let bind = config.bind_address()?;
        let pool = WorkerPool::new(config.threads).map_err(ServerError::Pool)?;

        let acceptor = Acceptor::new(
            pool.event_loop().clone(),
            Arc::new(processor),
            Arc::new(ConnectionStats::new()),
        );
        let local_addr = acceptor.start(bind)?;

        info!(%local_addr, threads = pool.size(), "Server started");

        Ok(Self {
            pool,
            acceptor,
            local_addr,
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        self.acceptor.stats()
    }

    pub fn acceptor(&self) -> &Acceptor {
        &self.acceptor
    }

    /// Stops accepting and tears the worker pool down.
    ///
    /// Exchanges still in flight are abandoned and their sockets closed. A
    /// processor that is already running finishes first: this returns only
    /// after every worker has exited, with the acceptor `Closed`.
    pub fn stop(self) {
        self.acceptor.stop();
        self.pool.stop();
        info!(local_addr = %self.local_addr, "Server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BlockingTransport;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(threads: usize) -> ServerConfig {
        ServerConfig {
            port: 0,
            threads,
            simulated_work: Duration::ZERO,
            ..ServerConfig::default()
        }
    }

    fn request(addr: SocketAddr, line: &str) -> String {
        let mut transport = BlockingTransport::connect(addr).unwrap();
        transport.set_read_timeout(Some(WAIT)).unwrap();
        transport.write_all(line.as_bytes()).unwrap();
        let response = transport.read_until(b'\n').unwrap();
        String::from_utf8(response.to_vec()).unwrap()
    }

    #[test]
    fn test_serves_protocol() {
        let server = Server::start(&config(2)).unwrap();
        let addr = server.local_addr();

        assert_eq!(request(addr, "PING\n"), "PONG\n");
        assert_eq!(request(addr, "ECHO hello world\n"), "hello world\n");
        assert_eq!(request(addr, "EMULATE_LONG_CALC_OP 0\n"), "OK\n");
        assert!(request(addr, "FLY\n").starts_with("ERR "));

        assert_eq!(server.stats().requests_processed.load(Ordering::Relaxed), 4);
        server.stop();
    }

    #[test]
    fn test_many_concurrent_clients() {
        let server = Server::start(&config(4)).unwrap();
        let addr = server.local_addr();

        let clients: Vec<_> = (0..16)
            .map(|i| thread::spawn(move || (i, request(addr, &format!("ECHO client-{i}\n")))))
            .collect();

        for client in clients {
            let (i, response) = client.join().unwrap();
            assert_eq!(response, format!("client-{i}\n"));
        }

        server.stop();
    }

    #[test]
    fn test_custom_processor() {
        let server = Server::start_with(&config(1), |request: &[u8]| {
            bytes::Bytes::from(request.to_ascii_lowercase())
        })
        .unwrap();

        assert_eq!(request(server.local_addr(), "SHOUT\n"), "shout\n");
        server.stop();
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = Server::start(&config(0)).err().unwrap();
        assert!(matches!(err, ServerError::Pool(_)));
    }

    #[test]
    fn test_invalid_host_rejected() {
        let config = ServerConfig {
            host: "not an address".to_string(),
            ..config(1)
        };
        let err = Server::start(&config).err().unwrap();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_stop_waits_for_busy_processor() {
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));

        let (s, f) = (Arc::clone(&started), Arc::clone(&finished));
        let server = Server::start_with(&config(2), move |_: &[u8]| {
            s.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(500));
            f.store(true, Ordering::SeqCst);
            bytes::Bytes::from_static(b"OK\n")
        })
        .unwrap();

        let addr = server.local_addr();
        let client = thread::spawn(move || {
            let mut transport = BlockingTransport::connect(addr).unwrap();
            transport.set_read_timeout(Some(WAIT)).unwrap();
            transport.write_all(b"PING\n").unwrap();
            // Whatever the outcome, the connection ends once the server stops
            let _ = transport.read_until(b'\n');
        });

        while !started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        server.stop();

        // The worker running the processor was joined, not left behind
        assert!(finished.load(Ordering::SeqCst));
        client.join().unwrap();
    }

    #[test]
    fn test_stop_refuses_new_connections() {
        let server = Server::start(&config(2)).unwrap();
        let addr = server.local_addr();
        assert_eq!(request(addr, "PING\n"), "PONG\n");

        server.stop();

        // The accept loop is dropped with the pool, closing the listener
        let deadline = std::time::Instant::now() + WAIT;
        while BlockingTransport::connect(addr).is_ok() {
            assert!(std::time::Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        }
    }
}
