//! Connection Acceptor
//!
//! Owns the listening socket and keeps exactly one accept outstanding until
//! it is stopped.
//!
//! ## States
//!
//! ```text
//! Created ──start()──► Listening ──► Accepting ◄──┐
//!    │                                   │   │     │ accept completed,
//!    │ stop()                     stop() │   └─────┘ not stopped
//!    ▼                                   ▼
//!  Closed ◄──── next accept completes ── Stopping
//! ```
//!
//! `stop()` only raises a flag. The listening socket is closed by the accept
//! loop when the outstanding accept completes. A loop dropped by a stopped
//! worker pool also closes the socket and ends in `Closed`.

use crate::commands::Processor;
use crate::connection::{ConnectionHandler, ConnectionStats};
use crate::executor::EventLoop;
use crate::server::ServerError;
use crate::transport::Transport;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Pending connection queue length for the listening socket
const BACKLOG: u32 = 1024;

/// Lifecycle state of an [`Acceptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    Created,
    Listening,
    Accepting,
    Stopping,
    Closed,
}

/// State shared between the acceptor handle and its accept loop.
#[derive(Debug)]
struct Shared {
    stopped: AtomicBool,
    state: Mutex<AcceptorState>,
    pending_accepts: AtomicUsize,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, AcceptorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Accepts connections and hands each one to its own [`ConnectionHandler`].
pub struct Acceptor {
    shared: Arc<Shared>,
    event_loop: EventLoop,
    processor: Arc<dyn Processor>,
    stats: Arc<ConnectionStats>,
}

impl Acceptor {
    /// Creates an acceptor that will run on `event_loop`.
    pub fn new(
        event_loop: EventLoop,
        processor: Arc<dyn Processor>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                stopped: AtomicBool::new(false),
                state: Mutex::new(AcceptorState::Created),
                pending_accepts: AtomicUsize::new(0),
                local_addr: Mutex::new(None),
            }),
            event_loop,
            processor,
            stats,
        }
    }

    /// Binds to `bind`, starts listening and arms the first accept.
    ///
    /// Returns the bound address, which differs from `bind` when port 0 was
    /// requested.
    pub fn start(&self, bind: SocketAddr) -> Result<SocketAddr, ServerError> {
        let mut state = self.shared.state();
        if *state != AcceptorState::Created {
            return Err(ServerError::AlreadyStarted(*state));
        }

        let listener = self.listen(bind).map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;
        *self
            .shared
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(local_addr);
        *state = AcceptorState::Listening;
        info!(%local_addr, "Listening");
        drop(state);

        self.arm(listener);
        Ok(local_addr)
    }

    /// Moves to `Accepting` and spawns the accept loop over `incoming`.
    fn arm<I: Incoming>(&self, incoming: I) {
        {
            let mut state = self.shared.state();
            if *state == AcceptorState::Listening {
                *state = AcceptorState::Accepting;
            }
        }
        self.event_loop.spawn(accept_loop(
            incoming,
            Arc::clone(&self.shared),
            self.event_loop.clone(),
            Arc::clone(&self.processor),
            Arc::clone(&self.stats),
        ));
    }

    fn listen(&self, bind: SocketAddr) -> std::io::Result<TcpListener> {
        // Registering the socket needs the loop's reactor
        let _guard = self.event_loop.handle().enter();
        let socket = Transport::open(&bind)?;
        socket.set_reuseaddr(true)?;
        socket.bind(bind)?;
        socket.listen(BACKLOG)
    }

    /// Asks the accept loop to stop.
    ///
    /// The listening socket stays open until the outstanding accept
    /// completes; no accept is issued after that.
    pub fn stop(&self) {
        let mut state = self.shared.state();
        self.shared.stopped.store(true, Ordering::SeqCst);
        match *state {
            AcceptorState::Created => *state = AcceptorState::Closed,
            AcceptorState::Listening | AcceptorState::Accepting => {
                *state = AcceptorState::Stopping
            }
            AcceptorState::Stopping | AcceptorState::Closed => {}
        }
        debug!(state = ?*state, "Acceptor stop requested");
    }

    pub fn state(&self) -> AcceptorState {
        *self.shared.state()
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .shared
            .local_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of accept operations currently outstanding (0 or 1).
    pub fn pending_accepts(&self) -> usize {
        self.shared.pending_accepts.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }
}

/// A source of accepted connections.
pub(crate) trait Incoming: Send + Sync + 'static {
    /// Waits for the next connection.
    fn next_connection(
        &self,
    ) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send + '_;
}

impl Incoming for TcpListener {
    fn next_connection(
        &self,
    ) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send + '_ {
        self.accept()
    }
}

/// Marks the acceptor closed when the accept loop ends, including when the
/// loop is dropped by a stopped pool.
struct CloseOnExit(Arc<Shared>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.pending_accepts.store(0, Ordering::SeqCst);
        *self.0.state() = AcceptorState::Closed;
        info!("Acceptor closed");
    }
}

/// Accepts until the stop flag is seen after a completion.
async fn accept_loop<I: Incoming>(
    incoming: I,
    shared: Arc<Shared>,
    event_loop: EventLoop,
    processor: Arc<dyn Processor>,
    stats: Arc<ConnectionStats>,
) {
    let _closed = CloseOnExit(Arc::clone(&shared));
    // Declared after the guard so a dropped loop closes the listener first
    let incoming = incoming;

    loop {
        shared.pending_accepts.fetch_add(1, Ordering::SeqCst);
        let accepted = incoming.next_connection().await;
        shared.pending_accepts.fetch_sub(1, Ordering::SeqCst);

        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "Accepted connection");
                ConnectionHandler::new(stream, peer, Arc::clone(&processor), Arc::clone(&stats))
                    .start(&event_loop);
            }
            Err(e) => {
                stats.accept_failed();
                error!(error = %e, "Failed to accept connection");
            }
        }

        if shared.stopped.load(Ordering::SeqCst) {
            break;
        }
    }

    // The listener closes before the state reads Closed
    drop(incoming);
}
