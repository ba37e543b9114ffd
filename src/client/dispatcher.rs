//! Request Dispatcher
//!
//! [`Dispatcher`] owns a worker pool and the active-session table. Each
//! submitted request becomes one chain on the pool's event loop; the chain
//! owns the caller's callback, so the callback runs exactly once.

use crate::client::session::{RequestError, RequestId, Session, SessionTable};
use crate::config::ClientConfig;
use crate::executor::{EventLoop, WorkerPool};
use crate::protocol::DELIMITER;
use crate::transport::{CancelSignal, Transport, TransportError};
use bytes::Bytes;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

/// Errors returned when a request cannot be submitted.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A request with this id has not finished yet
    #[error("request #{0} is already active")]
    DuplicateRequest(RequestId),
}

/// Asynchronous request client.
///
/// # Example
///
/// ```no_run
/// use lifeline::Dispatcher;
///
/// let client = Dispatcher::new(4).unwrap();
/// client
///     .submit("127.0.0.1:3333".parse().unwrap(), "PING\n", 1, |id, result| {
///         println!("request #{id}: {result:?}");
///     })
///     .unwrap();
///
/// // Changed our mind
/// client.cancel(1);
/// client.shutdown();
/// ```
///
/// Dropping a dispatcher without calling [`shutdown`](Self::shutdown)
/// cancels every active request and waits for their callbacks, which report
/// [`RequestError::Cancelled`] unless the request had already failed.
pub struct Dispatcher {
    /// `None` once the workers have been joined
    pool: Option<WorkerPool>,
    event_loop: EventLoop,
    sessions: Arc<SessionTable>,
}

impl Dispatcher {
    /// Creates a dispatcher backed by `threads` workers.
    pub fn new(threads: usize) -> io::Result<Self> {
        let pool = WorkerPool::new(threads)?;
        Ok(Self {
            event_loop: pool.event_loop().clone(),
            pool: Some(pool),
            sessions: Arc::new(SessionTable::new()),
        })
    }

    /// Creates a dispatcher from a client configuration.
    pub fn with_config(config: &ClientConfig) -> io::Result<Self> {
        Self::new(config.threads)
    }

    /// Starts a request.
    ///
    /// `payload` is sent as-is and must carry its own delimiter. `on_done`
    /// is called exactly once, on a worker thread, after the session's
    /// socket has been closed and the id has left the active-session table.
    pub fn submit<F>(
        &self,
        endpoint: SocketAddr,
        payload: impl Into<Bytes>,
        id: RequestId,
        on_done: F,
    ) -> Result<(), DispatchError>
    where
        F: FnOnce(RequestId, Result<String, RequestError>) + Send + 'static,
    {
        let (session, signal) = Session::new(id, endpoint, payload.into());
        let session = Arc::new(session);

        if !self.sessions.insert(Arc::clone(&session)) {
            return Err(DispatchError::DuplicateRequest(id));
        }
        debug!(request_id = id, %endpoint, "Request submitted");

        let sessions = Arc::clone(&self.sessions);
        self.event_loop
            .spawn(run_session(session, signal, sessions, on_done));
        Ok(())
    }

    /// Cancels an active request.
    ///
    /// A pending connect or read is aborted at once; a write in progress
    /// finishes first. Returns false if the id is not active.
    pub fn cancel(&self, id: RequestId) -> bool {
        let found = self.sessions.cancel(id);
        if found {
            debug!(request_id = id, "Cancellation requested");
        }
        found
    }

    /// Number of requests that have not finished yet.
    pub fn active_requests(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true while the request with this id has not finished.
    pub fn is_active(&self, id: RequestId) -> bool {
        self.sessions.contains(id)
    }

    /// Waits for every active request to report, then stops the workers.
    ///
    /// No callback runs after this returns.
    pub fn shutdown(mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };

        let cancelled = self.sessions.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "Dispatcher dropped, cancelling active requests");
        }

        if Handle::try_current().is_ok() {
            // Waiting here would block a runtime thread; pending chains are dropped
            warn!(
                active = self.sessions.len(),
                "Dispatcher dropped from async context, not waiting for callbacks"
            );
            pool.stop();
        } else {
            pool.shutdown();
        }
    }
}

/// How a chain stopped early.
enum Interrupt {
    Cancelled,
    Failed(RequestError),
}

async fn run_session<F>(
    session: Arc<Session>,
    signal: CancelSignal,
    sessions: Arc<SessionTable>,
    on_done: F,
) where
    F: FnOnce(RequestId, Result<String, RequestError>) + Send + 'static,
{
    let mut transport = None;
    let outcome = drive(&session, signal, &mut transport).await;
    finish(&session, transport, outcome, &sessions, on_done);
}

/// connect → checkpoint → write → checkpoint → read until delimiter.
async fn drive(
    session: &Session,
    signal: CancelSignal,
    slot: &mut Option<Transport>,
) -> Result<String, Interrupt> {
    trace!(request_id = session.id(), endpoint = %session.endpoint(), "Connecting");
    let connected = Transport::connect(session.endpoint(), signal)
        .await
        .map_err(|e| interrupt(e, RequestError::Connect))?;
    let transport = slot.insert(connected);
    checkpoint(session)?;

    transport
        .write_all(session.request())
        .await
        .map_err(|e| interrupt(e, RequestError::Write))?;
    checkpoint(session)?;

    let line = transport
        .read_until(DELIMITER)
        .await
        .map_err(|e| interrupt(e, RequestError::Read))?;
    let line = line.strip_suffix(&[DELIMITER]).unwrap_or(&line);
    Ok(String::from_utf8_lossy(line).into_owned())
}

fn interrupt(e: TransportError, stage: fn(io::Error) -> RequestError) -> Interrupt {
    if e.is_cancelled() {
        Interrupt::Cancelled
    } else {
        Interrupt::Failed(stage(e.into_io()))
    }
}

fn checkpoint(session: &Session) -> Result<(), Interrupt> {
    if session.is_cancelled() {
        trace!(request_id = session.id(), "Cancellation observed at checkpoint");
        return Err(Interrupt::Cancelled);
    }
    Ok(())
}

fn finish<F>(
    session: &Session,
    transport: Option<Transport>,
    outcome: Result<String, Interrupt>,
    sessions: &SessionTable,
    on_done: F,
) where
    F: FnOnce(RequestId, Result<String, RequestError>),
{
    let id = session.id();

    if let Some(transport) = transport {
        // Fails if the peer is already gone; nothing to do about it
        if let Err(e) = transport.shutdown(Shutdown::Both) {
            trace!(request_id = id, error = %e, "Ignoring shutdown error");
        }
    }

    sessions.remove(id);

    let result = match outcome {
        Err(Interrupt::Failed(e)) => Err(e),
        _ if session.is_cancelled() => Err(RequestError::Cancelled),
        Ok(response) => Ok(response),
        Err(Interrupt::Cancelled) => Err(RequestError::Cancelled),
    };

    match &result {
        Ok(response) => debug!(request_id = id, %response, "Request completed"),
        Err(RequestError::Cancelled) => debug!(request_id = id, "Request cancelled"),
        Err(e) => warn!(request_id = id, error = %e, "Request failed"),
    }

    on_done(id, result);
}
