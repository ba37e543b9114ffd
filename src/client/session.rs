//! Sessions and the Active-Session Table
//!
//! A [`Session`] is the shared part of one in-flight request: its identity,
//! target, payload and cancellation state. The chain driving the request and
//! the [`SessionTable`] each hold an `Arc` to it until the request finishes.
//!
//! ## Locking
//!
//! ```text
//! cancel(id):   table lock ──► session cancel lock ──► flag = true
//!                                                      cancel pending I/O
//! checkpoint:                  session cancel lock ──► read flag
//! ```
//!
//! The table lock is never taken while a session lock is held.

use crate::transport::{cancel_pair, CancelSignal, Canceller};
use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

/// Caller-assigned identity of a request, unique while the request is active.
pub type RequestId = u32;

/// Why a request did not produce a response.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Opening or connecting the socket failed
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// Sending the request failed
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Receiving the response failed
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The request was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
}

impl RequestError {
    /// Returns true if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }
}

/// State for one in-flight request.
#[derive(Debug)]
pub struct Session {
    /// Unique ID assigned to the request
    id: RequestId,

    /// Remote endpoint
    endpoint: SocketAddr,

    /// Request bytes, delimiter included
    request: Bytes,

    /// Cancellation flag, guarded separately from the session table
    was_cancelled: Mutex<bool>,

    /// Aborts the transport's pending operation
    canceller: Canceller,
}

impl Session {
    /// Creates a session and the signal its transport will watch.
    pub fn new(id: RequestId, endpoint: SocketAddr, request: Bytes) -> (Self, CancelSignal) {
        let (canceller, signal) = cancel_pair();
        let session = Self {
            id,
            endpoint,
            request,
            was_cancelled: Mutex::new(false),
            canceller,
        };
        (session, signal)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn request(&self) -> &Bytes {
        &self.request
    }

    /// Flags the session as cancelled and aborts its pending operation.
    pub fn cancel(&self) {
        let mut was_cancelled = self
            .was_cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *was_cancelled = true;
        self.canceller.cancel_pending();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self
            .was_cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Request id → session map for every request that has not finished.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<RequestId, Arc<Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. Returns false if its id is already active.
    pub fn insert(&self, session: Arc<Session>) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(&session.id()) {
            return false;
        }
        sessions.insert(session.id(), session);
        true
    }

    /// Removes a finished session.
    pub fn remove(&self, id: RequestId) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    /// Cancels the active session with this id.
    ///
    /// Returns false if no such session is active.
    pub fn cancel(&self, id: RequestId) -> bool {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(&id) {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every active session. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        for session in sessions.values() {
            session.cancel();
        }
        sessions.len()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
