//! Transport Module
//!
//! Byte-stream endpoints used by both the client and the server.
//!
//! ## Modules
//!
//! - `stream`: cancellable non-blocking transport over Tokio streams
//! - `blocking`: blocking transport over `std::net::TcpStream`
//!
//! Both read in the same way: everything up to and including a delimiter is
//! returned, and bytes that arrived after the delimiter stay buffered for the
//! next read.

pub mod blocking;
pub mod stream;

pub use blocking::BlockingTransport;
pub use stream::{cancel_pair, CancelSignal, Canceller, Transport, TransportError, MAX_BUFFER_SIZE};
