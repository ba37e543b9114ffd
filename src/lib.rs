//! # Lifeline - Asynchronous TCP Request/Connection Lifecycle Engine
//!
//! Lifeline coordinates the lifecycle of asynchronous TCP requests and
//! connections on a shared, multi-threaded event loop. It provides the two
//! halves of a newline-delimited request/response exchange:
//!
//! - **Client role**: a [`Dispatcher`] that runs each request's
//!   connect → write → read chain, supports explicit cancellation by request
//!   id, and reports exactly one outcome per request to a caller callback.
//! - **Server role**: an [`Acceptor`] that keeps exactly one accept
//!   outstanding and hands every accepted connection to a self-releasing
//!   [`ConnectionHandler`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                              Lifeline                                │
//! │                                                                      │
//! │  ┌────────────────┐                          ┌────────────────────┐  │
//! │  │  Dispatcher    │  spawn session chains    │     Acceptor       │  │
//! │  │  (client)      │──────────┐   ┌───────────│     (server)       │  │
//! │  │  SessionTable  │          │   │           │  accept loop       │  │
//! │  └────────────────┘          ▼   ▼           └─────────┬──────────┘  │
//! │                    ┌──────────────────────┐            │ per conn    │
//! │                    │      EventLoop       │            ▼             │
//! │                    │  (outstanding work)  │  ┌────────────────────┐  │
//! │                    └──────────┬───────────┘  │ ConnectionHandler  │  │
//! │                               │              │ read→process→write │  │
//! │            ┌──────────────────┼──────────┐   └────────────────────┘  │
//! │            ▼                  ▼          ▼                           │
//! │       ┌─────────┐       ┌─────────┐ ┌─────────┐                      │
//! │       │Worker 0 │       │Worker 1 │ │Worker N │   WorkerPool         │
//! │       └─────────┘       └─────────┘ └─────────┘                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use lifeline::{Dispatcher, Server, ServerConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig {
//!     port: 0,
//!     simulated_work: Duration::ZERO,
//!     ..ServerConfig::default()
//! };
//! let server = Server::start(&config)?;
//!
//! let client = Dispatcher::new(4)?;
//! client.submit(server.local_addr(), "PING\n", 1, |id, result| match result {
//!     Ok(response) => println!("Request #{id} has completed. Response: {response}"),
//!     Err(e) => eprintln!("Request #{id} failed: {e}"),
//! })?;
//!
//! // Waits for request #1 to report before returning.
//! client.shutdown();
//! server.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`executor`]: worker pool and event loop work accounting
//! - [`transport`]: cancellable async byte-stream transport plus a blocking counterpart
//! - [`protocol`]: the newline-delimited request/response line protocol
//! - [`commands`]: request processors run by the server
//! - [`client`]: sessions, the active-session table and the request dispatcher
//! - [`connection`]: per-connection handler and shared connection statistics
//! - [`server`]: the accept loop and the server wrapper
//! - [`config`]: client/server configuration and command-line parsing
//! - [`logging`]: tracing subscriber setup
//!
//! ## Design Highlights
//!
//! ### Exactly-Once Completion
//!
//! A request's completion callback is moved into the task that drives the
//! request, so it can only ever be called once. The session is removed from
//! the active-session table before the callback runs, so a callback may
//! immediately re-submit the same request id.
//!
//! ### Checkpoint Cancellation
//!
//! Cancellation is cooperative. Pending connects and reads are aborted;
//! writes are allowed to finish and the cancellation is observed at the
//! checkpoint that follows them.

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod executor;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-export commonly used types for convenience
pub use client::{DispatchError, Dispatcher, RequestError, RequestId};
pub use commands::{CommandProcessor, Processor};
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use connection::{ConnectionHandler, ConnectionStats};
pub use executor::{EventLoop, Work, WorkerPool};
pub use protocol::{Request, Response, DELIMITER};
pub use server::{Acceptor, AcceptorState, Server, ServerError};
pub use transport::{cancel_pair, BlockingTransport, CancelSignal, Canceller, Transport, TransportError};

/// The default port the server listens on
pub const DEFAULT_PORT: u16 = 3333;

/// The default host the server binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of Lifeline
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
