//! Client Module
//!
//! Issues requests on the shared event loop and reports each one's outcome
//! exactly once.
//!
//! ## Request Chain
//!
//! ```text
//! submit(endpoint, payload, id, on_done)
//!        │  insert into SessionTable
//!        ▼
//!   connect ──► checkpoint ──► write ──► checkpoint ──► read until '\n'
//!      │            │            │            │               │
//!      └────────────┴────────────┴─────┬──────┴───────────────┘
//!                                      ▼
//!                                   finish
//!                     shutdown + close socket (errors ignored)
//!                     remove from SessionTable
//!                     on_done(id, result)
//! ```
//!
//! A checkpoint consults the session's cancellation flag. Errors at any
//! stage go straight to `finish`.

pub mod dispatcher;
pub mod session;

pub use dispatcher::{DispatchError, Dispatcher};
pub use session::{RequestError, RequestId, Session, SessionTable};
