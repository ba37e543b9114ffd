//! Request Processing Module
//!
//! The processing step of a server connection: a pure, synchronous transform
//! from request bytes to response bytes.
//!
//! ## Architecture
//!
//! ```text
//! Request line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandProcessor│  (this module)
//! │                 │
//! │  - Parse        │
//! │  - Execute      │
//! │  - Serialize    │
//! └────────┬────────┘
//!          │
//!          ▼
//!   Response line
//! ```
//!
//! Processing runs on the worker thread that completed the read. A slow
//! processor occupies that worker, so a server serves at most as many
//! requests at once as it has workers.

pub mod processor;

pub use processor::{CommandProcessor, Processor};
