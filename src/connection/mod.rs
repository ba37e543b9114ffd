//! Connection Handler Module
//!
//! This module serves individual accepted connections. Each connection is
//! driven by its own chain on the event loop and releases itself when the
//! exchange is over.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Acceptor                             │
//! │                     (server module)                         │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │ For each connection... │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn chain (detached)
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read line   │───>│ Process     │───>│ Write resp  │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                        ┌─────────────┐      │
//! │                                        │ Self-release│      │
//! │                                        └─────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Self-owned**: no external owner holds a handler after it is started
//! - **Buffer Management**: each handler has its own inbound `BytesMut` buffer
//! - **Statistics**: Tracks connection and request metrics

pub mod handler;

// Re-export commonly used types
pub use handler::{ConnectionError, ConnectionHandler, ConnectionStats};
