//! Executor Module
//!
//! This module runs the shared event loop on a fixed group of worker threads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                           │
//! │                                                             │
//! │   keep-alive Work ──┐                                       │
//! │                     ▼                                       │
//! │   ┌─────────────────────────────────┐                       │
//! │   │ EventLoop (outstanding count)   │<── Work per chain     │
//! │   └────────────────┬────────────────┘                       │
//! │                    │ completions                            │
//! │     ┌──────────────┼──────────────┐                         │
//! │     ▼              ▼              ▼                         │
//! │ ┌────────┐    ┌────────┐    ┌────────┐                      │
//! │ │worker-0│    │worker-1│    │worker-N│                      │
//! │ └────────┘    └────────┘    └────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop is alive while at least one [`Work`] exists. The pool holds one
//! as its keep-alive token; releasing it lets the loop drain and the workers
//! return.

pub mod pool;

pub use pool::{EventLoop, Work, WorkerPool};
