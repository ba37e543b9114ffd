//! Worker Pool and Event Loop
//!
//! The event loop is a multi-threaded Tokio scheduler. Tokio itself has no
//! notion of "the loop ran out of work", so outstanding work is counted here:
//! every spawned chain carries a [`Work`] guard, and [`EventLoop::run`]
//! blocks until the count reaches zero.
//!
//! ## Lifecycle
//!
//! ```text
//! WorkerPool::new(n)  ──>  n workers + keep-alive Work (count = 1)
//!        │
//!        │  EventLoop::spawn(chain)      count += 1 per chain
//!        ▼
//! WorkerPool::shutdown()
//!        │  drop keep-alive              count -= 1
//!        │  EventLoop::run()             wait for count == 0
//!        ▼
//!   workers joined
//! ```

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, trace, warn};

/// Prefix for worker thread names
const THREAD_NAME_PREFIX: &str = "lifeline-worker";

/// Outstanding-work counter shared by the loop and every [`Work`] guard.
#[derive(Debug, Default)]
struct WorkCount {
    outstanding: Mutex<usize>,
    drained: Condvar,
}

impl WorkCount {
    fn acquire(&self) {
        let mut outstanding = self.outstanding.lock().unwrap_or_else(PoisonError::into_inner);
        *outstanding += 1;
    }

    fn release(&self) {
        let mut outstanding = self.outstanding.lock().unwrap_or_else(PoisonError::into_inner);
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.drained.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.outstanding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_drained(&self) {
        let mut outstanding = self.outstanding.lock().unwrap_or_else(PoisonError::into_inner);
        while *outstanding > 0 {
            outstanding = self
                .drained
                .wait(outstanding)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// One unit of outstanding work on an [`EventLoop`].
///
/// While any `Work` is alive the loop is considered busy. Dropping the
/// last one lets [`EventLoop::run`] return.
#[derive(Debug)]
#[must_use = "the loop may drain as soon as this guard is dropped"]
pub struct Work {
    count: Arc<WorkCount>,
}

impl Drop for Work {
    fn drop(&mut self) {
        self.count.release();
    }
}

/// A cloneable handle to the shared event loop.
#[derive(Debug, Clone)]
pub struct EventLoop {
    handle: Handle,
    count: Arc<WorkCount>,
}

impl EventLoop {
    /// Registers a new unit of outstanding work.
    pub fn work(&self) -> Work {
        self.count.acquire();
        Work {
            count: Arc::clone(&self.count),
        }
    }

    /// Spawns a chain onto the loop.
    ///
    /// The chain counts as outstanding work from this call until it returns
    /// (or is dropped because the loop was stopped).
    pub fn spawn<F>(&self, chain: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let work = self.work();
        self.handle.spawn(async move {
            let _work = work;
            chain.await;
        });
    }

    /// Blocks the calling thread until all outstanding work has drained.
    ///
    /// Any number of threads may wait at once. Calling this from inside a
    /// chain running on the same loop never returns while that chain is
    /// alive.
    pub fn run(&self) {
        self.count.wait_drained();
    }

    /// Number of outstanding units of work, including the keep-alive token.
    pub fn outstanding(&self) -> usize {
        self.count.get()
    }

    /// The underlying runtime handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// A fixed group of worker threads draining one [`EventLoop`].
///
/// # Example
///
/// ```
/// use lifeline::WorkerPool;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let pool = WorkerPool::new(2).unwrap();
/// let done = Arc::new(AtomicBool::new(false));
///
/// let flag = Arc::clone(&done);
/// pool.event_loop().spawn(async move {
///     flag.store(true, Ordering::SeqCst);
/// });
///
/// // Waits for the spawned chain before joining the workers.
/// pool.shutdown();
/// assert!(done.load(Ordering::SeqCst));
/// ```
pub struct WorkerPool {
    runtime: Option<Runtime>,
    event_loop: EventLoop,
    keep_alive: Option<Work>,
    size: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("outstanding", &self.event_loop.outstanding())
            .finish()
    }
}

impl WorkerPool {
    /// Starts `threads` workers draining a fresh event loop.
    ///
    /// Fails if `threads` is zero or the worker threads cannot be created.
    pub fn new(threads: usize) -> io::Result<Self> {
        if threads == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "worker pool needs at least one thread",
            ));
        }

        let next_id = Arc::new(AtomicUsize::new(0));
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name_fn(move || {
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                format!("{}-{}", THREAD_NAME_PREFIX, id)
            })
            .on_thread_start(|| trace!("Worker thread started"))
            .on_thread_stop(|| trace!("Worker thread stopped"))
            .enable_all()
            .build()?;

        let event_loop = EventLoop {
            handle: runtime.handle().clone(),
            count: Arc::new(WorkCount::default()),
        };
        let keep_alive = Some(event_loop.work());

        info!(threads, "Worker pool started");

        Ok(Self {
            runtime: Some(runtime),
            event_loop,
            keep_alive,
            size: threads,
        })
    }

    /// The loop drained by this pool.
    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Releases the keep-alive token, waits for every outstanding chain to
    /// finish, then joins the workers.
    ///
    /// No chain runs after this returns. Must be called from outside the
    /// pool's own workers.
    pub fn shutdown(mut self) {
        drop(self.keep_alive.take());
        debug!(
            outstanding = self.event_loop.outstanding(),
            "Waiting for outstanding work to drain"
        );
        self.event_loop.run();
        self.join();
        info!("Worker pool shut down");
    }

    /// Stops the loop without waiting for outstanding chains.
    ///
    /// Pending chains are dropped in place, which closes any sockets they
    /// own. A worker busy inside a chain is still joined: this returns only
    /// once every worker thread has exited. Must be called from outside the
    /// pool's own workers.
    pub fn stop(mut self) {
        drop(self.keep_alive.take());
        self.join();
        info!("Worker pool stopped");
    }

    fn join(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };

        if Handle::try_current().is_ok() {
            // Blocking is not allowed inside a runtime
            warn!("Worker pool released from async context, workers are not joined");
            runtime.shutdown_background();
        } else {
            // Dropping the runtime waits for every worker thread, without a timeout
            drop(runtime);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.keep_alive.take());
        self.join();
    }
}
