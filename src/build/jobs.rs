//! Bounded work fifo and the worker pool used for parallel parsing.
//!
//! One fifo per pool; submission blocks when full, optionally with a
//! deadline. Workers parse one file end-to-end per job; a worker that
//! observes the stop flag finishes its current job (so no half-written
//! records remain) and then exits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, ErrorCode, Result};

/// Upper bound on queued jobs.
pub const FIFO_MAX_CAP: usize = 1024;

/// Upper bound on simultaneous workers.
pub const POOL_MAX_CAP: usize = 100;

struct FifoInner<T> {
    q: VecDeque<T>,
    closed: bool,
}

/// Blocking bounded fifo.
pub struct BoundedFifo<T> {
    cap: usize,
    inner: Mutex<FifoInner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedFifo<T> {
    pub fn new(cap: usize) -> Self {
        BoundedFifo {
            cap: cap.clamp(1, FIFO_MAX_CAP),
            inner: Mutex::new(FifoInner {
                q: VecDeque::new(),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Push an item, blocking while the fifo is full. With a deadline,
    /// the item is handed back on timeout; it is also handed back when
    /// the fifo has been closed.
    pub fn push(&self, item: T, deadline: Option<Duration>) -> std::result::Result<(), T> {
        let mut g = self.inner.lock();
        loop {
            if g.closed {
                return Err(item);
            }
            if g.q.len() < self.cap {
                g.q.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            match deadline {
                Some(d) => {
                    if self.not_full.wait_for(&mut g, d).timed_out() {
                        return Err(item);
                    }
                }
                None => self.not_full.wait(&mut g),
            }
        }
    }

    /// Pop the next item, blocking while empty. `None` once the fifo is
    /// closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut g = self.inner.lock();
        loop {
            if let Some(item) = g.q.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if g.closed {
                return None;
            }
            self.not_empty.wait(&mut g);
        }
    }

    /// Close the fifo; queued items still drain.
    pub fn close(&self) {
        let mut g = self.inner.lock();
        g.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-capacity worker pool over a bounded fifo.
pub struct WorkerPool {
    fifo: Arc<BoundedFifo<Job>>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<WorkerPool> {
        let n = workers.clamp(1, POOL_MAX_CAP);
        let fifo = Arc::new(BoundedFifo::<Job>::new(FIFO_MAX_CAP));
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(n);
        for i in 0..n {
            let fifo = Arc::clone(&fifo);
            let stop = Arc::clone(&stop);
            let handle = std::thread::Builder::new()
                .name(format!("rstags-worker-{}", i))
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        match fifo.pop() {
                            Some(job) => job(),
                            None => break,
                        }
                    }
                })
                .map_err(|e| {
                    Error::with_message(ErrorCode::Io, format!("cannot spawn worker: {}", e))
                })?;
            handles.push(handle);
        }
        Ok(WorkerPool {
            fifo,
            stop,
            workers: handles,
        })
    }

    /// Queue one job; blocks while the fifo is full, up to `deadline`
    /// when one is given.
    pub fn submit(&self, job: Job, deadline: Option<Duration>) -> Result<()> {
        self.fifo
            .push(job, deadline)
            .map_err(|_| Error::with_message(ErrorCode::Overflow, "job queue unavailable"))
    }

    /// Ask workers to exit after their current job.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        self.fifo.close();
    }

    /// Drain the queue and join every worker.
    pub fn shutdown(self) -> Result<()> {
        self.fifo.close();
        for handle in self.workers {
            handle
                .join()
                .map_err(|_| Error::with_message(ErrorCode::Io, "worker panicked"))?;
        }
        Ok(())
    }
}
