//! Resizable group of worker threads all running the same task in a loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// A group of worker threads that each re-run the shared task until told to
/// stop.
///
/// The task is expected to block or park internally; the group only loops
/// it. Shrinking signals the excess workers and joins them, so `resize` can
/// block for up to one task iteration per removed worker.
pub struct WorkGroup {
    task: Arc<dyn Fn() + Send + Sync>,
    workers: Vec<Worker>,
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl WorkGroup {
    /// Spawn `size` workers running `task`.
    pub fn new(size: usize, task: impl Fn() + Send + Sync + 'static) -> Self {
        let mut group = Self {
            task: Arc::new(task),
            workers: Vec::new(),
        };
        group.resize(size);
        group
    }

    /// Current number of workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Grow or shrink the group to `size` workers, returning the previous
    /// size. Shrinking joins the removed workers before returning.
    pub fn resize(&mut self, size: usize) -> usize {
        let previous = self.workers.len();
        if size == previous {
            return previous;
        }
        while self.workers.len() < size {
            self.spawn();
        }
        if size < self.workers.len() {
            let excess: Vec<Worker> = self.workers.drain(size..).collect();
            for worker in &excess {
                worker.stop.store(true, Ordering::Release);
            }
            for worker in excess {
                let _ = worker.handle.join();
            }
        }
        tracing::debug!(previous, current = size, "workgroup resized");
        previous
    }

    /// Stop every worker and wait for them to exit.
    pub fn close(&mut self) {
        self.resize(0);
    }

    fn spawn(&mut self) {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let task = Arc::clone(&self.task);
        let handle = thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                task();
            }
        });
        self.workers.push(Worker { stop, handle });
    }
}

impl Drop for WorkGroup {
    fn drop(&mut self) {
        self.close();
    }
}
