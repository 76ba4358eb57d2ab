//! Multi-producer dispatch service over a single timer wheel.
//!
//! The wheel is single-threaded by contract, so producers never touch it
//! directly: a [`DispatchHandle`] pushes submissions onto a lock-free MPSC
//! queue, and the worker loop drains that queue into the wheel, advances
//! it against the clock, fires due work, and parks until the wheel's next
//! expiration or the next submission, whichever comes first.
//!
//! Jobs run synchronously on the advancing worker. A job may submit more
//! work through a handle, but must not call [`Dispatcher::shutdown`] from
//! inside itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::entry::Entry;
use crate::error::{DispatchError, DispatchResult};
use crate::metrics::{DispatchMetrics, DispatchMetricsSnapshot};
use crate::wheel::TimerWheel;
use crate::workgroup::WorkGroup;

type Job = Box<dyn FnOnce() + Send>;

struct Submission {
    deadline_ns: i64,
    job: Job,
}

/// Non-decreasing nanosecond clock: wall-clock anchor captured once at
/// start, advanced by a monotonic instant.
struct Clock {
    base_ns: i64,
    started: Instant,
}

impl Clock {
    fn new() -> DispatchResult<Self> {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| DispatchError::ClockSkew)?;
        Ok(Self {
            base_ns: base.as_nanos() as i64,
            started: Instant::now(),
        })
    }

    fn now_ns(&self) -> i64 {
        self.base_ns
            .saturating_add(self.started.elapsed().as_nanos() as i64)
    }
}

struct Shared {
    wheel: Mutex<TimerWheel<(), ()>>,
    submissions: SegQueue<Submission>,
    park: Mutex<()>,
    wakeup: Condvar,
    shutdown: AtomicBool,
    metrics: DispatchMetrics,
    clock: Clock,
    max_park: Duration,
}

impl Shared {
    /// One worker iteration: drain submissions into the wheel, advance,
    /// then park until something changes.
    fn pump(&self) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }

        let now_ns = self.clock.now_ns();
        let mut wheel = self.wheel.lock();
        let mut fired = 0;
        while let Some(submission) = self.submissions.pop() {
            // Already-due work runs right away instead of waiting for its
            // past bucket to come around again.
            if submission.deadline_ns <= now_ns {
                (submission.job)();
                fired += 1;
            } else {
                wheel.schedule(Entry::task(submission.deadline_ns, submission.job));
            }
        }
        fired += wheel.advance(now_ns);
        let delay_ns = wheel.expiration_delay();
        drop(wheel);

        if fired > 0 {
            self.metrics.add_fired(fired as u64);
            tracing::trace!(fired, "fired deferred work");
        }

        let park_for = Duration::from_nanos(delay_ns.max(0) as u64).min(self.max_park);
        let mut guard = self.park.lock();
        // A submission or shutdown that raced in since the drain must not
        // be slept through.
        if self.shutdown.load(Ordering::Acquire) || !self.submissions.is_empty() {
            return;
        }
        let _ = self.wakeup.wait_for(&mut guard, park_for);
        self.metrics.incr_park_wakeups();
    }

    fn notify(&self) {
        let _guard = self.park.lock();
        self.wakeup.notify_all();
    }
}

/// Owns the wheel, the submission queue, and the worker group driving them.
pub struct Dispatcher {
    shared: Arc<Shared>,
    group: WorkGroup,
    stopped: bool,
}

impl Dispatcher {
    /// Normalize the configuration, anchor the clock, and spawn the worker
    /// group.
    pub fn start(config: Config) -> DispatchResult<Self> {
        let config = config.normalized();
        let clock = Clock::new()?;
        let initial_cursor = clock.now_ns();
        let shared = Arc::new(Shared {
            wheel: Mutex::new(TimerWheel::new(initial_cursor)),
            submissions: SegQueue::new(),
            park: Mutex::new(()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
            metrics: DispatchMetrics::default(),
            clock,
            max_park: Duration::from_millis(config.dispatch.max_park_ms),
        });
        let worker_shared = Arc::clone(&shared);
        let group = WorkGroup::new(config.dispatch.workers, move || worker_shared.pump());
        tracing::debug!(workers = config.dispatch.workers, "dispatcher started");
        Ok(Self {
            shared,
            group,
            stopped: false,
        })
    }

    /// A cloneable producer handle.
    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Work items accepted but not yet fired.
    pub fn pending(&self) -> usize {
        // Holding the wheel lock keeps the drain from moving submissions
        // between the two counts mid-read.
        let wheel = self.shared.wheel.lock();
        self.shared.submissions.len() + wheel.len()
    }

    pub fn metrics(&self) -> DispatchMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Stop accepting work, wake and join the workers, and discard whatever
    /// never fired. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.notify();
        self.group.close();

        let mut discarded = 0u64;
        while self.shared.submissions.pop().is_some() {
            discarded += 1;
        }
        discarded += self.shared.wheel.lock().len() as u64;
        self.shared.metrics.add_discarded(discarded);
        tracing::debug!(discarded, "dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Producer-side handle: submits deferred work from any thread.
#[derive(Clone)]
pub struct DispatchHandle {
    shared: Arc<Shared>,
}

impl DispatchHandle {
    /// The dispatcher's current clock reading in nanoseconds.
    pub fn now_ns(&self) -> i64 {
        self.shared.clock.now_ns()
    }

    /// Run `job` once the clock passes `deadline_ns`. Overdue deadlines
    /// fire on the next worker iteration.
    pub fn defer_at(
        &self,
        deadline_ns: i64,
        job: impl FnOnce() + Send + 'static,
    ) -> DispatchResult<()> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(DispatchError::Shutdown);
        }
        self.shared.submissions.push(Submission {
            deadline_ns,
            job: Box::new(job),
        });
        self.shared.metrics.incr_submitted();
        self.shared.notify();
        Ok(())
    }

    /// Run `job` after `delay` from now.
    pub fn defer(&self, delay: Duration, job: impl FnOnce() + Send + 'static) -> DispatchResult<()> {
        let delay_ns = i64::try_from(delay.as_nanos()).unwrap_or(i64::MAX);
        self.defer_at(self.now_ns().saturating_add(delay_ns), job)
    }
}
