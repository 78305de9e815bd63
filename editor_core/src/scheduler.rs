//! Background task pool.
//!
//! A fixed set of worker threads pulls boxed closures from a shared
//! crossbeam channel. Documents use it for asynchronous loading and for
//! background highlighting.

use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn finish(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Handle to a pool of worker threads. Cloning shares the pool.
#[derive(Clone)]
pub struct Scheduler {
    sender: Sender<Task>,
    pending: Arc<Pending>,
    threads: usize,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("threads", &self.threads)
            .field("pending", &*self.pending.count.lock())
            .finish()
    }
}

impl Scheduler {
    /// Starts `threads` workers. The workers exit once every handle is dropped.
    pub fn new(threads: usize) -> Self {
        let (sender, receiver) = unbounded::<Task>();
        let pending = Arc::new(Pending::default());
        let mut started = 0;
        for i in 0..threads.max(1) {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let spawned = thread::Builder::new()
                .name(format!("strata-worker-{}", i))
                .spawn(move || {
                    for task in receiver.iter() {
                        task();
                        pending.finish();
                    }
                });
            match spawned {
                Ok(_) => started += 1,
                Err(e) => log::error!("Failed to start worker thread {}: {}", i, e),
            }
        }
        log::debug!("Scheduler started with {} workers", started);
        Self {
            sender,
            pending,
            threads: started,
        }
    }

    /// Returns the number of running workers.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queues `task` to run on a worker.
    pub fn spawn(&self, task: impl FnOnce() + Send + 'static) {
        *self.pending.count.lock() += 1;
        if self.sender.send(Box::new(task)).is_err() {
            log::warn!("Scheduler is shut down; dropping task");
            self.pending.finish();
        }
    }

    /// Returns the number of queued or running tasks.
    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    /// Blocks until no tasks are queued or running, or `timeout` passes.
    /// Returns true if the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.pending.count.lock();
        while *count > 0 {
            if self.pending.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        let threads = thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(2);
        Self::new(threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_tasks() {
        let scheduler = Scheduler::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            scheduler.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(scheduler.wait_idle(Duration::from_secs(10)));
        assert_eq!(counter.load(Ordering::SeqCst), 16);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_idle_without_tasks() {
        let scheduler = Scheduler::new(1);
        assert!(scheduler.wait_idle(Duration::from_millis(10)));
        assert_eq!(scheduler.threads(), 1);
    }
}
