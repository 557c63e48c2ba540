//! Worker pool driving the I/O reactor
//!
//! A fixed number of worker threads cooperatively drain the reactor; any
//! worker may pick up any ready completion. The pool stays alive until
//! [`Executor::stop`], which drains, joins and permits a later restart.

use std::{
    future::Future,
    sync::{Condvar, Mutex},
    time::Duration,
};
use tokio::runtime::{Builder, Handle, Runtime};

pub(crate) struct Executor {
    workers: usize,
    runtime: Mutex<Option<Runtime>>,
    stopped: Mutex<bool>,
    unblock: Condvar,
}

impl Executor {
    /// Builds the pool with `workers` threads, never less than one.
    ///
    /// # Panics
    ///
    /// Panics when the reactor cannot be created (thread or fd exhaustion).
    pub(crate) fn new(workers: usize) -> Self {
        let workers = workers.max(1);

        Self {
            workers,
            runtime: Mutex::new(Some(Self::build(workers))),
            stopped: Mutex::new(false),
            unblock: Condvar::new(),
        }
    }

    fn build(workers: usize) -> Runtime {
        Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("ember-worker")
            .enable_io()
            .enable_time()
            .build()
            .expect("failed to build the I/O reactor")
    }

    /// Re-installs the worker pool after a `stop()`. No-op while running.
    pub(crate) fn ensure_started(&self) {
        let mut runtime = self.runtime.lock().expect("executor lock poisoned");
        if runtime.is_none() {
            *runtime = Some(Self::build(self.workers));
        }
        drop(runtime);

        *self.stopped.lock().expect("executor lock poisoned") = false;
    }

    /// Handle onto the reactor, `None` after `stop()`.
    pub(crate) fn handle(&self) -> Option<Handle> {
        self.runtime
            .lock()
            .expect("executor lock poisoned")
            .as_ref()
            .map(|runtime| runtime.handle().clone())
    }

    /// Enqueues a task for any worker. Ordering across submitters is not
    /// guaranteed; tasks submitted after `stop()` are silently dropped.
    pub(crate) fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(runtime) = self
            .runtime
            .lock()
            .expect("executor lock poisoned")
            .as_ref()
        {
            runtime.spawn(task);
        }
    }

    /// Blocks the calling thread until [`Executor::stop`].
    pub(crate) fn run_blocking(&self) {
        let mut stopped = self.stopped.lock().expect("executor lock poisoned");
        while !*stopped {
            stopped = self
                .unblock
                .wait(stopped)
                .expect("executor lock poisoned");
        }
    }

    /// Shuts the pool down: pending tasks are given a short drain window,
    /// worker threads are joined, blocked [`Executor::run_blocking`] callers
    /// return. A later `ensure_started()` rebuilds the pool.
    pub(crate) fn stop(&self) {
        let runtime = self
            .runtime
            .lock()
            .expect("executor lock poisoned")
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(Duration::from_secs(1));
        }

        *self.stopped.lock().expect("executor lock poisoned") = true;
        self.unblock.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    };
    use std::time::Duration;

    #[test]
    fn submit_runs_tasks() {
        let executor = Executor::new(2);
        let (tx, rx) = mpsc::channel();

        executor.submit(async move {
            tx.send(42u32).unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(42));
        executor.stop();
    }

    #[test]
    fn submit_after_stop_is_dropped() {
        let executor = Executor::new(1);
        executor.stop();

        let ran = Arc::new(AtomicUsize::new(0));
        {
            let ran = ran.clone();
            executor.submit(async move {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn run_blocking_returns_after_stop() {
        let executor = Arc::new(Executor::new(1));

        let blocked = {
            let executor = executor.clone();
            std::thread::spawn(move || executor.run_blocking())
        };

        std::thread::sleep(Duration::from_millis(50));
        executor.stop();

        blocked.join().expect("run_blocking thread panicked");
    }

    #[test]
    fn restart_after_stop() {
        let executor = Executor::new(1);
        executor.stop();
        assert!(executor.handle().is_none());

        executor.ensure_started();
        assert!(executor.handle().is_some());

        let (tx, rx) = mpsc::channel();
        executor.submit(async move {
            tx.send(()).unwrap();
        });
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

        executor.stop();
    }
}
