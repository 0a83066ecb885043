use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use super::handle::TaskHandle;
use crate::error::{CoreError, CoreResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    not_empty: Condvar,
    shutdown: Mutex<bool>,
}

/// A fixed set of OS threads draining a single FIFO task queue.
///
/// Grounded on `original_source/thread_pool.h`'s `TPTaskQueue` /
/// `TPThreadPool`: a `VecDeque` behind a mutex, a condition variable workers
/// block on when the queue is empty, and a latching shutdown flag that
/// wakes every worker so it can exit instead of waiting forever.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    thread_count: usize,
}

impl WorkerPool {
    /// Spawns `n` worker threads. Fails with `InvalidConfig` if `n == 0`.
    pub fn new(n: usize) -> CoreResult<Self> {
        if n == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "worker pool thread count must be >= 1".to_string(),
            });
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            shutdown: Mutex::new(false),
        });

        let workers = (0..n)
            .map(|index| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("sim-core-worker-{index}"))
                    .spawn(move || worker_loop(shared, index))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Ok(Self {
            shared,
            workers,
            thread_count: n,
        })
    }

    /// Number of worker threads in the pool.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Number of tasks currently waiting in the queue (not counting tasks
    /// already claimed by a worker).
    pub fn pending_count(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// Enqueues a single closure and returns a handle readable exactly
    /// once, signaled when the task completes. Fails with `PoolShutDown`
    /// if `shutdown` has already been called.
    pub fn enqueue<F>(&self, f: F) -> CoreResult<TaskHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if *self.shared.shutdown.lock() {
            return Err(CoreError::PoolShutDown);
        }

        let (handle, signal) = TaskHandle::new();
        let task: Task = Box::new(move || {
            f();
            signal();
        });

        self.shared.queue.lock().push_back(task);
        self.shared.not_empty.notify_one();
        Ok(handle)
    }

    /// Partitions `[0, count)` into roughly `k` contiguous slices and runs
    /// `f(start, end)` on each, returning only after every slice has
    /// completed. Falls back to running `f` directly on the calling thread
    /// when the work is too small to be worth dispatching, matching the
    /// source's `partitionThreads` early-out for a zero-sized slice.
    ///
    /// `F` need only be `Sync`, not `'static`: every dispatched slice is
    /// joined (via the trailing barrier and `handle.wait()`) before this
    /// call returns, so `f` and anything it borrows are guaranteed to
    /// outlive every worker's use of them. This is the same scoped-borrow
    /// contract `std::thread::scope`/`crossbeam::scope` give; it is
    /// implemented by hand here because tasks are submitted to a
    /// long-lived queue rather than spawned fresh per call.
    pub fn parallel_for<F>(&self, count: usize, k: usize, f: F) -> CoreResult<()>
    where
        F: Fn(usize, usize) + Sync,
    {
        if count == 0 {
            return Ok(());
        }
        let k = k.max(1);
        let slice = count / k;
        if slice == 0 {
            f(0, count);
            return Ok(());
        }

        let f_ref: &(dyn Fn(usize, usize) + Sync) = &f;
        // SAFETY: the erased 'static lifetime never escapes this function.
        // Every slice dispatched below is enqueued, then joined by the
        // `barrier.wait()` / `handle.wait()` calls before `parallel_for`
        // returns, so no worker can observe `f_ref` after `f` is dropped.
        let f_static: &'static (dyn Fn(usize, usize) + Sync) =
            unsafe { std::mem::transmute(f_ref) };

        let barrier = Arc::new(Barrier::new(k + 1));
        let mut handles = Vec::with_capacity(k);

        for i in 0..k {
            let start = i * slice;
            let end = if i == k - 1 { count } else { start + slice };
            let barrier = barrier.clone();
            let handle = self.enqueue(move || {
                f_static(start, end);
                barrier.wait();
            })?;
            handles.push(handle);
        }

        barrier.wait();
        for handle in handles {
            handle.wait();
        }
        Ok(())
    }

    /// Signals termination and joins every worker thread. Idempotent:
    /// calling `shutdown` more than once is a no-op after the first call.
    pub fn shutdown(&mut self) {
        {
            let mut shutdown = self.shared.shutdown.lock();
            if *shutdown {
                return;
            }
            *shutdown = true;
        }
        self.shared.not_empty.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>, index: usize) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    break Some(task);
                }
                if *shared.shutdown.lock() {
                    break None;
                }
                shared.not_empty.wait(&mut queue);
            }
        };

        let Some(task) = task else {
            return;
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            let message = panic_message(&payload);
            log::error!("worker {index} task panicked: {message}");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
