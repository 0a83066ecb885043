use crossbeam_channel::{bounded, Receiver};

/// A completion handle for a single enqueued task, readable exactly once.
///
/// Mirrors the single-shot future the source's `TPThreadPool::enqueue`
/// returns (`std::future<T>`), minus the return value: tasks in this pool
/// are opaque closures returning nothing, so the handle only carries
/// completion, not a result.
pub struct TaskHandle {
    done: Receiver<()>,
}

impl TaskHandle {
    pub(super) fn new() -> (Self, impl FnOnce() + Send + 'static) {
        let (tx, rx) = bounded(1);
        let signal = move || {
            // Ignore send errors: a dropped handle means nobody is waiting.
            let _ = tx.send(());
        };
        (Self { done: rx }, signal)
    }

    /// Blocks until the task completes. Panics if called more than once.
    pub fn wait(self) {
        let _ = self.done.recv();
    }

    /// Returns `true` if the task has completed, without blocking.
    pub fn is_done(&self) -> bool {
        matches!(
            self.done.try_recv(),
            Ok(()) | Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }
}
