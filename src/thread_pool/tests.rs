#[cfg(test)]
mod tests {
    use crate::error::CoreError;
    use crate::thread_pool::WorkerPool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn new_rejects_zero_threads() {
        let err = WorkerPool::new(0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }

    #[test]
    fn enqueue_runs_task_and_signals_completion() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        let handle = pool.enqueue(move || {
            counter2.fetch_add(1, Ordering::SeqCst);
        }).unwrap();
        handle.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parallel_for_covers_every_index_exactly_once() {
        let pool = WorkerPool::new(4).unwrap();
        let count = 1000;
        let hits = Arc::new((0..count).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
        let hits2 = hits.clone();
        pool.parallel_for(count, 4, move |start, end| {
            for i in start..end {
                hits2[i].fetch_add(1, Ordering::SeqCst);
            }
        }).unwrap();
        for h in hits.iter() {
            assert_eq!(h.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn parallel_for_handles_small_counts_without_threads() {
        let pool = WorkerPool::new(8).unwrap();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        pool.parallel_for(3, 8, move |start, end| {
            seen2.lock().unwrap().push((start, end));
        }).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(0, 3)]);
    }

    #[test]
    fn enqueue_fails_after_shutdown() {
        let mut pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        let err = pool.enqueue(|| {}).unwrap_err();
        assert!(matches!(err, CoreError::PoolShutDown));
    }

    #[test]
    fn panicking_task_does_not_kill_the_pool() {
        // Initialize the logger so `log::error!` inside `worker_loop`'s
        // panic handler exercises a real subscriber instead of the
        // default no-op one; failure to init (already initialized by an
        // earlier test in this binary) is not itself a test failure.
        let _ = env_logger::builder().is_test(true).try_init();

        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.enqueue(|| panic!("boom")).unwrap();
        handle.wait();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();
        let handle = pool.enqueue(move || {
            counter2.fetch_add(1, Ordering::SeqCst);
        }).unwrap();
        handle.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        pool.shutdown();
    }
}
