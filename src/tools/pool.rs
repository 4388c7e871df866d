use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

/// A bounded pool of workers for data-parallel per-peer operations
/// (proof generation and verification).
///
/// Tasks are independent and joined before the caller proceeds; results are
/// returned in input order regardless of scheduling.
#[derive(Debug, Clone)]
pub(crate) struct Pool {
    workers: usize,
}

impl Pool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// A pool bounded by the available hardware parallelism.
    pub fn with_default_parallelism() -> Self {
        Self::new(thread::available_parallelism().map(usize::from).unwrap_or(1))
    }

    /// Applies `f` to every item, running at most `workers` tasks at a time.
    /// All tasks are awaited; panics in workers propagate to the caller.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> R + Sync,
    {
        if items.len() <= 1 || self.workers == 1 {
            return items.iter().enumerate().map(|(idx, item)| f(idx, item)).collect();
        }

        let next = AtomicUsize::new(0);
        let results = Mutex::new((0..items.len()).map(|_| None).collect::<Vec<Option<R>>>());

        thread::scope(|scope| {
            for _ in 0..self.workers.min(items.len()) {
                scope.spawn(|| loop {
                    let idx = next.fetch_add(1, Ordering::Relaxed);
                    if idx >= items.len() {
                        break;
                    }
                    let result = f(idx, &items[idx]);
                    results
                        .lock()
                        .expect("no worker panicked while holding the results lock")[idx] =
                        Some(result);
                });
            }
        });

        results
            .into_inner()
            .expect("all workers have finished")
            .into_iter()
            .map(|result| result.expect("every index was processed by exactly one worker"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Pool;

    #[test]
    fn preserves_input_order() {
        let pool = Pool::new(4);
        let items = (0..100u64).collect::<Vec<_>>();
        let results = pool.map(&items, |_idx, item| item * 2);
        assert_eq!(results, (0..100u64).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn single_worker_still_completes() {
        let pool = Pool::new(1);
        let items = vec!["a", "b", "c"];
        let results = pool.map(&items, |idx, item| format!("{idx}{item}"));
        assert_eq!(results, vec!["0a", "1b", "2c"]);
    }
}
