use rayon::prelude::*;
use tracing::{debug, warn};

/// Maps `f` over `items` on at most `max_workers` threads.
///
/// Results are collected by input index, so the output order always matches the input
/// order no matter which worker finishes first.
pub fn parallel_map<T, U, F>(items: Vec<T>, max_workers: usize, f: F) -> Vec<U>
where
    T: Send,
    U: Send,
    F: Fn(T) -> U + Sync + Send,
{
    let workers = items.len().min(max_workers);
    if workers <= 1 {
        return items.into_iter().map(f).collect();
    }

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("mailmatch-validate-{i}"))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "Failed to build worker pool, using the global pool");
            return items.into_par_iter().map(f).collect();
        }
    };

    debug!(workers, items = items.len(), "Dispatching to worker pool");
    pool.install(|| items.into_par_iter().map(f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn preserves_input_order() {
        let items: Vec<u64> = (0..500).collect();
        // later items finish first
        let out = parallel_map(items, 10, |n| {
            thread::sleep(Duration::from_micros(500 - n));
            n * 2
        });
        let expected: Vec<u64> = (0..500).map(|n| n * 2).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn order_is_independent_of_worker_count() {
        let items: Vec<String> = (0..97).map(|i| format!("item{i}")).collect();
        for workers in [1, 2, 3, 10, 64] {
            let out = parallel_map(items.clone(), workers, |s| s.to_uppercase());
            let expected: Vec<String> = items.iter().map(|s| s.to_uppercase()).collect();
            assert_eq!(out, expected, "workers: {workers}");
        }
    }

    #[test]
    fn never_exceeds_worker_bound() {
        let seen = Mutex::new(HashSet::new());
        let items: Vec<u32> = (0..200).collect();
        parallel_map(items, 3, |_| {
            seen.lock()
                .unwrap()
                .insert(thread::current().id());
            thread::sleep(Duration::from_micros(200));
        });
        assert!(seen.lock().unwrap().len() <= 3);
    }

    #[test]
    fn empty_and_single_inputs() {
        let out: Vec<u8> = parallel_map(Vec::<u8>::new(), 10, |b| b);
        assert!(out.is_empty());
        assert_eq!(parallel_map(vec![7], 10, |n| n + 1), vec![8]);
    }
}
