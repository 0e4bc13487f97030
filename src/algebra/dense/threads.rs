//! Process-wide thread count for the dense kernel.
//!
//! The dense kernel may split wide products across threads of its own.
//! That internal parallelism must be quiesced to a single thread while the
//! engine fans work out to its own worker pool, and restored afterwards on
//! every exit path, so the setting is exposed as an RAII guard rather than
//! a pair of calls.

use lazy_static::lazy_static;
use std::sync::atomic::{AtomicUsize, Ordering};

// 0 means "not yet configured": resolve to the environment default on read.
lazy_static! {
    static ref DENSE_THREADS: AtomicUsize = AtomicUsize::new(0);
}

fn environment_threads() -> usize {
    cfg_if::cfg_if! {
        if #[cfg(target_family = "wasm")] {
            1
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }
}

/// Current dense kernel thread count.
pub fn get_dense_threads() -> usize {
    match DENSE_THREADS.load(Ordering::Relaxed) {
        0 => environment_threads(),
        n => n,
    }
}

/// Set the dense kernel thread count.  Zero restores the environment default.
pub fn set_dense_threads(n: usize) {
    DENSE_THREADS.store(n, Ordering::Relaxed);
}

/// Scoped pin of the dense kernel to one thread.
///
/// The previous setting is restored when the guard drops, including on
/// early returns and panics.
pub struct DenseThreadsGuard {
    saved: usize,
}

impl DenseThreadsGuard {
    pub fn single() -> Self {
        let saved = DENSE_THREADS.swap(1, Ordering::Relaxed);
        Self { saved }
    }
}

impl Drop for DenseThreadsGuard {
    fn drop(&mut self) {
        DENSE_THREADS.store(self.saved, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_guard_restores() {
        set_dense_threads(3);
        {
            let _guard = DenseThreadsGuard::single();
            assert_eq!(get_dense_threads(), 1);
        }
        assert_eq!(get_dense_threads(), 3);
        set_dense_threads(0);
    }
}
