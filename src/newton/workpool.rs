//! Fixed worker pool for the fanned-out assembly phases.
//!
//! Work units are drained from one shared counter, so each unit is claimed
//! exactly once; every unit writes only to locations it owns (a Schur
//! column, a right-hand-side entry, the clique cells of one step column),
//! which keeps numeric results independent of thread scheduling.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared work counter over the unit range `0..end`.
pub(crate) struct WorkCounter {
    next: AtomicUsize,
    end: usize,
}

impl WorkCounter {
    pub fn new(end: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            end,
        }
    }

    /// Claim the next unclaimed unit, if any.  Each unit is handed out
    /// exactly once across all workers.
    pub fn claim(&self) -> Option<usize> {
        let unit = self.next.fetch_add(1, Ordering::Relaxed);
        if unit < self.end {
            Some(unit)
        } else {
            None
        }
    }
}

/// Run `body` on a pool of `nworkers` scoped threads and join them all
/// before returning.  A single worker runs inline on the calling thread.
pub(crate) fn fan_out<F>(nworkers: usize, body: F)
where
    F: Fn() + Sync,
{
    if nworkers <= 1 {
        body();
        return;
    }
    let body = &body;
    std::thread::scope(|s| {
        for _ in 0..nworkers {
            s.spawn(move || body());
        }
    });
}

/// Raw shared view of a mutable slice for disjoint parallel writes.
///
/// The claimed-once property of [`WorkCounter`] is what makes this sound:
/// a unit owns a fixed set of indices, and no index belongs to two units.
pub(crate) struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// Safety: access discipline is enforced by unit ownership, see above.
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}
unsafe impl<T: Send> Send for SharedSlice<'_, T> {}

impl<'a, T> SharedSlice<'a, T>
where
    T: Copy + std::ops::AddAssign,
{
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// No concurrently running unit may touch index `i`.
    pub unsafe fn set(&self, i: usize, v: T) {
        debug_assert!(i < self.len);
        *self.ptr.add(i) = v;
    }

    /// # Safety
    /// No concurrently running unit may touch index `i`.
    pub unsafe fn add(&self, i: usize, v: T) {
        debug_assert!(i < self.len);
        *self.ptr.add(i) += v;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counter_claims_each_unit_once() {
        let counter = WorkCounter::new(1000);
        let claimed: Vec<_> = (0..1000).map(|_| counter.claim().unwrap()).collect();
        let mut sorted = claimed.clone();
        sorted.sort();
        assert_eq!(sorted, (0..1000).collect::<Vec<_>>());
        assert!(counter.claim().is_none());
    }

    #[test]
    fn test_fan_out_disjoint_writes() {
        let n = 257;
        let mut out = vec![0.0f64; n];
        let counter = WorkCounter::new(n);
        let shared = SharedSlice::new(&mut out);

        fan_out(4, || {
            while let Some(i) = counter.claim() {
                // Safety: each i is claimed exactly once
                unsafe { shared.set(i, i as f64) };
            }
        });

        for (i, v) in out.iter().enumerate() {
            assert_eq!(*v, i as f64);
        }
    }
}
