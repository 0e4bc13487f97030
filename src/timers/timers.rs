use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cumulative named timers.
///
/// Phase costs accumulate across iterations under a static key, so the
/// relative weight of assembly, factorization and back-substitution can be
/// read off at termination.

#[derive(Default, Debug)]
pub struct Timers {
    totals: HashMap<&'static str, Duration>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, adding its wall time to the `key` total.
    pub fn time<R>(&mut self, key: &'static str, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        *self.totals.entry(key).or_default() += start.elapsed();
        out
    }

    /// Total accumulated under `key`.
    pub fn elapsed(&self, key: &'static str) -> Duration {
        self.totals.get(key).copied().unwrap_or(Duration::ZERO)
    }

    pub fn reset(&mut self) {
        self.totals.clear();
    }

    pub fn print(&self) {
        let mut keys: Vec<_> = self.totals.keys().collect();
        keys.sort();
        for key in keys {
            println!("{:24} : {:?}", key, self.totals[key]);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timers_accumulate() {
        let mut t = Timers::new();
        let x = t.time("phase", || 41) + 1;
        t.time("phase", || ());
        assert_eq!(x, 42);
        assert!(t.elapsed("phase") > Duration::ZERO);
        assert_eq!(t.elapsed("other"), Duration::ZERO);

        t.reset();
        assert_eq!(t.elapsed("phase"), Duration::ZERO);
    }
}
