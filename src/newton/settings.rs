use crate::algebra::*;
use derive_builder::Builder;

/// Settings for the Newton direction engine.
///
/// Built with the generated [`NewtonSettingsBuilder`]:
/// ```
/// use sdpcore::newton::NewtonSettingsBuilder;
/// let settings = NewtonSettingsBuilder::<f64>::default()
///     .worker_threads(4)
///     .build()
///     .unwrap();
/// ```

#[derive(Builder, Debug, Clone)]
pub struct NewtonSettings<T: FloatT> {
    /// worker pool size for fanned-out assembly phases.
    /// choosing 0 lets the engine use the environment default
    #[builder(default = "0")]
    pub worker_threads: usize,

    /// the Schur complement is kept dense when the fraction of
    /// structurally nonzero constraint pairs exceeds this threshold
    #[builder(default = "(0.5).as_T()")]
    pub schur_density_threshold: T,

    /// relative diagonal floor for the dense Schur factorization
    #[builder(default = "(1e-13).as_T()")]
    pub schur_pivot_floor: T,

    /// the iteration is declared stagnated when both step lengths
    /// fall below this value
    #[builder(default = "(1e-4).as_T()")]
    pub step_collapse_tol: T,

    /// iteration cap for the minimum eigenvalue estimator
    #[builder(default = "150")]
    pub lanczos_max_iter: u32,

    /// minimum estimator iterations before the relative-change test applies
    #[builder(default = "10")]
    pub lanczos_min_iter: u32,

    /// relative-change convergence tolerance for the estimator
    #[builder(default = "(1e-8).as_T()")]
    pub lanczos_tol: T,

    /// subdiagonal floor below which the estimator declares an invariant
    /// subspace and stops
    #[builder(default = "(1e-12).as_T()")]
    pub lanczos_subdiag_floor: T,

    /// verbose printing
    #[builder(default = "false")]
    pub verbose: bool,
}

impl<T> Default for NewtonSettings<T>
where
    T: FloatT,
{
    fn default() -> NewtonSettings<T> {
        NewtonSettingsBuilder::<T>::default().build().unwrap()
    }
}

impl<T> NewtonSettings<T>
where
    T: FloatT,
{
    /// Resolved worker pool size for fanned-out phases.
    pub fn worker_count(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        cfg_if::cfg_if! {
            if #[cfg(target_family = "wasm")] {
                1
            } else {
                std::thread::available_parallelism().map_or(1, |n| n.get())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_settings_default() {
        let s = NewtonSettings::<f64>::default();
        assert!(s.worker_count() >= 1);
        assert_eq!(s.step_collapse_tol, 1e-4);
    }

    #[test]
    fn test_settings_builder() {
        let s = NewtonSettingsBuilder::<f64>::default()
            .worker_threads(2)
            .verbose(true)
            .build()
            .unwrap();
        assert_eq!(s.worker_count(), 2);
        assert!(s.verbose);
    }
}
