#![allow(non_snake_case)]

use crate::algebra::*;

/// Symmetric tridiagonal matrix, the projection produced by the Lanczos
/// process.  Only its extreme eigenvalue is ever needed, computed by Sturm
/// sequence bisection.

#[derive(Debug, Clone)]
pub struct SymTridiagonal<T = f64> {
    /// diagonal entries
    pub diag: Vec<T>,
    /// subdiagonal entries, length `diag.len() - 1`
    pub offdiag: Vec<T>,
}

impl<T> SymTridiagonal<T>
where
    T: FloatT,
{
    pub fn new(diag: Vec<T>, offdiag: Vec<T>) -> Self {
        assert!(!diag.is_empty());
        assert_eq!(offdiag.len() + 1, diag.len());
        Self { diag, offdiag }
    }

    pub fn dim(&self) -> usize {
        self.diag.len()
    }

    // number of eigenvalues strictly less than x, from the signs
    // of the Sturm sequence of leading principal minors
    fn count_below(&self, x: T) -> usize {
        let n = self.dim();
        let tiny = T::epsilon() * T::epsilon();

        let mut count = 0;
        let mut q = self.diag[0] - x;
        if q < T::zero() {
            count += 1;
        }
        for i in 1..n {
            if q.abs() < tiny {
                // avoid division breakdown at an exact pivot zero
                q = tiny;
            }
            let e = self.offdiag[i - 1];
            q = self.diag[i] - x - e * e / q;
            if q < T::zero() {
                count += 1;
            }
        }
        count
    }

    /// Smallest eigenvalue, to a relative bisection tolerance.
    pub fn min_eigenvalue(&self) -> T {
        let n = self.dim();
        let two = T::one() + T::one();

        // Gershgorin bounds
        let mut lo = T::infinity();
        let mut hi = -T::infinity();
        for i in 0..n {
            let left = if i > 0 { self.offdiag[i - 1].abs() } else { T::zero() };
            let right = if i < n - 1 { self.offdiag[i].abs() } else { T::zero() };
            let r = left + right;
            lo = T::min(lo, self.diag[i] - r);
            hi = T::max(hi, self.diag[i] + r);
        }

        let tol = T::epsilon() * two * T::max(T::one(), T::max(lo.abs(), hi.abs()));
        while hi - lo > tol {
            let mid = (lo + hi) / two;
            if mid <= lo || mid >= hi {
                break;
            }
            if self.count_below(mid) >= 1 {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        (lo + hi) / two
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_min_eigenvalue_diag() {
        let t = SymTridiagonal::<f64>::new(vec![3., 1., 2.], vec![0., 0.]);
        assert!((t.min_eigenvalue() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_min_eigenvalue_laplacian() {
        // 1D Laplacian of size n: eigenvalues 2 - 2cos(kπ/(n+1))
        let n = 20;
        let t = SymTridiagonal::new(vec![2.0; n], vec![-1.0; n - 1]);
        let expect = 2.0 - 2.0 * (std::f64::consts::PI / (n as f64 + 1.0)).cos();
        assert!((t.min_eigenvalue() - expect).abs() < 1e-9);
    }

    #[test]
    fn test_min_eigenvalue_single() {
        let t = SymTridiagonal::<f64>::new(vec![-4.0], vec![]);
        assert!((t.min_eigenvalue() + 4.0).abs() < 1e-12);
    }
}
