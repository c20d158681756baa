//! Direct solve of a purely diagonal system.

use super::LinearSolver;
use super::performance::SolverPerformance;
use crate::error::Result;
use crate::matrix::LduSystem;

/// `psi = source / diag`, for explicit equations assembled as matrices.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiagonalSolver;

impl LinearSolver for DiagonalSolver {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn solve(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [f64],
        source: &[f64],
        field_name: &str,
    ) -> Result<SolverPerformance> {
        if system.matrix.has_off_diag() {
            log::warn!(
                "diagonal solver applied to '{field_name}', which has off-diagonal coefficients"
            );
        }
        for ((p, &b), &d) in psi.iter_mut().zip(source).zip(system.matrix.diag()) {
            if d != 0.0 {
                *p = b / d;
            }
        }
        let mut perf = SolverPerformance::new(self.name(), field_name);
        perf.converged = true;
        Ok(perf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{LduAddressing, LduMatrix};
    use crate::parallel::SerialComm;
    use std::sync::Arc;

    #[test]
    fn test_diagonal_solve() {
        let mut a = LduMatrix::new(Arc::new(LduAddressing::new(2, vec![0], vec![1])));
        a.diag_mut().copy_from_slice(&[2.0, 4.0]);
        let comm = SerialComm;
        let system = LduSystem::new(&a, &[], &comm);
        let mut x = vec![0.0; 2];
        let perf = DiagonalSolver.solve(&system, &mut x, &[1.0, 1.0], "rho").unwrap();
        assert_eq!(x, vec![0.5, 0.25]);
        assert!(perf.converged);
        assert_eq!(perf.n_iterations, 0);
    }
}
