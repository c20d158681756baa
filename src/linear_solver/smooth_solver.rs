//! Iterative solver made of repeated smoothing sweeps.

use super::controls::SolverControls;
use super::performance::SolverPerformance;
use super::smoother::create_smoother;
use super::{LinearSolver, keep_iterating};
use crate::error::Result;
use crate::matrix::LduSystem;

/// `smoothSolver`: `n_sweeps` smoothing sweeps per iteration, residual checked between.
#[derive(Clone, Debug)]
pub struct SmoothSolver {
    controls: SolverControls,
}

impl SmoothSolver {
    pub fn new(controls: SolverControls) -> Self {
        Self { controls }
    }
}

impl LinearSolver for SmoothSolver {
    fn name(&self) -> &'static str {
        "smoothSolver"
    }

    fn solve(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [f64],
        source: &[f64],
        field_name: &str,
    ) -> Result<SolverPerformance> {
        let n = system.n_cells();
        let controls = &self.controls;
        let n_sweeps = controls.n_sweeps.max(1);
        let mut perf = SolverPerformance::new(self.name(), field_name);

        let mut a_psi = vec![0.0; n];
        system.amul(psi, &mut a_psi)?;
        let norm_factor = system.normalisation_factor(psi, source, &a_psi)?;
        let mut r: Vec<f64> = source.iter().zip(&a_psi).map(|(b, a)| b - a).collect();
        perf.initial_residual = system.gsum_mag(&r)? / norm_factor;
        perf.final_residual = perf.initial_residual;

        if controls.min_iter > 0 || !perf.check_convergence(controls.tolerance, controls.rel_tol) {
            let smoother = create_smoother(&controls.smoother, system.matrix)?;
            loop {
                smoother.smooth(system, psi, source, n_sweeps)?;
                system.residual(psi, source, &mut r)?;
                perf.final_residual = system.gsum_mag(&r)? / norm_factor;
                perf.n_iterations += n_sweeps;
                if !keep_iterating(controls, &mut perf) {
                    break;
                }
            }
        }

        Ok(perf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_solver::test_systems::{convection_1d, poisson_2d};
    use crate::parallel::SerialComm;

    #[test]
    fn test_converges_with_each_smoother() {
        let a = poisson_2d(5, 5);
        let comm = SerialComm;
        let system = LduSystem::new(&a, &[], &comm);
        let b: Vec<f64> = (0..25).map(|i| (i % 3) as f64 - 1.0).collect();
        for smoother in ["GaussSeidel", "symGaussSeidel", "DIC"] {
            let controls = SolverControls::smooth_solver(smoother, 1e-10, 0.0).with_max_iter(5000);
            let mut x = vec![0.0; 25];
            let perf = SmoothSolver::new(controls).solve(&system, &mut x, &b, "T").unwrap();
            assert!(perf.converged, "{smoother}: {perf}");
        }
    }

    #[test]
    fn test_asymmetric_with_relative_tolerance() {
        let a = convection_1d(20, 1.0);
        let comm = SerialComm;
        let system = LduSystem::new(&a, &[], &comm);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];
        let controls = SolverControls::smooth_solver("GaussSeidel", 1e-14, 1e-3).with_n_sweeps(2);
        let perf = SmoothSolver::new(controls).solve(&system, &mut x, &b, "T").unwrap();
        assert!(perf.converged);
        assert!(perf.final_residual < 1e-3 * perf.initial_residual);
        assert_eq!(perf.n_iterations % 2, 0);
    }
}
