//! Preconditioned conjugate gradients for symmetric matrices.

use super::controls::SolverControls;
use super::performance::SolverPerformance;
use super::preconditioner::create_preconditioner;
use super::{LinearSolver, keep_iterating};
use crate::error::Result;
use crate::matrix::LduSystem;

/// `PCG` solver.
#[derive(Clone, Debug)]
pub struct Pcg {
    controls: SolverControls,
}

impl Pcg {
    pub fn new(controls: SolverControls) -> Self {
        Self { controls }
    }
}

impl LinearSolver for Pcg {
    fn name(&self) -> &'static str {
        "PCG"
    }

    fn solve(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [f64],
        source: &[f64],
        field_name: &str,
    ) -> Result<SolverPerformance> {
        let n = system.n_cells();
        let mut perf = SolverPerformance::new(self.name(), field_name);

        let mut w_a = vec![0.0; n];
        system.amul(psi, &mut w_a)?;
        let mut r_a: Vec<f64> = source.iter().zip(&w_a).map(|(b, a)| b - a).collect();

        let norm_factor = system.normalisation_factor(psi, source, &w_a)?;
        perf.initial_residual = system.gsum_mag(&r_a)? / norm_factor;
        perf.final_residual = perf.initial_residual;

        if self.controls.min_iter > 0
            || !perf.check_convergence(self.controls.tolerance, self.controls.rel_tol)
        {
            let preconditioner = create_preconditioner(&self.controls.preconditioner, system.matrix)?;
            let mut p_a = vec![0.0; n];
            let mut w_ar_a = f64::MAX;

            loop {
                let w_ar_a_old = w_ar_a;
                preconditioner.precondition(&r_a, &mut w_a);
                w_ar_a = system.gsum_prod(&w_a, &r_a)?;

                if perf.n_iterations == 0 {
                    p_a.copy_from_slice(&w_a);
                } else {
                    let beta = w_ar_a / w_ar_a_old;
                    for (p, &w) in p_a.iter_mut().zip(&w_a) {
                        *p = w + beta * *p;
                    }
                }

                system.amul(&p_a, &mut w_a)?;
                let w_ap_a = system.gsum_prod(&w_a, &p_a)?;
                if perf.check_singularity(w_ap_a.abs() / norm_factor) {
                    break;
                }

                let alpha = w_ar_a / w_ap_a;
                for i in 0..n {
                    psi[i] += alpha * p_a[i];
                    r_a[i] -= alpha * w_a[i];
                }
                perf.final_residual = system.gsum_mag(&r_a)? / norm_factor;
                perf.n_iterations += 1;

                if !keep_iterating(&self.controls, &mut perf) {
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
    use crate::linear_solver::test_systems::poisson_2d;
    use crate::parallel::SerialComm;

    #[test]
    fn test_pcg_solves_poisson_for_each_preconditioner() {
        let a = poisson_2d(8, 8);
        let comm = SerialComm;
        let system = LduSystem::new(&a, &[], &comm);
        let x_exact: Vec<f64> = (0..64).map(|i| ((i * 7) % 11) as f64).collect();
        let mut b = vec![0.0; 64];
        a.amul(&x_exact, &mut b);

        for pre in ["DIC", "diagonal", "none"] {
            let solver = Pcg::new(SolverControls::pcg(1e-12, 0.0).with_preconditioner(pre));
            let mut x = vec![0.0; 64];
            let perf = solver.solve(&system, &mut x, &b, "T").unwrap();
            assert!(perf.converged, "{pre}: {perf}");
            assert!(perf.n_iterations <= 64);
            for (p, q) in x.iter().zip(&x_exact) {
                assert!((p - q).abs() < 1e-8, "{pre}");
            }
        }
    }

    #[test]
    fn test_already_converged_takes_no_iterations() {
        let a = poisson_2d(3, 3);
        let comm = SerialComm;
        let system = LduSystem::new(&a, &[], &comm);
        let mut x = vec![1.0; 9];
        let mut b = vec![0.0; 9];
        a.amul(&x, &mut b);
        let perf = Pcg::new(SolverControls::pcg(1e-6, 0.0))
            .solve(&system, &mut x, &b, "T")
            .unwrap();
        assert_eq!(perf.n_iterations, 0);
        assert!(perf.converged);
    }
}
