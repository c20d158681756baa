//! Preconditioned stabilised bi-conjugate gradients.

use super::controls::SolverControls;
use super::performance::SolverPerformance;
use super::preconditioner::create_preconditioner;
use super::{LinearSolver, keep_iterating};
use crate::error::Result;
use crate::matrix::LduSystem;

/// `PBiCGStab` solver, for symmetric and asymmetric matrices.
#[derive(Clone, Debug)]
pub struct PBiCGStab {
    controls: SolverControls,
}

impl PBiCGStab {
    pub fn new(controls: SolverControls) -> Self {
        Self { controls }
    }
}

impl LinearSolver for PBiCGStab {
    fn name(&self) -> &'static str {
        "PBiCGStab"
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
        let mut perf = SolverPerformance::new(self.name(), field_name);

        let mut y_a = vec![0.0; n];
        system.amul(psi, &mut y_a)?;
        let mut r_a: Vec<f64> = source.iter().zip(&y_a).map(|(b, a)| b - a).collect();

        let norm_factor = system.normalisation_factor(psi, source, &y_a)?;
        perf.initial_residual = system.gsum_mag(&r_a)? / norm_factor;
        perf.final_residual = perf.initial_residual;

        if controls.min_iter == 0 && perf.check_convergence(controls.tolerance, controls.rel_tol) {
            return Ok(perf);
        }

        let preconditioner = create_preconditioner(&controls.preconditioner, system.matrix)?;
        let r_a0 = r_a.clone();
        let mut p_a = vec![0.0; n];
        let mut ay_a = vec![0.0; n];
        let mut s_a = vec![0.0; n];
        let mut z_a = vec![0.0; n];
        let mut t_a = vec![0.0; n];

        let mut r_a0r_a = 0.0;
        let mut alpha = 0.0;
        let mut omega = 0.0;

        loop {
            let r_a0r_a_old = r_a0r_a;
            r_a0r_a = system.gsum_prod(&r_a0, &r_a)?;

            if perf.n_iterations == 0 {
                p_a.copy_from_slice(&r_a);
            } else {
                if perf.check_singularity(r_a0r_a.abs()) {
                    break;
                }
                let beta = (r_a0r_a / r_a0r_a_old) * (alpha / omega);
                for i in 0..n {
                    p_a[i] = r_a[i] + beta * (p_a[i] - omega * ay_a[i]);
                }
            }

            preconditioner.precondition(&p_a, &mut y_a);
            system.amul(&y_a, &mut ay_a)?;
            let r_a0ay_a = system.gsum_prod(&r_a0, &ay_a)?;
            if perf.check_singularity(r_a0ay_a.abs()) {
                break;
            }
            alpha = r_a0r_a / r_a0ay_a;

            for i in 0..n {
                s_a[i] = r_a[i] - alpha * ay_a[i];
            }
            let s_residual = system.gsum_mag(&s_a)? / norm_factor;
            let s_converged = s_residual < controls.tolerance
                || (controls.rel_tol > 0.0 && s_residual < controls.rel_tol * perf.initial_residual);
            if s_converged && perf.n_iterations + 1 >= controls.min_iter {
                for i in 0..n {
                    psi[i] += alpha * y_a[i];
                }
                perf.n_iterations += 1;
                perf.final_residual = s_residual;
                perf.check_convergence(controls.tolerance, controls.rel_tol);
                return Ok(perf);
            }

            preconditioner.precondition(&s_a, &mut z_a);
            system.amul(&z_a, &mut t_a)?;
            let t_at_a = system.gsum_prod(&t_a, &t_a)?;
            if perf.check_singularity(t_at_a) {
                // s is already the residual of psi + alpha y
                for i in 0..n {
                    psi[i] += alpha * y_a[i];
                }
                perf.n_iterations += 1;
                perf.final_residual = s_residual;
                break;
            }
            omega = system.gsum_prod(&t_a, &s_a)? / t_at_a;

            for i in 0..n {
                psi[i] += alpha * y_a[i] + omega * z_a[i];
                r_a[i] = s_a[i] - omega * t_a[i];
            }
            perf.final_residual = system.gsum_mag(&r_a)? / norm_factor;
            perf.n_iterations += 1;

            if !keep_iterating(controls, &mut perf) {
                break;
            }
        }

        perf.check_convergence(controls.tolerance, controls.rel_tol);
        Ok(perf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_solver::test_systems::{convection_1d, poisson_2d};
    use crate::parallel::SerialComm;

    #[test]
    fn test_asymmetric_system() {
        let a = convection_1d(30, 3.0);
        let comm = SerialComm;
        let system = LduSystem::new(&a, &[], &comm);
        let x_exact: Vec<f64> = (0..30).map(|i| (i as f64 * 0.3).sin()).collect();
        let mut b = vec![0.0; 30];
        a.amul(&x_exact, &mut b);

        for pre in ["DILU", "diagonal", "none"] {
            let solver = PBiCGStab::new(SolverControls::pbicgstab(1e-12, 0.0).with_preconditioner(pre));
            let mut x = vec![0.0; 30];
            let perf = solver.solve(&system, &mut x, &b, "T").unwrap();
            assert!(perf.converged, "{pre}: {perf}");
            for (p, q) in x.iter().zip(&x_exact) {
                assert!((p - q).abs() < 1e-8, "{pre}");
            }
        }
    }

    #[test]
    fn test_symmetric_system_with_dic() {
        let a = poisson_2d(5, 4);
        let comm = SerialComm;
        let system = LduSystem::new(&a, &[], &comm);
        let b = vec![1.0; 20];
        let mut x = vec![0.0; 20];
        let perf = PBiCGStab::new(SolverControls::pbicgstab(1e-10, 0.0).with_preconditioner("DIC"))
            .solve(&system, &mut x, &b, "T")
            .unwrap();
        assert!(perf.converged);
        let mut r = vec![0.0; 20];
        system.residual(&x, &b, &mut r).unwrap();
        assert!(r.iter().map(|v| v.abs()).sum::<f64>() < 1e-8);
    }
}
