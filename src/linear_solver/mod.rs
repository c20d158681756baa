//! Iterative solvers for face-addressed systems.
//!
//! Every solver works on one scalar component at a time through an
//! [`LduSystem`], so coupled interfaces and global reductions are handled
//! uniformly. Solvers are chosen at runtime by name:
//!
//! | Name           | Matrices             | Options |
//! |----------------|----------------------|---------|
//! | `PCG`          | symmetric            | preconditioner `DIC`, `diagonal`, `none` |
//! | `PBiCGStab`    | symmetric, asymmetric | preconditioner `DILU`, `DIC`, `diagonal`, `none` |
//! | `smoothSolver` | symmetric, asymmetric | smoother `GaussSeidel`, `symGaussSeidel`, `DIC`, `DILU` |
//! | `GAMG`         | symmetric, asymmetric | smoother, `n_cells_in_coarsest_level` |
//! | `diagonal`     | symmetric, asymmetric | matrices with no off-diagonal part |
//!
//! Residuals are normalised by [`LduSystem::normalisation_factor`] so they
//! are comparable between fields and independent of the solution level.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use fv_rs::linear_solver::{SolverControls, create_linear_solver};
//! use fv_rs::matrix::{LduAddressing, LduMatrix, LduSystem};
//! use fv_rs::parallel::SerialComm;
//!
//! let addr = Arc::new(LduAddressing::new(3, vec![0, 1], vec![1, 2]));
//! let mut a = LduMatrix::new(addr);
//! a.upper_mut().copy_from_slice(&[-1.0, -1.0]);
//! a.diag_mut().copy_from_slice(&[2.0, 2.0, 2.0]);
//!
//! let controls = SolverControls::pcg(1e-10, 0.0);
//! let solver = create_linear_solver(&controls, a.symmetric()).unwrap();
//! let system = LduSystem::new(&a, &[], &SerialComm);
//! let mut x = vec![0.0; 3];
//! let perf = solver.solve(&system, &mut x, &[1.0, 0.0, 1.0], "T").unwrap();
//! assert!(perf.converged);
//! assert!((x[1] - 1.0).abs() < 1e-8);
//! ```

mod controls;
mod diagonal;
mod gamg;
mod pbicgstab;
mod pcg;
mod performance;
mod preconditioner;
mod smooth_solver;
mod smoother;

pub use controls::{DominanceCheck, SolverControls};
pub use diagonal::DiagonalSolver;
pub use gamg::{GamgLevel, GamgSolver, agglomerate_pairwise};
pub use pbicgstab::PBiCGStab;
pub use pcg::Pcg;
pub use performance::SolverPerformance;
pub use preconditioner::{
    DiagonalPreconditioner, DicPreconditioner, DiluPreconditioner, NoPreconditioner,
    Preconditioner, create_preconditioner,
};
pub use smooth_solver::SmoothSolver;
pub use smoother::{GaussSeidelSmoother, PreconditionedSmoother, Smoother, create_smoother};

use crate::error::{FvError, Result};
use crate::matrix::LduSystem;

/// Added to the residual normalisation factor so it is never zero.
pub const SMALL_NORM: f64 = 1e-20;

/// A solver for `A x = b` on one component.
pub trait LinearSolver: Send + Sync {
    /// Solver name as selected (`PCG`, `GAMG`, ...).
    fn name(&self) -> &'static str;

    /// Improve `psi` in place and report residuals.
    fn solve(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [f64],
        source: &[f64],
        field_name: &str,
    ) -> Result<SolverPerformance>;
}

/// Solver names valid for a matrix of the given symmetry.
pub fn valid_solver_names(symmetric: bool) -> &'static [&'static str] {
    if symmetric {
        &["GAMG", "PBiCGStab", "PCG", "diagonal", "smoothSolver"]
    } else {
        &["GAMG", "PBiCGStab", "diagonal", "smoothSolver"]
    }
}

/// Create the solver named in `controls` for a matrix of the given symmetry.
pub fn create_linear_solver(
    controls: &SolverControls,
    symmetric: bool,
) -> Result<Box<dyn LinearSolver>> {
    let kind = if symmetric {
        "symmetric matrix solver"
    } else {
        "asymmetric matrix solver"
    };
    match controls.solver.as_str() {
        "PCG" if symmetric => Ok(Box::new(Pcg::new(controls.clone()))),
        "PBiCGStab" => Ok(Box::new(PBiCGStab::new(controls.clone()))),
        "smoothSolver" => Ok(Box::new(SmoothSolver::new(controls.clone()))),
        "GAMG" => Ok(Box::new(GamgSolver::new(controls.clone()))),
        "diagonal" => Ok(Box::new(DiagonalSolver)),
        other => Err(FvError::unknown_type(
            kind,
            other,
            valid_solver_names(symmetric).iter().copied(),
        )),
    }
}

/// Convergence test shared by the iterative solvers.
///
/// Keeps iterating while below `min_iter`, or while neither tolerance is met
/// and `max_iter` has not been reached.
pub(crate) fn keep_iterating(
    controls: &SolverControls,
    perf: &mut SolverPerformance,
) -> bool {
    let converged = perf.check_convergence(controls.tolerance, controls.rel_tol);
    (perf.n_iterations < controls.max_iter && !converged)
        || perf.n_iterations < controls.min_iter
}

#[cfg(test)]
pub(crate) mod test_systems {
    //! Small systems shared by the solver unit tests.

    use std::sync::Arc;

    use crate::matrix::{LduAddressing, LduMatrix};

    /// 1-D Poisson matrix `[-1 2 -1]` with Dirichlet ends folded into the diagonal.
    pub fn poisson_1d(n: usize) -> LduMatrix {
        let addr = Arc::new(LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect()));
        let mut a = LduMatrix::new(addr);
        a.upper_mut().iter_mut().for_each(|u| *u = -1.0);
        a.diag_mut().iter_mut().for_each(|d| *d = 2.0);
        a
    }

    /// 2-D five-point Poisson matrix on an `nx × ny` grid.
    pub fn poisson_2d(nx: usize, ny: usize) -> LduMatrix {
        let id = |i: usize, j: usize| i + nx * j;
        let mut faces = Vec::new();
        for j in 0..ny {
            for i in 0..nx {
                if i + 1 < nx {
                    faces.push((id(i, j), id(i + 1, j)));
                }
                if j + 1 < ny {
                    faces.push((id(i, j), id(i, j + 1)));
                }
            }
        }
        faces.sort();
        let (lower, upper): (Vec<_>, Vec<_>) = faces.into_iter().unzip();
        let addr = Arc::new(LduAddressing::new(nx * ny, lower, upper));
        let mut a = LduMatrix::new(addr);
        a.upper_mut().iter_mut().for_each(|u| *u = -1.0);
        a.diag_mut().iter_mut().for_each(|d| *d = 4.0);
        a
    }

    /// Convection-diffusion matrix: asymmetric, diagonally dominant.
    pub fn convection_1d(n: usize, peclet: f64) -> LduMatrix {
        let mut a = poisson_1d(n);
        a.lower_mut().iter_mut().for_each(|l| *l = -1.0 - peclet);
        a.diag_mut().iter_mut().for_each(|d| *d = 2.0 + peclet);
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcg_rejected_for_asymmetric_matrix() {
        let controls = SolverControls::pcg(1e-6, 0.0);
        match create_linear_solver(&controls, false) {
            Err(FvError::UnknownType { name, valid, .. }) => {
                assert_eq!(name, "PCG");
                assert!(valid.contains(&"PBiCGStab".to_string()));
                assert!(!valid.contains(&"PCG".to_string()));
            }
            other => panic!("expected unknown type, got {:?}", other.map(|s| s.name())),
        }
    }

    #[test]
    fn test_factory_names() {
        for name in ["PCG", "PBiCGStab", "smoothSolver", "GAMG", "diagonal"] {
            let controls = SolverControls::default().with_solver(name);
            let solver = create_linear_solver(&controls, true).unwrap();
            assert_eq!(solver.name(), name);
        }
        let err = create_linear_solver(&SolverControls::default().with_solver("ICCG"), true);
        assert!(err.is_err());
    }
}
