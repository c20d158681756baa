//! Smoothers used by `smoothSolver` and the multigrid levels.

use super::preconditioner::{DicPreconditioner, DiluPreconditioner, Preconditioner};
use crate::error::{FvError, Result};
use crate::matrix::{LduMatrix, LduSystem};

/// Reduces the high-frequency error of `psi` in place.
pub trait Smoother: Send + Sync {
    fn name(&self) -> &'static str;

    fn smooth(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [f64],
        source: &[f64],
        n_sweeps: usize,
    ) -> Result<()>;
}

/// Create a smoother by name for `matrix`.
pub fn create_smoother(name: &str, matrix: &LduMatrix) -> Result<Box<dyn Smoother>> {
    match name {
        "GaussSeidel" => Ok(Box::new(GaussSeidelSmoother::forward())),
        "symGaussSeidel" => Ok(Box::new(GaussSeidelSmoother::symmetric())),
        "DIC" if matrix.symmetric() => Ok(Box::new(PreconditionedSmoother::new(
            "DIC",
            Box::new(DicPreconditioner::new(matrix)),
        ))),
        "DILU" => Ok(Box::new(PreconditionedSmoother::new(
            "DILU",
            Box::new(DiluPreconditioner::new(matrix)),
        ))),
        other => {
            let valid: &[&str] = if matrix.symmetric() {
                &["DIC", "DILU", "GaussSeidel", "symGaussSeidel"]
            } else {
                &["DILU", "GaussSeidel", "symGaussSeidel"]
            };
            Err(FvError::unknown_type("smoother", other, valid.iter().copied()))
        }
    }
}

// =============================================================================
// Gauss-Seidel
// =============================================================================

/// Row-wise Gauss-Seidel; the symmetric variant adds a backward sweep.
///
/// Interface contributions are frozen at the start of each sweep and moved
/// to the right-hand side.
#[derive(Clone, Copy, Debug)]
pub struct GaussSeidelSmoother {
    symmetric: bool,
}

impl GaussSeidelSmoother {
    pub fn forward() -> Self {
        Self { symmetric: false }
    }

    pub fn symmetric() -> Self {
        Self { symmetric: true }
    }

    fn relax_row(matrix: &LduMatrix, psi: &mut [f64], b: &[f64], cell: usize) {
        let addr = matrix.addressing();
        let (l, u) = (addr.lower(), addr.upper());
        let (owner_start, losort, losort_start) =
            (addr.owner_start(), addr.losort(), addr.losort_start());
        let upper = matrix.upper();
        let lower = matrix.lower();

        let mut sum = b[cell];
        for f in owner_start[cell]..owner_start[cell + 1] {
            sum -= upper[f] * psi[u[f]];
        }
        for &f in &losort[losort_start[cell]..losort_start[cell + 1]] {
            sum -= lower[f] * psi[l[f]];
        }
        let d = matrix.diag()[cell];
        if d != 0.0 {
            psi[cell] = sum / d;
        }
    }
}

impl Smoother for GaussSeidelSmoother {
    fn name(&self) -> &'static str {
        if self.symmetric {
            "symGaussSeidel"
        } else {
            "GaussSeidel"
        }
    }

    fn smooth(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [f64],
        source: &[f64],
        n_sweeps: usize,
    ) -> Result<()> {
        let n = system.n_cells();
        let mut b_prime = vec![0.0; n];
        for _ in 0..n_sweeps {
            // interface term: A x includes -coeff * pnf, so it moves to b with a + sign
            let mut iface = vec![0.0; n];
            system.update_interfaces(psi, &mut iface)?;
            for ((bp, &b), &i) in b_prime.iter_mut().zip(source).zip(&iface) {
                *bp = b - i;
            }

            for cell in 0..n {
                Self::relax_row(system.matrix, psi, &b_prime, cell);
            }
            if self.symmetric {
                for cell in (0..n).rev() {
                    Self::relax_row(system.matrix, psi, &b_prime, cell);
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Preconditioner-based smoothing
// =============================================================================

/// `psi += M⁻¹ (b - A psi)` per sweep, with `M` an incomplete factorisation.
pub struct PreconditionedSmoother {
    name: &'static str,
    preconditioner: Box<dyn Preconditioner>,
}

impl PreconditionedSmoother {
    pub fn new(name: &'static str, preconditioner: Box<dyn Preconditioner>) -> Self {
        Self {
            name,
            preconditioner,
        }
    }
}

impl Smoother for PreconditionedSmoother {
    fn name(&self) -> &'static str {
        self.name
    }

    fn smooth(
        &self,
        system: &LduSystem<'_>,
        psi: &mut [f64],
        source: &[f64],
        n_sweeps: usize,
    ) -> Result<()> {
        let n = system.n_cells();
        let mut r = vec![0.0; n];
        let mut w = vec![0.0; n];
        for _ in 0..n_sweeps {
            system.residual(psi, source, &mut r)?;
            self.preconditioner.precondition(&r, &mut w);
            for (p, &wi) in psi.iter_mut().zip(&w) {
                *p += wi;
            }
        }
        Ok(())
    }
}
