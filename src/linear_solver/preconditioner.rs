//! Preconditioners for the Krylov solvers.
//!
//! Coupled interfaces are ignored: only the local matrix is factorised.

use crate::error::{FvError, Result};
use crate::matrix::LduMatrix;

/// Approximate inverse: `w ≈ A⁻¹ r`.
pub trait Preconditioner: Send + Sync {
    fn name(&self) -> &'static str;

    fn precondition(&self, r: &[f64], w: &mut [f64]);
}

/// Create a preconditioner by name for `matrix`.
pub fn create_preconditioner(name: &str, matrix: &LduMatrix) -> Result<Box<dyn Preconditioner>> {
    match name {
        "DIC" if matrix.symmetric() => Ok(Box::new(DicPreconditioner::new(matrix))),
        "DILU" => Ok(Box::new(DiluPreconditioner::new(matrix))),
        "diagonal" => Ok(Box::new(DiagonalPreconditioner::new(matrix))),
        "none" => Ok(Box::new(NoPreconditioner)),
        other => {
            let valid: &[&str] = if matrix.symmetric() {
                &["DIC", "DILU", "diagonal", "none"]
            } else {
                &["DILU", "diagonal", "none"]
            };
            Err(FvError::unknown_type("preconditioner", other, valid.iter().copied()))
        }
    }
}

fn reciprocal(d: f64) -> f64 {
    if d != 0.0 { 1.0 / d } else { 0.0 }
}

// =============================================================================
// none / diagonal
// =============================================================================

/// Identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPreconditioner;

impl Preconditioner for NoPreconditioner {
    fn name(&self) -> &'static str {
        "none"
    }

    fn precondition(&self, r: &[f64], w: &mut [f64]) {
        w.copy_from_slice(r);
    }
}

/// Jacobi scaling by the reciprocal diagonal.
#[derive(Clone, Debug)]
pub struct DiagonalPreconditioner {
    r_diag: Vec<f64>,
}

impl DiagonalPreconditioner {
    pub fn new(matrix: &LduMatrix) -> Self {
        Self {
            r_diag: matrix.diag().iter().map(|&d| reciprocal(d)).collect(),
        }
    }
}

impl Preconditioner for DiagonalPreconditioner {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn precondition(&self, r: &[f64], w: &mut [f64]) {
        for ((wi, &ri), &rd) in w.iter_mut().zip(r).zip(&self.r_diag) {
            *wi = rd * ri;
        }
    }
}

// =============================================================================
// DIC
// =============================================================================

/// Diagonal incomplete Cholesky for symmetric matrices.
///
/// Only the diagonal of the factor is stored; the off-diagonals are the
/// matrix's own.
#[derive(Clone, Debug)]
pub struct DicPreconditioner {
    r_d: Vec<f64>,
    lower_addr: Vec<usize>,
    upper_addr: Vec<usize>,
    upper: Vec<f64>,
}

impl DicPreconditioner {
    pub fn new(matrix: &LduMatrix) -> Self {
        let addr = matrix.addressing();
        let l = addr.lower();
        let u = addr.upper();
        let upper = matrix.upper();
        let mut r_d = matrix.diag().to_vec();
        for f in 0..upper.len() {
            r_d[u[f]] -= upper[f] * upper[f] / r_d[l[f]];
        }
        for d in &mut r_d {
            *d = reciprocal(*d);
        }
        Self {
            r_d,
            lower_addr: l.to_vec(),
            upper_addr: u.to_vec(),
            upper: upper.to_vec(),
        }
    }

    /// Reciprocal factor diagonal.
    pub fn reciprocal_diag(&self) -> &[f64] {
        &self.r_d
    }
}

impl Preconditioner for DicPreconditioner {
    fn name(&self) -> &'static str {
        "DIC"
    }

    fn precondition(&self, r: &[f64], w: &mut [f64]) {
        let (l, u) = (&self.lower_addr, &self.upper_addr);
        for ((wi, &ri), &rd) in w.iter_mut().zip(r).zip(&self.r_d) {
            *wi = rd * ri;
        }
        for f in 0..self.upper.len() {
            w[u[f]] -= self.r_d[u[f]] * self.upper[f] * w[l[f]];
        }
        for f in (0..self.upper.len()).rev() {
            w[l[f]] -= self.r_d[l[f]] * self.upper[f] * w[u[f]];
        }
    }
}

// =============================================================================
// DILU
// =============================================================================

/// Diagonal incomplete LU for asymmetric matrices.
#[derive(Clone, Debug)]
pub struct DiluPreconditioner {
    r_d: Vec<f64>,
    lower_addr: Vec<usize>,
    upper_addr: Vec<usize>,
    losort: Vec<usize>,
    upper: Vec<f64>,
    lower: Vec<f64>,
}

impl DiluPreconditioner {
    pub fn new(matrix: &LduMatrix) -> Self {
        let addr = matrix.addressing();
        let l = addr.lower();
        let u = addr.upper();
        let upper = matrix.upper();
        let lower = matrix.lower();
        let mut r_d = matrix.diag().to_vec();
        for f in 0..upper.len() {
            r_d[u[f]] -= upper[f] * lower[f] / r_d[l[f]];
        }
        for d in &mut r_d {
            *d = reciprocal(*d);
        }
        Self {
            r_d,
            lower_addr: l.to_vec(),
            upper_addr: u.to_vec(),
            losort: addr.losort().to_vec(),
            upper: upper.to_vec(),
            lower: lower.to_vec(),
        }
    }
}

impl Preconditioner for DiluPreconditioner {
    fn name(&self) -> &'static str {
        "DILU"
    }

    fn precondition(&self, r: &[f64], w: &mut [f64]) {
        let (l, u) = (&self.lower_addr, &self.upper_addr);
        for ((wi, &ri), &rd) in w.iter_mut().zip(r).zip(&self.r_d) {
            *wi = rd * ri;
        }
        for &f in &self.losort {
            w[u[f]] -= self.r_d[u[f]] * self.lower[f] * w[l[f]];
        }
        for f in (0..self.upper.len()).rev() {
            w[l[f]] -= self.r_d[l[f]] * self.upper[f] * w[u[f]];
        }
    }
}
