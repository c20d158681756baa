//! Face-addressed sparse matrix.
//!
//! An [`LduMatrix`] stores a diagonal (one per cell) and one upper and one
//! lower coefficient per internal face. For face `f` with `l = lower[f]`
//! (owner) and `u = upper[f]` (neighbour):
//!
//! - `upper[f]` multiplies `x[u]` in row `l`
//! - `lower[f]` multiplies `x[l]` in row `u`
//!
//! Symmetric matrices keep no lower array; it is created on first write.

use std::ops::{AddAssign, MulAssign, Neg, SubAssign};
use std::sync::Arc;

use crate::error::Result;
use crate::mesh::FvMesh;

/// Lower/upper addressing with the derived start and sort tables.
#[derive(Clone, Debug, PartialEq)]
pub struct LduAddressing {
    n_cells: usize,
    lower: Vec<usize>,
    upper: Vec<usize>,
    owner_start: Vec<usize>,
    losort: Vec<usize>,
    losort_start: Vec<usize>,
}

impl LduAddressing {
    /// Build from face lists; faces must be ordered by `lower`.
    pub fn new(n_cells: usize, lower: Vec<usize>, upper: Vec<usize>) -> Self {
        let mut owner_start = vec![0; n_cells + 1];
        for &l in &lower {
            owner_start[l + 1] += 1;
        }
        for c in 0..n_cells {
            owner_start[c + 1] += owner_start[c];
        }

        let mut losort: Vec<usize> = (0..upper.len()).collect();
        losort.sort_by_key(|&f| (upper[f], f));
        let mut losort_start = vec![0; n_cells + 1];
        for &u in &upper {
            losort_start[u + 1] += 1;
        }
        for c in 0..n_cells {
            losort_start[c + 1] += losort_start[c];
        }

        Self {
            n_cells,
            lower,
            upper,
            owner_start,
            losort,
            losort_start,
        }
    }

    /// Addressing of a mesh, shared through the mesh object cache.
    pub fn of_mesh(mesh: &FvMesh) -> Result<Arc<LduAddressing>> {
        mesh.cached_object("lduAddressing", |m| {
            Ok(LduAddressing::new(
                m.n_cells(),
                m.lower_addr().to_vec(),
                m.upper_addr().to_vec(),
            ))
        })
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn n_faces(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[usize] {
        &self.lower
    }

    pub fn upper(&self) -> &[usize] {
        &self.upper
    }

    /// Faces owned by cell `c` are `owner_start[c]..owner_start[c + 1]`.
    pub fn owner_start(&self) -> &[usize] {
        &self.owner_start
    }

    /// Face labels sorted by their upper cell.
    pub fn losort(&self) -> &[usize] {
        &self.losort
    }

    /// Faces with upper cell `c` are `losort[losort_start[c]..losort_start[c + 1]]`.
    pub fn losort_start(&self) -> &[usize] {
        &self.losort_start
    }
}

/// Diagonal, upper and optional lower coefficients on shared addressing.
#[derive(Clone, Debug)]
pub struct LduMatrix {
    addr: Arc<LduAddressing>,
    diag: Vec<f64>,
    upper: Vec<f64>,
    lower: Option<Vec<f64>>,
}

/// Result of [`LduMatrix::check_dominance`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DominanceReport {
    /// Rows with `|diag| (1 + tol) < Σ|off-diagonal|`
    pub violations: usize,
    /// Largest `Σ|off-diagonal| / |diag|`
    pub worst_ratio: f64,
}

impl LduMatrix {
    /// Zero matrix on `addr`.
    pub fn new(addr: Arc<LduAddressing>) -> Self {
        let n = addr.n_cells();
        let nf = addr.n_faces();
        Self {
            addr,
            diag: vec![0.0; n],
            upper: vec![0.0; nf],
            lower: None,
        }
    }

    pub fn addressing(&self) -> &LduAddressing {
        &self.addr
    }

    pub fn shared_addressing(&self) -> Arc<LduAddressing> {
        Arc::clone(&self.addr)
    }

    pub fn n_cells(&self) -> usize {
        self.diag.len()
    }

    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    pub fn diag_mut(&mut self) -> &mut [f64] {
        &mut self.diag
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn upper_mut(&mut self) -> &mut [f64] {
        &mut self.upper
    }

    /// Lower coefficients; the upper ones for a symmetric matrix.
    pub fn lower(&self) -> &[f64] {
        self.lower.as_deref().unwrap_or(&self.upper)
    }

    /// Mutable lower coefficients, making the matrix asymmetric.
    pub fn lower_mut(&mut self) -> &mut [f64] {
        let upper = &self.upper;
        self.lower.get_or_insert_with(|| upper.clone())
    }

    pub fn symmetric(&self) -> bool {
        self.lower.is_none()
    }

    pub fn asymmetric(&self) -> bool {
        self.lower.is_some()
    }

    /// Whether any off-diagonal coefficient is non-zero.
    pub fn has_off_diag(&self) -> bool {
        self.upper.iter().any(|&u| u != 0.0) || self.lower().iter().any(|&l| l != 0.0)
    }

    /// `y = A x` without coupled interfaces.
    pub fn amul(&self, x: &[f64], y: &mut [f64]) {
        let l = self.addr.lower();
        let u = self.addr.upper();
        let lower = self.lower();
        for (yi, (&d, &xi)) in y.iter_mut().zip(self.diag.iter().zip(x)) {
            *yi = d * xi;
        }
        for f in 0..self.upper.len() {
            y[l[f]] += self.upper[f] * x[u[f]];
            y[u[f]] += lower[f] * x[l[f]];
        }
    }

    /// `Σ|off-diagonal|` per row.
    pub fn sum_mag_off_diag(&self) -> Vec<f64> {
        let mut sum = vec![0.0; self.n_cells()];
        let l = self.addr.lower();
        let u = self.addr.upper();
        let lower = self.lower();
        for f in 0..self.upper.len() {
            sum[l[f]] += self.upper[f].abs();
            sum[u[f]] += lower[f].abs();
        }
        sum
    }

    /// Set the diagonal to minus the sum of the off-diagonals in each row.
    pub fn neg_sum_diag(&mut self) {
        let l = self.addr.lower().to_vec();
        let u = self.addr.upper().to_vec();
        let lower = self.lower().to_vec();
        for f in 0..self.upper.len() {
            self.diag[l[f]] -= lower[f];
            self.diag[u[f]] -= self.upper[f];
        }
    }

    /// `-N x`, the off-diagonal part moved to the right-hand side.
    pub fn h_operation(&self, x: &[f64]) -> Vec<f64> {
        let mut h = vec![0.0; self.n_cells()];
        let l = self.addr.lower();
        let u = self.addr.upper();
        let lower = self.lower();
        for f in 0..self.upper.len() {
            h[u[f]] -= lower[f] * x[l[f]];
            h[l[f]] -= self.upper[f] * x[u[f]];
        }
        h
    }

    /// Per-face `upper x[u] - lower x[l]`.
    pub fn face_h(&self, x: &[f64]) -> Vec<f64> {
        let l = self.addr.lower();
        let u = self.addr.upper();
        let lower = self.lower();
        (0..self.upper.len())
            .map(|f| self.upper[f] * x[u[f]] - lower[f] * x[l[f]])
            .collect()
    }

    /// Count rows that are not diagonally dominant within `tolerance`.
    ///
    /// `extra_off_diag` adds coupled-interface magnitudes per row.
    pub fn check_dominance(&self, extra_off_diag: &[f64], tolerance: f64) -> DominanceReport {
        let mut sum_off = self.sum_mag_off_diag();
        for (s, &e) in sum_off.iter_mut().zip(extra_off_diag) {
            *s += e;
        }
        let mut report = DominanceReport {
            violations: 0,
            worst_ratio: 0.0,
        };
        for (&d, &s) in self.diag.iter().zip(&sum_off) {
            let ratio = if d.abs() > 0.0 {
                s / d.abs()
            } else if s > 0.0 {
                f64::INFINITY
            } else {
                0.0
            };
            report.worst_ratio = report.worst_ratio.max(ratio);
            if d.abs() * (1.0 + tolerance) < s {
                report.violations += 1;
            }
        }
        report
    }

    /// Multiply every coefficient of row `c` by `s[c]`.
    pub fn scale_rows(&mut self, s: &[f64]) {
        let l = self.addr.lower().to_vec();
        let u = self.addr.upper().to_vec();
        {
            let lower = self.lower_mut();
            for f in 0..l.len() {
                lower[f] *= s[u[f]];
            }
        }
        for f in 0..l.len() {
            self.upper[f] *= s[l[f]];
        }
        for (d, &si) in self.diag.iter_mut().zip(s) {
            *d *= si;
        }
    }

    fn combine(&mut self, other: &LduMatrix, sign: f64) {
        for (a, &b) in self.diag.iter_mut().zip(&other.diag) {
            *a += sign * b;
        }
        if self.symmetric() && other.symmetric() {
            for (a, &b) in self.upper.iter_mut().zip(&other.upper) {
                *a += sign * b;
            }
            return;
        }
        let other_lower = other.lower().to_vec();
        {
            let lower = self.lower_mut();
            for (a, &b) in lower.iter_mut().zip(&other_lower) {
                *a += sign * b;
            }
        }
        for (a, &b) in self.upper.iter_mut().zip(&other.upper) {
            *a += sign * b;
        }
    }
}

impl AddAssign<&LduMatrix> for LduMatrix {
    fn add_assign(&mut self, other: &LduMatrix) {
        self.combine(other, 1.0);
    }
}

impl SubAssign<&LduMatrix> for LduMatrix {
    fn sub_assign(&mut self, other: &LduMatrix) {
        self.combine(other, -1.0);
    }
}

impl MulAssign<f64> for LduMatrix {
    fn mul_assign(&mut self, s: f64) {
        self.diag.iter_mut().for_each(|d| *d *= s);
        self.upper.iter_mut().for_each(|u| *u *= s);
        if let Some(lower) = self.lower.as_mut() {
            lower.iter_mut().for_each(|l| *l *= s);
        }
    }
}

impl Neg for LduMatrix {
    type Output = LduMatrix;

    fn neg(mut self) -> LduMatrix {
        self *= -1.0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::line_mesh;

    const TOL: f64 = 1e-12;

    fn chain(n: usize) -> Arc<LduAddressing> {
        Arc::new(LduAddressing::new(
            n,
            (0..n - 1).collect(),
            (1..n).collect(),
        ))
    }

    #[test]
    fn test_addressing_tables() {
        let addr = LduAddressing::new(4, vec![0, 0, 1, 2], vec![1, 3, 2, 3]);
        assert_eq!(addr.owner_start(), &[0, 2, 3, 4, 4]);
        assert_eq!(addr.losort(), &[0, 2, 1, 3]);
        assert_eq!(addr.losort_start(), &[0, 0, 1, 2, 4]);
    }

    #[test]
    fn test_mesh_addressing_is_cached() {
        let mesh = line_mesh(5, 1.0).unwrap();
        let a = LduAddressing::of_mesh(&mesh).unwrap();
        let b = LduAddressing::of_mesh(&mesh).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.n_faces(), 4);
    }

    #[test]
    fn test_amul_and_neg_sum_diag() {
        let mut m = LduMatrix::new(chain(3));
        m.upper_mut().copy_from_slice(&[1.0, 2.0]);
        m.neg_sum_diag();
        assert_eq!(m.diag(), &[-1.0, -3.0, -2.0]);
        let mut y = vec![0.0; 3];
        m.amul(&[1.0, 1.0, 1.0], &mut y);
        for v in &y {
            assert!(v.abs() < TOL);
        }
        assert!(m.symmetric());
        m.lower_mut()[0] = 5.0;
        assert!(m.asymmetric());
        m.amul(&[1.0, 0.0, 0.0], &mut y);
        assert_eq!(y, vec![-1.0, 5.0, 0.0]);
    }

    #[test]
    fn test_h_operation_is_negated_off_diagonal_product() {
        let mut m = LduMatrix::new(chain(3));
        m.upper_mut().copy_from_slice(&[-1.0, -1.0]);
        m.diag_mut().copy_from_slice(&[2.0, 2.0, 2.0]);
        let x = [1.0, 2.0, 3.0];
        let h = m.h_operation(&x);
        let mut ax = vec![0.0; 3];
        m.amul(&x, &mut ax);
        for i in 0..3 {
            assert!((m.diag()[i] * x[i] - h[i] - ax[i]).abs() < TOL);
        }
        assert_eq!(m.face_h(&x), vec![-1.0, -1.0]);
    }

    #[test]
    fn test_dominance_and_arithmetic() {
        let mut a = LduMatrix::new(chain(3));
        a.upper_mut().copy_from_slice(&[-1.0, -1.0]);
        a.diag_mut().copy_from_slice(&[1.0, 2.0, 0.5]);
        let report = a.check_dominance(&[0.0; 3], 0.0);
        assert_eq!(report.violations, 1);
        assert!((report.worst_ratio - 2.0).abs() < TOL);

        let mut b = a.clone();
        b.lower_mut()[1] = -3.0;
        a += &b;
        assert!(a.asymmetric());
        assert_eq!(a.lower(), &[-2.0, -4.0]);
        assert_eq!(a.upper(), &[-2.0, -2.0]);
        a -= &b;
        assert_eq!(a.diag(), &[1.0, 2.0, 0.5]);
        let n = -a;
        assert_eq!(n.upper(), &[1.0, 1.0]);
    }
}
