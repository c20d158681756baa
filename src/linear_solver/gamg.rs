//! Algebraic multigrid with pairwise face agglomeration.
//!
//! Coarse levels are built by pairing each cell with its most strongly
//! coupled unpaired neighbour. Coarse matrices are the Galerkin sums of the
//! fine coefficients. The cycle is a V-cycle with Gauss-Seidel (or the
//! configured) smoothing and a dense LU solve on the coarsest level.
//!
//! Coupled interfaces only enter the finest level; coarse levels are local to
//! each domain and serve as a preconditioner for the finest-level iteration.

use std::collections::BTreeMap;

use faer::{Mat, linalg::solvers::Solve};

use super::controls::SolverControls;
use super::performance::SolverPerformance;
use super::smoother::{GaussSeidelSmoother, Smoother, create_smoother};
use super::{LinearSolver, keep_iterating};
use crate::error::Result;
use crate::matrix::{LduAddressing, LduMatrix, LduSystem};
use crate::parallel::SerialComm;
use crate::types::{VSMALL, stabilise};

/// Upper bound on the number of coarse levels.
const MAX_LEVELS: usize = 50;

/// Coarsening stops once a level keeps more than this share of its cells.
const MIN_COARSENING: f64 = 0.9;

/// Gauss-Seidel sweeps used when the coarsest LU solve fails.
const COARSEST_FALLBACK_SWEEPS: usize = 100;

/// One coarse level.
#[derive(Clone, Debug)]
pub struct GamgLevel {
    /// Galerkin matrix of this level
    pub matrix: LduMatrix,
    /// Coarse cell of each cell of the next finer level
    pub restrict_addr: Vec<usize>,
}

impl GamgLevel {
    pub fn n_cells(&self) -> usize {
        self.matrix.n_cells()
    }
}

/// Pair each cell with its strongest unpaired neighbour.
///
/// Returns the coarse cell of every fine cell and the number of coarse cells.
/// Cells left without an unpaired neighbour join their strongest neighbour's
/// group, or stay alone if isolated.
pub fn agglomerate_pairwise(matrix: &LduMatrix) -> (Vec<usize>, usize) {
    let addr = matrix.addressing();
    let (l, u) = (addr.lower(), addr.upper());
    let (owner_start, losort, losort_start) =
        (addr.owner_start(), addr.losort(), addr.losort_start());
    let upper = matrix.upper();
    let lower = matrix.lower();
    let weight = |f: usize| 0.5 * (upper[f].abs() + lower[f].abs());

    let n = matrix.n_cells();
    let mut coarse = vec![usize::MAX; n];
    let mut n_coarse = 0;

    for cell in 0..n {
        if coarse[cell] != usize::MAX {
            continue;
        }
        let neighbours = (owner_start[cell]..owner_start[cell + 1])
            .map(|f| (u[f], weight(f)))
            .chain(
                losort[losort_start[cell]..losort_start[cell + 1]]
                    .iter()
                    .map(|&f| (l[f], weight(f))),
            );

        let mut best_free: Option<(usize, f64)> = None;
        let mut best_any: Option<(usize, f64)> = None;
        for (nbr, w) in neighbours {
            if best_any.is_none_or(|(_, bw)| w > bw) {
                best_any = Some((nbr, w));
            }
            if coarse[nbr] == usize::MAX && best_free.is_none_or(|(_, bw)| w > bw) {
                best_free = Some((nbr, w));
            }
        }

        match (best_free, best_any) {
            (Some((nbr, _)), _) => {
                coarse[cell] = n_coarse;
                coarse[nbr] = n_coarse;
                n_coarse += 1;
            }
            (None, Some((nbr, _))) => coarse[cell] = coarse[nbr],
            (None, None) => {
                coarse[cell] = n_coarse;
                n_coarse += 1;
            }
        }
    }
    (coarse, n_coarse)
}

/// Galerkin coarse matrix for piecewise-constant restriction.
fn restrict_matrix(fine: &LduMatrix, agg: &[usize], n_coarse: usize) -> LduMatrix {
    let addr = fine.addressing();
    let (l, u) = (addr.lower(), addr.upper());
    let upper = fine.upper();
    let lower = fine.lower();

    let mut diag = vec![0.0; n_coarse];
    for (c, &d) in fine.diag().iter().enumerate() {
        diag[agg[c]] += d;
    }

    let mut faces: BTreeMap<(usize, usize), (f64, f64)> = BTreeMap::new();
    for f in 0..upper.len() {
        let (cl, cu) = (agg[l[f]], agg[u[f]]);
        if cl == cu {
            diag[cl] += upper[f] + lower[f];
        } else if cl < cu {
            let e = faces.entry((cl, cu)).or_insert((0.0, 0.0));
            e.0 += upper[f];
            e.1 += lower[f];
        } else {
            let e = faces.entry((cu, cl)).or_insert((0.0, 0.0));
            e.0 += lower[f];
            e.1 += upper[f];
        }
    }

    let (cl, cu): (Vec<usize>, Vec<usize>) = faces.keys().copied().unzip();
    let mut coarse = LduMatrix::new(std::sync::Arc::new(LduAddressing::new(n_coarse, cl, cu)));
    coarse.diag_mut().copy_from_slice(&diag);
    for (dst, (up, _)) in coarse.upper_mut().iter_mut().zip(faces.values()) {
        *dst = *up;
    }
    if fine.asymmetric() {
        for (dst, (_, lo)) in coarse.lower_mut().iter_mut().zip(faces.values()) {
            *dst = *lo;
        }
    }
    coarse
}

fn restrict_field(fine: &[f64], agg: &[usize], n_coarse: usize) -> Vec<f64> {
    let mut coarse = vec![0.0; n_coarse];
    for (&v, &c) in fine.iter().zip(agg) {
        coarse[c] += v;
    }
    coarse
}

fn prolong_field(coarse: &[f64], agg: &[usize]) -> Vec<f64> {
    agg.iter().map(|&c| coarse[c]).collect()
}

/// Rescale a correction by the energy-minimising factor and add a Jacobi step.
fn scale_correction(matrix: &LduMatrix, corr: &mut [f64], residual: &[f64]) {
    let mut a_corr = vec![0.0; corr.len()];
    matrix.amul(corr, &mut a_corr);
    let num: f64 = residual.iter().zip(corr.iter()).map(|(r, c)| r * c).sum();
    let den: f64 = a_corr.iter().zip(corr.iter()).map(|(a, c)| a * c).sum();
    apply_scale(matrix.diag(), corr, residual, &a_corr, num / stabilise(den, VSMALL));
}

fn apply_scale(diag: &[f64], corr: &mut [f64], residual: &[f64], a_corr: &[f64], sf: f64) {
    for i in 0..corr.len() {
        let jacobi = if diag[i] != 0.0 {
            (residual[i] - sf * a_corr[i]) / diag[i]
        } else {
            0.0
        };
        corr[i] = sf * corr[i] + jacobi;
    }
}

/// Direct solve on the coarsest level.
///
/// A matrix whose rows all sum to zero is singular up to a constant; its
/// first cell is pinned to zero. Gauss-Seidel takes over if LU fails.
fn coarsest_solve(matrix: &LduMatrix, b: &[f64]) -> Vec<f64> {
    let n = matrix.n_cells();
    if n == 0 {
        return Vec::new();
    }
    let addr = matrix.addressing();
    let (l, u) = (addr.lower(), addr.upper());
    let upper = matrix.upper();
    let lower = matrix.lower();

    let mut a = Mat::<f64>::zeros(n, n);
    for (i, &d) in matrix.diag().iter().enumerate() {
        a[(i, i)] = d;
    }
    for f in 0..upper.len() {
        a[(l[f], u[f])] += upper[f];
        a[(u[f], l[f])] += lower[f];
    }
    let mut rhs = Mat::<f64>::zeros(n, 1);
    for (i, &v) in b.iter().enumerate() {
        rhs[(i, 0)] = v;
    }

    let singular = (0..n).all(|i| {
        let row_sum: f64 = (0..n).map(|j| a[(i, j)]).sum();
        row_sum.abs() <= 1e-12 * a[(i, i)].abs().max(VSMALL)
    });
    if singular && n > 1 {
        for j in 0..n {
            a[(0, j)] = 0.0;
        }
        a[(0, 0)] = 1.0;
        rhs[(0, 0)] = 0.0;
    }

    let lu = a.as_ref().full_piv_lu();
    let x = lu.solve(&rhs);
    let solution: Vec<f64> = (0..n).map(|i| x[(i, 0)]).collect();
    if solution.iter().all(|v| v.is_finite()) {
        return solution;
    }

    log::debug!("GAMG: coarsest LU failed on {n} cells, using Gauss-Seidel");
    let system = LduSystem::new(matrix, &[], &SerialComm);
    let mut e = vec![0.0; n];
    // no interfaces on a local level, so smoothing cannot fail
    let _ = GaussSeidelSmoother::symmetric().smooth(&system, &mut e, b, COARSEST_FALLBACK_SWEEPS);
    e
}

/// `GAMG` solver.
#[derive(Clone, Debug)]
pub struct GamgSolver {
    controls: SolverControls,
}

impl GamgSolver {
    pub fn new(controls: SolverControls) -> Self {
        Self { controls }
    }

    /// Coarse levels for `fine`, finest first.
    pub fn hierarchy(&self, fine: &LduMatrix) -> Vec<GamgLevel> {
        let mut levels: Vec<GamgLevel> = Vec::new();
        while levels.len() < MAX_LEVELS {
            let current = levels.last().map_or(fine, |lvl| &lvl.matrix);
            let n = current.n_cells();
            if n <= self.controls.n_cells_in_coarsest_level {
                break;
            }
            let (agg, n_coarse) = agglomerate_pairwise(current);
            if n_coarse == 0 || n_coarse as f64 > MIN_COARSENING * n as f64 {
                break;
            }
            let matrix = restrict_matrix(current, &agg, n_coarse);
            levels.push(GamgLevel {
                matrix,
                restrict_addr: agg,
            });
        }
        log::debug!(
            "GAMG: {} levels, coarsest {} cells",
            levels.len() + 1,
            levels.last().map_or(fine.n_cells(), GamgLevel::n_cells)
        );
        levels
    }

    /// Correction on coarse level `k` (1-based) for right-hand side `b`.
    fn coarse_correction(&self, levels: &[GamgLevel], k: usize, b: &[f64]) -> Result<Vec<f64>> {
        let matrix = &levels[k - 1].matrix;
        if k == levels.len() {
            return Ok(coarsest_solve(matrix, b));
        }

        let system = LduSystem::new(matrix, &[], &SerialComm);
        let smoother = create_smoother(&self.controls.smoother, matrix)?;
        let n = matrix.n_cells();

        let mut e = vec![0.0; n];
        if self.controls.n_pre_sweeps > 0 {
            smoother.smooth(&system, &mut e, b, self.controls.n_pre_sweeps)?;
        }
        let mut r = vec![0.0; n];
        system.residual(&e, b, &mut r)?;

        let next = &levels[k];
        let rc = restrict_field(&r, &next.restrict_addr, next.n_cells());
        let ec = self.coarse_correction(levels, k + 1, &rc)?;
        let mut corr = prolong_field(&ec, &next.restrict_addr);
        if matrix.symmetric() {
            scale_correction(matrix, &mut corr, &r);
        }
        for (ei, c) in e.iter_mut().zip(corr) {
            *ei += c;
        }

        smoother.smooth(&system, &mut e, b, self.controls.n_post_sweeps.max(1))?;
        Ok(e)
    }

    fn v_cycle(
        &self,
        system: &LduSystem<'_>,
        levels: &[GamgLevel],
        psi: &mut [f64],
        source: &[f64],
    ) -> Result<()> {
        let n = system.n_cells();
        let smoother = create_smoother(&self.controls.smoother, system.matrix)?;
        if self.controls.n_pre_sweeps > 0 {
            smoother.smooth(system, psi, source, self.controls.n_pre_sweeps)?;
        }

        let mut r = vec![0.0; n];
        system.residual(psi, source, &mut r)?;

        let mut corr = match levels.first() {
            Some(first) => {
                let rc = restrict_field(&r, &first.restrict_addr, first.n_cells());
                let ec = self.coarse_correction(levels, 1, &rc)?;
                prolong_field(&ec, &first.restrict_addr)
            }
            None => coarsest_solve(system.matrix, &r),
        };

        if system.matrix.symmetric() {
            let mut a_corr = vec![0.0; n];
            system.amul(&corr, &mut a_corr)?;
            let num = system.gsum_prod(&r, &corr)?;
            let den = system.gsum_prod(&a_corr, &corr)?;
            apply_scale(system.matrix.diag(), &mut corr, &r, &a_corr, num / stabilise(den, VSMALL));
        }
        for (p, c) in psi.iter_mut().zip(corr) {
            *p += c;
        }

        smoother.smooth(system, psi, source, self.controls.n_post_sweeps.max(1))
    }
}

impl LinearSolver for GamgSolver {
    fn name(&self) -> &'static str {
        "GAMG"
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

        let mut a_psi = vec![0.0; n];
        system.amul(psi, &mut a_psi)?;
        let norm_factor = system.normalisation_factor(psi, source, &a_psi)?;
        let mut r: Vec<f64> = source.iter().zip(&a_psi).map(|(b, a)| b - a).collect();
        perf.initial_residual = system.gsum_mag(&r)? / norm_factor;
        perf.final_residual = perf.initial_residual;

        if controls.min_iter > 0 || !perf.check_convergence(controls.tolerance, controls.rel_tol) {
            let levels = self.hierarchy(system.matrix);
            loop {
                self.v_cycle(system, &levels, psi, source)?;
                system.residual(psi, source, &mut r)?;
                perf.final_residual = system.gsum_mag(&r)? / norm_factor;
                perf.n_iterations += 1;
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
    use crate::linear_solver::test_systems::{convection_1d, poisson_1d, poisson_2d};

    const TOL: f64 = 1e-12;

    #[test]
    fn test_pairwise_agglomeration_halves_a_chain() {
        let a = poisson_1d(8);
        let (agg, n) = agglomerate_pairwise(&a);
        assert_eq!(n, 4);
        assert_eq!(agg, vec![0, 0, 1, 1, 2, 2, 3, 3]);

        let (agg, n) = agglomerate_pairwise(&poisson_1d(5));
        assert_eq!(n, 2);
        assert_eq!(agg[4], agg[3]);
    }

    #[test]
    fn test_galerkin_matrix_preserves_row_sums() {
        let a = poisson_2d(6, 6);
        let (agg, n) = agglomerate_pairwise(&a);
        let c = restrict_matrix(&a, &agg, n);
        let ones_f = vec![1.0; 36];
        let mut af = vec![0.0; 36];
        a.amul(&ones_f, &mut af);
        let mut ac = vec![0.0; n];
        c.amul(&vec![1.0; n], &mut ac);
        let restricted = restrict_field(&af, &agg, n);
        for (x, y) in ac.iter().zip(&restricted) {
            assert!((x - y).abs() < TOL);
        }
        assert!(c.symmetric());
    }

    #[test]
    fn test_hierarchy_reaches_coarsest_size() {
        let a = poisson_2d(16, 16);
        let solver = GamgSolver::new(SolverControls::gamg(1e-6, 0.0).with_coarsest_level(10));
        let levels = solver.hierarchy(&a);
        assert!(levels.len() >= 3);
        assert!(levels.last().unwrap().n_cells() <= 20);
        for w in levels.windows(2) {
            assert!(w[1].n_cells() < w[0].n_cells());
        }
    }

    #[test]
    fn test_gamg_converges_symmetric_and_asymmetric() {
        let comm = SerialComm;
        let a = poisson_2d(12, 12);
        let system = LduSystem::new(&a, &[], &comm);
        let b: Vec<f64> = (0..144).map(|i| ((i * 13) % 7) as f64 - 3.0).collect();
        let mut x = vec![0.0; 144];
        let perf = GamgSolver::new(SolverControls::gamg(1e-10, 0.0).with_max_iter(200))
            .solve(&system, &mut x, &b, "p")
            .unwrap();
        assert!(perf.converged, "{perf}");
        assert!(perf.n_iterations < 100);

        let c = convection_1d(40, 2.0);
        let system = LduSystem::new(&c, &[], &comm);
        let mut y = vec![0.0; 40];
        let perf = GamgSolver::new(SolverControls::gamg(1e-10, 0.0).with_max_iter(500))
            .solve(&system, &mut y, &vec![1.0; 40], "T")
            .unwrap();
        assert!(perf.converged, "{perf}");
    }

    #[test]
    fn test_coarsest_solve_handles_singular_neumann_matrix() {
        // pure Neumann chain: rows sum to zero
        let mut a = poisson_1d(4);
        a.diag_mut().copy_from_slice(&[1.0, 2.0, 2.0, 1.0]);
        let b = [1.0, 0.0, 0.0, -1.0];
        let x = coarsest_solve(&a, &b);
        assert!(x.iter().all(|v| v.is_finite()));
        let mut ax = vec![0.0; 4];
        a.amul(&x, &mut ax);
        for (p, q) in ax.iter().zip(&b) {
            assert!((p - q).abs() < 1e-10);
        }
    }
}
