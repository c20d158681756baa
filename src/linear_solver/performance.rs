//! Residual report of one solve.

use std::fmt;

use crate::types::VSMALL;

/// Outcome of solving one component (or the worst of several).
#[derive(Clone, Debug, PartialEq)]
pub struct SolverPerformance {
    pub solver_name: String,
    pub field_name: String,
    /// Normalised residual before the first iteration
    pub initial_residual: f64,
    /// Normalised residual after the last iteration
    pub final_residual: f64,
    pub n_iterations: usize,
    pub converged: bool,
    /// The solver hit a zero search direction or pivot
    pub singular: bool,
}

impl SolverPerformance {
    pub fn new(solver_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            solver_name: solver_name.into(),
            field_name: field_name.into(),
            initial_residual: 0.0,
            final_residual: 0.0,
            n_iterations: 0,
            converged: false,
            singular: false,
        }
    }

    /// Update and return `converged`:
    /// `final < tolerance`, or `final < rel_tol × initial` when `rel_tol > 0`.
    pub fn check_convergence(&mut self, tolerance: f64, rel_tol: f64) -> bool {
        self.converged = self.final_residual < tolerance
            || (rel_tol > 0.0 && self.final_residual < rel_tol * self.initial_residual);
        self.converged
    }

    /// Record a near-zero denominator; returns `singular`.
    pub fn check_singularity(&mut self, magnitude: f64) -> bool {
        self.singular = magnitude < VSMALL;
        self.singular
    }

    /// Worst of two reports: larger residuals, more iterations, converged only if both are.
    pub fn max(self, other: SolverPerformance) -> SolverPerformance {
        SolverPerformance {
            solver_name: self.solver_name,
            field_name: self.field_name,
            initial_residual: self.initial_residual.max(other.initial_residual),
            final_residual: self.final_residual.max(other.final_residual),
            n_iterations: self.n_iterations.max(other.n_iterations),
            converged: self.converged && other.converged,
            singular: self.singular || other.singular,
        }
    }

    /// Log the classic one-line report at `info`, and at `warn` when not converged.
    pub fn log(&self) {
        if self.converged || self.n_iterations == 0 {
            log::info!("{self}");
        } else {
            log::warn!("{self} (not converged)");
        }
    }
}

impl fmt::Display for SolverPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:  Solving for {}, Initial residual = {:e}, Final residual = {:e}, No Iterations {}",
            self.solver_name,
            self.field_name,
            self.initial_residual,
            self.final_residual,
            self.n_iterations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convergence_criteria() {
        let mut p = SolverPerformance::new("PCG", "p");
        p.initial_residual = 1.0;
        p.final_residual = 0.05;
        assert!(!p.check_convergence(1e-6, 0.0));
        assert!(p.check_convergence(1e-6, 0.1));
        assert!(p.check_convergence(0.1, 0.0));
    }

    #[test]
    fn test_max_merges_components() {
        let mut a = SolverPerformance::new("smoothSolver", "Ux");
        a.initial_residual = 1.0;
        a.final_residual = 1e-7;
        a.n_iterations = 3;
        a.converged = true;
        let mut b = SolverPerformance::new("smoothSolver", "Uy");
        b.initial_residual = 0.5;
        b.final_residual = 1e-5;
        b.n_iterations = 7;
        let m = a.max(b);
        assert_eq!(m.field_name, "Ux");
        assert_eq!(m.initial_residual, 1.0);
        assert_eq!(m.final_residual, 1e-5);
        assert_eq!(m.n_iterations, 7);
        assert!(!m.converged);
    }

    #[test]
    fn test_display_format() {
        let mut p = SolverPerformance::new("PCG", "p");
        p.initial_residual = 1.0;
        p.final_residual = 1e-7;
        p.n_iterations = 12;
        assert_eq!(
            p.to_string(),
            "PCG:  Solving for p, Initial residual = 1e0, Final residual = 1e-7, No Iterations 12"
        );
    }
}
