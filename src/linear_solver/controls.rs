//! Linear solver settings.

use serde::{Deserialize, Serialize};

/// What to do when an assembled matrix is not diagonally dominant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DominanceCheck {
    /// No check
    #[default]
    Off,
    /// Log a warning and solve anyway
    Warn,
    /// Refuse to solve
    Error,
}

/// Settings for one solved field.
///
/// Deserializes from any serde format; missing keys take the defaults of
/// [`SolverControls::default`] (PCG with DIC, absolute tolerance `1e-6`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverControls {
    /// Solver name (`PCG`, `PBiCGStab`, `smoothSolver`, `GAMG`, `diagonal`)
    pub solver: String,
    /// Preconditioner for the Krylov solvers
    pub preconditioner: String,
    /// Smoother for `smoothSolver` and `GAMG`
    pub smoother: String,
    /// Absolute tolerance on the normalised residual
    pub tolerance: f64,
    /// Tolerance relative to the initial residual (0 disables)
    pub rel_tol: f64,
    pub max_iter: usize,
    pub min_iter: usize,
    /// Sweeps per `smoothSolver` iteration
    pub n_sweeps: usize,
    /// GAMG smoothing sweeps before restriction
    pub n_pre_sweeps: usize,
    /// GAMG smoothing sweeps after prolongation
    pub n_post_sweeps: usize,
    /// GAMG stops coarsening at this size
    pub n_cells_in_coarsest_level: usize,
    pub dominance_check: DominanceCheck,
    /// Allowed relative excess of `Σ|off-diagonal|` over `|diag|`
    pub dominance_tolerance: f64,
}

impl Default for SolverControls {
    fn default() -> Self {
        Self {
            solver: "PCG".to_string(),
            preconditioner: "DIC".to_string(),
            smoother: "GaussSeidel".to_string(),
            tolerance: 1e-6,
            rel_tol: 0.0,
            max_iter: 1000,
            min_iter: 0,
            n_sweeps: 1,
            n_pre_sweeps: 0,
            n_post_sweeps: 2,
            n_cells_in_coarsest_level: 10,
            dominance_check: DominanceCheck::Off,
            dominance_tolerance: 1e-6,
        }
    }
}

impl SolverControls {
    /// Conjugate gradients with DIC preconditioning.
    pub fn pcg(tolerance: f64, rel_tol: f64) -> Self {
        Self {
            tolerance,
            rel_tol,
            ..Self::default()
        }
    }

    /// Stabilised bi-conjugate gradients with DILU preconditioning.
    pub fn pbicgstab(tolerance: f64, rel_tol: f64) -> Self {
        Self {
            solver: "PBiCGStab".to_string(),
            preconditioner: "DILU".to_string(),
            tolerance,
            rel_tol,
            ..Self::default()
        }
    }

    /// Repeated smoothing sweeps.
    pub fn smooth_solver(smoother: &str, tolerance: f64, rel_tol: f64) -> Self {
        Self {
            solver: "smoothSolver".to_string(),
            smoother: smoother.to_string(),
            tolerance,
            rel_tol,
            ..Self::default()
        }
    }

    /// Geometric-agglomerated algebraic multigrid with Gauss-Seidel smoothing.
    pub fn gamg(tolerance: f64, rel_tol: f64) -> Self {
        Self {
            solver: "GAMG".to_string(),
            tolerance,
            rel_tol,
            ..Self::default()
        }
    }

    /// Diagonal-only solve.
    pub fn diagonal() -> Self {
        Self {
            solver: "diagonal".to_string(),
            ..Self::default()
        }
    }

    pub fn with_solver(mut self, solver: &str) -> Self {
        self.solver = solver.to_string();
        self
    }

    pub fn with_preconditioner(mut self, preconditioner: &str) -> Self {
        self.preconditioner = preconditioner.to_string();
        self
    }

    pub fn with_smoother(mut self, smoother: &str) -> Self {
        self.smoother = smoother.to_string();
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64, rel_tol: f64) -> Self {
        self.tolerance = tolerance;
        self.rel_tol = rel_tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_min_iter(mut self, min_iter: usize) -> Self {
        self.min_iter = min_iter;
        self
    }

    pub fn with_n_sweeps(mut self, n_sweeps: usize) -> Self {
        self.n_sweeps = n_sweeps.max(1);
        self
    }

    pub fn with_coarsest_level(mut self, n_cells: usize) -> Self {
        self.n_cells_in_coarsest_level = n_cells.max(1);
        self
    }

    pub fn with_dominance_check(mut self, check: DominanceCheck, tolerance: f64) -> Self {
        self.dominance_check = check;
        self.dominance_tolerance = tolerance;
        self
    }

    /// Copy with the relative tolerance switched off, used on final iterations.
    pub fn final_iteration(&self) -> Self {
        Self {
            rel_tol: 0.0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let p = SolverControls::pcg(1e-8, 0.01);
        assert_eq!(p.solver, "PCG");
        assert_eq!(p.preconditioner, "DIC");
        assert_eq!(SolverControls::pbicgstab(1e-8, 0.0).preconditioner, "DILU");
        assert_eq!(SolverControls::gamg(1e-8, 0.0).smoother, "GaussSeidel");
        assert_eq!(p.final_iteration().rel_tol, 0.0);
    }

    #[test]
    fn test_json_round_trip_with_defaults() {
        let json = r#"{"solver": "smoothSolver", "smoother": "symGaussSeidel",
                       "tolerance": 1e-7, "dominance_check": "warn"}"#;
        let c: SolverControls = serde_json::from_str(json).unwrap();
        assert_eq!(c.solver, "smoothSolver");
        assert_eq!(c.dominance_check, DominanceCheck::Warn);
        assert_eq!(c.max_iter, 1000);

        let text = serde_json::to_string(&c).unwrap();
        let back: SolverControls = serde_json::from_str(&text).unwrap();
        assert_eq!(back, c);
    }
}
