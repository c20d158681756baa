//! Run-time stability diagnostics.
//!
//! Numerical trouble is reported, never raised as an error: the monitor
//! collects warnings over a step and recommends stopping only after a run of
//! consecutive bad steps or a non-finite value.
//!
//! ```ignore
//! let mut monitor = StabilityMonitor::new(StabilityThresholds::default());
//! while pimple.run_loop(&mut time) {
//!     // ... solve, monitor.check_performance(&perf) ...
//!     monitor.check_courant(&courant_number(&mesh, &phi, time.delta_t())?);
//!     let status = monitor.end_step();
//!     if monitor.should_stop() {
//!         break;
//!     }
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CourantReport;
use crate::field::GeometricField;
use crate::linear_solver::SolverPerformance;
use crate::types::FieldValue;

/// Limits applied by [`StabilityMonitor`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityThresholds {
    /// Largest acceptable maximum Courant number
    pub max_courant: f64,
    /// Largest acceptable final residual of a non-converged solve
    pub max_final_residual: f64,
    /// Consecutive warning steps before recommending a stop
    pub max_consecutive_warnings: usize,
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            max_courant: 1.0,
            max_final_residual: 0.0,
            max_consecutive_warnings: 10,
        }
    }
}

impl StabilityThresholds {
    /// Flag Courant numbers above 0.5 and every unconverged solve,
    /// stop after three bad steps.
    pub fn strict() -> Self {
        Self {
            max_courant: 0.5,
            max_final_residual: 0.0,
            max_consecutive_warnings: 3,
        }
    }

    /// Only catch runaway behaviour.
    pub fn relaxed() -> Self {
        Self {
            max_courant: 10.0,
            max_final_residual: 1e-2,
            max_consecutive_warnings: 100,
        }
    }

    pub fn with_max_courant(mut self, max_courant: f64) -> Self {
        self.max_courant = max_courant;
        self
    }

    pub fn with_max_consecutive_warnings(mut self, n: usize) -> Self {
        self.max_consecutive_warnings = n;
        self
    }
}

/// One detected problem.
#[derive(Clone, Debug, PartialEq)]
pub enum StabilityWarning {
    /// A linear solve stopped above its tolerance.
    SolverNotConverged {
        field: String,
        final_residual: f64,
        iterations: usize,
    },
    /// Maximum Courant number above the threshold.
    CourantExceeded { value: f64, threshold: f64 },
    /// NaN or infinity in a field.
    NonFinite { field: String, cell: usize },
}

impl StabilityWarning {
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::NonFinite { .. })
    }
}

impl fmt::Display for StabilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SolverNotConverged {
                field,
                final_residual,
                iterations,
            } => write!(
                f,
                "Solution of {field} not converged: final residual {final_residual:e} after {iterations} iterations"
            ),
            Self::CourantExceeded { value, threshold } => {
                write!(f, "Courant number {value:.3} exceeds {threshold:.3}")
            }
            Self::NonFinite { field, cell } => write!(f, "Non-finite value of {field} in cell {cell}"),
        }
    }
}

/// Warnings of one completed step.
#[derive(Clone, Debug, Default)]
pub struct StabilityStatus {
    pub is_stable: bool,
    pub warnings: Vec<StabilityWarning>,
}

impl StabilityStatus {
    pub fn has_critical_warnings(&self) -> bool {
        self.warnings.iter().any(StabilityWarning::is_critical)
    }
}

/// Collects warnings over a step and tracks runs of bad steps.
#[derive(Clone, Debug)]
pub struct StabilityMonitor {
    thresholds: StabilityThresholds,
    pending: Vec<StabilityWarning>,
    consecutive_warnings: usize,
    total_steps: usize,
    total_warnings: usize,
    last_status: Option<StabilityStatus>,
}

impl StabilityMonitor {
    pub fn new(thresholds: StabilityThresholds) -> Self {
        Self {
            thresholds,
            pending: Vec::new(),
            consecutive_warnings: 0,
            total_steps: 0,
            total_warnings: 0,
            last_status: None,
        }
    }

    pub fn thresholds(&self) -> &StabilityThresholds {
        &self.thresholds
    }

    pub fn consecutive_warnings(&self) -> usize {
        self.consecutive_warnings
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn total_warnings(&self) -> usize {
        self.total_warnings
    }

    pub fn last_status(&self) -> Option<&StabilityStatus> {
        self.last_status.as_ref()
    }

    pub fn check_performance(&mut self, performance: &SolverPerformance) {
        if performance.converged || performance.n_iterations == 0 {
            return;
        }
        if performance.final_residual <= self.thresholds.max_final_residual {
            return;
        }
        self.push(StabilityWarning::SolverNotConverged {
            field: performance.field_name.clone(),
            final_residual: performance.final_residual,
            iterations: performance.n_iterations,
        });
    }

    pub fn check_courant(&mut self, courant: &CourantReport) {
        if !courant.max.is_finite() {
            self.push(StabilityWarning::NonFinite {
                field: "Co".to_string(),
                cell: 0,
            });
        } else if courant.max > self.thresholds.max_courant {
            self.push(StabilityWarning::CourantExceeded {
                value: courant.max,
                threshold: self.thresholds.max_courant,
            });
        }
    }

    /// Report the first non-finite cell value of `field`, if any.
    pub fn check_field<T: FieldValue>(&mut self, field: &GeometricField<T>) {
        let bad = field
            .internal()
            .iter()
            .position(|v| (0..T::N_COMPONENTS).any(|c| !v.component(c).is_finite()));
        if let Some(cell) = bad {
            self.push(StabilityWarning::NonFinite {
                field: field.name().to_string(),
                cell,
            });
        }
    }

    fn push(&mut self, warning: StabilityWarning) {
        log::warn!("{warning}");
        self.pending.push(warning);
    }

    /// Close the current step and return its status.
    pub fn end_step(&mut self) -> StabilityStatus {
        self.total_steps += 1;
        let warnings = std::mem::take(&mut self.pending);
        let is_stable = warnings.is_empty();
        if is_stable {
            self.consecutive_warnings = 0;
        } else {
            self.consecutive_warnings += 1;
            self.total_warnings += warnings.len();
        }
        let status = StabilityStatus { is_stable, warnings };
        self.last_status = Some(status.clone());
        status
    }

    /// Whether the warning history suggests stopping the run.
    pub fn should_stop(&self) -> bool {
        self.consecutive_warnings >= self.thresholds.max_consecutive_warnings
            || self
                .last_status
                .as_ref()
                .is_some_and(StabilityStatus::has_critical_warnings)
    }
}
