//! SIMPLE and PIMPLE solution loops.
//!
//! Both controls drive the same nested loops:
//!
//! ```text
//! while control.run_loop(&mut time) {          // time step (or SIMPLE iteration)
//!     while control.outer_loop() {             // pressure-velocity coupling
//!         // momentum predictor ...
//!         while control.correct() {            // pressure correctors
//!             while control.correct_non_orthogonal() {
//!                 // assemble and solve the pressure equation
//!                 control.record(&performance);
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! Non-convergence never aborts or retries a step; the loop moves on and
//! relies on relaxation and time-step control.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Time;
use crate::linear_solver::{SolverControls, SolverPerformance};

/// Where a solution loop currently is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopState {
    /// Before the first outer iteration of a step
    #[default]
    Initialize,
    /// Inside an outer (momentum/pressure coupling) iteration
    OuterIterate,
    /// Inside a pressure corrector
    InnerCorrect,
    /// The step's outer loop is done; time may advance
    Converged,
    /// End time reached or residual control satisfied
    Finished,
}

/// Per-field exit criterion of the PIMPLE outer loop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OuterResidualControl {
    /// Absolute limit on the initial residual of an outer iteration
    pub tolerance: f64,
    /// Limit relative to the initial residual of the first outer iteration
    pub rel_tol: f64,
}

impl Default for OuterResidualControl {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            rel_tol: 0.0,
        }
    }
}

/// Loop counts and convergence criteria.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolutionControls {
    pub n_outer_correctors: usize,
    /// Pressure correctors per outer iteration
    pub n_correctors: usize,
    /// Extra passes of each pressure corrector for non-orthogonal correction
    pub n_non_orth_correctors: usize,
    pub momentum_predictor: bool,
    /// SIMPLE: stop once every listed field starts an iteration below its tolerance
    pub residual_control: BTreeMap<String, f64>,
    /// PIMPLE: leave the outer loop early once every listed field meets its criterion
    pub outer_residual_control: BTreeMap<String, OuterResidualControl>,
    pub p_ref_cell: usize,
    pub p_ref_value: f64,
}

impl Default for SolutionControls {
    fn default() -> Self {
        Self {
            n_outer_correctors: 1,
            n_correctors: 1,
            n_non_orth_correctors: 0,
            momentum_predictor: true,
            residual_control: BTreeMap::new(),
            outer_residual_control: BTreeMap::new(),
            p_ref_cell: 0,
            p_ref_value: 0.0,
        }
    }
}

impl SolutionControls {
    /// One outer iteration with one pressure corrector.
    pub fn simple() -> Self {
        Self::default()
    }

    pub fn pimple(n_outer_correctors: usize, n_correctors: usize) -> Self {
        Self {
            n_outer_correctors: n_outer_correctors.max(1),
            n_correctors,
            ..Self::default()
        }
    }

    pub fn with_non_orthogonal_correctors(mut self, n: usize) -> Self {
        self.n_non_orth_correctors = n;
        self
    }

    pub fn with_residual_control(mut self, field: &str, tolerance: f64) -> Self {
        self.residual_control.insert(field.to_string(), tolerance);
        self
    }

    pub fn with_outer_residual_control(mut self, field: &str, tolerance: f64, rel_tol: f64) -> Self {
        self.outer_residual_control
            .insert(field.to_string(), OuterResidualControl { tolerance, rel_tol });
        self
    }
}

// =============================================================================
// Shared counters
// =============================================================================

/// Corrector counters and recorded residuals of the current step.
#[derive(Clone, Debug, Default)]
struct Counters {
    state: LoopState,
    outer: usize,
    inner: usize,
    non_orth: usize,
    /// Initial residual of the first solve of each field in the current outer iteration
    current: BTreeMap<String, f64>,
    /// Same for the first outer iteration of the step
    first: BTreeMap<String, f64>,
}

impl Counters {
    fn start_step(&mut self) {
        self.state = LoopState::Initialize;
        self.outer = 0;
        self.inner = 0;
        self.non_orth = 0;
        self.current.clear();
        self.first.clear();
    }

    fn start_outer(&mut self) {
        self.outer += 1;
        self.inner = 0;
        self.non_orth = 0;
        self.current.clear();
        self.state = LoopState::OuterIterate;
    }

    fn correct(&mut self, n_correctors: usize) -> bool {
        if self.inner >= n_correctors {
            self.inner = 0;
            self.state = LoopState::OuterIterate;
            return false;
        }
        self.inner += 1;
        self.non_orth = 0;
        self.state = LoopState::InnerCorrect;
        true
    }

    fn correct_non_orthogonal(&mut self, n_non_orth: usize) -> bool {
        if self.non_orth > n_non_orth {
            self.non_orth = 0;
            return false;
        }
        self.non_orth += 1;
        true
    }

    fn record(&mut self, performance: &SolverPerformance) {
        let name = &performance.field_name;
        let initial = performance.initial_residual;
        self.current.entry(name.clone()).or_insert(initial);
        if self.outer <= 1 {
            self.first.entry(name.clone()).or_insert(initial);
        }
    }
}

// =============================================================================
// PIMPLE
// =============================================================================

/// Transient pressure-velocity coupling with outer (PIMPLE) iterations.
///
/// The outer loop runs `n_outer_correctors` times per step, or fewer when
/// every field listed in `outer_residual_control` meets its criterion.
#[derive(Clone, Debug)]
pub struct PimpleControl {
    controls: SolutionControls,
    counters: Counters,
}

impl PimpleControl {
    pub fn new(controls: SolutionControls) -> Self {
        Self {
            controls,
            counters: Counters::default(),
        }
    }

    pub fn controls(&self) -> &SolutionControls {
        &self.controls
    }

    pub fn state(&self) -> LoopState {
        self.counters.state
    }

    /// 1-based outer iteration of the current step.
    pub fn outer_iteration(&self) -> usize {
        self.counters.outer
    }

    /// 1-based pressure corrector of the current outer iteration.
    pub fn corrector(&self) -> usize {
        self.counters.inner
    }

    pub fn momentum_predictor(&self) -> bool {
        self.controls.momentum_predictor
    }

    /// Advance to the next time step; false once the end time is reached.
    pub fn run_loop(&mut self, time: &mut Time) -> bool {
        if !time.running() {
            self.counters.state = LoopState::Finished;
            log::info!("End");
            return false;
        }
        time.advance();
        self.counters.start_step();
        true
    }

    /// Start the next outer iteration of this step.
    pub fn outer_loop(&mut self) -> bool {
        let n_outer = self.controls.n_outer_correctors.max(1);
        if self.counters.outer >= 1 && self.criteria_satisfied() {
            log::info!("PIMPLE: converged in {} iterations", self.counters.outer);
            self.counters.state = LoopState::Converged;
            return false;
        }
        if self.counters.outer >= n_outer {
            if n_outer > 1 && !self.controls.outer_residual_control.is_empty() {
                log::info!("PIMPLE: not converged within {n_outer} iterations");
            }
            self.counters.state = LoopState::Converged;
            return false;
        }
        self.counters.start_outer();
        if n_outer > 1 {
            log::info!("PIMPLE: iteration {}", self.counters.outer);
        }
        true
    }

    /// Next pressure corrector of this outer iteration.
    pub fn correct(&mut self) -> bool {
        self.counters.correct(self.controls.n_correctors)
    }

    /// Next non-orthogonal pass; `n_non_orth_correctors + 1` passes in total.
    pub fn correct_non_orthogonal(&mut self) -> bool {
        self.counters.correct_non_orthogonal(self.controls.n_non_orth_correctors)
    }

    pub fn final_iter(&self) -> bool {
        self.counters.outer >= self.controls.n_outer_correctors.max(1)
    }

    pub fn final_non_orthogonal_iter(&self) -> bool {
        self.counters.non_orth == self.controls.n_non_orth_correctors + 1
    }

    /// Last non-orthogonal pass of the last corrector of the last outer iteration.
    pub fn final_inner_iter(&self) -> bool {
        self.final_iter()
            && self.counters.inner == self.controls.n_correctors
            && self.final_non_orthogonal_iter()
    }

    /// Solver settings for the next solve: relative tolerance off on the
    /// final inner iteration.
    pub fn solver_controls(&self, base: &SolverControls) -> SolverControls {
        if self.final_inner_iter() {
            base.final_iteration()
        } else {
            base.clone()
        }
    }

    /// Remember the initial residual of a solve for residual control.
    pub fn record(&mut self, performance: &SolverPerformance) {
        self.counters.record(performance);
    }

    fn criteria_satisfied(&self) -> bool {
        let mut checked = false;
        for (field, criterion) in &self.controls.outer_residual_control {
            let Some(&residual) = self.counters.current.get(field) else {
                continue;
            };
            checked = true;
            let absolute = residual < criterion.tolerance;
            let relative = criterion.rel_tol > 0.0
                && self
                    .counters
                    .first
                    .get(field)
                    .is_some_and(|&first| first > 0.0 && residual / first < criterion.rel_tol);
            log::debug!("PIMPLE: {field} residual {residual:e}, converged {}", absolute || relative);
            if !(absolute || relative) {
                return false;
            }
        }
        checked
    }
}

// =============================================================================
// SIMPLE
// =============================================================================

/// Steady pressure-velocity coupling: one outer iteration per pseudo-time
/// step, stopping early once `residual_control` is satisfied.
#[derive(Clone, Debug)]
pub struct SimpleControl {
    controls: SolutionControls,
    counters: Counters,
    converged: bool,
}

impl SimpleControl {
    pub fn new(controls: SolutionControls) -> Self {
        Self {
            controls,
            counters: Counters::default(),
            converged: false,
        }
    }

    pub fn controls(&self) -> &SolutionControls {
        &self.controls
    }

    pub fn state(&self) -> LoopState {
        self.counters.state
    }

    /// Whether the run stopped on residual control.
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn momentum_predictor(&self) -> bool {
        self.controls.momentum_predictor
    }

    /// Next iteration; false once converged or at the end time.
    pub fn run_loop(&mut self, time: &mut Time) -> bool {
        if self.counters.outer >= 1 && self.criteria_satisfied() {
            self.converged = true;
            self.counters.state = LoopState::Finished;
            log::info!("SIMPLE solution converged in {} iterations", time.time_index());
            return false;
        }
        if !time.running() {
            self.counters.state = LoopState::Finished;
            log::info!("End");
            return false;
        }
        time.advance();
        self.counters.start_step();
        true
    }

    /// True exactly once per iteration.
    pub fn outer_loop(&mut self) -> bool {
        if self.counters.outer >= 1 {
            self.counters.state = LoopState::Converged;
            return false;
        }
        self.counters.start_outer();
        true
    }

    pub fn correct(&mut self) -> bool {
        self.counters.correct(self.controls.n_correctors)
    }

    pub fn correct_non_orthogonal(&mut self) -> bool {
        self.counters.correct_non_orthogonal(self.controls.n_non_orth_correctors)
    }

    /// SIMPLE iterations always keep their relative tolerances.
    pub fn final_iter(&self) -> bool {
        false
    }

    pub fn final_non_orthogonal_iter(&self) -> bool {
        self.counters.non_orth == self.controls.n_non_orth_correctors + 1
    }

    pub fn final_inner_iter(&self) -> bool {
        false
    }

    pub fn record(&mut self, performance: &SolverPerformance) {
        self.counters.record(performance);
    }

    fn criteria_satisfied(&self) -> bool {
        let mut checked = false;
        for (field, &tolerance) in &self.controls.residual_control {
            if let Some(&residual) = self.counters.current.get(field) {
                checked = true;
                if residual >= tolerance {
                    return false;
                }
            }
        }
        checked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::TimeControls;

    fn performance(field: &str, initial: f64) -> SolverPerformance {
        let mut p = SolverPerformance::new("PCG", field);
        p.initial_residual = initial;
        p.final_residual = initial * 1e-3;
        p.n_iterations = 5;
        p.converged = true;
        p
    }

    #[test]
    fn test_pimple_loop_counts() {
        let controls = SolutionControls::pimple(3, 2).with_non_orthogonal_correctors(1);
        let mut pimple = PimpleControl::new(controls);
        let mut time = Time::new(TimeControls::new(0.0, 0.3, 0.1)).unwrap();
        let mut steps = 0;
        let mut outers = 0;
        let mut solves = 0;
        let mut final_inner = 0;
        while pimple.run_loop(&mut time) {
            steps += 1;
            assert_eq!(pimple.state(), LoopState::Initialize);
            while pimple.outer_loop() {
                outers += 1;
                while pimple.correct() {
                    assert_eq!(pimple.state(), LoopState::InnerCorrect);
                    while pimple.correct_non_orthogonal() {
                        solves += 1;
                        if pimple.final_inner_iter() {
                            final_inner += 1;
                        }
                    }
                }
            }
            assert_eq!(pimple.state(), LoopState::Converged);
        }
        assert_eq!(pimple.state(), LoopState::Finished);
        assert_eq!(steps, 3);
        assert_eq!(outers, 9);
        assert_eq!(solves, 9 * 2 * 2);
        assert_eq!(final_inner, 3);
    }

    #[test]
    fn test_pimple_absolute_outer_residual_control() {
        let controls = SolutionControls::pimple(10, 1).with_outer_residual_control("p", 1e-3, 0.0);
        let mut pimple = PimpleControl::new(controls);
        let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();
        assert!(pimple.run_loop(&mut time));
        let residuals = [1.0, 1e-2, 1e-4, 1e-5];
        let mut outers = 0;
        while pimple.outer_loop() {
            while pimple.correct() {
                while pimple.correct_non_orthogonal() {
                    pimple.record(&performance("p", residuals[outers]));
                    // Later solves in the same iteration do not replace the first residual.
                    pimple.record(&performance("p", 10.0));
                }
            }
            outers += 1;
        }
        assert_eq!(outers, 3);
        assert!(!pimple.final_iter());
    }

    #[test]
    fn test_pimple_relative_outer_residual_control() {
        let controls = SolutionControls::pimple(10, 1).with_outer_residual_control("U", 0.0, 0.05);
        let mut pimple = PimpleControl::new(controls);
        let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();
        let mut counts = Vec::new();
        while pimple.run_loop(&mut time) && counts.len() < 2 {
            let residuals = [2.0, 0.2, 0.08, 0.01];
            let mut outers = 0;
            while pimple.outer_loop() {
                pimple.record(&performance("U", residuals[outers]));
                outers += 1;
            }
            counts.push(outers);
        }
        // 0.08 / 2 < 0.05 on the third iteration of every step.
        assert_eq!(counts, vec![3, 3]);
    }

    #[test]
    fn test_final_iteration_solver_controls() {
        let mut pimple = PimpleControl::new(SolutionControls::pimple(2, 1));
        let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();
        let base = SolverControls::pcg(1e-6, 0.05);
        assert!(pimple.run_loop(&mut time));
        let mut rel_tols = Vec::new();
        while pimple.outer_loop() {
            while pimple.correct() {
                while pimple.correct_non_orthogonal() {
                    rel_tols.push(pimple.solver_controls(&base).rel_tol);
                }
            }
        }
        assert_eq!(rel_tols, vec![0.05, 0.0]);
    }

    #[test]
    fn test_simple_residual_control() {
        let controls = SolutionControls::simple().with_residual_control("p", 1e-3);
        let mut simple = SimpleControl::new(controls);
        let mut time = Time::new(TimeControls::steady(100)).unwrap();
        let residuals = [0.5, 0.05, 0.005, 0.0005, 0.00005];
        let mut iterations = 0;
        while simple.run_loop(&mut time) {
            let mut outers = 0;
            while simple.outer_loop() {
                outers += 1;
                while simple.correct() {
                    while simple.correct_non_orthogonal() {
                        simple.record(&performance("p", residuals[iterations]));
                    }
                }
            }
            assert_eq!(outers, 1);
            iterations += 1;
        }
        assert!(simple.converged());
        assert_eq!(simple.state(), LoopState::Finished);
        assert_eq!(iterations, 4);
        assert_eq!(time.time_index(), 4);
    }

    #[test]
    fn test_simple_runs_to_end_without_residual_control() {
        let mut simple = SimpleControl::new(SolutionControls::simple());
        let mut time = Time::new(TimeControls::steady(5)).unwrap();
        let mut iterations = 0;
        while simple.run_loop(&mut time) {
            while simple.outer_loop() {
                simple.record(&performance("p", 1e-12));
            }
            iterations += 1;
        }
        assert_eq!(iterations, 5);
        assert!(!simple.converged());
        assert!(!simple.final_iter());
    }

    #[test]
    fn test_controls_from_json() {
        let json = r#"{"n_outer_correctors": 2, "n_non_orth_correctors": 1,
                       "outer_residual_control": {"p": {"tolerance": 1e-4}}}"#;
        let controls: SolutionControls = serde_json::from_str(json).unwrap();
        assert_eq!(controls.n_correctors, 1);
        assert_eq!(controls.outer_residual_control["p"].rel_tol, 0.0);
        assert!(controls.momentum_predictor);
    }
}
