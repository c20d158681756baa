//! Time loop, solution algorithm control and stability diagnostics.
//!
//! - [`Time`]: current time, step sizes, write schedule and Courant-based `Δt`
//! - [`courant_number`]: mean and maximum Courant number of a face flux
//! - [`SimpleControl`] / [`PimpleControl`]: steady and transient
//!   pressure-velocity coupling loops with residual control
//! - [`StabilityMonitor`]: warnings for unconverged solves, large Courant
//!   numbers and non-finite values

pub(crate) mod courant;
mod solution;
mod stability;
mod time;

pub use courant::{CourantReport, courant_number};
pub use solution::{
    LoopState, OuterResidualControl, PimpleControl, SimpleControl, SolutionControls,
};
pub use stability::{StabilityMonitor, StabilityStatus, StabilityThresholds, StabilityWarning};
pub use time::{Time, TimeControls};
