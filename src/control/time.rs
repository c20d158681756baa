//! Run time and time-step control.

use serde::{Deserialize, Serialize};

use crate::error::{FvError, Result};
use crate::types::{GREAT, SMALL};

/// Largest growth of `Δt` in one adjustment.
const MAX_DELTA_T_GROWTH: f64 = 1.2;

/// Time loop settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeControls {
    pub start_time: f64,
    pub end_time: f64,
    pub delta_t: f64,
    /// Simulated time between writes
    pub write_interval: f64,
    /// Adjust `Δt` from the Courant number
    pub adjust_time_step: bool,
    pub max_co: f64,
    pub max_delta_t: f64,
}

impl Default for TimeControls {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: 1.0,
            delta_t: 1e-3,
            write_interval: 0.1,
            adjust_time_step: false,
            max_co: 1.0,
            max_delta_t: GREAT,
        }
    }
}

impl TimeControls {
    pub fn new(start_time: f64, end_time: f64, delta_t: f64) -> Self {
        Self {
            start_time,
            end_time,
            delta_t,
            ..Self::default()
        }
    }

    /// Steady iteration counter: unit steps from 0 to `n_iterations`.
    pub fn steady(n_iterations: usize) -> Self {
        Self {
            end_time: n_iterations as f64,
            delta_t: 1.0,
            write_interval: n_iterations as f64,
            ..Self::default()
        }
    }

    pub fn with_write_interval(mut self, interval: f64) -> Self {
        self.write_interval = interval;
        self
    }

    pub fn with_adjustable_time_step(mut self, max_co: f64, max_delta_t: f64) -> Self {
        self.adjust_time_step = true;
        self.max_co = max_co;
        self.max_delta_t = max_delta_t;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.delta_t > 0.0) {
            return Err(FvError::InvalidConfig(format!(
                "deltaT must be positive, got {}",
                self.delta_t
            )));
        }
        if self.end_time < self.start_time {
            return Err(FvError::InvalidConfig(format!(
                "endTime {} is before startTime {}",
                self.end_time, self.start_time
            )));
        }
        if self.adjust_time_step && !(self.max_co > 0.0) {
            return Err(FvError::InvalidConfig(format!(
                "maxCo must be positive, got {}",
                self.max_co
            )));
        }
        Ok(())
    }
}

/// Current simulated time, step index and step sizes.
///
/// `delta_t0` is the size of the step before the current one, as needed by
/// second-order time schemes.
#[derive(Clone, Debug)]
pub struct Time {
    controls: TimeControls,
    value: f64,
    index: usize,
    delta_t: f64,
    delta_t0: f64,
    delta_t_save: f64,
    write_index: u64,
    write_time: bool,
}

impl Time {
    pub fn new(controls: TimeControls) -> Result<Self> {
        controls.validate()?;
        Ok(Self {
            value: controls.start_time,
            index: 0,
            delta_t: controls.delta_t,
            delta_t0: controls.delta_t,
            delta_t_save: controls.delta_t,
            write_index: 0,
            write_time: false,
            controls,
        })
    }

    pub fn controls(&self) -> &TimeControls {
        &self.controls
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Number of completed `advance` calls.
    pub fn time_index(&self) -> usize {
        self.index
    }

    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    pub fn delta_t0(&self) -> f64 {
        self.delta_t0
    }

    pub fn end_time(&self) -> f64 {
        self.controls.end_time
    }

    /// Change the size of the next step.
    pub fn set_delta_t(&mut self, delta_t: f64) -> Result<()> {
        if !(delta_t > 0.0) || !delta_t.is_finite() {
            return Err(FvError::InvalidConfig(format!(
                "deltaT must be positive and finite, got {delta_t}"
            )));
        }
        self.delta_t = delta_t;
        Ok(())
    }

    /// Whether another step fits before the end time.
    pub fn running(&self) -> bool {
        self.value < self.controls.end_time - 0.5 * self.delta_t
    }

    /// Move to the next time level.
    pub fn advance(&mut self) {
        self.delta_t0 = self.delta_t_save;
        self.delta_t_save = self.delta_t;
        self.value += self.delta_t;
        self.index += 1;

        let interval = self.controls.write_interval;
        self.write_time = if interval > 0.0 {
            let elapsed = self.value - self.controls.start_time;
            let index = ((elapsed + 0.5 * self.delta_t) / interval).floor() as u64;
            let crossed = index > self.write_index;
            self.write_index = self.write_index.max(index);
            crossed
        } else {
            false
        };
        log::info!("Time = {}", self.value);
    }

    /// Whether the time level reached by the last `advance` is a write time.
    pub fn write_time(&self) -> bool {
        self.write_time
    }

    /// Grow or shrink `Δt` so the Courant number approaches `maxCo`.
    ///
    /// The factor is `min(min(maxCo/Co, 1 + 0.1 maxCo/Co), 1.2)`, and the
    /// result is capped at `max_delta_t`. No-op unless adjustment is enabled.
    pub fn adjust_delta_t(&mut self, courant: f64) -> Result<()> {
        if !self.controls.adjust_time_step {
            return Ok(());
        }
        let max_factor = self.controls.max_co / (courant + SMALL);
        let factor = max_factor.min(1.0 + 0.1 * max_factor).min(MAX_DELTA_T_GROWTH);
        let delta_t = (factor * self.delta_t).min(self.controls.max_delta_t);
        self.set_delta_t(delta_t)?;
        log::info!("deltaT = {}", self.delta_t);
        Ok(())
    }

    /// Scale the first `Δt` down so the initial Courant number is at most `maxCo`.
    pub fn set_initial_delta_t(&mut self, courant: f64) -> Result<()> {
        if !self.controls.adjust_time_step || courant <= SMALL {
            return Ok(());
        }
        let delta_t = (self.controls.max_co * self.delta_t / courant)
            .min(self.delta_t)
            .min(self.controls.max_delta_t);
        self.set_delta_t(delta_t)?;
        self.delta_t0 = delta_t;
        self.delta_t_save = delta_t;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_advance_tracks_previous_step() {
        let mut time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();
        assert_eq!(time.delta_t0(), 0.1);
        time.advance();
        time.set_delta_t(0.2).unwrap();
        time.advance();
        assert!((time.value() - 0.3).abs() < TOL);
        assert_eq!(time.delta_t(), 0.2);
        assert_eq!(time.delta_t0(), 0.1);
        time.advance();
        assert_eq!(time.delta_t0(), 0.2);
        assert_eq!(time.time_index(), 3);
    }

    #[test]
    fn test_running_and_write_times() {
        let controls = TimeControls::new(0.0, 1.0, 0.1).with_write_interval(0.3);
        let mut time = Time::new(controls).unwrap();
        let mut writes = Vec::new();
        let mut steps = 0;
        while time.running() {
            time.advance();
            steps += 1;
            if time.write_time() {
                writes.push(time.time_index());
            }
        }
        assert_eq!(steps, 10);
        assert_eq!(writes, vec![3, 6, 9]);
    }

    #[test]
    fn test_adjust_delta_t_growth_is_capped() {
        let controls = TimeControls::new(0.0, 10.0, 0.01).with_adjustable_time_step(0.5, 0.05);
        let mut time = Time::new(controls).unwrap();
        time.adjust_delta_t(0.0).unwrap();
        assert!((time.delta_t() - 0.012).abs() < TOL);
        time.adjust_delta_t(0.25).unwrap();
        // maxCo/Co = 2: min(2, 1.2, 1.2)
        assert!((time.delta_t() - 0.0144).abs() < TOL);
        time.adjust_delta_t(1.0).unwrap();
        // maxCo/Co = 0.5: halve
        assert!((time.delta_t() - 0.0072).abs() < 1e-9);
        for _ in 0..50 {
            time.adjust_delta_t(0.0).unwrap();
        }
        assert_eq!(time.delta_t(), 0.05);
    }

    #[test]
    fn test_invalid_controls() {
        assert!(Time::new(TimeControls::new(0.0, 1.0, 0.0)).is_err());
        assert!(Time::new(TimeControls::new(1.0, 0.0, 0.1)).is_err());
        let mut time = Time::new(TimeControls::default()).unwrap();
        assert!(time.set_delta_t(f64::NAN).is_err());
    }

    #[test]
    fn test_controls_from_json() {
        let controls: TimeControls =
            serde_json::from_str(r#"{"end_time": 2.0, "delta_t": 0.5, "adjust_time_step": true}"#)
                .unwrap();
        assert_eq!(controls.max_co, 1.0);
        let time = Time::new(controls).unwrap();
        assert_eq!(time.end_time(), 2.0);
    }
}
