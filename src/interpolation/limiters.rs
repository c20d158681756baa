//! TVD and NVD limiter functions.
//!
//! TVD limiters are functions of the gradient ratio `r`
//! ([`LimiterInput::r`]); NVD limiters of the normalised upwind value
//! ([`LimiterInput::phict`]). [`Quick`] works on face values directly.

use super::limited::{Limiter, LimiterInput};
use crate::types::{SMALL, stabilise};

/// `max(min(r, 1), 0)`
#[derive(Clone, Copy, Debug, Default)]
pub struct Minmod;

impl Limiter for Minmod {
    fn name(&self) -> &'static str {
        "Minmod"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        input.r().min(1.0).max(0.0)
    }
}

/// `(r + |r|) / (1 + |r|)`
#[derive(Clone, Copy, Debug, Default)]
pub struct VanLeer;

impl Limiter for VanLeer {
    fn name(&self) -> &'static str {
        "vanLeer"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        let r = input.r();
        (r + r.abs()) / (1.0 + r.abs())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SuperBee;

impl Limiter for SuperBee {
    fn name(&self) -> &'static str {
        "SuperBee"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        let r = input.r();
        (2.0 * r).min(1.0).max(r.min(2.0)).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Muscl;

impl Limiter for Muscl {
    fn name(&self) -> &'static str {
        "MUSCL"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        let r = input.r();
        (2.0 * r).min(0.5 * r + 0.5).min(2.0).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VanAlbada;

impl Limiter for VanAlbada {
    fn name(&self) -> &'static str {
        "vanAlbada"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        let r = input.r();
        (r * (r + 1.0) / (r * r + 1.0)).max(0.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Umist;

impl Limiter for Umist {
    fn name(&self) -> &'static str {
        "UMIST"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        let r = input.r();
        (2.0 * r)
            .min(0.75 * r + 0.25)
            .min(0.25 * r + 0.75)
            .min(2.0)
            .max(0.0)
    }
}

/// Minmod-like limiter with a tunable switch to linear.
///
/// `k` in `[0, 1]`: 0 is fully linear, 1 is the most bounded.
#[derive(Clone, Copy, Debug)]
pub struct LimitedLinear {
    two_by_k: f64,
}

impl LimitedLinear {
    pub fn new(k: f64) -> Self {
        let k = k.clamp(0.0, 1.0);
        Self {
            two_by_k: 2.0 / k.max(SMALL),
        }
    }
}

impl Limiter for LimitedLinear {
    fn name(&self) -> &'static str {
        "limitedLinear"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        (self.two_by_k * input.r()).min(1.0).max(0.0)
    }
}

/// NVD Gamma scheme, blending upwind and linear over `0 < φ̃_C < k/2`.
#[derive(Clone, Copy, Debug)]
pub struct Gamma {
    half_k: f64,
}

impl Gamma {
    pub fn new(k: f64) -> Self {
        let k = k.clamp(0.0, 1.0);
        Self {
            half_k: (k / 2.0).max(SMALL),
        }
    }
}

impl Limiter for Gamma {
    fn name(&self) -> &'static str {
        "Gamma"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        (input.phict() / self.half_k).max(0.0).min(1.0)
    }
}

/// Quadratic-upwind face value turned into a limiter, clipped to `[0, 2]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Quick;

impl Limiter for Quick {
    fn name(&self) -> &'static str {
        "QUICK"
    }

    fn limiter(&self, input: &LimiterInput) -> f64 {
        let phi_cd = input.cd_weight * input.phi_p + (1.0 - input.cd_weight) * input.phi_n;
        let (phi_u, phi_f) = if input.face_flux > 0.0 {
            (input.phi_p, 0.5 * (phi_cd + input.phi_p + (1.0 - input.cd_weight) * input.gradcf_p))
        } else {
            (input.phi_n, 0.5 * (phi_cd + input.phi_n - input.cd_weight * input.gradcf_n))
        };
        let q = (phi_f - phi_u) / stabilise(phi_cd - phi_u, SMALL);
        q.min(2.0).max(0.0)
    }
}
