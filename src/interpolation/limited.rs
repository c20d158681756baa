//! Limited (TVD/NVD) blending of linear and upwind weights.
//!
//! Per face, a limiter `λ ∈ [0, 2]` blends the two:
//!
//! ```text
//! w = λ w_linear + (1 - λ) pos0(F)
//! ```
//!
//! so `λ = 0` is upwind and `λ = 1` is linear. The limiter sees the face
//! values projected onto a scalar: scalars directly, other types along
//! `(φ_N - φ_P) / |φ_N - φ_P|`.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{InterpolationContext, SurfaceInterpolationScheme, build_weights};
use crate::error::{FvError, Result};
use crate::field::{GeometricField, SurfaceField};
use crate::gradient::{GaussGradient, GradientScheme};
use crate::types::{Differentiable, FieldValue, PatchIndex, SMALL, VSMALL, Vector, stabilise};

/// Displacement used when the projected one vanishes.
const DEGENERATE_DELTA: Vector = Vector::new(SMALL, 0.0, 0.0);

/// Ratio bound beyond which the gradient ratio saturates.
const RATIO_CAP: f64 = 1000.0;

/// Face data handed to a limiter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimiterInput {
    /// Linear (inverse-distance) owner weight
    pub cd_weight: f64,
    pub face_flux: f64,
    pub phi_p: f64,
    pub phi_n: f64,
    /// `d · ∇φ_P`
    pub gradcf_p: f64,
    /// `d · ∇φ_N`
    pub gradcf_n: f64,
}

impl LimiterInput {
    fn gradcf(&self) -> f64 {
        if self.face_flux > 0.0 { self.gradcf_p } else { self.gradcf_n }
    }

    /// Upwind gradient ratio `r = 2 (d·∇φ_U)/(φ_N - φ_P) - 1`.
    pub fn r(&self) -> f64 {
        let gradf = self.phi_n - self.phi_p;
        let gradcf = self.gradcf();
        if gradcf.abs() >= RATIO_CAP * gradf.abs() {
            2.0 * RATIO_CAP * gradcf.signum() * gradf.signum() - 1.0
        } else {
            2.0 * (gradcf / gradf) - 1.0
        }
    }

    /// Normalised upwind value `1 - (φ_N - φ_P) / (2 d·∇φ_U)`.
    pub fn phict(&self) -> f64 {
        let gradf = self.phi_n - self.phi_p;
        let gradcf = self.gradcf();
        if gradf.abs() >= RATIO_CAP * gradcf.abs() {
            1.0 - 0.5 * RATIO_CAP * gradf.signum() * gradcf.signum()
        } else {
            1.0 - 0.5 * gradf / gradcf
        }
    }
}

/// Face limiter function.
pub trait Limiter: Send + Sync {
    /// Scheme name as selected by text.
    fn name(&self) -> &'static str;

    /// Blending factor, 0 for upwind and 1 for linear.
    fn limiter(&self, input: &LimiterInput) -> f64;
}

/// Interpolation through a [`Limiter`].
#[derive(Clone, Debug)]
pub struct LimitedScheme<L> {
    limiter: L,
}

impl<L: Limiter> LimitedScheme<L> {
    pub fn new(limiter: L) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &L {
        &self.limiter
    }

    /// Limiter value on every face; non-coupled patch faces get 1.
    pub fn limiter_field<T: Differentiable>(
        &self,
        ctx: &InterpolationContext<'_>,
        vf: &GeometricField<T>,
    ) -> Result<SurfaceField<f64>> {
        let mesh = ctx.mesh;
        let geo = &ctx.geometry;
        let flux = ctx.require_flux(self.limiter.name())?.face_values();
        let grad = GaussGradient::linear().grad(vf, mesh)?;
        let g = grad.internal();
        let psi = vf.internal();
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();
        let empty = mesh.empty_directions();

        let face_limiter = |f: usize, phi_p: T, phi_n: T, grad_p: &T::Grad, grad_n: &T::Grad| {
            let d = projected_delta(geo.delta[f], &empty);
            let input = project(
                geo.weights[f],
                flux[f],
                phi_p,
                phi_n,
                T::directional(d, grad_p),
                T::directional(d, grad_n),
            );
            self.limiter.limiter(&input)
        };

        let internal_face =
            |f: usize| face_limiter(f, psi[owner[f]], psi[neighbour[f]], &g[owner[f]], &g[neighbour[f]]);

        #[cfg(feature = "parallel")]
        let internal: Vec<f64> = (0..mesh.n_internal_faces())
            .into_par_iter()
            .map(internal_face)
            .collect();
        #[cfg(not(feature = "parallel"))]
        let internal: Vec<f64> = (0..mesh.n_internal_faces()).map(internal_face).collect();

        let mut boundary = Vec::with_capacity(mesh.patches().len());
        for (i, (patch, pf)) in mesh.patches().iter().zip(vf.boundary_field().iter()).enumerate() {
            if !pf.is_coupled() {
                boundary.push(crate::field::Field::uniform(patch.size, 1.0));
                continue;
            }
            let index = PatchIndex::new(i);
            let missing = || {
                FvError::InvalidConfig(format!(
                    "coupled patch '{}' of '{}' has no neighbour field",
                    patch.name,
                    vf.name()
                ))
            };
            let pnf = vf.patch_neighbour_field(mesh, index)?.ok_or_else(missing)?;
            let grad_nbr = grad.patch_neighbour_field(mesh, index)?.ok_or_else(missing)?;
            let values = patch
                .faces()
                .zip(mesh.face_cells(index))
                .enumerate()
                .map(|(k, (f, &c))| face_limiter(f, psi[c], pnf[k], &g[c], &grad_nbr[k]))
                .collect();
            boundary.push(values);
        }

        Ok(SurfaceField::new(
            format!("{}Limiter({})", self.limiter.name(), vf.name()),
            crate::types::DIMLESS,
            internal.into(),
            boundary,
        ))
    }
}

/// `delta` with its components along empty directions removed.
fn projected_delta(delta: Vector, empty: &[Vector]) -> Vector {
    let d = empty.iter().fold(delta, |d, n| d - *n * n.dot(&d));
    if d.norm() < SMALL { DEGENERATE_DELTA } else { d }
}

/// Scalar limiter input for any value type.
fn project<T: FieldValue>(
    cd_weight: f64,
    face_flux: f64,
    phi_p: T,
    phi_n: T,
    gradcf_p: T,
    gradcf_n: T,
) -> LimiterInput {
    if T::N_COMPONENTS == 1 {
        return LimiterInput {
            cd_weight,
            face_flux,
            phi_p: phi_p.component(0),
            phi_n: phi_n.component(0),
            gradcf_p: gradcf_p.component(0),
            gradcf_n: gradcf_n.component(0),
        };
    }
    let dphi = phi_n - phi_p;
    let e = dphi / stabilise(dphi.mag(), VSMALL);
    LimiterInput {
        cd_weight,
        face_flux,
        phi_p: phi_p.inner(&e),
        phi_n: phi_n.inner(&e),
        gradcf_p: gradcf_p.inner(&e),
        gradcf_n: gradcf_n.inner(&e),
    }
}

impl<T: Differentiable, L: Limiter> SurfaceInterpolationScheme<T> for LimitedScheme<L> {
    fn name(&self) -> &'static str {
        self.limiter.name()
    }

    fn weights(
        &self,
        ctx: &InterpolationContext<'_>,
        vf: &GeometricField<T>,
    ) -> Result<SurfaceField<f64>> {
        let lim = self.limiter_field(ctx, vf)?.face_values();
        let flux = ctx.require_flux(self.limiter.name())?.face_values();
        let cd = &ctx.geometry.weights;
        let blend = |f: usize| {
            let pos0 = if flux[f] >= 0.0 { 1.0 } else { 0.0 };
            lim[f] * cd[f] + (1.0 - lim[f]) * pos0
        };
        Ok(build_weights(ctx.mesh, vf, self.limiter.name(), blend, blend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ZeroGradient;
    use crate::interpolation::{Linear, Minmod, Upwind, VanLeer};
    use crate::mesh::line_mesh;
    use crate::types::{DIM_VOLUME, DIM_TIME, DIMLESS};

    const TOL: f64 = 1e-12;

    fn input(phi_p: f64, phi_n: f64, gradcf: f64) -> LimiterInput {
        LimiterInput {
            cd_weight: 0.5,
            face_flux: 1.0,
            phi_p,
            phi_n,
            gradcf_p: gradcf,
            gradcf_n: 0.0,
        }
    }

    #[test]
    fn test_ratio_of_smooth_profile_is_one() {
        // Linear profile: d·∇φ equals φ_N - φ_P.
        assert!((input(1.0, 2.0, 1.0).r() - 1.0).abs() < TOL);
        assert!((input(1.0, 2.0, 1.0).phict() - 0.5).abs() < TOL);
    }

    #[test]
    fn test_ratio_saturates_on_flat_face() {
        let r = input(1.0, 1.0, 0.0).r();
        assert_eq!(r, 2.0 * RATIO_CAP - 1.0);
        assert!(input(1.0, 1.0 + 1e-20, 1.0).r() > 1000.0);
    }

    #[test]
    fn test_empty_directions_removed_from_delta() {
        let d = projected_delta(Vector::new(0.1, 0.0, 0.3), &[Vector::Z]);
        assert_eq!(d, Vector::new(0.1, 0.0, 0.0));
        assert_eq!(projected_delta(Vector::new(0.0, 0.0, 0.3), &[Vector::Z]), DEGENERATE_DELTA);
    }

    #[test]
    fn test_vector_projection_along_difference() {
        let inp = project(
            0.5,
            1.0,
            Vector::new(0.0, 1.0, 0.0),
            Vector::new(0.0, 3.0, 0.0),
            Vector::new(0.0, 2.0, 0.0),
            Vector::ZERO,
        );
        assert!((inp.phi_p - 1.0).abs() < TOL);
        assert!((inp.phi_n - 3.0).abs() < TOL);
        assert!((inp.r() - 1.0).abs() < TOL);
    }

    #[test]
    fn test_step_profile_stays_bounded() {
        let mesh = line_mesh(10, 1.0).unwrap();
        let values: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 0.0 }).collect();
        let vf: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
            .internal_values(values.clone())
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let phi = SurfaceField::uniform("phi", &mesh, DIM_VOLUME / DIM_TIME, 1.0);
        let ctx = InterpolationContext::new(&mesh).with_flux(Some(&phi));
        for sf in [
            LimitedScheme::new(VanLeer).interpolate(&ctx, &vf).unwrap(),
            LimitedScheme::new(Minmod).interpolate(&ctx, &vf).unwrap(),
        ] {
            for (f, v) in sf.internal().iter().enumerate() {
                let (lo, hi) = (values[f].min(values[f + 1]), values[f].max(values[f + 1]));
                assert!(*v >= lo - TOL && *v <= hi + TOL, "face {f}: {v}");
            }
        }
    }

    #[test]
    fn test_smooth_field_recovers_linear_and_flat_region_upwind() {
        let mesh = line_mesh(10, 1.0).unwrap();
        let vf: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
            .internal_from_centres(|c| c.x)
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let phi = SurfaceField::uniform("phi", &mesh, DIM_VOLUME / DIM_TIME, 1.0);
        let ctx = InterpolationContext::new(&mesh).with_flux(Some(&phi));
        let limited = LimitedScheme::new(VanLeer).interpolate(&ctx, &vf).unwrap();
        let linear = Linear.interpolate(&ctx, &vf).unwrap();
        let upwind = Upwind.interpolate(&ctx, &vf).unwrap();
        // Interior faces whose upwind cell has an exact gradient.
        for f in 1..8 {
            assert!((limited.internal()[f] - linear.internal()[f]).abs() < 1e-10, "face {f}");
        }
        // Upwind cell 0 sees a halved gradient next to the zero-gradient wall.
        assert!(limited.internal()[0] >= upwind.internal()[0] - TOL);
        assert!(limited.internal()[0] <= linear.internal()[0] + TOL);
    }
}
