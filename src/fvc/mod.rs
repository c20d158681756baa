//! Explicit finite-volume calculus.
//!
//! Every operator evaluates from the current field values and returns a new
//! field. Cell results are `calculated` fields with boundary values
//! extrapolated from the adjacent cells.
//!
//! | Operator                   | Result                                 |
//! |----------------------------|----------------------------------------|
//! | `grad(ψ)`                  | cell gradient                          |
//! | `div_flux(s)`              | `Σ_f s_f / V`                          |
//! | `div(F, ψ)`                | `Σ_f F_f ψ_f / V`                      |
//! | `laplacian(Γ, ψ)`          | `Σ_f Γ_f|S_f| snGrad(ψ)_f / V`         |
//! | `interpolate(ψ)`           | face values                            |
//! | `sn_grad(ψ)`               | face-normal gradient                   |
//! | `flux(U)`                  | `S_f · U_f`                            |
//! | `surface_integrate(s)`     | `Σ_f s_f / V`, outward-signed          |
//! | `surface_sum(s)`           | `Σ_f s_f`, unsigned                    |
//! | `domain_integrate(ψ)`      | `Σ_c V_c ψ_c` over all domains         |
//! | `reconstruct(φ)`           | cell vector from face fluxes           |
//! | `ddt(ψ)`                   | explicit time derivative               |

mod flux;
mod integrate;

pub use flux::{flux, flux_of, reconstruct};
pub use integrate::{div_flux, domain_integrate, surface_integrate, surface_sum};

use crate::control::Time;
use crate::ddt::DdtScheme;
use crate::error::Result;
use crate::field::{GeometricField, SurfaceField, VolScalarField};
use crate::fvm::{GaussConvectionScheme, GaussLaplacianScheme};
use crate::gradient::create_gradient_scheme;
use crate::interpolation::{InterpolationContext, create_interpolation_scheme};
use crate::mesh::FvMesh;
use crate::sn_grad::create_sn_grad_scheme;
use crate::types::{Differentiable, Dimensioned, FieldValue};

/// Cell gradient with the selected scheme, e.g. `"Gauss linear"` or
/// `"leastSquares"`.
pub fn grad<T: Differentiable>(
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<GeometricField<T::Grad>> {
    create_gradient_scheme::<T>(scheme)?.grad(vf, mesh)
}

/// Convection `∇·(Fψ)` with a `Gauss <interpolation>` selection.
pub fn div<T: Differentiable>(
    flux: &SurfaceField<f64>,
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<GeometricField<T>> {
    GaussConvectionScheme::<T>::parse(scheme)?.fvc_div(flux, vf, mesh)
}

/// `∇·(Γ∇ψ)` with a face diffusivity.
pub fn laplacian<T: Differentiable>(
    gamma: &SurfaceField<f64>,
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<GeometricField<T>> {
    GaussLaplacianScheme::<T>::parse(scheme)?.fvc_laplacian(gamma, vf, mesh)
}

/// `∇·(Γ∇ψ)` with a uniform diffusivity.
pub fn laplacian_uniform<T: Differentiable>(
    gamma: &Dimensioned<f64>,
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<GeometricField<T>> {
    let gamma_f = SurfaceField::uniform(gamma.name.clone(), mesh, gamma.dimensions, gamma.value);
    laplacian(&gamma_f, vf, mesh, scheme)
}

/// Face values; `flux` is required by upwind-biased schemes.
pub fn interpolate<T: Differentiable>(
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    flux: Option<&SurfaceField<f64>>,
    scheme: &str,
) -> Result<SurfaceField<T>> {
    let ctx = InterpolationContext::new(mesh).with_flux(flux);
    create_interpolation_scheme::<T>(scheme)?.interpolate(&ctx, vf)
}

/// Face-normal gradient, e.g. `"corrected"`.
pub fn sn_grad<T: Differentiable>(
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<SurfaceField<T>> {
    create_sn_grad_scheme::<T>(scheme)?.sn_grad(vf, mesh)
}

/// Explicit `∂(ρψ)/∂t` from the stored time levels.
pub fn ddt<T: FieldValue>(
    scheme: &dyn DdtScheme<T>,
    rho: Option<&VolScalarField>,
    vf: &GeometricField<T>,
    mesh: &FvMesh,
    time: &Time,
) -> Result<GeometricField<T>> {
    scheme.fvc_ddt(rho, vf, mesh, time)
}
