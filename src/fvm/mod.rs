//! Implicit finite-volume operators.
//!
//! Each operator returns the [`FvMatrix`] of its linearisation around the
//! current field, to be combined into an equation and solved:
//!
//! ```ignore
//! let eqn = (fvm::ddt(&euler, None, &t, &mesh, &time)?
//!     + fvm::div(&phi, &t, &mesh, "Gauss upwind")?)?
//!     .equate(fvm::laplacian_uniform(&nu, &t, &mesh, "Gauss linear corrected")?)?;
//! eqn.solve(&mut t, &mesh, &controls)?;
//! ```
//!
//! | Operator            | Diagonal / off-diagonal                 | Source                          |
//! |---------------------|-----------------------------------------|---------------------------------|
//! | `laplacian(Γ, ψ)`   | `Γ_f|S_f|Δ_f` off, negative sum on diag | boundary gradient, correction   |
//! | `div(F, ψ)`         | `-wF` lower, `(1-w)F` upper             | boundary value, correction      |
//! | `ddt(ψ)`            | `ρV/Δt`-like diagonal                   | old time levels                 |
//! | `sp(c, ψ)`          | `V c` on the diagonal                   | -                               |
//! | `su(s, ψ)`          | -                                       | `-V s`                          |
//! | `susp(c, ψ)`        | `V max(c, 0)`                           | `-V min(c, 0) ψ`                |

mod div;
mod laplacian;
mod sources;

pub use div::{CONVECTION_SCHEMES, GaussConvectionScheme};
pub use laplacian::{GaussLaplacianScheme, LAPLACIAN_SCHEMES};
pub use sources::{sp, sp_uniform, su, susp};

use crate::control::Time;
use crate::ddt::DdtScheme;
use crate::error::Result;
use crate::field::{GeometricField, SurfaceField, VolScalarField};
use crate::matrix::FvMatrix;
use crate::mesh::FvMesh;
use crate::types::{Differentiable, Dimensioned, FieldValue};

/// `∇·(Γ∇ψ)` with a face diffusivity.
pub fn laplacian<T: Differentiable>(
    gamma: &SurfaceField<f64>,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<FvMatrix<T>> {
    GaussLaplacianScheme::<T>::parse(scheme)?.fvm_laplacian(gamma, psi, mesh)
}

/// `∇·(Γ∇ψ)` with a cell diffusivity, interpolated by the scheme.
pub fn laplacian_vol<T: Differentiable>(
    gamma: &VolScalarField,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<FvMatrix<T>> {
    let scheme = GaussLaplacianScheme::<T>::parse(scheme)?;
    let gamma_f = scheme.interpolate_gamma(gamma, mesh)?;
    scheme.fvm_laplacian(&gamma_f, psi, mesh)
}

/// `∇·(Γ∇ψ)` with a uniform diffusivity.
pub fn laplacian_uniform<T: Differentiable>(
    gamma: &Dimensioned<f64>,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<FvMatrix<T>> {
    let gamma_f = SurfaceField::uniform(gamma.name.clone(), mesh, gamma.dimensions, gamma.value);
    laplacian(&gamma_f, psi, mesh, scheme)
}

/// `∇·(Fψ)` for the face flux `flux`.
pub fn div<T: Differentiable>(
    flux: &SurfaceField<f64>,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
    scheme: &str,
) -> Result<FvMatrix<T>> {
    GaussConvectionScheme::<T>::parse(scheme)?.fvm_div(flux, psi, mesh)
}

/// `∂(ρψ)/∂t`. The scheme is passed in because several keep state between
/// steps.
pub fn ddt<T: FieldValue>(
    scheme: &dyn DdtScheme<T>,
    rho: Option<&VolScalarField>,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
    time: &Time,
) -> Result<FvMatrix<T>> {
    scheme.fvm_ddt(rho, psi, mesh, time)
}

/// `diag + Σ off-diagonals` per row, boundary coefficients excluded.
#[cfg(test)]
pub(crate) fn row_sums<T: FieldValue>(fvm: &FvMatrix<T>) -> Vec<f64> {
    let ldu = fvm.ldu();
    let addr = ldu.addressing();
    let mut sums = ldu.diag().to_vec();
    for f in 0..addr.n_faces() {
        sums[addr.lower()[f]] += ldu.upper()[f];
        sums[addr.upper()[f]] += ldu.lower()[f];
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{FixedValue, ZeroGradient};
    use crate::control::TimeControls;
    use crate::ddt::Euler;
    use crate::linear_solver::SolverControls;
    use crate::mesh::line_mesh;
    use crate::types::{DIM_AREA, DIM_KINEMATIC_VISCOSITY, DIM_VELOCITY, DIMLESS};

    #[test]
    fn test_transport_equation_dimensions_agree() {
        let mesh = line_mesh(8, 1.0).unwrap();
        let t = GeometricField::uniform("T", &mesh, DIMLESS, 0.0, "zeroGradient").unwrap();
        let phi = SurfaceField::uniform("phi", &mesh, DIM_VELOCITY * DIM_AREA, 0.0);
        let nu = Dimensioned::new("nu", DIM_KINEMATIC_VISCOSITY, 0.01);
        let time = Time::new(TimeControls::new(0.0, 1.0, 0.1)).unwrap();

        let ddt_t = ddt(&Euler, None, &t, &mesh, &time).unwrap();
        let div_t = div(&phi, &t, &mesh, "Gauss upwind").unwrap();
        let lap_t = laplacian_uniform(&nu, &t, &mesh, "Gauss linear corrected").unwrap();
        assert_eq!(ddt_t.dimensions(), div_t.dimensions());
        assert_eq!(ddt_t.dimensions(), lap_t.dimensions());
        assert!((ddt_t + div_t).unwrap().equate(lap_t).is_ok());

        let wrong = laplacian_uniform(
            &Dimensioned::new("k", DIMLESS, 1.0),
            &t,
            &mesh,
            "Gauss linear corrected",
        )
        .unwrap();
        let rate = ddt(&Euler, None, &t, &mesh, &time).unwrap();
        assert!((rate + wrong).is_err());
    }

    #[test]
    fn test_implicit_diffusion_step_relaxes_towards_boundary() {
        let mesh = line_mesh(10, 1.0).unwrap();
        let mut t: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
            .internal_uniform(0.0)
            .default_condition(ZeroGradient)
            .patch("left", FixedValue::uniform(1.0))
            .build(&mesh)
            .unwrap();
        let nu = Dimensioned::new("nu", DIM_KINEMATIC_VISCOSITY, 0.1);
        let mut time = Time::new(TimeControls::new(0.0, 10.0, 0.5)).unwrap();
        for _ in 0..40 {
            time.advance();
            t.store_old_times(time.time_index());
            let eqn = ddt(&Euler, None, &t, &mesh, &time)
                .unwrap()
                .equate(laplacian_uniform(&nu, &t, &mesh, "Gauss linear uncorrected").unwrap())
                .unwrap();
            eqn.solve(&mut t, &mesh, &SolverControls::pbicgstab(1e-12, 0.0)).unwrap();
        }
        let values = t.internal();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
        assert!(values.iter().all(|&v| v > 0.0 && v <= 1.0));
        assert!(values[9] > 0.5);
    }
}
