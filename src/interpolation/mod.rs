//! Cell-to-face interpolation schemes.
//!
//! A scheme produces owner-side weights `w` per face, so that
//! `φ_f = w φ_P + (1 - w) φ_N`, plus an optional explicit correction added
//! on top of the weighted value.
//!
//! | Scheme             | Weights                          | Correction           |
//! |--------------------|----------------------------------|----------------------|
//! | `linear`           | inverse distance                 | -                    |
//! | `midPoint`         | 0.5                              | -                    |
//! | `upwind`           | 1 or 0 by flux sign              | -                    |
//! | `linearUpwind`     | 1 or 0 by flux sign              | `(C_f - C_U) · ∇φ_U` |
//! | limited (TVD/NVD)  | limiter blend of linear/upwind   | -                    |
//!
//! Non-coupled boundary faces always take the patch value (weight 1).
//! Coupled faces are interpolated from the cells on both sides using the
//! patch neighbour field.
//!
//! Schemes are selected by text, e.g. `"linear"`, `"vanLeer"`,
//! `"limitedLinear 1"`, `"linearUpwind grad(U)"`.

mod limited;
mod limiters;
mod linear;
mod scheme_spec;
mod upwind;

use std::sync::Arc;

pub use limited::{LimitedScheme, Limiter, LimiterInput};
pub use limiters::{Gamma, LimitedLinear, Minmod, Muscl, Quick, SuperBee, Umist, VanAlbada, VanLeer};
pub use linear::{Linear, MidPoint};
pub use scheme_spec::SchemeSpec;
pub use upwind::{LinearUpwind, Upwind};

use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, SurfaceField};
use crate::mesh::{FvMesh, MeshGeometry};
use crate::types::{DIMLESS, Differentiable, FieldValue, PatchIndex};

/// Mesh data and optional face flux available to a scheme.
#[derive(Clone)]
pub struct InterpolationContext<'a> {
    pub mesh: &'a FvMesh,
    pub geometry: Arc<MeshGeometry>,
    /// Face flux deciding the upwind direction
    pub flux: Option<&'a SurfaceField<f64>>,
}

impl<'a> std::fmt::Debug for InterpolationContext<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpolationContext")
            .field("n_faces", &self.mesh.n_faces())
            .field("has_flux", &self.flux.is_some())
            .finish()
    }
}

impl<'a> InterpolationContext<'a> {
    pub fn new(mesh: &'a FvMesh) -> Self {
        Self {
            mesh,
            geometry: mesh.geometry(),
            flux: None,
        }
    }

    pub fn with_flux(mut self, flux: Option<&'a SurfaceField<f64>>) -> Self {
        self.flux = flux;
        self
    }

    /// The face flux, or an error naming the scheme that needs it.
    pub fn require_flux(&self, scheme: &str) -> Result<&'a SurfaceField<f64>> {
        self.flux.ok_or_else(|| {
            FvError::InvalidConfig(format!("interpolation scheme '{scheme}' needs a face flux"))
        })
    }
}

/// Face interpolation of a cell field.
pub trait SurfaceInterpolationScheme<T: FieldValue>: Send + Sync {
    /// Scheme name as selected by text.
    fn name(&self) -> &'static str;

    /// Owner-side weights on every face.
    fn weights(&self, ctx: &InterpolationContext<'_>, vf: &GeometricField<T>)
    -> Result<SurfaceField<f64>>;

    /// Whether [`correction`](Self::correction) contributes.
    fn corrected(&self) -> bool {
        false
    }

    /// Explicit correction added to the weighted face values.
    fn correction(
        &self,
        _ctx: &InterpolationContext<'_>,
        _vf: &GeometricField<T>,
    ) -> Result<Option<SurfaceField<T>>> {
        Ok(None)
    }

    /// Face values of `vf`.
    fn interpolate(
        &self,
        ctx: &InterpolationContext<'_>,
        vf: &GeometricField<T>,
    ) -> Result<SurfaceField<T>> {
        let weights = self.weights(ctx, vf)?;
        let mut sf = interpolate_with_weights(ctx, vf, &weights)?;
        if self.corrected() {
            if let Some(corr) = self.correction(ctx, vf)? {
                sf = sf.try_add(&corr)?;
            }
        }
        sf.rename(format!("interpolate({})", vf.name()));
        Ok(sf)
    }
}

/// `w φ_P + (1 - w) φ_N` on internal and coupled faces, patch values elsewhere.
pub fn interpolate_with_weights<T: FieldValue>(
    ctx: &InterpolationContext<'_>,
    vf: &GeometricField<T>,
    weights: &SurfaceField<f64>,
) -> Result<SurfaceField<T>> {
    let mesh = ctx.mesh;
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let psi = vf.internal();
    let w = weights.internal();

    let internal: Field<T> = (0..mesh.n_internal_faces())
        .map(|f| psi[owner[f]] * w[f] + psi[neighbour[f]] * (1.0 - w[f]))
        .collect();

    let mut boundary = Vec::with_capacity(mesh.patches().len());
    for (i, pf) in vf.boundary_field().iter().enumerate() {
        let patch = PatchIndex::new(i);
        if pf.is_coupled() {
            let pnf = vf.patch_neighbour_field(mesh, patch)?.ok_or_else(|| {
                FvError::InvalidConfig(format!(
                    "coupled patch '{}' of '{}' has no neighbour field",
                    mesh.patch(patch).name,
                    vf.name()
                ))
            })?;
            let pw = weights.patch(patch);
            let values: Field<T> = mesh
                .face_cells(patch)
                .iter()
                .zip(pw)
                .zip(&pnf)
                .map(|((&c, &wf), &n)| psi[c] * wf + n * (1.0 - wf))
                .collect();
            boundary.push(values);
        } else {
            boundary.push(pf.values().clone());
        }
    }

    Ok(SurfaceField::new(
        format!("interpolate({})", vf.name()),
        vf.dimensions(),
        internal,
        boundary,
    ))
}

/// Weights from a per-face rule: `internal(f)` on internal faces,
/// `coupled(face)` on coupled patch faces, 1 on the rest.
pub(crate) fn build_weights<T: FieldValue>(
    mesh: &FvMesh,
    vf: &GeometricField<T>,
    name: &str,
    internal: impl Fn(usize) -> f64,
    coupled: impl Fn(usize) -> f64,
) -> SurfaceField<f64> {
    let internal: Field<f64> = (0..mesh.n_internal_faces()).map(internal).collect();
    let boundary = mesh
        .patches()
        .iter()
        .zip(vf.boundary_field().iter())
        .map(|(p, pf)| {
            if pf.is_coupled() {
                p.faces().map(&coupled).collect()
            } else {
                Field::uniform(p.size, 1.0)
            }
        })
        .collect();
    SurfaceField::new(format!("{name}Weights"), DIMLESS, internal, boundary)
}

/// Scheme names accepted by [`create_interpolation_scheme`].
pub const INTERPOLATION_SCHEMES: &[&str] = &[
    "Gamma",
    "MUSCL",
    "Minmod",
    "QUICK",
    "SuperBee",
    "UMIST",
    "limitedLinear",
    "linear",
    "linearUpwind",
    "midPoint",
    "upwind",
    "vanAlbada",
    "vanLeer",
];

/// Create an interpolation scheme from its text selection.
pub fn create_interpolation_scheme<T: Differentiable>(
    selection: &str,
) -> Result<Box<dyn SurfaceInterpolationScheme<T>>> {
    let spec = SchemeSpec::parse(selection)?;
    let scheme: Box<dyn SurfaceInterpolationScheme<T>> = match spec.name() {
        "linear" => Box::new(Linear),
        "midPoint" => Box::new(MidPoint),
        "upwind" => Box::new(Upwind),
        "linearUpwind" => Box::new(LinearUpwind::<T>::from_spec(&spec)?),
        "Minmod" => Box::new(LimitedScheme::new(Minmod)),
        "vanLeer" => Box::new(LimitedScheme::new(VanLeer)),
        "SuperBee" => Box::new(LimitedScheme::new(SuperBee)),
        "MUSCL" => Box::new(LimitedScheme::new(Muscl)),
        "vanAlbada" => Box::new(LimitedScheme::new(VanAlbada)),
        "UMIST" => Box::new(LimitedScheme::new(Umist)),
        "QUICK" => Box::new(LimitedScheme::new(Quick)),
        "limitedLinear" => Box::new(LimitedScheme::new(LimitedLinear::new(
            spec.scalar_arg(0, "limitedLinear coefficient")?,
        ))),
        "Gamma" => Box::new(LimitedScheme::new(Gamma::new(
            spec.scalar_arg(0, "Gamma coefficient")?,
        ))),
        other => {
            return Err(FvError::unknown_type(
                "interpolation scheme",
                other,
                INTERPOLATION_SCHEMES.iter().copied(),
            ));
        }
    };
    log::debug!("Selected interpolation scheme '{selection}'");
    Ok(scheme)
}
