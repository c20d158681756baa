//! Fixed-weight schemes.

use super::{InterpolationContext, SurfaceInterpolationScheme, build_weights};
use crate::error::Result;
use crate::field::{GeometricField, SurfaceField};
use crate::types::FieldValue;

/// Inverse-distance weights, second order on smooth meshes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Linear;

impl<T: FieldValue> SurfaceInterpolationScheme<T> for Linear {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn weights(
        &self,
        ctx: &InterpolationContext<'_>,
        vf: &GeometricField<T>,
    ) -> Result<SurfaceField<f64>> {
        let w = &ctx.geometry.weights;
        Ok(build_weights(ctx.mesh, vf, "linear", |f| w[f], |f| w[f]))
    }
}

/// Arithmetic mean of the two cells.
#[derive(Clone, Copy, Debug, Default)]
pub struct MidPoint;

impl<T: FieldValue> SurfaceInterpolationScheme<T> for MidPoint {
    fn name(&self) -> &'static str {
        "midPoint"
    }

    fn weights(
        &self,
        ctx: &InterpolationContext<'_>,
        vf: &GeometricField<T>,
    ) -> Result<SurfaceField<f64>> {
        Ok(build_weights(ctx.mesh, vf, "midPoint", |_| 0.5, |_| 0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ZeroGradient;
    use crate::mesh::{BlockSide, HexBlock};
    use crate::types::DIMLESS;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_linear_on_graded_mesh_is_exact_for_linear_field() {
        let mesh = HexBlock::new(6, 1, 1).grading(3.0, 1.0, 1.0).build().unwrap();
        let vf: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
            .internal_from_centres(|c| 2.0 * c.x + 1.0)
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let ctx = InterpolationContext::new(&mesh);
        let sf = Linear.interpolate(&ctx, &vf).unwrap();
        let geo = mesh.geometry();
        for f in 0..mesh.n_internal_faces() {
            assert!((sf.internal()[f] - (2.0 * geo.face_centres[f].x + 1.0)).abs() < 1e-10);
        }
    }

    #[test]
    fn test_cyclic_faces_use_neighbour_cells() {
        let mesh = HexBlock::new(4, 1, 1)
            .cyclic(BlockSide::Left, BlockSide::Right)
            .build()
            .unwrap();
        let vf: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
            .internal_values(vec![1.0, 2.0, 3.0, 5.0])
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let ctx = InterpolationContext::new(&mesh);
        let left = mesh.patch_by_name("left").unwrap();
        let w = <MidPoint as SurfaceInterpolationScheme<f64>>::weights(&MidPoint, &ctx, &vf).unwrap();
        assert_eq!(w.patch(left)[0], 0.5);
        let sf = MidPoint.interpolate(&ctx, &vf).unwrap();
        assert!((sf.patch(left)[0] - 3.0).abs() < TOL);
        assert!((sf.internal()[0] - 1.5).abs() < TOL);
        let bottom = mesh.patch_by_name("bottom").unwrap();
        assert_eq!(w.patch(bottom)[0], 1.0);
    }
}
