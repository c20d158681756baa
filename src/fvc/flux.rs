//! Face fluxes of vector fields and their reconstruction back to cells.

use super::integrate::face_total;
use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, SurfaceField, VolVectorField};
use crate::interpolation::{InterpolationContext, Linear, SurfaceInterpolationScheme};
use crate::mesh::FvMesh;
use crate::types::{DIM_AREA, PatchIndex, Tensor, Vector};

/// `φ_f = S_f · U_f` with linearly interpolated `U`. Empty patches carry no
/// flux.
pub fn flux(u: &VolVectorField, mesh: &FvMesh) -> Result<SurfaceField<f64>> {
    let ctx = InterpolationContext::new(mesh);
    let u_f = Linear.interpolate(&ctx, u)?;
    flux_of(&u_f, mesh)
}

/// `S_f · U_f` for face values already interpolated.
pub fn flux_of(u_f: &SurfaceField<Vector>, mesh: &FvMesh) -> Result<SurfaceField<f64>> {
    u_f.check_mesh(mesh)?;
    let geo = mesh.geometry();
    let internal: Field<f64> = u_f
        .internal()
        .iter()
        .zip(&geo.face_areas)
        .map(|(u, sf)| sf.dot(u))
        .collect();
    let boundary = mesh
        .patches()
        .iter()
        .zip(u_f.boundary())
        .map(|(patch, values)| {
            if patch.kind.is_empty_kind() {
                Field::zeros(patch.size)
            } else {
                patch
                    .faces()
                    .zip(values.iter())
                    .map(|(f, u)| geo.face_areas[f].dot(u))
                    .collect()
            }
        })
        .collect();
    Ok(SurfaceField::new(
        format!("flux({})", u_f.name()),
        u_f.dimensions() * DIM_AREA,
        internal,
        boundary,
    ))
}

/// Cell vectors whose face projections best match the face flux:
/// `U = (Σ_f S_f ⊗ Ŝ_f)⁻¹ · Σ_f Ŝ_f φ_f`.
///
/// Directions without solution (empty) are filled in the tensor before
/// inversion and come out zero.
pub fn reconstruct(phi: &SurfaceField<f64>, mesh: &FvMesh) -> Result<VolVectorField> {
    phi.check_mesh(mesh)?;
    let geo = mesh.geometry();

    let unit_face = |f: usize| geo.face_areas[f] / geo.mag_face_areas[f];
    let sf_hat_sf = SurfaceField::new(
        "SfHatSf",
        DIM_AREA,
        (0..mesh.n_internal_faces())
            .map(|f| unit_face(f).outer(&geo.face_areas[f]))
            .collect(),
        mesh.patches()
            .iter()
            .map(|p| p.faces().map(|f| unit_face(f).outer(&geo.face_areas[f])).collect())
            .collect(),
    );
    let sf_hat_phi = SurfaceField::new(
        "SfHatPhi",
        phi.dimensions(),
        phi.internal()
            .iter()
            .enumerate()
            .map(|(f, &p)| unit_face(f) * p)
            .collect(),
        mesh.patches()
            .iter()
            .enumerate()
            .map(|(i, p)| {
                p.faces()
                    .zip(phi.patch(PatchIndex::new(i)))
                    .map(|(f, &v)| unit_face(f) * v)
                    .collect()
            })
            .collect(),
    );

    // Both products are even in the face orientation, so plain sums.
    let mut tensor_sum: Vec<Tensor> = face_total(mesh, &sf_hat_sf);
    let vector_sum = face_total(mesh, &sf_hat_phi);
    for e in mesh.empty_directions() {
        for t in &mut tensor_sum {
            *t += e.outer(&e);
        }
    }

    let values = tensor_sum
        .iter()
        .zip(&vector_sum)
        .enumerate()
        .map(|(c, (t, v))| {
            t.inv().map(|inv| inv.dot_vector(*v)).ok_or_else(|| {
                FvError::InvalidMesh(format!("cell {c} has no face basis to reconstruct from"))
            })
        })
        .collect::<Result<Field<Vector>>>()?;

    GeometricField::extrapolated(
        format!("reconstruct({})", phi.name()),
        mesh,
        phi.dimensions() / DIM_AREA,
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::FixedValue;
    use crate::mesh::{HexBlock, line_mesh};
    use crate::types::DIM_VELOCITY;

    const TOL: f64 = 1e-10;

    fn uniform_velocity(mesh: &FvMesh, u: Vector) -> VolVectorField {
        GeometricField::builder("U", DIM_VELOCITY)
            .internal_uniform(u)
            .default_condition(FixedValue::uniform(u))
            .build(mesh)
            .unwrap()
    }

    #[test]
    fn test_flux_of_uniform_velocity() {
        let mesh = line_mesh(4, 2.0).unwrap();
        let u = uniform_velocity(&mesh, Vector::new(3.0, 1.0, 0.0));
        let phi = flux(&u, &mesh).unwrap();
        assert_eq!(phi.dimensions(), DIM_VELOCITY * DIM_AREA);
        assert!(phi.internal().iter().all(|&p| (p - 3.0).abs() < TOL));
        let left = mesh.patch_by_name("left").unwrap();
        assert!((phi.patch(left)[0] + 3.0).abs() < TOL);
        let empty = mesh.patch_by_name("frontAndBack").unwrap();
        assert!(phi.patch(empty).iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_reconstruct_uniform_velocity() {
        let mesh = HexBlock::new(3, 2, 2).size(1.0, 0.5, 2.0).build().unwrap();
        let u0 = Vector::new(1.0, -2.0, 0.5);
        let u = uniform_velocity(&mesh, u0);
        let phi = flux(&u, &mesh).unwrap();
        let rec = reconstruct(&phi, &mesh).unwrap();
        for v in rec.internal().iter() {
            assert!((v.x - u0.x).abs() < TOL);
            assert!((v.y - u0.y).abs() < TOL);
            assert!((v.z - u0.z).abs() < TOL);
        }
    }

    #[test]
    fn test_reconstruct_on_line_mesh_zeroes_empty_directions() {
        let mesh = line_mesh(5, 1.0).unwrap();
        let u = uniform_velocity(&mesh, Vector::new(2.0, 0.0, 0.0));
        let rec = reconstruct(&flux(&u, &mesh).unwrap(), &mesh).unwrap();
        for v in rec.internal().iter() {
            assert!((v.x - 2.0).abs() < TOL);
            assert!(v.y.abs() < TOL && v.z.abs() < TOL);
        }
    }
}
