//! Face sums, volume integrals and the discrete divergence of face fields.

use crate::error::Result;
use crate::field::{Field, GeometricField, SurfaceField};
use crate::mesh::FvMesh;
use crate::types::{DIM_VOLUME, Dimensioned, FieldValue, PatchIndex};

/// Per-cell accumulation of face values: `neighbour_sign = -1` gives the
/// outward-signed sum of a flux, `+1` the plain sum over the cell's faces.
/// Boundary faces count for their owner; empty patches contribute nothing.
fn accumulate<T: FieldValue>(mesh: &FvMesh, ssf: &SurfaceField<T>, neighbour_sign: f64) -> Vec<T> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let mut sum = vec![T::zero(); mesh.n_cells()];
    for (f, &s) in ssf.internal().iter().enumerate() {
        sum[owner[f]] += s;
        sum[neighbour[f]] += s * neighbour_sign;
    }
    for (i, patch) in mesh.patches().iter().enumerate() {
        if patch.kind.is_empty_kind() {
            continue;
        }
        let index = PatchIndex::new(i);
        for (&c, &s) in mesh.face_cells(index).iter().zip(ssf.patch(index)) {
            sum[c] += s;
        }
    }
    sum
}

/// Outward-signed face sum: owner `+s_f`, neighbour `-s_f`.
fn face_sum<T: FieldValue>(mesh: &FvMesh, ssf: &SurfaceField<T>) -> Vec<T> {
    accumulate(mesh, ssf, -1.0)
}

/// Plain face sum: both sides `+s_f`.
pub(crate) fn face_total<T: FieldValue>(mesh: &FvMesh, ssf: &SurfaceField<T>) -> Vec<T> {
    accumulate(mesh, ssf, 1.0)
}

/// `Σ_f s_f` per cell, unsigned: a face adds its value to both sides.
pub fn surface_sum<T: FieldValue>(
    ssf: &SurfaceField<T>,
    mesh: &FvMesh,
) -> Result<GeometricField<T>> {
    ssf.check_mesh(mesh)?;
    GeometricField::extrapolated(
        format!("surfaceSum({})", ssf.name()),
        mesh,
        ssf.dimensions(),
        Field::new(face_total(mesh, ssf)),
    )
}

/// `Σ_f s_f / V` per cell.
pub fn surface_integrate<T: FieldValue>(
    ssf: &SurfaceField<T>,
    mesh: &FvMesh,
) -> Result<GeometricField<T>> {
    ssf.check_mesh(mesh)?;
    let geo = mesh.geometry();
    let values: Field<T> = face_sum(mesh, ssf)
        .into_iter()
        .zip(&geo.cell_volumes)
        .map(|(s, &v)| s / v)
        .collect();
    GeometricField::extrapolated(
        format!("surfaceIntegrate({})", ssf.name()),
        mesh,
        ssf.dimensions() / DIM_VOLUME,
        values,
    )
}

/// Divergence of a face field already holding face fluxes.
pub fn div_flux<T: FieldValue>(ssf: &SurfaceField<T>, mesh: &FvMesh) -> Result<GeometricField<T>> {
    let mut div = surface_integrate(ssf, mesh)?;
    div.rename(format!("div({})", ssf.name()));
    Ok(div)
}

/// `Σ_c V_c ψ_c` over every domain.
pub fn domain_integrate<T: FieldValue>(
    vf: &GeometricField<T>,
    mesh: &FvMesh,
) -> Result<Dimensioned<T>> {
    vf.check_mesh(mesh)?;
    let geo = mesh.geometry();
    let weighted: Field<T> = vf
        .internal()
        .iter()
        .zip(&geo.cell_volumes)
        .map(|(&v, &vol)| v * vol)
        .collect();
    Ok(Dimensioned::new(
        format!("domainIntegrate({})", vf.name()),
        vf.dimensions() * DIM_VOLUME,
        weighted.gsum(mesh.comm())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{HexBlock, line_mesh};
    use crate::types::{DIM_AREA, DIM_VELOCITY, DIMLESS};

    const TOL: f64 = 1e-12;

    #[test]
    fn test_uniform_flux_is_divergence_free_inside() {
        let mesh = line_mesh(5, 1.0).unwrap();
        let phi = SurfaceField::uniform("phi", &mesh, DIM_VELOCITY * DIM_AREA, 1.0);
        let div = div_flux(&phi, &mesh).unwrap();
        assert_eq!(div.name(), "div(phi)");
        for c in 1..4 {
            assert!(div.internal()[c].abs() < TOL);
        }
        // A uniform value is outward on the left patch face and on face 0.
        let v = mesh.volumes()[0];
        assert!((div.internal()[0] - 2.0 / v).abs() < TOL);
        assert!(div.internal()[4].abs() < TOL);
    }

    #[test]
    fn test_face_sums() {
        let mesh = HexBlock::new(2, 2, 2).build().unwrap();
        let geo = mesh.geometry();
        let sf = SurfaceField::from_face_values("Sf", &mesh, DIM_AREA, &geo.face_areas).unwrap();
        // Closed cells: outward areas cancel.
        for v in face_sum(&mesh, &sf) {
            assert!(v.x.abs() < TOL && v.y.abs() < TOL && v.z.abs() < TOL);
        }
        let ones = SurfaceField::uniform("one", &mesh, DIMLESS, 1.0);
        let count = surface_sum(&ones, &mesh).unwrap();
        assert!(count.internal().iter().all(|&n| (n - 6.0).abs() < TOL));
    }

    #[test]
    fn test_domain_integrate() {
        let mesh = HexBlock::new(2, 3, 2).size(2.0, 1.0, 1.0).build().unwrap();
        let t = GeometricField::uniform("T", &mesh, DIMLESS, 3.0, "zeroGradient").unwrap();
        let total = domain_integrate(&t, &mesh).unwrap();
        assert!((total.value - 6.0).abs() < TOL);
        assert_eq!(total.dimensions, DIM_VOLUME);
    }
}
