//! Implicit and explicit volume sources.

use crate::error::{FvError, Result};
use crate::field::{GeometricField, VolScalarField};
use crate::matrix::FvMatrix;
use crate::mesh::FvMesh;
use crate::types::{DIM_VOLUME, Dimensioned, FieldValue};

fn check_cells<V: FieldValue>(field: &GeometricField<V>, mesh: &FvMesh) -> Result<()> {
    if field.internal().len() != mesh.n_cells() {
        return Err(FvError::size_mismatch(
            format!("source '{}'", field.name()),
            mesh.n_cells(),
            field.internal().len(),
        ));
    }
    Ok(())
}

/// Implicit source `sp ψ`: `diag += V sp`.
pub fn sp<T: FieldValue>(
    coeff: &VolScalarField,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
) -> Result<FvMatrix<T>> {
    check_cells(coeff, mesh)?;
    let mut fvm = FvMatrix::new(psi, mesh, DIM_VOLUME * coeff.dimensions() * psi.dimensions())?;
    let geo = mesh.geometry();
    for ((d, &s), &v) in fvm
        .ldu_mut()
        .diag_mut()
        .iter_mut()
        .zip(coeff.internal().iter())
        .zip(&geo.cell_volumes)
    {
        *d += v * s;
    }
    Ok(fvm)
}

/// Implicit source with a uniform coefficient.
pub fn sp_uniform<T: FieldValue>(
    coeff: &Dimensioned<f64>,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
) -> Result<FvMatrix<T>> {
    let mut fvm = FvMatrix::new(psi, mesh, DIM_VOLUME * coeff.dimensions * psi.dimensions())?;
    let geo = mesh.geometry();
    for (d, &v) in fvm.ldu_mut().diag_mut().iter_mut().zip(&geo.cell_volumes) {
        *d += v * coeff.value;
    }
    Ok(fvm)
}

/// Explicit source `su` on the left-hand side: `source -= V su`.
pub fn su<T: FieldValue>(
    su: &GeometricField<T>,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
) -> Result<FvMatrix<T>> {
    check_cells(su, mesh)?;
    let mut fvm = FvMatrix::new(psi, mesh, DIM_VOLUME * su.dimensions())?;
    let geo = mesh.geometry();
    for ((s, &value), &v) in fvm
        .source_mut()
        .iter_mut()
        .zip(su.internal().iter())
        .zip(&geo.cell_volumes)
    {
        *s -= value * v;
    }
    Ok(fvm)
}

/// Source `susp ψ`, implicit where `susp > 0` and explicit where it is
/// negative, keeping the diagonal from losing dominance.
pub fn susp<T: FieldValue>(
    coeff: &VolScalarField,
    psi: &GeometricField<T>,
    mesh: &FvMesh,
) -> Result<FvMatrix<T>> {
    check_cells(coeff, mesh)?;
    let mut fvm = FvMatrix::new(psi, mesh, DIM_VOLUME * coeff.dimensions() * psi.dimensions())?;
    let geo = mesh.geometry();
    for (c, &s) in coeff.internal().iter().enumerate() {
        let v = geo.cell_volumes[c];
        fvm.ldu_mut().diag_mut()[c] += v * s.max(0.0);
        fvm.source_mut()[c] -= psi.internal()[c] * (v * s.min(0.0));
    }
    Ok(fvm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ZeroGradient;
    use crate::linear_solver::SolverControls;
    use crate::mesh::line_mesh;
    use crate::types::{DIM_TIME, DIMLESS};

    const TOL: f64 = 1e-12;

    fn field(mesh: &FvMesh, name: &str, values: Vec<f64>) -> GeometricField<f64> {
        GeometricField::builder(name, DIMLESS / DIM_TIME)
            .internal_values(values)
            .default_condition(ZeroGradient)
            .build(mesh)
            .unwrap()
    }

    #[test]
    fn test_sp_and_su() {
        let mesh = line_mesh(4, 1.0).unwrap();
        let mut t: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
            .internal_uniform(0.0)
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let k = field(&mesh, "k", vec![2.0; 4]);
        let s = field(&mesh, "S", vec![4.0, 8.0, 2.0, 6.0]);

        let implicit = sp(&k, &t, &mesh).unwrap();
        assert!(implicit.diag().iter().all(|d| (d - 0.5).abs() < TOL));
        let explicit = su(&s, &t, &mesh).unwrap();
        assert!((explicit.source()[1] + 2.0).abs() < TOL);
        assert_eq!(implicit.dimensions(), explicit.dimensions());

        // k T == S
        let eqn = implicit.equate(explicit).unwrap();
        eqn.solve(&mut t, &mesh, &SolverControls::diagonal()).unwrap();
        for (v, s) in t.internal().iter().zip([4.0, 8.0, 2.0, 6.0]) {
            assert!((v - s / 2.0).abs() < TOL);
        }
    }

    #[test]
    fn test_susp_splits_by_sign() {
        let mesh = line_mesh(2, 1.0).unwrap();
        let t: GeometricField<f64> = GeometricField::builder("T", DIMLESS)
            .internal_values(vec![3.0, 3.0])
            .default_condition(ZeroGradient)
            .build(&mesh)
            .unwrap();
        let coeff = field(&mesh, "c", vec![2.0, -2.0]);
        let m = susp(&coeff, &t, &mesh).unwrap();
        // V = 0.5
        assert!((m.diag()[0] - 1.0).abs() < TOL);
        assert!(m.source()[0].abs() < TOL);
        assert!(m.diag()[1].abs() < TOL);
        assert!((m.source()[1] - 3.0).abs() < TOL);
    }

    #[test]
    fn test_uniform_coefficient() {
        let mesh = line_mesh(5, 1.0).unwrap();
        let t = GeometricField::uniform("T", &mesh, DIMLESS, 1.0, "zeroGradient").unwrap();
        let m = sp_uniform(&Dimensioned::new("lambda", DIMLESS / DIM_TIME, 10.0), &t, &mesh).unwrap();
        assert!(m.diag().iter().all(|d| (d - 2.0).abs() < TOL));
        assert_eq!(m.dimensions(), DIM_VOLUME / DIM_TIME);
    }
}
