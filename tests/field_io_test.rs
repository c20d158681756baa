//! Writing a field to the ASCII format and reading it back.

use std::io::Write;

use fv_rs::boundary::{
    BoundaryConditionRegistry, FixedGradient, FixedValue, InletOutlet, Mixed, PatchValue,
    ZeroGradient,
};
use fv_rs::field::GeometricField;
use fv_rs::io::{read_field, read_field_string, write_field, write_field_string};
use fv_rs::mesh::{BlockSide, FvMesh, HexBlock, PatchKind};
use fv_rs::types::{DIM_PRESSURE, DIM_VELOCITY, FieldValue, Vector};
use tempfile::NamedTempFile;

fn mesh() -> FvMesh {
    HexBlock::new(3, 2, 2)
        .patch(BlockSide::Back, "symm", PatchKind::Symmetry)
        .cyclic(BlockSide::Bottom, BlockSide::Top)
        .build()
        .unwrap()
}

fn assert_same_bits<T: FieldValue + std::fmt::Debug>(a: &GeometricField<T>, b: &GeometricField<T>) {
    assert_eq!(a.name(), b.name());
    assert_eq!(a.dimensions(), b.dimensions());
    let bits = |values: &[T]| -> Vec<u64> {
        values
            .iter()
            .flat_map(|v| (0..T::N_COMPONENTS).map(move |c| v.component(c).to_bits()))
            .collect()
    };
    assert_eq!(bits(a.internal()), bits(b.internal()));
    for (pa, pb) in a.boundary_field().iter().zip(b.boundary_field().iter()) {
        assert_eq!(pa.type_name(), pb.type_name());
        assert_eq!(bits(pa.values()), bits(pb.values()), "patch type {}", pa.type_name());
    }
}

#[test]
fn test_scalar_field_round_trip_is_exact() {
    let mesh = mesh();
    let geo = mesh.geometry();
    let right = mesh.patch_by_name("right").unwrap();
    let right_values: Vec<f64> = mesh
        .patch(right)
        .faces()
        .map(|f| 1.0 / 3.0 + geo.face_centres[f].y * std::f64::consts::PI)
        .collect();

    let p: GeometricField<f64> = GeometricField::builder("p", DIM_PRESSURE)
        .internal_from_centres(|c| (c.x * 7.1).exp() - 0.1 * c.y + 1e-17 * c.z)
        .default_condition(ZeroGradient)
        .patch("left", FixedGradient::uniform(-0.3))
        .patch("right", FixedValue::new(PatchValue::NonUniform(right_values)))
        .patch(
            "front",
            Mixed::new(
                PatchValue::Uniform(101325.0),
                PatchValue::Uniform(0.0),
                PatchValue::Uniform(0.25),
            ),
        )
        .build(&mesh)
        .unwrap();

    let file = NamedTempFile::new().unwrap();
    write_field(&p, &mesh, file.path()).unwrap();
    let registry = BoundaryConditionRegistry::<f64>::with_standard_conditions();
    let back = read_field::<f64>(file.path(), &mesh, &registry).unwrap();
    assert_same_bits(&p, &back);

    // Writing the read field reproduces the text.
    assert_eq!(
        write_field_string(&p, &mesh).unwrap(),
        write_field_string(&back, &mesh).unwrap()
    );
}

#[test]
fn test_vector_field_round_trip_is_exact() {
    let mesh = mesh();
    let u: GeometricField<Vector> = GeometricField::builder("U", DIM_VELOCITY)
        .internal_from_centres(|c| Vector::new(0.1 * c.x, -c.y / 3.0, c.z * c.z))
        .default_condition(ZeroGradient)
        .patch("left", FixedValue::uniform(Vector::new(1.0, 0.0, 0.0)))
        .patch("right", InletOutlet::new(PatchValue::Uniform(Vector::ZERO)))
        .build(&mesh)
        .unwrap();

    let text = write_field_string(&u, &mesh).unwrap();
    assert!(text.contains("class       volVectorField;"));
    assert!(text.contains("cyclic"));
    assert!(text.contains("symmetryPlane"));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    let registry = BoundaryConditionRegistry::<Vector>::with_standard_conditions();
    let back = read_field::<Vector>(file.path(), &mesh, &registry).unwrap();
    assert_same_bits(&u, &back);
}

#[test]
fn test_reading_with_the_wrong_rank_fails() {
    let mesh = mesh();
    let p = GeometricField::uniform("p", &mesh, DIM_PRESSURE, 1.0, "zeroGradient").unwrap();
    let text = write_field_string(&p, &mesh).unwrap();
    let registry = BoundaryConditionRegistry::<Vector>::with_standard_conditions();
    let err = read_field_string::<Vector>(&text, &mesh, &registry).unwrap_err();
    assert!(err.to_string().contains("volScalarField"), "{err}");
}

#[test]
fn test_signed_zeros_survive_a_round_trip() {
    let mesh = mesh();
    let p: GeometricField<f64> = GeometricField::builder("p", DIM_PRESSURE)
        .internal_from_centres(|c| if c.x > 0.5 { -0.0 } else { 0.0 })
        .default_condition(ZeroGradient)
        .patch(
            "left",
            FixedValue::new(PatchValue::NonUniform(vec![0.0, -0.0, 0.0, 0.0])),
        )
        .build(&mesh)
        .unwrap();

    let text = write_field_string(&p, &mesh).unwrap();
    assert!(!text.contains("internalField   uniform"), "{text}");
    let registry = BoundaryConditionRegistry::<f64>::with_standard_conditions();
    let back = read_field_string::<f64>(&text, &mesh, &registry).unwrap();
    assert_same_bits(&p, &back);
    assert!(back.internal().iter().any(|x| x.is_sign_negative()));
}
