//! ASCII persistence of geometric fields.
//!
//! Layout:
//!
//! ```text
//! FoamFile
//! {
//!     version     2.0;
//!     format      ascii;
//!     class       volScalarField;
//!     object      p;
//! }
//!
//! dimensions      [0 2 -2 0 0 0 0];
//!
//! internalField   uniform 0;
//!
//! boundaryField
//! {
//!     inlet
//!     {
//!         type            fixedValue;
//!         value           uniform 1;
//!     }
//! }
//! ```
//!
//! Scalars are written in shortest round-trip form, so a written field reads
//! back bit-for-bit. Conditions are rebuilt through a
//! [`BoundaryConditionRegistry`] from their written entries.

use std::fmt::Write as _;
use std::path::Path;

use super::dictionary::Dictionary;
use super::format::format_field;
use crate::boundary::BoundaryConditionRegistry;
use crate::error::{FvError, Result};
use crate::field::{BoundaryField, Field, GeometricField, PatchField};
use crate::mesh::FvMesh;
use crate::types::{DimensionSet, FieldValue, PatchIndex};

/// `volScalarField`, `volVectorField`, ...
pub fn field_class<T: FieldValue>() -> String {
    let mut chars = T::TYPE_NAME.chars();
    match chars.next() {
        Some(first) => format!("vol{}{}Field", first.to_ascii_uppercase(), chars.as_str()),
        None => "volField".to_string(),
    }
}

/// Render a field in the ASCII field-file layout.
pub fn write_field_string<T: FieldValue>(field: &GeometricField<T>, mesh: &FvMesh) -> Result<String> {
    field.check_mesh(mesh)?;
    let mut out = String::new();
    // fmt::Write into a String cannot fail
    let _ = writeln!(out, "FoamFile\n{{");
    let _ = writeln!(out, "    version     2.0;");
    let _ = writeln!(out, "    format      ascii;");
    let _ = writeln!(out, "    class       {};", field_class::<T>());
    let _ = writeln!(out, "    object      {};", field.name());
    let _ = writeln!(out, "}}\n");
    let _ = writeln!(out, "dimensions      {};\n", field.dimensions());
    let _ = writeln!(out, "internalField   {};\n", format_field(field.internal()));
    let _ = writeln!(out, "boundaryField\n{{");
    for (patch, pf) in mesh.patches().iter().zip(field.boundary_field().iter()) {
        let _ = writeln!(out, "    {}\n    {{", patch.name);
        let _ = writeln!(out, "        type            {};", pf.type_name());
        for (key, value) in pf.condition().write_entries(pf.values()) {
            let _ = writeln!(out, "        {key:<15} {value};");
        }
        let _ = writeln!(out, "    }}");
    }
    let _ = writeln!(out, "}}");
    Ok(out)
}

/// Write a field file to `path`.
pub fn write_field<T: FieldValue>(
    field: &GeometricField<T>,
    mesh: &FvMesh,
    path: impl AsRef<Path>,
) -> Result<()> {
    let text = write_field_string(field, mesh)?;
    std::fs::write(path.as_ref(), text)?;
    log::info!("Wrote field '{}' to {}", field.name(), path.as_ref().display());
    Ok(())
}

/// Parse a field from text, building conditions through `registry`.
pub fn read_field_string<T: FieldValue>(
    text: &str,
    mesh: &FvMesh,
    registry: &BoundaryConditionRegistry<T>,
) -> Result<GeometricField<T>> {
    let dict = Dictionary::parse(text)?;

    let header = dict.sub_dict("FoamFile")?;
    let class = header.word("class")?;
    if class != field_class::<T>() {
        return Err(FvError::WrongType {
            name: header.word("object").unwrap_or_default(),
            expected: field_class::<T>(),
            actual: class,
        });
    }
    let name = header.word("object")?;

    let (dim_tokens, dim_line) = dict.stream("dimensions")?;
    let dim_text = dim_tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let dimensions: DimensionSet = dim_text
        .parse()
        .map_err(|e: FvError| FvError::parse(dim_line, e.to_string()))?;

    let internal = Field::new(dict.field::<T>("internalField", mesh.n_cells())?);

    let boundary_dict = dict.sub_dict("boundaryField")?;
    let mut patches = Vec::with_capacity(mesh.patches().len());
    for (i, patch) in mesh.patches().iter().enumerate() {
        let entries = boundary_dict
            .sub_dict(&patch.name)
            .map_err(|_| FvError::not_found("boundaryField entry for patch", &patch.name))?;
        let type_name = entries.word("type")?;
        let condition = registry.create(&type_name, patch, entries)?;
        let values: Field<T> = if entries.contains("value") {
            Field::new(entries.field::<T>("value", patch.size)?)
        } else {
            mesh.face_cells(PatchIndex::new(i))
                .iter()
                .map(|&c| internal[c])
                .collect()
        };
        patches.push(PatchField::new(values, condition));
    }

    log::debug!("Read field '{name}' ({})", field_class::<T>());
    GeometricField::new(name, mesh, dimensions, internal, BoundaryField::new(patches))
}

/// Read a field file from `path`.
pub fn read_field<T: FieldValue>(
    path: impl AsRef<Path>,
    mesh: &FvMesh,
    registry: &BoundaryConditionRegistry<T>,
) -> Result<GeometricField<T>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    read_field_string(&text, mesh, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{FixedValue, Mixed, PatchValue};
    use crate::mesh::{BlockSide, HexBlock, PatchKind};
    use crate::types::{DIM_VELOCITY, DIMLESS, Vector};

    #[test]
    fn test_class_names() {
        assert_eq!(field_class::<f64>(), "volScalarField");
        assert_eq!(field_class::<Vector>(), "volVectorField");
        assert_eq!(field_class::<crate::types::SymmTensor>(), "volSymmTensorField");
    }

    #[test]
    fn test_string_round_trip_with_mixed_condition() {
        let mesh = HexBlock::new(3, 1, 1)
            .patch(BlockSide::Back, "frontAndBack", PatchKind::Empty)
            .patch(BlockSide::Front, "frontAndBack", PatchKind::Empty)
            .build()
            .unwrap();
        let u = GeometricField::<Vector>::builder("U", DIM_VELOCITY)
            .internal_from_centres(|c| Vector::new(c.x / 3.0, 0.1, 0.0))
            .patch("left", FixedValue::uniform(Vector::new(1.0, 0.0, 0.0)))
            .patch(
                "right",
                Mixed::new(
                    PatchValue::Uniform(Vector::Y),
                    PatchValue::Uniform(Vector::ZERO),
                    PatchValue::Uniform(0.25),
                ),
            )
            .build(&mesh)
            .unwrap();
        let text = write_field_string(&u, &mesh).unwrap();
        assert!(text.contains("class       volVectorField;"));
        assert!(text.contains("type            empty;"));

        let registry = BoundaryConditionRegistry::<Vector>::with_standard_conditions();
        let back = read_field_string(&text, &mesh, &registry).unwrap();
        assert_eq!(back.name(), "U");
        assert_eq!(back.dimensions(), DIM_VELOCITY);
        assert_eq!(back.internal(), u.internal());
        for (a, b) in back.boundary_field().iter().zip(u.boundary_field().iter()) {
            assert_eq!(a.type_name(), b.type_name());
            assert_eq!(a.values(), b.values());
        }
    }

    #[test]
    fn test_wrong_class_is_rejected() {
        let mesh = HexBlock::new(2, 1, 1).build().unwrap();
        let p = GeometricField::<f64>::uniform("p", &mesh, DIMLESS, 0.0, "zeroGradient").unwrap();
        let text = write_field_string(&p, &mesh).unwrap();
        let registry = BoundaryConditionRegistry::<Vector>::with_standard_conditions();
        assert!(matches!(
            read_field_string::<Vector>(&text, &mesh, &registry),
            Err(FvError::WrongType { .. })
        ));
    }

    #[test]
    fn test_missing_patch_entry() {
        let mesh = HexBlock::new(2, 1, 1).build().unwrap();
        let text = "FoamFile { class volScalarField; object T; }\n\
                    dimensions [0 0 0 1 0 0 0];\n\
                    internalField uniform 300;\n\
                    boundaryField { left { type zeroGradient; } }";
        let registry = BoundaryConditionRegistry::<f64>::with_standard_conditions();
        assert!(matches!(
            read_field_string::<f64>(text, &mesh, &registry),
            Err(FvError::NotFound { .. })
        ));
    }
}
