//! Face-centred fields.
//!
//! Values for internal faces are stored in face order; boundary values are
//! stored per patch. Because patches are contiguous face blocks in patch
//! order, [`SurfaceField::face_values`] concatenates them into an array that
//! face labels index directly.

use super::field::Field;
use crate::error::{FvError, Result};
use crate::mesh::FvMesh;
use crate::types::{DimensionSet, FieldValue, PatchIndex};

/// One value per mesh face.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceField<T> {
    name: String,
    dimensions: DimensionSet,
    internal: Field<T>,
    boundary: Vec<Field<T>>,
}

impl<T: FieldValue> SurfaceField<T> {
    pub fn new(
        name: impl Into<String>,
        dimensions: DimensionSet,
        internal: Field<T>,
        boundary: Vec<Field<T>>,
    ) -> Self {
        Self {
            name: name.into(),
            dimensions,
            internal,
            boundary,
        }
    }

    /// Field with every face set to `value`.
    pub fn uniform(name: impl Into<String>, mesh: &FvMesh, dimensions: DimensionSet, value: T) -> Self {
        Self::new(
            name,
            dimensions,
            Field::uniform(mesh.n_internal_faces(), value),
            mesh.patches()
                .iter()
                .map(|p| Field::uniform(p.size, value))
                .collect(),
        )
    }

    pub fn zeros(name: impl Into<String>, mesh: &FvMesh, dimensions: DimensionSet) -> Self {
        Self::uniform(name, mesh, dimensions, T::zero())
    }

    /// Split an all-faces array into internal and patch parts.
    pub fn from_face_values(
        name: impl Into<String>,
        mesh: &FvMesh,
        dimensions: DimensionSet,
        values: &[T],
    ) -> Result<Self> {
        if values.len() != mesh.n_faces() {
            return Err(FvError::size_mismatch("face values", mesh.n_faces(), values.len()));
        }
        Ok(Self::new(
            name,
            dimensions,
            Field::new(values[..mesh.n_internal_faces()].to_vec()),
            mesh.patches()
                .iter()
                .map(|p| Field::new(values[p.faces()].to_vec()))
                .collect(),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    pub fn internal(&self) -> &Field<T> {
        &self.internal
    }

    pub fn internal_mut(&mut self) -> &mut Field<T> {
        &mut self.internal
    }

    /// Per-patch values.
    pub fn boundary(&self) -> &[Field<T>] {
        &self.boundary
    }

    pub fn boundary_mut(&mut self) -> &mut [Field<T>] {
        &mut self.boundary
    }

    /// Values of one patch.
    pub fn patch(&self, patch: PatchIndex) -> &[T] {
        &self.boundary[patch.get()]
    }

    /// All face values in face-label order.
    pub fn face_values(&self) -> Vec<T> {
        let n = self.internal.len() + self.boundary.iter().map(|b| b.len()).sum::<usize>();
        let mut out = Vec::with_capacity(n);
        out.extend_from_slice(&self.internal);
        for b in &self.boundary {
            out.extend_from_slice(b);
        }
        out
    }

    /// Check sizes against a mesh.
    pub fn check_mesh(&self, mesh: &FvMesh) -> Result<()> {
        if self.internal.len() != mesh.n_internal_faces() {
            return Err(FvError::size_mismatch(
                format!("internal faces of surface field '{}'", self.name),
                mesh.n_internal_faces(),
                self.internal.len(),
            ));
        }
        if self.boundary.len() != mesh.patches().len() {
            return Err(FvError::size_mismatch(
                format!("patches of surface field '{}'", self.name),
                mesh.patches().len(),
                self.boundary.len(),
            ));
        }
        for (b, p) in self.boundary.iter().zip(mesh.patches()) {
            if b.len() != p.size {
                return Err(FvError::size_mismatch(
                    format!("patch '{}' of surface field '{}'", p.name, self.name),
                    p.size,
                    b.len(),
                ));
            }
        }
        Ok(())
    }

    /// Element-wise map into a new surface field.
    pub fn map<U: FieldValue>(
        &self,
        name: impl Into<String>,
        dimensions: DimensionSet,
        f: impl Fn(T) -> U,
    ) -> SurfaceField<U> {
        SurfaceField::new(
            name,
            dimensions,
            self.internal.map(&f),
            self.boundary.iter().map(|b| b.map(&f)).collect(),
        )
    }

    /// Multiply face-wise by a scalar surface field; dimensions multiply.
    pub fn scaled_by(&self, s: &SurfaceField<f64>) -> Result<SurfaceField<T>> {
        let mut out = self.clone();
        out.internal.scale_by(&s.internal)?;
        if out.boundary.len() != s.boundary.len() {
            return Err(FvError::size_mismatch(
                "patches of scaling field",
                out.boundary.len(),
                s.boundary.len(),
            ));
        }
        for (b, sb) in out.boundary.iter_mut().zip(&s.boundary) {
            b.scale_by(sb)?;
        }
        out.dimensions = self.dimensions * s.dimensions;
        out.name = format!("({}*{})", s.name, self.name);
        Ok(out)
    }

    /// Add another surface field with the same dimensions.
    pub fn try_add(&self, other: &SurfaceField<T>) -> Result<SurfaceField<T>> {
        self.dimensions.check_same("surface field +", &other.dimensions)?;
        let internal = self.internal.zip_map(&other.internal, |a, b| a + b)?;
        let boundary = self
            .boundary
            .iter()
            .zip(&other.boundary)
            .map(|(a, b)| a.zip_map(b, |x, y| x + y))
            .collect::<Result<Vec<_>>>()?;
        Ok(SurfaceField::new(
            format!("({}+{})", self.name, other.name),
            self.dimensions,
            internal,
            boundary,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::HexBlock;
    use crate::types::{DIM_LENGTH, DIMLESS};

    #[test]
    fn test_face_value_layout() {
        let mesh = HexBlock::new(2, 1, 1).build().unwrap();
        let values: Vec<f64> = (0..mesh.n_faces()).map(|f| f as f64).collect();
        let sf = SurfaceField::from_face_values("x", &mesh, DIMLESS, &values).unwrap();
        sf.check_mesh(&mesh).unwrap();
        assert_eq!(sf.internal().len(), 1);
        let right = mesh.patch_by_name("right").unwrap();
        assert_eq!(sf.patch(right)[0], mesh.patch(right).start as f64);
        assert_eq!(sf.face_values(), values);
    }

    #[test]
    fn test_dimension_checked_sum() {
        let mesh = HexBlock::new(2, 1, 1).build().unwrap();
        let a = SurfaceField::uniform("a", &mesh, DIM_LENGTH, 1.0);
        let b = SurfaceField::uniform("b", &mesh, DIMLESS, 1.0);
        assert!(matches!(a.try_add(&b), Err(FvError::DimensionMismatch { .. })));
        let c = a.try_add(&a).unwrap();
        assert_eq!(c.internal()[0], 2.0);
        let s = a.scaled_by(&b).unwrap();
        assert_eq!(s.dimensions(), DIM_LENGTH);
    }
}
