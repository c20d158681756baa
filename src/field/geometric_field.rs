//! Cell-centred fields bound to a mesh and to per-patch boundary conditions.
//!
//! A [`GeometricField`] owns:
//! - the internal field (one value per cell)
//! - a [`BoundaryField`]: one [`PatchField`] per mesh patch, each holding the
//!   face values and the boxed condition that produces them
//! - up to two previous time levels for time-derivative schemes
//!
//! The field does not hold a reference to its mesh. Every operation that
//! needs geometry takes `&FvMesh`, and [`GeometricField::check_mesh`] verifies
//! that the sizes still agree.

use std::ops::{Index, IndexMut};

use super::field::Field;
use super::surface_field::SurfaceField;
use crate::boundary::{
    BoundaryCondition, BoundaryConditionRegistry, PatchContext, ZeroGradient, constraint_condition,
};
use crate::error::{FvError, Result};
use crate::io::Dictionary;
use crate::io::format::format_value;
use crate::mesh::{FvMesh, MeshGeometry, MeshMapper, map_values};
use crate::parallel::{ReduceOp, global_max};
use crate::types::{DimensionSet, FieldValue, PatchIndex, Vector};

// =============================================================================
// Patch and boundary fields
// =============================================================================

/// Face values of one patch plus the condition that owns them.
#[derive(Clone, Debug)]
pub struct PatchField<T: FieldValue> {
    values: Field<T>,
    condition: Box<dyn BoundaryCondition<T>>,
    updated: bool,
}

impl<T: FieldValue> PatchField<T> {
    pub fn new(values: Field<T>, condition: Box<dyn BoundaryCondition<T>>) -> Self {
        Self {
            values,
            condition,
            updated: false,
        }
    }

    pub fn values(&self) -> &Field<T> {
        &self.values
    }

    /// Direct access to the face values, bypassing the condition.
    pub fn values_mut(&mut self) -> &mut Field<T> {
        &mut self.values
    }

    /// Plain assignment; ignored by conditions that prescribe their values.
    pub fn assign(&mut self, values: &[T]) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(FvError::size_mismatch(
                "patch assignment",
                self.values.len(),
                values.len(),
            ));
        }
        if self.condition.assignable() {
            self.values.copy_from_slice(values);
        }
        Ok(())
    }

    /// Forced assignment: also overwrites prescribed data.
    pub fn force_assign(&mut self, values: &[T]) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(FvError::size_mismatch(
                "patch assignment",
                self.values.len(),
                values.len(),
            ));
        }
        self.values.copy_from_slice(values);
        self.condition.force_assign(values);
        Ok(())
    }

    pub fn condition(&self) -> &dyn BoundaryCondition<T> {
        self.condition.as_ref()
    }

    pub fn condition_mut(&mut self) -> &mut dyn BoundaryCondition<T> {
        self.condition.as_mut()
    }

    /// Replace the condition; face values are kept until the next correction.
    pub fn set_condition(&mut self, condition: Box<dyn BoundaryCondition<T>>) {
        self.condition = condition;
        self.updated = false;
    }

    pub fn type_name(&self) -> &'static str {
        self.condition.type_name()
    }

    /// Whether `update_coeffs` already ran for the pending evaluation.
    pub fn updated(&self) -> bool {
        self.updated
    }

    pub fn is_coupled(&self) -> bool {
        self.condition.is_coupled()
    }
}

/// All patch fields of a geometric field, in mesh patch order.
#[derive(Clone, Debug)]
pub struct BoundaryField<T: FieldValue> {
    patches: Vec<PatchField<T>>,
}

impl<T: FieldValue> BoundaryField<T> {
    pub fn new(patches: Vec<PatchField<T>>) -> Self {
        Self { patches }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchField<T>> {
        self.patches.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, PatchField<T>> {
        self.patches.iter_mut()
    }

    /// Face values of every patch, in patch order.
    pub fn values(&self) -> Vec<&[T]> {
        self.patches.iter().map(|p| p.values.as_slice()).collect()
    }
}

impl<T: FieldValue> Index<PatchIndex> for BoundaryField<T> {
    type Output = PatchField<T>;

    fn index(&self, patch: PatchIndex) -> &PatchField<T> {
        &self.patches[patch.get()]
    }
}

impl<T: FieldValue> IndexMut<PatchIndex> for BoundaryField<T> {
    fn index_mut(&mut self, patch: PatchIndex) -> &mut PatchField<T> {
        &mut self.patches[patch.get()]
    }
}

impl<T: FieldValue> Index<usize> for BoundaryField<T> {
    type Output = PatchField<T>;

    fn index(&self, patch: usize) -> &PatchField<T> {
        &self.patches[patch]
    }
}

impl<T: FieldValue> IndexMut<usize> for BoundaryField<T> {
    fn index_mut(&mut self, patch: usize) -> &mut PatchField<T> {
        &mut self.patches[patch]
    }
}

// =============================================================================
// Geometric field
// =============================================================================

/// Cell values, boundary conditions and time history of one named quantity.
#[derive(Clone, Debug)]
pub struct GeometricField<T: FieldValue> {
    name: String,
    dimensions: DimensionSet,
    internal: Field<T>,
    boundary: BoundaryField<T>,
    time_index: usize,
    old_time: Option<Box<GeometricField<T>>>,
}

impl<T: FieldValue> GeometricField<T> {
    /// Assemble a field from parts, checking sizes against the mesh.
    ///
    /// Boundary values are evaluated before returning.
    pub fn new(
        name: impl Into<String>,
        mesh: &FvMesh,
        dimensions: DimensionSet,
        internal: Field<T>,
        boundary: BoundaryField<T>,
    ) -> Result<Self> {
        let mut field = Self {
            name: name.into(),
            dimensions,
            internal,
            boundary,
            time_index: 0,
            old_time: None,
        };
        field.check_mesh(mesh)?;
        field.correct_boundary_conditions(mesh)?;
        Ok(field)
    }

    /// Field with the given internal values and one condition per patch.
    ///
    /// Initial face values are the adjacent cell values; the conditions then
    /// overwrite them during the first correction.
    pub fn with_conditions(
        name: impl Into<String>,
        mesh: &FvMesh,
        dimensions: DimensionSet,
        internal: Field<T>,
        conditions: Vec<Box<dyn BoundaryCondition<T>>>,
    ) -> Result<Self> {
        if internal.len() != mesh.n_cells() {
            return Err(FvError::size_mismatch("internal field", mesh.n_cells(), internal.len()));
        }
        if conditions.len() != mesh.patches().len() {
            return Err(FvError::size_mismatch(
                "boundary conditions",
                mesh.patches().len(),
                conditions.len(),
            ));
        }
        let patches = conditions
            .into_iter()
            .enumerate()
            .map(|(i, bc)| {
                let values = mesh
                    .face_cells(PatchIndex::new(i))
                    .iter()
                    .map(|&c| internal[c])
                    .collect();
                PatchField::new(values, bc)
            })
            .collect();
        Self::new(name, mesh, dimensions, internal, BoundaryField::new(patches))
    }

    /// Uniform field with the same condition type on every unconstrained patch.
    ///
    /// The condition is created through the standard registry with `value`
    /// (and matching `inletValue`/`refValue` entries) set to `value`.
    pub fn uniform(
        name: impl Into<String>,
        mesh: &FvMesh,
        dimensions: DimensionSet,
        value: T,
        patch_type: &str,
    ) -> Result<Self> {
        let registry = BoundaryConditionRegistry::<T>::with_standard_conditions();
        let v = format!("uniform {}", format_value(&value));
        let zero = format!("uniform {}", format_value(&T::zero()));
        let dict = Dictionary::from_pairs(&[
            ("value", v.as_str()),
            ("inletValue", v.as_str()),
            ("refValue", v.as_str()),
            ("gradient", zero.as_str()),
            ("refGradient", zero.as_str()),
            ("valueFraction", "uniform 1"),
        ])?;
        let conditions = mesh
            .patches()
            .iter()
            .map(|p| registry.create(patch_type, p, &dict))
            .collect::<Result<Vec<_>>>()?;
        Self::with_conditions(
            name,
            mesh,
            dimensions,
            Field::uniform(mesh.n_cells(), value),
            conditions,
        )
    }

    /// Result field of an explicit operation: `calculated` on every
    /// unconstrained patch, face values given explicitly.
    pub fn calculated(
        name: impl Into<String>,
        mesh: &FvMesh,
        dimensions: DimensionSet,
        internal: Field<T>,
        patch_values: Vec<Field<T>>,
    ) -> Result<Self> {
        if patch_values.len() != mesh.patches().len() {
            return Err(FvError::size_mismatch(
                "calculated patch values",
                mesh.patches().len(),
                patch_values.len(),
            ));
        }
        let patches = mesh
            .patches()
            .iter()
            .zip(patch_values)
            .map(|(p, values)| {
                let bc = constraint_condition::<T>(p)
                    .unwrap_or_else(|| Box::new(crate::boundary::Calculated));
                PatchField::new(values, bc)
            })
            .collect();
        let field = Self {
            name: name.into(),
            dimensions,
            internal,
            boundary: BoundaryField::new(patches),
            time_index: 0,
            old_time: None,
        };
        field.check_mesh(mesh)?;
        Ok(field)
    }

    /// `calculated` field from cell values, patch values copied from the
    /// adjacent cells. Coupled and constrained patches evaluate their own.
    pub fn extrapolated(
        name: impl Into<String>,
        mesh: &FvMesh,
        dimensions: DimensionSet,
        internal: Field<T>,
    ) -> Result<Self> {
        let patch_values = (0..mesh.patches().len())
            .map(|i| {
                mesh.face_cells(PatchIndex::new(i))
                    .iter()
                    .map(|&c| internal[c])
                    .collect()
            })
            .collect();
        let mut field = Self::calculated(name, mesh, dimensions, internal, patch_values)?;
        field.correct_boundary_conditions(mesh)?;
        Ok(field)
    }

    /// Start a builder for a field on `mesh`.
    pub fn builder(name: impl Into<String>, dimensions: DimensionSet) -> GeometricFieldBuilder<T> {
        GeometricFieldBuilder::new(name, dimensions)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

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

    /// Mutable cell values. Boundary values are stale until the next
    /// [`correct_boundary_conditions`](Self::correct_boundary_conditions).
    pub fn internal_mut(&mut self) -> &mut Field<T> {
        &mut self.internal
    }

    pub fn boundary_field(&self) -> &BoundaryField<T> {
        &self.boundary
    }

    pub fn boundary_field_mut(&mut self) -> &mut BoundaryField<T> {
        &mut self.boundary
    }

    /// Face values of one patch.
    pub fn patch_values(&self, patch: PatchIndex) -> &[T] {
        &self.boundary[patch].values
    }

    pub fn time_index(&self) -> usize {
        self.time_index
    }

    // =========================================================================
    // Boundary evaluation
    // =========================================================================

    /// Context for evaluating patch `patch` of this field.
    pub fn patch_context<'a>(
        &'a self,
        mesh: &'a FvMesh,
        geometry: &'a MeshGeometry,
        patch: PatchIndex,
    ) -> PatchContext<'a, T> {
        PatchContext::new(mesh, geometry, patch, &self.internal)
    }

    /// Re-evaluate every patch from the current internal values.
    pub fn correct_boundary_conditions(&mut self, mesh: &FvMesh) -> Result<()> {
        self.correct_boundary_conditions_with_flux(mesh, None)
    }

    /// As [`correct_boundary_conditions`](Self::correct_boundary_conditions),
    /// passing a face flux to flux-dependent conditions.
    pub fn correct_boundary_conditions_with_flux(
        &mut self,
        mesh: &FvMesh,
        flux: Option<&SurfaceField<f64>>,
    ) -> Result<()> {
        self.check_mesh(mesh)?;
        let geo = mesh.geometry();
        let internal = &self.internal;
        for patch in mesh.patch_exchange_order() {
            let pf = &mut self.boundary.patches[patch.get()];
            let ctx = PatchContext::new(mesh, &geo, patch, internal)
                .with_flux(flux.map(|phi| phi.patch(patch)));
            if !pf.updated {
                pf.condition.update_coeffs(&ctx)?;
            }
            pf.condition.evaluate(&ctx, &mut pf.values)?;
            pf.updated = false;
        }
        Ok(())
    }

    /// Run `update_coeffs` on every patch and mark them updated.
    ///
    /// Done before matrix assembly so the coefficients see the same state the
    /// following evaluation will.
    pub fn update_boundary_coeffs(
        &mut self,
        mesh: &FvMesh,
        flux: Option<&SurfaceField<f64>>,
    ) -> Result<()> {
        let geo = mesh.geometry();
        let internal = &self.internal;
        for (i, pf) in self.boundary.patches.iter_mut().enumerate() {
            if pf.updated {
                continue;
            }
            let patch = PatchIndex::new(i);
            let ctx = PatchContext::new(mesh, &geo, patch, internal)
                .with_flux(flux.map(|phi| phi.patch(patch)));
            pf.condition.update_coeffs(&ctx)?;
            pf.updated = true;
        }
        Ok(())
    }

    /// Cell values on the far side of a coupled patch.
    pub fn patch_neighbour_field(&self, mesh: &FvMesh, patch: PatchIndex) -> Result<Option<Vec<T>>> {
        let geo = mesh.geometry();
        let ctx = self.patch_context(mesh, &geo, patch);
        self.boundary[patch].condition.patch_neighbour_field(&ctx)
    }

    /// Face-normal gradient on one patch from the current face values.
    pub fn patch_sn_grad(&self, mesh: &FvMesh, patch: PatchIndex) -> Result<Vec<T>> {
        let geo = mesh.geometry();
        let ctx = self.patch_context(mesh, &geo, patch);
        let pf = &self.boundary[patch];
        pf.condition.sn_grad(&ctx, &pf.values)
    }

    /// Whether no patch on any domain pins the solution level.
    pub fn needs_reference(&self, mesh: &FvMesh) -> Result<bool> {
        let fixed = self.boundary.iter().any(|pf| pf.condition.fixes_value());
        let any_fixed = global_max(mesh.comm(), if fixed { 1.0 } else { 0.0 })?;
        Ok(any_fixed == 0.0)
    }

    // =========================================================================
    // Consistency and topology change
    // =========================================================================

    /// Verify internal and patch sizes against `mesh`.
    pub fn check_mesh(&self, mesh: &FvMesh) -> Result<()> {
        if self.internal.len() != mesh.n_cells() {
            return Err(FvError::size_mismatch(
                format!("internal field of '{}'", self.name),
                mesh.n_cells(),
                self.internal.len(),
            ));
        }
        if self.boundary.len() != mesh.patches().len() {
            return Err(FvError::size_mismatch(
                format!("boundary field of '{}'", self.name),
                mesh.patches().len(),
                self.boundary.len(),
            ));
        }
        for (pf, patch) in self.boundary.iter().zip(mesh.patches()) {
            if pf.values.len() != patch.size {
                return Err(FvError::size_mismatch(
                    format!("patch '{}' of field '{}'", patch.name, self.name),
                    patch.size,
                    pf.values.len(),
                ));
            }
        }
        Ok(())
    }

    /// Remap onto a new mesh after a topology change, then re-evaluate.
    ///
    /// Old time levels are mapped as well so time derivatives stay defined.
    pub fn auto_map(&mut self, mapper: &MeshMapper, new_mesh: &FvMesh) -> Result<()> {
        self.map_values(mapper)?;
        self.check_mesh(new_mesh)?;
        self.correct_boundary_conditions(new_mesh)
    }

    fn map_values(&mut self, mapper: &MeshMapper) -> Result<()> {
        if let Some(&bad) = mapper.cell_map.iter().find(|&&c| c >= self.internal.len()) {
            return Err(FvError::InvalidMesh(format!(
                "cell map of '{}' refers to cell {bad} of {}",
                self.name,
                self.internal.len()
            )));
        }
        if mapper.patch_face_maps.len() != self.boundary.len() {
            return Err(FvError::size_mismatch(
                format!("patch face maps for '{}'", self.name),
                self.boundary.len(),
                mapper.patch_face_maps.len(),
            ));
        }
        for (pf, map) in self.boundary.iter().zip(&mapper.patch_face_maps) {
            if map.iter().any(|&f| f >= pf.values.len()) {
                return Err(FvError::InvalidMesh(format!(
                    "face map of '{}' exceeds patch size {}",
                    self.name,
                    pf.values.len()
                )));
            }
        }

        self.internal = Field::new(map_values(&self.internal, &mapper.cell_map));
        for (pf, map) in self.boundary.iter_mut().zip(&mapper.patch_face_maps) {
            pf.values = Field::new(map_values(&pf.values, map));
            pf.condition.auto_map(map);
            pf.updated = false;
        }
        if let Some(old) = self.old_time.as_mut() {
            old.map_values(mapper)?;
        }
        Ok(())
    }

    // =========================================================================
    // Time levels
    // =========================================================================

    /// Snapshot the current values as the old time level when the time index
    /// has moved on. At most two previous levels are kept.
    pub fn store_old_times(&mut self, time_index: usize) {
        if time_index == self.time_index {
            return;
        }
        let previous = self.old_time.take().map(|mut old| {
            old.old_time = None;
            old.rename(format!("{}_0_0", self.name));
            old
        });
        let mut snapshot = self.clone();
        snapshot.rename(format!("{}_0", self.name));
        snapshot.old_time = previous;
        self.old_time = Some(Box::new(snapshot));
        self.time_index = time_index;
    }

    /// Previous time level, or the field itself before any step was stored.
    pub fn old_time(&self) -> &GeometricField<T> {
        self.old_time.as_deref().unwrap_or(self)
    }

    /// Time level before the previous one, falling back to the nearest stored level.
    pub fn old_old_time(&self) -> &GeometricField<T> {
        self.old_time().old_time()
    }

    /// Number of stored previous time levels.
    pub fn n_old_times(&self) -> usize {
        match &self.old_time {
            Some(old) => 1 + old.n_old_times(),
            None => 0,
        }
    }

    // =========================================================================
    // Reductions
    // =========================================================================

    /// Component-wise global minimum and maximum over cells and patch faces.
    pub fn max_min(&self, mesh: &FvMesh) -> Result<(T, T)> {
        let all: Field<T> = self
            .internal
            .iter()
            .chain(self.boundary.iter().flat_map(|pf| pf.values.iter()))
            .copied()
            .collect();
        let comm = mesh.comm();
        let mut lo = all.cmpt_min().unwrap_or_else(|| T::splat(f64::MAX));
        let mut hi = all.cmpt_max().unwrap_or_else(|| T::splat(f64::MIN));
        for c in 0..T::N_COMPONENTS {
            lo.set_component(c, comm.global_reduce(lo.component(c), ReduceOp::Min)?);
            hi.set_component(c, comm.global_reduce(hi.component(c), ReduceOp::Max)?);
        }
        Ok((lo, hi))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Step-by-step construction of a [`GeometricField`].
///
/// Patches not named explicitly get the default condition (`zeroGradient`
/// unless changed). Constrained patch kinds always get their own condition.
#[derive(Debug)]
pub struct GeometricFieldBuilder<T: FieldValue> {
    name: String,
    dimensions: DimensionSet,
    internal: InternalInit<T>,
    default_condition: Box<dyn BoundaryCondition<T>>,
    patches: Vec<(String, Box<dyn BoundaryCondition<T>>)>,
}

enum InternalInit<T> {
    Uniform(T),
    Values(Vec<T>),
    FromCentres(Box<dyn Fn(Vector) -> T>),
}

impl<T: std::fmt::Debug> std::fmt::Debug for InternalInit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternalInit::Uniform(v) => f.debug_tuple("Uniform").field(v).finish(),
            InternalInit::Values(v) => f.debug_tuple("Values").field(&v.len()).finish(),
            InternalInit::FromCentres(_) => f.write_str("FromCentres"),
        }
    }
}

impl<T: FieldValue> GeometricFieldBuilder<T> {
    pub fn new(name: impl Into<String>, dimensions: DimensionSet) -> Self {
        Self {
            name: name.into(),
            dimensions,
            internal: InternalInit::Uniform(T::zero()),
            default_condition: Box::new(ZeroGradient),
            patches: Vec::new(),
        }
    }

    /// Same value in every cell.
    pub fn internal_uniform(mut self, value: T) -> Self {
        self.internal = InternalInit::Uniform(value);
        self
    }

    /// Explicit cell values.
    pub fn internal_values(mut self, values: Vec<T>) -> Self {
        self.internal = InternalInit::Values(values);
        self
    }

    /// Cell values as a function of the cell centre.
    pub fn internal_from_centres(mut self, f: impl Fn(Vector) -> T + 'static) -> Self {
        self.internal = InternalInit::FromCentres(Box::new(f));
        self
    }

    /// Condition used for patches without an explicit entry.
    pub fn default_condition(mut self, bc: impl BoundaryCondition<T> + 'static) -> Self {
        self.default_condition = Box::new(bc);
        self
    }

    /// Condition for the patch called `name`.
    pub fn patch(mut self, name: impl Into<String>, bc: impl BoundaryCondition<T> + 'static) -> Self {
        self.patches.push((name.into(), Box::new(bc)));
        self
    }

    /// Build on `mesh` and evaluate the boundary values.
    pub fn build(self, mesh: &FvMesh) -> Result<GeometricField<T>> {
        let internal = match self.internal {
            InternalInit::Uniform(v) => Field::uniform(mesh.n_cells(), v),
            InternalInit::Values(v) => Field::new(v),
            InternalInit::FromCentres(f) => {
                let geo = mesh.geometry();
                geo.cell_centres.iter().map(|&c| f(c)).collect()
            }
        };

        let mut conditions: Vec<Option<Box<dyn BoundaryCondition<T>>>> =
            vec![None; mesh.patches().len()];
        for (name, bc) in self.patches {
            let p = mesh.patch_by_name(&name)?;
            conditions[p.get()] = Some(bc);
        }
        let conditions = mesh
            .patches()
            .iter()
            .zip(conditions)
            .map(|(patch, explicit)| match constraint_condition::<T>(patch) {
                Some(forced) => {
                    if let Some(bc) = explicit.filter(|bc| bc.type_name() != forced.type_name()) {
                        log::debug!(
                            "Patch '{}' is {}; ignoring '{}' for field '{}'",
                            patch.name,
                            patch.kind.keyword(),
                            bc.type_name(),
                            self.name
                        );
                    }
                    forced
                }
                None => explicit.unwrap_or_else(|| self.default_condition.clone()),
            })
            .collect();

        GeometricField::with_conditions(self.name, mesh, self.dimensions, internal, conditions)
    }
}
