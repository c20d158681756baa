//! Finite-volume equation matrix for one field.
//!
//! An [`FvMatrix`] represents the linear operator `L(ψ) = Aψ - b` assembled
//! by `fvm` operators, where `A` is an [`LduMatrix`] shared by every
//! component of `ψ` and `b` is the source. Boundary contributions are kept
//! per patch, unapplied, until a component system is built for solving:
//!
//! | Coefficient         | Non-coupled patch           | Coupled patch                  |
//! |---------------------|-----------------------------|--------------------------------|
//! | `internal_coeffs`   | added to the diagonal       | added to the diagonal          |
//! | `boundary_coeffs`   | added to the source         | interface off-diagonal         |
//!
//! Combination follows the usual equation algebra:
//!
//! - `A + B`, `A - B`, `-A` combine matrices of the same field and dimensions
//! - `A + su`, `A - su` add an explicit per-volume source
//! - `A == B` and `A == su` (spelled [`FvMatrix::equate`] and
//!   [`FvMatrix::equate_field`]) move the right-hand side over: `A - B`
//!
//! Matrix dimensions are those of the volume-integrated equation, so an
//! explicit source `su` must satisfy `[su] * [volume] == [A]`.

use std::ops::{Add, Neg, Sub};
use std::sync::Arc;

use super::interfaces::{InterfaceCoupling, LduSystem};
use super::ldu::{LduAddressing, LduMatrix};
use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField, SurfaceField};
use crate::linear_solver::{DominanceCheck, SolverControls, SolverPerformance, create_linear_solver};
use crate::mesh::{FvMesh, MeshGeometry};
use crate::parallel::{global_max, global_sum};
use crate::types::{CellIndex, DIM_VOLUME, DimensionSet, Dimensioned, FieldValue, PatchIndex};

/// Implicit equation for the field named `psi_name`.
#[derive(Clone, Debug)]
pub struct FvMatrix<T: FieldValue> {
    psi_name: String,
    psi_dimensions: DimensionSet,
    dimensions: DimensionSet,
    geometry: Arc<MeshGeometry>,
    ldu: LduMatrix,
    source: Vec<T>,
    internal_coeffs: Vec<Vec<T>>,
    boundary_coeffs: Vec<Vec<T>>,
    coupled: Vec<bool>,
    face_cells: Vec<Vec<usize>>,
    face_flux_correction: Option<SurfaceField<T>>,
    relaxed: bool,
}

/// One scalar component of the equation, boundary contributions applied.
struct ComponentSystem {
    matrix: LduMatrix,
    source: Vec<f64>,
    interfaces: Vec<InterfaceCoupling>,
}

impl<T: FieldValue> FvMatrix<T> {
    /// Empty equation for `psi` with integrated dimensions `dimensions`.
    pub fn new(psi: &GeometricField<T>, mesh: &FvMesh, dimensions: DimensionSet) -> Result<Self> {
        psi.check_mesh(mesh)?;
        let addr = LduAddressing::of_mesh(mesh)?;
        let patches = mesh.patches();
        Ok(Self {
            psi_name: psi.name().to_string(),
            psi_dimensions: psi.dimensions(),
            dimensions,
            geometry: mesh.geometry(),
            ldu: LduMatrix::new(addr),
            source: vec![T::zero(); mesh.n_cells()],
            internal_coeffs: patches.iter().map(|p| vec![T::zero(); p.size]).collect(),
            boundary_coeffs: patches.iter().map(|p| vec![T::zero(); p.size]).collect(),
            coupled: psi.boundary_field().iter().map(|pf| pf.is_coupled()).collect(),
            face_cells: (0..patches.len())
                .map(|i| mesh.face_cells(PatchIndex::new(i)).to_vec())
                .collect(),
            face_flux_correction: None,
            relaxed: false,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn psi_name(&self) -> &str {
        &self.psi_name
    }

    pub fn dimensions(&self) -> DimensionSet {
        self.dimensions
    }

    pub fn ldu(&self) -> &LduMatrix {
        &self.ldu
    }

    pub fn ldu_mut(&mut self) -> &mut LduMatrix {
        &mut self.ldu
    }

    pub fn diag(&self) -> &[f64] {
        self.ldu.diag()
    }

    pub fn symmetric(&self) -> bool {
        self.ldu.symmetric()
    }

    pub fn source(&self) -> &[T] {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut [T] {
        &mut self.source
    }

    pub fn internal_coeffs(&self, patch: PatchIndex) -> &[T] {
        &self.internal_coeffs[patch.get()]
    }

    pub fn internal_coeffs_mut(&mut self, patch: PatchIndex) -> &mut [T] {
        &mut self.internal_coeffs[patch.get()]
    }

    pub fn boundary_coeffs(&self, patch: PatchIndex) -> &[T] {
        &self.boundary_coeffs[patch.get()]
    }

    pub fn boundary_coeffs_mut(&mut self, patch: PatchIndex) -> &mut [T] {
        &mut self.boundary_coeffs[patch.get()]
    }

    /// Whether patch `patch` contributes through an interface.
    pub fn is_coupled(&self, patch: PatchIndex) -> bool {
        self.coupled[patch.get()]
    }

    pub fn n_patches(&self) -> usize {
        self.internal_coeffs.len()
    }

    pub fn face_flux_correction(&self) -> Option<&SurfaceField<T>> {
        self.face_flux_correction.as_ref()
    }

    /// Explicit face flux added by [`flux`](Self::flux) (non-orthogonal
    /// and deferred-correction terms).
    pub fn set_face_flux_correction(&mut self, correction: SurfaceField<T>) -> Result<()> {
        self.dimensions.check_same(
            &format!("face flux correction of fvMatrix for '{}'", self.psi_name),
            &correction.dimensions(),
        )?;
        self.face_flux_correction = Some(correction);
        Ok(())
    }

    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    fn cell_volumes(&self) -> &[f64] {
        &self.geometry.cell_volumes
    }

    fn check_psi(&self, psi: &GeometricField<T>) -> Result<()> {
        if psi.name() != self.psi_name {
            return Err(FvError::InvalidConfig(format!(
                "fvMatrix for '{}' used with field '{}'",
                self.psi_name,
                psi.name()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Equation algebra
    // =========================================================================

    fn check_compatible(&self, other: &FvMatrix<T>, operation: &str) -> Result<()> {
        if self.psi_name != other.psi_name {
            return Err(FvError::InvalidConfig(format!(
                "incompatible fields for operation {operation}: '{}' and '{}'",
                self.psi_name, other.psi_name
            )));
        }
        if self.source.len() != other.source.len() {
            return Err(FvError::size_mismatch(
                format!("cells of fvMatrix for '{}'", other.psi_name),
                self.source.len(),
                other.source.len(),
            ));
        }
        self.dimensions.check_same(
            &format!("fvMatrix<{}> {operation}", T::TYPE_NAME),
            &other.dimensions,
        )
    }

    fn combine(&mut self, other: &FvMatrix<T>, sign: f64) -> Result<()> {
        if sign > 0.0 {
            self.ldu += &other.ldu;
        } else {
            self.ldu -= &other.ldu;
        }
        for (a, &b) in self.source.iter_mut().zip(&other.source) {
            *a += b * sign;
        }
        for (mine, theirs) in self.internal_coeffs.iter_mut().zip(&other.internal_coeffs) {
            for (a, &b) in mine.iter_mut().zip(theirs) {
                *a += b * sign;
            }
        }
        for (mine, theirs) in self.boundary_coeffs.iter_mut().zip(&other.boundary_coeffs) {
            for (a, &b) in mine.iter_mut().zip(theirs) {
                *a += b * sign;
            }
        }
        if let Some(theirs) = &other.face_flux_correction {
            let theirs = if sign > 0.0 {
                theirs.clone()
            } else {
                theirs.map(theirs.name(), theirs.dimensions(), |v| -v)
            };
            self.face_flux_correction = Some(match self.face_flux_correction.take() {
                Some(mine) => mine.try_add(&theirs)?,
                None => theirs,
            });
        }
        self.relaxed = self.relaxed || other.relaxed;
        Ok(())
    }

    /// `self += other`.
    pub fn add_matrix(&mut self, other: &FvMatrix<T>) -> Result<()> {
        self.check_compatible(other, "+")?;
        self.combine(other, 1.0)
    }

    /// `self -= other`.
    pub fn sub_matrix(&mut self, other: &FvMatrix<T>) -> Result<()> {
        self.check_compatible(other, "-")?;
        self.combine(other, -1.0)
    }

    /// `self == other`, i.e. `self - other`.
    pub fn equate(mut self, other: FvMatrix<T>) -> Result<Self> {
        self.check_compatible(&other, "==")?;
        self.combine(&other, -1.0)?;
        Ok(self)
    }

    /// Negate every coefficient, source and flux correction.
    pub fn negate(&mut self) {
        self.ldu *= -1.0;
        for s in &mut self.source {
            *s = -*s;
        }
        for coeffs in self.internal_coeffs.iter_mut().chain(&mut self.boundary_coeffs) {
            for c in coeffs.iter_mut() {
                *c = -*c;
            }
        }
        if let Some(corr) = &self.face_flux_correction {
            self.face_flux_correction = Some(corr.map(corr.name(), corr.dimensions(), |v| -v));
        }
    }

    /// `source += sign * V * value(cell)` after checking `[su] * [V] == [A]`.
    fn add_volume_source(
        &mut self,
        operation: &str,
        su_dimensions: DimensionSet,
        sign: f64,
        value: impl Fn(usize) -> T,
    ) -> Result<()> {
        self.dimensions.check_same(
            &format!("fvMatrix<{}> {operation} source", T::TYPE_NAME),
            &(su_dimensions * DIM_VOLUME),
        )?;
        let volumes = self.geometry.cell_volumes.clone();
        for (cell, (s, v)) in self.source.iter_mut().zip(&volumes).enumerate() {
            *s += value(cell) * (sign * v);
        }
        Ok(())
    }

    fn field_source(mut self, su: &GeometricField<T>, operation: &str, sign: f64) -> Result<Self> {
        if su.internal().len() != self.source.len() {
            return Err(FvError::size_mismatch(
                format!("explicit source '{}'", su.name()),
                self.source.len(),
                su.internal().len(),
            ));
        }
        let values = su.internal();
        self.add_volume_source(operation, su.dimensions(), sign, |c| values[c])?;
        Ok(self)
    }

    /// `A + su`: the equation gains `+su` on its left-hand side.
    pub fn add_field(self, su: &GeometricField<T>) -> Result<Self> {
        self.field_source(su, "+", -1.0)
    }

    /// `A - su`.
    pub fn sub_field(self, su: &GeometricField<T>) -> Result<Self> {
        self.field_source(su, "-", 1.0)
    }

    /// `A == su`: `su` on the right-hand side.
    pub fn equate_field(self, su: &GeometricField<T>) -> Result<Self> {
        self.field_source(su, "==", 1.0)
    }

    /// `A + su` for a uniform source.
    pub fn add_uniform(mut self, su: &Dimensioned<T>) -> Result<Self> {
        self.add_volume_source("+", su.dimensions, -1.0, |_| su.value)?;
        Ok(self)
    }

    /// `A - su` for a uniform source.
    pub fn sub_uniform(mut self, su: &Dimensioned<T>) -> Result<Self> {
        self.add_volume_source("-", su.dimensions, 1.0, |_| su.value)?;
        Ok(self)
    }

    /// `A == su` for a uniform source.
    pub fn equate_uniform(mut self, su: &Dimensioned<T>) -> Result<Self> {
        self.add_volume_source("==", su.dimensions, 1.0, |_| su.value)?;
        Ok(self)
    }

    // =========================================================================
    // Relaxation and reference level
    // =========================================================================

    /// Under-relax the equation by `alpha` against the current `psi`.
    ///
    /// The diagonal is made at least as large as the off-diagonal sum,
    /// divided by `alpha`, and the increase is balanced by `(D - D0) psi` in
    /// the source so the converged solution is unchanged. Applies once; a
    /// second call only logs a warning. `alpha <= 0` disables relaxation.
    pub fn relax(&mut self, psi: &GeometricField<T>, alpha: f64) -> Result<()> {
        if alpha <= 0.0 {
            return Ok(());
        }
        if self.relaxed {
            log::warn!(
                "fvMatrix for '{}' is already relaxed; ignoring relax({alpha})",
                self.psi_name
            );
            return Ok(());
        }
        self.check_psi(psi)?;
        if psi.internal().len() != self.source.len() {
            return Err(FvError::size_mismatch(
                format!("internal field of '{}'", psi.name()),
                self.source.len(),
                psi.internal().len(),
            ));
        }

        let d0 = self.ldu.diag().to_vec();
        let mut d = d0.clone();
        let mut sum_off = self.ldu.sum_mag_off_diag();

        // Boundary diagonal contributions enter the dominance comparison
        for (i, cells) in self.face_cells.iter().enumerate() {
            let ic = &self.internal_coeffs[i];
            if self.coupled[i] {
                let bc = &self.boundary_coeffs[i];
                for ((&cell, c), b) in cells.iter().zip(ic).zip(bc) {
                    d[cell] += c.component(0);
                    sum_off[cell] += b.component(0).abs();
                }
            } else {
                for (&cell, c) in cells.iter().zip(ic) {
                    d[cell] += cmpt_max_mag(c);
                }
            }
        }

        for (di, &s) in d.iter_mut().zip(&sum_off) {
            *di = di.abs().max(s) / alpha;
        }

        for (i, cells) in self.face_cells.iter().enumerate() {
            let ic = &self.internal_coeffs[i];
            if self.coupled[i] {
                for (&cell, c) in cells.iter().zip(ic) {
                    d[cell] -= c.component(0);
                }
            } else {
                for (&cell, c) in cells.iter().zip(ic) {
                    d[cell] -= cmpt_min(c);
                }
            }
        }

        for ((s, (&dn, &dold)), &p) in self
            .source
            .iter_mut()
            .zip(d.iter().zip(&d0))
            .zip(psi.internal().iter())
        {
            *s += p * (dn - dold);
        }
        self.ldu.diag_mut().copy_from_slice(&d);
        self.relaxed = true;
        log::debug!("Relaxed fvMatrix for '{}' with factor {alpha}", self.psi_name);
        Ok(())
    }

    /// Pin `psi` at `cell` to `value` when no patch fixes its level.
    ///
    /// `needs_reference` is a global reduction, so every domain must call
    /// this; only the domain holding the reference cell passes `Some`.
    pub fn set_reference(
        &mut self,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        cell: Option<CellIndex>,
        value: T,
    ) -> Result<()> {
        self.check_psi(psi)?;
        if !psi.needs_reference(mesh)? {
            return Ok(());
        }
        if let Some(cell) = cell {
            let c = cell.get();
            if c >= self.source.len() {
                return Err(FvError::size_mismatch(
                    "reference cell",
                    self.source.len(),
                    c,
                ));
            }
            let d = self.ldu.diag()[c];
            self.source[c] += value * d;
            self.ldu.diag_mut()[c] += d;
            log::debug!("Reference level of '{}' set at {cell}", self.psi_name);
        }
        Ok(())
    }

    // =========================================================================
    // Component systems and solution
    // =========================================================================

    fn component_system(
        &self,
        psi: &GeometricField<T>,
        mesh: &FvMesh,
        geometry: &MeshGeometry,
        cmpt: usize,
    ) -> Result<ComponentSystem> {
        let mut matrix = self.ldu.clone();
        let mut source: Vec<f64> = self.source.iter().map(|v| v.component(cmpt)).collect();
        let mut interfaces = Vec::new();

        for patch in mesh.patch_exchange_order() {
            let i = patch.get();
            let cells = &self.face_cells[i];
            {
                let diag = matrix.diag_mut();
                for (&cell, c) in cells.iter().zip(&self.internal_coeffs[i]) {
                    diag[cell] += c.component(cmpt);
                }
            }
            let bc = &self.boundary_coeffs[i];
            if self.coupled[i] {
                let ctx = psi.patch_context(mesh, geometry, patch);
                let interface = psi.boundary_field()[patch]
                    .condition()
                    .interface(&ctx)
                    .ok_or_else(|| {
                        FvError::InvalidConfig(format!(
                            "coupled patch '{}' of '{}' provides no matrix interface",
                            mesh.patch(patch).name,
                            self.psi_name
                        ))
                    })?;
                let coeffs = bc.iter().map(|v| v.component(cmpt)).collect();
                interfaces.push(InterfaceCoupling::new(interface, coeffs));
            } else {
                for (&cell, b) in cells.iter().zip(bc) {
                    source[cell] += b.component(cmpt);
                }
            }
        }

        Ok(ComponentSystem {
            matrix,
            source,
            interfaces,
        })
    }

    /// Components to solve: all, except vector components along empty directions.
    fn solved_components(mesh: &FvMesh) -> Vec<usize> {
        let directions = mesh.solution_directions();
        (0..T::N_COMPONENTS)
            .filter(|&c| T::N_COMPONENTS != 3 || directions[c] != 0.0)
            .collect()
    }

    fn check_dominance(
        &self,
        system: &ComponentSystem,
        mesh: &FvMesh,
        controls: &SolverControls,
    ) -> Result<()> {
        if controls.dominance_check == DominanceCheck::Off {
            return Ok(());
        }
        let mut extra = vec![0.0; system.matrix.n_cells()];
        for coupling in &system.interfaces {
            for (&cell, &coeff) in coupling.interface.face_cells().iter().zip(&coupling.coeffs) {
                extra[cell] += coeff.abs();
            }
        }
        let report = system.matrix.check_dominance(&extra, controls.dominance_tolerance);
        let violations = global_sum(mesh.comm(), report.violations as f64)? as usize;
        let worst_ratio = global_max(mesh.comm(), report.worst_ratio)?;
        if violations == 0 {
            return Ok(());
        }
        match controls.dominance_check {
            DominanceCheck::Error => Err(FvError::DiagonalDominance {
                field: self.psi_name.clone(),
                violations,
                worst_ratio,
            }),
            _ => {
                log::warn!(
                    "fvMatrix for '{}' is not diagonally dominant in {violations} cells \
                     (worst off-diagonal/diagonal ratio {worst_ratio:.4})",
                    self.psi_name
                );
                Ok(())
            }
        }
    }

    /// Solve component by component, write the result into `psi` and
    /// re-evaluate its boundary conditions.
    ///
    /// Returns the worst component performance under the field's own name.
    pub fn solve(
        &self,
        psi: &mut GeometricField<T>,
        mesh: &FvMesh,
        controls: &SolverControls,
    ) -> Result<SolverPerformance> {
        self.check_psi(psi)?;
        psi.check_mesh(mesh)?;
        let geometry = mesh.geometry();
        let mut result: Option<SolverPerformance> = None;

        for cmpt in Self::solved_components(mesh) {
            let system = self.component_system(psi, mesh, &geometry, cmpt)?;
            self.check_dominance(&system, mesh, controls)?;

            let solver = create_linear_solver(controls, system.matrix.symmetric())?;
            let mut psi_c: Vec<f64> = psi.internal().iter().map(|v| v.component(cmpt)).collect();
            let perf = {
                let ldu_system = LduSystem::new(&system.matrix, &system.interfaces, mesh.comm());
                solver.solve(
                    &ldu_system,
                    &mut psi_c,
                    &system.source,
                    &component_name::<T>(&self.psi_name, cmpt),
                )?
            };
            perf.log();
            psi.internal_mut().replace_component(cmpt, &psi_c)?;
            result = Some(match result {
                Some(r) => r.max(perf),
                None => perf,
            });
        }

        psi.correct_boundary_conditions(mesh)?;
        let mut result =
            result.unwrap_or_else(|| SolverPerformance::new(solver_label(controls), &self.psi_name));
        result.field_name.clone_from(&self.psi_name);
        Ok(result)
    }

    /// Residual `b - Aψ` per cell, boundary and interface terms included.
    pub fn residual(&self, psi: &GeometricField<T>, mesh: &FvMesh) -> Result<Field<T>> {
        self.check_psi(psi)?;
        let geometry = mesh.geometry();
        let mut residual = Field::zeros(self.source.len());
        for cmpt in Self::solved_components(mesh) {
            let system = self.component_system(psi, mesh, &geometry, cmpt)?;
            let psi_c: Vec<f64> = psi.internal().iter().map(|v| v.component(cmpt)).collect();
            let mut r = vec![0.0; psi_c.len()];
            LduSystem::new(&system.matrix, &system.interfaces, mesh.comm())
                .residual(&psi_c, &system.source, &mut r)?;
            residual.replace_component(cmpt, &r)?;
        }
        Ok(residual)
    }

    // =========================================================================
    // Pressure-velocity coupling operators
    // =========================================================================

    /// Diagonal with component-averaged boundary contributions, not divided by volume.
    fn d_with_boundary(&self) -> Vec<f64> {
        let mut d = self.ldu.diag().to_vec();
        for (cells, ic) in self.face_cells.iter().zip(&self.internal_coeffs) {
            for (&cell, c) in cells.iter().zip(ic) {
                d[cell] += cmpt_av(c);
            }
        }
        d
    }

    /// Central coefficient `A = D / V`, boundary diagonal averaged over components.
    pub fn a(&self, mesh: &FvMesh) -> Result<GeometricField<f64>> {
        let values: Vec<f64> = self
            .d_with_boundary()
            .iter()
            .zip(self.cell_volumes())
            .map(|(d, v)| d / v)
            .collect();
        GeometricField::extrapolated(
            format!("A({})", self.psi_name),
            mesh,
            self.dimensions / self.psi_dimensions / DIM_VOLUME,
            Field::new(values),
        )
    }

    /// `H = (b - Nψ) / V` with boundary sources and the component
    /// difference of the boundary diagonal, so that `A ψ = H` at convergence.
    pub fn h(&self, psi: &GeometricField<T>, mesh: &FvMesh) -> Result<GeometricField<T>> {
        self.check_psi(psi)?;
        let n = self.source.len();
        let mut avg_bd = vec![0.0; n];
        for (cells, ic) in self.face_cells.iter().zip(&self.internal_coeffs) {
            for (&cell, c) in cells.iter().zip(ic) {
                avg_bd[cell] += cmpt_av(c);
            }
        }

        let mut h = Field::<T>::zeros(n);
        for cmpt in 0..T::N_COMPONENTS {
            let psi_c: Vec<f64> = psi.internal().iter().map(|v| v.component(cmpt)).collect();
            let mut bd = vec![0.0; n];
            for (cells, ic) in self.face_cells.iter().zip(&self.internal_coeffs) {
                for (&cell, c) in cells.iter().zip(ic) {
                    bd[cell] += c.component(cmpt);
                }
            }
            let off = self.ldu.h_operation(&psi_c);
            let h_c: Vec<f64> = (0..n)
                .map(|c| (avg_bd[c] - bd[c]) * psi_c[c] + off[c])
                .collect();
            h.replace_component(cmpt, &h_c)?;
        }

        for (hv, &s) in h.iter_mut().zip(&self.source) {
            *hv += s;
        }
        for (i, cells) in self.face_cells.iter().enumerate() {
            let bc = &self.boundary_coeffs[i];
            if self.coupled[i] {
                let pnf = psi
                    .patch_neighbour_field(mesh, PatchIndex::new(i))?
                    .ok_or_else(|| no_neighbour_field(mesh, i, &self.psi_name))?;
                for ((&cell, b), nv) in cells.iter().zip(bc).zip(&pnf) {
                    h[cell] += b.cmpt_multiply(nv);
                }
            } else {
                for (&cell, &b) in cells.iter().zip(bc) {
                    h[cell] += b;
                }
            }
        }
        for (hv, &v) in h.iter_mut().zip(self.cell_volumes()) {
            *hv = *hv / v;
        }

        GeometricField::extrapolated(
            format!("H({})", self.psi_name),
            mesh,
            self.dimensions / DIM_VOLUME,
            h,
        )
    }

    /// Face flux of the implicit operator evaluated at `psi`.
    ///
    /// Internal faces get `upper ψ_N - lower ψ_P`; patch faces get
    /// `internal_coeffs ψ_P - boundary_coeffs (ψ_nbr on coupled patches)`.
    pub fn flux(&self, psi: &GeometricField<T>, mesh: &FvMesh) -> Result<SurfaceField<T>> {
        self.check_psi(psi)?;
        let n_faces = self.ldu.addressing().n_faces();
        let mut internal = Field::<T>::zeros(n_faces);
        for cmpt in 0..T::N_COMPONENTS {
            let psi_c: Vec<f64> = psi.internal().iter().map(|v| v.component(cmpt)).collect();
            internal.replace_component(cmpt, &self.ldu.face_h(&psi_c))?;
        }

        let mut boundary = Vec::with_capacity(self.face_cells.len());
        for (i, cells) in self.face_cells.iter().enumerate() {
            let ic = &self.internal_coeffs[i];
            let bc = &self.boundary_coeffs[i];
            let values: Vec<T> = if self.coupled[i] {
                let pnf = psi
                    .patch_neighbour_field(mesh, PatchIndex::new(i))?
                    .ok_or_else(|| no_neighbour_field(mesh, i, &self.psi_name))?;
                cells
                    .iter()
                    .zip(ic)
                    .zip(bc)
                    .zip(&pnf)
                    .map(|(((&cell, a), b), nv)| {
                        a.cmpt_multiply(&psi.internal()[cell]) - b.cmpt_multiply(nv)
                    })
                    .collect()
            } else {
                cells
                    .iter()
                    .zip(ic)
                    .zip(bc)
                    .map(|((&cell, a), &b)| a.cmpt_multiply(&psi.internal()[cell]) - b)
                    .collect()
            };
            boundary.push(Field::new(values));
        }

        let flux = SurfaceField::new(
            format!("flux({})", self.psi_name),
            self.dimensions,
            internal,
            boundary,
        );
        match &self.face_flux_correction {
            Some(corr) => flux.try_add(corr),
            None => Ok(flux),
        }
    }
}

// =============================================================================
// Operators
// =============================================================================

impl<T: FieldValue> Add for FvMatrix<T> {
    type Output = Result<FvMatrix<T>>;

    fn add(mut self, rhs: FvMatrix<T>) -> Self::Output {
        self.add_matrix(&rhs)?;
        Ok(self)
    }
}

impl<T: FieldValue> Sub for FvMatrix<T> {
    type Output = Result<FvMatrix<T>>;

    fn sub(mut self, rhs: FvMatrix<T>) -> Self::Output {
        self.sub_matrix(&rhs)?;
        Ok(self)
    }
}

impl<T: FieldValue> Neg for FvMatrix<T> {
    type Output = FvMatrix<T>;

    fn neg(mut self) -> Self::Output {
        self.negate();
        self
    }
}

impl<T: FieldValue> Add<&GeometricField<T>> for FvMatrix<T> {
    type Output = Result<FvMatrix<T>>;

    fn add(self, su: &GeometricField<T>) -> Self::Output {
        self.add_field(su)
    }
}

impl<T: FieldValue> Sub<&GeometricField<T>> for FvMatrix<T> {
    type Output = Result<FvMatrix<T>>;

    fn sub(self, su: &GeometricField<T>) -> Self::Output {
        self.sub_field(su)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn cmpt_av<T: FieldValue>(v: &T) -> f64 {
    (0..T::N_COMPONENTS).map(|i| v.component(i)).sum::<f64>() / T::N_COMPONENTS as f64
}

fn cmpt_max_mag<T: FieldValue>(v: &T) -> f64 {
    (0..T::N_COMPONENTS)
        .map(|i| v.component(i).abs())
        .fold(0.0, f64::max)
}

fn cmpt_min<T: FieldValue>(v: &T) -> f64 {
    (0..T::N_COMPONENTS)
        .map(|i| v.component(i))
        .fold(f64::INFINITY, f64::min)
}

/// `p` for scalars, `Ux`/`Uy`/`Uz` for vectors, `Rxx`... for tensors.
fn component_name<T: FieldValue>(name: &str, cmpt: usize) -> String {
    const VECTOR: [&str; 3] = ["x", "y", "z"];
    const SYMM: [&str; 6] = ["xx", "xy", "xz", "yy", "yz", "zz"];
    const FULL: [&str; 9] = ["xx", "xy", "xz", "yx", "yy", "yz", "zx", "zy", "zz"];
    let suffix = match T::N_COMPONENTS {
        3 => VECTOR.get(cmpt),
        6 => SYMM.get(cmpt),
        9 => FULL.get(cmpt),
        _ => None,
    };
    match suffix {
        Some(s) => format!("{name}{s}"),
        None => name.to_string(),
    }
}

fn solver_label(controls: &SolverControls) -> &str {
    &controls.solver
}

fn no_neighbour_field(mesh: &FvMesh, patch: usize, field: &str) -> FvError {
    FvError::InvalidConfig(format!(
        "coupled patch '{}' of '{field}' has no neighbour field",
        mesh.patch(PatchIndex::new(patch)).name
    ))
}
