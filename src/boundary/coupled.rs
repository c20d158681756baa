//! Coupled conditions: periodic (cyclic) and inter-domain (processor) patches.
//!
//! Both interpolate face values from the cells on either side of the face and
//! expose a matrix interface, so operators and solvers treat them alike. A
//! processor patch gets its far-side cells through the mesh communicator
//! during `evaluate` and serves them from that copy afterwards.

use std::any::Any;

use super::condition::{BoundaryCondition, PatchContext};
use crate::error::{FvError, Result};
use crate::io::format::format_field;
use crate::matrix::{CyclicInterface, LduInterface, ProcessorInterface};
use crate::parallel::exchange_values;
use crate::types::{FieldValue, PatchIndex};

fn interpolate_coupled<T: FieldValue>(ctx: &PatchContext<'_, T>, pnf: &[T], values: &mut [T]) {
    let pif = ctx.patch_internal_field();
    for (i, (v, &w)) in values.iter_mut().zip(ctx.weights()).enumerate() {
        *v = pif[i] * w + pnf[i] * (1.0 - w);
    }
}

fn coupled_sn_grad<T: FieldValue>(ctx: &PatchContext<'_, T>, pnf: &[T]) -> Vec<T> {
    let pif = ctx.patch_internal_field();
    ctx.delta_coeffs()
        .iter()
        .enumerate()
        .map(|(i, &dc)| (pnf[i] - pif[i]) * dc)
        .collect()
}

macro_rules! coupled_coefficients {
    () => {
        fn value_internal_coeffs(&self, _ctx: &PatchContext<'_, T>, w: &[f64]) -> Result<Vec<T>> {
            Ok(w.iter().map(|&w| T::splat(w)).collect())
        }

        fn value_boundary_coeffs(
            &self,
            _ctx: &PatchContext<'_, T>,
            _values: &[T],
            w: &[f64],
        ) -> Result<Vec<T>> {
            Ok(w.iter().map(|&w| T::splat(1.0 - w)).collect())
        }

        fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_, T>) -> Result<Vec<T>> {
            Ok(ctx.delta_coeffs().iter().map(|&dc| T::splat(-dc)).collect())
        }

        fn gradient_boundary_coeffs(
            &self,
            ctx: &PatchContext<'_, T>,
            _values: &[T],
        ) -> Result<Vec<T>> {
            Ok(ctx.delta_coeffs().iter().map(|&dc| T::splat(dc)).collect())
        }

        fn is_coupled(&self) -> bool {
            true
        }

        fn write_entries(&self, values: &[T]) -> Vec<(String, String)> {
            vec![("value".into(), format_field(values))]
        }
    };
}

// =============================================================================
// cyclic
// =============================================================================

/// Periodic coupling to another patch of the same mesh.
#[derive(Clone, Debug)]
pub struct Cyclic {
    neighbour_patch: PatchIndex,
}

impl Cyclic {
    pub fn new(neighbour_patch: PatchIndex) -> Self {
        Self { neighbour_patch }
    }

    pub fn neighbour_patch(&self) -> PatchIndex {
        self.neighbour_patch
    }

    fn neighbour_values<T: FieldValue>(&self, ctx: &PatchContext<'_, T>) -> Vec<T> {
        ctx.mesh
            .face_cells(self.neighbour_patch)
            .iter()
            .map(|&c| ctx.internal[c])
            .collect()
    }
}

impl<T: FieldValue> BoundaryCondition<T> for Cyclic {
    fn type_name(&self) -> &'static str {
        "cyclic"
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()> {
        let pnf = self.neighbour_values(ctx);
        interpolate_coupled(ctx, &pnf, values);
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Ok(coupled_sn_grad(ctx, &self.neighbour_values(ctx)))
    }

    coupled_coefficients!();

    fn patch_neighbour_field(&self, ctx: &PatchContext<'_, T>) -> Result<Option<Vec<T>>> {
        Ok(Some(self.neighbour_values(ctx)))
    }

    fn interface(&self, ctx: &PatchContext<'_, T>) -> Option<Box<dyn LduInterface>> {
        Some(Box::new(CyclicInterface::new(
            ctx.face_cells().to_vec(),
            ctx.mesh.face_cells(self.neighbour_patch).to_vec(),
        )))
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// processor
// =============================================================================

/// Coupling to the facing patch of a neighbouring domain.
#[derive(Clone, Debug)]
pub struct Processor<T> {
    neighbour_rank: usize,
    tag: usize,
    /// Far-side cell values from the last evaluation
    neighbour_cells: Vec<T>,
}

impl<T: FieldValue> Processor<T> {
    pub fn new(neighbour_rank: usize, tag: usize) -> Self {
        Self {
            neighbour_rank,
            tag,
            neighbour_cells: Vec::new(),
        }
    }

    pub fn neighbour_rank(&self) -> usize {
        self.neighbour_rank
    }

    /// Interface tag shared with the facing patch.
    pub fn tag(&self) -> usize {
        self.tag
    }

    fn cached(&self, ctx: &PatchContext<'_, T>) -> Result<&[T]> {
        if self.neighbour_cells.len() != ctx.size() {
            return Err(FvError::InvalidConfig(format!(
                "processor patch '{}' read before its first evaluation",
                ctx.patch_info().name
            )));
        }
        Ok(&self.neighbour_cells)
    }
}

impl<T: FieldValue> BoundaryCondition<T> for Processor<T> {
    fn type_name(&self) -> &'static str {
        "processor"
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>, values: &mut [T]) -> Result<()> {
        let pif = ctx.patch_internal_field();
        self.neighbour_cells = exchange_values(ctx.mesh.comm(), &pif, self.neighbour_rank, self.tag)?;
        interpolate_coupled(ctx, &self.neighbour_cells, values);
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_, T>, _values: &[T]) -> Result<Vec<T>> {
        Ok(coupled_sn_grad(ctx, self.cached(ctx)?))
    }

    coupled_coefficients!();

    fn patch_neighbour_field(&self, ctx: &PatchContext<'_, T>) -> Result<Option<Vec<T>>> {
        Ok(Some(self.cached(ctx)?.to_vec()))
    }

    fn interface(&self, ctx: &PatchContext<'_, T>) -> Option<Box<dyn LduInterface>> {
        Some(Box::new(ProcessorInterface::new(
            ctx.face_cells().to_vec(),
            self.neighbour_rank,
            self.tag,
        )))
    }

    fn auto_map(&mut self, _face_map: &[usize]) {
        self.neighbour_cells.clear();
    }

    fn clone_box(&self) -> Box<dyn BoundaryCondition<T>> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
