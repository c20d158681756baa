//! Field mapping across topology changes.
//!
//! After refinement, coarsening or load balancing the caller builds a new
//! mesh plus a [`MeshMapper`] saying which old cell (and old patch face)
//! each new cell (and new patch face) takes its value from. Fields and their
//! boundary conditions are then re-synchronised with `auto_map`.

use super::fv_mesh::FvMesh;
use crate::error::{FvError, Result};

/// New-to-old addressing for a topology change.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshMapper {
    /// `cell_map[new_cell] = old_cell`
    pub cell_map: Vec<usize>,
    /// `patch_face_maps[patch][new_face] = old_face`, local to the patch
    pub patch_face_maps: Vec<Vec<usize>>,
}

impl MeshMapper {
    /// Mapper that keeps every value in place.
    pub fn identity(mesh: &FvMesh) -> Self {
        Self {
            cell_map: (0..mesh.n_cells()).collect(),
            patch_face_maps: mesh.patches().iter().map(|p| (0..p.size).collect()).collect(),
        }
    }

    /// Check the mapper against the old and new meshes.
    pub fn validate(&self, old_mesh: &FvMesh, new_mesh: &FvMesh) -> Result<()> {
        if self.cell_map.len() != new_mesh.n_cells() {
            return Err(FvError::size_mismatch(
                "cell map",
                new_mesh.n_cells(),
                self.cell_map.len(),
            ));
        }
        if let Some(&bad) = self.cell_map.iter().find(|&&c| c >= old_mesh.n_cells()) {
            return Err(FvError::InvalidMesh(format!(
                "cell map refers to old cell {bad} of {}",
                old_mesh.n_cells()
            )));
        }
        if self.patch_face_maps.len() != new_mesh.patches().len()
            || old_mesh.patches().len() != new_mesh.patches().len()
        {
            return Err(FvError::size_mismatch(
                "patch face maps",
                new_mesh.patches().len(),
                self.patch_face_maps.len(),
            ));
        }
        for ((map, new_patch), old_patch) in self
            .patch_face_maps
            .iter()
            .zip(new_mesh.patches())
            .zip(old_mesh.patches())
        {
            if map.len() != new_patch.size {
                return Err(FvError::size_mismatch(
                    format!("face map of patch '{}'", new_patch.name),
                    new_patch.size,
                    map.len(),
                ));
            }
            if map.iter().any(|&f| f >= old_patch.size) {
                return Err(FvError::InvalidMesh(format!(
                    "face map of patch '{}' exceeds old patch size {}",
                    new_patch.name, old_patch.size
                )));
            }
        }
        Ok(())
    }
}

/// Gather `values` through a new-to-old map.
pub fn map_values<T: Copy>(values: &[T], map: &[usize]) -> Vec<T> {
    map.iter().map(|&old| values[old]).collect()
}
