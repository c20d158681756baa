//! Weighted least-squares gradient.
//!
//! For cell `P` with stencil displacements `d_k` and weights
//! `w_k = 1/|d_k|²`, the gradient minimising `Σ w_k (d_k·∇φ - Δφ_k)²` is
//! `∇φ_P = Σ_k v_k ⊗ Δφ_k` with `v_k = w_k (Σ w d⊗d)⁻¹ · d_k`. The vectors
//! `v_k` depend only on geometry and are cached on the mesh.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{GradientScheme, gradient_field};
use crate::error::{FvError, Result};
use crate::field::{Field, GeometricField};
use crate::mesh::FvMesh;
use crate::types::{Differentiable, FieldValue, PatchIndex, SymmTensor, Vector};

/// Cells contributing to a cell's fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stencil {
    /// Cells sharing a face
    FaceNeighbours,
    /// Cells sharing a point
    PointNeighbours,
}

impl Stencil {
    fn cache_key(self) -> &'static str {
        match self {
            Stencil::FaceNeighbours => "leastSquaresVectors",
            Stencil::PointNeighbours => "pointCellsLeastSquaresVectors",
        }
    }
}

/// Source of a stencil value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilNeighbour {
    /// Local cell
    Cell(usize),
    /// Boundary face: patch value, or the neighbour cell for coupled patches
    Face { patch: usize, local: usize },
}

/// Per-cell least-squares vectors in compressed rows.
#[derive(Clone, Debug)]
pub struct LeastSquaresVectors {
    offsets: Vec<usize>,
    entries: Vec<(StencilNeighbour, Vector)>,
}

impl LeastSquaresVectors {
    /// Build the vectors of `stencil` on the current mesh geometry.
    pub fn new(mesh: &FvMesh, stencil: Stencil) -> Result<Self> {
        let geo = mesh.geometry();
        let addressing = mesh.addressing();
        let sol = mesh.solution_directions();
        let n_cells = mesh.n_cells();

        // Boundary faces of each cell, empty patches excluded.
        let mut cell_boundary: Vec<Vec<(StencilNeighbour, Vector)>> = vec![Vec::new(); n_cells];
        for (i, patch) in mesh.patches().iter().enumerate() {
            if patch.kind.is_empty_kind() {
                continue;
            }
            let coupled = patch.is_coupled();
            for (local, (f, &c)) in patch
                .faces()
                .zip(mesh.face_cells(PatchIndex::new(i)))
                .enumerate()
            {
                let d = if coupled {
                    geo.delta[f]
                } else {
                    geo.face_centres[f] - geo.cell_centres[c]
                };
                cell_boundary[c].push((StencilNeighbour::Face { patch: i, local }, d));
            }
        }

        let mut offsets = Vec::with_capacity(n_cells + 1);
        let mut entries = Vec::new();
        offsets.push(0);
        for (c, boundary) in cell_boundary.into_iter().enumerate() {
            let cells = match stencil {
                Stencil::FaceNeighbours => &addressing.cell_cells[c],
                Stencil::PointNeighbours => &addressing.cell_point_cells[c],
            };
            let start = entries.len();
            entries.extend(
                cells
                    .iter()
                    .map(|&n| (StencilNeighbour::Cell(n), geo.cell_centres[n] - geo.cell_centres[c])),
            );
            entries.extend(boundary);

            let row = &mut entries[start..];
            let mut dd = SymmTensor::new([0.0; 6]);
            for (_, d) in row.iter() {
                dd += d.sqr() * (1.0 / d.dot(d));
            }
            // Unit entries on unsolved directions keep 1-D and 2-D fits invertible.
            dd.c[0] += 1.0 - sol.x;
            dd.c[3] += 1.0 - sol.y;
            dd.c[5] += 1.0 - sol.z;
            let inv_dd = dd.inv().ok_or_else(|| {
                FvError::InvalidMesh(format!(
                    "least-squares stencil of cell {c} has {} points and is singular",
                    row.len()
                ))
            })?;
            for (_, d) in row.iter_mut() {
                *d = inv_dd.dot_vector(*d) * (1.0 / d.dot(d));
            }
            offsets.push(entries.len());
        }

        log::debug!(
            "Built {:?} least-squares vectors: {} entries for {} cells",
            stencil,
            entries.len(),
            n_cells
        );
        Ok(Self { offsets, entries })
    }

    /// Stencil entries of `cell`.
    pub fn row(&self, cell: usize) -> &[(StencilNeighbour, Vector)] {
        &self.entries[self.offsets[cell]..self.offsets[cell + 1]]
    }

    pub fn n_cells(&self) -> usize {
        self.offsets.len() - 1
    }
}

/// Least-squares gradient on a face or point stencil.
#[derive(Clone, Copy, Debug)]
pub struct LeastSquaresGradient {
    stencil: Stencil,
}

impl LeastSquaresGradient {
    pub fn new(stencil: Stencil) -> Self {
        Self { stencil }
    }

    pub fn stencil(&self) -> Stencil {
        self.stencil
    }

    /// Cached vectors for this stencil on `mesh`.
    pub fn vectors(&self, mesh: &FvMesh) -> Result<std::sync::Arc<LeastSquaresVectors>> {
        let stencil = self.stencil;
        mesh.cached_object(stencil.cache_key(), move |m| LeastSquaresVectors::new(m, stencil))
    }
}

impl<T: Differentiable> GradientScheme<T> for LeastSquaresGradient {
    fn name(&self) -> &'static str {
        match self.stencil {
            Stencil::FaceNeighbours => "leastSquares",
            Stencil::PointNeighbours => "pointCellsLeastSquares",
        }
    }

    fn grad(&self, vf: &GeometricField<T>, mesh: &FvMesh) -> Result<GeometricField<T::Grad>> {
        let vectors = self.vectors(mesh)?;
        let psi = vf.internal();

        let mut face_values: Vec<Vec<T>> = Vec::with_capacity(mesh.patches().len());
        for (i, pf) in vf.boundary_field().iter().enumerate() {
            let index = PatchIndex::new(i);
            if pf.is_coupled() {
                let pnf = vf.patch_neighbour_field(mesh, index)?.ok_or_else(|| {
                    FvError::InvalidConfig(format!(
                        "coupled patch '{}' of '{}' has no neighbour field",
                        mesh.patch(index).name,
                        vf.name()
                    ))
                })?;
                face_values.push(pnf);
            } else {
                face_values.push(pf.values().to_vec());
            }
        }

        let cell_grad = |c: usize| {
            let own = psi[c];
            vectors
                .row(c)
                .iter()
                .fold(T::Grad::zero(), |acc, &(nb, v)| {
                    let value = match nb {
                        StencilNeighbour::Cell(n) => psi[n],
                        StencilNeighbour::Face { patch, local } => face_values[patch][local],
                    };
                    acc + T::outer(v, value - own)
                })
        };

        #[cfg(feature = "parallel")]
        let internal: Vec<T::Grad> = (0..mesh.n_cells()).into_par_iter().map(cell_grad).collect();
        #[cfg(not(feature = "parallel"))]
        let internal: Vec<T::Grad> = (0..mesh.n_cells()).map(cell_grad).collect();

        gradient_field(vf, mesh, Field::new(internal))
    }
}
