//! Structured hexahedral block builder.
//!
//! Produces an [`FvMesh`] for a box of `nx × ny × nz` cells with the six
//! sides as boundary patches. Sides sharing a name are merged into one patch,
//! which is how 1-D and 2-D meshes get a single `empty` patch.
//!
//! ```
//! use fv_rs::mesh::{BlockSide, HexBlock, PatchKind};
//!
//! let mesh = HexBlock::new(10, 10, 1)
//!     .size(1.0, 1.0, 0.1)
//!     .patch(BlockSide::Back, "frontAndBack", PatchKind::Empty)
//!     .patch(BlockSide::Front, "frontAndBack", PatchKind::Empty)
//!     .build()
//!     .unwrap();
//! assert_eq!(mesh.n_cells(), 100);
//! assert_eq!(mesh.patches().len(), 5);
//! ```

use super::fv_mesh::FvMesh;
use super::patch::{Patch, PatchKind};
use crate::error::{FvError, Result};
use crate::types::{PatchIndex, Vector};

/// Side of a hexahedral block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockSide {
    /// x = x0
    Left,
    /// x = x1
    Right,
    /// y = y0
    Bottom,
    /// y = y1
    Top,
    /// z = z0
    Back,
    /// z = z1
    Front,
}

impl BlockSide {
    /// All sides in patch order.
    pub const ALL: [BlockSide; 6] = [
        BlockSide::Left,
        BlockSide::Right,
        BlockSide::Bottom,
        BlockSide::Top,
        BlockSide::Back,
        BlockSide::Front,
    ];

    fn default_name(self) -> &'static str {
        match self {
            BlockSide::Left => "left",
            BlockSide::Right => "right",
            BlockSide::Bottom => "bottom",
            BlockSide::Top => "top",
            BlockSide::Back => "back",
            BlockSide::Front => "front",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Builder for a structured block mesh.
#[derive(Clone, Debug)]
pub struct HexBlock {
    n: [usize; 3],
    origin: Vector,
    size: Vector,
    grading: [f64; 3],
    skew: f64,
    sides: [(String, PatchKind); 6],
    cyclic_pairs: Vec<(BlockSide, BlockSide)>,
}

impl HexBlock {
    /// Unit cube split into `nx × ny × nz` cells.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            n: [nx, ny, nz],
            origin: Vector::ZERO,
            size: Vector::new(1.0, 1.0, 1.0),
            grading: [1.0; 3],
            skew: 0.0,
            sides: BlockSide::ALL.map(|s| (s.default_name().to_string(), PatchKind::Patch)),
            cyclic_pairs: Vec::new(),
        }
    }

    /// Set the lower corner.
    pub fn origin(mut self, x: f64, y: f64, z: f64) -> Self {
        self.origin = Vector::new(x, y, z);
        self
    }

    /// Set the block extent.
    pub fn size(mut self, lx: f64, ly: f64, lz: f64) -> Self {
        self.size = Vector::new(lx, ly, lz);
        self
    }

    /// Expansion ratios (last cell size / first cell size) per direction.
    pub fn grading(mut self, gx: f64, gy: f64, gz: f64) -> Self {
        self.grading = [gx, gy, gz];
        self
    }

    /// Shear the block: `x += skew * (y - y0)`. Produces non-orthogonal faces.
    pub fn skew(mut self, skew: f64) -> Self {
        self.skew = skew;
        self
    }

    /// Name and kind of one side. Sides with the same name become one patch.
    pub fn patch(mut self, side: BlockSide, name: impl Into<String>, kind: PatchKind) -> Self {
        self.sides[side.slot()] = (name.into(), kind);
        self
    }

    /// Couple two opposite sides periodically.
    pub fn cyclic(mut self, a: BlockSide, b: BlockSide) -> Self {
        self.cyclic_pairs.push((a, b));
        self
    }

    /// Build the mesh.
    pub fn build(&self) -> Result<FvMesh> {
        let [nx, ny, nz] = self.n;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(FvError::InvalidMesh(format!(
                "block needs at least one cell per direction, got {nx}x{ny}x{nz}"
            )));
        }

        let xs = graded_coordinates(nx, self.origin.x, self.size.x, self.grading[0]);
        let ys = graded_coordinates(ny, self.origin.y, self.size.y, self.grading[1]);
        let zs = graded_coordinates(nz, self.origin.z, self.size.z, self.grading[2]);

        let pt = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let cell = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    let y = ys[j];
                    points.push(Vector::new(xs[i] + self.skew * (y - self.origin.y), y, zs[k]));
                }
            }
        }

        let mut faces = Vec::new();
        let mut owner = Vec::new();
        let mut neighbour = Vec::new();

        // Internal faces in upper-triangular order: per owner, x then y then z neighbour.
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let c = cell(i, j, k);
                    if i + 1 < nx {
                        faces.push(x_face(&pt, i + 1, j, k));
                        owner.push(c);
                        neighbour.push(cell(i + 1, j, k));
                    }
                    if j + 1 < ny {
                        faces.push(y_face(&pt, i, j + 1, k));
                        owner.push(c);
                        neighbour.push(cell(i, j + 1, k));
                    }
                    if k + 1 < nz {
                        faces.push(z_face(&pt, i, j, k + 1));
                        owner.push(c);
                        neighbour.push(cell(i, j, k + 1));
                    }
                }
            }
        }

        // Boundary faces of each side, outward normals.
        let mut side_faces: Vec<Vec<(Vec<usize>, usize)>> = vec![Vec::new(); 6];
        for k in 0..nz {
            for j in 0..ny {
                let mut f = x_face(&pt, 0, j, k);
                f.reverse();
                side_faces[BlockSide::Left.slot()].push((f, cell(0, j, k)));
                side_faces[BlockSide::Right.slot()].push((x_face(&pt, nx, j, k), cell(nx - 1, j, k)));
            }
        }
        for k in 0..nz {
            for i in 0..nx {
                let mut f = y_face(&pt, i, 0, k);
                f.reverse();
                side_faces[BlockSide::Bottom.slot()].push((f, cell(i, 0, k)));
                side_faces[BlockSide::Top.slot()].push((y_face(&pt, i, ny, k), cell(i, ny - 1, k)));
            }
        }
        for j in 0..ny {
            for i in 0..nx {
                let mut f = z_face(&pt, i, j, 0);
                f.reverse();
                side_faces[BlockSide::Back.slot()].push((f, cell(i, j, 0)));
                side_faces[BlockSide::Front.slot()].push((z_face(&pt, i, j, nz), cell(i, j, nz - 1)));
            }
        }

        // Group sides by patch name in order of first appearance.
        let mut names: Vec<(String, PatchKind, Vec<BlockSide>)> = Vec::new();
        for side in BlockSide::ALL {
            let (name, kind) = &self.sides[side.slot()];
            match names.iter_mut().find(|(n, _, _)| n == name) {
                Some(entry) => {
                    if entry.1 != *kind {
                        return Err(FvError::InvalidMesh(format!(
                            "patch '{name}' given conflicting kinds"
                        )));
                    }
                    entry.2.push(side);
                }
                None => names.push((name.clone(), *kind, vec![side])),
            }
        }

        let patch_of_side = |side: BlockSide| {
            names
                .iter()
                .position(|(_, _, sides)| sides.contains(&side))
                .map(PatchIndex::new)
        };
        let mut kinds: Vec<PatchKind> = names.iter().map(|(_, k, _)| *k).collect();
        for &(a, b) in &self.cyclic_pairs {
            let (pa, pb) = match (patch_of_side(a), patch_of_side(b)) {
                (Some(pa), Some(pb)) if pa != pb => (pa, pb),
                _ => {
                    return Err(FvError::InvalidMesh(format!(
                        "sides {a:?} and {b:?} cannot form a cyclic pair"
                    )));
                }
            };
            kinds[pa.get()] = PatchKind::Cyclic { neighbour_patch: pb };
            kinds[pb.get()] = PatchKind::Cyclic { neighbour_patch: pa };
        }

        let mut patches = Vec::with_capacity(names.len());
        for ((name, _, sides), kind) in names.iter().zip(kinds) {
            let start = faces.len();
            for side in sides {
                for (f, c) in &side_faces[side.slot()] {
                    faces.push(f.clone());
                    owner.push(*c);
                }
            }
            patches.push(Patch::new(name.clone(), start, faces.len() - start, kind));
        }

        FvMesh::new(points, faces, owner, neighbour, patches)
    }
}

/// Face normal to x at point column `i`, normal pointing +x.
fn x_face(pt: &impl Fn(usize, usize, usize) -> usize, i: usize, j: usize, k: usize) -> Vec<usize> {
    vec![pt(i, j, k), pt(i, j + 1, k), pt(i, j + 1, k + 1), pt(i, j, k + 1)]
}

/// Face normal to y at point row `j`, normal pointing +y.
fn y_face(pt: &impl Fn(usize, usize, usize) -> usize, i: usize, j: usize, k: usize) -> Vec<usize> {
    vec![pt(i, j, k), pt(i, j, k + 1), pt(i + 1, j, k + 1), pt(i + 1, j, k)]
}

/// Face normal to z at point layer `k`, normal pointing +z.
fn z_face(pt: &impl Fn(usize, usize, usize) -> usize, i: usize, j: usize, k: usize) -> Vec<usize> {
    vec![pt(i, j, k), pt(i + 1, j, k), pt(i + 1, j + 1, k), pt(i, j + 1, k)]
}

fn graded_coordinates(n: usize, origin: f64, length: f64, ratio: f64) -> Vec<f64> {
    if n == 1 || (ratio - 1.0).abs() < 1e-12 {
        return (0..=n).map(|i| origin + length * i as f64 / n as f64).collect();
    }
    let lambda = ratio.powf(1.0 / (n - 1) as f64);
    let first = length * (lambda - 1.0) / (lambda.powi(n as i32) - 1.0);
    let mut coords = Vec::with_capacity(n + 1);
    let mut x = origin;
    coords.push(x);
    let mut dx = first;
    for _ in 0..n {
        x += dx;
        coords.push(x);
        dx *= lambda;
    }
    coords[n] = origin + length;
    coords
}

/// One-dimensional mesh of `n` cells along x, unit cross-section, empty sides.
///
/// Patches: `left`, `right`, `frontAndBack` (empty).
pub fn line_mesh(n: usize, length: f64) -> Result<FvMesh> {
    HexBlock::new(n, 1, 1)
        .size(length, 1.0, 1.0)
        .patch(BlockSide::Bottom, "frontAndBack", PatchKind::Empty)
        .patch(BlockSide::Top, "frontAndBack", PatchKind::Empty)
        .patch(BlockSide::Back, "frontAndBack", PatchKind::Empty)
        .patch(BlockSide::Front, "frontAndBack", PatchKind::Empty)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_outward_boundary_normals() {
        let mesh = HexBlock::new(2, 3, 2).build().unwrap();
        let geo = mesh.geometry();
        let expected = [
            Vector::new(-1.0, 0.0, 0.0),
            Vector::X,
            Vector::new(0.0, -1.0, 0.0),
            Vector::Y,
            Vector::new(0.0, 0.0, -1.0),
            Vector::Z,
        ];
        for (patch, n) in mesh.patches().iter().zip(expected) {
            for f in patch.faces() {
                assert!((geo.face_normal(f) - n).norm() < TOL, "patch {}", patch.name);
            }
        }
    }

    #[test]
    fn test_graded_coordinates() {
        let xs = graded_coordinates(4, 0.0, 1.0, 8.0);
        assert!((xs[4] - 1.0).abs() < TOL);
        let first = xs[1] - xs[0];
        let last = xs[4] - xs[3];
        assert!((last / first - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_mesh_patches() {
        let mesh = line_mesh(10, 2.0).unwrap();
        assert_eq!(mesh.n_cells(), 10);
        assert_eq!(mesh.patches().len(), 3);
        assert_eq!(mesh.patches()[2].name, "frontAndBack");
        assert_eq!(mesh.patches()[2].size, 40);
        assert!((mesh.geometry().total_volume() - 2.0).abs() < TOL);
    }

    #[test]
    fn test_cyclic_pair() {
        let mesh = HexBlock::new(4, 2, 1)
            .cyclic(BlockSide::Left, BlockSide::Right)
            .build()
            .unwrap();
        assert_eq!(
            mesh.patches()[0].kind,
            PatchKind::Cyclic {
                neighbour_patch: PatchIndex::new(1)
            }
        );
        let geo = mesh.geometry();
        let f = mesh.patches()[0].start;
        // periodic delta spans one cell width across the seam
        assert!((geo.delta[f].norm() - 0.25).abs() < TOL);
        assert!((geo.weights[f] - 0.5).abs() < TOL);
    }

    #[test]
    fn test_skewed_block_is_non_orthogonal() {
        let mesh = HexBlock::new(3, 3, 1).skew(0.5).build().unwrap();
        let geo = mesh.geometry();
        let max_corr = (0..mesh.n_internal_faces())
            .map(|f| geo.non_orth_correction[f].norm())
            .fold(0.0, f64::max);
        assert!(max_corr > 0.1);
        assert!((geo.total_volume() - 1.0).abs() < 1e-10);
    }
}
