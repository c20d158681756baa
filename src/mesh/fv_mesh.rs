//! Finite-volume mesh with LDU addressing.
//!
//! Face `f` is owned by cell `owner[f]`. Internal faces (the first
//! `n_internal_faces`) also have a `neighbour[f]`; boundary faces follow,
//! grouped into contiguous patch blocks in patch order. Internal faces are in
//! upper-triangular order (sorted by owner, then neighbour).
//!
//! Geometry and registered mesh objects are computed on demand and tagged
//! with the mesh generation. [`FvMesh::move_points`] bumps the generation, so
//! every cached item is recomputed lazily on next access.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use super::addressing::{MeshAddressing, compute_addressing};
use super::geometry::{GeometryInput, MeshGeometry, compute_geometry};
use super::patch::{Patch, PatchKind};
use crate::error::{FvError, Result};
use crate::parallel::{Communicator, SerialComm, exchange_values};
use crate::types::{CellIndex, PatchIndex, Vector};

static NEXT_MESH_UID: AtomicU64 = AtomicU64::new(1);

struct CachedObject {
    generation: u64,
    value: Arc<dyn Any + Send + Sync>,
}

/// Polyhedral finite-volume mesh.
pub struct FvMesh {
    points: Vec<Vector>,
    faces: Vec<Vec<usize>>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    n_cells: usize,
    patches: Vec<Patch>,

    uid: u64,
    generation: u64,
    comm: Arc<dyn Communicator>,
    coupled_nbr_delta: Vec<Option<Vec<Vector>>>,

    addressing: OnceLock<MeshAddressing>,
    geometry: Mutex<Option<Arc<MeshGeometry>>>,
    objects: Mutex<HashMap<&'static str, CachedObject>>,
}

impl std::fmt::Debug for FvMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FvMesh")
            .field("uid", &self.uid)
            .field("generation", &self.generation)
            .field("rank", &self.comm.rank())
            .field("n_points", &self.points.len())
            .field("n_cells", &self.n_cells)
            .field("n_faces", &self.faces.len())
            .field("n_internal_faces", &self.neighbour.len())
            .field("patches", &self.patches)
            .finish()
    }
}

impl Clone for FvMesh {
    /// Clones topology and points; the clone is a distinct mesh with empty caches.
    fn clone(&self) -> Self {
        Self {
            points: self.points.clone(),
            faces: self.faces.clone(),
            owner: self.owner.clone(),
            neighbour: self.neighbour.clone(),
            n_cells: self.n_cells,
            patches: self.patches.clone(),
            uid: NEXT_MESH_UID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            comm: Arc::clone(&self.comm),
            coupled_nbr_delta: self.coupled_nbr_delta.clone(),
            addressing: OnceLock::new(),
            geometry: Mutex::new(None),
            objects: Mutex::new(HashMap::new()),
        }
    }
}

impl FvMesh {
    /// Build a mesh from raw connectivity, validating LDU ordering and patch layout.
    ///
    /// # Arguments
    /// * `points` - Point coordinates
    /// * `faces` - Point labels of each face, ordered so the area vector points out of the owner
    /// * `owner` - Owner cell of every face
    /// * `neighbour` - Neighbour cell of each internal face
    /// * `patches` - Contiguous boundary face blocks, in face order
    pub fn new(
        points: Vec<Vector>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<Patch>,
    ) -> Result<Self> {
        if owner.len() != faces.len() {
            return Err(FvError::size_mismatch("owner list", faces.len(), owner.len()));
        }
        let n_internal = neighbour.len();
        if n_internal > faces.len() {
            return Err(FvError::InvalidMesh(format!(
                "{n_internal} neighbours for {} faces",
                faces.len()
            )));
        }

        let n_cells = owner
            .iter()
            .chain(neighbour.iter())
            .copied()
            .max()
            .map_or(0, |m| m + 1);

        for (f, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(FvError::InvalidMesh(format!(
                    "face {f} has {} points",
                    face.len()
                )));
            }
            if let Some(&p) = face.iter().find(|&&p| p >= points.len()) {
                return Err(FvError::InvalidMesh(format!(
                    "face {f} uses point {p} of {}",
                    points.len()
                )));
            }
        }

        let mut last = (0usize, 0usize);
        for f in 0..n_internal {
            let (own, nei) = (owner[f], neighbour[f]);
            if own == nei {
                return Err(FvError::InvalidMesh(format!(
                    "internal face {f} has owner == neighbour == {own}"
                )));
            }
            if f > 0 && (own, nei) < last {
                return Err(FvError::InvalidMesh(format!(
                    "internal face {f} ({own}, {nei}) breaks upper-triangular order"
                )));
            }
            last = (own, nei);
        }

        let mut expected_start = n_internal;
        for (i, patch) in patches.iter().enumerate() {
            if patch.start != expected_start {
                return Err(FvError::InvalidMesh(format!(
                    "patch '{}' starts at face {}, expected {expected_start}",
                    patch.name, patch.start
                )));
            }
            expected_start += patch.size;

            if let PatchKind::Cyclic { neighbour_patch } = patch.kind {
                let nbr = patches.get(neighbour_patch.get()).ok_or_else(|| {
                    FvError::InvalidMesh(format!(
                        "cyclic patch '{}' refers to missing patch {neighbour_patch}",
                        patch.name
                    ))
                })?;
                let back = matches!(nbr.kind, PatchKind::Cyclic { neighbour_patch: b } if b.get() == i);
                if !back || nbr.size != patch.size {
                    return Err(FvError::InvalidMesh(format!(
                        "cyclic patches '{}' and '{}' do not match",
                        patch.name, nbr.name
                    )));
                }
            }
        }
        for (i, patch) in patches.iter().enumerate() {
            let PatchKind::Processor { neighbour_rank, tag } = patch.kind else {
                continue;
            };
            let clash = patches[..i].iter().find(|p| {
                matches!(p.kind, PatchKind::Processor { neighbour_rank: r, tag: t }
                    if r == neighbour_rank && t == tag)
            });
            if let Some(other) = clash {
                return Err(FvError::InvalidMesh(format!(
                    "processor patches '{}' and '{}' both face rank {neighbour_rank} with tag {tag}",
                    other.name, patch.name
                )));
            }
        }
        if expected_start != faces.len() {
            return Err(FvError::InvalidMesh(format!(
                "patches cover faces up to {expected_start}, mesh has {}",
                faces.len()
            )));
        }

        let n_patches = patches.len();
        Ok(Self {
            points,
            faces,
            owner,
            neighbour,
            n_cells,
            patches,
            uid: NEXT_MESH_UID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            comm: Arc::new(SerialComm),
            coupled_nbr_delta: vec![None; n_patches],
            addressing: OnceLock::new(),
            geometry: Mutex::new(None),
            objects: Mutex::new(HashMap::new()),
        })
    }

    // =========================================================================
    // Sizes and identity
    // =========================================================================

    /// Unique identifier of this mesh instance.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Attach the communicator used by processor patches and global reductions.
    pub fn with_communicator(mut self, comm: Arc<dyn Communicator>) -> Self {
        self.comm = comm;
        self
    }

    /// Communicator for this domain.
    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Current generation; bumped by every point motion.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    // =========================================================================
    // Topology
    // =========================================================================

    pub fn points(&self) -> &[Vector] {
        &self.points
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// Owner cell of every face.
    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    /// Neighbour cell of every internal face.
    pub fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    /// Lower LDU addressing (same as owner, internal faces only).
    pub fn lower_addr(&self) -> &[usize] {
        &self.owner[..self.neighbour.len()]
    }

    /// Upper LDU addressing (same as neighbour).
    pub fn upper_addr(&self) -> &[usize] {
        &self.neighbour
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patch(&self, patch: PatchIndex) -> &Patch {
        &self.patches[patch.get()]
    }

    /// Look up a patch by name.
    pub fn patch_by_name(&self, name: &str) -> Result<PatchIndex> {
        self.patches
            .iter()
            .position(|p| p.name == name)
            .map(PatchIndex::new)
            .ok_or_else(|| FvError::not_found("patch", name))
    }

    /// Patches in the order their halo exchanges are issued.
    ///
    /// Non-processor patches keep their mesh order and come first. Processor
    /// patches follow, sorted by neighbour rank and tag, so every rank meets
    /// its shared interfaces in the same global order and blocking exchanges
    /// cannot wait on each other.
    pub fn patch_exchange_order(&self) -> Vec<PatchIndex> {
        let mut processors: Vec<(usize, usize, usize)> = Vec::new();
        let mut order = Vec::with_capacity(self.patches.len());
        for (i, patch) in self.patches.iter().enumerate() {
            match patch.kind {
                PatchKind::Processor { neighbour_rank, tag } => {
                    processors.push((neighbour_rank, tag, i));
                }
                _ => order.push(PatchIndex::new(i)),
            }
        }
        processors.sort_unstable();
        order.extend(processors.into_iter().map(|(_, _, i)| PatchIndex::new(i)));
        order
    }

    /// Owner cells of a patch's faces.
    pub fn face_cells(&self, patch: PatchIndex) -> &[usize] {
        let p = &self.patches[patch.get()];
        &self.owner[p.faces()]
    }

    /// Derived addressing (cell faces, stencils, owner start).
    pub fn addressing(&self) -> &MeshAddressing {
        self.addressing.get_or_init(|| {
            compute_addressing(
                self.points.len(),
                &self.faces,
                &self.owner,
                &self.neighbour,
                self.n_cells,
            )
        })
    }

    /// Face-neighbour cells of a cell.
    pub fn cell_cells(&self, cell: CellIndex) -> &[usize] {
        &self.addressing().cell_cells[cell.get()]
    }

    /// Faces of a cell.
    pub fn cell_faces(&self, cell: CellIndex) -> &[usize] {
        &self.addressing().cell_faces[cell.get()]
    }

    /// Unit vector mask of solved directions: 0 along directions closed by empty patches.
    pub fn solution_directions(&self) -> Vector {
        let geo = self.geometry();
        let mut empty_dir = Vector::ZERO;
        for patch in self.patches.iter().filter(|p| p.kind.is_empty_kind()) {
            for f in patch.faces() {
                let a = geo.face_areas[f];
                empty_dir += Vector::new(a.x.abs(), a.y.abs(), a.z.abs());
            }
        }
        let norm = empty_dir.norm();
        if norm <= 0.0 {
            return Vector::new(1.0, 1.0, 1.0);
        }
        let e = empty_dir / norm;
        Vector::new(
            if e.x > 1e-6 { 0.0 } else { 1.0 },
            if e.y > 1e-6 { 0.0 } else { 1.0 },
            if e.z > 1e-6 { 0.0 } else { 1.0 },
        )
    }

    /// Unit axis vectors of the directions that are not solved for.
    pub fn empty_directions(&self) -> Vec<Vector> {
        let sol = self.solution_directions();
        [Vector::X, Vector::Y, Vector::Z]
            .into_iter()
            .enumerate()
            .filter(|(i, _)| sol[*i] == 0.0)
            .map(|(_, v)| v)
            .collect()
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Geometric data for the current generation, computed on first access.
    pub fn geometry(&self) -> Arc<MeshGeometry> {
        let mut guard = match self.geometry.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(geo) = guard.as_ref() {
            if geo.generation == self.generation {
                return Arc::clone(geo);
            }
        }
        log::debug!(
            "Computing geometry for mesh {} generation {}",
            self.uid,
            self.generation
        );
        let geo = Arc::new(compute_geometry(&GeometryInput {
            generation: self.generation,
            points: &self.points,
            faces: &self.faces,
            owner: &self.owner,
            neighbour: &self.neighbour,
            n_cells: self.n_cells,
            patches: &self.patches,
            coupled_nbr_delta: &self.coupled_nbr_delta,
        }));
        *guard = Some(Arc::clone(&geo));
        geo
    }

    /// Cell volumes.
    pub fn volumes(&self) -> Vec<f64> {
        self.geometry().cell_volumes.clone()
    }

    /// Move points; every geometric cache becomes stale.
    pub fn move_points(&mut self, new_points: Vec<Vector>) -> Result<()> {
        if new_points.len() != self.points.len() {
            return Err(FvError::size_mismatch(
                "moved points",
                self.points.len(),
                new_points.len(),
            ));
        }
        self.points = new_points;
        self.generation += 1;
        for d in self.coupled_nbr_delta.iter_mut() {
            *d = None;
        }
        log::debug!("Mesh {} moved to generation {}", self.uid, self.generation);
        Ok(())
    }

    /// Exchange neighbour-side cell-to-face vectors across processor patches.
    ///
    /// Without this, processor patch geometry assumes the neighbour cell mirrors
    /// the owner cell about the face. Must be repeated after `move_points`.
    pub fn sync_coupled_geometry(&mut self) -> Result<()> {
        let comm = Arc::clone(&self.comm);
        let geo = self.geometry();
        let mut received = vec![None; self.patches.len()];
        for index in self.patch_exchange_order() {
            let patch = &self.patches[index.get()];
            let nbr = match patch.kind {
                PatchKind::Processor { neighbour_rank, tag } => {
                    let own: Vec<Vector> = patch
                        .faces()
                        .map(|f| geo.face_centres[f] - geo.cell_centres[self.owner[f]])
                        .collect();
                    Some(exchange_values(comm.as_ref(), &own, neighbour_rank, tag)?)
                }
                _ => None,
            };
            received[index.get()] = nbr;
        }
        self.coupled_nbr_delta = received;
        self.generation += 1;
        Ok(())
    }

    /// Fetch a generation-tagged mesh object, rebuilding it when stale.
    ///
    /// Used for stencil weights and other data that depends on geometry and is
    /// shared between all fields on this mesh.
    pub fn cached_object<V, F>(&self, key: &'static str, build: F) -> Result<Arc<V>>
    where
        V: Any + Send + Sync,
        F: FnOnce(&FvMesh) -> Result<V>,
    {
        {
            let objects = match self.objects.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(entry) = objects.get(key) {
                if entry.generation == self.generation {
                    if let Ok(v) = Arc::clone(&entry.value).downcast::<V>() {
                        return Ok(v);
                    }
                }
            }
        }

        log::debug!("Building mesh object '{key}' for generation {}", self.generation);
        let value = Arc::new(build(self)?);
        let mut objects = match self.objects.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        objects.insert(
            key,
            CachedObject {
                generation: self.generation,
                value: value.clone() as Arc<dyn Any + Send + Sync>,
            },
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{BlockSide, HexBlock};

    const TOL: f64 = 1e-12;

    #[test]
    fn test_unit_cube_geometry() {
        let mesh = HexBlock::new(2, 2, 2).build().unwrap();
        assert_eq!(mesh.n_cells(), 8);
        assert_eq!(mesh.n_internal_faces(), 12);
        assert_eq!(mesh.n_faces(), 36);
        let geo = mesh.geometry();
        assert!((geo.total_volume() - 1.0).abs() < TOL);
        for v in &geo.cell_volumes {
            assert!((v - 0.125).abs() < TOL);
        }
        for f in 0..mesh.n_internal_faces() {
            assert!((geo.weights[f] - 0.5).abs() < TOL);
            assert!((geo.delta_coeffs[f] - 2.0).abs() < TOL);
            // area vector points from owner to neighbour
            assert!(geo.face_areas[f].dot(&geo.delta[f]) > 0.0);
        }
    }

    #[test]
    fn test_move_points_invalidates_geometry() {
        let mut mesh = HexBlock::new(2, 1, 1).build().unwrap();
        let before = mesh.geometry();
        assert_eq!(before.generation, 0);
        let scaled: Vec<Vector> = mesh.points().iter().map(|p| *p * 2.0).collect();
        mesh.move_points(scaled).unwrap();
        let after = mesh.geometry();
        assert_eq!(after.generation, 1);
        assert!((after.total_volume() - 8.0).abs() < TOL);
        assert!((before.total_volume() - 1.0).abs() < TOL);
        assert!(mesh.move_points(vec![Vector::ZERO]).is_err());
    }

    #[test]
    fn test_cached_object_rebuilt_after_motion() {
        let mut mesh = HexBlock::new(3, 1, 1).build().unwrap();
        let count = std::sync::atomic::AtomicUsize::new(0);
        let build = |m: &FvMesh| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(m.geometry().total_volume())
        };
        let a = mesh.cached_object("volume", build).unwrap();
        let b = mesh.cached_object("volume", build).unwrap();
        assert_eq!(*a, *b);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let moved: Vec<Vector> = mesh.points().iter().map(|p| *p * 0.5).collect();
        mesh.move_points(moved).unwrap();
        let c = mesh.cached_object("volume", build).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!((*c - 0.125).abs() < TOL);
    }

    #[test]
    fn test_rejects_bad_patch_layout() {
        let mesh = HexBlock::new(1, 1, 1).build().unwrap();
        let mut patches = mesh.patches().to_vec();
        patches[1].start += 1;
        let err = FvMesh::new(
            mesh.points().to_vec(),
            mesh.faces().to_vec(),
            mesh.owner().to_vec(),
            mesh.neighbour().to_vec(),
            patches,
        );
        assert!(matches!(err, Err(FvError::InvalidMesh(_))));
    }

    #[test]
    fn test_patch_lookup() {
        let mesh = HexBlock::new(2, 2, 1).build().unwrap();
        let left = mesh.patch_by_name("left").unwrap();
        assert_eq!(mesh.face_cells(left), &[0, 2]);
        assert!(matches!(
            mesh.patch_by_name("nowhere"),
            Err(FvError::NotFound { .. })
        ));
    }

    #[test]
    fn test_solution_directions_of_line_mesh() {
        let mesh = crate::mesh::line_mesh(5, 1.0).unwrap();
        assert_eq!(mesh.solution_directions(), Vector::new(1.0, 0.0, 0.0));
        assert_eq!(mesh.empty_directions(), vec![Vector::Y, Vector::Z]);
    }

    #[test]
    fn test_processor_patches_exchange_in_rank_then_tag_order() {
        let processor = |neighbour_rank, tag| PatchKind::Processor { neighbour_rank, tag };
        let mesh = HexBlock::new(2, 2, 1)
            .patch(BlockSide::Left, "toRank2b", processor(2, 5))
            .patch(BlockSide::Right, "toRank1", processor(1, 3))
            .patch(BlockSide::Bottom, "toRank2a", processor(2, 0))
            .build()
            .unwrap();
        let names: Vec<&str> = mesh
            .patch_exchange_order()
            .into_iter()
            .map(|p| mesh.patches()[p.get()].name.as_str())
            .collect();
        assert_eq!(names.len(), mesh.patches().len());
        assert_eq!(&names[names.len() - 3..], ["toRank1", "toRank2a", "toRank2b"]);
        for name in &names[..names.len() - 3] {
            assert!(!name.starts_with("toRank"));
        }
    }

    #[test]
    fn test_duplicate_processor_tag_is_rejected() {
        let processor = PatchKind::Processor {
            neighbour_rank: 1,
            tag: 0,
        };
        let err = HexBlock::new(2, 1, 1)
            .patch(BlockSide::Left, "procLeft", processor)
            .patch(BlockSide::Right, "procRight", processor)
            .build()
            .unwrap_err();
        assert!(matches!(err, FvError::InvalidMesh(_)), "{err}");
    }
}
