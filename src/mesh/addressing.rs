//! Topology-derived addressing.
//!
//! Built lazily from owner/neighbour and face-point lists. Topology does not
//! change under `move_points`, so this data is never invalidated.

/// Derived cell, face and point connectivity.
#[derive(Clone, Debug)]
pub struct MeshAddressing {
    /// Faces of each cell (internal and boundary)
    pub cell_faces: Vec<Vec<usize>>,
    /// Face-neighbour cells of each cell
    pub cell_cells: Vec<Vec<usize>>,
    /// Points of each cell
    pub cell_points: Vec<Vec<usize>>,
    /// Cells using each point
    pub point_cells: Vec<Vec<usize>>,
    /// Cells sharing at least one point with each cell, excluding the cell itself
    pub cell_point_cells: Vec<Vec<usize>>,
    /// `owner_start[c]..owner_start[c+1]` are the internal faces owned by `c`
    pub owner_start: Vec<usize>,
    /// Internal faces ordered by neighbour
    pub losort: Vec<usize>,
    /// `losort_start[c]..losort_start[c+1]` index `losort` for faces with neighbour `c`
    pub losort_start: Vec<usize>,
}

pub(crate) fn compute_addressing(
    n_points: usize,
    faces: &[Vec<usize>],
    owner: &[usize],
    neighbour: &[usize],
    n_cells: usize,
) -> MeshAddressing {
    let n_internal = neighbour.len();

    let mut cell_faces = vec![Vec::new(); n_cells];
    for (f, &own) in owner.iter().enumerate() {
        cell_faces[own].push(f);
    }
    for (f, &nei) in neighbour.iter().enumerate() {
        cell_faces[nei].push(f);
    }
    for faces_of_cell in cell_faces.iter_mut() {
        faces_of_cell.sort_unstable();
    }

    let mut cell_cells = vec![Vec::new(); n_cells];
    for f in 0..n_internal {
        cell_cells[owner[f]].push(neighbour[f]);
        cell_cells[neighbour[f]].push(owner[f]);
    }
    for cc in cell_cells.iter_mut() {
        cc.sort_unstable();
        cc.dedup();
    }

    let mut cell_points = vec![Vec::new(); n_cells];
    for (c, cf) in cell_faces.iter().enumerate() {
        let pts = &mut cell_points[c];
        for &f in cf {
            pts.extend_from_slice(&faces[f]);
        }
        pts.sort_unstable();
        pts.dedup();
    }

    let mut point_cells = vec![Vec::new(); n_points];
    for (c, pts) in cell_points.iter().enumerate() {
        for &p in pts {
            point_cells[p].push(c);
        }
    }

    let mut cell_point_cells = vec![Vec::new(); n_cells];
    for (c, pts) in cell_points.iter().enumerate() {
        let stencil = &mut cell_point_cells[c];
        for &p in pts {
            stencil.extend(point_cells[p].iter().copied().filter(|&other| other != c));
        }
        stencil.sort_unstable();
        stencil.dedup();
    }

    let mut owner_start = vec![0usize; n_cells + 1];
    for &own in &owner[..n_internal] {
        owner_start[own + 1] += 1;
    }
    for c in 0..n_cells {
        owner_start[c + 1] += owner_start[c];
    }

    let mut losort: Vec<usize> = (0..n_internal).collect();
    losort.sort_by_key(|&f| (neighbour[f], f));
    let mut losort_start = vec![0usize; n_cells + 1];
    for &nei in neighbour {
        losort_start[nei + 1] += 1;
    }
    for c in 0..n_cells {
        losort_start[c + 1] += losort_start[c];
    }

    MeshAddressing {
        cell_faces,
        cell_cells,
        cell_points,
        point_cells,
        cell_point_cells,
        owner_start,
        losort,
        losort_start,
    }
}
