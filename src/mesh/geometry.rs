//! Demand-driven geometric quantities.
//!
//! Everything here is derived from point coordinates and face/cell
//! connectivity. A [`MeshGeometry`] is built once per mesh generation and
//! shared behind an `Arc`; `FvMesh::move_points` makes it stale.
//!
//! Face arrays cover all faces (internal first, then patch blocks) so a face
//! label indexes them directly.

use super::patch::{Patch, PatchKind};
use crate::types::{ROOT_VSMALL, VSMALL, Vector};

/// Lower bound on `n & d / |d|` in non-orthogonal delta coefficients.
const NON_ORTH_DELTA_LIMIT: f64 = 0.05;

/// Geometric data for one mesh generation.
#[derive(Clone, Debug)]
pub struct MeshGeometry {
    /// Mesh generation this data was computed for
    pub generation: u64,
    /// Face centroids
    pub face_centres: Vec<Vector>,
    /// Face area vectors, pointing out of the owner cell
    pub face_areas: Vec<Vector>,
    /// Face area magnitudes
    pub mag_face_areas: Vec<f64>,
    /// Cell centroids
    pub cell_centres: Vec<Vector>,
    /// Cell volumes
    pub cell_volumes: Vec<f64>,
    /// Owner-to-neighbour displacement per face (patch-normal for non-coupled boundary faces)
    pub delta: Vec<Vector>,
    /// Linear interpolation weight of the owner value (1 on non-coupled boundary faces)
    pub weights: Vec<f64>,
    /// `1/|d|`
    pub delta_coeffs: Vec<f64>,
    /// `1/max(n & d, 0.05 |d|)`
    pub non_orth_delta_coeffs: Vec<f64>,
    /// `n - d * non_orth_delta_coeff`, zero on non-coupled boundary faces
    pub non_orth_correction: Vec<Vector>,
}

impl MeshGeometry {
    /// Unit face normal.
    #[inline]
    pub fn face_normal(&self, face: usize) -> Vector {
        self.face_areas[face] / self.mag_face_areas[face].max(VSMALL)
    }

    /// Total mesh volume.
    pub fn total_volume(&self) -> f64 {
        self.cell_volumes.iter().sum()
    }
}

/// Inputs needed to build [`MeshGeometry`].
pub(crate) struct GeometryInput<'a> {
    pub generation: u64,
    pub points: &'a [Vector],
    pub faces: &'a [Vec<usize>],
    pub owner: &'a [usize],
    pub neighbour: &'a [usize],
    pub n_cells: usize,
    pub patches: &'a [Patch],
    /// Per patch: neighbour-side `Cf - C` for processor patches, when synchronised
    pub coupled_nbr_delta: &'a [Option<Vec<Vector>>],
}

pub(crate) fn compute_geometry(input: &GeometryInput<'_>) -> MeshGeometry {
    let n_faces = input.faces.len();
    let n_internal = input.neighbour.len();

    let (face_centres, face_areas) = face_centres_and_areas(input.points, input.faces);
    let mag_face_areas: Vec<f64> = face_areas.iter().map(|a| a.norm()).collect();
    let (cell_centres, cell_volumes) = cell_centres_and_volumes(
        &face_centres,
        &face_areas,
        input.owner,
        input.neighbour,
        input.n_cells,
    );

    let mut delta = vec![Vector::ZERO; n_faces];
    let mut weights = vec![1.0; n_faces];

    for f in 0..n_internal {
        let own = input.owner[f];
        let nei = input.neighbour[f];
        delta[f] = cell_centres[nei] - cell_centres[own];

        let sf = face_areas[f];
        let sfd_own = sf.dot(&(face_centres[f] - cell_centres[own])).abs();
        let sfd_nei = sf.dot(&(cell_centres[nei] - face_centres[f])).abs();
        weights[f] = if sfd_own + sfd_nei > VSMALL {
            sfd_nei / (sfd_own + sfd_nei)
        } else {
            0.5
        };
    }

    for (patch_i, patch) in input.patches.iter().enumerate() {
        for (i, f) in patch.faces().enumerate() {
            let own = input.owner[f];
            let own_delta = face_centres[f] - cell_centres[own];
            let n = face_areas[f] / mag_face_areas[f].max(VSMALL);

            let nbr_delta = match patch.kind {
                PatchKind::Cyclic { neighbour_patch } => {
                    let nbr = &input.patches[neighbour_patch.get()];
                    let nf = nbr.start + i;
                    Some(face_centres[nf] - cell_centres[input.owner[nf]])
                }
                PatchKind::Processor { .. } => Some(
                    input.coupled_nbr_delta[patch_i]
                        .as_ref()
                        .map(|d| d[i])
                        .unwrap_or(-own_delta),
                ),
                _ => None,
            };

            match nbr_delta {
                Some(nbr_delta) => {
                    delta[f] = own_delta - nbr_delta;
                    let d_own = n.dot(&own_delta).abs();
                    let d_nei = n.dot(&nbr_delta).abs();
                    weights[f] = if d_own + d_nei > VSMALL {
                        d_nei / (d_own + d_nei)
                    } else {
                        0.5
                    };
                }
                None => {
                    delta[f] = n * n.dot(&own_delta);
                    weights[f] = 1.0;
                }
            }
        }
    }

    let mut delta_coeffs = vec![0.0; n_faces];
    let mut non_orth_delta_coeffs = vec![0.0; n_faces];
    let mut non_orth_correction = vec![Vector::ZERO; n_faces];

    for f in 0..n_faces {
        let d = delta[f];
        let mag_d = d.norm().max(VSMALL);
        delta_coeffs[f] = 1.0 / mag_d;

        let n = face_areas[f] / mag_face_areas[f].max(VSMALL);
        let nd = n.dot(&d).max(NON_ORTH_DELTA_LIMIT * mag_d);
        non_orth_delta_coeffs[f] = 1.0 / nd;
        non_orth_correction[f] = n - d * non_orth_delta_coeffs[f];
    }

    for patch in input.patches.iter().filter(|p| !p.is_coupled()) {
        for f in patch.faces() {
            non_orth_correction[f] = Vector::ZERO;
        }
    }

    MeshGeometry {
        generation: input.generation,
        face_centres,
        face_areas,
        mag_face_areas,
        cell_centres,
        cell_volumes,
        delta,
        weights,
        delta_coeffs,
        non_orth_delta_coeffs,
        non_orth_correction,
    }
}

/// Face centroids and area vectors by triangle decomposition about the point average.
fn face_centres_and_areas(points: &[Vector], faces: &[Vec<usize>]) -> (Vec<Vector>, Vec<Vector>) {
    let mut centres = Vec::with_capacity(faces.len());
    let mut areas = Vec::with_capacity(faces.len());

    for face in faces {
        let n_pts = face.len();
        if n_pts == 3 {
            let (p0, p1, p2) = (points[face[0]], points[face[1]], points[face[2]]);
            centres.push((p0 + p1 + p2) / 3.0);
            areas.push((p1 - p0).cross(&(p2 - p0)) * 0.5);
            continue;
        }

        let mut estimate = Vector::ZERO;
        for &p in face {
            estimate += points[p];
        }
        estimate = estimate / n_pts as f64;

        let mut sum_n = Vector::ZERO;
        let mut sum_a = 0.0;
        let mut sum_ac = Vector::ZERO;
        for i in 0..n_pts {
            let this = points[face[i]];
            let next = points[face[(i + 1) % n_pts]];
            let c = this + next + estimate;
            let n = (next - this).cross(&(estimate - this));
            let a = n.norm();
            sum_n += n;
            sum_a += a;
            sum_ac += c * a;
        }

        if sum_a < ROOT_VSMALL {
            centres.push(estimate);
            areas.push(Vector::ZERO);
        } else {
            centres.push(sum_ac / (3.0 * sum_a));
            areas.push(sum_n * 0.5);
        }
    }

    (centres, areas)
}

/// Cell centroids and volumes by pyramid decomposition about the face-centre average.
fn cell_centres_and_volumes(
    face_centres: &[Vector],
    face_areas: &[Vector],
    owner: &[usize],
    neighbour: &[usize],
    n_cells: usize,
) -> (Vec<Vector>, Vec<f64>) {
    let mut estimate = vec![Vector::ZERO; n_cells];
    let mut n_cell_faces = vec![0usize; n_cells];

    for (f, &own) in owner.iter().enumerate() {
        estimate[own] += face_centres[f];
        n_cell_faces[own] += 1;
    }
    for (f, &nei) in neighbour.iter().enumerate() {
        estimate[nei] += face_centres[f];
        n_cell_faces[nei] += 1;
    }
    for (e, &n) in estimate.iter_mut().zip(n_cell_faces.iter()) {
        if n > 0 {
            *e = *e / n as f64;
        }
    }

    let mut centres = vec![Vector::ZERO; n_cells];
    let mut volumes = vec![0.0; n_cells];

    for (f, &own) in owner.iter().enumerate() {
        let pyr3_vol = face_areas[f].dot(&(face_centres[f] - estimate[own])).max(VSMALL);
        let pc = face_centres[f] * 0.75 + estimate[own] * 0.25;
        centres[own] += pc * pyr3_vol;
        volumes[own] += pyr3_vol;
    }
    for (f, &nei) in neighbour.iter().enumerate() {
        let pyr3_vol = face_areas[f].dot(&(estimate[nei] - face_centres[f])).max(VSMALL);
        let pc = face_centres[f] * 0.75 + estimate[nei] * 0.25;
        centres[nei] += pc * pyr3_vol;
        volumes[nei] += pyr3_vol;
    }

    for c in 0..n_cells {
        if volumes[c].abs() > VSMALL {
            centres[c] = centres[c] / volumes[c];
        } else {
            centres[c] = estimate[c];
        }
        volumes[c] /= 3.0;
    }

    (centres, volumes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_unit_square_face() {
        let points = vec![
            Vector::new(0.0, 0.0, 0.0),
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(1.0, 1.0, 0.0),
            Vector::new(0.0, 1.0, 0.0),
        ];
        let faces = vec![vec![0, 1, 2, 3]];
        let (c, a) = face_centres_and_areas(&points, &faces);
        assert!((c[0] - Vector::new(0.5, 0.5, 0.0)).norm() < TOL);
        assert!((a[0] - Vector::new(0.0, 0.0, 1.0)).norm() < TOL);
    }

    #[test]
    fn test_triangle_face() {
        let points = vec![
            Vector::new(0.0, 0.0, 0.0),
            Vector::new(2.0, 0.0, 0.0),
            Vector::new(0.0, 2.0, 0.0),
        ];
        let (c, a) = face_centres_and_areas(&points, &[vec![0, 1, 2]]);
        assert!((a[0].z - 2.0).abs() < TOL);
        assert!((c[0] - Vector::new(2.0 / 3.0, 2.0 / 3.0, 0.0)).norm() < TOL);
    }
}
