//! Courant number from a volumetric face flux.

use crate::error::Result;
use crate::field::SurfaceField;
use crate::mesh::FvMesh;
use crate::parallel::{global_max, global_sum};
use crate::types::PatchIndex;

/// Mean and maximum Courant number over all domains.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CourantReport {
    pub mean: f64,
    pub max: f64,
}

/// `Σ_f |φ_f|` per cell over internal and non-empty patch faces.
pub(crate) fn sum_mag_flux(mesh: &FvMesh, phi: &SurfaceField<f64>) -> Vec<f64> {
    let mut sum = vec![0.0; mesh.n_cells()];
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    for (f, flux) in phi.internal().iter().enumerate() {
        sum[owner[f]] += flux.abs();
        sum[neighbour[f]] += flux.abs();
    }
    for (p, patch) in mesh.patches().iter().enumerate() {
        if patch.kind.is_empty_kind() {
            continue;
        }
        let index = PatchIndex::new(p);
        for (&c, flux) in mesh.face_cells(index).iter().zip(phi.patch(index)) {
            sum[c] += flux.abs();
        }
    }
    sum
}

/// `Co = ½ Δt Σ_f |φ_f| / V` per cell; the mean weights by volume.
pub fn courant_number(mesh: &FvMesh, phi: &SurfaceField<f64>, delta_t: f64) -> Result<CourantReport> {
    phi.check_mesh(mesh)?;
    let geo = mesh.geometry();
    let sum_phi = sum_mag_flux(mesh, phi);

    let local_max = sum_phi
        .iter()
        .zip(&geo.cell_volumes)
        .map(|(s, v)| s / v)
        .fold(0.0, f64::max);
    let comm = mesh.comm();
    let max = 0.5 * global_max(comm, local_max)? * delta_t;
    let total_phi = global_sum(comm, sum_phi.iter().sum())?;
    let total_volume = global_sum(comm, geo.total_volume())?;
    let mean = if total_volume > 0.0 {
        0.5 * total_phi / total_volume * delta_t
    } else {
        0.0
    };

    log::info!("Courant Number mean: {mean} max: {max}");
    Ok(CourantReport { mean, max })
}
