//! Mesh topology, addressing and geometry.
//!
//! - [`FvMesh`]: owner/neighbour (LDU) addressing, patches, demand-driven geometry
//! - [`MeshGeometry`]: volumes, face areas, centroids, interpolation weights
//! - [`MeshAddressing`]: cell faces, face- and point-neighbour stencils
//! - [`HexBlock`], [`line_mesh`]: structured mesh builders
//! - [`MeshMapper`]: new-to-old maps for topology changes

mod addressing;
mod block;
mod fv_mesh;
mod geometry;
mod mapper;
mod patch;

pub use addressing::MeshAddressing;
pub use block::{BlockSide, HexBlock, line_mesh};
pub use fv_mesh::FvMesh;
pub use geometry::MeshGeometry;
pub use mapper::{MeshMapper, map_values};
pub use patch::{Patch, PatchKind};
