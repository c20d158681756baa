//! Boundary patches.
//!
//! Boundary faces are grouped into named patches. Each patch is a
//! contiguous block of face labels appended after the internal faces.

use serde::{Deserialize, Serialize};

use crate::types::PatchIndex;

/// Geometric kind of a boundary patch.
///
/// The kind constrains which boundary conditions a field may use on the
/// patch: coupled kinds always get a coupled condition, `Empty` always gets
/// the empty condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PatchKind {
    /// Generic boundary
    #[default]
    Patch,

    /// Solid wall
    Wall,

    /// Out-of-plane faces of a 1-D or 2-D mesh; carry no data
    Empty,

    /// Mirror plane
    Symmetry,

    /// Periodic boundary paired with another patch of the same mesh
    Cyclic { neighbour_patch: PatchIndex },

    /// Inter-domain boundary facing `neighbour_rank`.
    ///
    /// The two facing patches carry the same `tag`. Patches of one mesh that
    /// face the same rank need distinct tags.
    Processor { neighbour_rank: usize, tag: usize },
}

impl PatchKind {
    /// Whether faces of this patch couple to cells on the other side.
    pub fn is_coupled(&self) -> bool {
        matches!(self, PatchKind::Cyclic { .. } | PatchKind::Processor { .. })
    }

    /// Whether this is an empty patch.
    pub fn is_empty_kind(&self) -> bool {
        matches!(self, PatchKind::Empty)
    }

    /// Keyword used in field and mesh files.
    pub fn keyword(&self) -> &'static str {
        match self {
            PatchKind::Patch => "patch",
            PatchKind::Wall => "wall",
            PatchKind::Empty => "empty",
            PatchKind::Symmetry => "symmetryPlane",
            PatchKind::Cyclic { .. } => "cyclic",
            PatchKind::Processor { .. } => "processor",
        }
    }
}

/// A named contiguous block of boundary faces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Patch name
    pub name: String,
    /// First face label
    pub start: usize,
    /// Number of faces
    pub size: usize,
    /// Geometric kind
    pub kind: PatchKind,
}

impl Patch {
    pub fn new(name: impl Into<String>, start: usize, size: usize, kind: PatchKind) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            kind,
        }
    }

    /// Face labels of this patch.
    pub fn faces(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.size
    }

    /// Whether the patch couples to another patch or domain.
    pub fn is_coupled(&self) -> bool {
        self.kind.is_coupled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupled_kinds() {
        assert!(
            PatchKind::Cyclic {
                neighbour_patch: PatchIndex::new(1)
            }
            .is_coupled()
        );
        assert!(PatchKind::Processor { neighbour_rank: 3, tag: 0 }.is_coupled());
        assert!(!PatchKind::Wall.is_coupled());
        assert!(!PatchKind::Empty.is_coupled());
        assert!(PatchKind::Empty.is_empty_kind());
    }

    #[test]
    fn test_patch_face_range() {
        let p = Patch::new("inlet", 12, 4, PatchKind::Patch);
        assert_eq!(p.faces(), 12..16);
        assert_eq!(PatchKind::default(), PatchKind::Patch);
        assert_eq!(PatchKind::Symmetry.keyword(), "symmetryPlane");
    }
}
