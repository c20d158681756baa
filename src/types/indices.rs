//! Strongly-typed mesh label newtypes.
//!
//! Keeps cell, face, patch and point labels from being mixed up in
//! addressing code. All of them index plain slices and vectors.

use std::fmt;

/// Generates a label newtype with conversions, slice indexing and a range iterator.
macro_rules! define_index {
    (
        $(#[$meta:meta])*
        $name:ident, $display_prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Create a new label.
            #[inline]
            pub const fn new(index: usize) -> Self {
                Self(index)
            }

            /// Raw label value.
            #[inline]
            pub const fn get(self) -> usize {
                self.0
            }

            /// Iterate over labels `[0, n)`.
            pub fn iter(n: usize) -> impl ExactSizeIterator<Item = $name> {
                (0..n).map($name)
            }

            /// Iterate over labels `[start, start + size)`.
            pub fn range(start: usize, size: usize) -> impl ExactSizeIterator<Item = $name> {
                (start..start + size).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(idx: $name) -> usize {
                idx.0
            }
        }

        impl<T> std::ops::Index<$name> for [T] {
            type Output = T;
            #[inline]
            fn index(&self, idx: $name) -> &T {
                &self[idx.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for [T] {
            #[inline]
            fn index_mut(&mut self, idx: $name) -> &mut T {
                &mut self[idx.0]
            }
        }

        impl<T> std::ops::Index<$name> for Vec<T> {
            type Output = T;
            #[inline]
            fn index(&self, idx: $name) -> &T {
                &self[idx.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for Vec<T> {
            #[inline]
            fn index_mut(&mut self, idx: $name) -> &mut T {
                &mut self[idx.0]
            }
        }
    };
}

define_index!(
    /// Cell label.
    ///
    /// ```
    /// use fv_rs::types::CellIndex;
    ///
    /// let cell = CellIndex::new(42);
    /// assert_eq!(cell.get(), 42);
    /// ```
    CellIndex,
    "cell"
);

define_index!(
    /// Face label. Internal faces come first, then patch faces block by block.
    FaceIndex,
    "face"
);

define_index!(
    /// Boundary patch label.
    PatchIndex,
    "patch"
);

define_index!(
    /// Mesh point label.
    PointIndex,
    "point"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_index() {
        let idx = CellIndex::new(42);
        assert_eq!(idx.get(), 42);
        assert_eq!(usize::from(idx), 42);
    }

    #[test]
    fn test_slice_indexing() {
        let mut volumes = vec![1.0, 2.0, 3.0];
        let c = CellIndex::new(1);
        assert_eq!(volumes[c], 2.0);
        volumes[c] = 5.0;
        assert_eq!(volumes[1], 5.0);
    }

    #[test]
    fn test_range_iter() {
        let faces: Vec<_> = FaceIndex::range(12, 4).collect();
        assert_eq!(faces.len(), 4);
        assert_eq!(faces[0].get(), 12);
        assert_eq!(faces[3].get(), 15);
        assert_eq!(PatchIndex::iter(6).count(), 6);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CellIndex::new(3)), "cell3");
        assert_eq!(format!("{}", PatchIndex::new(0)), "patch0");
    }
}
