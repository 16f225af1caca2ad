//! Shared, range-sliceable byte views.

use bytes::Bytes;
use std::{
    fmt::{self, Debug, Formatter},
    ops::{Bound, RangeBounds},
};

// Blobs are a newtype wrapper over `Bytes`. They allow message parts to be
// immutably shared between nodes and between the framer and the messages it
// emits. The storage is freed when the last view referencing it is dropped.

/// A shared view over a contiguous block of bytes.
///
/// Cloning a blob or taking a [`range`](Blob::range) of it never copies the
/// underlying bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob(Bytes);

impl Blob {
    /// Returns a new blob owning the given bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }

    /// The bytes visible through this view.
    pub fn data(&self) -> &[u8] {
        &self.0
    }

    /// The number of bytes in the view.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the view contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a view of a sub-region of this blob. Every range type in
    /// `std::ops` is accepted.
    ///
    /// # Panics
    ///
    /// Panics if the range does not lie within the blob.
    ///
    /// # Examples
    ///
    /// ```
    /// # use switchyard_core::Blob;
    /// let blob = Blob::from("Header Body");
    /// assert_eq!(blob.range(7..).data(), b"Body");
    /// assert_eq!(blob.range(..6).data(), b"Header");
    /// assert_eq!(blob.range(2..=4).range(1..).data(), b"ad");
    /// ```
    pub fn range(&self, range: impl RangeBounds<usize>) -> Self {
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => end + 1,
            Bound::Excluded(&end) => end,
            Bound::Unbounded => self.len(),
        };
        assert!(
            start <= end && end <= self.len(),
            "range {}..{} out of bounds for blob of length {}",
            start,
            end,
            self.len()
        );
        Self(self.0.slice(start..end))
    }

    /// Unwraps the underlying shared buffer.
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Debug for Blob {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob").field("len", &self.len()).finish()
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl From<Bytes> for Blob {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Blob {
    fn from(vector: Vec<u8>) -> Self {
        Self::new(vector)
    }
}

impl From<&[u8]> for Blob {
    fn from(slice: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(slice))
    }
}

impl<const N: usize> From<&[u8; N]> for Blob {
    fn from(array: &[u8; N]) -> Self {
        array.as_slice().into()
    }
}

impl<const N: usize> From<[u8; N]> for Blob {
    fn from(array: [u8; N]) -> Self {
        array.as_slice().into()
    }
}

impl From<&str> for Blob {
    fn from(string: &str) -> Self {
        string.as_bytes().into()
    }
}
