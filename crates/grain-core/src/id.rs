//! Strongly-typed identifiers, heap addresses and allocation results.

use std::fmt;

/// A byte address inside the managed heap.
///
/// Address `0` is never a valid object address. The sentinel region is
/// placed there with zero capacity, so every allocation attempt against it
/// fails before an address could be produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapAddr(pub usize);

impl HeapAddr {
    /// The null heap address.
    pub const NULL: HeapAddr = HeapAddr(0);

    /// Advance this address by `word_size` heap words of `word_bytes` each.
    pub fn add_words(self, word_size: usize, word_bytes: usize) -> HeapAddr {
        HeapAddr(self.0 + word_size * word_bytes)
    }

    /// Number of bytes from `origin` up to this address.
    ///
    /// # Panics
    ///
    /// Panics if `origin` lies above `self`.
    pub fn byte_offset_from(self, origin: HeapAddr) -> usize {
        assert!(
            origin.0 <= self.0,
            "address {origin} lies above {self}"
        );
        self.0 - origin.0
    }

    /// Whether this is the null address.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for HeapAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Position of a region in the heap's region table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionIndex(pub u32);

impl RegionIndex {
    /// Index reserved for the shared zero-capacity sentinel region.
    pub const SENTINEL: RegionIndex = RegionIndex(u32::MAX);
}

impl fmt::Display for RegionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::SENTINEL {
            write!(f, "sentinel")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u32> for RegionIndex {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// NUMA affinity hint passed through to the region provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// No node preference.
    pub const ANY: NodeIndex = NodeIndex(u32::MAX);
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ANY {
            write!(f, "any")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u32> for NodeIndex {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Why a collection-phase region was acquired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllocPurpose {
    /// Destination for objects that survive a young collection.
    Survivor,
    /// Destination for objects promoted into the old generation.
    Old,
}

impl AllocPurpose {
    /// Every purpose, in declaration order.
    pub const ALL: [AllocPurpose; 2] = [AllocPurpose::Survivor, AllocPurpose::Old];
}

impl fmt::Display for AllocPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Survivor => write!(f, "survivor"),
            Self::Old => write!(f, "old"),
        }
    }
}

/// A successful bump allocation.
///
/// `word_size` is the size actually handed out, which for a min/desired
/// request may be anywhere between the two bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct Allocation {
    /// First address of the allocated span.
    pub start: HeapAddr,
    /// Length of the span in heap words.
    pub word_size: usize,
}

impl Allocation {
    /// One-past-the-end address of the span.
    pub fn end(&self, word_bytes: usize) -> HeapAddr {
        self.start.add_words(self.word_size, word_bytes)
    }
}
