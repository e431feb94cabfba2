//! Capability traits consumed by the allocator.
//!
//! The allocator never creates or recycles regions itself. It bump-allocates
//! out of whatever a [`RegionProvider`] hands it and returns regions to the
//! provider on retirement.

use crate::id::{AllocPurpose, Allocation, HeapAddr, NodeIndex, RegionIndex};

/// A contiguous span of heap words with an atomic bump cursor.
///
/// Implementations must allow any number of threads to call
/// [`par_allocate`](Region::par_allocate) concurrently; every other
/// mutating method is only called by the thread currently driving
/// retirement or installation for the owning arena.
pub trait Region: Send + Sync {
    /// Position of this region in the heap's region table.
    fn index(&self) -> RegionIndex;

    /// First address of the region.
    fn bottom(&self) -> HeapAddr;

    /// Current bump cursor. Everything below it has been handed out.
    fn top(&self) -> HeapAddr;

    /// One-past-the-end address of the region.
    fn end(&self) -> HeapAddr;

    /// Racy bump allocation of between `min_word_size` and
    /// `desired_word_size` words.
    ///
    /// Returns `None` when fewer than `min_word_size` words remain. May be
    /// called concurrently from any number of threads; successful results
    /// never overlap.
    fn par_allocate(&self, min_word_size: usize, desired_word_size: usize) -> Option<Allocation>;

    /// Turn `[start, start + word_size)` into a filler object so that heap
    /// walkers can step over it.
    fn fill_with_filler(&self, start: HeapAddr, word_size: usize);

    /// Remember where the region's live data ended before a filler was
    /// written. Diagnostics only.
    fn set_pre_filler_top(&self, top: HeapAddr);

    /// Forget the pre-filler top.
    fn reset_pre_filler_top(&self);

    /// Remaining bytes between the cursor and the end.
    fn free(&self) -> usize {
        self.end().byte_offset_from(self.top())
    }

    /// Bytes handed out so far.
    fn used(&self) -> usize {
        self.top().byte_offset_from(self.bottom())
    }

    /// Total size of the region in bytes.
    fn capacity(&self) -> usize {
        self.end().byte_offset_from(self.bottom())
    }

    /// Whether nothing has been allocated from this region.
    fn is_empty(&self) -> bool {
        self.used() == 0
    }

    /// Racy bump allocation of exactly `word_size` words.
    fn racy_allocate(&self, word_size: usize) -> Option<HeapAddr> {
        self.par_allocate(word_size, word_size).map(|a| a.start)
    }
}

/// Supplies fresh regions to arenas and absorbs retired ones.
///
/// Regions handed out must stay valid for as long as the provider is
/// borrowed; arenas hold plain references into the provider's region table.
pub trait RegionProvider: Sync {
    /// Concrete region type managed by this provider.
    type Region: Region;

    /// Hand out an empty region able to hold at least `word_size` words.
    ///
    /// `purpose` is `None` for application-thread allocation and names the
    /// destination class for collection-phase allocation. Returns `None`
    /// when no region is available.
    fn allocate_new_region(
        &self,
        word_size: usize,
        purpose: Option<AllocPurpose>,
        node: NodeIndex,
    ) -> Option<&Self::Region>;

    /// Take back an application-thread region.
    fn retire_mutator_region(&self, region: &Self::Region, used_bytes: usize);

    /// Take back a collection-phase region together with the number of bytes
    /// copied into it during the tenancy that just ended.
    fn retire_collector_region(
        &self,
        region: &Self::Region,
        allocated_bytes: usize,
        purpose: AllocPurpose,
    );
}
