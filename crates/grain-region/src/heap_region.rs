//! Heap regions with an atomic bump cursor.
//!
//! A [`HeapRegion`] owns a fixed address span `[bottom, end)`. Allocation
//! advances `top` with a compare-and-swap, so any number of threads can
//! allocate concurrently without a lock. Regions never move and never shrink;
//! they are only reset by whoever owns the region table once no arena holds
//! them any more.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use grain_core::{Allocation, HeapAddr, Region, RegionIndex};
use smallvec::SmallVec;

/// A span inside a region that was turned into a filler object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillerObject {
    /// First address of the filler.
    pub start: HeapAddr,
    /// Length of the filler in heap words.
    pub word_size: usize,
}

/// A contiguous heap span with bump allocation.
///
/// Regions are the unit handed between the region provider and the
/// allocation arenas. The bump cursor is the only state touched by the
/// lock-free fast path; filler bookkeeping is only written by the thread
/// retiring the region.
pub struct HeapRegion {
    index: RegionIndex,
    bottom: HeapAddr,
    end: HeapAddr,
    word_bytes: usize,
    /// Bump pointer: next free address.
    top: AtomicUsize,
    /// Top before the retirement filler was written, 0 when unset.
    pre_filler_top: AtomicUsize,
    /// Filler objects written into this region, in address order.
    fillers: Mutex<SmallVec<[FillerObject; 2]>>,
}

// Compile-time assertion: HeapRegion must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<HeapRegion>();
};

impl HeapRegion {
    /// Create an empty region of `word_size` words starting at `bottom`.
    pub fn new(index: RegionIndex, bottom: HeapAddr, word_size: usize, word_bytes: usize) -> Self {
        Self {
            index,
            bottom,
            end: bottom.add_words(word_size, word_bytes),
            word_bytes,
            top: AtomicUsize::new(bottom.0),
            pre_filler_top: AtomicUsize::new(0),
            fillers: Mutex::new(SmallVec::new()),
        }
    }

    /// Size of one heap word in bytes.
    pub fn word_bytes(&self) -> usize {
        self.word_bytes
    }

    /// Capacity in heap words.
    pub fn word_capacity(&self) -> usize {
        self.capacity() / self.word_bytes
    }

    /// Free space in heap words.
    pub fn free_words(&self) -> usize {
        self.free() / self.word_bytes
    }

    /// Where live data ended before the retirement filler, if one was written.
    pub fn pre_filler_top(&self) -> Option<HeapAddr> {
        match self.pre_filler_top.load(Ordering::Relaxed) {
            0 => None,
            addr => Some(HeapAddr(addr)),
        }
    }

    /// Filler objects written into this region.
    pub fn fillers(&self) -> Vec<FillerObject> {
        self.fillers.lock().unwrap().to_vec()
    }

    /// Whether `addr` lies inside a filler object.
    pub fn is_filler(&self, addr: HeapAddr) -> bool {
        self.fillers.lock().unwrap().iter().any(|filler| {
            addr >= filler.start && addr < filler.start.add_words(filler.word_size, self.word_bytes)
        })
    }

    /// Whether `addr` lies inside the allocated part of this region.
    pub fn contains(&self, addr: HeapAddr) -> bool {
        addr >= self.bottom && addr < self.top()
    }

    /// Reset the bump cursor and filler bookkeeping.
    ///
    /// Only the owner of the region table may call this, and only while no
    /// arena holds the region.
    pub fn reset(&self) {
        self.top.store(self.bottom.0, Ordering::Release);
        self.pre_filler_top.store(0, Ordering::Relaxed);
        self.fillers.lock().unwrap().clear();
    }
}

impl Region for HeapRegion {
    fn index(&self) -> RegionIndex {
        self.index
    }

    fn bottom(&self) -> HeapAddr {
        self.bottom
    }

    fn top(&self) -> HeapAddr {
        HeapAddr(self.top.load(Ordering::Acquire))
    }

    fn end(&self) -> HeapAddr {
        self.end
    }

    fn par_allocate(&self, min_word_size: usize, desired_word_size: usize) -> Option<Allocation> {
        debug_assert!(
            min_word_size <= desired_word_size,
            "min {min_word_size} exceeds desired {desired_word_size}"
        );
        let mut top = self.top.load(Ordering::Relaxed);
        loop {
            let available = (self.end.0 - top) / self.word_bytes;
            let word_size = available.min(desired_word_size);
            if word_size == 0 || word_size < min_word_size {
                return None;
            }
            let new_top = top + word_size * self.word_bytes;
            match self
                .top
                .compare_exchange_weak(top, new_top, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    return Some(Allocation {
                        start: HeapAddr(top),
                        word_size,
                    })
                }
                Err(current) => top = current,
            }
        }
    }

    fn fill_with_filler(&self, start: HeapAddr, word_size: usize) {
        let end = start.add_words(word_size, self.word_bytes);
        assert!(
            start >= self.bottom && end <= self.top(),
            "filler [{start}, {end}) outside allocated part of region {}",
            self.index
        );
        let mut fillers = self.fillers.lock().unwrap();
        let at = fillers.partition_point(|f| f.start < start);
        fillers.insert(at, FillerObject { start, word_size });
    }

    fn set_pre_filler_top(&self, top: HeapAddr) {
        self.pre_filler_top.store(top.0, Ordering::Relaxed);
    }

    fn reset_pre_filler_top(&self) {
        self.pre_filler_top.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for HeapRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapRegion")
            .field("index", &self.index)
            .field("bottom", &self.bottom)
            .field("top", &self.top())
            .field("end", &self.end)
            .finish()
    }
}
