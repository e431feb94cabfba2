//! Reusable region layouts.
//!
//! - [`byte_layout`]: one-byte heap words, so word counts read as byte counts.
//! - [`word_layout`]: default eight-byte heap words.

use grain_region::RegionLayout;

/// Layout whose heap words are one byte wide.
///
/// Handy for scenarios stated in bytes: allocating `n` words consumes
/// exactly `n` bytes of the region.
pub fn byte_layout(region_bytes: usize) -> RegionLayout {
    RegionLayout {
        word_bytes: 1,
        region_words: region_bytes,
        heap_base: RegionLayout::DEFAULT_HEAP_BASE,
    }
}

/// Layout with default eight-byte heap words.
pub fn word_layout(region_words: usize) -> RegionLayout {
    RegionLayout::new(region_words)
}
