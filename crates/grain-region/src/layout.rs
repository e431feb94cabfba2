//! Region geometry.

use grain_core::{ConfigError, HeapAddr, RegionIndex};

use crate::heap_region::HeapRegion;

/// Uniform geometry of the heap's region table.
///
/// Region `i` spans `[heap_base + i * region_bytes(), heap_base + (i + 1) * region_bytes())`.
/// Validated by [`RegionLayout::validate`]; all values are immutable once
/// regions have been built from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionLayout {
    /// Size of one heap word in bytes.
    ///
    /// Default: 8. Must be a power of two.
    pub word_bytes: usize,

    /// Size of each region in heap words.
    ///
    /// Default: 131_072 (1MB at 8 bytes per word). Must be non-zero.
    pub region_words: usize,

    /// Address of the first region. Must be non-zero and word aligned so
    /// that no region ever contains the null address.
    pub heap_base: usize,
}

impl RegionLayout {
    /// Default heap word size in bytes.
    pub const DEFAULT_WORD_BYTES: usize = 8;

    /// Default region size: 1MB / 8 bytes = 128K words.
    pub const DEFAULT_REGION_WORDS: usize = 131_072;

    /// Default base address of the heap.
    pub const DEFAULT_HEAP_BASE: usize = 0x1000_0000;

    /// Create a layout with the given region size in words and default
    /// values for everything else.
    pub fn new(region_words: usize) -> Self {
        Self {
            word_bytes: Self::DEFAULT_WORD_BYTES,
            region_words,
            heap_base: Self::DEFAULT_HEAP_BASE,
        }
    }

    /// Check the layout for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.word_bytes.is_power_of_two() {
            return Err(ConfigError::InvalidConfig {
                reason: format!(
                    "word_bytes must be a power of two (got {})",
                    self.word_bytes
                ),
            });
        }
        if self.region_words == 0 {
            return Err(ConfigError::InvalidConfig {
                reason: "region_words must be non-zero".into(),
            });
        }
        if self.heap_base == 0 || self.heap_base % self.word_bytes != 0 {
            return Err(ConfigError::InvalidConfig {
                reason: format!(
                    "heap_base must be non-zero and aligned to {} bytes (got {:#x})",
                    self.word_bytes, self.heap_base
                ),
            });
        }
        Ok(())
    }

    /// Size of one region in bytes.
    pub fn region_bytes(&self) -> usize {
        self.region_words * self.word_bytes
    }

    /// First address of region `index`.
    pub fn bottom_of(&self, index: RegionIndex) -> HeapAddr {
        HeapAddr(self.heap_base + index.0 as usize * self.region_bytes())
    }

    /// Build region `index` with an empty cursor.
    pub fn region(&self, index: RegionIndex) -> HeapRegion {
        HeapRegion::new(index, self.bottom_of(index), self.region_words, self.word_bytes)
    }

    /// Build the zero-capacity sentinel region for this layout.
    pub fn sentinel(&self) -> HeapRegion {
        HeapRegion::new(RegionIndex::SENTINEL, HeapAddr::NULL, 0, self.word_bytes)
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REGION_WORDS)
    }
}
