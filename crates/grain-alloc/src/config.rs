//! Allocator configuration parameters.

use grain_core::ConfigError;
use grain_region::RegionLayout;

/// Configuration shared by every arena attached to one [`AllocContext`].
///
/// Validated by [`AllocContext::setup`]; all values are immutable after
/// creation.
///
/// [`AllocContext`]: crate::context::AllocContext
/// [`AllocContext::setup`]: crate::context::AllocContext::setup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocConfig {
    /// Size of one heap word in bytes.
    ///
    /// Default: 8. Must be a power of two and match the regions handed out
    /// by the provider.
    pub heap_word_size: usize,

    /// Smallest span, in heap words, that can be turned into a filler object.
    ///
    /// Default: 2 (an object header). Free space below this at retirement
    /// is counted as waste without being filled, since no allocation could
    /// fit there anyway.
    pub min_fill_words: usize,

    /// Free bytes a mutator region must still have to be retained at
    /// retirement instead of being handed back.
    ///
    /// Default: 2048, the smallest thread-local buffer worth carving out.
    /// Must be at least 1, so a region with no free space is never retained.
    pub min_retain_bytes: usize,

    /// Size of a heap region in bytes. Used only to report waste as a
    /// percentage of the space the arena has cycled through.
    ///
    /// Default: 1MB.
    pub region_bytes: usize,
}

impl AllocConfig {
    /// Default heap word size in bytes.
    pub const DEFAULT_HEAP_WORD_SIZE: usize = 8;

    /// Default minimum filler size in words.
    pub const DEFAULT_MIN_FILL_WORDS: usize = 2;

    /// Default retention threshold in bytes.
    pub const DEFAULT_MIN_RETAIN_BYTES: usize = 2048;

    /// Default region size in bytes.
    pub const DEFAULT_REGION_BYTES: usize = 1024 * 1024;

    /// Create a config matching the given region layout.
    ///
    /// Uses default values for the filler and retention thresholds.
    pub fn for_layout(layout: &RegionLayout) -> Self {
        Self {
            heap_word_size: layout.word_bytes,
            min_fill_words: Self::DEFAULT_MIN_FILL_WORDS,
            min_retain_bytes: Self::DEFAULT_MIN_RETAIN_BYTES,
            region_bytes: layout.region_bytes(),
        }
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.heap_word_size.is_power_of_two() {
            return Err(ConfigError::InvalidConfig {
                reason: format!(
                    "heap_word_size must be a power of two (got {})",
                    self.heap_word_size
                ),
            });
        }
        if self.min_fill_words == 0 {
            return Err(ConfigError::InvalidConfig {
                reason: "min_fill_words must be at least 1".into(),
            });
        }
        if self.min_retain_bytes == 0 {
            return Err(ConfigError::InvalidConfig {
                reason: "min_retain_bytes must be at least 1".into(),
            });
        }
        if self.region_bytes == 0 || self.region_bytes % self.heap_word_size != 0 {
            return Err(ConfigError::InvalidConfig {
                reason: format!(
                    "region_bytes must be a non-zero multiple of heap_word_size {} (got {})",
                    self.heap_word_size, self.region_bytes
                ),
            });
        }
        Ok(())
    }

    /// Minimum filler size in bytes.
    pub fn min_fill_bytes(&self) -> usize {
        self.min_fill_words * self.heap_word_size
    }
}

impl Default for AllocConfig {
    fn default() -> Self {
        Self {
            heap_word_size: Self::DEFAULT_HEAP_WORD_SIZE,
            min_fill_words: Self::DEFAULT_MIN_FILL_WORDS,
            min_retain_bytes: Self::DEFAULT_MIN_RETAIN_BYTES,
            region_bytes: Self::DEFAULT_REGION_BYTES,
        }
    }
}
