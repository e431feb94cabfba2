//! Benchmark profiles and utilities for the Grain region allocator.
//!
//! - [`bench_layout`]: 64K-word regions, large enough that the fast path
//!   dominates
//! - [`bench_config`]: allocator configuration matching a layout
//! - [`size_sequence`]: deterministic allocation sizes via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use grain_alloc::AllocConfig;
use grain_region::RegionLayout;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Words per region in the benchmark layout.
pub const BENCH_REGION_WORDS: usize = 64 * 1024;

/// Region layout used by the benchmarks.
pub fn bench_layout() -> RegionLayout {
    RegionLayout::new(BENCH_REGION_WORDS)
}

/// Default allocator configuration for `layout`.
pub fn bench_config(layout: &RegionLayout) -> AllocConfig {
    AllocConfig::for_layout(layout)
}

/// Generate `n` allocation sizes in `[min_words, max_words]`.
///
/// The same seed always produces the same sequence.
pub fn size_sequence(n: usize, min_words: usize, max_words: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| rng.random_range(min_words..=max_words))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_config_validates() {
        let layout = bench_layout();
        layout.validate().unwrap();
        bench_config(&layout).validate().unwrap();
    }

    #[test]
    fn size_sequence_in_bounds() {
        let sizes = size_sequence(1000, 2, 64, 42);
        assert_eq!(sizes.len(), 1000);
        assert!(sizes.iter().all(|&s| (2..=64).contains(&s)));
    }

    #[test]
    fn size_sequence_deterministic() {
        assert_eq!(size_sequence(50, 1, 8, 7), size_sequence(50, 1, 8, 7));
    }
}
