//! Waste and evacuation statistics.
//!
//! [`WasteStats`] is the per-arena running total of bytes lost to
//! retirement. [`EvacStats`] is the per-purpose aggregate collection-phase
//! arenas report their end-of-region waste into; [`EvacStatsRegistry`]
//! holds one per [`AllocPurpose`].

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use grain_core::AllocPurpose;
use indexmap::IndexMap;

/// Running total of bytes rendered unusable by retirement.
#[derive(Debug, Default)]
pub struct WasteStats {
    bytes: AtomicUsize,
}

impl WasteStats {
    /// Create a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `bytes` of waste.
    pub fn add(&self, bytes: usize) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Total waste in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Reset to zero.
    pub fn reset(&self) {
        self.bytes.store(0, Ordering::Relaxed);
    }
}

/// Summary reported when a mutator arena is released.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MutatorAllocStats {
    /// Regions installed since the arena was initialized.
    pub regions: u32,
    /// Bytes wasted by retirement.
    pub wasted_bytes: usize,
    /// `wasted_bytes` as a percentage of `regions` full regions.
    pub wasted_percent: f64,
}

impl MutatorAllocStats {
    /// Build a summary, computing the percentage against `region_bytes`.
    pub fn new(regions: u32, wasted_bytes: usize, region_bytes: usize) -> Self {
        let cycled = regions as usize * region_bytes;
        let wasted_percent = if cycled == 0 {
            0.0
        } else {
            wasted_bytes as f64 * 100.0 / cycled as f64
        };
        Self {
            regions,
            wasted_bytes,
            wasted_percent,
        }
    }
}

impl fmt::Display for MutatorAllocStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (size, unit) = proper_unit(self.wasted_bytes);
        write!(
            f,
            "regions: {}, wasted size: {size}{unit} ({:4.1}%)",
            self.regions, self.wasted_percent
        )
    }
}

/// Scale a byte count to the largest unit that keeps at least three digits.
fn proper_unit(bytes: usize) -> (usize, &'static str) {
    const K: usize = 1024;
    const M: usize = K * K;
    const G: usize = M * K;
    if bytes >= 100 * G {
        (bytes / G, "G")
    } else if bytes >= 100 * M {
        (bytes / M, "M")
    } else if bytes >= 100 * K {
        (bytes / K, "K")
    } else {
        (bytes, "B")
    }
}

/// Evacuation statistics for one allocation purpose.
#[derive(Debug, Default)]
pub struct EvacStats {
    /// End-of-region waste in heap words.
    region_end_waste: AtomicUsize,
    /// Number of regions retired with their waste recorded.
    regions_filled: AtomicU32,
}

impl EvacStats {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the waste left at the end of one retired region.
    pub fn add_region_end_waste(&self, words: usize) {
        self.region_end_waste.fetch_add(words, Ordering::Relaxed);
        self.regions_filled.fetch_add(1, Ordering::Relaxed);
    }

    /// Total end-of-region waste in heap words.
    pub fn region_end_waste(&self) -> usize {
        self.region_end_waste.load(Ordering::Relaxed)
    }

    /// Number of regions whose waste has been recorded.
    pub fn regions_filled(&self) -> u32 {
        self.regions_filled.load(Ordering::Relaxed)
    }

    /// Reset both counters, typically at the start of a collection.
    pub fn reset(&self) {
        self.region_end_waste.store(0, Ordering::Relaxed);
        self.regions_filled.store(0, Ordering::Relaxed);
    }
}

/// One [`EvacStats`] per [`AllocPurpose`], in declaration order.
#[derive(Debug)]
pub struct EvacStatsRegistry {
    stats: IndexMap<AllocPurpose, EvacStats>,
}

impl EvacStatsRegistry {
    /// Create zeroed statistics for every purpose.
    pub fn new() -> Self {
        let stats = AllocPurpose::ALL
            .iter()
            .map(|&purpose| (purpose, EvacStats::new()))
            .collect();
        Self { stats }
    }

    /// Statistics for `purpose`.
    pub fn get(&self, purpose: AllocPurpose) -> &EvacStats {
        &self.stats[&purpose]
    }

    /// Iterate over all purposes and their statistics.
    pub fn iter(&self) -> impl Iterator<Item = (AllocPurpose, &EvacStats)> {
        self.stats.iter().map(|(&purpose, stats)| (purpose, stats))
    }

    /// End-of-region waste across all purposes, in heap words.
    pub fn total_region_end_waste(&self) -> usize {
        self.stats.values().map(EvacStats::region_end_waste).sum()
    }

    /// Reset every purpose.
    pub fn reset(&self) {
        for stats in self.stats.values() {
            stats.reset();
        }
    }
}

impl Default for EvacStatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
