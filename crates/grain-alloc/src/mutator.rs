//! Application-thread allocation arena with single-slot region retention.

use std::sync::atomic::Ordering;

use grain_core::{Allocation, NodeIndex, Region, RegionProvider};

use crate::arena::{AllocArena, AllocRegion, RegionPolicy};
use crate::context::AllocContext;
use crate::observer::LOG_TARGET;
use crate::raw::AtomicRegionRef;
use crate::stats::{MutatorAllocStats, WasteStats};

/// Regions for application threads: no purpose, handed back with their
/// used bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct MutatorPolicy;

impl<P: RegionProvider> RegionPolicy<P> for MutatorPolicy {
    fn allocate_new_region<'h>(
        &self,
        provider: &'h P,
        word_size: usize,
        node: NodeIndex,
    ) -> Option<&'h P::Region> {
        provider.allocate_new_region(word_size, None, node)
    }

    fn retire_region(&self, provider: &P, region: &P::Region, used_bytes: usize) {
        provider.retire_mutator_region(region, used_bytes);
    }
}

/// Arena serving application threads.
///
/// When the active region is retired while it still has room for at least
/// [`min_retain_bytes`](crate::AllocConfig::min_retain_bytes), it is kept
/// aside as the retained region instead of being handed back, and can
/// still serve thread-local buffers through
/// [`attempt_retained_allocation`](Self::attempt_retained_allocation).
/// At most one region is retained; a better candidate displaces it.
pub struct MutatorAllocRegion<'h, P: RegionProvider> {
    arena: AllocRegion<'h, P, MutatorPolicy>,
    retained: AtomicRegionRef<'h, P::Region>,
    wasted: WasteStats,
}

impl<'h, P: RegionProvider> MutatorAllocRegion<'h, P> {
    /// Name used in diagnostics.
    pub const NAME: &'static str = "Mutator Alloc Region";

    /// Create an uninitialized arena for NUMA node `node`.
    pub fn new(ctx: &'h AllocContext<'h, P>, node: NodeIndex) -> Self {
        Self {
            arena: AllocRegion::new(ctx, Self::NAME, node, MutatorPolicy),
            retained: AtomicRegionRef::null(),
            wasted: WasteStats::new(),
        }
    }

    /// Install the sentinel and reset the waste counter.
    ///
    /// # Panics
    ///
    /// Panics if a region is still retained, or if the arena is already
    /// initialized.
    pub fn init(&self) {
        assert!(
            self.retained.load(Ordering::Relaxed).is_none(),
            "{}: init with a region still retained",
            Self::NAME
        );
        self.arena.init();
        self.wasted.reset();
    }

    /// Retire the active region, retaining it if it is worth keeping.
    ///
    /// Returns the bytes wasted by this call, including any waste from
    /// retiring a displaced retained region.
    ///
    /// # Panics
    ///
    /// Panics if the arena is not initialized.
    pub fn retire(&self, fill_up: bool) -> usize {
        let arena = &self.arena;
        let current = arena.active();
        arena.trace("retiring");
        let mut waste = 0;
        if !arena.context().is_sentinel(current) {
            if self.should_retain(current) {
                arena.trace("mutator retained");
                if let Some(displaced) = self.retained.load(Ordering::Acquire) {
                    waste = arena.retire_internal(displaced, true);
                }
                self.retained.store(Some(current), Ordering::Release);
            } else {
                waste = arena.retire_internal(current, fill_up);
            }
            arena.reset_to_sentinel();
        }
        self.wasted.add(waste);
        arena.trace("retired");
        waste
    }

    /// Retain a region with at least the retention threshold free, as long
    /// as it has strictly more free space than the one already retained.
    fn should_retain(&self, region: &P::Region) -> bool {
        let free = region.free();
        if free < self.arena.context().config().min_retain_bytes {
            return false;
        }
        match self.retained.load(Ordering::Acquire) {
            Some(retained) => free > retained.free(),
            None => true,
        }
    }

    /// Lock-free attempt to allocate from the retained region, if any.
    pub fn attempt_retained_allocation(
        &self,
        min_word_size: usize,
        desired_word_size: usize,
    ) -> Option<Allocation> {
        let retained = self.retained.load(Ordering::Acquire)?;
        let result = retained.par_allocate(min_word_size, desired_word_size)?;
        self.arena
            .trace_sizes("alloc retained", min_word_size, desired_word_size, Some(result));
        Some(result)
    }

    /// Bytes used in the active and the retained region.
    pub fn used_in_alloc_regions(&self) -> usize {
        let active = self.arena.get().map_or(0, |region| region.used());
        let retained = self
            .retained
            .load(Ordering::Acquire)
            .map_or(0, |region| region.used());
        active + retained
    }

    /// Release the active region, then retire the retained region without
    /// filling, and log the allocation summary.
    ///
    /// Returns the region that was active, or `None` if the arena held the
    /// sentinel.
    pub fn release(&self) -> Option<&'h P::Region> {
        let released = self.arena.release_with(|fill_up| self.retire(fill_up));
        // Retirement above may have moved the active region into the slot.
        if let Some(retained) = self.retained.load(Ordering::Acquire) {
            self.wasted.add(self.arena.retire_internal(retained, false));
            self.retained.store(None, Ordering::Release);
        }
        log::debug!(target: LOG_TARGET, "Mutator Allocation stats, {}", self.stats());
        released
    }

    /// The retained region, if any.
    pub fn retained_region(&self) -> Option<&'h P::Region> {
        self.retained.load(Ordering::Acquire)
    }

    /// Bytes wasted since the last [`init`](Self::init).
    pub fn wasted_bytes(&self) -> usize {
        self.wasted.bytes()
    }

    /// Install count and waste summary.
    pub fn stats(&self) -> MutatorAllocStats {
        MutatorAllocStats::new(
            self.arena.count(),
            self.wasted.bytes(),
            self.arena.context().config().region_bytes,
        )
    }
}

impl<'h, P: RegionProvider + 'h> AllocArena<'h> for MutatorAllocRegion<'h, P> {
    type Provider = P;
    type Policy = MutatorPolicy;

    fn arena(&self) -> &AllocRegion<'h, P, MutatorPolicy> {
        &self.arena
    }

    fn init(&self) {
        MutatorAllocRegion::init(self);
    }

    fn retire(&self, fill_up: bool) -> usize {
        MutatorAllocRegion::retire(self, fill_up)
    }

    fn release(&self) -> Option<&'h P::Region> {
        MutatorAllocRegion::release(self)
    }
}

impl<P: RegionProvider> std::fmt::Debug for MutatorAllocRegion<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutatorAllocRegion")
            .field("arena", &self.arena)
            .field("retained", &self.retained.load(Ordering::Relaxed).is_some())
            .field("wasted_bytes", &self.wasted.bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use grain_core::RegionIndex;
    use grain_test_utils::fixtures::byte_layout;
    use grain_test_utils::{MockProvider, MutatorRetirement};

    use super::*;
    use crate::config::AllocConfig;

    // Compile-time assertion: MutatorAllocRegion must be Send + Sync.
    const _: fn() = || {
        fn assert<T: Send + Sync>() {}
        assert::<MutatorAllocRegion<'static, MockProvider>>();
    };

    fn provider(regions: u32) -> MockProvider {
        MockProvider::new(byte_layout(4096), regions)
    }

    fn config(provider: &MockProvider) -> AllocConfig {
        AllocConfig {
            min_fill_words: 16,
            min_retain_bytes: 1024,
            ..AllocConfig::for_layout(provider.layout())
        }
    }

    #[test]
    fn small_remainder_is_not_retained() {
        let provider = provider(2);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        arena.new_region_and_allocate(4000).unwrap();

        assert_eq!(arena.retire(true), 96);
        assert!(arena.retained_region().is_none());
        assert_eq!(arena.wasted_bytes(), 96);
        assert_eq!(
            provider.mutator_retirements(),
            vec![MutatorRetirement {
                region: RegionIndex(0),
                used_bytes: 4000
            }]
        );
    }

    #[test]
    fn roomy_region_is_retained() {
        let provider = provider(2);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        arena.new_region_and_allocate(1000).unwrap();

        assert_eq!(arena.retire(true), 0);
        let retained = arena.retained_region().unwrap();
        assert_eq!(retained.index(), RegionIndex(0));
        assert!(retained.fillers().is_empty());
        assert!(arena.get().is_none());
        assert!(provider.mutator_retirements().is_empty());
        assert_eq!(arena.used_in_alloc_regions(), 1000);
    }

    #[test]
    fn retains_region_at_exact_threshold() {
        let provider = provider(2);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        arena.new_region_and_allocate(3072).unwrap();

        assert_eq!(arena.retire(true), 0);
        let retained = arena.retained_region().unwrap();
        assert_eq!(retained.free(), 1024);
        assert!(provider.mutator_retirements().is_empty());
    }

    #[test]
    fn region_just_below_threshold_is_handed_back() {
        let provider = provider(2);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        arena.new_region_and_allocate(3073).unwrap();

        assert_eq!(arena.retire(true), 1023);
        assert!(arena.retained_region().is_none());
        assert_eq!(provider.region(RegionIndex(0)).fillers().len(), 1);
        assert_eq!(
            provider.mutator_retirements(),
            vec![MutatorRetirement {
                region: RegionIndex(0),
                used_bytes: 3073
            }]
        );
    }

    #[test]
    fn better_candidate_displaces_retained_region() {
        let provider = provider(3);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();

        arena.new_region_and_allocate(2000).unwrap();
        arena.retire(true);
        arena.new_region_and_allocate(500).unwrap();
        let waste = arena.retire(true);

        assert_eq!(arena.retained_region().unwrap().index(), RegionIndex(1));
        // The displaced region is retired with a filler over its 2096 free bytes.
        assert_eq!(waste, 2096);
        let displaced = provider.region(RegionIndex(0));
        assert_eq!(displaced.fillers().len(), 1);
        assert_eq!(
            provider.mutator_retirements(),
            vec![MutatorRetirement {
                region: RegionIndex(0),
                used_bytes: 2000
            }]
        );
        assert_eq!(arena.wasted_bytes(), 2096);
    }

    #[test]
    fn tie_keeps_existing_retained_region() {
        let provider = provider(3);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();

        arena.new_region_and_allocate(1000).unwrap();
        arena.retire(true);
        arena.new_region_and_allocate(1000).unwrap();
        let waste = arena.retire(true);

        assert_eq!(arena.retained_region().unwrap().index(), RegionIndex(0));
        assert_eq!(waste, 3096);
        let retired = provider.mutator_retirements();
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].region, RegionIndex(1));
    }

    #[test]
    fn retained_region_serves_allocations() {
        let provider = provider(2);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        assert!(arena.attempt_retained_allocation(8, 64).is_none());

        arena.new_region_and_allocate(1000).unwrap();
        arena.retire(true);
        let result = arena.attempt_retained_allocation(8, 64).unwrap();
        assert_eq!(result.word_size, 64);
        assert_eq!(arena.used_in_alloc_regions(), 1064);
    }

    #[test]
    fn release_retires_retained_region_without_fill() {
        let provider = provider(3);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();

        arena.new_region_and_allocate(1000).unwrap();
        arena.retire(true);
        arena.new_region_and_allocate(3500).unwrap();

        let released = arena.release().unwrap();
        assert_eq!(released.index(), RegionIndex(1));
        assert!(arena.retained_region().is_none());
        let retained_region = provider.region(RegionIndex(0));
        assert!(retained_region.fillers().is_empty());
        // 596 bytes left in the active region, 3096 in the retained one.
        assert_eq!(arena.wasted_bytes(), 596 + 3096);
        let retired: Vec<_> = provider
            .mutator_retirements()
            .iter()
            .map(|r| r.region)
            .collect();
        assert_eq!(retired, vec![RegionIndex(1), RegionIndex(0)]);

        let stats = arena.stats();
        assert_eq!(stats.regions, 2);
        assert_eq!(stats.wasted_bytes, 3692);
    }

    #[test]
    fn release_may_retain_then_retire_active_region() {
        let provider = provider(2);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        arena.new_region_and_allocate(100).unwrap();

        let released = arena.release().unwrap();
        assert_eq!(released.index(), RegionIndex(0));
        assert!(arena.retained_region().is_none());
        assert_eq!(arena.wasted_bytes(), 3996);
        assert_eq!(provider.mutator_retirements()[0].used_bytes, 100);
    }

    #[test]
    fn release_of_fresh_arena_wastes_nothing() {
        let provider = provider(1);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        assert!(arena.release().is_none());
        assert_eq!(arena.wasted_bytes(), 0);
        assert_eq!(arena.stats().regions, 0);
    }

    #[test]
    fn init_resets_waste() {
        let provider = provider(2);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        arena.new_region_and_allocate(4000).unwrap();
        arena.release();
        assert_eq!(arena.wasted_bytes(), 96);
        arena.init();
        assert_eq!(arena.wasted_bytes(), 0);
        assert_eq!(arena.count(), 0);
    }

    #[test]
    fn slow_path_uses_retention() {
        let provider = provider(2);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.init();
        arena.new_region_and_allocate(1000).unwrap();

        // 3096 bytes free, so a 4000-byte request goes to a new region and
        // the old one is retained rather than handed back.
        let result = arena.attempt_allocation_using_new_region(4000, 4000).unwrap();
        assert_eq!(result.word_size, 4000);
        assert_eq!(arena.retained_region().unwrap().index(), RegionIndex(0));
        assert_eq!(arena.get().unwrap().index(), RegionIndex(1));
        assert!(provider.mutator_retirements().is_empty());
    }

    #[test]
    #[should_panic(expected = "not initialized")]
    fn retire_before_init_panics() {
        let provider = provider(1);
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, config(&provider)).unwrap();
        let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
        arena.retire(true);
    }
}
