//! Collection-phase allocation arenas.

use std::sync::atomic::{AtomicUsize, Ordering};

use grain_core::{AllocPurpose, NodeIndex, Region, RegionProvider};

use crate::arena::{AllocArena, AllocRegion, RegionPolicy};
use crate::context::AllocContext;
use crate::stats::EvacStats;

/// Regions for one evacuation destination.
///
/// Remembers how much of the installed region was already in use, so that
/// retirement reports only the bytes copied in during this tenancy.
#[derive(Debug)]
pub struct CollectorPolicy {
    purpose: AllocPurpose,
    used_bytes_before: AtomicUsize,
}

impl CollectorPolicy {
    /// Create a policy for `purpose`.
    pub fn new(purpose: AllocPurpose) -> Self {
        Self {
            purpose,
            used_bytes_before: AtomicUsize::new(0),
        }
    }

    /// The destination class of the regions this policy requests.
    pub fn purpose(&self) -> AllocPurpose {
        self.purpose
    }

    /// Bytes the current region already held when it was installed.
    pub fn used_bytes_before(&self) -> usize {
        self.used_bytes_before.load(Ordering::Relaxed)
    }
}

impl<P: RegionProvider> RegionPolicy<P> for CollectorPolicy {
    fn allocate_new_region<'h>(
        &self,
        provider: &'h P,
        word_size: usize,
        node: NodeIndex,
    ) -> Option<&'h P::Region> {
        provider.allocate_new_region(word_size, Some(self.purpose), node)
    }

    fn on_install(&self, region: &P::Region) {
        self.used_bytes_before
            .store(region.used(), Ordering::Relaxed);
    }

    fn retire_region(&self, provider: &P, region: &P::Region, used_bytes: usize) {
        let before = self.used_bytes_before.load(Ordering::Relaxed);
        assert!(
            used_bytes >= before,
            "region {} shrank from {before} to {used_bytes} bytes while installed",
            region.index()
        );
        provider.retire_collector_region(region, used_bytes - before, self.purpose);
        self.used_bytes_before.store(0, Ordering::Relaxed);
    }
}

/// Arena used by collection workers to copy objects into regions of one
/// [`AllocPurpose`].
///
/// End-of-region waste of every real region it retires is added to the
/// shared [`EvacStats`] for its purpose.
pub struct CollectorAllocRegion<'h, P: RegionProvider> {
    arena: AllocRegion<'h, P, CollectorPolicy>,
    stats: &'h EvacStats,
}

impl<'h, P: RegionProvider> CollectorAllocRegion<'h, P> {
    /// Diagnostics name of the survivor arena.
    pub const SURVIVOR_NAME: &'static str = "Survivor GC Alloc Region";

    /// Diagnostics name of the old arena.
    pub const OLD_NAME: &'static str = "Old GC Alloc Region";

    /// Create an uninitialized arena.
    pub fn new(
        ctx: &'h AllocContext<'h, P>,
        name: &'static str,
        purpose: AllocPurpose,
        stats: &'h EvacStats,
        node: NodeIndex,
    ) -> Self {
        Self {
            arena: AllocRegion::new(ctx, name, node, CollectorPolicy::new(purpose)),
            stats,
        }
    }

    /// Arena for survivor-space destinations.
    pub fn survivor(ctx: &'h AllocContext<'h, P>, stats: &'h EvacStats, node: NodeIndex) -> Self {
        Self::new(ctx, Self::SURVIVOR_NAME, AllocPurpose::Survivor, stats, node)
    }

    /// Arena for old-space destinations.
    pub fn old(ctx: &'h AllocContext<'h, P>, stats: &'h EvacStats, node: NodeIndex) -> Self {
        Self::new(ctx, Self::OLD_NAME, AllocPurpose::Old, stats, node)
    }

    /// Install the sentinel.
    pub fn init(&self) {
        self.arena.init();
    }

    /// The destination class of this arena.
    pub fn purpose(&self) -> AllocPurpose {
        self.arena.policy().purpose()
    }

    /// Retire the active region and record its end waste, in words.
    ///
    /// Retiring the sentinel records nothing.
    pub fn retire(&self, fill_up: bool) -> usize {
        let retired = self.arena.get();
        let end_waste = self.arena.retire(fill_up);
        if retired.is_some() {
            let word_bytes = self.arena.context().config().heap_word_size;
            self.stats.add_region_end_waste(end_waste / word_bytes);
        }
        end_waste
    }

    /// Continue allocating into `region`, typically an old region kept from
    /// the previous collection. Only bytes added from now on count as
    /// allocated when it is retired.
    ///
    /// # Panics
    ///
    /// Panics unless the arena was just initialized, or if `region` is empty.
    pub fn reuse(&self, region: &'h P::Region) {
        self.arena.set(region);
    }

    /// Retire the active region without filling and leave the arena
    /// uninitialized.
    pub fn release(&self) -> Option<&'h P::Region> {
        self.arena.release_with(|fill_up| self.retire(fill_up))
    }
}

impl<'h, P: RegionProvider + 'h> AllocArena<'h> for CollectorAllocRegion<'h, P> {
    type Provider = P;
    type Policy = CollectorPolicy;

    fn arena(&self) -> &AllocRegion<'h, P, CollectorPolicy> {
        &self.arena
    }

    fn init(&self) {
        CollectorAllocRegion::init(self);
    }

    fn retire(&self, fill_up: bool) -> usize {
        CollectorAllocRegion::retire(self, fill_up)
    }

    fn release(&self) -> Option<&'h P::Region> {
        CollectorAllocRegion::release(self)
    }
}

impl<P: RegionProvider> std::fmt::Debug for CollectorAllocRegion<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorAllocRegion")
            .field("arena", &self.arena)
            .field("purpose", &self.arena.policy().purpose)
            .finish()
    }
}
