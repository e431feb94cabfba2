//! The allocation arena: one active region and the protocol around it.
//!
//! An [`AllocRegion`] holds a single active region that any number of
//! threads bump-allocate from without a lock. When the region runs out, one
//! thread (serialized by the caller) retires it and installs a fresh one from
//! the [`RegionProvider`]. The arena never holds nothing: before the first
//! install, and after each retirement, it holds the shared zero-capacity
//! sentinel region, against which every allocation fails.
//!
//! # Publication
//!
//! A fresh region is published only after one allocation has been carved
//! out of it privately, and the publishing store is preceded by a release
//! fence. A thread that loads the active region therefore never sees a
//! newly installed region that is still empty, so retirement never has to
//! consider handing back an untouched region.
//!
//! # Variants
//!
//! What differs between application-thread and collection-phase arenas is
//! where regions come from and how they are handed back. That is captured
//! by [`RegionPolicy`]. The [`AllocArena`] trait puts the slow path on top
//! of any arena so that variant-specific retirement (region retention,
//! evacuation statistics) is used consistently.

use std::sync::atomic::{fence, AtomicU32, Ordering};

use grain_core::{
    AllocEvent, Allocation, HeapAddr, NodeIndex, Region, RegionLabel, RegionProvider, SizeTrace,
    TraceLevel,
};

use crate::context::AllocContext;
use crate::raw::AtomicRegionRef;

/// Where an arena gets regions from and where it hands them back.
pub trait RegionPolicy<P: RegionProvider>: Send + Sync {
    /// Ask `provider` for a fresh region of at least `word_size` words.
    fn allocate_new_region<'h>(
        &self,
        provider: &'h P,
        word_size: usize,
        node: NodeIndex,
    ) -> Option<&'h P::Region>;

    /// Called right before `region` becomes the active region, either fresh
    /// from the provider or adopted through [`AllocRegion::set`].
    fn on_install(&self, _region: &P::Region) {}

    /// Hand a retired region back to `provider`. `used_bytes` excludes any
    /// filler written by this retirement.
    fn retire_region(&self, provider: &P, region: &P::Region, used_bytes: usize);
}

/// An arena allocating out of one active region at a time.
///
/// All operations take `&self`. The fast path ([`allocate`] and
/// [`attempt_allocation`]) may be called from any number of threads at once.
/// Everything else ([`init`], [`new_region_and_allocate`], [`set`],
/// [`retire`], [`release`]) must be serialized by the caller, typically with
/// a per-arena lock; the arena does not enforce this.
///
/// [`allocate`]: AllocRegion::allocate
/// [`attempt_allocation`]: AllocRegion::attempt_allocation
/// [`init`]: AllocRegion::init
/// [`new_region_and_allocate`]: AllocRegion::new_region_and_allocate
/// [`set`]: AllocRegion::set
/// [`retire`]: AllocRegion::retire
/// [`release`]: AllocRegion::release
pub struct AllocRegion<'h, P: RegionProvider, K> {
    ctx: &'h AllocContext<'h, P>,
    /// Null until `init`, the sentinel or a real region afterwards.
    active: AtomicRegionRef<'h, P::Region>,
    /// Regions installed since the last `init`.
    count: AtomicU32,
    name: &'static str,
    node: NodeIndex,
    policy: K,
}

impl<'h, P: RegionProvider, K: RegionPolicy<P>> AllocRegion<'h, P, K> {
    /// Create an uninitialized arena. Call [`init`](Self::init) before use.
    pub fn new(ctx: &'h AllocContext<'h, P>, name: &'static str, node: NodeIndex, policy: K) -> Self {
        Self {
            ctx,
            active: AtomicRegionRef::null(),
            count: AtomicU32::new(0),
            name,
            node,
            policy,
        }
    }

    /// Install the sentinel and reset the install counter.
    ///
    /// # Panics
    ///
    /// Panics if the arena is already initialized and not yet released.
    pub fn init(&self) {
        self.trace("initializing");
        assert!(
            self.active.load(Ordering::Relaxed).is_none(),
            "{}: init on an arena that is already initialized",
            self.name
        );
        self.active.store(Some(self.ctx.sentinel()), Ordering::Release);
        self.count.store(0, Ordering::Relaxed);
        self.trace("initialized");
    }

    /// Whether [`init`](Self::init) has been called since construction or
    /// the last [`release`](Self::release).
    pub fn is_initialized(&self) -> bool {
        self.active.load(Ordering::Acquire).is_some()
    }

    /// The active region, `None` while the arena holds the sentinel or is
    /// not initialized.
    pub fn get(&self) -> Option<&'h P::Region> {
        self.active
            .load(Ordering::Acquire)
            .filter(|region| !self.ctx.is_sentinel(region))
    }

    /// Number of regions installed since the last [`init`](Self::init).
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// NUMA node regions are requested for.
    pub fn node_index(&self) -> NodeIndex {
        self.node
    }

    /// The region policy.
    pub fn policy(&self) -> &K {
        &self.policy
    }

    /// The shared allocator context.
    pub fn context(&self) -> &'h AllocContext<'h, P> {
        self.ctx
    }

    /// Single lock-free attempt to allocate `word_size` words from the
    /// active region. Failure is not retried.
    ///
    /// # Panics
    ///
    /// Panics if the arena is not initialized.
    pub fn allocate(&self, word_size: usize) -> Option<HeapAddr> {
        self.active().racy_allocate(word_size)
    }

    /// Lock-free attempt to allocate between `min_word_size` and
    /// `desired_word_size` words from the active region.
    ///
    /// # Panics
    ///
    /// Panics if the arena is not initialized.
    pub fn attempt_allocation(
        &self,
        min_word_size: usize,
        desired_word_size: usize,
    ) -> Option<Allocation> {
        let result = self
            .active()
            .par_allocate(min_word_size, desired_word_size);
        match result {
            Some(_) => self.trace_sizes("alloc", min_word_size, desired_word_size, result),
            None => self.trace_sizes("alloc failed", min_word_size, desired_word_size, None),
        }
        result
    }

    /// Install a fresh region from the provider and allocate `word_size`
    /// words from it.
    ///
    /// The allocation happens before the region is published, so the
    /// region is never observed empty. Returns `None` when the provider has
    /// no region to give; the arena then keeps holding the sentinel.
    ///
    /// # Panics
    ///
    /// Panics unless the arena currently holds the sentinel.
    pub fn new_region_and_allocate(&self, word_size: usize) -> Option<HeapAddr> {
        let current = self.active();
        assert!(
            self.ctx.is_sentinel(current),
            "{}: a new region can only be installed over the sentinel",
            self.name
        );

        self.trace("attempting region allocation");
        let Some(region) =
            self.policy
                .allocate_new_region(self.ctx.provider(), word_size, self.node)
        else {
            self.trace("region allocation failed");
            return None;
        };

        region.reset_pre_filler_top();
        debug_assert!(region.is_empty(), "new regions should be empty");
        self.policy.on_install(region);
        let Some(result) = region.racy_allocate(word_size) else {
            panic!(
                "{}: region {} cannot hold {word_size} words",
                self.name,
                region.index()
            );
        };

        self.publish(region);
        self.trace("region allocation successful");
        Some(result)
    }

    /// Install `region` directly, bypassing the provider.
    ///
    /// # Panics
    ///
    /// Panics unless the arena holds the sentinel and has never installed a
    /// region since [`init`](Self::init), or if `region` is empty.
    pub fn set(&self, region: &'h P::Region) {
        self.trace("setting");
        let current = self.active();
        assert!(
            self.ctx.is_sentinel(current) && self.count() == 0,
            "{}: set requires a freshly initialized arena",
            self.name
        );
        self.policy.on_install(region);
        self.publish(region);
        self.trace("set");
    }

    /// Retire the active region and fall back to the sentinel.
    ///
    /// With `fill_up`, the remaining space is first claimed and turned into
    /// a filler object so that racing allocators can no longer use it.
    /// Returns the bytes wasted. Retiring the sentinel does nothing.
    ///
    /// # Panics
    ///
    /// Panics if the arena is not initialized.
    pub fn retire(&self, fill_up: bool) -> usize {
        let current = self.active();
        self.trace("retiring");
        let mut waste = 0;
        if !self.ctx.is_sentinel(current) {
            waste = self.retire_internal(current, fill_up);
            self.reset_to_sentinel();
        }
        self.trace("retired");
        waste
    }

    /// Retire the active region without filling and leave the arena
    /// uninitialized.
    ///
    /// Returns the region that was active, or `None` if the arena held the
    /// sentinel.
    pub fn release(&self) -> Option<&'h P::Region> {
        self.release_with(|fill_up| self.retire(fill_up))
    }

    /// [`release`](Self::release) with a variant-specific retirement.
    pub(crate) fn release_with(&self, retire: impl FnOnce(bool) -> usize) -> Option<&'h P::Region> {
        self.trace("releasing");
        let current = self.active();
        retire(false);
        assert!(
            self.active
                .load(Ordering::Relaxed)
                .is_some_and(|region| self.ctx.is_sentinel(region)),
            "{}: retire must leave the sentinel installed",
            self.name
        );
        self.active.store(None, Ordering::Release);
        self.trace("released");
        (!self.ctx.is_sentinel(current)).then_some(current)
    }

    /// Fill (optionally) and hand back `region`. Returns the bytes wasted.
    pub(crate) fn retire_internal(&self, region: &'h P::Region, fill_up: bool) -> usize {
        assert!(
            !region.is_empty(),
            "{}: region {} retired while empty",
            self.name,
            region.index()
        );
        let (waste, filler_bytes) = if fill_up {
            self.fill_up_remaining_space(region)
        } else {
            (region.free(), 0)
        };
        let used_bytes = region.used() - filler_bytes;
        self.policy
            .retire_region(self.ctx.provider(), region, used_bytes);
        waste
    }

    /// Claim the rest of `region` and turn it into a filler object.
    ///
    /// Other threads may still be bump-allocating, so the claim can lose a
    /// race; it is retried against the shrinking free space until it
    /// succeeds or the remainder is too small to fill. Returns the total
    /// waste and the part of it covered by the filler.
    fn fill_up_remaining_space(&self, region: &P::Region) -> (usize, usize) {
        let config = self.ctx.config();
        let word_bytes = config.heap_word_size;
        let min_fill_words = config.min_fill_words;

        let mut filler_bytes = 0;
        let mut free_words = region.free() / word_bytes;
        while free_words >= min_fill_words {
            if let Some(start) = region.racy_allocate(free_words) {
                region.fill_with_filler(start, free_words);
                region.set_pre_filler_top(start);
                filler_bytes = free_words * word_bytes;
                break;
            }
            free_words = region.free() / word_bytes;
        }

        let residual = region.free();
        assert!(
            residual / word_bytes < min_fill_words,
            "{}: {residual} bytes still fillable after retirement",
            self.name
        );
        (filler_bytes + residual, filler_bytes)
    }

    fn publish(&self, region: &'h P::Region) {
        self.trace("update");
        assert!(
            !self.ctx.is_sentinel(region) && !region.is_empty(),
            "{}: only non-empty regions may become active",
            self.name
        );
        fence(Ordering::Release);
        self.active.store(Some(region), Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.trace("updated");
    }

    pub(crate) fn reset_to_sentinel(&self) {
        self.active.store(Some(self.ctx.sentinel()), Ordering::Release);
    }

    /// The active region, sentinel included.
    pub(crate) fn active(&self) -> &'h P::Region {
        match self.active.load(Ordering::Acquire) {
            Some(region) => region,
            None => panic!("{}: not initialized", self.name),
        }
    }

    pub(crate) fn trace(&self, op: &'static str) {
        self.emit(op, None);
    }

    pub(crate) fn trace_sizes(
        &self,
        op: &'static str,
        min_word_size: usize,
        desired_word_size: usize,
        result: Option<Allocation>,
    ) {
        self.emit(
            op,
            Some(SizeTrace {
                min_word_size,
                desired_word_size,
                actual_word_size: result.map_or(0, |a| a.word_size),
                result: result.map(|a| a.start),
            }),
        );
    }

    fn emit(&self, op: &'static str, sizes: Option<SizeTrace>) {
        let observer = self.ctx.observer();
        let level = observer.level();
        if level == TraceLevel::Off {
            return;
        }
        let event = AllocEvent {
            arena: self.name,
            count: self.count(),
            region: self.label(),
            op,
            sizes,
        };
        if let Some(event) = event.for_level(level) {
            observer.on_event(&event);
        }
    }

    fn label(&self) -> RegionLabel {
        match self.active.load(Ordering::Acquire) {
            None => RegionLabel::Null,
            Some(region) if self.ctx.is_sentinel(region) => RegionLabel::Sentinel,
            Some(region) => RegionLabel::Region {
                index: region.index(),
                bottom: region.bottom(),
                top: region.top(),
                end: region.end(),
            },
        }
    }
}

impl<P: RegionProvider, K> std::fmt::Debug for AllocRegion<'_, P, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocRegion")
            .field("name", &self.name)
            .field("node", &self.node)
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Uniform slow path over the base arena and its variants.
///
/// Implementors supply their own [`retire`](AllocArena::retire) and
/// [`release`](AllocArena::release); the provided methods route through
/// them so that variant behavior applies on every path that gives up a
/// region.
pub trait AllocArena<'h> {
    /// Region provider backing the arena.
    type Provider: RegionProvider + 'h;
    /// Region policy of the underlying base arena.
    type Policy: RegionPolicy<Self::Provider>;

    /// The underlying base arena.
    fn arena(&self) -> &AllocRegion<'h, Self::Provider, Self::Policy>;

    /// Install the sentinel and reset per-tenancy state.
    fn init(&self);

    /// Retire the active region. Returns the bytes wasted.
    fn retire(&self, fill_up: bool) -> usize;

    /// Retire without filling and leave the arena uninitialized.
    fn release(&self) -> Option<&'h <Self::Provider as RegionProvider>::Region>;

    /// Lock-free single attempt; see [`AllocRegion::allocate`].
    fn allocate(&self, word_size: usize) -> Option<HeapAddr> {
        self.arena().allocate(word_size)
    }

    /// Lock-free min/desired attempt; see [`AllocRegion::attempt_allocation`].
    fn attempt_allocation(&self, min_word_size: usize, desired_word_size: usize) -> Option<Allocation> {
        self.arena()
            .attempt_allocation(min_word_size, desired_word_size)
    }

    /// Slow path. The caller must hold the arena's slow-path lock.
    ///
    /// Retries the fast path first, since another thread may have installed
    /// a fresh region while this one waited for the lock.
    fn attempt_allocation_locked(
        &self,
        min_word_size: usize,
        desired_word_size: usize,
    ) -> Option<Allocation> {
        if let Some(result) = self.attempt_allocation(min_word_size, desired_word_size) {
            return Some(result);
        }
        self.attempt_allocation_using_new_region(min_word_size, desired_word_size)
    }

    /// Retire the active region with fill and allocate `desired_word_size`
    /// words from a fresh one. The caller must hold the slow-path lock.
    fn attempt_allocation_using_new_region(
        &self,
        min_word_size: usize,
        desired_word_size: usize,
    ) -> Option<Allocation> {
        self.retire(true);
        let arena = self.arena();
        match arena.new_region_and_allocate(desired_word_size) {
            Some(start) => {
                let result = Allocation {
                    start,
                    word_size: desired_word_size,
                };
                arena.trace_sizes(
                    "alloc locked (second attempt)",
                    min_word_size,
                    desired_word_size,
                    Some(result),
                );
                Some(result)
            }
            None => {
                arena.trace_sizes("alloc locked failed", min_word_size, desired_word_size, None);
                None
            }
        }
    }

    /// Install a fresh region and allocate `word_size` words from it. The
    /// caller must already have retired the active region.
    fn attempt_allocation_force(&self, word_size: usize) -> Option<HeapAddr> {
        let arena = self.arena();
        arena.trace_sizes("forcing alloc", word_size, word_size, None);
        match arena.new_region_and_allocate(word_size) {
            Some(start) => {
                let result = Allocation { start, word_size };
                arena.trace_sizes("alloc forced", word_size, word_size, Some(result));
                Some(start)
            }
            None => {
                arena.trace_sizes("alloc forced failed", word_size, word_size, None);
                None
            }
        }
    }

    /// See [`AllocRegion::new_region_and_allocate`].
    fn new_region_and_allocate(&self, word_size: usize) -> Option<HeapAddr> {
        self.arena().new_region_and_allocate(word_size)
    }

    /// The active region, `None` while holding the sentinel.
    fn get(&self) -> Option<&'h <Self::Provider as RegionProvider>::Region> {
        self.arena().get()
    }

    /// Regions installed since the last init.
    fn count(&self) -> u32 {
        self.arena().count()
    }
}

impl<'h, P: RegionProvider + 'h, K: RegionPolicy<P>> AllocArena<'h> for AllocRegion<'h, P, K> {
    type Provider = P;
    type Policy = K;

    fn arena(&self) -> &AllocRegion<'h, P, K> {
        self
    }

    fn init(&self) {
        AllocRegion::init(self);
    }

    fn retire(&self, fill_up: bool) -> usize {
        AllocRegion::retire(self, fill_up)
    }

    fn release(&self) -> Option<&'h P::Region> {
        AllocRegion::release(self)
    }
}
