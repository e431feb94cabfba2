//! Integration test: many threads allocating from shared arenas.
//!
//! Worker threads run the lock-free fast path against one arena and fall
//! back to a per-arena mutex for the slow path, the way a heap would drive
//! it. Every allocation handed out is sent over a channel; after the run
//! the allocations must be pairwise disjoint, lie inside regions the
//! provider handed out, and never overlap a filler object.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use crossbeam_channel::unbounded;
use grain_alloc::{
    AllocArena, AllocConfig, AllocContext, CollectorAllocRegion, EvacStats, MutatorAllocRegion,
};
use grain_core::{Allocation, HeapAddr, NodeIndex, Region, RegionIndex};
use grain_test_utils::fixtures::word_layout;
use grain_test_utils::MockProvider;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const THREADS: usize = 8;
const ALLOCS_PER_THREAD: usize = 2_000;
const REGION_WORDS: usize = 4096;
const WORD_BYTES: usize = 8;

/// Drive `arena` from `THREADS` threads with seeded random sizes.
fn hammer<'h, A>(arena: &A, seed: u64) -> Vec<Allocation>
where
    A: AllocArena<'h> + Sync,
{
    let slow_path = Mutex::new(());
    let (tx, rx) = unbounded();

    thread::scope(|s| {
        for t in 0..THREADS {
            let tx = tx.clone();
            let slow_path = &slow_path;
            s.spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(seed ^ t as u64);
                for _ in 0..ALLOCS_PER_THREAD {
                    // Never below the minimum filler size, so nothing fits
                    // in what a retirement leaves unfilled.
                    let min = rng.random_range(2..=16);
                    let desired = min + rng.random_range(0..=48);
                    let result = match arena.attempt_allocation(min, desired) {
                        Some(a) => Some(a),
                        None => {
                            let _guard = slow_path.lock().unwrap();
                            arena.attempt_allocation_locked(min, desired)
                        }
                    };
                    let Some(allocation) = result else {
                        break;
                    };
                    assert!(allocation.word_size >= min && allocation.word_size <= desired);
                    tx.send(allocation).unwrap();
                }
            });
        }
    });
    drop(tx);
    rx.into_iter().collect()
}

fn region_of(provider: &MockProvider, addr: HeapAddr) -> RegionIndex {
    let offset = addr.0 - provider.layout().heap_base;
    RegionIndex((offset / provider.layout().region_bytes()) as u32)
}

fn assert_disjoint_and_inside_regions(provider: &MockProvider, mut allocs: Vec<Allocation>) {
    allocs.sort_by_key(|a| a.start);
    for pair in allocs.windows(2) {
        let end = pair[0].end(WORD_BYTES);
        assert!(
            end <= pair[1].start,
            "allocation [{}, {end}) overlaps allocation at {}",
            pair[0].start,
            pair[1].start
        );
    }
    for a in &allocs {
        let region = provider.region(region_of(provider, a.start));
        assert!(a.end(WORD_BYTES) <= region.end(), "allocation crosses a region boundary");
        assert!(!region.is_filler(a.start), "allocation at {} inside a filler", a.start);
    }
}

#[test]
fn mutator_allocations_never_overlap() {
    let provider = MockProvider::new(word_layout(REGION_WORDS), 256);
    let sentinel = provider.sentinel();
    let config = AllocConfig::for_layout(provider.layout());
    let ctx = AllocContext::setup(&provider, &sentinel, config).unwrap();
    let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
    arena.init();

    let allocs = hammer(&arena, 0x5eed);
    assert_eq!(allocs.len(), THREADS * ALLOCS_PER_THREAD);
    let allocated_bytes: usize = allocs.iter().map(|a| a.word_size * WORD_BYTES).sum();

    arena.release();
    assert_disjoint_and_inside_regions(&provider, allocs);

    // Everything handed out was reported back as used, fillers excluded.
    let used: usize = provider
        .mutator_retirements()
        .iter()
        .map(|r| r.used_bytes)
        .sum();
    assert_eq!(used, allocated_bytes);
    assert_eq!(provider.mutator_retirements().len() as u32, arena.count());
}

#[test]
fn collector_allocations_never_overlap() {
    let provider = MockProvider::new(word_layout(REGION_WORDS), 256);
    let sentinel = provider.sentinel();
    let config = AllocConfig::for_layout(provider.layout());
    let ctx = AllocContext::setup(&provider, &sentinel, config).unwrap();
    let stats = EvacStats::new();
    let arena = CollectorAllocRegion::survivor(&ctx, &stats, NodeIndex::ANY);
    arena.init();

    let allocs = hammer(&arena, 0xc0ffee);
    let allocated_bytes: usize = allocs.iter().map(|a| a.word_size * WORD_BYTES).sum();
    arena.release();
    assert_disjoint_and_inside_regions(&provider, allocs);

    let reported: usize = provider
        .collector_retirements()
        .iter()
        .map(|r| r.allocated_bytes)
        .sum();
    assert_eq!(reported, allocated_bytes);
    assert_eq!(stats.regions_filled(), arena.count());
}

#[test]
fn exhaustion_under_contention_is_clean() {
    let provider = MockProvider::new(word_layout(REGION_WORDS), 4);
    let sentinel = provider.sentinel();
    let config = AllocConfig::for_layout(provider.layout());
    let ctx = AllocContext::setup(&provider, &sentinel, config).unwrap();
    let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
    arena.init();

    let allocs = hammer(&arena, 7);
    assert!(allocs.len() < THREADS * ALLOCS_PER_THREAD);
    assert!(arena.count() <= 4);
    assert_eq!(provider.free_count(), 0);
    arena.release();
    assert_disjoint_and_inside_regions(&provider, allocs);
}

#[test]
fn readers_never_observe_an_empty_active_region() {
    let provider = MockProvider::new(word_layout(64), 256);
    let sentinel = provider.sentinel();
    let config = AllocConfig::for_layout(provider.layout());
    let ctx = AllocContext::setup(&provider, &sentinel, config).unwrap();
    let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
    arena.init();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    if let Some(region) = arena.get() {
                        assert!(!region.is_empty(), "published region {} is empty", region.index());
                    }
                }
            });
        }
        s.spawn(|| {
            while arena.attempt_allocation_using_new_region(1, 8).is_some() {}
            done.store(true, Ordering::Release);
        });
    });
    assert_eq!(arena.count(), 256);
}
