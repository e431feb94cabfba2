//! Grain: lock-free region bump allocation for garbage-collected heaps.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Grain sub-crates. For most users, adding `grain` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use grain::prelude::*;
//! use grain_test_utils::MockProvider;
//!
//! // Eight regions of 1024 eight-byte words each.
//! let provider = MockProvider::new(RegionLayout::new(1024), 8);
//! let sentinel = provider.sentinel();
//! let config = AllocConfig::for_layout(provider.layout());
//! let ctx = AllocContext::setup(&provider, &sentinel, config).unwrap();
//!
//! let arena = MutatorAllocRegion::new(&ctx, NodeIndex::ANY);
//! arena.init();
//!
//! // The fast path fails until a region is installed.
//! assert!(arena.attempt_allocation(4, 64).is_none());
//! let first = arena.attempt_allocation_locked(4, 64).unwrap();
//! let second = arena.attempt_allocation(4, 64).unwrap();
//! assert_eq!(second.start, first.end(8));
//!
//! arena.release();
//! assert_eq!(arena.count(), 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `grain-core` | IDs, addresses, `Region`/`RegionProvider` traits, observers |
//! | [`region`] | `grain-region` | `HeapRegion` and `RegionLayout` |
//! | [`alloc`] | `grain-alloc` | Arenas, context setup, statistics, observers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`grain-core`).
///
/// Contains heap addresses, region and node identifiers, the
/// [`types::Region`] and [`types::RegionProvider`] capabilities, and the
/// [`types::AllocObserver`] diagnostics interface.
pub use grain_core as types;

/// Concrete heap regions (`grain-region`).
pub use grain_region as region;

/// Allocation arenas (`grain-alloc`).
///
/// [`alloc::MutatorAllocRegion`] for application threads,
/// [`alloc::CollectorAllocRegion`] for collection workers, both built on
/// [`alloc::AllocRegion`].
pub use grain_alloc as alloc;

/// Common imports for typical Grain usage.
///
/// ```rust
/// use grain::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use grain_core::{
        AllocPurpose, Allocation, HeapAddr, NodeIndex, Region, RegionIndex, RegionProvider,
    };

    // Errors
    pub use grain_core::ConfigError;

    // Observers
    pub use grain_alloc::{ChannelObserver, LogObserver};
    pub use grain_core::{AllocObserver, NoopObserver, TraceLevel};

    // Regions
    pub use grain_region::{HeapRegion, RegionLayout};

    // Arenas
    pub use grain_alloc::{
        AllocArena, AllocConfig, AllocContext, CollectorAllocRegion, EvacStats,
        EvacStatsRegistry, MutatorAllocRegion,
    };
}
