//! Region allocation arenas for the Grain heap.
//!
//! Application threads and collection workers allocate by bumping a cursor
//! in the region their arena currently holds. This crate manages those
//! arenas: installing fresh regions from the heap's region provider,
//! retiring exhausted ones, and keeping the accounting the provider and the
//! collector statistics need. It is the only crate in the workspace that
//! contains `unsafe` code, confined to `raw.rs`.
//!
//! # Architecture
//!
//! ```text
//! AllocContext (provider + sentinel + config + observer, set up once)
//! └── AllocRegion<P, K: RegionPolicy<P>> (active region, install count)
//!     ├── MutatorAllocRegion   (MutatorPolicy, retained region, waste)
//!     └── CollectorAllocRegion (CollectorPolicy, purpose, EvacStats)
//! ```
//!
//! # Threading
//!
//! - **Fast path:** [`AllocArena::allocate`] and
//!   [`AllocArena::attempt_allocation`] are lock-free and may run on any
//!   number of threads at once.
//! - **Slow path:** installing, setting, retiring and releasing regions
//!   must be serialized per arena by the caller.
//!
//! A newly installed region is published with a release fence after one
//! allocation has already been carved out of it, so readers never observe
//! an empty active region.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod collector;
pub mod config;
pub mod context;
pub mod mutator;
pub mod observer;
mod raw;
pub mod stats;

// Public re-exports for the primary API surface.
pub use arena::{AllocArena, AllocRegion, RegionPolicy};
pub use collector::{CollectorAllocRegion, CollectorPolicy};
pub use config::AllocConfig;
pub use context::{AllocContext, ContextCell};
pub use mutator::{MutatorAllocRegion, MutatorPolicy};
pub use observer::{ChannelObserver, LogObserver, LOG_TARGET};
pub use stats::{EvacStats, EvacStatsRegistry, MutatorAllocStats, WasteStats};
