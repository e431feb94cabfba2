//! Heap regions for the Grain allocator.
//!
//! A [`HeapRegion`] is a fixed span of heap addresses with an atomic bump
//! cursor. Any number of threads may allocate from it concurrently; filler
//! objects written at retirement are recorded so heap walkers can step over
//! them. [`RegionLayout`] describes the uniform geometry of a heap's region
//! table and builds regions (and the shared sentinel) from it.
//!
//! ```text
//! heap_base
//! │
//! ├── region 0  [bottom ─── top ─────────── end)
//! ├── region 1  [bottom ──────────── top ── end)
//! └── ...
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod heap_region;
pub mod layout;

pub use heap_region::{FillerObject, HeapRegion};
pub use layout::RegionLayout;
