//! Core types and traits for the Grain region allocator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: heap addresses,
//! region and node identifiers, allocation purposes, the [`Region`] and
//! [`RegionProvider`] capabilities consumed by the allocator, and the
//! diagnostics observer interface.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod observer;
pub mod traits;

pub use error::ConfigError;
pub use id::{AllocPurpose, Allocation, HeapAddr, NodeIndex, RegionIndex};
pub use observer::{AllocEvent, AllocObserver, NoopObserver, RegionLabel, SizeTrace, TraceLevel};
pub use traits::{Region, RegionProvider};
