//! Test utilities and mock collaborators for Grain development.
//!
//! Provides a [`MockProvider`] standing in for the heap's region manager
//! (a fixed region table with a FIFO free list that records every request
//! and retirement), a [`RecordingObserver`] that captures arena events, and
//! layout fixtures.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::VecDeque;
use std::sync::Mutex;

use grain_core::{
    AllocEvent, AllocObserver, AllocPurpose, NodeIndex, Region, RegionIndex, RegionProvider,
    TraceLevel,
};
use grain_region::{HeapRegion, RegionLayout};

/// A request made to [`MockProvider::allocate_new_region`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionRequest {
    pub word_size: usize,
    pub purpose: Option<AllocPurpose>,
    pub node: NodeIndex,
    /// Region handed out, `None` if the request was refused.
    pub granted: Option<RegionIndex>,
}

/// A call to [`RegionProvider::retire_mutator_region`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutatorRetirement {
    pub region: RegionIndex,
    pub used_bytes: usize,
}

/// A call to [`RegionProvider::retire_collector_region`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectorRetirement {
    pub region: RegionIndex,
    pub allocated_bytes: usize,
    pub purpose: AllocPurpose,
}

/// Region provider over a fixed table of [`HeapRegion`]s.
///
/// Regions are handed out lowest index first. Retired regions are recorded
/// but not returned to the free list; call [`recycle`](MockProvider::recycle)
/// to make one available again.
pub struct MockProvider {
    layout: RegionLayout,
    regions: Vec<HeapRegion>,
    free: Mutex<VecDeque<RegionIndex>>,
    requests: Mutex<Vec<RegionRequest>>,
    mutator_retired: Mutex<Vec<MutatorRetirement>>,
    collector_retired: Mutex<Vec<CollectorRetirement>>,
}

impl MockProvider {
    /// Create a provider with `region_count` empty regions laid out per `layout`.
    ///
    /// # Panics
    ///
    /// Panics if the layout is invalid.
    pub fn new(layout: RegionLayout, region_count: u32) -> Self {
        if let Err(e) = layout.validate() {
            panic!("MockProvider layout: {e}");
        }
        let regions = (0..region_count)
            .map(|i| layout.region(RegionIndex(i)))
            .collect();
        Self {
            layout,
            regions,
            free: Mutex::new((0..region_count).map(RegionIndex).collect()),
            requests: Mutex::new(Vec::new()),
            mutator_retired: Mutex::new(Vec::new()),
            collector_retired: Mutex::new(Vec::new()),
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// A zero-capacity sentinel matching this provider's layout.
    pub fn sentinel(&self) -> HeapRegion {
        self.layout.sentinel()
    }

    pub fn region(&self, index: RegionIndex) -> &HeapRegion {
        &self.regions[index.0 as usize]
    }

    /// Number of regions still available.
    pub fn free_count(&self) -> usize {
        self.free.lock().unwrap().len()
    }

    /// Remove every remaining region from the free list, so that further
    /// requests are refused.
    pub fn exhaust(&self) {
        self.free.lock().unwrap().clear();
    }

    /// Reset a region and put it back at the end of the free list.
    pub fn recycle(&self, index: RegionIndex) {
        self.region(index).reset();
        self.free.lock().unwrap().push_back(index);
    }

    pub fn requests(&self) -> Vec<RegionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn mutator_retirements(&self) -> Vec<MutatorRetirement> {
        self.mutator_retired.lock().unwrap().clone()
    }

    pub fn collector_retirements(&self) -> Vec<CollectorRetirement> {
        self.collector_retired.lock().unwrap().clone()
    }
}

impl RegionProvider for MockProvider {
    type Region = HeapRegion;

    fn allocate_new_region(
        &self,
        word_size: usize,
        purpose: Option<AllocPurpose>,
        node: NodeIndex,
    ) -> Option<&HeapRegion> {
        let granted = if word_size > self.layout.region_words {
            None
        } else {
            self.free.lock().unwrap().pop_front()
        };
        self.requests.lock().unwrap().push(RegionRequest {
            word_size,
            purpose,
            node,
            granted,
        });
        granted.map(|index| self.region(index))
    }

    fn retire_mutator_region(&self, region: &HeapRegion, used_bytes: usize) {
        self.mutator_retired
            .lock()
            .unwrap()
            .push(MutatorRetirement {
                region: region.index(),
                used_bytes,
            });
    }

    fn retire_collector_region(
        &self,
        region: &HeapRegion,
        allocated_bytes: usize,
        purpose: AllocPurpose,
    ) {
        self.collector_retired
            .lock()
            .unwrap()
            .push(CollectorRetirement {
                region: region.index(),
                allocated_bytes,
                purpose,
            });
    }
}

/// Observer that stores every event it is offered.
pub struct RecordingObserver {
    level: TraceLevel,
    events: Mutex<Vec<AllocEvent>>,
}

impl RecordingObserver {
    pub fn new(level: TraceLevel) -> Self {
        Self {
            level,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<AllocEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Operation labels in the order they were observed.
    pub fn ops(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.op).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl AllocObserver for RecordingObserver {
    fn level(&self) -> TraceLevel {
        self.level
    }

    fn on_event(&self, event: &AllocEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
