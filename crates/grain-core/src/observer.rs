//! Diagnostics observer for arena state transitions.
//!
//! Arenas report every transition (initialization, installs, retirement,
//! release) to an [`AllocObserver`]. Observers are purely passive: nothing
//! they do can influence allocation. The default [`NoopObserver`] reports
//! [`TraceLevel::Off`], so arenas skip building events entirely.

use std::fmt;

use crate::id::{HeapAddr, RegionIndex};

/// Verbosity requested by an observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TraceLevel {
    /// No events.
    Off,
    /// State transitions and failed allocations, without size detail.
    Debug,
    /// Everything, including min/desired/actual sizes of each allocation.
    Trace,
}

/// Identity of the region an arena currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionLabel {
    /// The arena is uninitialized or released.
    Null,
    /// The arena holds the shared sentinel region.
    Sentinel,
    /// The arena holds a real region.
    Region {
        /// Table index of the region.
        index: RegionIndex,
        /// First address.
        bottom: HeapAddr,
        /// Bump cursor at the time of the event.
        top: HeapAddr,
        /// One-past-the-end address.
        end: HeapAddr,
    },
}

impl fmt::Display for RegionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Sentinel => write!(f, "SENTINEL"),
            Self::Region {
                index,
                bottom,
                top,
                end,
            } => write!(f, "{index}:[{bottom}, {top}, {end}]"),
        }
    }
}

/// Size detail attached to allocation events at [`TraceLevel::Trace`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeTrace {
    /// Smallest acceptable size in words.
    pub min_word_size: usize,
    /// Requested size in words.
    pub desired_word_size: usize,
    /// Size actually handed out, 0 on failure.
    pub actual_word_size: usize,
    /// Start of the allocation, if any.
    pub result: Option<HeapAddr>,
}

impl SizeTrace {
    fn is_failure(&self) -> bool {
        self.actual_word_size == 0 && self.result.is_none()
    }
}

/// A single arena state transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocEvent {
    /// Name of the arena reporting the event.
    pub arena: &'static str,
    /// Number of regions the arena has installed so far.
    pub count: u32,
    /// Region held by the arena when the event was raised.
    pub region: RegionLabel,
    /// Short label of the operation, e.g. `"retiring"`.
    pub op: &'static str,
    /// Allocation sizes, present only at [`TraceLevel::Trace`].
    pub sizes: Option<SizeTrace>,
}

impl AllocEvent {
    /// Filter this event for an observer running at `level`.
    ///
    /// Plain transitions and failed allocations pass at `Debug`; size
    /// detail is stripped unless the level is `Trace`. Successful
    /// allocation events pass only at `Trace`.
    pub fn for_level(mut self, level: TraceLevel) -> Option<AllocEvent> {
        match level {
            TraceLevel::Off => None,
            TraceLevel::Trace => Some(self),
            TraceLevel::Debug => match self.sizes {
                Some(sizes) if !sizes.is_failure() => None,
                _ => {
                    self.sizes = None;
                    Some(self)
                }
            },
        }
    }
}

impl fmt::Display for AllocEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {} : {}", self.arena, self.count, self.region, self.op)?;
        if let Some(sizes) = &self.sizes {
            match sizes.result {
                Some(result) => write!(
                    f,
                    " min {} desired {} actual {} {result}",
                    sizes.min_word_size, sizes.desired_word_size, sizes.actual_word_size
                )?,
                None if sizes.min_word_size != 0 => write!(
                    f,
                    " min {} desired {}",
                    sizes.min_word_size, sizes.desired_word_size
                )?,
                None => {}
            }
        }
        Ok(())
    }
}

/// Receives arena state transitions.
pub trait AllocObserver: Send + Sync {
    /// Verbosity this observer wants. Checked before every event is built.
    fn level(&self) -> TraceLevel;

    /// Called for every event admitted by [`level`](AllocObserver::level).
    fn on_event(&self, event: &AllocEvent);
}

/// Observer that wants nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl AllocObserver for NoopObserver {
    fn level(&self) -> TraceLevel {
        TraceLevel::Off
    }

    fn on_event(&self, _event: &AllocEvent) {}
}
