//! Observer implementations backed by the `log` facade and by channels.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use grain_core::{AllocEvent, AllocObserver, TraceLevel};

/// Log target used for arena transitions and release summaries.
pub const LOG_TARGET: &str = "grain::alloc::region";

/// Forwards arena events to the `log` facade.
///
/// The trace level follows whatever the installed logger enables for
/// [`LOG_TARGET`]: size-detailed events go to `trace!`, plain transitions to
/// `debug!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl AllocObserver for LogObserver {
    fn level(&self) -> TraceLevel {
        if log::log_enabled!(target: LOG_TARGET, log::Level::Trace) {
            TraceLevel::Trace
        } else if log::log_enabled!(target: LOG_TARGET, log::Level::Debug) {
            TraceLevel::Debug
        } else {
            TraceLevel::Off
        }
    }

    fn on_event(&self, event: &AllocEvent) {
        if event.sizes.is_some() {
            log::trace!(target: LOG_TARGET, "{event}");
        } else {
            log::debug!(target: LOG_TARGET, "{event}");
        }
    }
}

/// Sends arena events into a bounded channel.
///
/// Never blocks the arena: when the channel is full or disconnected the
/// event is dropped and counted.
#[derive(Debug)]
pub struct ChannelObserver {
    level: TraceLevel,
    tx: Sender<AllocEvent>,
    dropped: AtomicU64,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn bounded(level: TraceLevel, capacity: usize) -> (Self, Receiver<AllocEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let observer = Self {
            level,
            tx,
            dropped: AtomicU64::new(0),
        };
        (observer, rx)
    }

    /// Number of events dropped because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AllocObserver for ChannelObserver {
    fn level(&self) -> TraceLevel {
        self.level
    }

    fn on_event(&self, event: &AllocEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
