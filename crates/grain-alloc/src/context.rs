//! One-time allocator setup.
//!
//! Every arena needs the same three collaborators: the region provider, the
//! shared zero-capacity sentinel region, and the allocator configuration.
//! [`AllocContext`] bundles them once at bootstrap and arenas borrow it for
//! their whole lifetime. [`ContextCell`] adds the "install exactly once"
//! contract for callers that want a single process-wide context.

use std::fmt;
use std::ptr;
use std::sync::{Arc, OnceLock};

use grain_core::{AllocObserver, ConfigError, NoopObserver, Region, RegionProvider};

use crate::config::AllocConfig;

/// Immutable collaborators shared by all arenas of one heap.
pub struct AllocContext<'h, P: RegionProvider> {
    provider: &'h P,
    sentinel: &'h P::Region,
    config: AllocConfig,
    observer: Arc<dyn AllocObserver>,
}

impl<'h, P: RegionProvider> AllocContext<'h, P> {
    /// Bundle the provider, sentinel region and configuration.
    ///
    /// Returns `Err(ConfigError)` if `config` is invalid.
    ///
    /// # Panics
    ///
    /// Panics if `sentinel` has any free space or accepts an allocation:
    /// every allocation attempt against the sentinel must fail.
    pub fn setup(
        provider: &'h P,
        sentinel: &'h P::Region,
        config: AllocConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        assert!(
            sentinel.free() == 0,
            "sentinel region must have no free space (has {} bytes)",
            sentinel.free()
        );
        assert!(
            sentinel.racy_allocate(1).is_none(),
            "allocation from the sentinel region must fail"
        );
        Ok(Self {
            provider,
            sentinel,
            config,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Replace the diagnostics observer.
    pub fn with_observer(mut self, observer: Arc<dyn AllocObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The region provider.
    pub fn provider(&self) -> &'h P {
        self.provider
    }

    /// The shared sentinel region.
    pub fn sentinel(&self) -> &'h P::Region {
        self.sentinel
    }

    /// Whether `region` is the sentinel. Compares identity, not contents.
    pub fn is_sentinel(&self, region: &P::Region) -> bool {
        ptr::eq(region, self.sentinel)
    }

    /// The allocator configuration.
    pub fn config(&self) -> &AllocConfig {
        &self.config
    }

    /// The diagnostics observer.
    pub fn observer(&self) -> &dyn AllocObserver {
        self.observer.as_ref()
    }
}

impl<P: RegionProvider> fmt::Debug for AllocContext<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocContext")
            .field("config", &self.config)
            .field("observer_level", &self.observer.level())
            .finish_non_exhaustive()
    }
}

/// A slot that holds an [`AllocContext`] installed exactly once.
pub struct ContextCell<'h, P: RegionProvider> {
    inner: OnceLock<AllocContext<'h, P>>,
}

impl<'h, P: RegionProvider> ContextCell<'h, P> {
    /// Create an empty cell.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Install the context and return a reference to it.
    ///
    /// # Panics
    ///
    /// Panics if a context has already been installed.
    pub fn install(&self, context: AllocContext<'h, P>) -> &AllocContext<'h, P> {
        assert!(
            self.inner.set(context).is_ok(),
            "allocation context installed twice"
        );
        self.get()
    }

    /// The installed context.
    ///
    /// # Panics
    ///
    /// Panics if nothing has been installed yet.
    pub fn get(&self) -> &AllocContext<'h, P> {
        self.inner
            .get()
            .expect("allocation context used before installation")
    }

    /// Whether a context has been installed.
    pub fn is_installed(&self) -> bool {
        self.inner.get().is_some()
    }
}

impl<P: RegionProvider> Default for ContextCell<'_, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use grain_core::{HeapAddr, RegionIndex, TraceLevel};
    use grain_region::HeapRegion;
    use grain_test_utils::{MockProvider, RecordingObserver};

    use super::*;

    fn provider() -> MockProvider {
        MockProvider::new(grain_test_utils::fixtures::word_layout(64), 2)
    }

    #[test]
    fn setup_accepts_empty_sentinel() {
        let provider = provider();
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, AllocConfig::default()).unwrap();
        assert!(ctx.is_sentinel(&sentinel));
        assert!(!ctx.is_sentinel(provider.region(RegionIndex(0))));
        assert_eq!(ctx.observer().level(), TraceLevel::Off);
    }

    #[test]
    fn sentinel_identity_is_not_structural() {
        let provider = provider();
        let sentinel = provider.sentinel();
        let lookalike = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, AllocConfig::default()).unwrap();
        assert!(!ctx.is_sentinel(&lookalike));
    }

    #[test]
    #[should_panic(expected = "sentinel region must have no free space")]
    fn setup_rejects_sentinel_with_capacity() {
        let provider = provider();
        let not_empty = HeapRegion::new(RegionIndex::SENTINEL, HeapAddr(0x100), 4, 8);
        let _ = AllocContext::setup(&provider, &not_empty, AllocConfig::default());
    }

    #[test]
    fn setup_rejects_invalid_config() {
        let provider = provider();
        let sentinel = provider.sentinel();
        let config = AllocConfig {
            min_fill_words: 0,
            ..AllocConfig::default()
        };
        assert!(matches!(
            AllocContext::setup(&provider, &sentinel, config),
            Err(ConfigError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn with_observer_replaces_default() {
        let provider = provider();
        let sentinel = provider.sentinel();
        let ctx = AllocContext::setup(&provider, &sentinel, AllocConfig::default())
            .unwrap()
            .with_observer(Arc::new(RecordingObserver::new(TraceLevel::Debug)));
        assert_eq!(ctx.observer().level(), TraceLevel::Debug);
    }

    #[test]
    fn cell_installs_once() {
        let provider = provider();
        let sentinel = provider.sentinel();
        let cell = ContextCell::new();
        assert!(!cell.is_installed());
        let ctx = AllocContext::setup(&provider, &sentinel, AllocConfig::default()).unwrap();
        cell.install(ctx);
        assert!(cell.is_installed());
        assert!(cell.get().is_sentinel(&sentinel));
    }

    #[test]
    #[should_panic(expected = "installed twice")]
    fn cell_rejects_second_install() {
        let provider = provider();
        let sentinel = provider.sentinel();
        let cell = ContextCell::new();
        cell.install(AllocContext::setup(&provider, &sentinel, AllocConfig::default()).unwrap());
        cell.install(AllocContext::setup(&provider, &sentinel, AllocConfig::default()).unwrap());
    }

    #[test]
    #[should_panic(expected = "before installation")]
    fn cell_get_before_install_panics() {
        let cell: ContextCell<'_, MockProvider> = ContextCell::new();
        let _ = cell.get();
    }
}
