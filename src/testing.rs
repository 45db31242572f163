//! Test-only resources whose completion is driven by the test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::assets::{Completion, LoadSignal, Resource};

/// Route `log` output through the test harness
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A resource that stays `Loading` until the test resolves it.
pub(crate) struct ManualResource {
    name: String,
    source: String,
    auto_load: bool,
    /// Resolve inside `fetch`, like a cache hit
    instant: bool,
    signal: LoadSignal,
    pending: Mutex<Option<Completion>>,
    fetches: AtomicUsize,
}

impl ManualResource {
    fn build(name: &str, auto_load: bool, instant: bool) -> Arc<Self> {
        let resource = Arc::new(Self {
            name: name.to_string(),
            source: format!("memory://{name}"),
            auto_load,
            instant,
            signal: LoadSignal::new(),
            pending: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        });
        if auto_load {
            resource.load();
        }
        resource
    }

    pub(crate) fn new(name: &str) -> Arc<Self> {
        Self::build(name, false, false)
    }

    pub(crate) fn auto_loading(name: &str) -> Arc<Self> {
        Self::build(name, true, false)
    }

    pub(crate) fn instant(name: &str) -> Arc<Self> {
        Self::build(name, false, true)
    }

    pub(crate) fn succeed(&self) {
        self.take().succeed();
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.take().fail(reason);
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn take(&self) -> Completion {
        self.pending
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| panic!("'{}' is not loading", self.name))
    }
}

impl Resource for ManualResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn auto_load(&self) -> bool {
        self.auto_load
    }

    fn signal(&self) -> &LoadSignal {
        &self.signal
    }

    fn fetch(&self, completion: Completion) {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.instant {
            completion.succeed();
        } else {
            *self.pending.lock().unwrap() = Some(completion);
        }
    }
}
