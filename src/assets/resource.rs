//! The loadable resource contract
//!
//! A resource only has to name itself, say where it comes from and know how to
//! start fetching. The state machine lives in [`LoadSignal`], which every
//! resource embeds:
//!
//! ```text
//! Unloaded -> Loading -> Loaded
//!                    \-> Failed
//! ```
//!
//! Both settled states are terminal. A [`Completion`] is handed to the fetch
//! and is the only way to leave `Loading`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::error::ResourceLoadError;
use super::handle::ResourceId;

/// Load state of a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoadState {
    /// Nothing has been requested yet
    #[default]
    Unloaded,
    /// A fetch is in flight
    Loading,
    /// The fetch succeeded
    Loaded,
    /// The fetch failed
    Failed,
}

impl LoadState {
    /// Whether the resource has left `Loading` for good
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Loaded | Self::Failed)
    }
}

/// Where a resource was registered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetScope {
    /// The manager's global, un-bundled set
    Global,
    /// A named bundle
    Bundle(String),
    /// A bundle that has not been attached to a manager yet
    Unattached,
}

impl fmt::Display for AssetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global scope"),
            Self::Bundle(name) => write!(f, "bundle '{name}'"),
            Self::Unattached => write!(f, "unattached bundle"),
        }
    }
}

/// The final result of one resource load, as seen by watchers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Resource that settled
    pub id: ResourceId,
    /// `Loaded` or `Failed`
    pub state: LoadState,
    /// Failure details when `state` is `Failed`
    pub error: Option<ResourceLoadError>,
}

/// Callback run once when a resource settles
pub type Watcher = Box<dyn FnOnce(&Settlement) + Send>;

struct SignalInner {
    state: LoadState,
    error: Option<ResourceLoadError>,
    watchers: Vec<Watcher>,
}

struct SignalShared {
    id: ResourceId,
    inner: Mutex<SignalInner>,
}

impl SignalShared {
    fn lock(&self) -> MutexGuard<'_, SignalInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `Loading` to a settled state and notify watchers.
    fn settle(&self, state: LoadState, error: Option<ResourceLoadError>) -> bool {
        let (watchers, settlement) = {
            let mut inner = self.lock();
            if inner.state != LoadState::Loading {
                return false;
            }
            inner.state = state;
            inner.error.clone_from(&error);
            let settlement = Settlement {
                id: self.id,
                state,
                error,
            };
            (std::mem::take(&mut inner.watchers), settlement)
        };

        // Watchers run outside the lock so they may query the signal.
        for watcher in watchers {
            watcher(&settlement);
        }
        true
    }
}

/// Identity, state and completion hook of a resource.
///
/// Cloning yields another view of the same signal.
#[derive(Clone)]
pub struct LoadSignal {
    shared: Arc<SignalShared>,
}

impl LoadSignal {
    /// Create a signal for a new resource instance
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SignalShared {
                id: ResourceId::next(),
                inner: Mutex::new(SignalInner {
                    state: LoadState::Unloaded,
                    error: None,
                    watchers: Vec::new(),
                }),
            }),
        }
    }

    /// Instance identity
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.shared.id
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.shared.lock().state
    }

    /// Failure details, if the load failed
    #[must_use]
    pub fn error(&self) -> Option<ResourceLoadError> {
        self.shared.lock().error.clone()
    }

    /// Move `Unloaded` to `Loading`.
    ///
    /// Returns the completion token for the fetch, or `None` if the resource
    /// was already dispatched.
    #[must_use]
    pub fn begin(&self) -> Option<Completion> {
        let mut inner = self.shared.lock();
        if inner.state != LoadState::Unloaded {
            return None;
        }
        inner.state = LoadState::Loading;
        Some(Completion {
            shared: Some(Arc::clone(&self.shared)),
        })
    }

    /// Run `watcher` once the resource settles.
    ///
    /// If it already has, `watcher` runs immediately on the calling thread.
    pub fn watch(&self, watcher: impl FnOnce(&Settlement) + Send + 'static) {
        let settlement = {
            let mut inner = self.shared.lock();
            if !inner.state.is_settled() {
                inner.watchers.push(Box::new(watcher));
                return;
            }
            Settlement {
                id: self.shared.id,
                state: inner.state,
                error: inner.error.clone(),
            }
        };
        watcher(&settlement);
    }

    /// Wait for the resource to settle.
    ///
    /// Resolves immediately if it already has. Pending forever if no load is
    /// ever started.
    pub async fn settled(&self) -> Option<Settlement> {
        let (tx, rx) = oneshot::channel();
        self.watch(move |settlement| {
            let _ = tx.send(settlement.clone());
        });
        rx.await.ok()
    }
}

impl Default for LoadSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoadSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("LoadSignal")
            .field("id", &self.shared.id)
            .field("state", &inner.state)
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}

/// Token owned by an in-flight fetch.
///
/// Resolve it with [`Completion::succeed`] or [`Completion::fail`]. Dropping it
/// unresolved settles the resource as `Failed`.
#[must_use = "dropping a completion fails its resource"]
pub struct Completion {
    shared: Option<Arc<SignalShared>>,
}

impl Completion {
    /// Resource this completion belongs to
    #[must_use]
    pub fn id(&self) -> Option<ResourceId> {
        self.shared.as_ref().map(|shared| shared.id)
    }

    /// Mark the resource as loaded
    pub fn succeed(mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(LoadState::Loaded, None);
        }
    }

    /// Mark the resource as failed
    pub fn fail(mut self, reason: impl Into<String>) {
        if let Some(shared) = self.shared.take() {
            shared.settle(LoadState::Failed, Some(ResourceLoadError::new(reason)));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            log::warn!("Load of resource {} dropped without completing", shared.id);
            shared.settle(
                LoadState::Failed,
                Some(ResourceLoadError::new("load abandoned before completing")),
            );
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("id", &self.id()).finish()
    }
}

/// A single loadable asset.
///
/// Implementors embed a [`LoadSignal`] and start their asynchronous fetch in
/// [`Resource::fetch`]. Hosts and scopes call [`Resource::load`], which only
/// fetches once.
pub trait Resource: Send + Sync + 'static {
    /// Name, unique within the owning scope
    fn name(&self) -> &str;

    /// Locator of the underlying data (URL, path, ...)
    fn source(&self) -> &str;

    /// Whether the resource started loading on construction
    fn auto_load(&self) -> bool {
        false
    }

    /// State machine and completion hook of this resource
    fn signal(&self) -> &LoadSignal;

    /// Start fetching. Must not block; resolve `completion` when done.
    fn fetch(&self, completion: Completion);

    /// Instance identity
    fn id(&self) -> ResourceId {
        self.signal().id()
    }

    /// Current load state
    fn state(&self) -> LoadState {
        self.signal().state()
    }

    /// Dispatch the fetch if nothing has been requested yet.
    ///
    /// Returns `true` if this call started the load.
    fn load(&self) -> bool {
        match self.signal().begin() {
            Some(completion) => {
                log::trace!("Loading '{}' from {}", self.name(), self.source());
                self.fetch(completion);
                true
            }
            None => false,
        }
    }
}
