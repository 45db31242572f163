//! Resource identity and shared resource references
//!
//! Every resource instance gets a process-unique [`ResourceId`] when its
//! [`LoadSignal`](super::LoadSignal) is created. Scopes compare and count
//! resources by this id, never by name.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::resource::Resource;

/// Global counter for generating unique resource IDs
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a single resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh, never reused ID
    pub(crate) fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value of this ID
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A shared reference to a registered resource.
///
/// Cloning is cheap. Two `AssetRef`s are equal when they point at the same
/// resource instance, regardless of name.
#[derive(Clone)]
pub struct AssetRef {
    inner: Arc<dyn Resource>,
}

impl AssetRef {
    /// Wrap a shared resource
    #[must_use]
    pub fn new(resource: Arc<dyn Resource>) -> Self {
        Self { inner: resource }
    }

    /// Instance identity of the resource
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.inner.signal().id()
    }

    /// Get the shared pointer to the resource
    #[must_use]
    pub fn shared(&self) -> &Arc<dyn Resource> {
        &self.inner
    }

    /// Get the strong reference count
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<R: Resource> From<Arc<R>> for AssetRef {
    fn from(resource: Arc<R>) -> Self {
        Self { inner: resource }
    }
}

impl PartialEq for AssetRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for AssetRef {}

impl Hash for AssetRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl std::ops::Deref for AssetRef {
    type Target = dyn Resource;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRef")
            .field("id", &self.id())
            .field("name", &self.inner.name())
            .field("state", &self.inner.state())
            .finish()
    }
}
