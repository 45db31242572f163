//! Event bus for asset lifecycle notifications
//!
//! The manager and every bundle own an [`EventBus`]. Hosts bind handlers per
//! [`AssetEventKind`]; emitting an event runs the bound handlers synchronously
//! on the emitting thread, in binding order.
//!
//! # Example
//!
//! ```ignore
//! let binding = manager.events_mut().bind(AssetEventKind::ProgressChanged, |event| {
//!     if let AssetEvent::ProgressChanged { percent } = event {
//!         println!("{percent:.0}% Loaded");
//!     }
//! });
//!
//! // Later, on teardown
//! manager.events_mut().unbind(binding);
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::assets::{AssetScope, ResourceLoadError};

// ============================================================================
// Event Types
// ============================================================================

/// Discriminant of an [`AssetEvent`], used as the binding key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetEventKind {
    /// A resource finished loading
    AssetLoaded,
    /// A resource failed to load
    AssetFailed,
    /// The counted-settled total changed
    ProgressChanged,
    /// Every owned resource has settled
    Complete,
}

impl AssetEventKind {
    /// All event kinds
    pub const ALL: [Self; 4] = [
        Self::AssetLoaded,
        Self::AssetFailed,
        Self::ProgressChanged,
        Self::Complete,
    ];

    /// Stable event name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AssetLoaded => "assetLoaded",
            Self::AssetFailed => "assetFailed",
            Self::ProgressChanged => "progressChanged",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for AssetEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetEventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Returned when parsing an unknown event name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown event kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

/// Lifecycle notification emitted by the manager and bundles.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AssetEvent {
    /// A resource transitioned to `Loaded`.
    AssetLoaded {
        /// Resource name
        asset: String,
        /// Scope the resource was registered in
        scope: AssetScope,
    },

    /// A resource transitioned to `Failed`.
    AssetFailed {
        /// Resource name
        asset: String,
        /// Scope the resource was registered in
        scope: AssetScope,
        /// What went wrong
        error: ResourceLoadError,
    },

    /// Aggregate progress changed.
    ProgressChanged {
        /// Percentage in `0.0..=100.0`.
        ///
        /// The manager never reports less than it reported before, so after
        /// resources are added or removed this can exceed the live
        /// `percent_loaded()`.
        percent: f32,
    },

    /// Every owned resource settled. Emitted once.
    Complete,
}

impl AssetEvent {
    /// The binding key of this event
    #[must_use]
    pub const fn kind(&self) -> AssetEventKind {
        match self {
            Self::AssetLoaded { .. } => AssetEventKind::AssetLoaded,
            Self::AssetFailed { .. } => AssetEventKind::AssetFailed,
            Self::ProgressChanged { .. } => AssetEventKind::ProgressChanged,
            Self::Complete => AssetEventKind::Complete,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Handle returned by [`EventBus::bind`], used to unbind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId {
    kind: AssetEventKind,
    serial: u64,
}

impl BindingId {
    /// Event kind this binding listens to
    #[must_use]
    pub const fn kind(self) -> AssetEventKind {
        self.kind
    }
}

/// Boxed event handler
pub type Handler = Box<dyn FnMut(&AssetEvent) + Send>;

/// Synchronous publish/subscribe bus.
///
/// A handler that panics is logged and skipped; the remaining handlers for
/// the same event still run.
#[derive(Default)]
pub struct EventBus {
    /// Handlers per kind, in binding order
    handlers: FxHashMap<AssetEventKind, SmallVec<[(u64, Handler); 4]>>,
    /// Serial for the next binding
    next_serial: u64,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to every future event of `kind`.
    pub fn bind(
        &mut self,
        kind: AssetEventKind,
        handler: impl FnMut(&AssetEvent) + Send + 'static,
    ) -> BindingId {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.handlers
            .entry(kind)
            .or_default()
            .push((serial, Box::new(handler)));
        BindingId { kind, serial }
    }

    /// Remove a binding.
    ///
    /// Returns true if the binding existed.
    pub fn unbind(&mut self, binding: BindingId) -> bool {
        let Some(list) = self.handlers.get_mut(&binding.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(serial, _)| *serial != binding.serial);
        list.len() != before
    }

    /// Run every handler bound to the event's kind.
    ///
    /// Returns the number of handlers that ran to completion.
    pub fn emit(&mut self, event: &AssetEvent) -> usize {
        let kind = event.kind();
        let Some(list) = self.handlers.get_mut(&kind) else {
            return 0;
        };

        let mut completed = 0;
        for (serial, handler) in list.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    log::error!("Handler #{serial} for '{kind}' panicked: {message}");
                }
            }
        }
        completed
    }

    /// Number of handlers bound to `kind`
    #[must_use]
    pub fn handler_count(&self, kind: AssetEventKind) -> usize {
        self.handlers.get(&kind).map_or(0, SmallVec::len)
    }

    /// Check if no handler is bound at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(SmallVec::is_empty)
    }

    /// Remove every binding
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in AssetEventKind::ALL {
            map.entry(&kind.as_str(), &self.handler_count(kind));
        }
        map.finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Helper to record which handlers ran
    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, move |tag| sink.lock().unwrap().push(tag))
    }

    #[test]
    fn test_handlers_run_in_binding_order() {
        let mut bus = EventBus::new();
        let (log, record) = recorder();

        let r = record.clone();
        bus.bind(AssetEventKind::Complete, move |_| r("first"));
        let r = record.clone();
        bus.bind(AssetEventKind::Complete, move |_| r("second"));
        bus.bind(AssetEventKind::ProgressChanged, move |_| record("other"));

        assert_eq!(bus.emit(&AssetEvent::Complete), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_emit_without_handlers() {
        let mut bus = EventBus::new();
        assert_eq!(bus.emit(&AssetEvent::ProgressChanged { percent: 50.0 }), 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_unbind() {
        let mut bus = EventBus::new();
        let (log, record) = recorder();

        let r = record.clone();
        let first = bus.bind(AssetEventKind::Complete, move |_| r("first"));
        bus.bind(AssetEventKind::Complete, move |_| record("second"));

        assert!(bus.unbind(first));
        assert!(!bus.unbind(first));
        assert_eq!(bus.handler_count(AssetEventKind::Complete), 1);

        bus.emit(&AssetEvent::Complete);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let mut bus = EventBus::new();
        let (log, record) = recorder();

        bus.bind(AssetEventKind::Complete, |_| panic!("handler blew up"));
        bus.bind(AssetEventKind::Complete, move |_| record("after"));

        assert_eq!(bus.emit(&AssetEvent::Complete), 1);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn test_payload_is_passed() {
        let mut bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        bus.bind(AssetEventKind::AssetLoaded, move |event| {
            if let AssetEvent::AssetLoaded { asset, .. } = event {
                *sink.lock().unwrap() = Some(asset.clone());
            }
        });

        bus.emit(&AssetEvent::AssetLoaded {
            asset: "global0".into(),
            scope: AssetScope::Global,
        });
        assert_eq!(seen.lock().unwrap().as_deref(), Some("global0"));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in AssetEventKind::ALL {
            assert_eq!(kind.as_str().parse::<AssetEventKind>(), Ok(kind));
        }
        assert!("loaded".parse::<AssetEventKind>().is_err());
    }

    #[test]
    fn test_clear() {
        let mut bus = EventBus::new();
        bus.bind(AssetEventKind::Complete, |_| {});
        bus.clear();
        assert!(bus.is_empty());
    }
}
