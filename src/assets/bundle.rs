//! Asset bundles
//!
//! A bundle is an ordered, named group of resources tracked as one unit of
//! progress, e.g. "level 1 assets". Bundles nest: a child bundle's resources
//! count toward every ancestor.
//!
//! Bundles are built standalone and then moved into an
//! [`AssetManager`](super::AssetManager), which drives loading and feeds
//! settlements back down so each bundle can emit its own events.
//!
//! A bundle that no manager owns reads its counts straight from the resource
//! states and emits no events.

use std::fmt;

use rustc_hash::FxHashSet;

use super::error::AssetError;
use super::handle::AssetRef;
use super::progress::{FailurePolicy, LoadStats, Progressable, Tally, percent};
use super::resource::{AssetScope, LoadState, Resource, Settlement};
use crate::core::{AssetEvent, EventBus};

/// An ordered, named collection of resources and nested bundles.
#[derive(Default)]
pub struct AssetBundle {
    /// Set when attached to a manager or parent bundle
    name: Option<String>,
    /// Own resources in registration order
    assets: Vec<AssetRef>,
    /// Names of own resources
    names: FxHashSet<String>,
    /// Nested bundles in registration order
    bundles: Vec<AssetBundle>,
    /// Counters over own and nested resources, fed by the manager
    tally: Tally,
    /// Owned by a manager, directly or through a parent bundle
    managed: bool,
    policy: FailurePolicy,
    /// Bundle-scoped notifications
    events: EventBus,
    /// Whether `Complete` was emitted
    completed: bool,
}

impl AssetBundle {
    /// Create an empty, unattached bundle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name given on attachment, if any
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Scope reported for this bundle's resources
    #[must_use]
    pub fn scope(&self) -> AssetScope {
        match &self.name {
            Some(name) => AssetScope::Bundle(name.clone()),
            None => AssetScope::Unattached,
        }
    }

    /// Append a resource.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::DuplicateName`] if a resource with the same name
    /// is already in this bundle. The bundle is left unchanged.
    pub fn add_asset(&mut self, asset: impl Into<AssetRef>) -> Result<(), AssetError> {
        let asset = asset.into();
        if self.names.contains(asset.name()) {
            return Err(AssetError::DuplicateName {
                name: asset.name().to_string(),
                scope: self.scope(),
            });
        }

        self.names.insert(asset.name().to_string());
        self.tally.insert(asset.id());
        self.assets.push(asset);
        Ok(())
    }

    /// Nest `bundle` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::DuplicateBundleName`] if a nested bundle with the
    /// same name exists.
    pub fn add_bundle(
        &mut self,
        mut bundle: AssetBundle,
        name: impl Into<String>,
    ) -> Result<(), AssetError> {
        let name = name.into();
        if self.bundle(&name).is_some() {
            return Err(AssetError::DuplicateBundleName { name });
        }

        bundle.attach(name, self.policy);
        bundle.visit_scoped(&mut |_, asset| {
            self.tally.insert(asset.id());
        });
        self.bundles.push(bundle);
        Ok(())
    }

    /// Remove an own resource by name
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::UnknownAsset`] if no own resource has that name.
    pub fn remove_asset(&mut self, name: &str) -> Result<AssetRef, AssetError> {
        let index = self
            .assets
            .iter()
            .position(|asset| asset.name() == name)
            .ok_or_else(|| AssetError::UnknownAsset(name.to_string()))?;

        let asset = self.assets.remove(index);
        self.names.remove(name);
        self.tally.remove(asset.id());
        Ok(asset)
    }

    /// Look up an own resource by name
    #[must_use]
    pub fn get_asset(&self, name: &str) -> Option<&AssetRef> {
        self.assets.iter().find(|asset| asset.name() == name)
    }

    /// Look up a nested bundle by name
    #[must_use]
    pub fn bundle(&self, name: &str) -> Option<&AssetBundle> {
        self.bundles.iter().find(|b| b.name() == Some(name))
    }

    /// Event bus of a nested bundle
    pub fn bundle_events_mut(&mut self, name: &str) -> Option<&mut EventBus> {
        self.bundles
            .iter_mut()
            .find(|b| b.name() == Some(name))
            .map(|b| &mut b.events)
    }

    /// Own resources in registration order
    pub fn assets(&self) -> impl Iterator<Item = &AssetRef> {
        self.assets.iter()
    }

    /// Nested bundles in registration order
    pub fn bundles(&self) -> impl Iterator<Item = &AssetBundle> {
        self.bundles.iter()
    }

    /// Every resource, own first, then nested bundles depth-first
    #[must_use]
    pub fn all_assets(&self) -> Vec<AssetRef> {
        let mut all = Vec::new();
        self.visit_scoped(&mut |_, asset| all.push(asset.clone()));
        all
    }

    /// Number of own resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Check if the bundle has no resources at any depth
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tally.stats().total == 0
    }

    /// Counter snapshot over own and nested resources
    #[must_use]
    pub fn stats(&self) -> LoadStats {
        if self.managed {
            self.tally.stats()
        } else {
            self.live_stats()
        }
    }

    /// Count distinct instances by their current state
    fn live_stats(&self) -> LoadStats {
        let mut seen = FxHashSet::default();
        let mut stats = LoadStats::default();
        self.visit_scoped(&mut |_, asset| {
            if !seen.insert(asset.id()) {
                return;
            }
            stats.total += 1;
            match asset.state() {
                LoadState::Loaded => stats.loaded += 1,
                LoadState::Failed => stats.failed += 1,
                LoadState::Unloaded | LoadState::Loading => {}
            }
        });
        stats
    }

    /// Bus for bundle-scoped events
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Visit every resource at any depth along with the bundle that owns it.
    pub(crate) fn visit_scoped<F: FnMut(&AssetBundle, &AssetRef)>(&self, f: &mut F) {
        for asset in &self.assets {
            f(self, asset);
        }
        for bundle in &self.bundles {
            bundle.visit_scoped(f);
        }
    }

    pub(crate) fn attach(&mut self, name: String, policy: FailurePolicy) {
        self.name = Some(name);
        self.set_policy(policy);
    }

    /// Switch to manager-fed counters, here and in every nested bundle.
    pub(crate) fn manage(&mut self) {
        self.managed = true;
        for bundle in &mut self.bundles {
            bundle.manage();
        }
    }

    pub(crate) fn set_policy(&mut self, policy: FailurePolicy) {
        self.policy = policy;
        for bundle in &mut self.bundles {
            bundle.set_policy(policy);
        }
    }

    /// Start every resource that is neither auto-loading nor already started.
    pub(crate) fn dispatch(&self) -> usize {
        let mut dispatched = 0;
        for asset in &self.assets {
            if asset.auto_load() {
                log::trace!("Skipping auto-load asset '{}'", asset.name());
            } else if asset.load() {
                dispatched += 1;
            }
        }
        for bundle in &self.bundles {
            dispatched += bundle.dispatch();
        }
        dispatched
    }

    /// Apply a settlement, innermost bundles first.
    ///
    /// Returns true if this bundle's counters changed.
    pub(crate) fn record(&mut self, asset: &str, settlement: &Settlement) -> bool {
        for bundle in &mut self.bundles {
            bundle.record(asset, settlement);
        }

        let before = self.tally.stats().counted(self.policy);
        if !self.tally.settle(settlement.id, settlement.state) {
            return false;
        }

        let event = match &settlement.error {
            Some(error) => AssetEvent::AssetFailed {
                asset: asset.to_string(),
                scope: self.scope(),
                error: error.clone(),
            },
            None => AssetEvent::AssetLoaded {
                asset: asset.to_string(),
                scope: self.scope(),
            },
        };
        self.events.emit(&event);

        let stats = self.tally.stats();
        let counted = stats.counted(self.policy);
        if counted != before {
            self.events.emit(&AssetEvent::ProgressChanged {
                percent: percent(counted, stats.total),
            });
        }

        if !self.completed && counted == stats.total {
            self.completed = true;
            log::debug!("Bundle {} complete", self.scope());
            self.events.emit(&AssetEvent::Complete);
        }
        true
    }
}

impl Progressable for AssetBundle {
    fn total_count(&self) -> usize {
        self.stats().total
    }

    fn loaded_count(&self) -> usize {
        self.stats().counted(self.policy)
    }

    fn load(&mut self) -> usize {
        self.dispatch()
    }
}

impl fmt::Debug for AssetBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetBundle")
            .field("name", &self.name)
            .field("assets", &self.assets)
            .field("bundles", &self.bundles)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::assets::{LoadState, Resource};
    use crate::core::AssetEventKind;
    use crate::testing::ManualResource;

    fn settled(res: &ManualResource) -> Settlement {
        Settlement {
            id: res.id(),
            state: res.state(),
            error: res.signal().error(),
        }
    }

    #[test]
    fn test_add_asset_counts() {
        let mut bundle = AssetBundle::new();
        bundle.add_asset(ManualResource::new("a")).unwrap();
        bundle.add_asset(ManualResource::new("b")).unwrap();

        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.total_count(), 2);
        assert_eq!(bundle.loaded_count(), 0);
        assert_eq!(bundle.percent_loaded(), 0.0);
    }

    #[test]
    fn test_duplicate_name_leaves_bundle_unchanged() {
        let mut bundle = AssetBundle::new();
        bundle.add_asset(ManualResource::new("a")).unwrap();

        let err = bundle.add_asset(ManualResource::new("a")).unwrap_err();
        assert_eq!(
            err,
            AssetError::DuplicateName {
                name: "a".into(),
                scope: AssetScope::Unattached,
            }
        );
        assert_eq!(bundle.total_count(), 1);
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn test_empty_bundle_is_complete() {
        let bundle = AssetBundle::new();
        assert!(bundle.is_empty());
        assert!(bundle.is_complete());
        assert_eq!(bundle.percent_loaded(), 0.0);
    }

    #[test]
    fn test_dispatch_skips_auto_load_and_started() {
        let mut bundle = AssetBundle::new();
        let plain = ManualResource::new("plain");
        let auto = ManualResource::auto_loading("auto");
        let started = ManualResource::new("started");
        started.load();

        bundle.add_asset(plain.clone()).unwrap();
        bundle.add_asset(auto.clone()).unwrap();
        bundle.add_asset(started.clone()).unwrap();

        assert_eq!(bundle.load(), 1);
        assert_eq!(plain.state(), LoadState::Loading);
        assert_eq!(auto.fetch_count(), 1);
        assert_eq!(started.fetch_count(), 1);
        assert_eq!(bundle.load(), 0);
    }

    #[test]
    fn test_record_emits_bundle_events() {
        let mut bundle = AssetBundle::new();
        let a = ManualResource::new("a");
        let b = ManualResource::new("b");
        bundle.add_asset(a.clone()).unwrap();
        bundle.add_asset(b.clone()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in AssetEventKind::ALL {
            let sink = Arc::clone(&seen);
            bundle
                .events_mut()
                .bind(kind, move |event| sink.lock().unwrap().push(event.clone()));
        }

        bundle.load();
        a.succeed();
        assert!(bundle.record("a", &settled(&a)));
        assert!(!bundle.record("a", &settled(&a)));
        b.succeed();
        assert!(bundle.record("b", &settled(&b)));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[1], AssetEvent::ProgressChanged { percent: 50.0 });
        assert_eq!(seen[3], AssetEvent::ProgressChanged { percent: 100.0 });
        assert_eq!(seen[4], AssetEvent::Complete);
        assert!(bundle.is_complete());
    }

    #[test]
    fn test_nested_bundles_roll_up() {
        let inner_res = ManualResource::new("deep");
        let mut inner = AssetBundle::new();
        inner.add_asset(inner_res.clone()).unwrap();

        let mut outer = AssetBundle::new();
        outer.add_asset(ManualResource::new("shallow")).unwrap();
        outer.add_bundle(inner, "inner").unwrap();

        assert_eq!(outer.total_count(), 2);
        assert_eq!(outer.len(), 1);
        assert_eq!(outer.all_assets().len(), 2);

        outer.load();
        inner_res.succeed();
        outer.record("deep", &settled(&inner_res));

        assert_eq!(outer.loaded_count(), 1);
        let inner = outer.bundle("inner").unwrap();
        assert_eq!(inner.scope(), AssetScope::Bundle("inner".into()));
        assert!(inner.is_complete());
    }

    #[test]
    fn test_duplicate_nested_bundle_name() {
        let mut outer = AssetBundle::new();
        outer.add_bundle(AssetBundle::new(), "x").unwrap();
        let err = outer.add_bundle(AssetBundle::new(), "x").unwrap_err();
        assert_eq!(err, AssetError::DuplicateBundleName { name: "x".into() });
    }

    #[test]
    fn test_failure_policy_in_bundle() {
        let res = ManualResource::new("broken");
        let mut bundle = AssetBundle::new();
        bundle.add_asset(res.clone()).unwrap();
        bundle.set_policy(FailurePolicy::LoadedOnly);

        bundle.load();
        res.fail("404");
        bundle.record("broken", &settled(&res));

        assert_eq!(bundle.loaded_count(), 0);
        assert_eq!(bundle.stats().failed, 1);
        assert!(!bundle.is_complete());
    }

    #[test]
    fn test_standalone_bundle_reads_live_states() {
        let a = ManualResource::new("a");
        let b = ManualResource::new("b");
        let mut inner = AssetBundle::new();
        inner.add_asset(b.clone()).unwrap();
        let mut bundle = AssetBundle::new();
        bundle.add_asset(a.clone()).unwrap();
        bundle.add_bundle(inner, "inner").unwrap();

        assert_eq!(bundle.load(), 2);
        a.succeed();
        assert_eq!(bundle.loaded_count(), 1);
        assert_eq!(bundle.percent_loaded(), 50.0);

        b.fail("corrupt");
        assert_eq!(bundle.stats(), LoadStats { total: 2, loaded: 1, failed: 1 });
        assert!(bundle.is_complete());
        assert!(bundle.bundle("inner").unwrap().is_complete());
    }

    #[test]
    fn test_managed_bundle_waits_for_recorded_settlements() {
        let a = ManualResource::new("a");
        let mut bundle = AssetBundle::new();
        bundle.add_asset(a.clone()).unwrap();
        bundle.manage();

        bundle.load();
        a.succeed();
        assert_eq!(bundle.loaded_count(), 0);
        bundle.record("a", &settled(&a));
        assert_eq!(bundle.loaded_count(), 1);
    }

    #[test]
    fn test_remove_asset() {
        let mut bundle = AssetBundle::new();
        bundle.add_asset(ManualResource::new("a")).unwrap();
        let removed = bundle.remove_asset("a").unwrap();
        assert_eq!(removed.name(), "a");
        assert!(bundle.is_empty());
        assert!(matches!(
            bundle.remove_asset("a"),
            Err(AssetError::UnknownAsset(_))
        ));
        bundle.add_asset(ManualResource::new("a")).unwrap();
    }
}
