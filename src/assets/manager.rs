//! The asset manager
//!
//! Owns a global resource set plus named bundles, dispatches loads, and turns
//! resource completions into progress events.
//!
//! Completions may arrive on any thread. They are queued on a channel and only
//! applied on the thread that calls [`AssetManager::update`] (typically once per
//! frame) or [`AssetManager::block_until_complete`], so counters and handlers
//! never race.
//!
//! # Example
//!
//! ```ignore
//! let mut manager = AssetManager::new();
//! manager.add_asset(FileResource::from_path("global0", "sky.png", runtime.handle().clone()))?;
//! manager.add_bundle(level_one, "Bundle1")?;
//!
//! manager.events_mut().bind(AssetEventKind::Complete, |_| println!("All Done"));
//! manager.load();
//!
//! // Every frame
//! manager.update();
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rustc_hash::{FxHashMap, FxHashSet};

use super::bundle::AssetBundle;
use super::error::{AssetError, ResourceLoadError};
use super::handle::{AssetRef, ResourceId};
use super::progress::{LoadStats, Progressable, Tally};
use super::resource::{AssetScope, LoadState, Resource, Settlement};
use crate::core::{AssetEvent, EventBus, ManagerConfig};

/// Where the manager is in its single loading session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Session {
    /// `load` has not been called
    #[default]
    Idle,
    /// Loads dispatched, waiting for settlements
    Loading,
    /// `Complete` was emitted; it will not be emitted again
    Complete,
}

/// A registered instance and the scope it reports in events
struct Tracked {
    asset: AssetRef,
    scope: AssetScope,
}

/// Top-level coordinator of resource loading.
pub struct AssetManager {
    config: ManagerConfig,
    /// Global resources in registration order
    assets: Vec<AssetRef>,
    /// Names of global resources
    names: FxHashSet<String>,
    /// Attached bundles in registration order
    bundles: Vec<AssetBundle>,
    /// Every distinct instance owned at any depth
    tracked: FxHashMap<ResourceId, Tracked>,
    /// Aggregate counters over `tracked`
    tally: Tally,
    events: EventBus,
    /// Completion queue, fed by resource watchers
    sender: Sender<Settlement>,
    receiver: Receiver<Settlement>,
    session: Session,
    /// Last percentage sent with `ProgressChanged`
    last_percent: f32,
    /// Next percentage worth an info log
    next_log_mark: f32,
}

impl AssetManager {
    /// Create a manager with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    /// Create a manager with the given configuration
    #[must_use]
    pub fn with_config(config: ManagerConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            next_log_mark: config.progress_log_step,
            config,
            assets: Vec::new(),
            names: FxHashSet::default(),
            bundles: Vec::new(),
            tracked: FxHashMap::default(),
            tally: Tally::default(),
            events: EventBus::new(),
            sender,
            receiver,
            session: Session::Idle,
            last_percent: 0.0,
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Current session state
    #[must_use]
    pub fn session(&self) -> Session {
        self.session
    }

    /// Bus for manager-wide events
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Register a resource in the global scope.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::DuplicateName`] if a global resource with the
    /// same name exists. Nothing is registered in that case.
    pub fn add_asset(&mut self, asset: impl Into<AssetRef>) -> Result<(), AssetError> {
        let asset = asset.into();
        if self.names.contains(asset.name()) {
            return Err(AssetError::DuplicateName {
                name: asset.name().to_string(),
                scope: AssetScope::Global,
            });
        }

        self.names.insert(asset.name().to_string());
        self.track(&asset, AssetScope::Global);
        self.assets.push(asset);
        Ok(())
    }

    /// Attach a populated bundle under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::DuplicateBundleName`] if a bundle with that name
    /// is attached already; the existing bundle is left untouched.
    pub fn add_bundle(
        &mut self,
        mut bundle: AssetBundle,
        name: impl Into<String>,
    ) -> Result<(), AssetError> {
        let name = name.into();
        if self.bundle(&name).is_some() {
            return Err(AssetError::DuplicateBundleName { name });
        }

        bundle.attach(name, self.config.failure_policy);
        bundle.manage();
        bundle.visit_scoped(&mut |owner, asset| self.track(asset, owner.scope()));
        log::debug!(
            "Attached {} with {} assets",
            bundle.scope(),
            bundle.total_count()
        );
        self.bundles.push(bundle);
        self.replay_settled(self.bundles.len() - 1);
        Ok(())
    }

    /// Append a resource to an attached bundle.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::UnknownBundle`] if no bundle has that name, or
    /// [`AssetError::DuplicateName`] on a collision inside the bundle.
    pub fn add_bundle_asset(
        &mut self,
        bundle: &str,
        asset: impl Into<AssetRef>,
    ) -> Result<(), AssetError> {
        let asset = asset.into();
        let index = self.bundle_index(bundle)?;
        self.bundles[index].add_asset(asset.clone())?;
        let scope = self.bundles[index].scope();
        self.track(&asset, scope);
        self.replay_settled(index);
        Ok(())
    }

    /// Unregister a global resource.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::UnknownAsset`] if no global resource has that name.
    pub fn remove_asset(&mut self, name: &str) -> Result<AssetRef, AssetError> {
        let index = self
            .assets
            .iter()
            .position(|asset| asset.name() == name)
            .ok_or_else(|| AssetError::UnknownAsset(name.to_string()))?;

        let asset = self.assets.remove(index);
        self.names.remove(name);
        self.untrack(asset.id());
        self.after_removal();
        Ok(asset)
    }

    /// Detach and drop a bundle.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::UnknownBundle`] if no bundle has that name.
    pub fn remove_bundle(&mut self, name: &str) -> Result<(), AssetError> {
        let index = self.bundle_index(name)?;
        let bundle = self.bundles.remove(index);
        bundle.visit_scoped(&mut |_, asset| self.untrack(asset.id()));
        log::debug!("Removed {}", bundle.scope());
        self.after_removal();
        Ok(())
    }

    /// Look up a global resource by name
    #[must_use]
    pub fn get_asset(&self, name: &str) -> Option<&AssetRef> {
        self.assets.iter().find(|asset| asset.name() == name)
    }

    /// Global resources in registration order
    pub fn assets(&self) -> impl Iterator<Item = &AssetRef> {
        self.assets.iter()
    }

    /// Look up an attached bundle by name
    #[must_use]
    pub fn bundle(&self, name: &str) -> Option<&AssetBundle> {
        self.bundles.iter().find(|b| b.name() == Some(name))
    }

    /// Event bus of an attached bundle
    pub fn bundle_events_mut(&mut self, name: &str) -> Option<&mut EventBus> {
        self.bundles
            .iter_mut()
            .find(|b| b.name() == Some(name))
            .map(AssetBundle::events_mut)
    }

    /// Names of attached bundles in registration order
    pub fn bundle_names(&self) -> impl Iterator<Item = &str> {
        self.bundles.iter().filter_map(AssetBundle::name)
    }

    /// Aggregate counter snapshot
    #[must_use]
    pub fn stats(&self) -> LoadStats {
        self.tally.stats()
    }

    /// Apply every queued completion on the calling thread.
    ///
    /// Returns the number of settlements that changed the counters.
    pub fn update(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(settlement) = self.receiver.try_recv() {
            if self.apply(settlement) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply completions as they arrive until `Complete` fired, every
    /// resource settled, or `timeout` elapsed.
    ///
    /// Returns whether the session is complete. Returns immediately if `load`
    /// was never called. Under [`FailurePolicy::LoadedOnly`] a failure makes
    /// this return `false` as soon as nothing is left pending.
    ///
    /// [`FailurePolicy::LoadedOnly`]: super::FailurePolicy::LoadedOnly
    pub fn block_until_complete(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.update();

        while self.session == Session::Loading && self.stats().pending() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(settlement) => {
                    self.apply(settlement);
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::debug!("Timed out with {} assets pending", self.stats().pending());
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.session == Session::Complete
    }

    fn bundle_index(&self, name: &str) -> Result<usize, AssetError> {
        self.bundles
            .iter()
            .position(|b| b.name() == Some(name))
            .ok_or_else(|| AssetError::UnknownBundle(name.to_string()))
    }

    /// Count a registration and, for a new instance, watch its completion.
    fn track(&mut self, asset: &AssetRef, scope: AssetScope) {
        if !self.tally.insert(asset.id()) {
            return;
        }

        self.tracked.insert(
            asset.id(),
            Tracked {
                asset: asset.clone(),
                scope,
            },
        );

        let sender = self.sender.clone();
        asset.signal().watch(move |settlement| {
            // The manager may be gone; its completions are then irrelevant.
            let _ = sender.send(settlement.clone());
        });
    }

    /// Drop a registration. A shared instance that stays registered
    /// elsewhere moves to its first remaining scope.
    fn untrack(&mut self, id: ResourceId) {
        if self.tally.remove(id) {
            self.tracked.remove(&id);
            return;
        }

        if let Some(scope) = self.registered_scope(id) {
            if let Some(tracked) = self.tracked.get_mut(&id) {
                tracked.scope = scope;
            }
        }
    }

    /// First remaining registration: the global scope, then bundles in order
    fn registered_scope(&self, id: ResourceId) -> Option<AssetScope> {
        if self.assets.iter().any(|asset| asset.id() == id) {
            return Some(AssetScope::Global);
        }

        let mut found = None;
        for bundle in &self.bundles {
            bundle.visit_scoped(&mut |owner, asset| {
                if found.is_none() && asset.id() == id {
                    found = Some(owner.scope());
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    /// Feed settlements the manager already applied into a bundle that just
    /// gained resources.
    fn replay_settled(&mut self, index: usize) {
        let mut settled = Vec::new();
        self.bundles[index].visit_scoped(&mut |_, asset| {
            let Some(state) = self.tally.state(asset.id()) else {
                return;
            };
            if state.is_settled() {
                let settlement = Settlement {
                    id: asset.id(),
                    state,
                    error: asset.signal().error(),
                };
                settled.push((asset.name().to_string(), settlement));
            }
        });

        for (asset, settlement) in settled {
            self.bundles[index].record(&asset, &settlement);
        }
    }

    fn after_removal(&mut self) {
        if self.percent_loaded() > self.last_percent {
            self.report_progress();
        }
        self.check_complete();
    }

    /// Apply one settlement. Returns true if the counters changed.
    fn apply(&mut self, settlement: Settlement) -> bool {
        let Some(tracked) = self.tracked.get(&settlement.id) else {
            log::trace!("Ignoring settlement of unregistered resource {}", settlement.id);
            return false;
        };
        let asset = tracked.asset.name().to_string();
        let scope = tracked.scope.clone();

        let before = self.loaded_count();
        if !self.tally.settle(settlement.id, settlement.state) {
            return false;
        }

        for bundle in &mut self.bundles {
            bundle.record(&asset, &settlement);
        }

        let event = match settlement.state {
            LoadState::Failed => {
                let error = settlement
                    .error
                    .unwrap_or_else(|| ResourceLoadError::new("unknown failure"));
                log::warn!("Failed to load '{asset}' in {scope}: {error}");
                AssetEvent::AssetFailed {
                    asset,
                    scope,
                    error,
                }
            }
            _ => {
                log::debug!("Loaded '{asset}' in {scope}");
                AssetEvent::AssetLoaded { asset, scope }
            }
        };
        self.events.emit(&event);

        if self.loaded_count() != before {
            self.report_progress();
        }
        self.check_complete();
        true
    }

    fn report_progress(&mut self) {
        let percent = self.percent_loaded().max(self.last_percent);
        self.last_percent = percent;

        let step = self.config.progress_log_step;
        if step > 0.0 && percent >= self.next_log_mark {
            let stats = self.stats();
            log::info!(
                "{percent:.0}% loaded ({}/{} settled)",
                stats.settled(),
                stats.total
            );
            self.next_log_mark = ((percent / step).floor() + 1.0) * step;
        }

        self.events.emit(&AssetEvent::ProgressChanged { percent });
    }

    fn check_complete(&mut self) {
        if self.session != Session::Loading {
            return;
        }

        if self.is_complete() {
            self.session = Session::Complete;
            let stats = self.stats();
            log::info!(
                "Asset loading complete: {} loaded, {} failed",
                stats.loaded,
                stats.failed
            );
            self.events.emit(&AssetEvent::Complete);
        } else if self.stats().pending() == 0 {
            log::warn!(
                "All assets settled but {} failed; completion withheld by failure policy",
                self.stats().failed
            );
        }
    }
}

impl Progressable for AssetManager {
    fn total_count(&self) -> usize {
        self.tally.stats().total
    }

    fn loaded_count(&self) -> usize {
        self.tally.stats().counted(self.config.failure_policy)
    }

    /// Dispatch every global and bundled resource that has not started.
    ///
    /// Never blocks. Starts the session on first call; an empty manager
    /// completes immediately.
    fn load(&mut self) -> usize {
        if self.session == Session::Idle {
            self.session = Session::Loading;
            log::info!(
                "Loading {} assets across {} bundles",
                self.total_count(),
                self.bundles.len()
            );
        }

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
        log::debug!("Dispatched {dispatched} loads");

        self.check_complete();
        dispatched
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        if self.session == Session::Loading {
            log::debug!(
                "Asset manager dropped with {} assets pending",
                self.stats().pending()
            );
        }
    }
}

impl fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManager")
            .field("session", &self.session)
            .field("assets", &self.assets)
            .field("bundles", &self.bundles)
            .field("stats", &self.stats())
            .field("events", &self.events)
            .finish()
    }
}
