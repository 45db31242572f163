//! Progress counting shared by bundles and the manager

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::handle::ResourceId;
use super::resource::LoadState;

/// Whether failed resources count toward `loaded_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// A failed resource counts as settled, so completion still fires
    #[default]
    CountAsSettled,
    /// Only successfully loaded resources count
    LoadedOnly,
}

/// Anything that owns resources and reports aggregate progress.
pub trait Progressable {
    /// Number of distinct resources owned
    fn total_count(&self) -> usize;

    /// Number of resources counted as loaded under the failure policy
    fn loaded_count(&self) -> usize;

    /// Dispatch loads for every resource that has not started yet.
    ///
    /// Returns how many loads were started by this call.
    fn load(&mut self) -> usize;

    /// Progress in percent, `0.0` when nothing is owned
    fn percent_loaded(&self) -> f32 {
        percent(self.loaded_count(), self.total_count())
    }

    /// Whether every owned resource is counted as loaded.
    ///
    /// An empty scope is complete.
    fn is_complete(&self) -> bool {
        self.loaded_count() == self.total_count()
    }
}

/// `loaded / total * 100`, or `0.0` for an empty scope.
#[must_use]
pub fn percent(loaded: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    if loaded >= total {
        return 100.0;
    }
    (loaded as f64 / total as f64 * 100.0) as f32
}

/// Snapshot of a scope's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadStats {
    /// Distinct resources owned
    pub total: usize,
    /// Resources that reached `Loaded`
    pub loaded: usize,
    /// Resources that reached `Failed`
    pub failed: usize,
}

impl LoadStats {
    /// Loaded plus failed
    #[must_use]
    pub const fn settled(&self) -> usize {
        self.loaded + self.failed
    }

    /// Resources still unloaded or in flight
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.total - self.settled()
    }

    /// Count toward `loaded_count` under `policy`
    #[must_use]
    pub const fn counted(&self, policy: FailurePolicy) -> usize {
        match policy {
            FailurePolicy::CountAsSettled => self.settled(),
            FailurePolicy::LoadedOnly => self.loaded,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Member {
    /// How many registrations in this scope point at the instance
    refs: usize,
    state: LoadState,
}

/// Per-scope counters keyed by instance, so a resource registered twice is
/// counted once.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    members: FxHashMap<ResourceId, Member>,
    stats: LoadStats,
}

impl Tally {
    /// Track a registration. Returns true if the instance is new to the scope.
    pub(crate) fn insert(&mut self, id: ResourceId) -> bool {
        if let Some(member) = self.members.get_mut(&id) {
            member.refs += 1;
            return false;
        }
        self.members.insert(
            id,
            Member {
                refs: 1,
                state: LoadState::Unloaded,
            },
        );
        self.stats.total += 1;
        true
    }

    /// Drop a registration. Returns true if the instance left the scope.
    pub(crate) fn remove(&mut self, id: ResourceId) -> bool {
        let Some(member) = self.members.get_mut(&id) else {
            return false;
        };
        member.refs -= 1;
        if member.refs > 0 {
            return false;
        }

        let state = member.state;
        self.members.remove(&id);
        self.stats.total -= 1;
        match state {
            LoadState::Loaded => self.stats.loaded -= 1,
            LoadState::Failed => self.stats.failed -= 1,
            LoadState::Unloaded | LoadState::Loading => {}
        }
        true
    }

    /// Record a settled state. Returns true if the counters changed.
    pub(crate) fn settle(&mut self, id: ResourceId, state: LoadState) -> bool {
        let Some(member) = self.members.get_mut(&id) else {
            return false;
        };
        if member.state.is_settled() || !state.is_settled() {
            return false;
        }
        member.state = state;
        match state {
            LoadState::Loaded => self.stats.loaded += 1,
            LoadState::Failed => self.stats.failed += 1,
            LoadState::Unloaded | LoadState::Loading => {}
        }
        true
    }

    /// State recorded for an instance, if it is in the scope
    pub(crate) fn state(&self, id: ResourceId) -> Option<LoadState> {
        self.members.get(&id).map(|member| member.state)
    }

    pub(crate) fn stats(&self) -> LoadStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_bounds() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(0, 3), 0.0);
        assert_eq!(percent(3, 3), 100.0);
        assert!((percent(1, 3) - 33.333).abs() < 0.01);
        assert!((percent(2, 3) - 66.667).abs() < 0.01);
    }

    #[test]
    fn test_percent_hits_100_only_when_done() {
        for total in 1..50 {
            for loaded in 0..total {
                assert!(percent(loaded, total) < 100.0, "{loaded}/{total}");
            }
            assert_eq!(percent(total, total), 100.0);
        }
    }

    #[test]
    fn test_tally_dedupes_instances() {
        let mut tally = Tally::default();
        let id = ResourceId::next();

        assert!(tally.insert(id));
        assert!(!tally.insert(id));
        assert_eq!(tally.stats().total, 1);

        assert_eq!(tally.state(id), Some(LoadState::Unloaded));
        assert!(!tally.remove(id));
        assert_eq!(tally.stats().total, 1);
        assert!(tally.remove(id));
        assert_eq!(tally.stats().total, 0);
    }

    #[test]
    fn test_tally_settles_once() {
        let mut tally = Tally::default();
        let id = ResourceId::next();
        tally.insert(id);

        assert!(!tally.settle(id, LoadState::Loading));
        assert!(tally.settle(id, LoadState::Failed));
        assert!(!tally.settle(id, LoadState::Loaded));

        let stats = tally.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.loaded, 0);
        assert_eq!(stats.counted(FailurePolicy::CountAsSettled), 1);
        assert_eq!(stats.counted(FailurePolicy::LoadedOnly), 0);
    }

    #[test]
    fn test_tally_remove_settled_member() {
        let mut tally = Tally::default();
        let a = ResourceId::next();
        let b = ResourceId::next();
        tally.insert(a);
        tally.insert(b);
        tally.settle(a, LoadState::Loaded);

        tally.remove(a);
        assert_eq!(tally.stats(), LoadStats { total: 1, loaded: 0, failed: 0 });
        assert_eq!(tally.stats().pending(), 1);
    }

    #[test]
    fn test_settle_unknown_id_is_ignored() {
        let mut tally = Tally::default();
        assert!(!tally.settle(ResourceId::next(), LoadState::Loaded));
    }
}
