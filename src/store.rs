//! Passive per-cluster data sinks and the two-tier dispatching store.
//!
//! The labeling engine treats storage as a boundary: a sink accepting
//! `(cluster, field, value)` writes and cluster deletions. [`DualStore`]
//! splits registered fields across two backends (typically a cheap
//! in-memory cache in front of a heavier secondary tier) and verifies on
//! read that both tiers agree on which clusters exist. Divergence, e.g.
//! after a crash between tier writes, is reported as
//! [`ClusterError::Inconsistent`] and never silently repaired.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::marker::PhantomData;

use hashbrown::HashMap;
use log::debug;

use crate::error::ClusterError;
use crate::update::{ChangeRecord, ClusterId};

/// Which tier of a [`DualStore`] a registered field lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// The in-memory tier.
    Memory,
    /// The secondary tier (persisted by the surrounding application).
    Secondary,
}

/// A passive per-cluster key/value sink.
pub trait StoreBackend<V> {
    /// Store `value` under `field` for `cluster`.
    fn store(&mut self, cluster: ClusterId, field: &str, value: V);

    /// Load the value of `field` for `cluster`, if present.
    fn load(&self, cluster: ClusterId, field: &str) -> Option<&V>;

    /// Ascending ids of every cluster with at least one stored field.
    fn clusters(&self) -> Vec<ClusterId>;

    /// Drop everything stored for the named clusters. Unknown ids are
    /// ignored.
    fn delete(&mut self, clusters: &[ClusterId]);

    /// Drop every cluster.
    fn clear(&mut self) {
        let all = self.clusters();
        self.delete(&all);
    }
}

/// In-memory backend over a hashbrown table.
pub struct MemoryStore<V> {
    ds: HashMap<ClusterId, HashMap<String, V>>,
}

impl<V> MemoryStore<V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { ds: HashMap::new() }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> StoreBackend<V> for MemoryStore<V> {
    fn store(&mut self, cluster: ClusterId, field: &str, value: V) {
        self.ds
            .entry(cluster)
            .or_default()
            .insert(field.to_string(), value);
    }

    fn load(&self, cluster: ClusterId, field: &str) -> Option<&V> {
        self.ds.get(&cluster).and_then(|fields| fields.get(field))
    }

    fn clusters(&self) -> Vec<ClusterId> {
        let mut ids: Vec<ClusterId> = self.ds.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn delete(&mut self, clusters: &[ClusterId]) {
        for cluster in clusters {
            self.ds.remove(cluster);
        }
    }
}

/// Two storage tiers behind a field-to-tier dispatch registry.
///
/// The application keeps every cluster present in both tiers (each
/// registered field is populated for each stored cluster), so the tiers'
/// cluster-id sets must match at all times; [`DualStore::clusters`]
/// checks exactly that.
pub struct DualStore<M, S, V> {
    memory: M,
    secondary: S,
    dispatch: HashMap<String, Location>,
    _value: PhantomData<V>,
}

impl<M, S, V> DualStore<M, S, V>
where
    M: StoreBackend<V>,
    S: StoreBackend<V>,
{
    /// Wrap two backends with an empty dispatch registry.
    pub fn new(memory: M, secondary: S) -> Self {
        Self {
            memory,
            secondary,
            dispatch: HashMap::new(),
            _value: PhantomData,
        }
    }

    /// Register `field` as living in `location`.
    pub fn register_field(&mut self, field: &str, location: Location) {
        self.dispatch.insert(field.to_string(), location);
    }

    /// Store `value` for `cluster` in the tier its field is registered
    /// for. Writing an unregistered field is rejected.
    pub fn store(&mut self, cluster: ClusterId, field: &str, value: V) -> Result<(), ClusterError> {
        match self.dispatch.get(field) {
            Some(Location::Memory) => {
                self.memory.store(cluster, field, value);
                Ok(())
            }
            Some(Location::Secondary) => {
                self.secondary.store(cluster, field, value);
                Ok(())
            }
            None => Err(ClusterError::InvalidOperation(format!(
                "field '{field}' is not registered"
            ))),
        }
    }

    /// Load the value of `field` for `cluster` from its registered tier.
    pub fn load(&self, cluster: ClusterId, field: &str) -> Result<Option<&V>, ClusterError> {
        match self.dispatch.get(field) {
            Some(Location::Memory) => Ok(self.memory.load(cluster, field)),
            Some(Location::Secondary) => Ok(self.secondary.load(cluster, field)),
            None => Err(ClusterError::InvalidOperation(format!(
                "field '{field}' is not registered"
            ))),
        }
    }

    /// Ascending ids of the clusters present in the store.
    ///
    /// Fails with [`ClusterError::Inconsistent`] when the two tiers
    /// disagree; that signals corruption (e.g. a crash between tier
    /// writes) and is fatal for the session.
    pub fn clusters(&self) -> Result<Vec<ClusterId>, ClusterError> {
        let memory = self.memory.clusters();
        let secondary = self.secondary.clusters();
        if memory != secondary {
            return Err(ClusterError::Inconsistent(format!(
                "store tiers disagree: memory holds {} clusters, secondary holds {}",
                memory.len(),
                secondary.len()
            )));
        }
        Ok(memory)
    }

    /// Drop everything stored for the named clusters, in both tiers.
    pub fn delete(&mut self, clusters: &[ClusterId]) {
        debug!("store: deleting {} clusters", clusters.len());
        self.memory.delete(clusters);
        self.secondary.delete(clusters);
    }

    /// Drop every cluster from both tiers.
    pub fn clear(&mut self) {
        self.memory.clear();
        self.secondary.clear();
    }

    /// Subscriber hook: invalidate per-cluster data for the clusters a
    /// change record deletes. Metadata-only records touch nothing here.
    pub fn apply(&mut self, record: &ChangeRecord) {
        if !record.deleted.is_empty() {
            self.delete(&record.deleted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use crate::update::ChangeRecord;

    fn dual() -> DualStore<MemoryStore<i64>, MemoryStore<i64>, i64> {
        let mut store = DualStore::new(MemoryStore::new(), MemoryStore::new());
        store.register_field("n_spikes", Location::Memory);
        store.register_field("waveform_mean", Location::Secondary);
        store
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store: MemoryStore<i64> = MemoryStore::new();
        store.store(3, "n_spikes", 120);
        store.store(3, "quality", 2);
        store.store(7, "n_spikes", 45);

        assert_eq!(store.load(3, "n_spikes"), Some(&120));
        assert_eq!(store.load(3, "missing"), None);
        assert_eq!(store.load(99, "n_spikes"), None);
        assert_eq!(store.clusters(), vec![3, 7]);

        store.delete(&[3, 99]);
        assert_eq!(store.clusters(), vec![7]);
        store.clear();
        assert!(store.clusters().is_empty());
    }

    #[test]
    fn test_dual_store_dispatch() {
        let mut store = dual();
        store.store(3, "n_spikes", 120).unwrap();
        store.store(3, "waveform_mean", -14).unwrap();

        assert_eq!(store.load(3, "n_spikes").unwrap(), Some(&120));
        assert_eq!(store.load(3, "waveform_mean").unwrap(), Some(&-14));
        assert_eq!(store.clusters().unwrap(), vec![3]);
    }

    #[test]
    fn test_unregistered_field_is_rejected() {
        let mut store = dual();
        assert!(matches!(
            store.store(3, "unheard_of", 1),
            Err(ClusterError::InvalidOperation(_))
        ));
        assert!(matches!(
            store.load(3, "unheard_of"),
            Err(ClusterError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_tier_divergence_is_fatal() {
        let mut store = dual();
        // Populate only the memory tier for cluster 3.
        store.store(3, "n_spikes", 120).unwrap();
        assert!(matches!(
            store.clusters(),
            Err(ClusterError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_apply_deletes_removed_clusters() {
        let mut store = dual();
        for cluster in [2, 3] {
            store.store(cluster, "n_spikes", 10).unwrap();
            store.store(cluster, "waveform_mean", 0).unwrap();
        }

        let record = ChangeRecord::from_assignment("merge", &[0, 1], &[2, 3], &[8, 8]);
        store.apply(&record);
        assert_eq!(store.clusters().unwrap(), Vec::<ClusterId>::new());

        // Metadata-only records leave the store alone.
        store.store(8, "n_spikes", 20).unwrap();
        store.store(8, "waveform_mean", 1).unwrap();
        store.apply(&ChangeRecord::metadata("group", &[8]));
        assert_eq!(store.clusters().unwrap(), vec![8]);
    }
}
