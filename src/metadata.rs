//! Per-cluster keyed attribute table with pluggable defaults and its own
//! undo/redo history.
//!
//! A [`ClusterMetadata`] table stores curation attributes (a quality
//! label, a display group) keyed by cluster id, independent of the spike
//! label array. Values survive merges and splits of the clusters they
//! describe; the store/view layer decides when to drop entries for
//! removed clusters.
//!
//! Per-field shorthand accessors are deliberately not generated here:
//! callers wanting `quality(cluster)` style sugar build a thin wrapper
//! over [`ClusterMetadata::get`] and [`ClusterMetadata::set`] with
//! ordinary composition.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use log::debug;

use crate::history::History;
use crate::labeling::DEFAULT_HISTORY_CAPACITY;
use crate::update::{ChangeRecord, ClusterId};

/// Fallback generator for a metadata field, called for clusters with no
/// explicitly stored value.
pub type DefaultFn<V> = Box<dyn Fn(ClusterId) -> V + Send + Sync>;

/// One recorded metadata write plus its change record. Replaying writes
/// in order over the base table reproduces any retained state.
struct MetaDelta<V> {
    clusters: Vec<ClusterId>,
    field: String,
    value: V,
    record: ChangeRecord,
}

/// Per-cluster attribute table with per-field defaults and undo/redo.
///
/// An explicit stored value always shadows the default function for that
/// `(cluster, field)` pair.
///
/// # Example
///
/// ```
/// use spikesort_core::metadata::ClusterMetadata;
///
/// let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
/// metadata.register("group", |_cluster| 3);
///
/// metadata.set("group", &[5], 1);
/// assert_eq!(metadata.get("group", 5), Some(1));
///
/// metadata.undo().unwrap();
/// assert_eq!(metadata.get("group", 5), Some(3));
/// ```
pub struct ClusterMetadata<V> {
    /// Registered default generators, keyed by field name.
    fields: HashMap<String, DefaultFn<V>>,
    /// Explicit values: cluster id to field name to value.
    data: HashMap<ClusterId, HashMap<String, V>>,
    /// Deep copy of `data` at the history base, for replay.
    data_base: HashMap<ClusterId, HashMap<String, V>>,
    history: History<Option<MetaDelta<V>>>,
}

impl<V: Clone> ClusterMetadata<V> {
    /// Create an empty table with the default undo depth.
    pub fn new() -> Self {
        Self::with_data(HashMap::new())
    }

    /// Create a table pre-filled with explicit values, e.g. loaded by the
    /// surrounding data model.
    pub fn with_data(data: HashMap<ClusterId, HashMap<String, V>>) -> Self {
        Self::with_history_capacity(data, DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a pre-filled table retaining at most `capacity` undoable
    /// writes.
    pub fn with_history_capacity(
        data: HashMap<ClusterId, HashMap<String, V>>,
        capacity: usize,
    ) -> Self {
        Self {
            fields: HashMap::new(),
            data_base: data.clone(),
            data,
            history: History::bounded(None, capacity),
        }
    }

    /// Install `default` as the fallback generator for `field`,
    /// replacing any previous generator. Stored values are unaffected.
    pub fn register<F>(&mut self, field: &str, default: F)
    where
        F: Fn(ClusterId) -> V + Send + Sync + 'static,
    {
        self.fields.insert(field.to_string(), Box::new(default));
    }

    /// Value of `field` for one cluster: the stored value if set, else
    /// the registered default, else `None`.
    pub fn get(&self, field: &str, cluster: ClusterId) -> Option<V> {
        if let Some(value) = self.data.get(&cluster).and_then(|fields| fields.get(field)) {
            return Some(value.clone());
        }
        self.fields.get(field).map(|default| default(cluster))
    }

    /// Values of `field` for several clusters, in input order.
    pub fn get_many(&self, field: &str, clusters: &[ClusterId]) -> Vec<Option<V>> {
        clusters.iter().map(|&cluster| self.get(field, cluster)).collect()
    }

    /// Write `value` for every cluster named, overwriting explicit prior
    /// values, and push the change onto the undo stack.
    ///
    /// Clusters need not be present in any label array; the table is
    /// independent of the labeling engine.
    pub fn set(&mut self, field: &str, clusters: &[ClusterId], value: V) -> ChangeRecord {
        let record = ChangeRecord::metadata(field, clusters);
        Self::write(&mut self.data, clusters, field, &value);
        debug!("metadata_{}: {} clusters", field, clusters.len());

        let delta = MetaDelta {
            clusters: clusters.to_vec(),
            field: field.to_string(),
            value,
            record: record.clone(),
        };
        if let Some(Some(evicted)) = self.history.add(Some(delta)) {
            // Oldest write fell off the bounded stack; fold it into the
            // base table so replay stays equivalent.
            Self::write(
                &mut self.data_base,
                &evicted.clusters,
                &evicted.field,
                &evicted.value,
            );
        }
        record
    }

    /// Explicitly stored `(cluster, field, value)` triples, sorted by
    /// cluster id then field name.
    pub fn stored(&self) -> Vec<(ClusterId, &str, &V)> {
        let mut entries: Vec<(ClusterId, &str, &V)> = self
            .data
            .iter()
            .flat_map(|(&cluster, fields)| {
                fields
                    .iter()
                    .map(move |(field, value)| (cluster, field.as_str(), value))
            })
            .collect();
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }

    /// Undo the last write.
    ///
    /// Restores the deep copy of the base table, replays every remaining
    /// write, and returns the undone write's record. Returns `None`
    /// without touching state when there is nothing to undo.
    pub fn undo(&mut self) -> Option<ChangeRecord> {
        self.history.back()?;

        self.data = self.data_base.clone();
        for delta in self.history.iter().flatten() {
            Self::write(&mut self.data, &delta.clusters, &delta.field, &delta.value);
        }

        let record = self
            .history
            .redo_target()
            .and_then(|entry| entry.as_ref())
            .map(|delta| delta.record.clone());
        if let Some(ref record) = record {
            debug!("undo: {} reverted", record.description);
        }
        record
    }

    /// Redo the next undone write. Returns `None` without touching state
    /// when there is nothing to redo.
    pub fn redo(&mut self) -> Option<ChangeRecord> {
        let (clusters, field, value, record) = {
            let entry = self.history.forward()?;
            // The base sentinel never sits forward of the cursor.
            let delta = entry.as_ref()?;
            (
                delta.clusters.clone(),
                delta.field.clone(),
                delta.value.clone(),
                delta.record.clone(),
            )
        };
        Self::write(&mut self.data, &clusters, &field, &value);
        debug!("redo: {} re-applied", record.description);
        Some(record)
    }

    /// Write one value for several clusters into a table.
    fn write(
        data: &mut HashMap<ClusterId, HashMap<String, V>>,
        clusters: &[ClusterId],
        field: &str,
        value: &V,
    ) {
        for &cluster in clusters {
            data.entry(cluster)
                .or_default()
                .insert(field.to_string(), value.clone());
        }
    }
}

impl<V: Clone> Default for ClusterMetadata<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_default_function_fallback() {
        let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
        metadata.register("group", |_| 3);

        // No explicit value anywhere yet.
        assert_eq!(metadata.get("group", 5), Some(3));
        assert_eq!(metadata.get("group", 17), Some(3));
        // Unregistered field with no stored value.
        assert_eq!(metadata.get("quality", 5), None);
    }

    #[test]
    fn test_explicit_value_shadows_default() {
        let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
        metadata.register("group", |_| 3);

        let up = metadata.set("group", &[5], 1);
        assert_eq!(up.description, "metadata_group");
        assert_eq!(up.metadata_changed, vec![5]);
        assert!(up.added.is_empty());
        assert!(up.deleted.is_empty());

        assert_eq!(metadata.get("group", 5), Some(1));
        assert_eq!(metadata.get("group", 6), Some(3));
        assert_eq!(
            metadata.get_many("group", &[5, 6]),
            vec![Some(1), Some(3)]
        );
    }

    #[test]
    fn test_undo_restores_default() {
        let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
        metadata.register("group", |_| 3);

        metadata.set("group", &[5], 1);
        assert_eq!(metadata.get("group", 5), Some(1));

        let up = metadata.undo().unwrap();
        assert_eq!(up.description, "metadata_group");
        assert_eq!(up.metadata_changed, vec![5]);
        assert_eq!(metadata.get("group", 5), Some(3));

        let up = metadata.redo().unwrap();
        assert_eq!(up.metadata_changed, vec![5]);
        assert_eq!(metadata.get("group", 5), Some(1));
    }

    #[test]
    fn test_undo_restores_prior_explicit_value() {
        let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
        metadata.set("group", &[2, 3], 7);
        metadata.set("group", &[3], 9);
        assert_eq!(metadata.get("group", 3), Some(9));

        metadata.undo().unwrap();
        assert_eq!(metadata.get("group", 3), Some(7));
        assert_eq!(metadata.get("group", 2), Some(7));

        metadata.undo().unwrap();
        assert_eq!(metadata.get("group", 3), None);
        assert!(metadata.undo().is_none());
    }

    #[test]
    fn test_initial_data_survives_undo() {
        let mut data: HashMap<ClusterId, HashMap<String, i64>> = HashMap::new();
        data.entry(4).or_default().insert("group".to_string(), 2);
        let mut metadata = ClusterMetadata::with_data(data);

        metadata.set("group", &[4], 8);
        metadata.undo().unwrap();
        // Load-time values sit in the base table, below the undo stack.
        assert_eq!(metadata.get("group", 4), Some(2));
    }

    #[test]
    fn test_new_write_truncates_redo_branch() {
        let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
        metadata.set("group", &[1], 1);
        metadata.undo().unwrap();
        metadata.set("group", &[1], 2);
        assert!(metadata.redo().is_none());
        assert_eq!(metadata.get("group", 1), Some(2));
    }

    #[test]
    fn test_bounded_history_folds_into_base() {
        let mut metadata: ClusterMetadata<i64> =
            ClusterMetadata::with_history_capacity(HashMap::new(), 1);
        metadata.set("group", &[1], 1);
        metadata.set("group", &[1], 2);

        metadata.undo().unwrap();
        // The first write folded into the base table.
        assert_eq!(metadata.get("group", 1), Some(1));
        assert!(metadata.undo().is_none());
    }

    #[test]
    fn test_stored_is_sorted() {
        let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
        metadata.register("group", |_| 3);
        metadata.set("quality", &[9], 1);
        metadata.set("group", &[9], 2);
        metadata.set("group", &[4], 5);

        let stored: Vec<(ClusterId, &str, i64)> = metadata
            .stored()
            .into_iter()
            .map(|(cluster, field, value)| (cluster, field, *value))
            .collect();
        // Defaults are not materialized, only explicit writes.
        assert_eq!(
            stored,
            vec![(4, "group", 5), (9, "group", 2), (9, "quality", 1)]
        );
    }
}
