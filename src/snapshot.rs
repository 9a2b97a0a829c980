//! Serializable session snapshots for persistence and transport.
//!
//! [`SessionSnapshot`] captures a [`ClusterLabeling`] at the value level:
//! the label array and the id high-water mark. History is not stored;
//! a restored engine starts with an empty undo stack, and the preserved
//! high-water mark guarantees that ids minted before the snapshot are
//! never re-minted after restore.
//!
//! [`MetadataSnapshot`] captures the explicit values of a
//! [`ClusterMetadata`] table. Default field functions are erased; the
//! runtime re-registers them on load.
//!
//! This module requires the `serde` feature.
//!
//! [`ClusterLabeling`]: crate::labeling::ClusterLabeling
//! [`ClusterMetadata`]: crate::metadata::ClusterMetadata

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::labeling::ClusterLabeling;
use crate::metadata::ClusterMetadata;
use crate::update::ClusterId;

/// Current snapshot format version.
pub const SESSION_SNAPSHOT_VERSION: u16 = 1;

/// A serializable capture of a labeling session.
///
/// # Example
///
/// ```rust,ignore
/// use spikesort_core::labeling::ClusterLabeling;
/// use spikesort_core::snapshot::SessionSnapshot;
///
/// let snapshot = SessionSnapshot::from_labeling(&clustering);
/// let json = serde_json::to_string(&snapshot).unwrap();
/// let restored: SessionSnapshot = serde_json::from_str(&json).unwrap();
/// let clustering = restored.restore();
/// ```
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Format version, [`SESSION_SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Label per spike at snapshot time.
    pub spike_clusters: Vec<ClusterId>,
    /// Id high-water mark at snapshot time.
    pub next_cluster_id: ClusterId,
}

impl SessionSnapshot {
    /// Capture a live labeling engine.
    pub fn from_labeling(labeling: &ClusterLabeling) -> Self {
        Self {
            version: SESSION_SNAPSHOT_VERSION,
            spike_clusters: labeling.spike_clusters().to_vec(),
            next_cluster_id: labeling.new_cluster_id(),
        }
    }

    /// Number of spikes in the captured session.
    pub fn n_spikes(&self) -> usize {
        self.spike_clusters.len()
    }

    /// Rebuild a labeling engine from the snapshot, with an empty history
    /// and the captured high-water mark.
    pub fn restore(&self) -> ClusterLabeling {
        let mut labeling = ClusterLabeling::new(self.spike_clusters.clone());
        labeling.reserve_cluster_ids(self.next_cluster_id);
        labeling
    }
}

/// One explicitly stored metadata value.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MetadataEntry<V> {
    /// Cluster the value belongs to.
    pub cluster: ClusterId,
    /// Field name.
    pub field: String,
    /// Stored value.
    pub value: V,
}

/// A serializable capture of a metadata table: explicit values only,
/// sorted by cluster then field. Defaults are not materialized.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MetadataSnapshot<V> {
    /// Format version, [`SESSION_SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Every explicitly stored value.
    pub entries: Vec<MetadataEntry<V>>,
}

impl<V: Clone> MetadataSnapshot<V> {
    /// Capture the explicit values of a live metadata table.
    pub fn from_metadata(metadata: &ClusterMetadata<V>) -> Self {
        let entries = metadata
            .stored()
            .into_iter()
            .map(|(cluster, field, value)| MetadataEntry {
                cluster,
                field: field.to_string(),
                value: value.clone(),
            })
            .collect();
        Self {
            version: SESSION_SNAPSHOT_VERSION,
            entries,
        }
    }

    /// Rebuild a metadata table holding the captured values, with an
    /// empty history and no registered defaults.
    pub fn restore(&self) -> ClusterMetadata<V> {
        let mut data: HashMap<ClusterId, HashMap<String, V>> = HashMap::new();
        for entry in &self.entries {
            data.entry(entry.cluster)
                .or_default()
                .insert(entry.field.clone(), entry.value.clone());
        }
        ClusterMetadata::with_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_session_snapshot_preserves_high_water_mark() {
        let mut clustering = ClusterLabeling::new(vec![2, 5, 3, 2, 7, 5, 2]);
        clustering.merge(&[2, 3], None).unwrap();
        clustering.undo().unwrap();

        let snapshot = SessionSnapshot::from_labeling(&clustering);
        assert_eq!(snapshot.version, SESSION_SNAPSHOT_VERSION);
        assert_eq!(snapshot.n_spikes(), 7);
        assert_eq!(snapshot.next_cluster_id, 9);

        let mut restored = snapshot.restore();
        assert_eq!(restored.spike_clusters(), clustering.spike_clusters());
        // Ids retired before the snapshot stay retired after restore.
        let up = restored.merge(&[2, 3], None).unwrap();
        assert_eq!(up.added, vec![9]);
    }

    #[test]
    fn test_metadata_snapshot_erases_defaults() {
        let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
        metadata.register("group", |_| 3);
        metadata.set("group", &[5], 1);

        let snapshot = MetadataSnapshot::from_metadata(&metadata);
        assert_eq!(snapshot.entries.len(), 1);

        let restored = snapshot.restore();
        // The explicit value survives; the default does not.
        assert_eq!(restored.get("group", 5), Some(1));
        assert_eq!(restored.get("group", 6), None);
    }
}
