//! Session snapshot round-trip integration tests.
//!
//! Verifies that a live labeling session and a metadata table can be
//! captured, serialized to JSON, deserialized back, and restored with
//! all labels, the id high-water mark, and explicit metadata values
//! preserved exactly.

#[cfg(feature = "serde")]
mod tests {
    use spikesort_core::labeling::ClusterLabeling;
    use spikesort_core::metadata::ClusterMetadata;
    use spikesort_core::snapshot::{
        MetadataSnapshot, SessionSnapshot, SESSION_SNAPSHOT_VERSION,
    };

    /// A session with some curation work already done, including an undo
    /// so the high-water mark sits above the highest live id.
    fn make_session() -> ClusterLabeling {
        let mut clustering = ClusterLabeling::new(vec![2, 5, 3, 2, 7, 5, 2]);
        clustering.merge(&[2, 3], None).unwrap();
        clustering.split(&[1], None).unwrap();
        clustering.undo().unwrap();
        clustering
    }

    #[test]
    fn test_session_round_trip_preserves_labels() {
        let clustering = make_session();
        let snapshot = SessionSnapshot::from_labeling(&clustering);
        assert_eq!(snapshot.version, SESSION_SNAPSHOT_VERSION);

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);

        let restored = decoded.restore();
        assert_eq!(restored.spike_clusters(), clustering.spike_clusters());
        assert_eq!(restored.cluster_ids(), clustering.cluster_ids());
        restored.check_consistency().unwrap();
    }

    #[test]
    fn test_restored_session_mints_past_retired_ids() {
        let clustering = make_session();
        // Ids 8 (live), 9 and 10 (undone) are all used.
        assert_eq!(clustering.new_cluster_id(), 11);

        let snapshot = SessionSnapshot::from_labeling(&clustering);
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: SessionSnapshot = serde_json::from_str(&json).unwrap();
        let mut restored = decoded.restore();

        assert_eq!(restored.new_cluster_id(), 11);
        let up = restored.split(&[0], None).unwrap();
        assert!(up.added.iter().all(|&id| id >= 11));
    }

    #[test]
    fn test_metadata_round_trip_keeps_explicit_values_only() {
        let mut metadata: ClusterMetadata<i64> = ClusterMetadata::new();
        metadata.register("group", |_| 3);
        metadata.set("group", &[5], 1);
        metadata.set("quality", &[8, 9], 2);

        let snapshot = MetadataSnapshot::from_metadata(&metadata);
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: MetadataSnapshot<i64> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);

        let mut restored = decoded.restore();
        assert_eq!(restored.get("group", 5), Some(1));
        assert_eq!(restored.get("quality", 8), Some(2));
        assert_eq!(restored.get("quality", 9), Some(2));
        // Defaults were erased by the snapshot; register them again.
        assert_eq!(restored.get("group", 6), None);
        restored.register("group", |_| 3);
        assert_eq!(restored.get("group", 6), Some(3));
        // And the restored table starts with a fresh history.
        assert!(restored.undo().is_none());
    }
}
