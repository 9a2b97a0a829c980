//! Immutable change records describing one labeling or metadata transition.
//!
//! Every mutating call on [`labeling::ClusterLabeling`] or
//! [`metadata::ClusterMetadata`] returns exactly one [`ChangeRecord`].
//! Subscribers (store and view layers) dispatch on the `description` tag:
//! a non-empty `added`/`deleted` means per-cluster derived caches must be
//! invalidated, while `metadata_changed` alone calls for a lighter refresh.
//!
//! Records are plain values: created fresh per call, never mutated after
//! creation, compared field by field in tests.
//!
//! [`labeling::ClusterLabeling`]: crate::labeling::ClusterLabeling
//! [`metadata::ClusterMetadata`]: crate::metadata::ClusterMetadata

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;

/// Identifier of a cluster: a non-negative integer label.
///
/// The set of ids present at any time equals the set of distinct values in
/// the label array. Freshly minted ids come from a session-wide high-water
/// mark and are never reused, not even across undo/redo.
pub type ClusterId = u64;

/// Index of a spike in the session's event sequence, in `[0, n_spikes)`.
pub type SpikeId = usize;

/// Immutable description of one state transition.
///
/// For label transitions, `spikes`, `added`, `deleted` and `descendants`
/// are populated and `metadata_changed` is empty; metadata transitions use
/// only `description` and `metadata_changed`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeRecord {
    /// Operation tag: `"merge"`, `"split"`, `"assign"`, or
    /// `"metadata_<field>"`.
    pub description: String,
    /// Ascending indices of every spike whose label changed, including
    /// displaced remainder spikes.
    pub spikes: Vec<SpikeId>,
    /// Cluster ids brought into existence by the transition, ascending.
    pub added: Vec<ClusterId>,
    /// Cluster ids removed by the transition, ascending.
    pub deleted: Vec<ClusterId>,
    /// `(source, result)` lineage pairs: one pair per pair of clusters that
    /// share at least one spike across the transition. Sorted.
    pub descendants: Vec<(ClusterId, ClusterId)>,
    /// Clusters whose metadata changed, in call order (metadata
    /// transitions only).
    pub metadata_changed: Vec<ClusterId>,
}

impl ChangeRecord {
    /// Build the record for a label assignment.
    ///
    /// The three slices run in parallel, sorted by spike index: spike
    /// `spikes[i]` moved from `old_labels[i]` to `new_labels[i]`. Because
    /// an affected source cluster is always consumed whole, `deleted` is
    /// exactly the distinct old labels and `added` the distinct new ones.
    pub fn from_assignment(
        description: &str,
        spikes: &[SpikeId],
        old_labels: &[ClusterId],
        new_labels: &[ClusterId],
    ) -> Self {
        let added: BTreeSet<ClusterId> = new_labels.iter().copied().collect();
        let deleted: BTreeSet<ClusterId> = old_labels.iter().copied().collect();
        let descendants: BTreeSet<(ClusterId, ClusterId)> = old_labels
            .iter()
            .zip(new_labels)
            .map(|(&old, &new)| (old, new))
            .collect();
        Self {
            description: description.to_string(),
            spikes: spikes.to_vec(),
            added: added.into_iter().collect(),
            deleted: deleted.into_iter().collect(),
            descendants: descendants.into_iter().collect(),
            metadata_changed: Vec::new(),
        }
    }

    /// Build the record for a metadata write on `clusters`.
    ///
    /// The tag is `metadata_<field>` and `metadata_changed` carries the
    /// clusters exactly as named by the caller.
    pub fn metadata(field: &str, clusters: &[ClusterId]) -> Self {
        let mut description = String::from("metadata_");
        description.push_str(field);
        Self {
            description,
            metadata_changed: clusters.to_vec(),
            ..Self::default()
        }
    }

    /// The same transition read in the opposite direction, as returned by
    /// `undo`: `added` and `deleted` swap, each descendant pair flips, and
    /// the affected spikes stay the same.
    pub fn reversed(&self) -> Self {
        let descendants: BTreeSet<(ClusterId, ClusterId)> = self
            .descendants
            .iter()
            .map(|&(source, result)| (result, source))
            .collect();
        Self {
            description: self.description.clone(),
            spikes: self.spikes.clone(),
            added: self.deleted.clone(),
            deleted: self.added.clone(),
            descendants: descendants.into_iter().collect(),
            metadata_changed: self.metadata_changed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_from_assignment_dedups_and_sorts() {
        let record = ChangeRecord::from_assignment(
            "assign",
            &[0, 3, 6],
            &[2, 2, 2],
            &[8, 9, 9],
        );
        assert_eq!(record.description, "assign");
        assert_eq!(record.spikes, vec![0, 3, 6]);
        assert_eq!(record.added, vec![8, 9]);
        assert_eq!(record.deleted, vec![2]);
        assert_eq!(record.descendants, vec![(2, 8), (2, 9)]);
        assert!(record.metadata_changed.is_empty());
    }

    #[test]
    fn test_reversed_swaps_direction() {
        let record = ChangeRecord::from_assignment(
            "split",
            &[0, 3, 6],
            &[2, 2, 2],
            &[8, 9, 9],
        );
        let reversed = record.reversed();
        assert_eq!(reversed.description, "split");
        assert_eq!(reversed.spikes, vec![0, 3, 6]);
        assert_eq!(reversed.added, vec![2]);
        assert_eq!(reversed.deleted, vec![8, 9]);
        assert_eq!(reversed.descendants, vec![(8, 2), (9, 2)]);
        // Reversing twice gets back the original.
        assert_eq!(reversed.reversed(), record);
    }

    #[test]
    fn test_metadata_record() {
        let record = ChangeRecord::metadata("group", &[5, 3]);
        assert_eq!(record.description, "metadata_group");
        assert_eq!(record.metadata_changed, vec![5, 3]);
        assert!(record.spikes.is_empty());
        assert!(record.added.is_empty());
        assert!(record.deleted.is_empty());
    }

    #[test]
    fn test_merge_record_shape() {
        // merge([2, 3]) over labels [2, 5, 3, 2, 7, 5, 2] relabels spikes
        // 0, 2, 3, 6 to the fresh id 8.
        let record = ChangeRecord::from_assignment(
            "merge",
            &[0, 2, 3, 6],
            &[2, 3, 2, 2],
            &[8, 8, 8, 8],
        );
        assert_eq!(record.added, vec![8]);
        assert_eq!(record.deleted, vec![2, 3]);
        assert_eq!(record.descendants, vec![(2, 8), (3, 8)]);
    }
}
