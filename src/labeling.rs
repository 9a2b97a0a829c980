//! The spike-to-cluster labeling engine.
//!
//! [`ClusterLabeling`] owns the per-spike label array and its derived
//! inverse index, and exposes the merge / split / assign primitives with
//! linear undo/redo. Every mutating call returns a
//! [`ChangeRecord`](crate::update::ChangeRecord) for the store and view
//! layers to consume.
//!
//! # Invariants
//!
//! - The label array is a total function: every spike carries exactly one
//!   cluster id at all times.
//! - The inverse index is an exact partition of `0..n_spikes` and always
//!   matches the label array.
//! - Fresh ids come from a monotone high-water mark over every id ever
//!   used in the session; no id is reused, not even across undo/redo.
//! - A cluster id is never split between two live spike sets: when an
//!   operation takes part of a cluster, the untouched remainder moves to a
//!   fresh id of its own.
//! - Validation runs strictly before mutation; a rejected call is a
//!   complete no-op.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use crate::error::ClusterError;
use crate::history::History;
use crate::update::{ChangeRecord, ClusterId, SpikeId};

/// Default bound on undo depth.
///
/// Interactive sessions stay in the tens of operations; entries pushed
/// past the bound fold into the base snapshot and can no longer be undone.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// One recorded label assignment: the forward delta plus its change
/// record. Replaying `spikes[i] -> labels[i]` over any array reproduces
/// the transition. The history base sentinel is the empty assignment.
#[derive(Clone, Debug, Default)]
struct Assignment {
    spikes: Vec<SpikeId>,
    labels: Vec<ClusterId>,
    record: ChangeRecord,
}

/// Spike-to-cluster labeling with undo/redo.
///
/// Built once per session from the initial label sequence supplied by the
/// surrounding data model. Single-threaded: callers handing derived views
/// (`cluster_counts`, `spikes_in_clusters` results) to another thread must
/// copy them first.
///
/// # Example
///
/// ```
/// use spikesort_core::labeling::ClusterLabeling;
///
/// let mut clustering = ClusterLabeling::new(vec![2, 5, 3, 2, 7, 5, 2]);
/// let up = clustering.merge(&[2, 3], None).unwrap();
/// assert_eq!(up.added, vec![8]);
/// assert_eq!(up.deleted, vec![2, 3]);
/// assert_eq!(clustering.spike_clusters(), &[8, 5, 8, 8, 7, 5, 8]);
///
/// clustering.undo().unwrap();
/// assert_eq!(clustering.spike_clusters(), &[2, 5, 3, 2, 7, 5, 2]);
/// ```
pub struct ClusterLabeling {
    /// Current label per spike. Fixed length for the session.
    spike_clusters: Vec<ClusterId>,
    /// Label array at construction, for [`ClusterLabeling::reset`].
    initial_clusters: Vec<ClusterId>,
    /// Label array at the history base. Equal to `initial_clusters` until
    /// the bounded history folds evicted entries into it.
    base_clusters: Vec<ClusterId>,
    /// Derived inverse index: cluster id to ascending spike indices.
    spikes_per_cluster: BTreeMap<ClusterId, Vec<SpikeId>>,
    /// Next id to mint. Monotone over the life of the session.
    next_cluster_id: ClusterId,
    history: History<Assignment>,
}

impl ClusterLabeling {
    /// Build an engine over the initial per-spike label sequence, with the
    /// default undo depth.
    pub fn new(spike_clusters: Vec<ClusterId>) -> Self {
        Self::with_history_capacity(spike_clusters, DEFAULT_HISTORY_CAPACITY)
    }

    /// Build an engine retaining at most `capacity` undoable operations.
    pub fn with_history_capacity(spike_clusters: Vec<ClusterId>, capacity: usize) -> Self {
        let spikes_per_cluster = Self::index_of(&spike_clusters);
        let next_cluster_id = spikes_per_cluster
            .keys()
            .next_back()
            .map_or(0, |&cluster| cluster + 1);
        Self {
            initial_clusters: spike_clusters.clone(),
            base_clusters: spike_clusters.clone(),
            spike_clusters,
            spikes_per_cluster,
            next_cluster_id,
            history: History::bounded(Assignment::default(), capacity),
        }
    }

    /// Build the inverse index of a label array.
    fn index_of(labels: &[ClusterId]) -> BTreeMap<ClusterId, Vec<SpikeId>> {
        let mut index: BTreeMap<ClusterId, Vec<SpikeId>> = BTreeMap::new();
        for (spike, &cluster) in labels.iter().enumerate() {
            index.entry(cluster).or_default().push(spike);
        }
        index
    }

    // ── Read accessors ─────────────────────────────────────────────────────

    /// Number of spikes in the session.
    pub fn n_spikes(&self) -> usize {
        self.spike_clusters.len()
    }

    /// Current label per spike.
    pub fn spike_clusters(&self) -> &[ClusterId] {
        &self.spike_clusters
    }

    /// Inverse index: cluster id to the ascending indices of its spikes.
    pub fn spikes_per_cluster(&self) -> &BTreeMap<ClusterId, Vec<SpikeId>> {
        &self.spikes_per_cluster
    }

    /// Ids of the clusters currently present, ascending.
    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.spikes_per_cluster.keys().copied().collect()
    }

    /// Number of clusters currently present.
    pub fn n_clusters(&self) -> usize {
        self.spikes_per_cluster.len()
    }

    /// Spike count per cluster, derived from the inverse index.
    pub fn cluster_counts(&self) -> BTreeMap<ClusterId, usize> {
        self.spikes_per_cluster
            .iter()
            .map(|(&cluster, spikes)| (cluster, spikes.len()))
            .collect()
    }

    /// Ascending indices of every spike currently labeled with any id in
    /// `cluster_ids`. Total: unknown ids contribute nothing.
    pub fn spikes_in_clusters(&self, cluster_ids: &[ClusterId]) -> Vec<SpikeId> {
        let clusters: BTreeSet<ClusterId> = cluster_ids.iter().copied().collect();
        let mut spikes: Vec<SpikeId> = clusters
            .iter()
            .filter_map(|cluster| self.spikes_per_cluster.get(cluster))
            .flatten()
            .copied()
            .collect();
        spikes.sort_unstable();
        spikes
    }

    /// The id the next minting operation will use: one above every id ever
    /// used in this session, including ids since deleted or undone.
    pub fn new_cluster_id(&self) -> ClusterId {
        self.next_cluster_id
    }

    /// Raise the id high-water mark so that `new_cluster_id()` returns at
    /// least `next_id`. Used when restoring a session whose earlier ids
    /// must stay retired.
    pub fn reserve_cluster_ids(&mut self, next_id: ClusterId) {
        if next_id > self.next_cluster_id {
            self.next_cluster_id = next_id;
        }
    }

    // ── Mutating operations ────────────────────────────────────────────────

    /// Merge two or more clusters into one.
    ///
    /// All spikes of the named clusters move to `to` when given, else to a
    /// freshly minted id. Fails with
    /// [`ClusterError::InvalidOperation`] when fewer than two distinct ids
    /// are named and with [`ClusterError::UnknownCluster`] when any id is
    /// not currently present.
    pub fn merge(
        &mut self,
        cluster_ids: &[ClusterId],
        to: Option<ClusterId>,
    ) -> Result<ChangeRecord, ClusterError> {
        let sources: BTreeSet<ClusterId> = cluster_ids.iter().copied().collect();
        if sources.len() < 2 {
            return Err(ClusterError::InvalidOperation(
                "merge needs at least two distinct cluster ids".to_string(),
            ));
        }
        for &cluster in &sources {
            if !self.spikes_per_cluster.contains_key(&cluster) {
                return Err(ClusterError::UnknownCluster(cluster));
            }
        }
        let target = to.unwrap_or_else(|| self.new_cluster_id());

        let mut spikes: Vec<SpikeId> = sources
            .iter()
            .flat_map(|cluster| self.spikes_per_cluster[cluster].iter().copied())
            .collect();
        spikes.sort_unstable();
        let labels = vec![target; spikes.len()];
        Ok(self.apply("merge", spikes, labels))
    }

    /// Move the named spikes out of their clusters into new ones.
    ///
    /// With no `cluster_ids_rel`, every named spike goes to one fresh id.
    /// Otherwise the slice must be as long as `spike_ids`; its distinct
    /// values, sorted ascending, map to consecutive fresh ids regardless of
    /// first-appearance order. A source cluster that loses only part of
    /// its spikes has its whole remainder moved to a fresh id as well.
    pub fn split(
        &mut self,
        spike_ids: &[SpikeId],
        cluster_ids_rel: Option<&[ClusterId]>,
    ) -> Result<ChangeRecord, ClusterError> {
        let (spikes, labels) = self.extended_assignment(spike_ids, cluster_ids_rel)?;
        Ok(self.apply("split", spikes, labels))
    }

    /// The general relabeling primitive that merge and split reduce to.
    ///
    /// Same contract as [`ClusterLabeling::split`], tagged `"assign"`.
    pub fn assign(
        &mut self,
        spike_ids: &[SpikeId],
        cluster_ids_rel: Option<&[ClusterId]>,
    ) -> Result<ChangeRecord, ClusterError> {
        let (spikes, labels) = self.extended_assignment(spike_ids, cluster_ids_rel)?;
        Ok(self.apply("assign", spikes, labels))
    }

    /// Validate a split/assign call and extend it to cover displaced
    /// remainders. Returns parallel `(spikes, new_labels)` vectors sorted
    /// by spike index. No mutation happens here.
    fn extended_assignment(
        &self,
        spike_ids: &[SpikeId],
        cluster_ids_rel: Option<&[ClusterId]>,
    ) -> Result<(Vec<SpikeId>, Vec<ClusterId>), ClusterError> {
        if spike_ids.is_empty() {
            return Err(ClusterError::InvalidOperation(
                "no spikes selected".to_string(),
            ));
        }
        if let Some(rel) = cluster_ids_rel {
            if rel.len() != spike_ids.len() {
                return Err(ClusterError::InvalidOperation(format!(
                    "cluster_ids_rel has {} entries for {} spikes",
                    rel.len(),
                    spike_ids.len()
                )));
            }
        }
        for &spike in spike_ids {
            if spike >= self.n_spikes() {
                return Err(ClusterError::InvalidSpikeId {
                    spike,
                    n_spikes: self.n_spikes(),
                });
            }
        }

        // Pair each named spike with its relative offset, in spike order.
        let mut named: Vec<(SpikeId, ClusterId)> = match cluster_ids_rel {
            Some(rel) => spike_ids.iter().copied().zip(rel.iter().copied()).collect(),
            None => spike_ids.iter().map(|&spike| (spike, 0)).collect(),
        };
        named.sort_unstable();
        if named.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(ClusterError::InvalidOperation(
                "duplicate spike index in selection".to_string(),
            ));
        }

        // Distinct relative offsets, ascending, map to consecutive fresh
        // ids starting at the high-water mark.
        let base = self.new_cluster_id();
        let offsets: BTreeSet<ClusterId> = named.iter().map(|&(_, offset)| offset).collect();
        let offset_ids: BTreeMap<ClusterId, ClusterId> = offsets
            .iter()
            .enumerate()
            .map(|(rank, &offset)| (offset, base + rank as ClusterId))
            .collect();
        let mut next_fresh = base + offset_ids.len() as ClusterId;

        let mut assignment: Vec<(SpikeId, ClusterId)> = named
            .iter()
            .map(|&(spike, offset)| (spike, offset_ids[&offset]))
            .collect();

        // A cluster id is never left split across live spike sets: the
        // untouched remainder of every partially selected source cluster
        // moves to a fresh id of its own, in ascending source-id order.
        let named_spikes: BTreeSet<SpikeId> = named.iter().map(|&(spike, _)| spike).collect();
        let sources: BTreeSet<ClusterId> = named
            .iter()
            .map(|&(spike, _)| self.spike_clusters[spike])
            .collect();
        for cluster in sources {
            let remainder: Vec<SpikeId> = self.spikes_per_cluster[&cluster]
                .iter()
                .copied()
                .filter(|spike| !named_spikes.contains(spike))
                .collect();
            if remainder.is_empty() {
                continue;
            }
            for spike in remainder {
                assignment.push((spike, next_fresh));
            }
            next_fresh += 1;
        }
        assignment.sort_unstable();
        Ok(assignment.into_iter().unzip())
    }

    /// Apply a validated assignment, record it, and return its change
    /// record. `spikes` is sorted ascending; `labels` runs parallel to it.
    fn apply(&mut self, description: &str, spikes: Vec<SpikeId>, labels: Vec<ClusterId>) -> ChangeRecord {
        let old_labels: Vec<ClusterId> = spikes
            .iter()
            .map(|&spike| self.spike_clusters[spike])
            .collect();
        let record = ChangeRecord::from_assignment(description, &spikes, &old_labels, &labels);

        self.rewrite(&spikes, &labels);
        debug!(
            "{}: {} spikes, added {:?}, deleted {:?}",
            description,
            record.spikes.len(),
            record.added,
            record.deleted
        );

        let entry = Assignment {
            spikes,
            labels,
            record: record.clone(),
        };
        if let Some(evicted) = self.history.add(entry) {
            // The oldest entry fell off the bounded stack; fold it into
            // the base snapshot so replay still reproduces every retained
            // state.
            for (&spike, &cluster) in evicted.spikes.iter().zip(&evicted.labels) {
                self.base_clusters[spike] = cluster;
            }
        }
        debug_assert!(self.check_consistency().is_ok());
        record
    }

    /// Write the delta into the label array and patch the inverse index.
    ///
    /// Affected source clusters are always consumed whole (merge takes
    /// full clusters, split/assign relabel remainders), so dropping their
    /// index entries wholesale is exact.
    fn rewrite(&mut self, spikes: &[SpikeId], labels: &[ClusterId]) {
        for &spike in spikes {
            self.spikes_per_cluster.remove(&self.spike_clusters[spike]);
        }
        for (&spike, &cluster) in spikes.iter().zip(labels) {
            self.spike_clusters[spike] = cluster;
            self.spikes_per_cluster.entry(cluster).or_default().push(spike);
            if cluster >= self.next_cluster_id {
                self.next_cluster_id = cluster + 1;
            }
        }
        // Spikes arrive in ascending order, but a target cluster that
        // already held spikes needs its list re-sorted after the appends.
        let touched: BTreeSet<ClusterId> = labels.iter().copied().collect();
        for cluster in touched {
            if let Some(list) = self.spikes_per_cluster.get_mut(&cluster) {
                list.sort_unstable();
            }
        }
    }

    // ── Undo / redo ────────────────────────────────────────────────────────

    /// Undo the last operation.
    ///
    /// Restores the base snapshot and replays the remaining history, then
    /// returns the undone operation's record read in reverse (`added` and
    /// `deleted` swapped, descendant pairs flipped). Returns `None`
    /// without touching state when there is nothing to undo. The id
    /// high-water mark never moves back: undone ids stay retired.
    pub fn undo(&mut self) -> Option<ChangeRecord> {
        self.history.back()?;

        let mut labels = self.base_clusters.clone();
        for entry in self.history.iter() {
            for (&spike, &cluster) in entry.spikes.iter().zip(&entry.labels) {
                labels[spike] = cluster;
            }
        }
        self.spike_clusters = labels;
        self.spikes_per_cluster = Self::index_of(&self.spike_clusters);

        let record = self
            .history
            .redo_target()
            .map(|entry| entry.record.reversed());
        if let Some(ref record) = record {
            debug!(
                "undo: {} reverted ({} spikes)",
                record.description,
                record.spikes.len()
            );
        }
        debug_assert!(self.check_consistency().is_ok());
        record
    }

    /// Redo the next undone operation.
    ///
    /// Re-applies the stored delta, minting nothing: the ids recorded at
    /// the original call are reused bit for bit. Returns `None` without
    /// touching state when there is nothing to redo.
    pub fn redo(&mut self) -> Option<ChangeRecord> {
        let (spikes, labels, record) = {
            let entry = self.history.forward()?;
            (entry.spikes.clone(), entry.labels.clone(), entry.record.clone())
        };
        self.rewrite(&spikes, &labels);
        debug!(
            "redo: {} re-applied ({} spikes)",
            record.description,
            record.spikes.len()
        );
        debug_assert!(self.check_consistency().is_ok());
        Some(record)
    }

    /// Forget every recorded operation and restore the construction-time
    /// labels. The id high-water mark re-derives from the restored array,
    /// so the engine is indistinguishable from a freshly built one.
    pub fn reset(&mut self) {
        self.spike_clusters = self.initial_clusters.clone();
        self.base_clusters = self.initial_clusters.clone();
        self.spikes_per_cluster = Self::index_of(&self.spike_clusters);
        self.next_cluster_id = self
            .spikes_per_cluster
            .keys()
            .next_back()
            .map_or(0, |&cluster| cluster + 1);
        let capacity = self.history.capacity();
        self.history = match capacity {
            Some(capacity) => History::bounded(Assignment::default(), capacity),
            None => History::new(Assignment::default()),
        };
        debug!("reset: history cleared, {} clusters", self.n_clusters());
    }

    // ── Consistency ────────────────────────────────────────────────────────

    /// Verify that the inverse index is an exact partition matching the
    /// label array and that every present id sits below the high-water
    /// mark. A violation is fatal and must never be caught or retried.
    pub fn check_consistency(&self) -> Result<(), ClusterError> {
        let mut covered = 0usize;
        for (&cluster, spikes) in &self.spikes_per_cluster {
            if spikes.is_empty() {
                return Err(ClusterError::Inconsistent(format!(
                    "cluster {cluster} has an empty spike list"
                )));
            }
            if cluster >= self.next_cluster_id {
                return Err(ClusterError::Inconsistent(format!(
                    "cluster {cluster} at or above the id high-water mark {}",
                    self.next_cluster_id
                )));
            }
            let mut previous: Option<SpikeId> = None;
            for &spike in spikes {
                if spike >= self.n_spikes() || self.spike_clusters[spike] != cluster {
                    return Err(ClusterError::Inconsistent(format!(
                        "spike {spike} is not labeled {cluster}"
                    )));
                }
                if previous.is_some_and(|p| p >= spike) {
                    return Err(ClusterError::Inconsistent(format!(
                        "spike list of cluster {cluster} is not strictly ascending"
                    )));
                }
                previous = Some(spike);
                covered += 1;
            }
        }
        if covered != self.n_spikes() {
            return Err(ClusterError::Inconsistent(format!(
                "inverse index covers {covered} of {} spikes",
                self.n_spikes()
            )));
        }
        Ok(())
    }
}

impl core::fmt::Debug for ClusterLabeling {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClusterLabeling")
            .field("n_spikes", &self.n_spikes())
            .field("n_clusters", &self.n_clusters())
            .field("next_cluster_id", &self.next_cluster_id)
            .field("history_len", &self.history.len())
            .finish()
    }
}
