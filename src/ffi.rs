//! Python FFI bindings via PyO3.
//!
//! Exposes the labeling engine, change records, and an integer-valued
//! metadata table to Python. Metadata values are fixed to `i64` across the
//! FFI boundary and defaults are constants; use the Rust API directly for
//! custom value types or computed default functions.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from spikesort_core import Clustering, ClusterMetadata
//!
//! clustering = Clustering([2, 5, 3, 2, 7, 5, 2])
//! up = clustering.merge([2, 3])
//! assert up.added == [8]
//! assert up.descendants == [(2, 8), (3, 8)]
//!
//! clustering.undo()
//! assert clustering.spike_clusters == [2, 5, 3, 2, 7, 5, 2]
//!
//! metadata = ClusterMetadata()
//! metadata.register_default("group", 3)
//! metadata.set("group", [5], 1)
//! ```

use std::collections::BTreeMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::error::ClusterError;
use crate::labeling::ClusterLabeling;
use crate::metadata::ClusterMetadata as RustClusterMetadata;
use crate::update::ChangeRecord as RustChangeRecord;

fn to_py_err(err: ClusterError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

// ── ChangeRecord ─────────────────────────────────────────────────────────────

/// Immutable description of one labeling or metadata transition.
#[pyclass(frozen)]
pub struct ChangeRecord {
    inner: RustChangeRecord,
}

#[pymethods]
impl ChangeRecord {
    /// Operation tag: `merge`, `split`, `assign`, or `metadata_<field>`.
    #[getter]
    fn description(&self) -> &str {
        &self.inner.description
    }

    /// Ascending indices of every spike whose label changed.
    #[getter]
    fn spikes(&self) -> Vec<usize> {
        self.inner.spikes.clone()
    }

    /// Cluster ids created by the transition, ascending.
    #[getter]
    fn added(&self) -> Vec<u64> {
        self.inner.added.clone()
    }

    /// Cluster ids removed by the transition, ascending.
    #[getter]
    fn deleted(&self) -> Vec<u64> {
        self.inner.deleted.clone()
    }

    /// `(source, result)` lineage pairs, sorted.
    #[getter]
    fn descendants(&self) -> Vec<(u64, u64)> {
        self.inner.descendants.clone()
    }

    /// Clusters whose metadata changed.
    #[getter]
    fn metadata_changed(&self) -> Vec<u64> {
        self.inner.metadata_changed.clone()
    }

    /// Python repr string.
    fn __repr__(&self) -> String {
        format!(
            "ChangeRecord(description='{}', spikes={:?}, added={:?}, deleted={:?})",
            self.inner.description, self.inner.spikes, self.inner.added, self.inner.deleted
        )
    }
}

impl From<RustChangeRecord> for ChangeRecord {
    fn from(inner: RustChangeRecord) -> Self {
        Self { inner }
    }
}

// ── Clustering ───────────────────────────────────────────────────────────────

/// Spike-to-cluster labeling session with undo/redo.
#[pyclass]
pub struct Clustering {
    inner: ClusterLabeling,
}

#[pymethods]
impl Clustering {
    /// Build a session over the initial per-spike label sequence.
    #[new]
    fn new(spike_clusters: Vec<u64>) -> Self {
        Self {
            inner: ClusterLabeling::new(spike_clusters),
        }
    }

    /// Merge two or more clusters into `to`, or into a fresh id.
    #[pyo3(signature = (cluster_ids, to=None))]
    fn merge(&mut self, cluster_ids: Vec<u64>, to: Option<u64>) -> PyResult<ChangeRecord> {
        self.inner
            .merge(&cluster_ids, to)
            .map(ChangeRecord::from)
            .map_err(to_py_err)
    }

    /// Move the named spikes into new clusters.
    #[pyo3(signature = (spike_ids, cluster_ids_rel=None))]
    fn split(
        &mut self,
        spike_ids: Vec<usize>,
        cluster_ids_rel: Option<Vec<u64>>,
    ) -> PyResult<ChangeRecord> {
        self.inner
            .split(&spike_ids, cluster_ids_rel.as_deref())
            .map(ChangeRecord::from)
            .map_err(to_py_err)
    }

    /// The general relabeling primitive merge and split reduce to.
    #[pyo3(signature = (spike_ids, cluster_ids_rel=None))]
    fn assign(
        &mut self,
        spike_ids: Vec<usize>,
        cluster_ids_rel: Option<Vec<u64>>,
    ) -> PyResult<ChangeRecord> {
        self.inner
            .assign(&spike_ids, cluster_ids_rel.as_deref())
            .map(ChangeRecord::from)
            .map_err(to_py_err)
    }

    /// Undo the last operation; `None` when there is nothing to undo.
    fn undo(&mut self) -> Option<ChangeRecord> {
        self.inner.undo().map(ChangeRecord::from)
    }

    /// Redo the next undone operation; `None` when there is nothing to
    /// redo.
    fn redo(&mut self) -> Option<ChangeRecord> {
        self.inner.redo().map(ChangeRecord::from)
    }

    /// Restore the construction-time labels and clear the history.
    fn reset(&mut self) {
        self.inner.reset();
    }

    /// The id the next minting operation will use.
    fn new_cluster_id(&self) -> u64 {
        self.inner.new_cluster_id()
    }

    /// Ascending spike indices currently labeled with any of the ids.
    fn spikes_in_clusters(&self, cluster_ids: Vec<u64>) -> Vec<usize> {
        self.inner.spikes_in_clusters(&cluster_ids)
    }

    /// Current label per spike.
    #[getter]
    fn spike_clusters(&self) -> Vec<u64> {
        self.inner.spike_clusters().to_vec()
    }

    /// Ids of the clusters currently present, ascending.
    #[getter]
    fn cluster_ids(&self) -> Vec<u64> {
        self.inner.cluster_ids()
    }

    /// Number of clusters currently present.
    #[getter]
    fn n_clusters(&self) -> usize {
        self.inner.n_clusters()
    }

    /// Number of spikes in the session.
    #[getter]
    fn n_spikes(&self) -> usize {
        self.inner.n_spikes()
    }

    /// Spike count per cluster, as a dict.
    #[getter]
    fn cluster_counts(&self) -> BTreeMap<u64, usize> {
        self.inner.cluster_counts().into_iter().collect()
    }

    /// Python repr string.
    fn __repr__(&self) -> String {
        format!(
            "Clustering(n_spikes={}, n_clusters={})",
            self.inner.n_spikes(),
            self.inner.n_clusters()
        )
    }
}

// ── ClusterMetadata ──────────────────────────────────────────────────────────

/// Integer-valued per-cluster metadata table with undo/redo.
#[pyclass]
pub struct ClusterMetadata {
    inner: RustClusterMetadata<i64>,
}

#[pymethods]
impl ClusterMetadata {
    /// Create an empty table.
    #[new]
    fn new() -> Self {
        Self {
            inner: RustClusterMetadata::new(),
        }
    }

    /// Register a constant default for `field`, returned for clusters
    /// with no explicit value.
    fn register_default(&mut self, field: &str, value: i64) {
        self.inner.register(field, move |_| value);
    }

    /// Value of `field` for one cluster, or `None`.
    fn get(&self, field: &str, cluster: u64) -> Option<i64> {
        self.inner.get(field, cluster)
    }

    /// Values of `field` for several clusters, in input order.
    fn get_many(&self, field: &str, clusters: Vec<u64>) -> Vec<Option<i64>> {
        self.inner.get_many(field, &clusters)
    }

    /// Write `value` for every cluster named.
    fn set(&mut self, field: &str, clusters: Vec<u64>, value: i64) -> ChangeRecord {
        ChangeRecord::from(self.inner.set(field, &clusters, value))
    }

    /// Undo the last write; `None` when there is nothing to undo.
    fn undo(&mut self) -> Option<ChangeRecord> {
        self.inner.undo().map(ChangeRecord::from)
    }

    /// Redo the next undone write; `None` when there is nothing to redo.
    fn redo(&mut self) -> Option<ChangeRecord> {
        self.inner.redo().map(ChangeRecord::from)
    }
}

// ── Module entry point ───────────────────────────────────────────────────────

/// Spike-cluster labeling Python bindings.
///
/// Metadata values are fixed to integers across this boundary; use the
/// Rust API directly for custom value types.
#[pymodule]
pub fn spikesort_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ChangeRecord>()?;
    m.add_class::<Clustering>()?;
    m.add_class::<ClusterMetadata>()?;
    Ok(())
}
