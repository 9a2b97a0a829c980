//! Error taxonomy for the labeling engine and its collaborators.
//!
//! Every fallible operation validates its arguments strictly before any
//! mutation, so a returned error guarantees the session state is
//! byte-identical to its pre-call state. There is no partial success.
//!
//! Running out of history on undo/redo is not an error; those paths return
//! `None` instead.

use alloc::string::String;

use crate::update::{ClusterId, SpikeId};

/// Errors surfaced by [`ClusterLabeling`], [`ClusterMetadata`] and the
/// cluster stores.
///
/// The first three variants are expected to be shown to the operator as
/// rejected actions. [`ClusterError::Inconsistent`] is an internal
/// invariant violation: always fatal, never caught or retried.
///
/// [`ClusterLabeling`]: crate::labeling::ClusterLabeling
/// [`ClusterMetadata`]: crate::metadata::ClusterMetadata
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// Malformed call arguments: wrong shape, empty selection, duplicate
    /// operands, or a relative-id slice of the wrong length.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// An operand names a cluster id that is not currently present.
    #[error("unknown cluster: {0}")]
    UnknownCluster(ClusterId),

    /// An operand names a spike index outside `[0, n_spikes)`.
    #[error("spike index {spike} out of range (n_spikes = {n_spikes})")]
    InvalidSpikeId {
        /// The offending spike index.
        spike: SpikeId,
        /// Number of spikes in the session.
        n_spikes: usize,
    },

    /// The derived inverse index diverged from the label array, or two
    /// store tiers disagree about which clusters exist.
    #[error("consistency violation: {0}")]
    Inconsistent(String),
}
