//! Approximate neighbor-joining phylogenetic tree construction from
//! aligned sequences.
//!
//! Instead of materializing an O(N^2) distance matrix, every node carries
//! a positional base-frequency profile and pairwise distances are
//! computed from profiles on demand. A single running total profile
//! stands in for per-node sums over all other nodes, and per-node
//! top-hits lists bound the candidate search at each join. The resulting
//! pipeline is:
//!
//! 1. build one profile per input sequence ([`Tree::from_records`]),
//! 2. seed top-hits lists ([`Tree::seed_top_hits`]),
//! 3. greedily join the closest pair until one node remains
//!    ([`Tree::construct_initial_topology`]),
//! 4. refine the topology with nearest-neighbor interchanges, optionally
//!    gated and scored by column resampling
//!    ([`Tree::nearest_neighbor_interchange`], [`Tree::estimate_support`]),
//! 5. assign branch lengths ([`Tree::calculate_branch_lengths`]),
//! 6. serialize to Newick ([`newick::write`]).
//!
//! [`build_tree`] runs the whole pipeline:
//!
//! ```
//! use fastnj::{build_tree, BuildConfig, SequenceRecord};
//!
//! let records = vec![
//!     SequenceRecord::new("A", "ATCGCG"),
//!     SequenceRecord::new("B", "ATCGAA"),
//!     SequenceRecord::new("C", "ATCGGG"),
//! ];
//! let newick = build_tree(&records, &BuildConfig::default()).unwrap();
//! assert!(newick.ends_with(';'));
//! ```
//!
//! All randomness (bootstrap column resampling) comes from a seeded
//! xorshift generator, so a given input and configuration always produce
//! the same tree.

pub mod config;
pub mod distance;
pub mod error;
pub mod newick;
pub mod profile;
pub mod tree;

mod build;
mod lengths;
mod nni;
mod tophits;

pub use config::{BuildConfig, Diagnostics, NoopDiagnostics};
pub use error::{FastNjError, Result};
pub use nni::Xorshift64;
pub use profile::Profile;
pub use tree::{Node, NodeId, Tree};

/// A named, aligned input sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceRecord {
    pub name: String,
    pub alignment: String,
}

impl SequenceRecord {
    pub fn new(name: impl Into<String>, alignment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alignment: alignment.into(),
        }
    }
}

/// Run the full construction pipeline and return the tree.
///
/// Support values are only estimated when `config.bootstrap_rounds` is
/// nonzero.
pub fn infer_tree(
    records: &[SequenceRecord],
    config: &BuildConfig,
    diag: &dyn Diagnostics,
) -> Result<Tree> {
    let mut tree = Tree::from_records(records, config)?;
    diag.event(&format!("profiled {} sequences", records.len()));
    tree.construct_initial_topology(config, diag)?;
    tree.nearest_neighbor_interchange(config, diag)?;
    if config.bootstrap_rounds > 0 {
        tree.estimate_support(config, diag)?;
    }
    tree.calculate_branch_lengths()?;
    Ok(tree)
}

/// Build a tree from aligned sequences and serialize it to Newick.
pub fn build_tree(records: &[SequenceRecord], config: &BuildConfig) -> Result<String> {
    build_tree_with(records, config, &NoopDiagnostics)
}

/// [`build_tree`] with a diagnostics sink receiving phase events.
pub fn build_tree_with(
    records: &[SequenceRecord],
    config: &BuildConfig,
    diag: &dyn Diagnostics,
) -> Result<String> {
    let tree = infer_tree(records, config, diag)?;
    newick::write(&tree)
}
