//! Relative entropy statistics over nested cactus net hierarchies.
//!
//! The structured cost of a net tree ([`tree_bits`]) charges every base
//! `log2` of the branching factor at each level above it, on top of the
//! `log2` of the aggregate sequence at its level. The flat baseline
//! ([`entropy::baseline_bits`]) encodes the root's directly paired sequence
//! with no structure. Their difference is the relative entropy.

pub mod config;
pub mod entropy;
pub mod error;
pub mod graph;
pub mod logging;
pub mod net_disk;
pub mod output;
pub mod pipeline;
pub mod sequence;
pub mod tree_bits;

pub use entropy::{relative_entropy, EntropyCalculator, RelativeEntropy};
pub use error::{Corruption, DegenerateKind, Result, TreeStatsError};
pub use graph::{GraphProvider, NetGraph, NetGraphBuilder, NetId};
pub use sequence::total_contained_sequence;
pub use tree_bits::{tree_bits, DegeneratePolicy, TreeBitScorer};
