//! Recursive bit cost of a net hierarchy
//!
//! Each level of nesting charges `log2(adjacency component number)` bits of
//! addressing to every base encoded beneath it. Leaves pay for their paired
//! sequence; internal nets pay for their atoms and add up their children.
//!
//! Scoring recurses once per nesting level, so nesting depth is limited by
//! the stack of the scoring thread. Rayon workers default to 2 MiB stacks;
//! very deep nesting chains need a larger `RUST_MIN_STACK`.

use crate::config::ScoringSettings;
use crate::error::{Corruption, DegenerateKind, Result, TreeStatsError};
use crate::graph::{AdjacencyComponent, GraphProvider, Net, NetId};
use crate::logging::MetricsCollector;
use crate::sequence::total_contained_sequence;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Counter names recorded while scoring
pub mod counters {
    pub const NETS_VISITED: &str = "nets_visited";
    pub const LEAF_NETS: &str = "leaf_nets";
    pub const INTERNAL_NETS: &str = "internal_nets";
    pub const ATOMS: &str = "atoms";
}

/// What to do when a logarithm argument is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Fail with [`TreeStatsError::DegenerateInput`]
    #[default]
    Reject,
    /// Evaluate in IEEE arithmetic; a zero size yields NaN
    Propagate,
}

impl DegeneratePolicy {
    /// `(log2(size) + path_bit_score) * size`, subject to the policy
    pub fn weighted_bits(
        self,
        size: f64,
        path_bit_score: f64,
        net: NetId,
        kind: DegenerateKind,
    ) -> Result<f64> {
        if size == 0.0 && self == DegeneratePolicy::Reject {
            return Err(TreeStatsError::degenerate(net, kind));
        }
        Ok((size.log2() + path_bit_score) * size)
    }
}

/// Total `length * instance_number` over the atoms of `net`
pub fn atom_aggregate(net: &Net, id: NetId) -> Result<u64> {
    net.atoms.iter().try_fold(0u64, |total, atom| {
        atom.length
            .checked_mul(atom.instance_number)
            .and_then(|size| total.checked_add(size))
            .ok_or_else(|| Corruption::AtomSizeOverflow(id).into())
    })
}

/// Scores a net and everything nested beneath it
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeBitScorer<'m> {
    policy: DegeneratePolicy,
    parallel: bool,
    metrics: Option<&'m MetricsCollector>,
}

impl<'m> TreeBitScorer<'m> {
    pub fn new(policy: DegeneratePolicy) -> Self {
        Self {
            policy,
            parallel: false,
            metrics: None,
        }
    }

    pub fn from_settings(settings: &ScoringSettings) -> Self {
        Self::new(settings.degenerate_policy).parallel(settings.parallel)
    }

    /// Fan sibling subtrees out over the current rayon pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_metrics(mut self, metrics: &'m MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Bits needed to encode `net` given `path_bit_score` bits spent
    /// reaching it from the root.
    pub fn tree_bits<G>(&self, graph: &G, id: NetId, path_bit_score: f64) -> Result<f64>
    where
        G: GraphProvider + ?Sized,
    {
        let net = graph.require_net(id)?;
        self.count(counters::NETS_VISITED, 1);

        let component_number = net.adjacency_component_number();
        if component_number == 0 {
            self.count(counters::LEAF_NETS, 1);
            let i = total_contained_sequence(graph, id)?;
            return self
                .policy
                .weighted_bits(i, path_bit_score, id, DegenerateKind::LeafSequence);
        }

        self.count(counters::INTERNAL_NETS, 1);
        let following_path_bit_score = (component_number as f64).log2() + path_bit_score;
        trace!(net = %id, component_number, following_path_bit_score, "scoring internal net");

        let child_bits = if self.parallel && component_number > 1 {
            self.par_child_bits(graph, &net.adjacency_components, following_path_bit_score)?
        } else {
            let mut total = 0.0;
            for component in &net.adjacency_components {
                total += self.tree_bits(graph, component.nested_net, following_path_bit_score)?;
            }
            total
        };

        self.count(counters::ATOMS, net.atoms.len() as u64);
        let total_sequence_size = atom_aggregate(net, id)? as f64;
        let own_bits = self.policy.weighted_bits(
            total_sequence_size,
            path_bit_score,
            id,
            DegenerateKind::AtomAggregate,
        )?;
        Ok(child_bits + own_bits)
    }

    /// Children are scored concurrently but summed in provider order, so the
    /// result and the first reported error match the sequential walk.
    fn par_child_bits<G>(
        &self,
        graph: &G,
        components: &[AdjacencyComponent],
        following_path_bit_score: f64,
    ) -> Result<f64>
    where
        G: GraphProvider + ?Sized,
    {
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());
        let bits = components
            .par_iter()
            .map(|component| {
                tracing::dispatcher::with_default(&dispatch, || {
                    self.tree_bits(graph, component.nested_net, following_path_bit_score)
                })
            })
            .collect::<Vec<Result<f64>>>();
        bits.into_iter()
            .try_fold(0.0, |total, child| -> Result<f64> { Ok(total + child?) })
    }

    fn count(&self, name: &str, value: u64) {
        if let Some(metrics) = self.metrics {
            metrics.inc_counter_by(name, value);
        }
    }
}

/// Sequential scoring under the reject policy
pub fn tree_bits<G>(graph: &G, net: NetId, path_bit_score: f64) -> Result<f64>
where
    G: GraphProvider + ?Sized,
{
    TreeBitScorer::default().tree_bits(graph, net, path_bit_score)
}
