//! Relative entropy of a net hierarchy against a flat baseline
//!
//! `total_p` is the structured encoding cost of the root (see
//! [`crate::tree_bits`]); `total_q` is `log2(i) * i` where `i` is the
//! sequence paired directly at the root, ignoring all nesting.

use crate::config::ScoringSettings;
use crate::error::{DegenerateKind, Result, TreeStatsError};
use crate::graph::{GraphProvider, NetId};
use crate::logging::MetricsCollector;
use crate::sequence::total_contained_sequence;
use crate::tree_bits::{DegeneratePolicy, TreeBitScorer};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The statistic triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeEntropy {
    pub total_p: f64,
    pub total_q: f64,
    pub entropy: f64,
}

impl RelativeEntropy {
    /// Combine the two totals, enforcing `total_p >= total_q` when both are
    /// finite.
    pub fn from_totals(total_p: f64, total_q: f64) -> Result<Self> {
        if total_p.is_finite() && total_q.is_finite() && total_p < total_q {
            return Err(TreeStatsError::InvariantViolation { total_p, total_q });
        }
        Ok(Self {
            total_p,
            total_q,
            entropy: total_p - total_q,
        })
    }

    pub fn is_finite(&self) -> bool {
        self.total_p.is_finite() && self.total_q.is_finite()
    }
}

/// Computes [`RelativeEntropy`] with the configured scoring settings
pub struct EntropyCalculator<'m> {
    settings: ScoringSettings,
    metrics: Option<&'m MetricsCollector>,
}

impl<'m> EntropyCalculator<'m> {
    pub fn new(settings: ScoringSettings) -> Self {
        Self {
            settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'m MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn report<G>(&self, graph: &G, root: NetId) -> Result<RelativeEntropy>
    where
        G: GraphProvider + ?Sized,
    {
        let mut scorer = TreeBitScorer::from_settings(&self.settings);
        if let Some(metrics) = self.metrics {
            scorer = scorer.with_metrics(metrics);
        }

        let total_p = if self.settings.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.settings.num_threads)
                .build()?;
            let dispatch = tracing::dispatcher::get_default(|current| current.clone());
            pool.install(|| {
                tracing::dispatcher::with_default(&dispatch, || scorer.tree_bits(graph, root, 0.0))
            })?
        } else {
            scorer.tree_bits(graph, root, 0.0)?
        };

        let total_q = baseline_bits(graph, root, self.settings.degenerate_policy)?;
        debug!(net = %root, total_p, total_q, "computed tree and baseline bits");
        RelativeEntropy::from_totals(total_p, total_q)
    }
}

/// Flat encoding cost `log2(i) * i` of the sequence paired directly at `net`
pub fn baseline_bits<G>(graph: &G, net: NetId, policy: DegeneratePolicy) -> Result<f64>
where
    G: GraphProvider + ?Sized,
{
    let i = total_contained_sequence(graph, net)?;
    if i == 0.0 && policy == DegeneratePolicy::Reject {
        return Err(TreeStatsError::degenerate(net, DegenerateKind::BaselineSequence));
    }
    Ok(i.log2() * i)
}

/// Sequential report under the reject policy
pub fn relative_entropy<G>(graph: &G, root: NetId) -> Result<RelativeEntropy>
where
    G: GraphProvider + ?Sized,
{
    EntropyCalculator::new(ScoringSettings::default()).report(graph, root)
}
