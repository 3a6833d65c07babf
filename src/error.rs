//! Error handling for treestats
//!
//! Every failure of the statistic is terminal: the computation is a pure
//! function of an immutable graph, so nothing here is retried. Structural
//! defects of the input graph are grouped under [`Corruption`] and surface as
//! [`TreeStatsError::GraphCorruption`].

use crate::graph::{EndId, InstanceId, NetId};
use rayon::ThreadPoolBuildError;
use thiserror::Error;

/// Structural defects of a net graph. The statistic depends on these never
/// occurring, so none of them is repaired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Corruption {
    #[error("adjacency of end instance {instance} points at {target}, whose strand flag is not set")]
    StrandMismatch { instance: InstanceId, target: InstanceId },

    #[error("end instance {instance} pairs with {target} over a negative gap of {gap}")]
    NegativeGap {
        instance: InstanceId,
        target: InstanceId,
        gap: i64,
    },

    #[error("end instance {0} has no adjacency")]
    MissingAdjacency(InstanceId),

    #[error("reference to unknown net {0}")]
    DanglingNet(NetId),

    #[error("reference to unknown end {0}")]
    DanglingEnd(EndId),

    #[error("reference to unknown end instance {0}")]
    DanglingInstance(InstanceId),

    #[error("net {0} is nested in more than one adjacency component")]
    MultipleParents(NetId),

    #[error("net {0} is nested inside itself")]
    NestingCycle(NetId),

    #[error("net name '{0}' is used more than once")]
    DuplicateNetName(String),

    #[error("atom sequence total of net {0} overflows")]
    AtomSizeOverflow(NetId),
}

/// Which logarithm argument turned out to be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateKind {
    /// A leaf net contains no paired sequence.
    LeafSequence,
    /// An internal net has an empty atom aggregate.
    AtomAggregate,
    /// The root contains no directly paired sequence for the flat baseline.
    BaselineSequence,
}

impl std::fmt::Display for DegenerateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegenerateKind::LeafSequence => write!(f, "leaf contained sequence"),
            DegenerateKind::AtomAggregate => write!(f, "atom aggregate"),
            DegenerateKind::BaselineSequence => write!(f, "baseline contained sequence"),
        }
    }
}

/// Error type for all treestats operations
#[derive(Error, Debug)]
pub enum TreeStatsError {
    /// The input graph violates a structural precondition
    #[error("graph corruption: {0}")]
    GraphCorruption(#[from] Corruption),

    /// A zero-sized logarithm argument under the reject policy
    #[error("degenerate input at net {net}: {kind} is zero")]
    DegenerateInput { net: NetId, kind: DegenerateKind },

    /// The structured cost came out below the flat baseline
    #[error("invariant violated: totalP {total_p} is below totalQ {total_q}")]
    InvariantViolation { total_p: f64, total_q: f64 },

    /// No net with the requested name in the store
    #[error("net '{0}' not found in net disk")]
    NetNotFound(String),

    /// I/O errors (store, output file, log directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of a net disk or report
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse error for command line or environment values
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Thread pool build error: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

impl TreeStatsError {
    /// Create a DegenerateInput error
    pub fn degenerate(net: NetId, kind: DegenerateKind) -> Self {
        Self::DegenerateInput { net, kind }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// True for the errors that describe a malformed input graph
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::GraphCorruption(_))
    }
}

/// Result type alias for treestats operations
pub type Result<T> = std::result::Result<T, TreeStatsError>;
