//! Execution strategies and the fallback chain.
//!
//! A report is answered by one of two strategies:
//!
//! - [`ExecutionStrategy::PushDown`] compiles the spec into a single
//!   parameterized aggregate query and lets the source run it.
//! - [`ExecutionStrategy::PullAndAggregate`] fetches filtered raw records and
//!   groups them in-process.
//!
//! [`run_chain`] tries the configured strategies in order. Source errors from
//! any but the last strategy are logged and the next one is tried; the last
//! strategy's error propagates unchanged.

mod pull;
mod push_down;

pub use push_down::build_query;

use tracing::{debug, warn};

use crate::error::EngineResult;
use crate::source::{RecordSource, Table};
use crate::spec::{ResolvedSpec, Row};

pub use crate::spec::ExecutionStrategy;

/// Strategy order used when none is configured.
pub const DEFAULT_STRATEGIES: [ExecutionStrategy; 2] = [
    ExecutionStrategy::PushDown,
    ExecutionStrategy::PullAndAggregate,
];

impl ExecutionStrategy {
    /// Whether `source` can run this strategy at all.
    pub fn is_supported_by(&self, source: &dyn RecordSource) -> bool {
        match self {
            ExecutionStrategy::PushDown => source.push_down_dialect().is_some(),
            ExecutionStrategy::PullAndAggregate => true,
        }
    }

    /// Produce unsorted, unpaginated rows for `spec` from `table`.
    pub async fn run(
        &self,
        source: &dyn RecordSource,
        spec: &ResolvedSpec,
        table: Table,
    ) -> EngineResult<Vec<Row>> {
        match self {
            ExecutionStrategy::PushDown => Ok(push_down::run(source, spec, table).await?),
            ExecutionStrategy::PullAndAggregate => pull::run(source, spec, table).await,
        }
    }
}

/// Strategies from `configured` that `source` supports, falling back to
/// pull-and-aggregate when none remain.
pub fn applicable(
    configured: &[ExecutionStrategy],
    source: &dyn RecordSource,
) -> Vec<ExecutionStrategy> {
    let chain: Vec<_> = configured
        .iter()
        .copied()
        .filter(|s| s.is_supported_by(source))
        .collect();
    if chain.is_empty() {
        vec![ExecutionStrategy::PullAndAggregate]
    } else {
        chain
    }
}

/// Run `chain` in order until one strategy succeeds.
///
/// Returns the rows and the strategy that produced them.
pub async fn run_chain(
    chain: &[ExecutionStrategy],
    source: &dyn RecordSource,
    spec: &ResolvedSpec,
    table: Table,
) -> EngineResult<(Vec<Row>, ExecutionStrategy)> {
    let last = chain.len().saturating_sub(1);
    let mut i = 0;
    loop {
        let strategy = chain
            .get(i)
            .copied()
            .unwrap_or(ExecutionStrategy::PullAndAggregate);
        debug!(?strategy, table = %table, source = source.name(), "running strategy");
        match strategy.run(source, spec, table).await {
            Ok(rows) => return Ok((rows, strategy)),
            Err(e) if e.is_source_error() && i < last => {
                warn!(?strategy, error = %e, "strategy failed, falling back");
                i += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
