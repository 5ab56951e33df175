//! Pull-and-aggregate: fetch raw records, aggregate in-process.

use tracing::debug;

use crate::aggregate::group_and_aggregate;
use crate::error::EngineResult;
use crate::source::{RecordSource, Table};
use crate::spec::{ResolvedSpec, Row};

pub(super) async fn run(
    source: &dyn RecordSource,
    spec: &ResolvedSpec,
    table: Table,
) -> EngineResult<Vec<Row>> {
    let records = source
        .fetch(table, &spec.filters, spec.date_range.as_ref())
        .await?;
    debug!(table = %table, records = records.len(), "fetched records");
    group_and_aggregate(&records, spec)
}
