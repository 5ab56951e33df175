//! Source resolution: which table answers a report.
//!
//! Tables are tried in [`Table::PRIORITY`] order and the first one owning any
//! touched field wins. A spec mixing fields from several domains therefore
//! resolves to the highest-priority table, and fields that table does not
//! carry come back as nulls. Those are reported in
//! [`Resolution::unresolved`].

use std::collections::BTreeSet;

use super::Table;
use crate::spec::FieldName;

/// Outcome of source resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub table: Table,
    /// Touched fields the chosen table does not carry.
    pub unresolved: Vec<FieldName>,
}

/// Pick the backing table for a set of touched fields.
pub fn resolve(fields: &BTreeSet<FieldName>) -> Resolution {
    let table = Table::PRIORITY
        .into_iter()
        .find(|table| fields.iter().any(|f| f.tables().contains(table)))
        .unwrap_or(Table::Orders);

    let unresolved = fields
        .iter()
        .copied()
        .filter(|f| !f.tables().contains(&table))
        .collect();

    Resolution { table, unresolved }
}
