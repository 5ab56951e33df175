//! Logical backing tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical record collection that can answer a report.
///
/// Declaration order is resolution priority: order-level records are the
/// richest, pre-aggregated daily metrics the poorest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Orders,
    Products,
    Customers,
    DailyMetrics,
}

impl Table {
    /// All tables in priority order.
    pub const PRIORITY: [Table; 4] = [
        Table::Orders,
        Table::Products,
        Table::Customers,
        Table::DailyMetrics,
    ];

    /// Physical table name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Orders => "orders",
            Table::Products => "products",
            Table::Customers => "customers",
            Table::DailyMetrics => "daily_metrics",
        }
    }

    /// Column that date ranges are applied to.
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            Table::DailyMetrics => "date",
            _ => "created_at",
        }
    }

    pub fn from_name(name: &str) -> Option<Table> {
        Self::PRIORITY.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
