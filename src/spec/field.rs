//! Typed field registry.
//!
//! [`FieldName`] is the closed set of fields a report may reference. Each
//! field knows where its value lives in a record, which tables own it, and
//! how to express it in SQL. Derived fields compute their value from other
//! columns, with identical formulas on the in-process and push-down paths.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::source::Table;
use crate::sql::expr::{coalesce, col, num, numeric, Expr, ExprExt};
use crate::sql::SqlError;
use crate::value::{as_number, resolve_path, Record};

/// Share of revenue assumed as cost when a record carries no explicit cost.
pub const ASSUMED_COST_RATIO: f64 = 0.6;

macro_rules! field_names {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// A field that can be referenced by a report.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum FieldName {
            $($variant),*
        }

        impl FieldName {
            pub const ALL: &'static [FieldName] = &[$(FieldName::$variant),*];

            /// Wire name, also used as the output column key.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(FieldName::$variant => $name),*
                }
            }
        }
    };
}

field_names! {
    // Order dimensions
    CreatedAt => "created_at",
    Status => "status",
    Category => "category",
    PaymentMethod => "payment_method",
    Region => "region",
    Channel => "channel",
    CustomerSegment => "customer_segment",
    // Product dimensions
    ProductName => "product_name",
    Brand => "brand",
    // Customer dimensions
    Country => "country",
    // Daily metrics dimension
    Date => "date",
    // Raw metrics
    Quantity => "quantity",
    Discount => "discount",
    CustomerId => "customer_id",
    Price => "price",
    Stock => "stock",
    LifetimeValue => "lifetime_value",
    Sessions => "sessions",
    ConversionRate => "conversion_rate",
    // Derived metrics
    Revenue => "revenue",
    Orders => "orders",
    AvgOrderValue => "avg_order_value",
    Cost => "cost",
    Profit => "profit",
    ProfitMargin => "profit_margin",
}

impl FieldName {
    /// Whether the value is computed from other columns.
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            FieldName::Revenue
                | FieldName::Orders
                | FieldName::AvgOrderValue
                | FieldName::Cost
                | FieldName::Profit
                | FieldName::ProfitMargin
        )
    }

    /// Record path for raw fields. Nested paths fall back to the flat name.
    pub fn path(&self) -> &'static str {
        match self {
            FieldName::CustomerSegment => "customer.segment",
            FieldName::ProductName => "name",
            other => other.as_str(),
        }
    }

    /// Physical column name for raw fields in tabular sources.
    pub fn column(&self) -> &'static str {
        self.as_str()
    }

    /// Tables that carry this field.
    pub fn tables(&self) -> &'static [Table] {
        use FieldName::*;
        match self {
            CreatedAt => &[Table::Orders, Table::Products, Table::Customers],
            Status | PaymentMethod | Channel | CustomerSegment | Discount | CustomerId => {
                &[Table::Orders]
            }
            Category => &[Table::Orders, Table::Products],
            Region => &[Table::Orders, Table::Customers],
            Quantity => &[Table::Orders],
            ProductName | Brand | Price | Stock => &[Table::Products],
            Country | LifetimeValue => &[Table::Customers],
            Date | Sessions | ConversionRate => &[Table::DailyMetrics],
            Revenue => &[Table::Orders, Table::DailyMetrics],
            Orders | AvgOrderValue | Cost | Profit | ProfitMargin => &[Table::Orders],
        }
    }

    /// Extract the field's value from a record.
    ///
    /// Raw fields return `None` when absent. Derived fields always produce a
    /// number.
    pub fn extract(&self, record: &Record) -> Option<Value> {
        match self {
            FieldName::Revenue | FieldName::AvgOrderValue => Some(json!(revenue(record))),
            // Every record is one order, whatever columns it carries.
            FieldName::Orders => Some(json!(1.0)),
            FieldName::Cost => Some(json!(cost(record))),
            FieldName::Profit => Some(json!(profit(record))),
            FieldName::ProfitMargin => {
                let revenue = revenue(record);
                let margin = if revenue == 0.0 {
                    0.0
                } else {
                    profit(record) / revenue * 100.0
                };
                Some(json!(margin))
            }
            _ => {
                let path = self.path();
                resolve_path(record, path)
                    .or_else(|| {
                        if path != self.as_str() {
                            record.get(self.as_str())
                        } else {
                            None
                        }
                    })
                    .cloned()
            }
        }
    }

    /// SQL expression for this field given the columns present in the table.
    ///
    /// Derived formulas only reference columns that exist and read them
    /// through [`numeric`]; a raw field whose column is missing is an
    /// [`SqlError::UnknownColumn`].
    pub fn sql_expr(&self, columns: &HashSet<String>) -> Result<Expr, SqlError> {
        let has = |c: &str| columns.contains(c);
        Ok(match self {
            FieldName::Revenue | FieldName::AvgOrderValue => revenue_sql(columns),
            FieldName::Orders => num(1.0),
            FieldName::Cost => cost_sql(columns),
            FieldName::Profit => revenue_sql(columns).sub(cost_sql(columns).paren()),
            FieldName::ProfitMargin => {
                let profit = revenue_sql(columns).sub(cost_sql(columns).paren()).paren();
                Expr::Case {
                    when: Box::new(revenue_sql(columns).eq(num(0.0))),
                    then: Box::new(num(0.0)),
                    otherwise: Box::new(profit.div(revenue_sql(columns)).mul(num(100.0))),
                }
            }
            _ => {
                let column = self.column();
                if !has(column) {
                    return Err(SqlError::UnknownColumn(column.to_string()));
                }
                col(column)
            }
        })
    }
}

fn number_at(record: &Record, key: &str) -> Option<f64> {
    record.get(key).and_then(as_number)
}

/// `total ?? amount ?? 0`, or the explicit pre-aggregated `revenue` column.
fn revenue(record: &Record) -> f64 {
    number_at(record, "total")
        .or_else(|| number_at(record, "amount"))
        .or_else(|| number_at(record, "revenue"))
        .unwrap_or(0.0)
}

fn cost(record: &Record) -> f64 {
    number_at(record, "cost").unwrap_or_else(|| revenue(record) * ASSUMED_COST_RATIO)
}

fn profit(record: &Record) -> f64 {
    revenue(record) - cost(record)
}

/// First numeric value among the present `candidates`, else 0.
fn first_number(columns: &HashSet<String>, candidates: &[&str]) -> Expr {
    let mut args: Vec<Expr> = candidates
        .iter()
        .filter(|c| columns.contains(**c))
        .map(|c| numeric(col(c)))
        .collect();
    if args.is_empty() {
        return num(0.0);
    }
    args.push(num(0.0));
    coalesce(args)
}

fn revenue_sql(columns: &HashSet<String>) -> Expr {
    first_number(columns, &["total", "amount", "revenue"])
}

fn cost_sql(columns: &HashSet<String>) -> Expr {
    let assumed = revenue_sql(columns).mul(num(ASSUMED_COST_RATIO));
    if columns.contains("cost") {
        coalesce(vec![numeric(col("cost")), assumed])
    } else {
        assumed
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldName::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}
