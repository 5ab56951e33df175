//! Filter predicates as parameterized SQL.
//!
//! Operator mapping: `equals -> =`, `not_equals -> <>`, `contains ->
//! ILIKE/LIKE '%v%'`, `gt/gte/lt/lte -> > >= < <=`, `in/not_in -> [NOT] IN`,
//! `between -> BETWEEN`. Every filter value is bound, never inlined. Date
//! ranges become `ts >= start AND ts < end`.

use super::expr::{col, numeric, param, BinaryOperator, Expr, ExprExt, SqlValue};
use super::SqlError;
use crate::spec::{DateBounds, FilterOperator, Predicate};

/// Build the WHERE conjunct for `predicate` applied to `field`.
///
/// Range comparisons against numbers read raw columns through [`numeric`],
/// so text cells that are not numbers never match.
pub fn filter_expr(predicate: &Predicate, field: Expr) -> Result<Expr, SqlError> {
    let bind = |v: &serde_json::Value| SqlValue::from_json(v).map(param);
    let ranged = matches!(
        predicate.operator,
        FilterOperator::Gt
            | FilterOperator::Gte
            | FilterOperator::Lt
            | FilterOperator::Lte
            | FilterOperator::Between
    );
    let field = if ranged && predicate.value.is_number() && !predicate.field.is_derived() {
        numeric(field)
    } else {
        field
    };

    Ok(match predicate.operator {
        FilterOperator::Equals => field.binary(BinaryOperator::Eq, bind(&predicate.value)?),
        FilterOperator::NotEquals => field.binary(BinaryOperator::NotEq, bind(&predicate.value)?),
        FilterOperator::Gt => field.binary(BinaryOperator::Gt, bind(&predicate.value)?),
        FilterOperator::Gte => field.binary(BinaryOperator::Gte, bind(&predicate.value)?),
        FilterOperator::Lt => field.binary(BinaryOperator::Lt, bind(&predicate.value)?),
        FilterOperator::Lte => field.binary(BinaryOperator::Lte, bind(&predicate.value)?),
        FilterOperator::Contains => Expr::Contains {
            expr: Box::new(field),
            needle: match &predicate.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        },
        FilterOperator::In | FilterOperator::NotIn => {
            let items = predicate
                .value
                .as_array()
                .ok_or_else(|| SqlError::UnsupportedValue(predicate.value.to_string()))?;
            let values = items.iter().map(bind).collect::<Result<Vec<_>, _>>()?;
            // An empty IN list is not valid SQL; it matches nothing.
            if values.is_empty() {
                let never = Expr::Number(1.0).binary(BinaryOperator::Eq, Expr::Number(0.0));
                return Ok(match predicate.operator {
                    FilterOperator::In => never,
                    _ => {
                        let same = field.clone();
                        field.binary(BinaryOperator::Eq, same)
                    }
                });
            }
            Expr::In {
                expr: Box::new(field),
                values,
                negated: predicate.operator == FilterOperator::NotIn,
            }
        }
        FilterOperator::Between => {
            let high = predicate
                .value2
                .as_ref()
                .ok_or_else(|| SqlError::UnsupportedValue("between without value2".into()))?;
            Expr::Between {
                expr: Box::new(field),
                low: Box::new(bind(&predicate.value)?),
                high: Box::new(bind(high)?),
            }
        }
    })
}

/// Half-open timestamp bounds on `column`: `start <= ts < end`.
pub fn date_range_expr(bounds: &DateBounds, column: &str) -> Expr {
    let (start, end) = bounds.as_sql_strings();
    let ts = || Expr::Timestamp(Box::new(col(column)));
    let bound = |text: String| Expr::Timestamp(Box::new(param(SqlValue::Text(text))));
    ts().gte(bound(start)).and(ts().lt(bound(end)))
}
