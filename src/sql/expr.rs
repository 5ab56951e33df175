//! Expression AST for push-down queries.
//!
//! Caller-supplied values only ever appear as [`Expr::Param`], which renders
//! to a dialect placeholder and appends the value to the bound parameter list.
//! Numeric constants baked into derived-field formulas use [`Expr::Number`].

use serde_json::Value;

use super::dialect::{Dialect, SqlDialect};
use super::SqlError;
use crate::spec::Granularity;

// =============================================================================
// Bound values
// =============================================================================

/// A value bound to a query placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Convert a scalar JSON value. Arrays and objects are not bindable.
    pub fn from_json(value: &Value) -> Result<Self, SqlError> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(SqlValue::Int(i)),
                None => Ok(SqlValue::Float(n.as_f64().unwrap_or_default())),
            },
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => {
                Err(SqlError::UnsupportedValue(value.to_string()))
            }
        }
    }
}

// =============================================================================
// Expression AST
// =============================================================================

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl BinaryOperator {
    fn as_sql(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Gt => ">",
            BinaryOperator::Gte => ">=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Lte => "<=",
            BinaryOperator::And => "AND",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateFunction {
    fn as_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// A SQL expression.
///
/// Every variant must be handled in `render()` - the compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference.
    Column(String),

    /// Bound parameter.
    Param(SqlValue),

    /// Trusted numeric constant.
    Number(f64),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// COALESCE(args...)
    Coalesce(Vec<Expr>),

    /// CASE WHEN cond THEN then ELSE otherwise END
    Case {
        when: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// Aggregate call; `arg: None` renders `COUNT(*)`.
    Aggregate {
        func: AggregateFunction,
        arg: Option<Box<Expr>>,
        distinct: bool,
    },

    /// expr [NOT] IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// expr BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },

    /// Case-insensitive substring match against a bound pattern.
    Contains { expr: Box<Expr>, needle: String },

    /// Numeric value as a float, NULL when the value is not a number.
    Numeric(Box<Expr>),

    /// Dialect-normalized timestamp.
    Timestamp(Box<Expr>),

    /// Date bucket label at a granularity.
    DateBucket {
        granularity: Granularity,
        expr: Box<Expr>,
    },

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Rendering state: the target dialect and the parameters bound so far.
#[derive(Debug)]
pub struct RenderContext {
    pub dialect: Dialect,
    pub params: Vec<SqlValue>,
}

impl RenderContext {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }
}

impl Expr {
    /// Render to SQL text, binding parameters into `ctx`.
    pub fn render(&self, ctx: &mut RenderContext) -> Result<String, SqlError> {
        Ok(match self {
            Expr::Column(name) => ctx.dialect.quote_identifier(name),
            Expr::Param(value) => ctx.bind(value.clone()),
            Expr::Number(n) => format_number(*n),
            Expr::BinaryOp { left, op, right } => format!(
                "{} {} {}",
                left.render(ctx)?,
                op.as_sql(),
                right.render(ctx)?
            ),
            Expr::Coalesce(args) => {
                let parts = args
                    .iter()
                    .map(|a| a.render(ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("COALESCE({})", parts.join(", "))
            }
            Expr::Case {
                when,
                then,
                otherwise,
            } => format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                when.render(ctx)?,
                then.render(ctx)?,
                otherwise.render(ctx)?
            ),
            Expr::Aggregate {
                func,
                arg,
                distinct,
            } => match arg {
                None => format!("{}(*)", func.as_sql()),
                Some(arg) => format!(
                    "{}({}{})",
                    func.as_sql(),
                    if *distinct { "DISTINCT " } else { "" },
                    arg.render(ctx)?
                ),
            },
            Expr::In {
                expr,
                values,
                negated,
            } => {
                let lhs = expr.render(ctx)?;
                let items = values
                    .iter()
                    .map(|v| v.render(ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                format!(
                    "{} {}IN ({})",
                    lhs,
                    if *negated { "NOT " } else { "" },
                    items.join(", ")
                )
            }
            Expr::Between { expr, low, high } => format!(
                "{} BETWEEN {} AND {}",
                expr.render(ctx)?,
                low.render(ctx)?,
                high.render(ctx)?
            ),
            Expr::Contains { expr, needle } => {
                let lhs = expr.render(ctx)?;
                let pattern = ctx.bind(SqlValue::Text(format!("%{}%", escape_like(needle))));
                format!(
                    "{} {} {} ESCAPE '\\'",
                    lhs,
                    ctx.dialect.case_insensitive_like(),
                    pattern
                )
            }
            Expr::Numeric(inner) => {
                let inner = inner.render(ctx)?;
                ctx.dialect.numeric(&inner)
            }
            Expr::Timestamp(inner) => {
                let inner = inner.render(ctx)?;
                ctx.dialect.timestamp(&inner)
            }
            Expr::DateBucket { granularity, expr } => {
                let inner = expr.render(ctx)?;
                ctx.dialect
                    .date_bucket(*granularity, &inner)
                    .ok_or(SqlError::UnsupportedGranularity {
                        dialect: ctx.dialect.name(),
                        granularity: *granularity,
                    })?
            }
            Expr::Paren(inner) => format!("({})", inner.render(ctx)?),
        })
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Constructors
// =============================================================================

pub fn col(name: &str) -> Expr {
    Expr::Column(name.into())
}

pub fn param(value: SqlValue) -> Expr {
    Expr::Param(value)
}

pub fn num(n: f64) -> Expr {
    Expr::Number(n)
}

pub fn coalesce(args: Vec<Expr>) -> Expr {
    Expr::Coalesce(args)
}

pub fn numeric(expr: Expr) -> Expr {
    Expr::Numeric(Box::new(expr))
}

pub fn aggregate(func: AggregateFunction, arg: Expr) -> Expr {
    Expr::Aggregate {
        func,
        arg: Some(Box::new(arg)),
        distinct: false,
    }
}

pub fn count_star() -> Expr {
    Expr::Aggregate {
        func: AggregateFunction::Count,
        arg: None,
        distinct: false,
    }
}

pub fn count_distinct(arg: Expr) -> Expr {
    Expr::Aggregate {
        func: AggregateFunction::Count,
        arg: Some(Box::new(arg)),
        distinct: true,
    }
}

/// Fluent operators on expressions.
pub trait ExprExt: Sized {
    fn binary(self, op: BinaryOperator, other: Expr) -> Expr;

    fn eq(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }
    fn gte(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }
    fn lt(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }
    fn and(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::And, other)
    }
    fn sub(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Minus, other)
    }
    fn mul(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Multiply, other)
    }
    fn div(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Divide, other)
    }
    fn paren(self) -> Expr;
}

impl ExprExt for Expr {
    fn binary(self, op: BinaryOperator, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(other),
        }
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self))
    }
}
