//! SQL dialects understood by the push-down builder.
//!
//! Each dialect defines identifier quoting, bind-parameter placeholders,
//! case-insensitive matching and date bucketing. The builder never inlines
//! caller-supplied values, so there is no string-literal quoting here.

use crate::spec::Granularity;

/// SQL dialect trait - defines how dialect-sensitive constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Placeholder for the `index`-th bound parameter (1-based).
    fn placeholder(&self, index: usize) -> String;

    /// Case-insensitive pattern match operator.
    fn case_insensitive_like(&self) -> &'static str;

    /// Floating point type used to force non-integer arithmetic.
    fn float_type(&self) -> &'static str;

    /// Coerce a value to a float, or NULL when it is not a number.
    fn numeric(&self, expr: &str) -> String {
        format!("CAST({} AS {})", expr, self.float_type())
    }

    /// Normalize a timestamp-valued expression so it compares chronologically.
    fn timestamp(&self, expr: &str) -> String;

    /// Render a date bucket label for `granularity`.
    ///
    /// Labels match the in-process bucketing: `2024-03-15`, `2024-W11`,
    /// `2024-03`, `2024-Q1`, `2024`. Returns `None` when the dialect cannot
    /// produce the label.
    fn date_bucket(&self, granularity: Granularity, expr: &str) -> Option<String>;
}

/// PostgreSQL: `$n` placeholders, native `ILIKE`, `to_char` bucketing.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn case_insensitive_like(&self) -> &'static str {
        "ILIKE"
    }

    fn float_type(&self) -> &'static str {
        "DOUBLE PRECISION"
    }

    fn timestamp(&self, expr: &str) -> String {
        format!("CAST({} AS TIMESTAMP)", expr)
    }

    fn date_bucket(&self, granularity: Granularity, expr: &str) -> Option<String> {
        let pattern = match granularity {
            Granularity::Day => "YYYY-MM-DD",
            Granularity::Week => "IYYY-\"W\"IW",
            Granularity::Month => "YYYY-MM",
            Granularity::Quarter => "YYYY-\"Q\"Q",
            Granularity::Year => "YYYY",
        };
        Some(format!("to_char({}, '{}')", expr, pattern))
    }
}

/// SQLite: positional `?` placeholders, `LIKE` (case-insensitive for ASCII),
/// `strftime` bucketing.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn case_insensitive_like(&self) -> &'static str {
        "LIKE"
    }

    fn float_type(&self) -> &'static str {
        "REAL"
    }

    /// Columns are dynamically typed, so stored text only counts when it
    /// reads as a JSON number.
    fn numeric(&self, expr: &str) -> String {
        format!(
            "CASE WHEN typeof({e}) IN ('integer', 'real') THEN CAST({e} AS REAL) \
             WHEN typeof({e}) = 'text' AND json_valid(trim({e})) THEN \
             CASE WHEN json_type(trim({e})) IN ('integer', 'real') THEN CAST(trim({e}) AS REAL) END \
             END",
            e = expr
        )
    }

    fn timestamp(&self, expr: &str) -> String {
        format!("datetime({})", expr)
    }

    fn date_bucket(&self, granularity: Granularity, expr: &str) -> Option<String> {
        match granularity {
            Granularity::Day => Some(format!("strftime('%Y-%m-%d', {})", expr)),
            // ISO week numbering (%G/%V) is not available in every SQLite build.
            Granularity::Week => None,
            Granularity::Month => Some(format!("strftime('%Y-%m', {})", expr)),
            Granularity::Quarter => Some(format!(
                "strftime('%Y', {e}) || '-Q' || ((CAST(strftime('%m', {e}) AS INTEGER) + 2) / 3)",
                e = expr
            )),
            Granularity::Year => Some(format!("strftime('%Y', {})", expr)),
        }
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    Postgres,
    #[default]
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn placeholder(&self, index: usize) -> String {
        self.dialect().placeholder(index)
    }

    fn case_insensitive_like(&self) -> &'static str {
        self.dialect().case_insensitive_like()
    }

    fn float_type(&self) -> &'static str {
        self.dialect().float_type()
    }

    fn numeric(&self, expr: &str) -> String {
        self.dialect().numeric(expr)
    }

    fn timestamp(&self, expr: &str) -> String {
        self.dialect().timestamp(expr)
    }

    fn date_bucket(&self, granularity: Granularity, expr: &str) -> Option<String> {
        self.dialect().date_bucket(granularity, expr)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
