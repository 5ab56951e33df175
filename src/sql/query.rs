//! Query builder - construct parameterized SELECT statements.

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, RenderContext, SqlValue};
use super::SqlError;

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// SQL text plus the values for its placeholders, in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// A single-table SELECT with optional WHERE and GROUP BY.
///
/// An empty select list renders `SELECT *`.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "Query has no effect until converted with to_prepared()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub from: String,
    pub filters: Vec<Expr>,
    pub group_by: Vec<Expr>,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Self {
            select: Vec::new(),
            from: table.into(),
            filters: Vec::new(),
            group_by: Vec::new(),
        }
    }

    pub fn select(mut self, expr: Expr, alias: &str) -> Self {
        self.select.push(SelectExpr::new(expr).with_alias(alias));
        self
    }

    /// Add a WHERE conjunct.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    /// Render for `dialect`, collecting bound parameters in placeholder order.
    pub fn to_prepared(&self, dialect: Dialect) -> Result<PreparedQuery, SqlError> {
        let mut ctx = RenderContext::new(dialect);
        let mut sql = String::from("SELECT ");

        if self.select.is_empty() {
            sql.push('*');
        } else {
            let mut items = Vec::with_capacity(self.select.len());
            for item in &self.select {
                let mut rendered = item.expr.render(&mut ctx)?;
                if let Some(alias) = &item.alias {
                    rendered.push_str(" AS ");
                    rendered.push_str(&dialect.quote_identifier(alias));
                }
                items.push(rendered);
            }
            sql.push_str(&items.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_identifier(&self.from));

        if !self.filters.is_empty() {
            let conjuncts = self
                .filters
                .iter()
                .map(|f| f.render(&mut ctx))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&conjuncts.join(" AND "));
        }

        if !self.group_by.is_empty() {
            let keys = self
                .group_by
                .iter()
                .map(|g| g.render(&mut ctx))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&keys.join(", "));
        }

        Ok(PreparedQuery {
            sql,
            params: ctx.params,
        })
    }
}
