//! Statement execution against whichever target a session resolves to.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::driver::{Pool, TxHandle};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::resolve::Destination;
use crate::scan::Collection;
use crate::value::Value;

/// Anything that renders to a SQL string plus bind arguments.
pub trait Statement {
    fn to_sql(&self) -> Result<(String, Vec<Value>)>;
}

impl Statement for str {
    fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        Ok((self.to_owned(), Vec::new()))
    }
}

impl Statement for String {
    fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        Ok((self.clone(), Vec::new()))
    }
}

impl<S: Statement + ?Sized> Statement for &S {
    fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        (**self).to_sql()
    }
}

/// A SQL string with positional bind arguments.
#[derive(Debug, Clone, Default)]
pub struct RawSql {
    sql: String,
    args: Vec<Value>,
}

impl RawSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Append one bind argument.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

impl Statement for RawSql {
    fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        Ok((self.sql.clone(), self.args.clone()))
    }
}

enum RunnerKind<'a, P: Pool> {
    Pool(&'a P),
    Transaction(Arc<Mutex<Option<P::Tx>>>),
}

/// Executes statements against a session's resolved target and scans
/// results through the balancer's engine.
///
/// Obtained from [`Balancer::runner`](super::Balancer::runner); code that
/// takes a `Runner` works identically inside and outside a transaction.
pub struct Runner<'a, P: Pool> {
    engine: &'a Engine,
    kind: RunnerKind<'a, P>,
}

impl<'a, P: Pool> Runner<'a, P> {
    pub(super) fn pooled(engine: &'a Engine, pool: &'a P) -> Self {
        Self {
            engine,
            kind: RunnerKind::Pool(pool),
        }
    }

    pub(super) fn transactional(engine: &'a Engine, cell: Arc<Mutex<Option<P::Tx>>>) -> Self {
        Self {
            engine,
            kind: RunnerKind::Transaction(cell),
        }
    }

    /// True when statements will run inside a transaction.
    pub fn is_transactional(&self) -> bool {
        matches!(self.kind, RunnerKind::Transaction(_))
    }

    /// Run a statement, returning the affected row count.
    pub async fn execute<S: Statement + ?Sized>(&self, statement: &S) -> Result<u64> {
        let (sql, args) = statement.to_sql()?;
        match &self.kind {
            RunnerKind::Pool(pool) => pool.execute(&sql, args).await,
            RunnerKind::Transaction(cell) => {
                let mut guard = cell.lock().await;
                let tx = guard.as_mut().ok_or(Error::TransactionClosed)?;
                tx.execute(&sql, args).await
            }
        }
    }

    /// Run a query expected to return exactly one row and scan it into
    /// `dest`.
    pub async fn fetch_one<T, S>(&self, statement: &S, dest: &mut T) -> Result<()>
    where
        T: Destination,
        S: Statement + ?Sized,
    {
        let (sql, args) = statement.to_sql()?;
        let rows = self.query(&sql, args).await?;
        self.engine.scan_one(rows, dest)
    }

    /// Run a query and scan every row into `out`.
    pub async fn fetch_many<C, S>(&self, statement: &S, out: &mut C) -> Result<()>
    where
        C: Collection,
        S: Statement + ?Sized,
    {
        let (sql, args) = statement.to_sql()?;
        let rows = self.query(&sql, args).await?;
        self.engine.scan_all(rows, out)
    }

    async fn query(&self, sql: &str, args: Vec<Value>) -> Result<P::Rows> {
        match &self.kind {
            RunnerKind::Pool(pool) => pool.query(sql, args).await,
            RunnerKind::Transaction(cell) => {
                let mut guard = cell.lock().await;
                let tx = guard.as_mut().ok_or(Error::TransactionClosed)?;
                tx.query(sql, args).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_sql_accumulates_args() {
        let stmt = RawSql::new("select * from t where a = $1 and b = $2")
            .bind(5i64)
            .bind("x");
        let (sql, args) = stmt.to_sql().unwrap();
        assert!(sql.starts_with("select"));
        assert_eq!(args, vec![Value::Int64(5), Value::from("x")]);
    }

    #[test]
    fn plain_str_is_a_statement() {
        let (sql, args) = "select 1".to_sql().unwrap();
        assert_eq!(sql, "select 1");
        assert!(args.is_empty());
    }
}
