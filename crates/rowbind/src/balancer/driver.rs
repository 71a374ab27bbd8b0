//! Driver contract the balancer runs on top of.
//!
//! A [`Pool`] hands out transactions and executes pool-level statements; a
//! [`TxHandle`] is one live transaction. Both produce row streams as
//! [`RowSource`] implementations so results feed straight into the
//! mapping engine.

use async_trait::async_trait;

use crate::error::Result;
use crate::source::RowSource;
use crate::value::Value;

/// Transaction characteristics requested at begin time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOptions {
    pub access_mode: AccessMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// Mutator applied to [`TxOptions`] before a transaction begins.
pub type TxOption = fn(&mut TxOptions);

/// Request a read-only transaction.
///
/// ```ignore
/// let tx = balancer.begin_transaction(&session, &[read_only]).await?;
/// ```
pub fn read_only(options: &mut TxOptions) {
    options.access_mode = AccessMode::ReadOnly;
}

/// A connection pool capable of starting transactions and running
/// statements outside of one.
#[async_trait]
pub trait Pool: Send + Sync {
    type Tx: TxHandle<Rows = Self::Rows>;
    type Rows: RowSource + Send;

    /// Start a transaction with the given options.
    async fn begin(&self, options: TxOptions) -> Result<Self::Tx>;

    /// Run a statement on a pooled connection, returning the affected
    /// row count.
    async fn execute(&self, sql: &str, args: Vec<Value>) -> Result<u64>;

    /// Run a query on a pooled connection.
    async fn query(&self, sql: &str, args: Vec<Value>) -> Result<Self::Rows>;
}

/// One live transaction.
///
/// Commit and rollback consume the handle; an abandoned handle is rolled
/// back by the driver when dropped.
#[async_trait]
pub trait TxHandle: Send {
    type Rows: RowSource + Send;

    async fn execute(&mut self, sql: &str, args: Vec<Value>) -> Result<u64>;

    async fn query(&mut self, sql: &str, args: Vec<Value>) -> Result<Self::Rows>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
