//! Transparent routing of statements to a pool or an open transaction.
//!
//! A [`Balancer`] wraps a driver [`Pool`]. Callers carry a [`Session`]
//! value through their call chain; code that runs statements asks the
//! balancer for a [`Runner`](runner::Runner), which targets the session's
//! transaction when one is open and a pooled connection otherwise. The
//! called code never branches on which one it got.

mod driver;
mod helpers;
mod runner;

pub use driver::{read_only, AccessMode, Pool, TxHandle, TxOption, TxOptions};
pub use helpers::{exec_in_transaction, run_in_transaction};
pub use runner::{RawSql, Runner, Statement};

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::engine::Engine;
use crate::error::{Error, Result};

/// A caller-carried handle to at most one open transaction.
///
/// Sessions are cheap to clone; clones share the same transaction cell,
/// so a commit through one clone is visible through all of them. The
/// default session carries no transaction and routes statements to the
/// pool.
pub struct Session<Tx> {
    cell: Option<Arc<Mutex<Option<Tx>>>>,
}

impl<Tx> Default for Session<Tx> {
    fn default() -> Self {
        Self { cell: None }
    }
}

impl<Tx> Clone for Session<Tx> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<Tx> Session<Tx> {
    /// A session with no transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this session was ever given a transaction. The transaction
    /// may since have been committed or rolled back.
    pub fn is_transactional(&self) -> bool {
        self.cell.is_some()
    }

    fn with_cell(cell: Arc<Mutex<Option<Tx>>>) -> Self {
        Self { cell: Some(cell) }
    }
}

/// Pairs a driver pool with a mapping engine and manages sessions'
/// transactions.
pub struct Balancer<P: Pool> {
    pool: P,
    engine: Engine,
}

impl<P: Pool> Balancer<P> {
    /// Wrap a pool, scanning rows with the default engine.
    pub fn new(pool: P) -> Self {
        Self {
            pool,
            engine: crate::default_engine().clone(),
        }
    }

    /// Wrap a pool with a custom mapping engine.
    pub fn with_engine(pool: P, engine: Engine) -> Self {
        Self { pool, engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Begin a transaction and return the session carrying it.
    ///
    /// If the session already carries a transaction the same session is
    /// returned and no new transaction starts, so nested transactional
    /// call chains share one transaction.
    pub async fn begin_transaction(
        &self,
        session: &Session<P::Tx>,
        options: &[TxOption],
    ) -> Result<Session<P::Tx>> {
        if session.cell.is_some() {
            debug!("session already transactional, joining existing transaction");
            return Ok(session.clone());
        }
        let mut tx_options = TxOptions::default();
        for option in options {
            option(&mut tx_options);
        }
        let tx = self.pool.begin(tx_options).await?;
        debug!(?tx_options, "transaction started");
        Ok(Session::with_cell(Arc::new(Mutex::new(Some(tx)))))
    }

    /// Commit the session's transaction.
    ///
    /// Fails with [`Error::NoTransaction`] on a non-transactional session
    /// and [`Error::TransactionClosed`] when the transaction was already
    /// completed.
    pub async fn commit_transaction(&self, session: &Session<P::Tx>) -> Result<()> {
        let Some(cell) = &session.cell else {
            return Err(Error::NoTransaction);
        };
        let tx = cell.lock().await.take().ok_or(Error::TransactionClosed)?;
        tx.commit().await?;
        debug!("transaction committed");
        Ok(())
    }

    /// Roll back the session's transaction.
    ///
    /// Fails with [`Error::NoTransaction`] on a non-transactional
    /// session. Rolling back an already-completed transaction is a no-op
    /// success, which lets deferred cleanup roll back unconditionally.
    pub async fn rollback_transaction(&self, session: &Session<P::Tx>) -> Result<()> {
        let Some(cell) = &session.cell else {
            return Err(Error::NoTransaction);
        };
        let Some(tx) = cell.lock().await.take() else {
            return Ok(());
        };
        tx.rollback().await?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// The statement runner for a session: its open transaction when it
    /// has one, a pooled connection otherwise.
    pub fn runner<'a>(&'a self, session: &Session<P::Tx>) -> Runner<'a, P> {
        match &session.cell {
            Some(cell) => Runner::transactional(&self.engine, Arc::clone(cell)),
            None => Runner::pooled(&self.engine, &self.pool),
        }
    }
}
