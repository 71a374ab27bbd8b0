//! Transactional work-unit helpers.

use tracing::warn;

use super::driver::{Pool, TxOption};
use super::{Balancer, Session};
use crate::error::{Error, Result};

/// Run `work` inside a transaction and return its value.
///
/// A transaction is begun on a session derived from `session` (joining an
/// already-open transaction if the session has one), `work` runs with the
/// transactional session, and on success the transaction is committed.
/// On any failure, and after an already-committed transaction, a rollback
/// is issued; rolling back after commit is a no-op. Errors from `work`
/// are returned unchanged; begin and commit failures are wrapped in
/// [`Error::Begin`] and [`Error::Commit`].
pub async fn run_in_transaction<P, T, F, Fut>(
    balancer: &Balancer<P>,
    session: &Session<P::Tx>,
    options: &[TxOption],
    work: F,
) -> Result<T>
where
    P: Pool,
    F: FnOnce(Session<P::Tx>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let tx_session = balancer
        .begin_transaction(session, options)
        .await
        .map_err(|source| Error::Begin {
            source: Box::new(source),
        })?;

    let outcome = match work(tx_session.clone()).await {
        Ok(value) => balancer
            .commit_transaction(&tx_session)
            .await
            .map_err(|source| Error::Commit {
                source: Box::new(source),
            })
            .map(|()| value),
        Err(err) => Err(err),
    };

    if let Err(err) = balancer.rollback_transaction(&tx_session).await {
        if !err.is_no_transaction() {
            warn!(error = %err, "rollback after transactional work unit failed");
        }
    }

    outcome
}

/// [`run_in_transaction`] for work units with no return value.
pub async fn exec_in_transaction<P, F, Fut>(
    balancer: &Balancer<P>,
    session: &Session<P::Tx>,
    options: &[TxOption],
    work: F,
) -> Result<()>
where
    P: Pool,
    F: FnOnce(Session<P::Tx>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    run_in_transaction(balancer, session, options, work).await
}
