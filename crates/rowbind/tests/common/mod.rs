//! In-memory driver used by the balancer integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rowbind::balancer::{Pool, TxHandle, TxOptions};
use rowbind::source::MemoryRows;
use rowbind::value::Value;
use rowbind::{Error, Result};

/// Shared observable state of a [`MockPool`] and its transactions.
#[derive(Default)]
pub struct MockState {
    pub begun: AtomicUsize,
    pub committed: AtomicBool,
    pub rolled_back: AtomicBool,
    pub fail_begin: AtomicBool,
    pub fail_commit: AtomicBool,
    pub last_options: Mutex<Option<TxOptions>>,
    /// Executed statements, prefixed with their target ("pool:" or "tx:").
    pub statements: Mutex<Vec<String>>,
    /// Result sets handed out by `query`, in order.
    pub results: Mutex<VecDeque<MemoryRows>>,
}

impl MockState {
    pub fn executed(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn queue_result(&self, rows: MemoryRows) {
        self.results.lock().unwrap().push_back(rows);
    }

    fn next_result(&self) -> MemoryRows {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default()
    }
}

pub struct MockPool {
    pub state: Arc<MockState>,
}

impl MockPool {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
        }
    }
}

pub struct MockTx {
    state: Arc<MockState>,
}

#[async_trait]
impl Pool for MockPool {
    type Tx = MockTx;
    type Rows = MemoryRows;

    async fn begin(&self, options: TxOptions) -> Result<Self::Tx> {
        if self.state.fail_begin.load(Ordering::SeqCst) {
            return Err(Error::driver("begin refused"));
        }
        self.state.begun.fetch_add(1, Ordering::SeqCst);
        *self.state.last_options.lock().unwrap() = Some(options);
        Ok(MockTx {
            state: Arc::clone(&self.state),
        })
    }

    async fn execute(&self, sql: &str, _args: Vec<Value>) -> Result<u64> {
        self.state
            .statements
            .lock()
            .unwrap()
            .push(format!("pool:{sql}"));
        Ok(1)
    }

    async fn query(&self, sql: &str, _args: Vec<Value>) -> Result<Self::Rows> {
        self.state
            .statements
            .lock()
            .unwrap()
            .push(format!("pool:{sql}"));
        Ok(self.state.next_result())
    }
}

#[async_trait]
impl TxHandle for MockTx {
    type Rows = MemoryRows;

    async fn execute(&mut self, sql: &str, _args: Vec<Value>) -> Result<u64> {
        self.state
            .statements
            .lock()
            .unwrap()
            .push(format!("tx:{sql}"));
        Ok(1)
    }

    async fn query(&mut self, sql: &str, _args: Vec<Value>) -> Result<Self::Rows> {
        self.state
            .statements
            .lock()
            .unwrap()
            .push(format!("tx:{sql}"));
        Ok(self.state.next_result())
    }

    async fn commit(self) -> Result<()> {
        if self.state.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::driver("commit refused"));
        }
        self.state.committed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.state.rolled_back.store(true, Ordering::SeqCst);
        Ok(())
    }
}
