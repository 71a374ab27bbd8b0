//! The row-source abstraction the mapping engine consumes.
//!
//! A [`RowSource`] is a forward-only cursor over a result set. Drivers
//! adapt their native row streams to it; the engine never sees driver
//! types. [`MemoryRows`] is an in-memory implementation used by tests and
//! by adapters that buffer a full result set.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result, SourceError};
use crate::value::{Slot, Value};

/// Positional access to the destination slots of the current row.
///
/// Indexes correspond to the column order reported by
/// [`RowSource::columns`]. Slots are fetched one at a time so the engine
/// can hand out overlapping borrows sequentially.
pub trait SlotMap {
    /// Number of slots, equal to the column count.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The destination slot for the column at `index`.
    fn slot_at(&mut self, index: usize) -> Result<&mut dyn Slot>;
}

/// A forward-only cursor over result rows.
pub trait RowSource {
    /// Move to the next row. Returns `false` when the result set is
    /// exhausted or iteration hit an error; [`Self::final_error`]
    /// distinguishes the two.
    fn advance(&mut self) -> bool;

    /// Column names of the result set, in wire order.
    fn columns(&self) -> std::result::Result<Vec<String>, SourceError>;

    /// Fill the given slots from the current row.
    fn scan_into(&mut self, slots: &mut dyn SlotMap) -> Result<()>;

    /// The error that terminated iteration, if any. Checked after
    /// [`Self::advance`] returns `false`.
    fn final_error(&mut self) -> Option<SourceError>;

    /// Release the cursor. Idempotent.
    fn close(&mut self) -> std::result::Result<(), SourceError>;
}

/// A terminal error that can be reported any number of times.
#[derive(Debug, Clone)]
struct SharedError(Arc<dyn std::error::Error + Send + Sync>);

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// An in-memory [`RowSource`] over pre-built [`Value`] rows.
#[derive(Debug, Default)]
pub struct MemoryRows {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    final_error: Option<SharedError>,
    close_error: Option<SourceError>,
    closed: bool,
}

impl MemoryRows {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            ..Self::default()
        }
    }

    /// Append one row. The value count must match the column count.
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push_back(row);
        self
    }

    /// Make iteration terminate with the given error once the queued rows
    /// are exhausted.
    pub fn with_final_error(mut self, error: impl Into<SourceError>) -> Self {
        self.final_error = Some(SharedError(Arc::from(error.into())));
        self
    }

    /// Make [`RowSource::close`] fail with the given error.
    pub fn with_close_error(mut self, error: impl Into<SourceError>) -> Self {
        self.close_error = Some(error.into());
        self
    }

    /// True once [`RowSource::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RowSource for MemoryRows {
    fn advance(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.current = self.rows.pop_front();
        self.current.is_some()
    }

    fn columns(&self) -> std::result::Result<Vec<String>, SourceError> {
        Ok(self.columns.clone())
    }

    fn scan_into(&mut self, slots: &mut dyn SlotMap) -> Result<()> {
        let Some(row) = self.current.take() else {
            return Err(Error::driver("scan requested with no current row"));
        };
        if row.len() != slots.len() {
            return Err(Error::driver(format!(
                "row has {} values but {} slots were supplied",
                row.len(),
                slots.len()
            )));
        }
        for (index, value) in row.into_iter().enumerate() {
            slots
                .slot_at(index)?
                .put(value)
                .map_err(|source| Error::Decode {
                    column: self.columns[index].clone(),
                    source,
                })?;
        }
        Ok(())
    }

    fn final_error(&mut self) -> Option<SourceError> {
        if self.rows.is_empty() {
            self.final_error
                .clone()
                .map(|err| Box::new(err) as SourceError)
        } else {
            None
        }
    }

    fn close(&mut self) -> std::result::Result<(), SourceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;
        match self.close_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
