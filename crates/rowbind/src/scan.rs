//! Row scanning: applying a resolved binding to a row stream.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::resolve::{Binding, Destination, FieldPath};
use crate::source::{RowSource, SlotMap};
use crate::value::Slot;

/// The per-statement scan plan: one field path per result column, in
/// column order.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    columns: Vec<String>,
    paths: Vec<FieldPath>,
}

impl ScanPlan {
    /// Resolve the plan for a destination type against a result shape.
    pub fn resolve<T: Destination>(engine: &Engine, rows: &dyn RowSource) -> Result<Self> {
        let columns = rows.columns().map_err(Error::driver)?;
        let binding = T::binding(engine)?;
        let paths = match binding {
            Binding::Single => {
                if columns.len() != 1 {
                    return Err(Error::invalid_destination(format!(
                        "a single-value destination requires exactly 1 column, got {}",
                        columns.len()
                    )));
                }
                vec![FieldPath::new()]
            }
            Binding::Columns(map) => columns
                .iter()
                .map(|column| {
                    map.get(column)
                        .cloned()
                        .ok_or_else(|| Error::column_not_found(column))
                })
                .collect::<Result<Vec<_>>>()?,
        };
        tracing::debug!(columns = columns.len(), "resolved scan plan");
        Ok(Self { columns, paths })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// A destination paired with a plan, exposing its slots in column order.
struct RowTarget<'a, T: Destination> {
    dest: &'a mut T,
    plan: &'a ScanPlan,
}

impl<T: Destination> SlotMap for RowTarget<'_, T> {
    fn len(&self) -> usize {
        self.plan.paths.len()
    }

    fn slot_at(&mut self, index: usize) -> Result<&mut dyn Slot> {
        let path = self
            .plan
            .paths
            .get(index)
            .ok_or_else(|| Error::invalid_destination("slot index out of range"))?;
        self.dest.slot(path)
    }
}

/// Scans successive rows of one result set into destination values.
///
/// The column binding is resolved on the first call and reused for every
/// subsequent row, so per-row work is a plain indexed walk.
pub struct RowScanner<'e> {
    engine: &'e Engine,
    plan: Option<ScanPlan>,
}

impl<'e> RowScanner<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Self { engine, plan: None }
    }

    /// Scan the current row of `rows` into `dest`.
    ///
    /// `rows.advance()` must have returned `true` since the last scan.
    pub fn scan<T: Destination, R: RowSource>(
        &mut self,
        rows: &mut R,
        dest: &mut T,
    ) -> Result<()> {
        let plan = match self.plan.take() {
            Some(plan) => plan,
            None => ScanPlan::resolve::<T>(self.engine, rows)?,
        };
        let result = rows.scan_into(&mut RowTarget { dest, plan: &plan });
        self.plan = Some(plan);
        result
    }
}

/// A growable container `scan_all` can fill.
pub trait Collection {
    type Item: Destination + Default;

    /// Drop any existing elements before scanning starts.
    fn clear(&mut self);

    /// Append one scanned element.
    fn append(&mut self, item: Self::Item);
}

impl<T: Destination + Default> Collection for Vec<T> {
    type Item = T;

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn append(&mut self, item: T) {
        self.push(item);
    }
}
