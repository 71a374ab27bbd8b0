//! The mapping engine: configuration plus the whole-result-set entry
//! points `scan_one` and `scan_all`.

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::mapper::snake_case;
use crate::resolve::Destination;
use crate::scan::{Collection, RowScanner};
use crate::source::RowSource;
use crate::value::FromValue;

type NameMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Immutable mapping configuration shared by every scan it performs.
///
/// An engine is cheap to clone and safe to share across tasks. The
/// default engine maps field names with [`snake_case`] and joins nested
/// prefixes with `"."`.
#[derive(Clone)]
pub struct Engine {
    separator: String,
    mapper: NameMapper,
    scannables: HashSet<TypeId>,
}

impl Default for Engine {
    fn default() -> Self {
        EngineBuilder::new().build()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("separator", &self.separator)
            .field("scannables", &self.scannables.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Separator inserted between a nested prefix and a column name.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Apply the configured name mapper to a field identifier.
    pub fn map_name(&self, field: &str) -> String {
        (self.mapper)(field)
    }

    /// Whether a nested record type was registered to decode from a
    /// single column.
    pub fn is_scannable(&self, type_id: TypeId) -> bool {
        self.scannables.contains(&type_id)
    }

    /// Scan a result set that must hold exactly one row into `dest`.
    ///
    /// The row source is always closed. Zero rows yield
    /// [`Error::NotFound`], more than one row [`Error::MultipleRows`];
    /// only the first row's values are written to `dest`.
    pub fn scan_one<T, R>(&self, mut rows: R, dest: &mut T) -> Result<()>
    where
        T: Destination,
        R: RowSource,
    {
        let mut scanner = RowScanner::new(self);
        let mut count: u64 = 0;
        while rows.advance() {
            count += 1;
            if count == 1 {
                if let Err(err) = scanner.scan(&mut rows, dest) {
                    let _ = rows.close();
                    return Err(err);
                }
            }
        }
        if let Some(source) = rows.final_error() {
            let _ = rows.close();
            return Err(Error::RowsFinal { source });
        }
        rows.close().map_err(|source| Error::Close { source })?;
        match count {
            0 => Err(Error::NotFound),
            1 => Ok(()),
            _ => Err(Error::MultipleRows { count }),
        }
    }

    /// Scan every row of a result set into `out`, clearing it first.
    ///
    /// The row source is always closed. An empty result set is not an
    /// error and leaves `out` empty.
    pub fn scan_all<C, R>(&self, mut rows: R, out: &mut C) -> Result<()>
    where
        C: Collection,
        R: RowSource,
    {
        out.clear();
        let mut scanner = RowScanner::new(self);
        let mut count: u64 = 0;
        while rows.advance() {
            let mut item = C::Item::default();
            if let Err(err) = scanner.scan(&mut rows, &mut item) {
                let _ = rows.close();
                return Err(err);
            }
            out.append(item);
            count += 1;
        }
        if let Some(source) = rows.final_error() {
            let _ = rows.close();
            return Err(Error::RowsFinal { source });
        }
        rows.close().map_err(|source| Error::Close { source })?;
        debug!(rows = count, "scanned result set");
        Ok(())
    }
}

/// Builder for a customised [`Engine`].
pub struct EngineBuilder {
    separator: String,
    mapper: NameMapper,
    scannables: HashSet<TypeId>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            separator: ".".to_owned(),
            mapper: Arc::new(snake_case),
            scannables: HashSet::new(),
        }
    }

    /// Separator between nested prefixes and column names.
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Replace the field-name to column-name mapper.
    pub fn name_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.mapper = Arc::new(mapper);
        self
    }

    /// Register a record type that also converts from a single column
    /// value. When such a type appears as a nested field, it binds to one
    /// column instead of a prefixed column set.
    pub fn scannable<T: FromValue + 'static>(self) -> Self {
        self.scannable_raw(TypeId::of::<T>())
    }

    pub(crate) fn scannable_raw(mut self, type_id: TypeId) -> Self {
        self.scannables.insert(type_id);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            separator: self.separator,
            mapper: self.mapper,
            scannables: self.scannables,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRows;
    use crate::value::Value;

    #[test]
    fn scan_one_exactly_one_row() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"]).with_row(vec![Value::Int64(3)]);
        let mut n = 0i64;
        engine.scan_one(rows, &mut n).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn scan_one_empty_result() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"]);
        let mut n = 0i64;
        let err = engine.scan_one(rows, &mut n).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn scan_one_counts_extra_rows_without_writing_them() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"])
            .with_row(vec![Value::Int64(1)])
            .with_row(vec![Value::Int64(2)])
            .with_row(vec![Value::Int64(3)]);
        let mut n = 0i64;
        let err = engine.scan_one(rows, &mut n).unwrap_err();
        assert!(matches!(err, Error::MultipleRows { count: 3 }));
        assert_eq!(n, 1);
    }

    #[test]
    fn scan_all_collects_in_order() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"])
            .with_row(vec![Value::Int64(1)])
            .with_row(vec![Value::Int64(2)]);
        let mut out: Vec<i64> = vec![99];
        engine.scan_all(rows, &mut out).unwrap();
        assert_eq!(out, vec![1, 2]);
    }

    #[test]
    fn scan_all_empty_result_is_ok() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"]);
        let mut out: Vec<i64> = vec![99];
        engine.scan_all(rows, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn final_error_wins_over_cardinality() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"]).with_final_error("stream broke");
        let mut n = 0i64;
        let err = engine.scan_one(rows, &mut n).unwrap_err();
        assert!(matches!(err, Error::RowsFinal { .. }));
    }

    #[test]
    fn close_error_swallowed_when_iteration_already_failed() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"])
            .with_final_error("stream broke")
            .with_close_error("release failed");
        let mut out: Vec<i64> = Vec::new();
        let err = engine.scan_all(rows, &mut out).unwrap_err();
        assert!(matches!(err, Error::RowsFinal { .. }));
    }

    #[test]
    fn close_error_swallowed_when_a_row_failed_to_decode() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"])
            .with_row(vec![Value::from("oops")])
            .with_close_error("release failed");
        let mut n = 0i64;
        let err = engine.scan_one(rows, &mut n).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn close_error_is_reported() {
        let engine = Engine::default();
        let rows = MemoryRows::new(&["n"])
            .with_row(vec![Value::Int64(1)])
            .with_close_error("release failed");
        let mut out: Vec<i64> = Vec::new();
        let err = engine.scan_all(rows, &mut out).unwrap_err();
        assert!(matches!(err, Error::Close { .. }));
    }
}
