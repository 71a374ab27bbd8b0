//! Column-name resolution: from static field tables to field paths.
//!
//! Resolution happens once per destination type and statement shape; the
//! result is a [`Binding`] the scanner reuses for every row.

use std::collections::HashMap;

use crate::engine::Engine;
use crate::error::Result;
use crate::record::{descend, FieldDef, FieldKind, Record};
use crate::value::Slot;

/// Index path from a record root to one of its (possibly nested) fields.
pub type FieldPath = Vec<usize>;

/// How a destination type consumes result columns.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Each column maps to a field path; produced for record types.
    Columns(HashMap<String, FieldPath>),
    /// The whole destination is one value read from a single column.
    Single,
}

/// Build the column map for a record's field table.
///
/// Column names are derived per field: an explicit `#[db(rename)]` wins,
/// otherwise the engine's name mapper is applied to the field identifier.
/// Nested records contribute their columns under `prefix + separator`
/// unless flattened. When two fields resolve to the same column, the field
/// declared first keeps it.
pub fn record_binding(engine: &Engine, fields: &'static [FieldDef]) -> Binding {
    let mut map = HashMap::new();
    collect(engine, fields, "", &mut Vec::new(), &mut map);
    Binding::Columns(map)
}

fn collect(
    engine: &Engine,
    fields: &'static [FieldDef],
    prefix: &str,
    path: &mut FieldPath,
    map: &mut HashMap<String, FieldPath>,
) {
    for (index, field) in fields.iter().enumerate() {
        let own_name = match field.column {
            Some(column) => column.to_owned(),
            None => engine.map_name(field.name),
        };
        path.push(index);
        match field.kind {
            FieldKind::Scalar => {
                let column = join(prefix, &own_name, engine.separator());
                map.entry(column).or_insert_with(|| path.clone());
            }
            FieldKind::Nested {
                type_id,
                fields: nested,
                flatten,
            } => {
                // Registered scannable types are leaves even though they
                // are records: they decode themselves from one column.
                if engine.is_scannable(type_id()) {
                    let column = join(prefix, &own_name, engine.separator());
                    map.entry(column).or_insert_with(|| path.clone());
                } else {
                    let nested_prefix = if flatten {
                        prefix.to_owned()
                    } else {
                        join(prefix, &own_name, engine.separator())
                    };
                    collect(engine, nested(), &nested_prefix, path, map);
                }
            }
        }
        path.pop();
    }
}

fn join(prefix: &str, name: &str, separator: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}{separator}{name}")
    }
}

/// A value rows can be scanned into.
///
/// Implemented by `#[derive(Record)]` for record structs (and their boxes)
/// and by this crate for the scalar types that read a single column.
pub trait Destination: 'static {
    /// Resolve how this type consumes result columns.
    fn binding(engine: &Engine) -> Result<Binding>;

    /// The slot addressed by a field path produced by [`Self::binding`].
    /// Scalar destinations accept only the empty path.
    fn slot(&mut self, path: &[usize]) -> Result<&mut dyn Slot>;
}

impl<T: Record> Destination for Box<T> {
    fn binding(engine: &Engine) -> Result<Binding> {
        Ok(record_binding(engine, T::fields()))
    }

    fn slot(&mut self, path: &[usize]) -> Result<&mut dyn Slot> {
        descend(&mut **self, path)
    }
}

macro_rules! scalar_destination {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Destination for $ty {
                fn binding(_engine: &Engine) -> Result<Binding> {
                    Ok(Binding::Single)
                }

                fn slot(&mut self, path: &[usize]) -> Result<&mut dyn Slot> {
                    if path.is_empty() {
                        Ok(self)
                    } else {
                        Err($crate::error::Error::invalid_destination(
                            "scalar destination has no nested fields",
                        ))
                    }
                }
            }
        )*
    };
}

scalar_destination!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    Vec<u8>,
    uuid::Uuid,
    serde_json::Value,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
);
