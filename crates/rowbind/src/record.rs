//! The static field model behind mappable record types.
//!
//! `#[derive(Record)]` generates, for each struct, a constant table of
//! [`FieldDef`]s describing its fields and an implementation of
//! [`Composite`] giving positional mutable access to them. The resolver
//! walks the tables to bind column names to field paths; the scanner walks
//! a [`Composite`] tree with those paths to reach concrete [`Slot`]s.

use std::any::TypeId;

use crate::error::{Error, Result};
use crate::value::{FromValue, Slot};

/// Static description of one struct field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// The Rust field identifier.
    pub name: &'static str,
    /// Column-name override from a `#[db(rename = "...")]` attribute.
    pub column: Option<&'static str>,
    /// Scalar leaf or nested record.
    pub kind: FieldKind,
}

/// Shape of a field as seen by the column resolver.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A leaf holding a single column value.
    Scalar,
    /// A nested record contributing prefixed columns.
    Nested {
        /// Identity of the nested type, used to recognise registered
        /// scannable types that decode from one column.
        type_id: fn() -> TypeId,
        /// Field table of the nested type.
        fields: fn() -> &'static [FieldDef],
        /// Nested columns keep the parent's prefix instead of adding
        /// their own when set by `#[db(flatten)]`.
        flatten: bool,
    },
}

/// Mutable view of one field of a composite value.
pub enum FieldMut<'a> {
    /// A scalar leaf ready to receive a column value.
    Slot(&'a mut dyn Slot),
    /// A nested record to descend into.
    Record(&'a mut dyn Composite),
}

/// Positional mutable access to a record's fields.
///
/// Implemented by `#[derive(Record)]`; field indexes follow declaration
/// order of the non-skipped fields, matching the [`Record::fields`] table.
pub trait Composite {
    /// Mutable view of the field at `index`.
    fn child_mut(&mut self, index: usize) -> Result<FieldMut<'_>>;

    /// This value as a single-column slot, if its type converts directly
    /// from a column value.
    fn self_slot(&mut self) -> Option<&mut dyn Slot>;

    /// Type name for diagnostics.
    fn type_label(&self) -> &'static str;
}

/// A mappable record type with a static field table.
pub trait Record: Composite + 'static {
    fn fields() -> &'static [FieldDef];
}

/// Monomorphised `TypeId` accessor, usable as a `fn()` pointer in static
/// [`FieldDef`] tables.
pub fn type_id_of<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}

/// Probe deciding at compile time whether a field type converts from a
/// single column value.
///
/// Method resolution prefers the inherent `slot` on `SlotProbe` (available
/// only when the wrapped type implements [`FromValue`]) over the trait
/// fallback, so `SlotProbe(field).slot()` yields `Some` exactly for
/// convertible types. Generated code relies on this to implement
/// [`Composite::self_slot`] without per-type annotations.
pub struct SlotProbe<'a, T>(pub &'a mut T);

impl<'a, T: FromValue + 'static> SlotProbe<'a, T> {
    pub fn slot(self) -> Option<&'a mut dyn Slot> {
        Some(self.0)
    }
}

pub trait ProbeFallback<'a> {
    fn slot(self) -> Option<&'a mut dyn Slot>;
}

impl<'a, T> ProbeFallback<'a> for SlotProbe<'a, T> {
    fn slot(self) -> Option<&'a mut dyn Slot> {
        None
    }
}

/// Walk a field path down a composite tree to the slot it addresses.
///
/// Every non-terminal path segment must name a nested record; the terminal
/// segment must name either a scalar leaf or a record whose type converts
/// from a single column.
pub fn descend<'a>(root: &'a mut dyn Composite, path: &[usize]) -> Result<&'a mut dyn Slot> {
    let Some((&last, inner)) = path.split_last() else {
        return Err(Error::invalid_destination("empty field path"));
    };
    let mut node: &mut dyn Composite = root;
    for &index in inner {
        node = match Composite::child_mut(node, index)? {
            FieldMut::Record(rec) => rec,
            FieldMut::Slot(_) => {
                return Err(Error::invalid_destination(
                    "field path descends through a scalar field",
                ));
            }
        };
    }
    match Composite::child_mut(node, last)? {
        FieldMut::Slot(slot) => Ok(slot),
        FieldMut::Record(rec) => {
            let label = rec.type_label();
            rec.self_slot()
                .ok_or(Error::InvalidScannableType { type_name: label })
        }
    }
}
