//! Row-to-record mapping and transparent transaction balancing.
//!
//! Two cooperating facilities for SQL client code:
//!
//! - a driver-agnostic [`Engine`] that scans query result rows into
//!   record structs and collections, with column names derived from field
//!   names (nested structs included) instead of per-type boilerplate;
//! - a [`Balancer`] that routes statement execution either through a
//!   connection pool or through the transaction carried by a caller's
//!   [`Session`], so the same data-access code runs unchanged inside and
//!   outside a transaction.
//!
//! Record types opt in with `#[derive(Record)]`:
//!
//! ```ignore
//! #[derive(Default, Record)]
//! struct User {
//!     id: i64,
//!     full_name: String,
//!     #[db(rename = "mail")]
//!     email: Option<String>,
//! }
//!
//! let mut users: Vec<User> = Vec::new();
//! runner.fetch_many("select id, full_name, mail from users", &mut users).await?;
//! ```

pub mod balancer;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod record;
pub mod resolve;
pub mod scan;
pub mod source;
pub mod value;

#[cfg(feature = "postgres")]
pub mod pg;

use std::sync::LazyLock;

pub use balancer::{
    exec_in_transaction, read_only, run_in_transaction, AccessMode, Balancer, Pool, RawSql,
    Runner, Session, Statement, TxHandle, TxOption, TxOptions,
};
pub use engine::{Engine, EngineBuilder};
pub use error::{Error, Result, SourceError};
pub use record::{Composite, FieldDef, FieldKind, FieldMut, Record};
pub use resolve::{Binding, Destination, FieldPath};
pub use scan::{Collection, RowScanner};
pub use source::{MemoryRows, RowSource, SlotMap};
pub use value::{FromValue, Slot, Value, ValueError};

/// Derives [`Record`] and its column bindings for a struct.
pub use rowbind_derive::Record;

static DEFAULT_ENGINE: LazyLock<Engine> = LazyLock::new(Engine::default);

/// The process-wide default engine: snake_case name mapping, `"."`
/// nested-column separator, no registered scannable types. Driver scalar
/// types such as `Uuid` and `serde_json::Value` already bind as plain
/// columns through `FromValue` and need no registration.
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}

/// Scan a one-row result set into `dest` using the default engine.
pub fn scan_one<T, R>(rows: R, dest: &mut T) -> Result<()>
where
    T: Destination,
    R: RowSource,
{
    default_engine().scan_one(rows, dest)
}

/// Scan a whole result set into `out` using the default engine.
pub fn scan_all<C, R>(rows: R, out: &mut C) -> Result<()>
where
    C: Collection,
    R: RowSource,
{
    default_engine().scan_all(rows, out)
}
