//! Error types for row mapping and transaction balancing.
//!
//! All errors are recoverable values returned to the caller; the crate never
//! panics outside of tests. Variants carry enough context (offending column,
//! destination type) to diagnose a failure without a debugger.

use thiserror::Error;

use crate::value::ValueError;

/// Opaque error produced by a driver or row-source implementation.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The destination value cannot be scanned into (wrong shape for the
    /// requested operation, or an internal field path went out of range).
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// A result column has no corresponding destination field.
    #[error("column {column:?} has no corresponding destination field")]
    ColumnNotFound { column: String },

    /// `scan_one` traversed zero rows.
    #[error("no row was found")]
    NotFound,

    /// `scan_one` traversed more than one row.
    #[error("expected exactly one row, got {count}")]
    MultipleRows { count: u64 },

    /// A column value could not be converted into its destination field.
    #[error("cannot decode column {column:?}")]
    Decode {
        column: String,
        #[source]
        source: ValueError,
    },

    /// A field path terminated on a composite type that does not decode
    /// itself from a single column value.
    #[error("scannable type {type_name} cannot be read from a single column")]
    InvalidScannableType { type_name: &'static str },

    /// The row source reported a terminal error after iteration.
    #[error("rows final error")]
    RowsFinal {
        #[source]
        source: SourceError,
    },

    /// Releasing the row source failed.
    #[error("closing rows failed")]
    Close {
        #[source]
        source: SourceError,
    },

    /// An error surfaced by the underlying database driver.
    #[error("database driver error")]
    Driver {
        #[source]
        source: SourceError,
    },

    /// Commit or rollback was requested on a session that never carried a
    /// transaction handle.
    #[error("no transaction found in session")]
    NoTransaction,

    /// The session's transaction handle was already consumed by a commit or
    /// rollback.
    #[error("transaction already completed")]
    TransactionClosed,

    /// Starting a transaction for a transactional work unit failed.
    #[error("failed to begin transaction")]
    Begin {
        #[source]
        source: Box<Error>,
    },

    /// Committing a transactional work unit failed.
    #[error("failed to commit transaction")]
    Commit {
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an invalid-destination error.
    pub fn invalid_destination(message: impl Into<String>) -> Self {
        Self::InvalidDestination(message.into())
    }

    /// Create a column-not-found error.
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Wrap a driver-side failure.
    pub fn driver(source: impl Into<SourceError>) -> Self {
        Self::Driver {
            source: source.into(),
        }
    }

    /// True if this error is `scan_one`'s empty-result-set case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// True if this error reports a missing transaction on a session.
    pub fn is_no_transaction(&self) -> bool {
        matches!(self, Self::NoTransaction)
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
