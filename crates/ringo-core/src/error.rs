//! Error types for Ringo.
//!
//! Every table operation reports failures through the unified [`Error`] type.
//! Variants carry a stable `RINGO-XXX` code and map onto a coarse
//! [`ErrorKind`] so callers can branch on the failure family without matching
//! every variant.

use thiserror::Error;

/// Result type alias for Ringo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown column, wrong column type, duplicate column name.
    Schema,
    /// Row, column, string id or argument outside its declared bounds.
    Range,
    /// Operation requires at least one valid row.
    EmptyTable,
    /// Tables or columns whose types cannot be combined.
    IncompatibleSchema,
    /// Stateful iterator used in the wrong state.
    State,
    /// Malformed delimited-text input.
    Parse,
    /// Underlying I/O failure.
    Io,
    /// Binary (de)serialization failure.
    Serialization,
    /// Invalid configuration.
    Config,
}

/// Errors that can occur in Ringo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Column not found in the table schema (RINGO-001).
    #[error("[RINGO-001] Column '{0}' not found")]
    ColumnNotFound(String),

    /// Column with the same normalized name already exists (RINGO-002).
    #[error("[RINGO-002] Column '{0}' already exists")]
    DuplicateColumn(String),

    /// Column has a different type than the operation requires (RINGO-003).
    #[error("[RINGO-003] Type mismatch on column '{column}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Type the operation expected.
        expected: String,
        /// Type actually found.
        actual: String,
    },

    /// Physical row index outside the table (RINGO-004).
    #[error("[RINGO-004] Row {row} out of range (table has {total} rows)")]
    RowOutOfRange {
        /// Requested physical row.
        row: usize,
        /// Total number of physical rows.
        total: usize,
    },

    /// String id not present in the pool (RINGO-005).
    #[error("[RINGO-005] Unknown string id {0}")]
    UnknownStringId(u32),

    /// Argument outside its accepted domain (RINGO-006).
    #[error("[RINGO-006] Invalid argument: {0}")]
    InvalidArgument(String),

    /// Integer division or modulus by zero (RINGO-007).
    #[error("[RINGO-007] Division by zero at row {row}")]
    DivisionByZero {
        /// Physical row holding the zero divisor.
        row: usize,
    },

    /// Operation requires at least one valid row (RINGO-008).
    #[error("[RINGO-008] Operation '{0}' requires a non-empty input")]
    EmptyTable(String),

    /// Schemas or column types cannot be combined (RINGO-009).
    #[error("[RINGO-009] Incompatible schema: {0}")]
    IncompatibleSchema(String),

    /// Stateful iteration used out of order (RINGO-010).
    #[error("[RINGO-010] Invalid state: {0}")]
    InvalidState(String),

    /// Delimited-text parse error (RINGO-011).
    #[error("[RINGO-011] Parse error at line {line}: {message}")]
    Parse {
        /// 1-based input line.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// IO error (RINGO-012).
    #[error("[RINGO-012] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (RINGO-013).
    #[error("[RINGO-013] Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (RINGO-014).
    #[error("[RINGO-014] Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the error code (e.g., "RINGO-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "RINGO-001",
            Self::DuplicateColumn(_) => "RINGO-002",
            Self::TypeMismatch { .. } => "RINGO-003",
            Self::RowOutOfRange { .. } => "RINGO-004",
            Self::UnknownStringId(_) => "RINGO-005",
            Self::InvalidArgument(_) => "RINGO-006",
            Self::DivisionByZero { .. } => "RINGO-007",
            Self::EmptyTable(_) => "RINGO-008",
            Self::IncompatibleSchema(_) => "RINGO-009",
            Self::InvalidState(_) => "RINGO-010",
            Self::Parse { .. } => "RINGO-011",
            Self::Io(_) => "RINGO-012",
            Self::Serialization(_) => "RINGO-013",
            Self::Config(_) => "RINGO-014",
        }
    }

    /// Returns the failure family of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ColumnNotFound(_) | Self::DuplicateColumn(_) | Self::TypeMismatch { .. } => {
                ErrorKind::Schema
            }
            Self::RowOutOfRange { .. }
            | Self::UnknownStringId(_)
            | Self::InvalidArgument(_)
            | Self::DivisionByZero { .. } => ErrorKind::Range,
            Self::EmptyTable(_) => ErrorKind::EmptyTable,
            Self::IncompatibleSchema(_) => ErrorKind::IncompatibleSchema,
            Self::InvalidState(_) => ErrorKind::State,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Shorthand for a [`Error::TypeMismatch`].
    pub(crate) fn type_mismatch(
        column: &str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::TypeMismatch {
            column: column.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
