//! # Ringo Core
//!
//! In-memory columnar table engine for relational preprocessing ahead of
//! graph analytics.
//!
//! Tables store typed columns (integers, floats, pooled strings) indexed by
//! physical row, with a row chain providing logical order and O(1) soft
//! delete. On top of that sit predicate selection, hash grouping, sorting,
//! equi- and similarity joins, aggregation, column arithmetic, set operations,
//! text and binary persistence, and a bridge that turns rows into graph parts.
//!
//! ## Quick Start
//!
//! ```rust
//! use ringo_core::predicate::{Predicate, PredicateNode};
//! use ringo_core::{ColumnType, Primitive, Schema, Table, TableContext};
//!
//! # fn main() -> ringo_core::Result<()> {
//! let context = TableContext::new();
//! let schema = Schema::from_columns([
//!     ("Animal", ColumnType::Str),
//!     ("Location", ColumnType::Str),
//!     ("Number", ColumnType::Int),
//! ])?;
//! let mut table = Table::with_schema(schema, &context);
//! table.add_row(&["Lion".into(), "Africa".into(), Primitive::Int(1)])?;
//! table.add_row(&["Koala".into(), "Australia".into(), Primitive::Int(1)])?;
//!
//! let matched = table.select(&Predicate::new(PredicateNode::eq("Location", "Africa")), false)?;
//! assert_eq!(matched, vec![0]);
//!
//! table.count("LocCount", "Location")?;
//! assert_eq!(table.read_int_col("LocCount")?, vec![1, 1]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::redundant_pub_crate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::unused_self)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod context;
#[cfg(test)]
mod context_tests;
pub mod distance;
pub mod error;
pub mod predicate;
pub mod schema;
#[cfg(test)]
mod schema_tests;
pub mod string_pool;
#[cfg(test)]
mod string_pool_tests;
pub mod table;

pub use config::{ConfigError, RingoConfig};
pub use context::{ExecutionConfig, TableContext};
pub use distance::SimMetric;
pub use error::{Error, ErrorKind, Result};
pub use predicate::{CompareOp, Predicate, PredicateNode};
pub use schema::{normalize_col_name, ColumnRef, ColumnType, Primitive, Schema};
pub use string_pool::{StringId, StringPool};
pub use table::{
    AggrPolicy, ArithOp, GraphEdge, GraphParts, GraphSettings, GroupSpec, GroupStatement,
    LoadOptions, NodeId, SharedTable, SortSpec, Table, ID_COL,
};
