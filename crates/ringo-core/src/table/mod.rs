//! Columnar table with soft delete, grouping, sorting, joins and graph export.
//!
//! # Architecture
//!
//! ```text
//! Table
//! ├── schema:  Schema (IndexMap name -> (type, typed index))
//! ├── columns: ColumnStore
//! │   ├── ints: Vec<Vec<i64>>
//! │   ├── flts: Vec<Vec<f64>>
//! │   └── strs: Vec<Vec<StringId>>   (ids into the context's StringPool)
//! ├── chain:   RowChain (logical order + soft delete)
//! ├── groups:  GroupCache (cached group statements, generation-stamped)
//! └── context: TableContext (shared pool + execution settings)
//! ```
//!
//! Column arrays are indexed by physical row. A physical row index stays
//! meaningful until [`Table::defrag`] renumbers rows.

mod aggregate;
mod arith;
mod columns;
mod graph;
#[cfg(test)]
mod graph_tests;
mod group;
mod io;
mod iter;
mod join;
#[cfg(test)]
mod join_tests;
mod row_chain;
mod rows;
#[cfg(test)]
mod rows_tests;
mod select;
#[cfg(test)]
mod select_tests;
mod set_ops;
mod sort;
#[cfg(test)]
mod sort_tests;


use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::context::TableContext;
use crate::error::{Error, Result};
use crate::schema::{normalize_col_name, ColumnRef, ColumnType, Primitive, Schema};
use crate::string_pool::StringId;

pub use aggregate::{aggregate_floats, aggregate_ints, aggregate_strs, aggregate_vector, AggrPolicy};
pub use arith::ArithOp;
pub use graph::{GraphEdge, GraphParts, GraphSequence, GraphSettings, NodeId};
pub use group::{GroupKey, GroupSpec, GroupStatement};
pub use io::LoadOptions;
pub use iter::{RowCursor, RowIter, RowRef};
pub use row_chain::{ChainIter, RowChain, RowLink};
pub use sort::SortSpec;

pub(crate) use columns::ColumnStore;
use graph::SequenceState;
use group::GroupCache;

/// Name of the permanent row id column created by [`Table::init_ids`].
pub const ID_COL: &str = "_id";

/// Shared handle to a table. Mutation through one handle is visible through all.
pub type SharedTable = Arc<RwLock<Table>>;

/// Whole-column payload written by derived-column operations.
#[derive(Debug, Clone)]
pub(crate) enum ColumnData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<StringId>),
}

impl ColumnData {
    pub(crate) const fn ty(&self) -> ColumnType {
        match self {
            Self::Int(_) => ColumnType::Int,
            Self::Float(_) => ColumnType::Float,
            Self::Str(_) => ColumnType::Str,
        }
    }
}

/// In-memory columnar table.
#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) context: TableContext,
    pub(crate) schema: Schema,
    pub(crate) columns: ColumnStore,
    pub(crate) chain: RowChain,
    /// Permanent id -> physical row, maintained once [`Table::init_ids`] ran.
    pub(crate) row_ids: IndexMap<i64, usize>,
    pub(crate) next_row_id: i64,
    pub(crate) groups: GroupCache,
    pub(crate) graph: GraphSettings,
    pub(crate) sequence: Option<SequenceState>,
    /// Bumped whenever row membership or logical order changes.
    pub(crate) generation: u64,
}

impl Table {
    /// Creates an empty table without columns.
    #[must_use]
    pub fn new(context: &TableContext) -> Self {
        Self::with_schema(Schema::new(), context)
    }

    /// Creates an empty table with the given schema.
    #[must_use]
    pub fn with_schema(schema: Schema, context: &TableContext) -> Self {
        let columns = ColumnStore::for_schema(&schema);
        Self {
            context: context.clone(),
            schema,
            columns,
            chain: RowChain::new(),
            row_ids: IndexMap::new(),
            next_row_id: 0,
            groups: GroupCache::default(),
            graph: GraphSettings::default(),
            sequence: None,
            generation: 0,
        }
    }

    /// Builds a two-column integer table from `(key, value)` pairs, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if both names normalize to one name.
    pub fn from_int_map<I>(
        pairs: I,
        key_col: &str,
        val_col: &str,
        context: &TableContext,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let schema = Schema::from_columns([(key_col, ColumnType::Int), (val_col, ColumnType::Int)])?;
        let mut pairs: Vec<(i64, i64)> = pairs.into_iter().collect();
        pairs.sort_unstable_by_key(|(k, _)| *k);
        let mut table = Self::with_schema(schema, context);
        table.columns.ints[0] = pairs.iter().map(|(k, _)| *k).collect();
        table.columns.ints[1] = pairs.iter().map(|(_, v)| *v).collect();
        table.chain = RowChain::dense(pairs.len());
        Ok(table)
    }

    /// Builds an integer-key, float-value table from `(key, value)` pairs, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if both names normalize to one name.
    pub fn from_float_map<I>(
        pairs: I,
        key_col: &str,
        val_col: &str,
        context: &TableContext,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, f64)>,
    {
        let schema =
            Schema::from_columns([(key_col, ColumnType::Int), (val_col, ColumnType::Float)])?;
        let mut pairs: Vec<(i64, f64)> = pairs.into_iter().collect();
        pairs.sort_unstable_by_key(|(k, _)| *k);
        let mut table = Self::with_schema(schema, context);
        table.columns.ints[0] = pairs.iter().map(|(k, _)| *k).collect();
        table.columns.flts[0] = pairs.iter().map(|(_, v)| *v).collect();
        table.chain = RowChain::dense(pairs.len());
        Ok(table)
    }

    /// Wraps the table in a [`SharedTable`] handle.
    #[must_use]
    pub fn into_shared(self) -> SharedTable {
        Arc::new(RwLock::new(self))
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Context (string pool and execution settings) of this table.
    #[must_use]
    pub fn context(&self) -> &TableContext {
        &self.context
    }

    /// Table schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Row chain.
    #[must_use]
    pub fn chain(&self) -> &RowChain {
        &self.chain
    }

    /// Total physical rows, deleted slots included.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.chain.total()
    }

    /// Number of valid rows.
    #[must_use]
    pub fn num_valid_rows(&self) -> usize {
        self.chain.valid()
    }

    /// Returns true if the table has no valid rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.valid() == 0
    }

    /// Returns true if `row` exists and is not deleted.
    #[must_use]
    pub fn is_row_valid(&self, row: usize) -> bool {
        self.chain.is_valid(row)
    }

    /// First valid row in logical order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTable`] if there are no valid rows.
    pub fn first_valid_row(&self) -> Result<usize> {
        self.chain
            .first()
            .ok_or_else(|| Error::EmptyTable("first_valid_row".to_string()))
    }

    /// Valid physical rows in logical order.
    #[must_use]
    pub fn logical_rows(&self) -> Vec<usize> {
        self.chain.logical_rows()
    }

    pub(crate) fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.chain.total() {
            return Err(Error::RowOutOfRange {
                row,
                total: self.chain.total(),
            });
        }
        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    // ========================================================================
    // Value access
    // ========================================================================

    /// Integer value at (`col`, physical `row`).
    ///
    /// Deleted rows are readable until defrag.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown or non-integer columns and
    /// [`Error::RowOutOfRange`] for `row >= num_rows()`.
    pub fn get_int(&self, col: &str, row: usize) -> Result<i64> {
        let c = self.schema.resolve_typed(col, ColumnType::Int)?;
        self.check_row(row)?;
        Ok(self.columns.int(c.index, row))
    }

    /// Float value at (`col`, physical `row`).
    ///
    /// # Errors
    ///
    /// See [`Table::get_int`].
    pub fn get_float(&self, col: &str, row: usize) -> Result<f64> {
        let c = self.schema.resolve_typed(col, ColumnType::Float)?;
        self.check_row(row)?;
        Ok(self.columns.flt(c.index, row))
    }

    /// Pool id of the string at (`col`, physical `row`).
    ///
    /// # Errors
    ///
    /// See [`Table::get_int`].
    pub fn get_str_id(&self, col: &str, row: usize) -> Result<StringId> {
        let c = self.schema.resolve_typed(col, ColumnType::Str)?;
        self.check_row(row)?;
        Ok(self.columns.str_id(c.index, row))
    }

    /// String at (`col`, physical `row`).
    ///
    /// # Errors
    ///
    /// See [`Table::get_int`].
    pub fn get_str(&self, col: &str, row: usize) -> Result<String> {
        let id = self.get_str_id(col, row)?;
        self.context.resolve(id)
    }

    /// Value of any type at (`col`, physical `row`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] or [`Error::RowOutOfRange`].
    pub fn get_value(&self, col: &str, row: usize) -> Result<Primitive> {
        let c = self.schema.resolve(col)?;
        self.check_row(row)?;
        self.value_at(c, row)
    }

    pub(crate) fn value_at(&self, col: ColumnRef, row: usize) -> Result<Primitive> {
        Ok(match col.ty {
            ColumnType::Int => Primitive::Int(self.columns.int(col.index, row)),
            ColumnType::Float => Primitive::Float(self.columns.flt(col.index, row)),
            ColumnType::Str => {
                Primitive::Str(self.context.resolve(self.columns.str_id(col.index, row))?)
            }
        })
    }

    // ========================================================================
    // Columns
    // ========================================================================

    /// Adds a column filled with the type's default (0, 0.0 or "").
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if the normalized name exists.
    pub fn add_column(&mut self, name: &str, ty: ColumnType) -> Result<ColumnRef> {
        let empty = if ty == ColumnType::Str {
            self.context.intern("")
        } else {
            StringId(0)
        };
        let col = self.schema.add_column(name, ty)?;
        self.columns.push_column(ty, self.num_rows(), empty);
        Ok(col)
    }

    /// Writes a whole column. An existing column of the same type has its
    /// valid rows overwritten; a missing one is created.
    pub(crate) fn write_column(&mut self, name: &str, data: ColumnData) -> Result<ColumnRef> {
        let ty = data.ty();
        if let Some(existing) = self.schema.get(name) {
            if existing.ty != ty {
                return Err(Error::type_mismatch(&normalize_col_name(name), ty, existing.ty));
            }
            let rows = self.chain.logical_rows();
            match data {
                ColumnData::Int(v) => overwrite(&mut self.columns.ints[existing.index], &v, &rows),
                ColumnData::Float(v) => {
                    overwrite(&mut self.columns.flts[existing.index], &v, &rows);
                }
                ColumnData::Str(v) => overwrite(&mut self.columns.strs[existing.index], &v, &rows),
            }
            self.groups.invalidate_column(&normalize_col_name(name));
            return Ok(existing);
        }
        let col = self.schema.add_column(name, ty)?;
        match data {
            ColumnData::Int(v) => self.columns.ints.push(v),
            ColumnData::Float(v) => self.columns.flts.push(v),
            ColumnData::Str(v) => self.columns.strs.push(v),
        }
        Ok(col)
    }

    /// Spreads one value per valid row (logical order) over a full-length array.
    fn spread<T: Copy>(&self, values: &[T], fill: T, col: &str) -> Result<Vec<T>> {
        if values.len() != self.num_valid_rows() {
            return Err(Error::InvalidArgument(format!(
                "column '{col}' needs {} values, got {}",
                self.num_valid_rows(),
                values.len()
            )));
        }
        let mut out = vec![fill; self.num_rows()];
        for (row, v) in self.chain.iter().zip(values) {
            out[row] = *v;
        }
        Ok(out)
    }

    /// Adds an integer column from one value per valid row in logical order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] or [`Error::InvalidArgument`] on a
    /// length mismatch.
    pub fn store_int_col(&mut self, name: &str, values: &[i64]) -> Result<()> {
        self.ensure_new_column(name)?;
        let data = self.spread(values, 0, name)?;
        self.write_column(name, ColumnData::Int(data)).map(|_| ())
    }

    /// Adds a float column from one value per valid row in logical order.
    ///
    /// # Errors
    ///
    /// See [`Table::store_int_col`].
    pub fn store_float_col(&mut self, name: &str, values: &[f64]) -> Result<()> {
        self.ensure_new_column(name)?;
        let data = self.spread(values, 0.0, name)?;
        self.write_column(name, ColumnData::Float(data)).map(|_| ())
    }

    /// Adds a string column from one value per valid row in logical order.
    ///
    /// # Errors
    ///
    /// See [`Table::store_int_col`].
    pub fn store_str_col<S: AsRef<str>>(&mut self, name: &str, values: &[S]) -> Result<()> {
        self.ensure_new_column(name)?;
        let (ids, empty) = {
            let mut pool = self.context.pool_mut();
            let ids: Vec<StringId> = values.iter().map(|s| pool.intern(s.as_ref())).collect();
            (ids, pool.intern(""))
        };
        let data = self.spread(&ids, empty, name)?;
        self.write_column(name, ColumnData::Str(data)).map(|_| ())
    }

    /// Fails if `name` exists with a type other than `ty`.
    pub(crate) fn ensure_target_type(&self, name: &str, ty: ColumnType) -> Result<()> {
        match self.schema.get(name) {
            Some(existing) if existing.ty != ty => Err(Error::type_mismatch(
                &normalize_col_name(name),
                ty,
                existing.ty,
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn ensure_new_column(&self, name: &str) -> Result<()> {
        if self.schema.contains(name) {
            return Err(Error::DuplicateColumn(normalize_col_name(name)));
        }
        Ok(())
    }

    /// Integer values of the valid rows in logical order.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown or non-integer columns.
    pub fn read_int_col(&self, name: &str) -> Result<Vec<i64>> {
        let c = self.schema.resolve_typed(name, ColumnType::Int)?;
        Ok(self.chain.iter().map(|r| self.columns.int(c.index, r)).collect())
    }

    /// Float values of the valid rows in logical order.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown or non-float columns.
    pub fn read_float_col(&self, name: &str) -> Result<Vec<f64>> {
        let c = self.schema.resolve_typed(name, ColumnType::Float)?;
        Ok(self.chain.iter().map(|r| self.columns.flt(c.index, r)).collect())
    }

    /// String values of the valid rows in logical order.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown or non-string columns.
    pub fn read_str_col(&self, name: &str) -> Result<Vec<String>> {
        let c = self.schema.resolve_typed(name, ColumnType::Str)?;
        let pool = self.context.pool();
        self.chain
            .iter()
            .map(|r| pool.resolve(self.columns.str_id(c.index, r)).map(str::to_string))
            .collect()
    }

    /// Renames a column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] or [`Error::DuplicateColumn`].
    pub fn rename(&mut self, col: &str, new_name: &str) -> Result<()> {
        let old = normalize_col_name(col);
        self.schema.rename(col, new_name)?;
        let new = normalize_col_name(new_name);
        self.groups.invalidate_column(&old);
        self.graph.rename_column(&old, &new);
        Ok(())
    }

    /// New table holding `cols` (in the given order) for every valid row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] or [`Error::DuplicateColumn`].
    pub fn project(&self, cols: &[&str]) -> Result<Self> {
        let mut schema = Schema::new();
        let mut sources = Vec::with_capacity(cols.len());
        for name in cols {
            let src = self.schema.resolve(name)?;
            let dst = schema.add_column(name, src.ty)?;
            sources.push((src, dst));
        }
        let rows = self.chain.logical_rows();
        let mut out = Self::with_schema(schema, &self.context);
        for (src, dst) in sources {
            match src.ty {
                ColumnType::Int => {
                    out.columns.ints[dst.index] = columns::gather(&self.columns.ints[src.index], &rows);
                }
                ColumnType::Float => {
                    out.columns.flts[dst.index] = columns::gather(&self.columns.flts[src.index], &rows);
                }
                ColumnType::Str => {
                    out.columns.strs[dst.index] = columns::gather(&self.columns.strs[src.index], &rows);
                }
            }
        }
        out.chain = RowChain::dense(rows.len());
        if out.has_ids() {
            out.reindex();
        }
        Ok(out)
    }

    /// Drops every column not listed in `cols`, keeping schema order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if a listed column is unknown.
    pub fn project_in_place(&mut self, cols: &[&str]) -> Result<()> {
        let keep: Vec<String> = cols
            .iter()
            .map(|c| self.schema.resolve(c).map(|_| normalize_col_name(c)))
            .collect::<Result<_>>()?;
        let drop: Vec<String> = self
            .schema
            .names()
            .into_iter()
            .filter(|n| !keep.contains(n))
            .collect();
        for name in drop {
            let col = self.schema.remove_column(&name)?;
            self.columns.remove_column(col);
            self.groups.invalidate_column(&name);
            self.graph.remove_column(&name);
            if name == ID_COL {
                self.row_ids.clear();
            }
        }
        Ok(())
    }
}

fn overwrite<T: Copy>(dst: &mut [T], src: &[T], rows: &[usize]) {
    for &row in rows {
        dst[row] = src[row];
    }
}
