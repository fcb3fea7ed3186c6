//! Row-level mutation: append, soft delete, defrag and permanent ids.

use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Range;
use tracing::debug;

use super::{ColumnData, RowChain, Table, ID_COL};
use crate::error::{Error, Result};
use crate::schema::{ColumnRef, ColumnType, Primitive};
use crate::string_pool::StringId;

/// Maps string ids of a source table into the pool of a destination table.
#[derive(Debug, Clone)]
pub(crate) enum StrBridge {
    /// Both tables share one pool.
    Same,
    /// Source id -> destination id.
    Map(FxHashMap<StringId, StringId>),
}

impl StrBridge {
    #[inline]
    pub(crate) fn map(&self, id: StringId) -> StringId {
        match self {
            Self::Same => id,
            Self::Map(map) => map.get(&id).copied().unwrap_or(id),
        }
    }
}

impl Table {
    /// Builds a bridge for copying string values out of `src` into this table.
    ///
    /// Every string id referenced by `src` is interned into this table's pool.
    pub(crate) fn bridge_from(&self, src: &Table) -> Result<StrBridge> {
        if self.context.same_pool(&src.context) {
            return Ok(StrBridge::Same);
        }
        let ids: FxHashSet<StringId> = src.columns.strs.iter().flatten().copied().collect();
        let resolved: Vec<(StringId, String)> = {
            let pool = src.context.pool();
            ids.into_iter()
                .map(|id| pool.resolve(id).map(|s| (id, s.to_string())))
                .collect::<Result<_>>()?
        };
        let mut pool = self.context.pool_mut();
        let map = resolved
            .into_iter()
            .map(|(id, s)| (id, pool.intern(&s)))
            .collect();
        Ok(StrBridge::Map(map))
    }

    // ========================================================================
    // Append
    // ========================================================================

    /// Appends a row given one value per schema column, in schema order.
    ///
    /// Float columns accept integer values. When [`Table::init_ids`] has run,
    /// the `_id` column is filled automatically and must be omitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on a value-count mismatch and
    /// [`Error::TypeMismatch`] on a value of the wrong type. The table is left
    /// untouched on error.
    pub fn add_row(&mut self, values: &[Primitive]) -> Result<usize> {
        let targets: Vec<(String, ColumnRef)> = self
            .schema
            .iter()
            .filter(|(name, _)| !(self.has_ids() && *name == ID_COL))
            .map(|(name, col)| (name.to_string(), col))
            .collect();
        if targets.len() != values.len() {
            return Err(Error::InvalidArgument(format!(
                "row needs {} values, got {}",
                targets.len(),
                values.len()
            )));
        }
        for ((name, col), value) in targets.iter().zip(values) {
            let ok = match (col.ty, value) {
                (ColumnType::Int, Primitive::Int(_))
                | (ColumnType::Float, Primitive::Float(_) | Primitive::Int(_))
                | (ColumnType::Str, Primitive::Str(_)) => true,
                _ => false,
            };
            if !ok {
                return Err(Error::type_mismatch(name, col.ty, value.ty()));
            }
        }

        let ids: Vec<Option<StringId>> = {
            let mut pool = self.context.pool_mut();
            values
                .iter()
                .map(|v| v.as_str().map(|s| pool.intern(s)))
                .collect()
        };
        for (((_, col), value), id) in targets.iter().zip(values).zip(ids) {
            match col.ty {
                ColumnType::Int => self.columns.ints[col.index].push(value.as_int().unwrap_or(0)),
                ColumnType::Float => {
                    self.columns.flts[col.index].push(value.as_f64().unwrap_or(0.0));
                }
                ColumnType::Str => {
                    if let Some(id) = id {
                        self.columns.strs[col.index].push(id);
                    }
                }
            }
        }
        Ok(self.link_appended_row())
    }

    /// Appends a copy of physical `row` of `src` (schemas must be compatible).
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSchema`] or [`Error::RowOutOfRange`].
    pub fn add_row_from(&mut self, src: &Table, row: usize) -> Result<usize> {
        self.check_compatible(src)?;
        src.check_row(row)?;
        let bridge = self.bridge_from(src)?;
        Ok(self.push_rows_from(src, &[row], &bridge))
    }

    /// Appends every valid row of `src` in logical order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSchema`] if the column types differ.
    pub fn add_table(&mut self, src: &Table) -> Result<()> {
        self.check_compatible(src)?;
        let bridge = self.bridge_from(src)?;
        let rows = src.chain.logical_rows();
        self.push_rows_from(src, &rows, &bridge);
        debug!(rows = rows.len(), "Appended table");
        Ok(())
    }

    pub(crate) fn check_compatible(&self, other: &Table) -> Result<()> {
        if !self.schema.is_compatible(&other.schema) {
            return Err(Error::IncompatibleSchema(format!(
                "column types {:?} vs {:?}",
                self.schema.types(),
                other.schema.types()
            )));
        }
        Ok(())
    }

    /// Copies `rows` of a compatible `src` (columns matched by position).
    /// Returns the physical index of the last appended row.
    pub(crate) fn push_rows_from(&mut self, src: &Table, rows: &[usize], bridge: &StrBridge) -> usize {
        let pairs: Vec<(ColumnRef, ColumnRef)> = self
            .schema
            .iter()
            .zip(src.schema.iter())
            .map(|((_, dst), (_, from))| (dst, from))
            .collect();
        for (dst, from) in pairs {
            match dst.ty {
                ColumnType::Int => {
                    let values = rows.iter().map(|&r| src.columns.int(from.index, r));
                    self.columns.ints[dst.index].extend(values);
                }
                ColumnType::Float => {
                    let values = rows.iter().map(|&r| src.columns.flt(from.index, r));
                    self.columns.flts[dst.index].extend(values);
                }
                ColumnType::Str => {
                    let values = rows.iter().map(|&r| bridge.map(src.columns.str_id(from.index, r)));
                    self.columns.strs[dst.index].extend(values);
                }
            }
        }
        let mut last = self.num_rows();
        for _ in rows {
            last = self.chain.append();
        }
        if self.has_ids() {
            self.rebuild_ids_for_appended(rows.len());
        }
        self.touch();
        last
    }

    /// Links a row whose column values were already pushed.
    fn link_appended_row(&mut self) -> usize {
        let row = self.chain.append();
        if self.has_ids() {
            if let Some(col) = self.schema.get(ID_COL) {
                let id = self.next_row_id;
                self.columns.ints[col.index].push(id);
                self.row_ids.insert(id, row);
                self.next_row_id += 1;
            }
        }
        self.touch();
        row
    }

    /// Assigns fresh ids to the last `count` rows, whose id slots were copied.
    fn rebuild_ids_for_appended(&mut self, count: usize) {
        let Some(col) = self.schema.get(ID_COL) else {
            return;
        };
        let total = self.num_rows();
        for row in total - count..total {
            let id = self.next_row_id;
            self.columns.ints[col.index][row] = id;
            self.row_ids.insert(id, row);
            self.next_row_id += 1;
        }
    }

    /// New table (same schema and context) holding copies of `rows`.
    pub(crate) fn copy_rows(&self, rows: &[usize]) -> Table {
        let mut out = Table::with_schema(self.schema.clone(), &self.context);
        out.columns = self.columns.gather(rows);
        out.chain = RowChain::dense(rows.len());
        out.graph = self.graph.clone();
        if self.has_ids() {
            out.reindex();
        }
        out
    }

    // ========================================================================
    // Delete / compact
    // ========================================================================

    /// Soft-deletes physical `row`. Returns false if it was already deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RowOutOfRange`] for `row >= num_rows()`.
    pub fn remove_row(&mut self, row: usize) -> Result<bool> {
        self.check_row(row)?;
        if !self.chain.remove(row) {
            return Ok(false);
        }
        if let Some(col) = self.schema.get(ID_COL).filter(|_| self.has_ids()) {
            self.row_ids.swap_remove(&self.columns.int(col.index, row));
        }
        self.touch();
        Ok(true)
    }

    /// Keeps the first `n` valid rows in logical order and deletes the rest.
    pub fn select_first_n(&mut self, n: usize) {
        let doomed: Vec<usize> = self.chain.iter().skip(n).collect();
        for row in doomed {
            if self.chain.remove(row) {
                if let Some(col) = self.schema.get(ID_COL).filter(|_| self.has_ids()) {
                    self.row_ids.swap_remove(&self.columns.int(col.index, row));
                }
            }
        }
        self.touch();
    }

    /// Compacts column arrays to the valid rows in logical order.
    ///
    /// Renumbers physical rows, drops cached groupings and rebuilds the
    /// permanent id map.
    pub fn defrag(&mut self) {
        let rows = self.chain.logical_rows();
        let before = self.num_rows();
        self.columns.compact(&rows);
        self.chain = RowChain::dense(rows.len());
        self.groups.clear();
        if self.has_ids() {
            self.reindex();
        }
        self.touch();
        debug!(before, after = rows.len(), "Defragmented table");
    }

    /// Splits the logical row sequence into at most `n` contiguous ranges of
    /// positions whose sizes differ by at most one.
    #[must_use]
    pub fn partition_ranges(&self, n: usize) -> Vec<Range<usize>> {
        let len = self.num_valid_rows();
        let parts = n.max(1).min(len.max(1));
        let (base, extra) = (len / parts, len % parts);
        let mut out = Vec::with_capacity(parts);
        let mut start = 0;
        for part in 0..parts {
            let size = base + usize::from(part < extra);
            if size == 0 {
                continue;
            }
            out.push(start..start + size);
            start += size;
        }
        out
    }

    // ========================================================================
    // Permanent ids
    // ========================================================================

    /// Returns true once [`Table::init_ids`] has run.
    #[must_use]
    pub fn has_ids(&self) -> bool {
        self.schema.get(ID_COL).is_some_and(|c| c.ty == ColumnType::Int)
    }

    /// Adds (or refreshes) the `_id` column with each valid row's current
    /// physical index and rebuilds the id map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if a non-integer `_id` column exists.
    pub fn init_ids(&mut self) -> Result<()> {
        let ids: Vec<i64> = (0..self.num_rows()).map(|r| r as i64).collect();
        self.write_column(ID_COL, ColumnData::Int(ids))?;
        self.reindex();
        Ok(())
    }

    /// Rebuilds the id map from the `_id` column.
    pub fn reindex(&mut self) {
        self.row_ids.clear();
        let Some(col) = self.schema.get(ID_COL) else {
            self.next_row_id = 0;
            return;
        };
        let mut next = 0;
        for row in self.chain.iter() {
            let id = self.columns.int(col.index, row);
            self.row_ids.insert(id, row);
            next = next.max(id.saturating_add(1));
        }
        self.next_row_id = next;
    }

    /// Physical row currently holding permanent id `id`.
    #[must_use]
    pub fn physical_row(&self, id: i64) -> Option<usize> {
        self.row_ids.get(&id).copied()
    }
}
