//! Per-type dense column arrays indexed by physical row.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnRef, ColumnType, Schema};
use crate::string_pool::StringId;

/// Column arrays grouped by storage type.
///
/// Every array has one entry per physical row, deleted slots included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ColumnStore {
    pub(crate) ints: Vec<Vec<i64>>,
    pub(crate) flts: Vec<Vec<f64>>,
    pub(crate) strs: Vec<Vec<StringId>>,
}

impl ColumnStore {
    /// Empty arrays for every column of `schema`.
    pub(crate) fn for_schema(schema: &Schema) -> Self {
        Self {
            ints: vec![Vec::new(); schema.count_of(ColumnType::Int)],
            flts: vec![Vec::new(); schema.count_of(ColumnType::Float)],
            strs: vec![Vec::new(); schema.count_of(ColumnType::Str)],
        }
    }

    /// Appends an array filled with the type's default value.
    pub(crate) fn push_column(&mut self, ty: ColumnType, rows: usize, empty_str: StringId) {
        match ty {
            ColumnType::Int => self.ints.push(vec![0; rows]),
            ColumnType::Float => self.flts.push(vec![0.0; rows]),
            ColumnType::Str => self.strs.push(vec![empty_str; rows]),
        }
    }

    pub(crate) fn remove_column(&mut self, col: ColumnRef) {
        match col.ty {
            ColumnType::Int => {
                self.ints.remove(col.index);
            }
            ColumnType::Float => {
                self.flts.remove(col.index);
            }
            ColumnType::Str => {
                self.strs.remove(col.index);
            }
        }
    }

    /// Copies the given physical rows, in order, into a new store.
    pub(crate) fn gather(&self, rows: &[usize]) -> Self {
        Self {
            ints: self.ints.iter().map(|c| gather(c, rows)).collect(),
            flts: self.flts.iter().map(|c| gather(c, rows)).collect(),
            strs: self.strs.iter().map(|c| gather(c, rows)).collect(),
        }
    }

    /// Keeps only the given physical rows, in order.
    pub(crate) fn compact(&mut self, rows: &[usize]) {
        for col in &mut self.ints {
            *col = gather(col, rows);
        }
        for col in &mut self.flts {
            *col = gather(col, rows);
        }
        for col in &mut self.strs {
            *col = gather(col, rows);
        }
    }

    #[inline]
    pub(crate) fn int(&self, index: usize, row: usize) -> i64 {
        self.ints[index][row]
    }

    #[inline]
    pub(crate) fn flt(&self, index: usize, row: usize) -> f64 {
        self.flts[index][row]
    }

    #[inline]
    pub(crate) fn str_id(&self, index: usize, row: usize) -> StringId {
        self.strs[index][row]
    }

    /// Value of a numeric column widened to `f64`.
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn numeric(&self, col: ColumnRef, row: usize) -> Option<f64> {
        match col.ty {
            ColumnType::Int => Some(self.int(col.index, row) as f64),
            ColumnType::Float => Some(self.flt(col.index, row)),
            ColumnType::Str => None,
        }
    }
}

pub(crate) fn gather<T: Copy>(values: &[T], rows: &[usize]) -> Vec<T> {
    rows.iter().map(|&r| values[r]).collect()
}
