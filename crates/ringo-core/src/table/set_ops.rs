//! Set operations over tables with position-compatible schemas.
//!
//! Two rows are equal when every column holds the same value, strings compared
//! by resolved content so tables from different contexts compare correctly.
//! The `_id` bookkeeping column takes no part in row equality. Results live in
//! the left table's context and keep its schema.

use roaring::RoaringBitmap;
use rustc_hash::FxHashSet;
use tracing::debug;

use super::group::row_u32;
use super::{Table, ID_COL};
use crate::error::Result;
use crate::schema::{ColumnRef, ColumnType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey {
    Int(i64),
    Float(u64),
    Str(String),
}

type RowSignature = Vec<CellKey>;

impl Table {
    fn signature_columns(&self) -> Vec<ColumnRef> {
        self.schema
            .iter()
            .filter(|(name, _)| *name != ID_COL)
            .map(|(_, col)| col)
            .collect()
    }

    fn signatures(&self, rows: &[usize]) -> Result<Vec<RowSignature>> {
        let cols = self.signature_columns();
        let pool = self.context.pool();
        rows.iter()
            .map(|&row| {
                cols.iter()
                    .map(|c| {
                        Ok(match c.ty {
                            ColumnType::Int => CellKey::Int(self.columns.int(c.index, row)),
                            ColumnType::Float => CellKey::Float(self.columns.flt(c.index, row).to_bits()),
                            ColumnType::Str => {
                                CellKey::Str(pool.resolve(self.columns.str_id(c.index, row))?.to_string())
                            }
                        })
                    })
                    .collect()
            })
            .collect()
    }

    fn signature_set(&self) -> Result<FxHashSet<RowSignature>> {
        Ok(self.signatures(&self.chain.logical_rows())?.into_iter().collect())
    }

    /// Valid rows of `self`, first occurrence of each distinct row, filtered
    /// by membership of their signature in `other` (`keep_members`) or not.
    fn distinct_rows_where(
        &self,
        other: Option<(&FxHashSet<RowSignature>, bool)>,
    ) -> Result<Vec<usize>> {
        let rows = self.chain.logical_rows();
        let sigs = self.signatures(&rows)?;
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for (row, sig) in rows.into_iter().zip(sigs) {
            if let Some((set, keep_members)) = other {
                if set.contains(&sig) != keep_members {
                    continue;
                }
            }
            if seen.insert(sig) {
                out.push(row);
            }
        }
        Ok(out)
    }

    /// Distinct rows appearing in either table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::IncompatibleSchema`] if column types differ by
    /// position.
    pub fn union(&self, other: &Table) -> Result<Table> {
        self.check_compatible(other)?;
        let own = self.distinct_rows_where(None)?;
        let mut seen: FxHashSet<RowSignature> = self.signatures(&own)?.into_iter().collect();

        let candidates = other.chain.logical_rows();
        let theirs: Vec<usize> = candidates
            .iter()
            .copied()
            .zip(other.signatures(&candidates)?)
            .filter_map(|(row, sig)| seen.insert(sig).then_some(row))
            .collect();

        let mut out = self.copy_rows(&own);
        let bridge = out.bridge_from(other)?;
        out.push_rows_from(other, &theirs, &bridge);
        debug!(rows = out.num_valid_rows(), "Union");
        Ok(out)
    }

    /// Every valid row of `self` followed by every valid row of `other`.
    ///
    /// # Errors
    ///
    /// See [`Table::union`].
    pub fn union_all(&self, other: &Table) -> Result<Table> {
        self.check_compatible(other)?;
        let mut out = self.copy_rows(&self.chain.logical_rows());
        out.add_table(other)?;
        Ok(out)
    }

    /// Appends every valid row of `other` to this table.
    ///
    /// # Errors
    ///
    /// See [`Table::union`].
    pub fn union_all_in_place(&mut self, other: &Table) -> Result<()> {
        self.add_table(other)
    }

    /// Distinct rows of `self` that also appear in `other`.
    ///
    /// # Errors
    ///
    /// See [`Table::union`].
    pub fn intersection(&self, other: &Table) -> Result<Table> {
        self.check_compatible(other)?;
        let theirs = other.signature_set()?;
        let rows = self.distinct_rows_where(Some((&theirs, true)))?;
        debug!(rows = rows.len(), "Intersection");
        Ok(self.copy_rows(&rows))
    }

    /// Distinct rows of `self` that do not appear in `other`.
    ///
    /// # Errors
    ///
    /// See [`Table::union`].
    pub fn minus(&self, other: &Table) -> Result<Table> {
        self.check_compatible(other)?;
        let theirs = other.signature_set()?;
        let rows = self.distinct_rows_where(Some((&theirs, false)))?;
        debug!(rows = rows.len(), "Minus");
        Ok(self.copy_rows(&rows))
    }

    /// Physical rows of this table whose value tuple also occurs in `other`.
    ///
    /// # Errors
    ///
    /// See [`Table::union`]; also fails if a row index exceeds `u32`.
    pub fn colliding_rows(&self, other: &Table) -> Result<RoaringBitmap> {
        self.check_compatible(other)?;
        let theirs = other.signature_set()?;
        let rows = self.chain.logical_rows();
        let mut out = RoaringBitmap::new();
        for (row, sig) in rows.iter().zip(self.signatures(&rows)?) {
            if theirs.contains(&sig) {
                out.insert(row_u32(*row)?);
            }
        }
        Ok(out)
    }
}
