//! Hash grouping of rows by one or more columns.
//!
//! Composite keys hold integer components (integer values and string pool
//! ids) and float components. Unordered grouping numbers groups in first
//! encounter order along the row chain; ordered grouping numbers them in
//! ascending key order.
//!
//! In parallel mode the logical row sequence is split into contiguous chunks,
//! each chunk is grouped locally, and local partitions are merged in chunk
//! order. The merge reproduces the serial first-encounter numbering exactly.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use tracing::debug;

use super::{ColumnData, Table};
use crate::error::{Error, Result};
use crate::schema::{normalize_col_name, ColumnRef, ColumnType};

/// Composite grouping key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupKey {
    /// Integer components: integer values and string pool ids, in column order.
    pub ints: Vec<i64>,
    /// Float components, in column order.
    pub flts: Vec<f64>,
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.ints == other.ints
            && self.flts.len() == other.flts.len()
            && self
                .flts
                .iter()
                .zip(&other.flts)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ints.hash(state);
        for f in &self.flts {
            f.to_bits().hash(state);
        }
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ints.cmp(&other.ints).then_with(|| {
            for (a, b) in self.flts.iter().zip(&other.flts) {
                match a.total_cmp(b) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
            }
            self.flts.len().cmp(&other.flts.len())
        })
    }
}

/// Identity of a grouping: normalized column names plus the ordered flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Normalized group-by column names.
    pub columns: Vec<String>,
    /// Whether group ids follow ascending key order.
    pub ordered: bool,
}

impl GroupSpec {
    /// Creates a spec, normalizing column names.
    #[must_use]
    pub fn new(columns: &[&str], ordered: bool) -> Self {
        Self {
            columns: columns.iter().map(|c| normalize_col_name(c)).collect(),
            ordered,
        }
    }
}

/// Materialized grouping: group id -> key and group id -> rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStatement {
    spec: GroupSpec,
    keys: Vec<GroupKey>,
    rows: Vec<Vec<usize>>,
    generation: u64,
}

impl GroupStatement {
    /// Spec this statement was computed for.
    #[must_use]
    pub fn spec(&self) -> &GroupSpec {
        &self.spec
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Representative key of group `gid`.
    #[must_use]
    pub fn key(&self, gid: usize) -> Option<&GroupKey> {
        self.keys.get(gid)
    }

    /// Rows of group `gid` in logical order.
    #[must_use]
    pub fn rows(&self, gid: usize) -> Option<&[usize]> {
        self.rows.get(gid).map(Vec::as_slice)
    }

    /// Group id of `key`.
    #[must_use]
    pub fn find(&self, key: &GroupKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Iterates `(group id, key, rows)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &GroupKey, &[usize])> + '_ {
        self.keys
            .iter()
            .zip(&self.rows)
            .enumerate()
            .map(|(gid, (key, rows))| (gid, key, rows.as_slice()))
    }

    /// Group id per physical row; rows outside every group map to `None`.
    pub(crate) fn assignment(&self, total: usize) -> Vec<Option<usize>> {
        let mut out = vec![None; total];
        for (gid, rows) in self.rows.iter().enumerate() {
            for &row in rows {
                out[row] = Some(gid);
            }
        }
        out
    }
}

/// Cached statements plus the result-column registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct GroupCache {
    statements: IndexMap<GroupSpec, GroupStatement>,
    names: IndexMap<String, GroupSpec>,
}

impl GroupCache {
    fn fresh(&self, spec: &GroupSpec, generation: u64) -> Option<&GroupStatement> {
        self.statements
            .get(spec)
            .filter(|stmt| stmt.generation == generation)
    }

    pub(crate) fn clear(&mut self) {
        self.statements.clear();
        self.names.clear();
    }

    /// Drops statements whose key columns include `column`.
    pub(crate) fn invalidate_column(&mut self, column: &str) {
        self.statements
            .retain(|spec, _| !spec.columns.iter().any(|c| c == column));
        self.names
            .retain(|name, spec| name != column && !spec.columns.iter().any(|c| c == column));
    }
}

impl Table {
    pub(crate) fn key_columns(&self, spec: &GroupSpec) -> Result<Vec<ColumnRef>> {
        if spec.columns.is_empty() {
            return Err(Error::InvalidArgument(
                "grouping needs at least one column".to_string(),
            ));
        }
        spec.columns.iter().map(|c| self.schema.resolve(c)).collect()
    }

    pub(crate) fn group_key(&self, cols: &[ColumnRef], row: usize) -> GroupKey {
        let mut key = GroupKey::default();
        for col in cols {
            match col.ty {
                ColumnType::Int => key.ints.push(self.columns.int(col.index, row)),
                ColumnType::Str => key.ints.push(self.columns.str_id(col.index, row).as_key()),
                ColumnType::Float => key.flts.push(self.columns.flt(col.index, row)),
            }
        }
        key
    }

    /// Computes a grouping over `rows` (logical order) without touching the cache.
    pub(crate) fn compute_groups(&self, spec: &GroupSpec, rows: &[usize]) -> Result<GroupStatement> {
        let cols = self.key_columns(spec)?;
        let exec = self.context.execution();

        let mut partition: IndexMap<GroupKey, Vec<usize>> = if exec.use_parallel(rows.len()) {
            let locals: Vec<IndexMap<GroupKey, Vec<usize>>> = rows
                .par_chunks(exec.chunk_len(rows.len()))
                .map(|chunk| self.partition(&cols, chunk))
                .collect();
            let mut merged: IndexMap<GroupKey, Vec<usize>> = IndexMap::new();
            for local in locals {
                for (key, mut members) in local {
                    merged.entry(key).or_default().append(&mut members);
                }
            }
            merged
        } else {
            self.partition(&cols, rows)
        };

        if spec.ordered {
            partition.sort_unstable_keys();
        }
        let (keys, rows): (Vec<GroupKey>, Vec<Vec<usize>>) = partition.into_iter().unzip();
        debug!(
            columns = ?spec.columns,
            ordered = spec.ordered,
            groups = keys.len(),
            "Computed grouping"
        );
        Ok(GroupStatement {
            spec: spec.clone(),
            keys,
            rows,
            generation: self.generation,
        })
    }

    fn partition(&self, cols: &[ColumnRef], rows: &[usize]) -> IndexMap<GroupKey, Vec<usize>> {
        let mut out: IndexMap<GroupKey, Vec<usize>> = IndexMap::new();
        for &row in rows {
            out.entry(self.group_key(cols, row)).or_default().push(row);
        }
        out
    }

    /// Cached grouping of all valid rows, recomputed if stale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if a group-by column is unknown.
    pub fn group_by(&mut self, columns: &[&str], ordered: bool) -> Result<&GroupStatement> {
        let spec = GroupSpec::new(columns, ordered);
        if self.groups.fresh(&spec, self.generation).is_none() {
            let rows = self.chain.logical_rows();
            let stmt = self.compute_groups(&spec, &rows)?;
            self.groups.statements.insert(spec.clone(), stmt);
        }
        self.groups
            .statements
            .get(&spec)
            .ok_or_else(|| Error::InvalidState("group statement missing after insert".to_string()))
    }

    /// Groups valid rows and writes each row's group id into `result_col`.
    ///
    /// An empty `result_col` only computes (and caches) the grouping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] for unknown group-by columns and
    /// [`Error::TypeMismatch`] if `result_col` exists with a non-integer type.
    pub fn group(&mut self, columns: &[&str], result_col: &str, ordered: bool) -> Result<()> {
        if !result_col.is_empty() {
            self.ensure_target_type(result_col, ColumnType::Int)?;
        }
        let total = self.num_rows();
        let stmt = self.group_by(columns, ordered)?;
        if result_col.is_empty() {
            return Ok(());
        }
        let spec = stmt.spec().clone();
        let ids: Vec<i64> = stmt
            .assignment(total)
            .into_iter()
            .map(|gid| gid.map_or(0, |g| g as i64))
            .collect();
        self.write_column(result_col, ColumnData::Int(ids))?;
        self.groups.names.insert(normalize_col_name(result_col), spec);
        Ok(())
    }

    /// Writes into `result_col` the size of each row's group when grouped by `column`.
    ///
    /// # Errors
    ///
    /// See [`Table::group`].
    pub fn count(&mut self, result_col: &str, column: &str) -> Result<()> {
        self.ensure_target_type(result_col, ColumnType::Int)?;
        let total = self.num_rows();
        let stmt = self.group_by(&[column], false)?;
        let mut counts = vec![0i64; total];
        for (_, _, rows) in stmt.iter() {
            for &row in rows {
                counts[row] = rows.len() as i64;
            }
        }
        self.write_column(result_col, ColumnData::Int(counts))?;
        Ok(())
    }

    /// Keeps the first row (logical order) of each group and soft-deletes the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] for unknown columns.
    pub fn unique(&mut self, columns: &[&str], ordered: bool) -> Result<()> {
        let stmt = self.group_by(columns, ordered)?;
        let mut keep = roaring::RoaringBitmap::new();
        for (_, _, rows) in stmt.iter() {
            if let Some(&first) = rows.first() {
                keep.insert(row_u32(first)?);
            }
        }
        let doomed: Vec<usize> = self
            .chain
            .iter()
            .filter(|&row| u32::try_from(row).map_or(true, |r| !keep.contains(r)))
            .collect();
        debug!(removed = doomed.len(), kept = keep.len(), "Unique");
        for row in doomed {
            self.remove_row(row)?;
        }
        Ok(())
    }

    /// Splits the valid rows into one table per group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] for unknown columns.
    pub fn splice_by_group(&mut self, columns: &[&str], ordered: bool) -> Result<Vec<Table>> {
        let groups: Vec<Vec<usize>> = self
            .group_by(columns, ordered)?
            .iter()
            .map(|(_, _, rows)| rows.to_vec())
            .collect();
        Ok(groups.iter().map(|rows| self.copy_rows(rows)).collect())
    }

    /// Group statement registered for the group-id column `result_col`.
    #[must_use]
    pub fn group_statement(&self, result_col: &str) -> Option<&GroupStatement> {
        let spec = self.groups.names.get(&normalize_col_name(result_col))?;
        self.groups.fresh(spec, self.generation)
    }
}

pub(crate) fn row_u32(row: usize) -> Result<u32> {
    u32::try_from(row).map_err(|_| Error::InvalidArgument(format!("row {row} exceeds u32 range")))
}
