//! Multi-key row comparison and chain reordering.
//!
//! Sorting permutes the row chain only; column arrays stay in place. The
//! serial path is a quicksort with median-of-three pivots that falls back to
//! insertion sort for small partitions. The parallel path sorts contiguous
//! chunks on rayon workers and merges adjacent runs pairwise; ties between
//! runs go to the earlier run.

use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

use super::{ColumnData, Table};
use crate::error::{Error, Result};
use crate::schema::{ColumnRef, ColumnType};
use crate::string_pool::StringPool;

/// Sort request for [`Table::order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Sort keys, most significant first.
    pub columns: Vec<String>,
    /// Optional integer column receiving each row's rank.
    pub rank_column: Option<String>,
    /// Restart the rank at 0 whenever the most significant key changes.
    pub reset_rank_by_msc: bool,
    /// Ascending (default) or descending order.
    pub ascending: bool,
}

impl SortSpec {
    /// Ascending sort on `columns`.
    #[must_use]
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rank_column: None,
            reset_rank_by_msc: false,
            ascending: true,
        }
    }

    /// Sorts in descending order.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    /// Records ranks into `column`.
    #[must_use]
    pub fn with_rank(mut self, column: &str) -> Self {
        self.rank_column = Some(column.to_string());
        self
    }

    /// Restarts ranks at every change of the most significant key.
    #[must_use]
    pub fn reset_rank_by_msc(mut self) -> Self {
        self.reset_rank_by_msc = true;
        self
    }
}

struct RowComparator<'a> {
    table: &'a Table,
    pool: &'a StringPool,
    keys: Vec<ColumnRef>,
    ascending: bool,
}

impl RowComparator<'_> {
    fn cmp_key(&self, key: ColumnRef, a: usize, b: usize) -> Ordering {
        let cols = &self.table.columns;
        match key.ty {
            ColumnType::Int => cols.int(key.index, a).cmp(&cols.int(key.index, b)),
            ColumnType::Float => cols.flt(key.index, a).total_cmp(&cols.flt(key.index, b)),
            ColumnType::Str => {
                let (x, y) = (cols.str_id(key.index, a), cols.str_id(key.index, b));
                if x == y {
                    Ordering::Equal
                } else {
                    self.pool
                        .get(x)
                        .unwrap_or_default()
                        .cmp(self.pool.get(y).unwrap_or_default())
                }
            }
        }
    }

    fn compare(&self, a: usize, b: usize) -> Ordering {
        for &key in &self.keys {
            match self.cmp_key(key, a, b) {
                Ordering::Equal => {}
                ord if self.ascending => return ord,
                ord => return ord.reverse(),
            }
        }
        Ordering::Equal
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.compare(a, b) == Ordering::Less
    }
}

fn insertion_sort(v: &mut [usize], cmp: &RowComparator<'_>) {
    for i in 1..v.len() {
        let mut j = i;
        while j > 0 && cmp.less(v[j], v[j - 1]) {
            v.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn median_of_three(v: &mut [usize], cmp: &RowComparator<'_>) {
    let (lo, mid, hi) = (0, v.len() / 2, v.len() - 1);
    if cmp.less(v[mid], v[lo]) {
        v.swap(mid, lo);
    }
    if cmp.less(v[hi], v[lo]) {
        v.swap(hi, lo);
    }
    if cmp.less(v[hi], v[mid]) {
        v.swap(hi, mid);
    }
    // Pivot parked at the end.
    v.swap(mid, hi);
}

fn partition(v: &mut [usize], cmp: &RowComparator<'_>) -> usize {
    median_of_three(v, cmp);
    let pivot = v[v.len() - 1];
    let mut store = 0;
    for i in 0..v.len() - 1 {
        if cmp.less(v[i], pivot) {
            v.swap(i, store);
            store += 1;
        }
    }
    let last = v.len() - 1;
    v.swap(store, last);
    store
}

fn quick_sort(mut v: &mut [usize], cmp: &RowComparator<'_>, threshold: usize) {
    // Recurse into the smaller side, loop on the larger one.
    while v.len() > threshold {
        let slice = std::mem::take(&mut v);
        let p = partition(slice, cmp);
        let (left, right) = slice.split_at_mut(p);
        let right = &mut right[1..];
        if left.len() < right.len() {
            quick_sort(left, cmp, threshold);
            v = right;
        } else {
            quick_sort(right, cmp, threshold);
            v = left;
        }
    }
    insertion_sort(v, cmp);
}

fn merge_runs(a: &[usize], b: &[usize], cmp: &RowComparator<'_>) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if cmp.less(b[j], a[i]) {
            out.push(b[j]);
            j += 1;
        } else {
            out.push(a[i]);
            i += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn parallel_sort(v: &mut Vec<usize>, cmp: &RowComparator<'_>, threshold: usize, chunk_len: usize) {
    v.par_chunks_mut(chunk_len)
        .for_each(|chunk| quick_sort(chunk, cmp, threshold));
    let mut runs: Vec<Vec<usize>> = v.chunks(chunk_len).map(<[usize]>::to_vec).collect();
    while runs.len() > 1 {
        runs = runs
            .par_chunks(2)
            .map(|pair| match pair {
                [a, b] => merge_runs(a, b, cmp),
                [a] => a.clone(),
                _ => Vec::new(),
            })
            .collect();
    }
    if let Some(sorted) = runs.pop() {
        *v = sorted;
    }
}

impl Table {
    fn sort_keys(&self, columns: &[String]) -> Result<Vec<ColumnRef>> {
        if columns.is_empty() {
            return Err(Error::InvalidArgument("sort needs at least one column".to_string()));
        }
        columns.iter().map(|c| self.schema.resolve(c)).collect()
    }

    /// Compares two physical rows on `columns`, most significant first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] or [`Error::RowOutOfRange`].
    pub fn compare_rows(&self, a: usize, b: usize, columns: &[&str], ascending: bool) -> Result<Ordering> {
        self.check_row(a)?;
        self.check_row(b)?;
        let names: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
        let keys = self.sort_keys(&names)?;
        let pool = self.context.pool();
        let cmp = RowComparator {
            table: self,
            pool: &pool,
            keys,
            ascending,
        };
        Ok(cmp.compare(a, b))
    }

    /// Valid rows sorted by `columns` (the chain is not modified).
    pub(crate) fn sorted_rows(&self, columns: &[String], ascending: bool) -> Result<Vec<usize>> {
        let keys = self.sort_keys(columns)?;
        let exec = self.context.execution();
        let mut rows = self.chain.logical_rows();
        let pool = self.context.pool();
        let cmp = RowComparator {
            table: self,
            pool: &pool,
            keys,
            ascending,
        };
        if exec.use_parallel(rows.len()) {
            let chunk = exec.chunk_len(rows.len());
            parallel_sort(&mut rows, &cmp, exec.insertion_sort_threshold, chunk);
        } else {
            quick_sort(&mut rows, &cmp, exec.insertion_sort_threshold);
        }
        Ok(rows)
    }

    /// Reorders the row chain by the requested keys, optionally writing ranks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] for unknown keys and
    /// [`Error::TypeMismatch`] if the rank column exists with a non-integer
    /// type. The table is untouched on error.
    pub fn order(&mut self, spec: &SortSpec) -> Result<()> {
        if let Some(rank) = &spec.rank_column {
            self.ensure_target_type(rank, ColumnType::Int)?;
        }
        let rows = self.sorted_rows(&spec.columns, spec.ascending)?;

        let ranks = match &spec.rank_column {
            Some(_) => Some(self.ranks(&rows, spec)?),
            None => None,
        };
        self.chain.relink(&rows);
        self.touch();
        if let (Some(rank_col), Some(ranks)) = (&spec.rank_column, ranks) {
            self.write_column(rank_col, ColumnData::Int(ranks))?;
        }
        debug!(columns = ?spec.columns, rows = rows.len(), ascending = spec.ascending, "Ordered table");
        Ok(())
    }

    fn ranks(&self, sorted: &[usize], spec: &SortSpec) -> Result<Vec<i64>> {
        let msc = self.schema.resolve(&spec.columns[0])?;
        let pool = self.context.pool();
        let cmp = RowComparator {
            table: self,
            pool: &pool,
            keys: vec![msc],
            ascending: true,
        };
        let mut ranks = vec![0i64; self.num_rows()];
        let mut rank = 0i64;
        for (pos, &row) in sorted.iter().enumerate() {
            if pos > 0 && spec.reset_rank_by_msc && cmp.compare(sorted[pos - 1], row) != Ordering::Equal {
                rank = 0;
            }
            ranks[row] = rank;
            rank += 1;
        }
        Ok(ranks)
    }

    /// Shorthand for [`Table::order`] without ranks.
    ///
    /// # Errors
    ///
    /// See [`Table::order`].
    pub fn order_by(&mut self, columns: &[&str], ascending: bool) -> Result<()> {
        let mut spec = SortSpec::new(columns);
        spec.ascending = ascending;
        self.order(&spec)
    }
}
