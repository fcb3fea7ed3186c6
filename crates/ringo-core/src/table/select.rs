//! Predicate selection and classification.

use tracing::debug;

use super::{ColumnData, Table};
use crate::error::Result;
use crate::predicate::{CompareOp, CompiledPredicate, Predicate, PredicateNode};
use crate::schema::{ColumnType, Primitive};

impl Table {
    /// Evaluates `predicate` on physical `row`.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown columns or incomparable types and
    /// [`crate::Error::RowOutOfRange`] for `row >= num_rows()`.
    pub fn evaluate(&self, predicate: &Predicate, row: usize) -> Result<bool> {
        self.check_row(row)?;
        let pool = self.context.pool();
        let compiled = CompiledPredicate::compile(predicate, &self.schema, &pool)?;
        Ok(compiled.eval(&self.columns, &pool, row))
    }

    /// Returns the valid rows matching `predicate`, in logical order.
    ///
    /// With `remove`, every matching row is soft-deleted as well. The result
    /// lists the matched rows either way.
    ///
    /// # Errors
    ///
    /// Returns a schema error if a leaf references an unknown column. The table
    /// is untouched on error.
    pub fn select(&mut self, predicate: &Predicate, remove: bool) -> Result<Vec<usize>> {
        let context = self.context.clone();
        let pool = context.pool();
        let compiled = CompiledPredicate::compile(predicate, &self.schema, &pool)?;

        let mut matched = Vec::new();
        if remove {
            let mut cursor = self.cursor();
            while let Some(next) = cursor.peek_next() {
                if compiled.eval(&cursor.table().columns, &pool, next) {
                    matched.push(next);
                    cursor.remove_next()?;
                } else {
                    cursor.advance();
                }
            }
        } else {
            matched.extend(
                self.chain
                    .iter()
                    .filter(|&row| compiled.eval(&self.columns, &pool, row)),
            );
        }
        debug!(matched = matched.len(), remove, "Selected rows");
        Ok(matched)
    }

    /// Like [`Table::select`] but only over `candidates` (deleted candidates
    /// are skipped, order of `candidates` is kept).
    ///
    /// # Errors
    ///
    /// See [`Table::select`]; also fails with a range error for candidates
    /// beyond the table.
    pub fn select_in(
        &mut self,
        predicate: &Predicate,
        candidates: &[usize],
        remove: bool,
    ) -> Result<Vec<usize>> {
        for &row in candidates {
            self.check_row(row)?;
        }
        let context = self.context.clone();
        let pool = context.pool();
        let compiled = CompiledPredicate::compile(predicate, &self.schema, &pool)?;
        let matched: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&row| self.chain.is_valid(row) && compiled.eval(&self.columns, &pool, row))
            .collect();
        drop(pool);
        if remove {
            for &row in &matched {
                self.remove_row(row)?;
            }
        }
        Ok(matched)
    }

    /// Keeps only the rows matching `predicate`; returns the number removed.
    ///
    /// # Errors
    ///
    /// See [`Table::select`].
    pub fn retain(&mut self, predicate: &Predicate) -> Result<usize> {
        self.select(&predicate.negated(), true).map(|removed| removed.len())
    }

    /// Column-vs-column selection.
    ///
    /// # Errors
    ///
    /// See [`Table::select`].
    pub fn select_atomic(
        &mut self,
        lhs: &str,
        rhs: &str,
        op: CompareOp,
        remove: bool,
    ) -> Result<Vec<usize>> {
        self.select(&PredicateNode::compare_cols(lhs, op, rhs).into(), remove)
    }

    /// Column-vs-constant selection.
    ///
    /// # Errors
    ///
    /// See [`Table::select`].
    pub fn select_atomic_const(
        &mut self,
        col: &str,
        value: impl Into<Primitive>,
        op: CompareOp,
        remove: bool,
    ) -> Result<Vec<usize>> {
        self.select(&PredicateNode::compare(col, op, value).into(), remove)
    }

    /// New table (same context) holding copies of the matching rows.
    ///
    /// # Errors
    ///
    /// See [`Table::select`].
    pub fn select_into_table(&self, predicate: &Predicate) -> Result<Table> {
        let pool = self.context.pool();
        let compiled = CompiledPredicate::compile(predicate, &self.schema, &pool)?;
        let rows: Vec<usize> = self
            .chain
            .iter()
            .filter(|&row| compiled.eval(&self.columns, &pool, row))
            .collect();
        drop(pool);
        Ok(self.copy_rows(&rows))
    }

    /// Writes `positive` into `label_col` for matching rows and `negative`
    /// for the others, instead of deleting anything.
    ///
    /// # Errors
    ///
    /// See [`Table::select`]; also [`crate::Error::TypeMismatch`] if
    /// `label_col` exists with a non-integer type.
    pub fn classify(
        &mut self,
        predicate: &Predicate,
        label_col: &str,
        positive: i64,
        negative: i64,
    ) -> Result<()> {
        self.ensure_target_type(label_col, ColumnType::Int)?;
        let labels = {
            let pool = self.context.pool();
            let compiled = CompiledPredicate::compile(predicate, &self.schema, &pool)?;
            let mut labels = vec![negative; self.num_rows()];
            for row in self.chain.iter() {
                if compiled.eval(&self.columns, &pool, row) {
                    labels[row] = positive;
                }
            }
            labels
        };
        self.write_column(label_col, ColumnData::Int(labels))?;
        Ok(())
    }

    /// [`Table::classify`] with a single column-vs-column comparison.
    ///
    /// # Errors
    ///
    /// See [`Table::classify`].
    pub fn classify_atomic(
        &mut self,
        lhs: &str,
        rhs: &str,
        op: CompareOp,
        label_col: &str,
        positive: i64,
        negative: i64,
    ) -> Result<()> {
        let predicate = PredicateNode::compare_cols(lhs, op, rhs).into();
        self.classify(&predicate, label_col, positive, negative)
    }
}
