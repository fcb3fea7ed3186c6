//! Element-wise arithmetic and string concatenation over columns.
//!
//! Integer operands produce integers; a float on either side promotes the
//! result to float. An empty result name writes back into the first operand
//! column, which must then be able to hold the result type.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ColumnData, Table};
use crate::error::{Error, Result};
use crate::schema::{normalize_col_name, ColumnType, Primitive};
use crate::string_pool::StringId;

/// Element-wise binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b` (integer division truncates)
    Div,
    /// `a % b`
    Mod,
    /// `min(a, b)`
    Min,
    /// `max(a, b)`
    Max,
}

impl ArithOp {
    fn apply_int(self, a: i64, b: i64, row: usize) -> Result<i64> {
        Ok(match self {
            Self::Add => a.wrapping_add(b),
            Self::Sub => a.wrapping_sub(b),
            Self::Mul => a.wrapping_mul(b),
            Self::Div | Self::Mod if b == 0 => return Err(Error::DivisionByZero { row }),
            Self::Div => a.wrapping_div(b),
            Self::Mod => a.wrapping_rem(b),
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        })
    }

    fn apply_float(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Mod => a % b,
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        }
    }
}

/// Numeric values of one operand, aligned with a row list.
enum Values {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Values {
    #[allow(clippy::cast_precision_loss)]
    fn into_floats(self) -> Vec<f64> {
        match self {
            Self::Int(v) => v.into_iter().map(|x| x as f64).collect(),
            Self::Float(v) => v,
        }
    }
}

/// Applies `op` pair-wise; `rows` are the physical rows reported on errors.
fn combine(op: ArithOp, lhs: Values, rhs: Values, rows: &[usize], float_out: bool) -> Result<Values> {
    match (lhs, rhs) {
        (Values::Int(a), Values::Int(b)) if !float_out => a
            .iter()
            .zip(&b)
            .zip(rows)
            .map(|((&x, &y), &row)| op.apply_int(x, y, row))
            .collect::<Result<_>>()
            .map(Values::Int),
        (lhs, rhs) => {
            let (a, b) = (lhs.into_floats(), rhs.into_floats());
            Ok(Values::Float(
                a.iter().zip(&b).map(|(&x, &y)| op.apply_float(x, y)).collect(),
            ))
        }
    }
}

impl Table {
    fn numeric_values(&self, col: &str, rows: &[usize]) -> Result<Values> {
        let c = self.schema.resolve(col)?;
        match c.ty {
            ColumnType::Int => Ok(Values::Int(rows.iter().map(|&r| self.columns.int(c.index, r)).collect())),
            ColumnType::Float => {
                Ok(Values::Float(rows.iter().map(|&r| self.columns.flt(c.index, r)).collect()))
            }
            ColumnType::Str => Err(Error::type_mismatch(
                &normalize_col_name(col),
                ColumnType::Float,
                ColumnType::Str,
            )),
        }
    }

    fn string_ids(&self, col: &str, rows: &[usize]) -> Result<Vec<StringId>> {
        let c = self.schema.resolve_typed(col, ColumnType::Str)?;
        Ok(rows.iter().map(|&r| self.columns.str_id(c.index, r)).collect())
    }

    /// Writes `values` (aligned with `rows`) into the column named `target`.
    fn write_values(&mut self, target: &str, rows: &[usize], values: Values) -> Result<()> {
        let total = self.num_rows();
        let data = match values {
            Values::Int(v) => ColumnData::Int(scatter(&v, rows, 0, total)),
            Values::Float(v) => ColumnData::Float(scatter(&v, rows, 0.0, total)),
        };
        self.write_column(target, data).map(|_| ())
    }

    fn result_target<'a>(col1: &'a str, result: &'a str) -> &'a str {
        if result.is_empty() {
            col1
        } else {
            result
        }
    }

    /// `result = col1 op col2` for every valid row.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown or string operands,
    /// [`Error::TypeMismatch`] if the target column cannot hold the result
    /// type and [`Error::DivisionByZero`] for an integer divisor of zero.
    /// Nothing is written on error.
    pub fn col_op(&mut self, col1: &str, col2: &str, result: &str, op: ArithOp) -> Result<()> {
        let rows = self.chain.logical_rows();
        let lhs = self.numeric_values(col1, &rows)?;
        let rhs = self.numeric_values(col2, &rows)?;
        let values = combine(op, lhs, rhs, &rows, false)?;
        self.write_values(Self::result_target(col1, result), &rows, values)?;
        debug!(?op, rows = rows.len(), "Column operation");
        Ok(())
    }

    /// `result = col op scalar`. With `float_cast` the result is a float
    /// column even for integer operands.
    ///
    /// # Errors
    ///
    /// See [`Table::col_op`]; a string scalar is [`Error::InvalidArgument`].
    pub fn col_op_scalar(
        &mut self,
        col: &str,
        scalar: impl Into<Primitive>,
        result: &str,
        op: ArithOp,
        float_cast: bool,
    ) -> Result<()> {
        let rows = self.chain.logical_rows();
        let lhs = self.numeric_values(col, &rows)?;
        let rhs = match scalar.into() {
            Primitive::Int(v) => Values::Int(vec![v; rows.len()]),
            Primitive::Float(v) => Values::Float(vec![v; rows.len()]),
            Primitive::Str(s) => {
                return Err(Error::InvalidArgument(format!(
                    "arithmetic scalar must be numeric, got '{s}'"
                )))
            }
        };
        let values = combine(op, lhs, rhs, &rows, float_cast)?;
        self.write_values(Self::result_target(col, result), &rows, values)
    }

    /// `col1 op other.col2`, pairing valid rows of both tables in logical
    /// order. The result lands in this table when `add_to_first`, else in
    /// `other`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSchema`] if the valid row counts differ,
    /// plus the errors of [`Table::col_op`].
    #[allow(clippy::too_many_arguments)]
    pub fn col_op_with(
        &mut self,
        col1: &str,
        other: &mut Table,
        col2: &str,
        result: &str,
        op: ArithOp,
        add_to_first: bool,
    ) -> Result<()> {
        check_aligned(self, other)?;
        let left_rows = self.chain.logical_rows();
        let right_rows = other.chain.logical_rows();
        let lhs = self.numeric_values(col1, &left_rows)?;
        let rhs = other.numeric_values(col2, &right_rows)?;
        if add_to_first {
            let values = combine(op, lhs, rhs, &left_rows, false)?;
            self.write_values(Self::result_target(col1, result), &left_rows, values)
        } else {
            let values = combine(op, lhs, rhs, &right_rows, false)?;
            other.write_values(Self::result_target(col2, result), &right_rows, values)
        }
    }

    /// `result = col1 + col2`.
    ///
    /// # Errors
    ///
    /// See [`Table::col_op`].
    pub fn col_add(&mut self, col1: &str, col2: &str, result: &str) -> Result<()> {
        self.col_op(col1, col2, result, ArithOp::Add)
    }

    /// `result = col1 - col2`.
    ///
    /// # Errors
    ///
    /// See [`Table::col_op`].
    pub fn col_sub(&mut self, col1: &str, col2: &str, result: &str) -> Result<()> {
        self.col_op(col1, col2, result, ArithOp::Sub)
    }

    /// `result = col1 * col2`.
    ///
    /// # Errors
    ///
    /// See [`Table::col_op`].
    pub fn col_mul(&mut self, col1: &str, col2: &str, result: &str) -> Result<()> {
        self.col_op(col1, col2, result, ArithOp::Mul)
    }

    /// `result = col1 / col2`.
    ///
    /// # Errors
    ///
    /// See [`Table::col_op`].
    pub fn col_div(&mut self, col1: &str, col2: &str, result: &str) -> Result<()> {
        self.col_op(col1, col2, result, ArithOp::Div)
    }

    /// `result = col1 % col2`.
    ///
    /// # Errors
    ///
    /// See [`Table::col_op`].
    pub fn col_mod(&mut self, col1: &str, col2: &str, result: &str) -> Result<()> {
        self.col_op(col1, col2, result, ArithOp::Mod)
    }

    /// `result = min(col1, col2)`.
    ///
    /// # Errors
    ///
    /// See [`Table::col_op`].
    pub fn col_min(&mut self, col1: &str, col2: &str, result: &str) -> Result<()> {
        self.col_op(col1, col2, result, ArithOp::Min)
    }

    /// `result = max(col1, col2)`.
    ///
    /// # Errors
    ///
    /// See [`Table::col_op`].
    pub fn col_max(&mut self, col1: &str, col2: &str, result: &str) -> Result<()> {
        self.col_op(col1, col2, result, ArithOp::Max)
    }

    // ========================================================================
    // Concatenation
    // ========================================================================

    fn write_concat(&mut self, target: &str, rows: &[usize], joined: &[String]) -> Result<()> {
        let (ids, empty) = {
            let mut pool = self.context.pool_mut();
            let ids: Vec<StringId> = joined.iter().map(|s| pool.intern(s)).collect();
            (ids, pool.intern(""))
        };
        let data = ColumnData::Str(scatter(&ids, rows, empty, self.num_rows()));
        self.write_column(target, data).map(|_| ())
    }

    fn concat_values(&self, lhs: &[StringId], rhs: &[StringId], sep: &str) -> Result<Vec<String>> {
        let pool = self.context.pool();
        lhs.iter()
            .zip(rhs)
            .map(|(&a, &b)| Ok(format!("{}{sep}{}", pool.resolve(a)?, pool.resolve(b)?)))
            .collect()
    }

    /// `result = col1 + sep + col2` over two string columns.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown or non-string columns.
    pub fn col_concat(&mut self, col1: &str, col2: &str, sep: &str, result: &str) -> Result<()> {
        let rows = self.chain.logical_rows();
        let lhs = self.string_ids(col1, &rows)?;
        let rhs = self.string_ids(col2, &rows)?;
        let joined = self.concat_values(&lhs, &rhs, sep)?;
        self.write_concat(Self::result_target(col1, result), &rows, &joined)
    }

    /// `result = col + sep + value`.
    ///
    /// # Errors
    ///
    /// Returns a schema error for an unknown or non-string column.
    pub fn col_concat_const(&mut self, col: &str, value: &str, sep: &str, result: &str) -> Result<()> {
        let rows = self.chain.logical_rows();
        let lhs = self.string_ids(col, &rows)?;
        let joined: Vec<String> = {
            let pool = self.context.pool();
            lhs.iter()
                .map(|&id| pool.resolve(id).map(|s| format!("{s}{sep}{value}")))
                .collect::<Result<_>>()?
        };
        self.write_concat(Self::result_target(col, result), &rows, &joined)
    }

    /// Concatenates `col1` with `other.col2`, pairing valid rows in logical
    /// order; the result lands in this table when `add_to_first`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleSchema`] if the valid row counts differ
    /// and schema errors for unknown or non-string columns.
    #[allow(clippy::too_many_arguments)]
    pub fn col_concat_with(
        &mut self,
        col1: &str,
        other: &mut Table,
        col2: &str,
        sep: &str,
        result: &str,
        add_to_first: bool,
    ) -> Result<()> {
        check_aligned(self, other)?;
        let left_rows = self.chain.logical_rows();
        let right_rows = other.chain.logical_rows();
        let lhs: Vec<String> = {
            let ids = self.string_ids(col1, &left_rows)?;
            let pool = self.context.pool();
            ids.iter().map(|&id| pool.resolve(id).map(str::to_string)).collect::<Result<_>>()?
        };
        let rhs: Vec<String> = {
            let ids = other.string_ids(col2, &right_rows)?;
            let pool = other.context.pool();
            ids.iter().map(|&id| pool.resolve(id).map(str::to_string)).collect::<Result<_>>()?
        };
        let joined: Vec<String> = lhs.iter().zip(&rhs).map(|(a, b)| format!("{a}{sep}{b}")).collect();
        if add_to_first {
            self.write_concat(Self::result_target(col1, result), &left_rows, &joined)
        } else {
            other.write_concat(Self::result_target(col2, result), &right_rows, &joined)
        }
    }
}

fn check_aligned(left: &Table, right: &Table) -> Result<()> {
    if left.num_valid_rows() != right.num_valid_rows() {
        return Err(Error::IncompatibleSchema(format!(
            "tables have {} and {} valid rows",
            left.num_valid_rows(),
            right.num_valid_rows()
        )));
    }
    Ok(())
}

/// Full-length array holding `values[i]` at `rows[i]` and `fill` elsewhere.
fn scatter<T: Copy>(values: &[T], rows: &[usize], fill: T, total: usize) -> Vec<T> {
    let mut out = vec![fill; total];
    for (&row, &v) in rows.iter().zip(values) {
        out[row] = v;
    }
    out
}
