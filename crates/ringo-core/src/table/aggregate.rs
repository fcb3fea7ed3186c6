//! Per-group and row-wise aggregation.
//!
//! Result types: `Count` always yields integers, `Mean` over integers yields
//! floats, every other policy keeps the input type. String inputs accept
//! `First`, `Last`, `Min`, `Max`, `Median` and `Count`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use super::{ColumnData, ColumnStore, RowChain, Table};
use crate::error::{Error, Result};
use crate::schema::{ColumnRef, ColumnType, Primitive, Schema};
use crate::string_pool::StringId;

/// Aggregation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggrPolicy {
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// First value in logical order.
    First,
    /// Last value in logical order.
    Last,
    /// Arithmetic mean.
    Mean,
    /// Middle element after sorting (upper middle for even counts).
    Median,
    /// Sum of values.
    Sum,
    /// Number of values.
    Count,
}

impl AggrPolicy {
    /// Type of the aggregate over values of type `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for `Sum`/`Mean` over strings.
    pub fn result_type(self, input: ColumnType) -> Result<ColumnType> {
        match (self, input) {
            (Self::Count, _) => Ok(ColumnType::Int),
            (Self::Mean, ColumnType::Int | ColumnType::Float) => Ok(ColumnType::Float),
            (Self::Sum | Self::Mean, ColumnType::Str) => Err(Error::InvalidArgument(format!(
                "{self:?} is undefined for string values"
            ))),
            (_, ty) => Ok(ty),
        }
    }
}

fn pick<T: Copy>(values: &[T], policy: AggrPolicy, cmp: impl Fn(&T, &T) -> Ordering) -> Option<T> {
    match policy {
        AggrPolicy::First => values.first().copied(),
        AggrPolicy::Last => values.last().copied(),
        AggrPolicy::Min => values.iter().copied().reduce(|a, b| if cmp(&b, &a).is_lt() { b } else { a }),
        AggrPolicy::Max => values.iter().copied().reduce(|a, b| if cmp(&b, &a).is_gt() { b } else { a }),
        AggrPolicy::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(&cmp);
            sorted.get(sorted.len() / 2).copied()
        }
        AggrPolicy::Mean | AggrPolicy::Sum | AggrPolicy::Count => None,
    }
}

fn empty_input(policy: AggrPolicy) -> Error {
    Error::EmptyTable(format!("aggregate {policy:?}"))
}

/// Aggregates integers.
///
/// # Errors
///
/// Returns [`Error::EmptyTable`] for an empty input (except `Count`).
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_ints(values: &[i64], policy: AggrPolicy) -> Result<Primitive> {
    if policy == AggrPolicy::Count {
        return Ok(Primitive::Int(values.len() as i64));
    }
    if values.is_empty() {
        return Err(empty_input(policy));
    }
    Ok(match policy {
        AggrPolicy::Sum => Primitive::Int(values.iter().fold(0i64, |acc, v| acc.wrapping_add(*v))),
        AggrPolicy::Mean => {
            Primitive::Float(values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64)
        }
        _ => Primitive::Int(pick(values, policy, Ord::cmp).ok_or_else(|| empty_input(policy))?),
    })
}

/// Aggregates floats.
///
/// # Errors
///
/// Returns [`Error::EmptyTable`] for an empty input (except `Count`).
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_floats(values: &[f64], policy: AggrPolicy) -> Result<Primitive> {
    if policy == AggrPolicy::Count {
        return Ok(Primitive::Int(values.len() as i64));
    }
    if values.is_empty() {
        return Err(empty_input(policy));
    }
    Ok(match policy {
        AggrPolicy::Sum => Primitive::Float(values.iter().sum()),
        AggrPolicy::Mean => Primitive::Float(values.iter().sum::<f64>() / values.len() as f64),
        _ => Primitive::Float(pick(values, policy, f64::total_cmp).ok_or_else(|| empty_input(policy))?),
    })
}

/// Aggregates strings (lexicographic ordering).
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for `Sum`/`Mean` and
/// [`Error::EmptyTable`] for an empty input (except `Count`).
pub fn aggregate_strs(values: &[&str], policy: AggrPolicy) -> Result<Primitive> {
    policy.result_type(ColumnType::Str)?;
    if policy == AggrPolicy::Count {
        return Ok(Primitive::Int(values.len() as i64));
    }
    pick(values, policy, |a, b| a.cmp(b))
        .map(|s| Primitive::Str(s.to_string()))
        .ok_or_else(|| empty_input(policy))
}

/// Aggregates homogeneous values (integers may be mixed with floats).
///
/// # Errors
///
/// Returns [`Error::IncompatibleSchema`] when strings are mixed with numbers,
/// plus the errors of the typed variants.
pub fn aggregate_vector(values: &[Primitive], policy: AggrPolicy) -> Result<Primitive> {
    let Some(first) = values.first() else {
        return aggregate_ints(&[], policy);
    };
    match first.ty() {
        ColumnType::Str => {
            let strs: Vec<&str> = values
                .iter()
                .map(|v| v.as_str().ok_or_else(mixed_types))
                .collect::<Result<_>>()?;
            aggregate_strs(&strs, policy)
        }
        _ if values.iter().all(|v| v.ty() == ColumnType::Int) => {
            let ints: Vec<i64> = values.iter().filter_map(Primitive::as_int).collect();
            aggregate_ints(&ints, policy)
        }
        _ => {
            let flts: Vec<f64> = values
                .iter()
                .map(|v| v.as_f64().ok_or_else(mixed_types))
                .collect::<Result<_>>()?;
            aggregate_floats(&flts, policy)
        }
    }
}

fn mixed_types() -> Error {
    Error::IncompatibleSchema("cannot aggregate strings together with numbers".to_string())
}

/// Typed accumulator for one output column.
enum Output {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<StringId>),
}

impl Output {
    fn new(ty: ColumnType, len: usize, empty: StringId) -> Self {
        match ty {
            ColumnType::Int => Self::Int(vec![0; len]),
            ColumnType::Float => Self::Float(vec![0.0; len]),
            ColumnType::Str => Self::Str(vec![empty; len]),
        }
    }

    fn set(&mut self, slot: usize, value: &Primitive, ids: &mut impl FnMut(&str) -> StringId) {
        match (self, value) {
            (Self::Int(v), Primitive::Int(x)) => v[slot] = *x,
            (Self::Float(v), p) => v[slot] = p.as_f64().unwrap_or(f64::NAN),
            (Self::Str(v), Primitive::Str(s)) => v[slot] = ids(s),
            (Self::Int(v), Primitive::Float(x)) => v[slot] = *x as i64,
            _ => {}
        }
    }

    fn into_data(self) -> ColumnData {
        match self {
            Self::Int(v) => ColumnData::Int(v),
            Self::Float(v) => ColumnData::Float(v),
            Self::Str(v) => ColumnData::Str(v),
        }
    }
}

impl Table {
    fn aggregate_rows(&self, rows: &[usize], col: ColumnRef, policy: AggrPolicy) -> Result<Primitive> {
        match col.ty {
            ColumnType::Int => {
                let values: Vec<i64> = rows.iter().map(|&r| self.columns.int(col.index, r)).collect();
                aggregate_ints(&values, policy)
            }
            ColumnType::Float => {
                let values: Vec<f64> = rows.iter().map(|&r| self.columns.flt(col.index, r)).collect();
                aggregate_floats(&values, policy)
            }
            ColumnType::Str => {
                let pool = self.context.pool();
                let values: Vec<&str> = rows
                    .iter()
                    .map(|&r| pool.resolve(self.columns.str_id(col.index, r)))
                    .collect::<Result<_>>()?;
                aggregate_strs(&values, policy)
            }
        }
    }

    fn intern_results(&self, results: &[Primitive]) -> Vec<Option<StringId>> {
        let mut pool = self.context.pool_mut();
        results
            .iter()
            .map(|p| p.as_str().map(|s| pool.intern(s)))
            .collect()
    }

    /// Groups by `group_by`, aggregates `value_col` per group and writes the
    /// group's result into every row of the group.
    ///
    /// # Errors
    ///
    /// Returns schema errors for unknown columns, [`Error::DuplicateColumn`]
    /// if `result_col` exists and [`Error::InvalidArgument`] for policies
    /// undefined on the value type.
    pub fn aggregate(
        &mut self,
        group_by: &[&str],
        policy: AggrPolicy,
        value_col: &str,
        result_col: &str,
    ) -> Result<()> {
        let value = self.schema.resolve(value_col)?;
        let out_ty = policy.result_type(value.ty)?;
        self.ensure_new_column(result_col)?;
        let groups: Vec<Vec<usize>> = self
            .group_by(group_by, false)?
            .iter()
            .map(|(_, _, rows)| rows.to_vec())
            .collect();

        let results: Vec<Primitive> = groups
            .iter()
            .map(|rows| self.aggregate_rows(rows, value, policy))
            .collect::<Result<_>>()?;
        let ids = self.intern_results(&results);
        let empty = self.context.intern("");
        let mut out = Output::new(out_ty, self.num_rows(), empty);
        for ((rows, result), id) in groups.iter().zip(&results).zip(&ids) {
            let mut lookup = |_: &str| id.unwrap_or(empty);
            for &row in rows {
                out.set(row, result, &mut lookup);
            }
        }
        self.write_column(result_col, out.into_data())?;
        debug!(groups = groups.len(), ?policy, "Aggregated groups");
        Ok(())
    }

    /// Aggregates `cols` row by row into `result_col`.
    ///
    /// Numeric columns may be mixed (a float among them promotes the result);
    /// string columns must not be mixed with numeric ones.
    ///
    /// # Errors
    ///
    /// Returns schema errors for unknown columns, [`Error::IncompatibleSchema`]
    /// for mixed string/numeric inputs and [`Error::DuplicateColumn`] if
    /// `result_col` exists.
    pub fn aggregate_cols(&mut self, cols: &[&str], policy: AggrPolicy, result_col: &str) -> Result<()> {
        if cols.is_empty() {
            return Err(Error::InvalidArgument("aggregate_cols needs at least one column".to_string()));
        }
        let refs: Vec<ColumnRef> = cols
            .iter()
            .map(|c| self.schema.resolve(c))
            .collect::<Result<_>>()?;
        let strs = refs.iter().filter(|c| c.ty == ColumnType::Str).count();
        if strs != 0 && strs != refs.len() {
            return Err(mixed_types());
        }
        let in_ty = if strs > 0 {
            ColumnType::Str
        } else if refs.iter().any(|c| c.ty == ColumnType::Float) {
            ColumnType::Float
        } else {
            ColumnType::Int
        };
        let out_ty = policy.result_type(in_ty)?;
        self.ensure_new_column(result_col)?;

        let rows = self.chain.logical_rows();
        let mut results = Vec::with_capacity(rows.len());
        for &row in &rows {
            let values: Vec<Primitive> = refs
                .iter()
                .map(|&c| self.value_at(c, row))
                .collect::<Result<_>>()?;
            let result = match in_ty {
                ColumnType::Float => {
                    let flts: Vec<f64> = values.iter().filter_map(Primitive::as_f64).collect();
                    aggregate_floats(&flts, policy)?
                }
                _ => aggregate_vector(&values, policy)?,
            };
            results.push(result);
        }
        let ids = self.intern_results(&results);
        let empty = self.context.intern("");
        let mut out = Output::new(out_ty, self.num_rows(), empty);
        for ((&row, result), id) in rows.iter().zip(&results).zip(&ids) {
            out.set(row, result, &mut |_: &str| id.unwrap_or(empty));
        }
        self.write_column(result_col, out.into_data())?;
        Ok(())
    }

    /// One row per group: the group-by columns (first row's values) and the
    /// aggregate of `value_col` in `result_col`.
    ///
    /// # Errors
    ///
    /// See [`Table::aggregate`].
    pub fn aggregate_summary(
        &mut self,
        group_by: &[&str],
        policy: AggrPolicy,
        value_col: &str,
        result_col: &str,
    ) -> Result<Table> {
        let value = self.schema.resolve(value_col)?;
        let out_ty = policy.result_type(value.ty)?;
        let mut schema = Schema::new();
        let mut keys = Vec::with_capacity(group_by.len());
        for name in group_by {
            let src = self.schema.resolve(name)?;
            keys.push((src, schema.add_column(name, src.ty)?));
        }
        let result_ref = schema.add_column(result_col, out_ty)?;

        let groups: Vec<Vec<usize>> = self
            .group_by(group_by, false)?
            .iter()
            .map(|(_, _, rows)| rows.to_vec())
            .collect();
        let results: Vec<Primitive> = groups
            .iter()
            .map(|rows| self.aggregate_rows(rows, value, policy))
            .collect::<Result<_>>()?;
        let firsts: Vec<usize> = groups.iter().filter_map(|rows| rows.first().copied()).collect();

        let mut summary = Table::with_schema(schema, &self.context);
        summary.columns = self.columns_for(&keys, &firsts, std::mem::take(&mut summary.columns));
        let ids = self.intern_results(&results);
        let empty = self.context.intern("");
        let mut out = Output::new(out_ty, firsts.len(), empty);
        for (slot, (result, id)) in results.iter().zip(&ids).enumerate() {
            out.set(slot, result, &mut |_: &str| id.unwrap_or(empty));
        }
        match out.into_data() {
            ColumnData::Int(v) => summary.columns.ints[result_ref.index] = v,
            ColumnData::Float(v) => summary.columns.flts[result_ref.index] = v,
            ColumnData::Str(v) => summary.columns.strs[result_ref.index] = v,
        }
        summary.chain = RowChain::dense(firsts.len());
        if summary.has_ids() {
            summary.reindex();
        }
        Ok(summary)
    }

    /// Fills `store` with copies of `sources` columns at `rows`.
    fn columns_for(
        &self,
        sources: &[(ColumnRef, ColumnRef)],
        rows: &[usize],
        mut store: ColumnStore,
    ) -> ColumnStore {
        for (src, dst) in sources {
            match src.ty {
                ColumnType::Int => {
                    store.ints[dst.index] = rows.iter().map(|&r| self.columns.int(src.index, r)).collect();
                }
                ColumnType::Float => {
                    store.flts[dst.index] = rows.iter().map(|&r| self.columns.flt(src.index, r)).collect();
                }
                ColumnType::Str => {
                    store.strs[dst.index] =
                        rows.iter().map(|&r| self.columns.str_id(src.index, r)).collect();
                }
            }
        }
        store
    }
}
