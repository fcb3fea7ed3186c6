//! Equi-joins and similarity joins.
//!
//! Output tables carry the left columns followed by the right columns. A
//! right column whose name is already taken is renamed to `<base>-2` (or the
//! next free ordinal). Output tables live in the left table's context; string
//! values from a right table in another context are re-interned.
//!
//! Permanent id columns are not live in the output: a left `_id` becomes the
//! plain column `_id-1` and a right one `_id-2`.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::rows::StrBridge;
use super::{RowChain, Table, ID_COL};
use crate::distance::{jaccard_distance, SimMetric};
use crate::error::{Error, Result};
use crate::schema::{base_col_name, normalize_col_name, ColumnRef, ColumnType, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum JoinKey {
    Int(i64),
    Float(u64),
    Str(u32),
}

struct JointLayout {
    schema: Schema,
    left: Vec<(ColumnRef, ColumnRef)>,
    right: Vec<(ColumnRef, ColumnRef)>,
}

fn free_name(schema: &Schema, name: &str) -> String {
    if !schema.contains(name) {
        return name.to_string();
    }
    let base = base_col_name(name);
    let mut ordinal = 2usize;
    loop {
        let candidate = format!("{base}-{ordinal}");
        if !schema.contains(&candidate) {
            return candidate;
        }
        ordinal += 1;
    }
}

/// Output name of a source column; `side` is 1 for left, 2 for right.
fn side_name(name: &str, side: usize) -> String {
    if name == ID_COL {
        format!("{ID_COL}-{side}")
    } else {
        name.to_string()
    }
}

impl Table {
    fn joint_layout(&self, other: &Table) -> Result<JointLayout> {
        let mut schema = Schema::new();
        let mut left = Vec::with_capacity(self.schema.len());
        for (name, col) in self.schema.iter() {
            let name = free_name(&schema, &side_name(name, 1));
            left.push((col, schema.add_column(&name, col.ty)?));
        }
        let mut right = Vec::with_capacity(other.schema.len());
        for (name, col) in other.schema.iter() {
            let name = free_name(&schema, &side_name(name, 2));
            right.push((col, schema.add_column(&name, col.ty)?));
        }
        Ok(JointLayout {
            schema,
            left,
            right,
        })
    }

    /// Builds the joined table for `pairs` of (left row, right row).
    fn materialize_pairs(
        &self,
        other: &Table,
        layout: JointLayout,
        pairs: &[(usize, usize)],
        bridge: &StrBridge,
        distance: Option<(&str, Vec<f64>)>,
    ) -> Result<Table> {
        let JointLayout {
            mut schema,
            left,
            right,
        } = layout;
        let distance_col = match &distance {
            Some((name, _)) => Some(schema.add_column(name, ColumnType::Float)?),
            None => None,
        };
        let mut out = Table::with_schema(schema, &self.context);
        for (src, dst) in left {
            fill_column(&mut out, self, src, dst, pairs.iter().map(|p| p.0), &StrBridge::Same);
        }
        for (src, dst) in right {
            fill_column(&mut out, other, src, dst, pairs.iter().map(|p| p.1), bridge);
        }
        if let (Some(col), Some((_, values))) = (distance_col, distance) {
            out.columns.flts[col.index] = values;
        }
        out.chain = RowChain::dense(pairs.len());
        Ok(out)
    }

    fn join_key(&self, col: ColumnRef, row: usize, bridge: &StrBridge) -> JoinKey {
        match col.ty {
            ColumnType::Int => JoinKey::Int(self.columns.int(col.index, row)),
            ColumnType::Float => JoinKey::Float(self.columns.flt(col.index, row).to_bits()),
            ColumnType::Str => JoinKey::Str(bridge.map(self.columns.str_id(col.index, row)).as_u32()),
        }
    }

    /// Hash equi-join of this table's `left_col` with `other`'s `right_col`.
    ///
    /// Emits one row per matching (left, right) pair, left rows in logical
    /// order and, within each, right rows in logical order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] for unknown columns and
    /// [`Error::TypeMismatch`] if the join columns differ in type.
    pub fn join(&self, left_col: &str, other: &Table, right_col: &str) -> Result<Table> {
        let lcol = self.schema.resolve(left_col)?;
        let rcol = other.schema.resolve_typed(right_col, lcol.ty)?;
        let layout = self.joint_layout(other)?;
        let bridge = self.bridge_from(other)?;

        let mut index: FxHashMap<JoinKey, Vec<usize>> = FxHashMap::default();
        for row in other.chain.iter() {
            index
                .entry(other.join_key(rcol, row, &bridge))
                .or_default()
                .push(row);
        }

        let mut pairs = Vec::new();
        for row in self.chain.iter() {
            if let Some(matches) = index.get(&self.join_key(lcol, row, &StrBridge::Same)) {
                pairs.extend(matches.iter().map(|&r| (row, r)));
            }
        }
        debug!(
            left = self.num_valid_rows(),
            right = other.num_valid_rows(),
            output = pairs.len(),
            "Joined tables"
        );
        self.materialize_pairs(other, layout, &pairs, &bridge, None)
    }

    /// Equi-join of the table with itself on `col`.
    ///
    /// # Errors
    ///
    /// See [`Table::join`].
    pub fn self_join(&self, col: &str) -> Result<Table> {
        self.join(col, self, col)
    }

    fn feature_columns(&self, cols: &[&str], metric: SimMetric) -> Result<Vec<ColumnRef>> {
        let refs: Vec<ColumnRef> = cols
            .iter()
            .map(|c| self.schema.resolve(c))
            .collect::<Result<_>>()?;
        if metric.is_numeric() {
            for (name, col) in cols.iter().zip(&refs) {
                if !col.ty.is_numeric() {
                    return Err(Error::type_mismatch(
                        &normalize_col_name(name),
                        ColumnType::Float,
                        col.ty,
                    ));
                }
            }
        }
        Ok(refs)
    }

    fn numeric_features(&self, cols: &[ColumnRef], row: usize) -> Vec<f64> {
        cols.iter()
            .map(|&c| self.columns.numeric(c, row).unwrap_or(f64::NAN))
            .collect()
    }

    fn token_set(&self, cols: &[ColumnRef], row: usize, bridge: &StrBridge) -> FxHashSet<JoinKey> {
        cols.iter().map(|&c| self.join_key(c, row, bridge)).collect()
    }

    /// Similarity join: keeps every (left, right) pair whose distance over
    /// the feature columns is at most `threshold`, writing the distance into
    /// `distance_col`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty or unequal column lists
    /// (or a Haversine join not over exactly two columns), plus schema errors
    /// for unknown or non-numeric feature columns.
    pub fn sim_join(
        &self,
        left_cols: &[&str],
        other: &Table,
        right_cols: &[&str],
        distance_col: &str,
        metric: SimMetric,
        threshold: f64,
    ) -> Result<Table> {
        check_feature_arity(left_cols.len(), right_cols.len(), metric)?;
        let lrefs = self.feature_columns(left_cols, metric)?;
        let rrefs = other.feature_columns(right_cols, metric)?;
        let layout = self.joint_layout(other)?;
        let bridge = self.bridge_from(other)?;

        let left_rows = self.chain.logical_rows();
        let right_rows = other.chain.logical_rows();
        let mut pairs = Vec::new();
        let mut distances = Vec::new();
        if metric.is_numeric() {
            let right: Vec<Vec<f64>> = right_rows
                .iter()
                .map(|&r| other.numeric_features(&rrefs, r))
                .collect();
            for &l in &left_rows {
                let lf = self.numeric_features(&lrefs, l);
                for (&r, rf) in right_rows.iter().zip(&right) {
                    let d = metric.vector_distance(&lf, rf);
                    if d <= threshold {
                        pairs.push((l, r));
                        distances.push(d);
                    }
                }
            }
        } else {
            let right: Vec<FxHashSet<JoinKey>> = right_rows
                .iter()
                .map(|&r| other.token_set(&rrefs, r, &bridge))
                .collect();
            for &l in &left_rows {
                let lf = self.token_set(&lrefs, l, &StrBridge::Same);
                for (&r, rf) in right_rows.iter().zip(&right) {
                    let d = jaccard_distance(&lf, rf);
                    if d <= threshold {
                        pairs.push((l, r));
                        distances.push(d);
                    }
                }
            }
        }
        debug!(?metric, threshold, output = pairs.len(), "Similarity join");
        self.materialize_pairs(other, layout, &pairs, &bridge, Some((distance_col, distances)))
    }

    /// Similarity join of the table with itself.
    ///
    /// # Errors
    ///
    /// See [`Table::sim_join`].
    pub fn self_sim_join(
        &self,
        cols: &[&str],
        distance_col: &str,
        metric: SimMetric,
        threshold: f64,
    ) -> Result<Table> {
        self.sim_join(cols, self, cols, distance_col, metric, threshold)
    }

    /// Self similarity join restricted to pairs that share the group key on
    /// `group_cols`.
    ///
    /// # Errors
    ///
    /// See [`Table::sim_join`]; also fails for unknown group columns.
    pub fn self_sim_join_per_group(
        &self,
        group_cols: &[&str],
        sim_cols: &[&str],
        distance_col: &str,
        metric: SimMetric,
        threshold: f64,
    ) -> Result<Table> {
        check_feature_arity(sim_cols.len(), sim_cols.len(), metric)?;
        let refs = self.feature_columns(sim_cols, metric)?;
        let spec = super::GroupSpec::new(group_cols, false);
        let groups = self.compute_groups(&spec, &self.chain.logical_rows())?;
        let layout = self.joint_layout(self)?;

        let mut pairs = Vec::new();
        let mut distances = Vec::new();
        for (_, _, rows) in groups.iter() {
            for &a in rows {
                for &b in rows {
                    let d = if metric.is_numeric() {
                        metric.vector_distance(
                            &self.numeric_features(&refs, a),
                            &self.numeric_features(&refs, b),
                        )
                    } else {
                        jaccard_distance(
                            &self.token_set(&refs, a, &StrBridge::Same),
                            &self.token_set(&refs, b, &StrBridge::Same),
                        )
                    };
                    if d <= threshold {
                        pairs.push((a, b));
                        distances.push(d);
                    }
                }
            }
        }
        debug!(groups = groups.len(), output = pairs.len(), "Per-group similarity join");
        self.materialize_pairs(self, layout, &pairs, &StrBridge::Same, Some((distance_col, distances)))
    }
}

fn check_feature_arity(left: usize, right: usize, metric: SimMetric) -> Result<()> {
    if left == 0 || left != right {
        return Err(Error::InvalidArgument(format!(
            "similarity join needs equal, non-empty column lists (got {left} and {right})"
        )));
    }
    if let Some(required) = metric.required_columns() {
        if left != required {
            return Err(Error::InvalidArgument(format!(
                "{metric:?} needs exactly {required} columns, got {left}"
            )));
        }
    }
    Ok(())
}

fn fill_column(
    out: &mut Table,
    src: &Table,
    from: ColumnRef,
    to: ColumnRef,
    rows: impl Iterator<Item = usize>,
    bridge: &StrBridge,
) {
    match from.ty {
        ColumnType::Int => {
            out.columns.ints[to.index] = rows.map(|r| src.columns.int(from.index, r)).collect();
        }
        ColumnType::Float => {
            out.columns.flts[to.index] = rows.map(|r| src.columns.flt(from.index, r)).collect();
        }
        ColumnType::Str => {
            out.columns.strs[to.index] = rows
                .map(|r| bridge.map(src.columns.str_id(from.index, r)))
                .collect();
        }
    }
}
