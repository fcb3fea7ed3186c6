//! Graph construction bridge.
//!
//! The table never builds a graph object. [`Table::build_graph`] emits the
//! parts an external graph component needs: node ids, one edge per row and
//! aggregated node and edge attributes.
//!
//! Node ids by source column type:
//!
//! | Type  | Node id                                  |
//! |-------|------------------------------------------|
//! | Int   | the value itself                         |
//! | Str   | the string's pool id                     |
//! | Float | dense ids in first-seen order, from 0    |
//!
//! Sequences partition the valid rows into buckets (sliding windows over an
//! integer column, explicit intervals, or groups) and yield one graph per
//! bucket. The lazy iterator state lives on the table.

use indexmap::IndexMap;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::aggregate::aggregate_vector;
use super::{AggrPolicy, GroupSpec, Table, ID_COL};
use crate::error::{Error, Result};
use crate::schema::{normalize_col_name, ColumnRef, ColumnType, Primitive};

/// Upper bound on the windows one sliding-window split may produce.
pub(crate) const MAX_WINDOWS: usize = 1 << 20;

/// Identifier of a graph node.
pub type NodeId = i64;

/// Which columns feed the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Normalized source node column.
    pub src_col: Option<String>,
    /// Normalized destination node column.
    pub dst_col: Option<String>,
    /// Columns aggregated into source node attributes.
    pub src_node_attrs: Vec<String>,
    /// Columns aggregated into destination node attributes.
    pub dst_node_attrs: Vec<String>,
    /// Columns copied into edge attributes.
    pub edge_attrs: Vec<String>,
}

impl GraphSettings {
    pub(crate) fn rename_column(&mut self, old: &str, new: &str) {
        for slot in [&mut self.src_col, &mut self.dst_col].into_iter().flatten() {
            if *slot == old {
                *slot = new.to_string();
            }
        }
        for list in [&mut self.src_node_attrs, &mut self.dst_node_attrs, &mut self.edge_attrs] {
            for name in list.iter_mut().filter(|n| n.as_str() == old) {
                *name = new.to_string();
            }
        }
    }

    pub(crate) fn remove_column(&mut self, name: &str) {
        for slot in [&mut self.src_col, &mut self.dst_col] {
            if slot.as_deref() == Some(name) {
                *slot = None;
            }
        }
        for list in [&mut self.src_node_attrs, &mut self.dst_node_attrs, &mut self.edge_attrs] {
            list.retain(|n| n != name);
        }
    }
}

/// One edge per table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// The row's `_id` if permanent ids are enabled, else its physical index.
    pub id: i64,
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dst: NodeId,
}

/// Nodes, edges and attributes of one graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphParts {
    /// Node ids in first-seen order.
    pub nodes: Vec<NodeId>,
    /// Endpoint value each node was created from.
    pub node_values: FxHashMap<NodeId, Primitive>,
    /// Edges in row order.
    pub edges: Vec<GraphEdge>,
    /// Aggregated node attributes, keyed by column name.
    pub node_attrs: FxHashMap<NodeId, IndexMap<String, Primitive>>,
    /// Edge attributes keyed by edge id, then column name.
    pub edge_attrs: FxHashMap<i64, IndexMap<String, Primitive>>,
}

impl GraphParts {
    /// Number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}

/// Iteration state of `*_iterator` sequence calls.
#[derive(Debug, Clone)]
pub(crate) struct SequenceState {
    buckets: Vec<Vec<usize>>,
    policy: AggrPolicy,
    next: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum NodeKey {
    Int(i64),
    Float(u64),
    Str(i64),
}

struct GraphLayout {
    src: ColumnRef,
    dst: ColumnRef,
    src_attrs: Vec<(String, ColumnRef)>,
    dst_attrs: Vec<(String, ColumnRef)>,
    edge_attrs: Vec<(String, ColumnRef)>,
    edge_ids: Option<ColumnRef>,
}

/// Lazily built graph sequence, one graph per bucket.
#[derive(Debug)]
pub struct GraphSequence<'a> {
    table: &'a Table,
    buckets: std::vec::IntoIter<Vec<usize>>,
    policy: AggrPolicy,
}

impl Iterator for GraphSequence<'_> {
    type Item = Result<GraphParts>;

    fn next(&mut self) -> Option<Self::Item> {
        let bucket = self.buckets.next()?;
        Some(self.table.build_graph(&bucket, self.policy))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.buckets.size_hint()
    }
}

impl ExactSizeIterator for GraphSequence<'_> {}

impl Table {
    // ========================================================================
    // Settings
    // ========================================================================

    /// Column whose values become source nodes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the column is unknown.
    pub fn set_src_col(&mut self, col: &str) -> Result<()> {
        self.schema.resolve(col)?;
        self.graph.src_col = Some(normalize_col_name(col));
        Ok(())
    }

    /// Column whose values become destination nodes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the column is unknown.
    pub fn set_dst_col(&mut self, col: &str) -> Result<()> {
        self.schema.resolve(col)?;
        self.graph.dst_col = Some(normalize_col_name(col));
        Ok(())
    }

    fn checked_attr(&self, col: &str) -> Result<String> {
        self.schema.resolve(col)?;
        Ok(normalize_col_name(col))
    }

    /// Adds a source node attribute column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the column is unknown.
    pub fn add_src_node_attr(&mut self, col: &str) -> Result<()> {
        let name = self.checked_attr(col)?;
        push_unique(&mut self.graph.src_node_attrs, name);
        Ok(())
    }

    /// Adds a destination node attribute column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the column is unknown.
    pub fn add_dst_node_attr(&mut self, col: &str) -> Result<()> {
        let name = self.checked_attr(col)?;
        push_unique(&mut self.graph.dst_node_attrs, name);
        Ok(())
    }

    /// Adds a column used for both source and destination node attributes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the column is unknown.
    pub fn add_node_attr(&mut self, col: &str) -> Result<()> {
        self.add_src_node_attr(col)?;
        self.add_dst_node_attr(col)
    }

    /// Adds an edge attribute column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the column is unknown.
    pub fn add_edge_attr(&mut self, col: &str) -> Result<()> {
        let name = self.checked_attr(col)?;
        push_unique(&mut self.graph.edge_attrs, name);
        Ok(())
    }

    /// Current graph settings.
    #[must_use]
    pub fn graph_settings(&self) -> &GraphSettings {
        &self.graph
    }

    // ========================================================================
    // Build
    // ========================================================================

    fn graph_layout(&self, policy: AggrPolicy) -> Result<GraphLayout> {
        let endpoint = |slot: &Option<String>, which: &str| -> Result<ColumnRef> {
            let name = slot
                .as_deref()
                .ok_or_else(|| Error::InvalidState(format!("{which} column is not set")))?;
            self.schema.resolve(name)
        };
        let src = endpoint(&self.graph.src_col, "source")?;
        let dst = endpoint(&self.graph.dst_col, "destination")?;
        if src.ty != dst.ty {
            return Err(Error::type_mismatch(
                self.graph.dst_col.as_deref().unwrap_or_default(),
                src.ty,
                dst.ty,
            ));
        }
        let resolve_all = |names: &[String]| -> Result<Vec<(String, ColumnRef)>> {
            names
                .iter()
                .map(|n| self.schema.resolve(n).map(|c| (n.clone(), c)))
                .collect()
        };
        let src_attrs = resolve_all(&self.graph.src_node_attrs)?;
        let dst_attrs = resolve_all(&self.graph.dst_node_attrs)?;
        for (_, col) in src_attrs.iter().chain(&dst_attrs) {
            policy.result_type(col.ty)?;
        }
        Ok(GraphLayout {
            src,
            dst,
            src_attrs,
            dst_attrs,
            edge_attrs: resolve_all(&self.graph.edge_attrs)?,
            edge_ids: self.schema.get(ID_COL).filter(|_| self.has_ids()),
        })
    }

    fn node_key(&self, col: ColumnRef, row: usize) -> NodeKey {
        match col.ty {
            ColumnType::Int => NodeKey::Int(self.columns.int(col.index, row)),
            ColumnType::Float => NodeKey::Float(self.columns.flt(col.index, row).to_bits()),
            ColumnType::Str => NodeKey::Str(self.columns.str_id(col.index, row).as_key()),
        }
    }

    fn raw_edge(&self, layout: &GraphLayout, row: usize) -> (i64, NodeKey, NodeKey) {
        let id = layout
            .edge_ids
            .map_or(row as i64, |c| self.columns.int(c.index, row));
        (id, self.node_key(layout.src, row), self.node_key(layout.dst, row))
    }

    /// Builds graph parts from the given physical rows; deleted rows are skipped.
    ///
    /// Node attributes collect every value seen for the node (as source for
    /// source attributes, as destination for destination attributes) and are
    /// reduced with `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the source or destination column is
    /// not set, [`Error::TypeMismatch`] if their types differ,
    /// [`Error::InvalidArgument`] if `policy` is undefined for an attribute
    /// type and [`Error::RowOutOfRange`] for rows beyond the table.
    pub fn build_graph(&self, rows: &[usize], policy: AggrPolicy) -> Result<GraphParts> {
        let layout = self.graph_layout(policy)?;
        for &row in rows {
            self.check_row(row)?;
        }
        let rows: Vec<usize> = rows.iter().copied().filter(|&r| self.chain.is_valid(r)).collect();

        let exec = self.context.execution();
        let raw: Vec<(i64, NodeKey, NodeKey)> = if exec.use_parallel(rows.len()) {
            let chunks: Vec<Vec<(i64, NodeKey, NodeKey)>> = rows
                .par_chunks(exec.chunk_len(rows.len()))
                .map(|chunk| chunk.iter().map(|&r| self.raw_edge(&layout, r)).collect())
                .collect();
            chunks.into_iter().flatten().collect()
        } else {
            rows.iter().map(|&r| self.raw_edge(&layout, r)).collect()
        };

        let mut parts = GraphParts::default();
        let mut float_ids: FxHashMap<u64, NodeId> = FxHashMap::default();
        let mut collected: FxHashMap<NodeId, IndexMap<String, Vec<Primitive>>> = FxHashMap::default();

        for (&row, (edge_id, src_key, dst_key)) in rows.iter().zip(raw) {
            let src = self.intern_node(&mut parts, &mut float_ids, src_key, layout.src, row)?;
            let dst = self.intern_node(&mut parts, &mut float_ids, dst_key, layout.dst, row)?;
            parts.edges.push(GraphEdge { id: edge_id, src, dst });

            for (node, attrs) in [(src, &layout.src_attrs), (dst, &layout.dst_attrs)] {
                let entry = collected.entry(node).or_default();
                for (name, col) in attrs {
                    let value = self.value_at(*col, row)?;
                    entry.entry(name.clone()).or_default().push(value);
                }
            }
            if !layout.edge_attrs.is_empty() {
                let mut attrs = IndexMap::with_capacity(layout.edge_attrs.len());
                for (name, col) in &layout.edge_attrs {
                    attrs.insert(name.clone(), self.value_at(*col, row)?);
                }
                parts.edge_attrs.insert(edge_id, attrs);
            }
        }

        for (node, attrs) in collected {
            if attrs.is_empty() {
                continue;
            }
            let mut reduced = IndexMap::with_capacity(attrs.len());
            for (name, values) in attrs {
                reduced.insert(name, aggregate_vector(&values, policy)?);
            }
            parts.node_attrs.insert(node, reduced);
        }
        debug!(
            rows = rows.len(),
            nodes = parts.nodes.len(),
            edges = parts.edges.len(),
            "Built graph"
        );
        Ok(parts)
    }

    fn intern_node(
        &self,
        parts: &mut GraphParts,
        float_ids: &mut FxHashMap<u64, NodeId>,
        key: NodeKey,
        col: ColumnRef,
        row: usize,
    ) -> Result<NodeId> {
        let id = match key {
            NodeKey::Int(v) | NodeKey::Str(v) => v,
            NodeKey::Float(bits) => {
                let next = float_ids.len() as NodeId;
                *float_ids.entry(bits).or_insert(next)
            }
        };
        if !parts.node_values.contains_key(&id) {
            parts.node_values.insert(id, self.value_at(col, row)?);
            parts.nodes.push(id);
        }
        Ok(id)
    }

    /// Graph over every valid row.
    ///
    /// # Errors
    ///
    /// See [`Table::build_graph`].
    pub fn to_graph(&self, policy: AggrPolicy) -> Result<GraphParts> {
        self.build_graph(&self.chain.logical_rows(), policy)
    }

    // ========================================================================
    // Buckets
    // ========================================================================

    fn split_values(&self, split_col: &str) -> Result<Vec<(usize, i64)>> {
        let col = self.schema.resolve_typed(split_col, ColumnType::Int)?;
        Ok(self
            .chain
            .iter()
            .map(|r| (r, self.columns.int(col.index, r)))
            .collect())
    }

    /// Rows whose `split_col` value lies in `[start + i*jump, start + i*jump + window)`
    /// for bucket `i`, over values within `[start, end]`. Missing bounds
    /// default to the column's minimum and maximum.
    fn window_buckets(
        &self,
        split_col: &str,
        window: i64,
        jump: i64,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Vec<Vec<usize>>> {
        if window <= 0 || jump <= 0 {
            return Err(Error::InvalidArgument(format!(
                "window ({window}) and jump ({jump}) must be positive"
            )));
        }
        let values = self.split_values(split_col)?;
        let (Some(min), Some(max)) = (
            values.iter().map(|(_, v)| *v).min(),
            values.iter().map(|(_, v)| *v).max(),
        ) else {
            return Ok(Vec::new());
        };
        let (start, end) = (start.unwrap_or(min), end.unwrap_or(max));
        let span = end
            .checked_sub(start)
            .filter(|s| *s >= 0)
            .ok_or_else(|| Error::InvalidArgument(format!("empty range [{start}, {end}]")))?;
        let count = (span / jump)
            .checked_add(1)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n <= MAX_WINDOWS)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "[{start}, {end}] with jump {jump} needs more than {MAX_WINDOWS} windows"
                ))
            })?;

        let mut buckets = vec![Vec::new(); count];
        for (row, value) in values {
            if value < start || value > end {
                continue;
            }
            let offset = value - start;
            let last = usize::try_from(offset / jump).unwrap_or(usize::MAX).min(count - 1);
            let first = if offset >= window {
                usize::try_from((offset - window) / jump + 1).unwrap_or(usize::MAX)
            } else {
                0
            };
            for bucket in buckets.iter_mut().take(last + 1).skip(first) {
                bucket.push(row);
            }
        }
        Ok(buckets)
    }

    /// Rows whose `split_col` value lies in `[lo, hi)`, one bucket per interval.
    fn interval_buckets(&self, split_col: &str, intervals: &[(i64, i64)]) -> Result<Vec<Vec<usize>>> {
        if let Some((lo, hi)) = intervals.iter().find(|(lo, hi)| lo >= hi) {
            return Err(Error::InvalidArgument(format!("empty interval [{lo}, {hi})")));
        }
        let values = self.split_values(split_col)?;
        Ok(intervals
            .iter()
            .map(|&(lo, hi)| {
                values
                    .iter()
                    .filter(|(_, v)| (lo..hi).contains(v))
                    .map(|(r, _)| *r)
                    .collect()
            })
            .collect())
    }

    /// One bucket per value of `group_col`, in ascending key order.
    fn group_buckets(&self, group_col: &str) -> Result<Vec<Vec<usize>>> {
        let spec = GroupSpec::new(&[group_col], true);
        let groups = self.compute_groups(&spec, &self.chain.logical_rows())?;
        Ok(groups.iter().map(|(_, _, rows)| rows.to_vec()).collect())
    }

    fn sequence(&self, buckets: Vec<Vec<usize>>, policy: AggrPolicy) -> GraphSequence<'_> {
        GraphSequence {
            table: self,
            buckets: buckets.into_iter(),
            policy,
        }
    }

    // ========================================================================
    // Sequences
    // ========================================================================

    /// Lazy sliding-window graph sequence over integer column `split_col`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a non-positive window or jump
    /// or an empty range, and schema errors for `split_col`.
    pub fn graph_windows(
        &self,
        split_col: &str,
        policy: AggrPolicy,
        window: i64,
        jump: i64,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<GraphSequence<'_>> {
        self.graph_layout(policy)?;
        let buckets = self.window_buckets(split_col, window, jump, start, end)?;
        Ok(self.sequence(buckets, policy))
    }

    /// Lazy graph sequence over explicit `[lo, hi)` intervals of `split_col`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty interval and schema
    /// errors for `split_col`.
    pub fn graph_intervals(
        &self,
        split_col: &str,
        policy: AggrPolicy,
        intervals: &[(i64, i64)],
    ) -> Result<GraphSequence<'_>> {
        self.graph_layout(policy)?;
        let buckets = self.interval_buckets(split_col, intervals)?;
        Ok(self.sequence(buckets, policy))
    }

    /// Lazy sequence with one graph per group of `group_col`.
    ///
    /// # Errors
    ///
    /// Returns schema errors for `group_col`.
    pub fn graph_groups(&self, group_col: &str, policy: AggrPolicy) -> Result<GraphSequence<'_>> {
        self.graph_layout(policy)?;
        let buckets = self.group_buckets(group_col)?;
        Ok(self.sequence(buckets, policy))
    }

    /// Every graph of the sliding-window sequence.
    ///
    /// # Errors
    ///
    /// See [`Table::graph_windows`] and [`Table::build_graph`].
    pub fn to_graph_sequence(
        &self,
        split_col: &str,
        policy: AggrPolicy,
        window: i64,
        jump: i64,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Vec<GraphParts>> {
        self.graph_windows(split_col, policy, window, jump, start, end)?
            .collect()
    }

    /// Every graph of the interval sequence.
    ///
    /// # Errors
    ///
    /// See [`Table::graph_intervals`] and [`Table::build_graph`].
    pub fn to_var_graph_sequence(
        &self,
        split_col: &str,
        policy: AggrPolicy,
        intervals: &[(i64, i64)],
    ) -> Result<Vec<GraphParts>> {
        self.graph_intervals(split_col, policy, intervals)?.collect()
    }

    /// One graph per group of `group_col`.
    ///
    /// # Errors
    ///
    /// See [`Table::graph_groups`] and [`Table::build_graph`].
    pub fn to_graph_per_group(&self, group_col: &str, policy: AggrPolicy) -> Result<Vec<GraphParts>> {
        self.graph_groups(group_col, policy)?.collect()
    }

    // ========================================================================
    // Stateful iteration
    // ========================================================================

    fn start_sequence(&mut self, buckets: Vec<Vec<usize>>, policy: AggrPolicy) -> Result<GraphParts> {
        self.sequence = Some(SequenceState {
            buckets,
            policy,
            next: 0,
        });
        self.next_graph_iterator()
    }

    /// Starts a stored sliding-window sequence and returns its first graph.
    ///
    /// # Errors
    ///
    /// See [`Table::graph_windows`]; [`Error::InvalidState`] if the sequence
    /// is empty.
    pub fn to_graph_sequence_iterator(
        &mut self,
        split_col: &str,
        policy: AggrPolicy,
        window: i64,
        jump: i64,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<GraphParts> {
        self.graph_layout(policy)?;
        let buckets = self.window_buckets(split_col, window, jump, start, end)?;
        self.start_sequence(buckets, policy)
    }

    /// Starts a stored interval sequence and returns its first graph.
    ///
    /// # Errors
    ///
    /// See [`Table::graph_intervals`]; [`Error::InvalidState`] if the
    /// sequence is empty.
    pub fn to_var_graph_sequence_iterator(
        &mut self,
        split_col: &str,
        policy: AggrPolicy,
        intervals: &[(i64, i64)],
    ) -> Result<GraphParts> {
        self.graph_layout(policy)?;
        let buckets = self.interval_buckets(split_col, intervals)?;
        self.start_sequence(buckets, policy)
    }

    /// Starts a stored per-group sequence and returns its first graph.
    ///
    /// # Errors
    ///
    /// See [`Table::graph_groups`]; [`Error::InvalidState`] if the table has
    /// no valid rows.
    pub fn to_graph_per_group_iterator(&mut self, group_col: &str, policy: AggrPolicy) -> Result<GraphParts> {
        self.graph_layout(policy)?;
        let buckets = self.group_buckets(group_col)?;
        self.start_sequence(buckets, policy)
    }

    /// Next graph of the stored sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if no sequence was started or the
    /// sequence is exhausted.
    pub fn next_graph_iterator(&mut self) -> Result<GraphParts> {
        let state = self
            .sequence
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no graph sequence was started".to_string()))?;
        let Some(bucket) = state.buckets.get(state.next).cloned() else {
            return Err(Error::InvalidState(format!(
                "graph sequence exhausted after {} graphs",
                state.buckets.len()
            )));
        };
        state.next += 1;
        let policy = state.policy;
        self.build_graph(&bucket, policy)
    }

    /// Returns true when the stored sequence has no further graph (or none
    /// was started).
    #[must_use]
    pub fn is_last_graph_of_sequence(&self) -> bool {
        self.sequence
            .as_ref()
            .map_or(true, |s| s.next >= s.buckets.len())
    }
}

fn push_unique(list: &mut Vec<String>, name: String) {
    if !list.contains(&name) {
        list.push(name);
    }
}
