//! Boolean predicate trees evaluated per row.
//!
//! A [`Predicate`] is a tree of AND/OR/NOT connectives over atomic
//! comparisons. Leaves compare a column with a constant or with another
//! column. Predicates hold no row state; selecting compiles the tree against
//! the table schema (resolving column names once) and then evaluates it per
//! row with short-circuiting.
//!
//! # Example
//!
//! ```rust
//! use ringo_core::predicate::{Predicate, PredicateNode};
//!
//! let africa_big = PredicateNode::eq("Location", "Africa").and(PredicateNode::eq("Size", "big"));
//! let australia_medium =
//!     PredicateNode::eq("Location", "Australia").and(PredicateNode::eq("Size", "medium"));
//! let predicate = Predicate::new(africa_big.or(australia_medium));
//! assert_eq!(predicate.columns(), vec!["Location-1".to_string(), "Size-1".to_string()]);
//! ```

mod builders;
mod matching;
#[cfg(test)]
mod predicate_tests;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::schema::{normalize_col_name, ColumnType, Primitive};

pub(crate) use matching::CompiledPredicate;

/// Comparison operator of an atomic predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Leq,
    /// `>=`
    Geq,
}

impl CompareOp {
    /// Applies the operator to the ordering of `lhs` relative to `rhs`.
    #[must_use]
    #[inline]
    pub const fn matches(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ord, Ordering::Equal),
            Self::Neq => !matches!(ord, Ordering::Equal),
            Self::Lt => matches!(ord, Ordering::Less),
            Self::Gt => matches!(ord, Ordering::Greater),
            Self::Leq => !matches!(ord, Ordering::Greater),
            Self::Geq => !matches!(ord, Ordering::Less),
        }
    }

    /// Like [`CompareOp::matches`]; unordered operands (NaN) only satisfy `Neq`.
    #[must_use]
    #[inline]
    pub const fn matches_partial(self, ord: Option<Ordering>) -> bool {
        match ord {
            Some(ord) => self.matches(ord),
            None => matches!(self, Self::Neq),
        }
    }
}

/// Leaf comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicPredicate {
    /// Declared operand type; `None` takes the left column's type.
    pub ty: Option<ColumnType>,
    /// Compares against [`AtomicPredicate::constant`] instead of `rhs`.
    pub is_const: bool,
    /// Comparison operator.
    pub op: CompareOp,
    /// Left column name.
    pub lhs: String,
    /// Right column name; empty for constant comparisons.
    pub rhs: String,
    /// Literal for constant comparisons.
    pub constant: Option<Primitive>,
}

/// Node of a predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateNode {
    /// Both children hold.
    And(Box<PredicateNode>, Box<PredicateNode>),
    /// At least one child holds.
    Or(Box<PredicateNode>, Box<PredicateNode>),
    /// Child does not hold.
    Not(Box<PredicateNode>),
    /// Atomic comparison.
    Atom(AtomicPredicate),
}

impl PredicateNode {
    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Self::And(l, r) | Self::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Self::Not(child) => child.collect_columns(out),
            Self::Atom(atom) => {
                for name in [&atom.lhs, &atom.rhs] {
                    if name.is_empty() {
                        continue;
                    }
                    let name = normalize_col_name(name);
                    if !out.contains(&name) {
                        out.push(name);
                    }
                }
            }
        }
    }
}

/// Predicate over the rows of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    root: PredicateNode,
}

impl Predicate {
    /// Wraps a predicate tree.
    #[must_use]
    pub fn new(root: PredicateNode) -> Self {
        Self { root }
    }

    /// Root node.
    #[must_use]
    pub fn root(&self) -> &PredicateNode {
        &self.root
    }

    /// Normalized names of the referenced columns, in first-use order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_columns(&mut out);
        out
    }

    /// Negated predicate.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self::new(!self.root.clone())
    }
}

impl From<PredicateNode> for Predicate {
    fn from(root: PredicateNode) -> Self {
        Self::new(root)
    }
}
