//! Builder methods for creating predicate trees.

use std::ops::Not;

use super::{AtomicPredicate, CompareOp, PredicateNode};
use crate::schema::Primitive;

impl PredicateNode {
    /// Compares column `col` with a constant.
    #[must_use]
    pub fn compare(col: impl Into<String>, op: CompareOp, value: impl Into<Primitive>) -> Self {
        let value = value.into();
        Self::Atom(AtomicPredicate {
            ty: Some(value.ty()),
            is_const: true,
            op,
            lhs: col.into(),
            rhs: String::new(),
            constant: Some(value),
        })
    }

    /// Compares two columns of the same table.
    #[must_use]
    pub fn compare_cols(lhs: impl Into<String>, op: CompareOp, rhs: impl Into<String>) -> Self {
        Self::Atom(AtomicPredicate {
            ty: None,
            is_const: false,
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
            constant: None,
        })
    }

    /// Creates an equality comparison.
    #[must_use]
    pub fn eq(col: impl Into<String>, value: impl Into<Primitive>) -> Self {
        Self::compare(col, CompareOp::Eq, value)
    }

    /// Creates a not-equal comparison.
    #[must_use]
    pub fn neq(col: impl Into<String>, value: impl Into<Primitive>) -> Self {
        Self::compare(col, CompareOp::Neq, value)
    }

    /// Creates a less-than comparison.
    #[must_use]
    pub fn lt(col: impl Into<String>, value: impl Into<Primitive>) -> Self {
        Self::compare(col, CompareOp::Lt, value)
    }

    /// Creates a greater-than comparison.
    #[must_use]
    pub fn gt(col: impl Into<String>, value: impl Into<Primitive>) -> Self {
        Self::compare(col, CompareOp::Gt, value)
    }

    /// Creates a less-than-or-equal comparison.
    #[must_use]
    pub fn leq(col: impl Into<String>, value: impl Into<Primitive>) -> Self {
        Self::compare(col, CompareOp::Leq, value)
    }

    /// Creates a greater-than-or-equal comparison.
    #[must_use]
    pub fn geq(col: impl Into<String>, value: impl Into<Primitive>) -> Self {
        Self::compare(col, CompareOp::Geq, value)
    }

    /// Conjunction with `other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Disjunction with `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }
}

impl Not for PredicateNode {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}
