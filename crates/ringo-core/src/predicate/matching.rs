//! Predicate compilation against a schema and per-row evaluation.

use super::{AtomicPredicate, CompareOp, Predicate, PredicateNode};
use crate::error::{Error, Result};
use crate::schema::{normalize_col_name, ColumnRef, ColumnType, Primitive, Schema};
use crate::string_pool::{StringId, StringPool};
use crate::table::ColumnStore;

#[derive(Debug, Clone)]
enum Leaf {
    IntConst {
        col: usize,
        value: i64,
    },
    NumConst {
        col: ColumnRef,
        value: f64,
    },
    StrConst {
        col: usize,
        id: Option<StringId>,
        value: String,
    },
    IntCols {
        lhs: usize,
        rhs: usize,
    },
    NumCols {
        lhs: ColumnRef,
        rhs: ColumnRef,
    },
    StrCols {
        lhs: usize,
        rhs: usize,
    },
}

#[derive(Debug, Clone)]
enum Node {
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Atom(CompareOp, Leaf),
}

/// Predicate with column names resolved to typed column locations.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPredicate {
    root: Node,
}

impl CompiledPredicate {
    /// Resolves every leaf against `schema`.
    ///
    /// String constants are looked up in `pool` without interning.
    pub(crate) fn compile(predicate: &Predicate, schema: &Schema, pool: &StringPool) -> Result<Self> {
        Ok(Self {
            root: compile_node(predicate.root(), schema, pool)?,
        })
    }

    /// Evaluates the predicate on physical `row`.
    pub(crate) fn eval(&self, columns: &ColumnStore, pool: &StringPool, row: usize) -> bool {
        eval_node(&self.root, columns, pool, row)
    }
}

fn compile_node(node: &PredicateNode, schema: &Schema, pool: &StringPool) -> Result<Node> {
    Ok(match node {
        PredicateNode::And(l, r) => Node::And(
            Box::new(compile_node(l, schema, pool)?),
            Box::new(compile_node(r, schema, pool)?),
        ),
        PredicateNode::Or(l, r) => Node::Or(
            Box::new(compile_node(l, schema, pool)?),
            Box::new(compile_node(r, schema, pool)?),
        ),
        PredicateNode::Not(child) => Node::Not(Box::new(compile_node(child, schema, pool)?)),
        PredicateNode::Atom(atom) => Node::Atom(atom.op, compile_leaf(atom, schema, pool)?),
    })
}

fn check_declared(name: &str, declared: Option<ColumnType>, actual: ColumnType) -> Result<()> {
    match declared {
        Some(ty) if ty.is_numeric() != actual.is_numeric() => {
            Err(Error::type_mismatch(&normalize_col_name(name), ty, actual))
        }
        _ => Ok(()),
    }
}

fn compile_leaf(atom: &AtomicPredicate, schema: &Schema, pool: &StringPool) -> Result<Leaf> {
    let lhs = schema.resolve(&atom.lhs)?;
    check_declared(&atom.lhs, atom.ty, lhs.ty)?;

    if atom.is_const {
        let constant = atom.constant.as_ref().ok_or_else(|| {
            Error::InvalidArgument(format!("constant comparison on '{}' has no value", atom.lhs))
        })?;
        return match (lhs.ty, constant) {
            (ColumnType::Int, Primitive::Int(v)) => Ok(Leaf::IntConst {
                col: lhs.index,
                value: *v,
            }),
            (ColumnType::Int | ColumnType::Float, Primitive::Int(_) | Primitive::Float(_)) => {
                Ok(Leaf::NumConst {
                    col: lhs,
                    value: constant.as_f64().unwrap_or(f64::NAN),
                })
            }
            (ColumnType::Str, Primitive::Str(s)) => Ok(Leaf::StrConst {
                col: lhs.index,
                id: pool.get_id(s),
                value: s.clone(),
            }),
            (ty, other) => Err(Error::type_mismatch(
                &normalize_col_name(&atom.lhs),
                other.ty(),
                ty,
            )),
        };
    }

    let rhs = schema.resolve(&atom.rhs)?;
    check_declared(&atom.rhs, atom.ty, rhs.ty)?;
    match (lhs.ty, rhs.ty) {
        (ColumnType::Int, ColumnType::Int) => Ok(Leaf::IntCols {
            lhs: lhs.index,
            rhs: rhs.index,
        }),
        (ColumnType::Str, ColumnType::Str) => Ok(Leaf::StrCols {
            lhs: lhs.index,
            rhs: rhs.index,
        }),
        (l, r) if l.is_numeric() && r.is_numeric() => Ok(Leaf::NumCols { lhs, rhs }),
        (l, r) => Err(Error::type_mismatch(&normalize_col_name(&atom.rhs), l, r)),
    }
}

fn eval_node(node: &Node, columns: &ColumnStore, pool: &StringPool, row: usize) -> bool {
    match node {
        Node::And(l, r) => eval_node(l, columns, pool, row) && eval_node(r, columns, pool, row),
        Node::Or(l, r) => eval_node(l, columns, pool, row) || eval_node(r, columns, pool, row),
        Node::Not(child) => !eval_node(child, columns, pool, row),
        Node::Atom(op, leaf) => eval_leaf(*op, leaf, columns, pool, row),
    }
}

fn eval_leaf(op: CompareOp, leaf: &Leaf, columns: &ColumnStore, pool: &StringPool, row: usize) -> bool {
    match leaf {
        Leaf::IntConst { col, value } => op.matches(columns.int(*col, row).cmp(value)),
        Leaf::NumConst { col, value } => {
            let lhs = columns.numeric(*col, row).unwrap_or(f64::NAN);
            op.matches_partial(lhs.partial_cmp(value))
        }
        Leaf::StrConst { col, id, value } => {
            let lhs = columns.str_id(*col, row);
            match op {
                CompareOp::Eq => *id == Some(lhs),
                CompareOp::Neq => *id != Some(lhs),
                _ => op.matches(pool.get(lhs).unwrap_or_default().cmp(value.as_str())),
            }
        }
        Leaf::IntCols { lhs, rhs } => {
            op.matches(columns.int(*lhs, row).cmp(&columns.int(*rhs, row)))
        }
        Leaf::NumCols { lhs, rhs } => {
            let l = columns.numeric(*lhs, row).unwrap_or(f64::NAN);
            let r = columns.numeric(*rhs, row).unwrap_or(f64::NAN);
            op.matches_partial(l.partial_cmp(&r))
        }
        Leaf::StrCols { lhs, rhs } => {
            let (l, r) = (columns.str_id(*lhs, row), columns.str_id(*rhs, row));
            match op {
                CompareOp::Eq => l == r,
                CompareOp::Neq => l != r,
                _ => op.matches(
                    pool.get(l)
                        .unwrap_or_default()
                        .cmp(pool.get(r).unwrap_or_default()),
                ),
            }
        }
    }
}
