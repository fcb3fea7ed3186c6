//! Tests for `predicate` module

#[cfg(test)]
mod tests {
    use crate::predicate::*;
    use crate::schema::{ColumnType, Primitive, Schema};
    use crate::string_pool::StringPool;
    use std::cmp::Ordering;

    #[test]
    fn test_compare_op_matches() {
        assert!(CompareOp::Eq.matches(Ordering::Equal));
        assert!(!CompareOp::Eq.matches(Ordering::Less));
        assert!(CompareOp::Neq.matches(Ordering::Greater));
        assert!(CompareOp::Lt.matches(Ordering::Less));
        assert!(CompareOp::Leq.matches(Ordering::Equal));
        assert!(!CompareOp::Leq.matches(Ordering::Greater));
        assert!(CompareOp::Gt.matches(Ordering::Greater));
        assert!(CompareOp::Geq.matches(Ordering::Equal));
        assert!(!CompareOp::Geq.matches(Ordering::Less));
    }

    #[test]
    fn test_compare_op_unordered_only_neq() {
        for op in [CompareOp::Eq, CompareOp::Lt, CompareOp::Gt, CompareOp::Leq, CompareOp::Geq] {
            assert!(!op.matches_partial(None), "{op:?}");
        }
        assert!(CompareOp::Neq.matches_partial(None));
    }

    #[test]
    fn test_builder_constant_atom() {
        // Arrange & Act
        let node = PredicateNode::geq("Number", 3);

        // Assert
        let PredicateNode::Atom(atom) = node else {
            panic!("expected atom");
        };
        assert!(atom.is_const);
        assert_eq!(atom.op, CompareOp::Geq);
        assert_eq!(atom.ty, Some(ColumnType::Int));
        assert_eq!(atom.constant, Some(Primitive::Int(3)));
        assert!(atom.rhs.is_empty());
    }

    #[test]
    fn test_builder_connectives() {
        let node = (!(PredicateNode::eq("a", 1).and(PredicateNode::eq("b", 2))))
            .or(PredicateNode::compare_cols("a", CompareOp::Lt, "b"));
        match node {
            PredicateNode::Or(left, right) => {
                assert!(matches!(*left, PredicateNode::Not(_)));
                assert!(matches!(*right, PredicateNode::Atom(ref a) if !a.is_const));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_predicate_columns_are_normalized_and_deduplicated() {
        let pred = Predicate::new(
            PredicateNode::eq("Location", "Africa")
                .and(PredicateNode::compare_cols("Size", CompareOp::Neq, "Location-1")),
        );
        assert_eq!(pred.columns(), vec!["Location-1", "Size-1"]);
    }

    #[test]
    fn test_predicate_negated_wraps_root() {
        let pred = Predicate::new(PredicateNode::eq("x", 1));
        assert!(matches!(pred.negated().root(), PredicateNode::Not(_)));
    }

    #[test]
    fn test_compile_unknown_column_is_schema_error() {
        // Arrange
        let schema = Schema::from_columns([("x", ColumnType::Int)]).expect("schema");
        let pool = StringPool::new();
        let pred = Predicate::new(PredicateNode::eq("x", 1).or(PredicateNode::eq("missing", 2)));

        // Act
        let err = CompiledPredicate::compile(&pred, &schema, &pool).expect_err("unknown");

        // Assert
        assert_eq!(err.code(), "RINGO-001");
    }

    #[test]
    fn test_compile_string_vs_number_is_type_mismatch() {
        let schema = Schema::from_columns([("name", ColumnType::Str), ("n", ColumnType::Int)])
            .expect("schema");
        let pool = StringPool::new();

        let err = CompiledPredicate::compile(&PredicateNode::eq("name", 1).into(), &schema, &pool)
            .expect_err("mismatch");
        assert_eq!(err.code(), "RINGO-003");

        let err = CompiledPredicate::compile(
            &PredicateNode::compare_cols("name", CompareOp::Eq, "n").into(),
            &schema,
            &pool,
        )
        .expect_err("mismatch");
        assert_eq!(err.code(), "RINGO-003");
    }

    #[test]
    fn test_compile_accepts_numeric_promotion() {
        let schema = Schema::from_columns([("i", ColumnType::Int), ("f", ColumnType::Float)])
            .expect("schema");
        let pool = StringPool::new();
        let pred = Predicate::new(
            PredicateNode::lt("i", 2.5).and(PredicateNode::compare_cols("i", CompareOp::Leq, "f")),
        );
        assert!(CompiledPredicate::compile(&pred, &schema, &pool).is_ok());
    }
}
