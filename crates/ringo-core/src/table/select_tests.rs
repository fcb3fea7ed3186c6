//! Tests for `select` module

#[cfg(test)]
mod tests {
    use crate::context::TableContext;
    use crate::predicate::{CompareOp, Predicate, PredicateNode};
    use crate::schema::{ColumnType, Primitive, Schema};
    use crate::table::*;

    fn animals() -> Table {
        let schema = Schema::from_columns([
            ("Animal", ColumnType::Str),
            ("Size", ColumnType::Str),
            ("Location", ColumnType::Str),
            ("Number", ColumnType::Int),
        ])
        .expect("schema");
        let mut table = Table::with_schema(schema, &TableContext::new());
        for (animal, size, location, number) in [
            ("Lion", "big", "Africa", 1),
            ("Koala", "medium", "Australia", 1),
            ("Ant", "small", "Africa", 1),
        ] {
            table
                .add_row(&[animal.into(), size.into(), location.into(), Primitive::Int(number)])
                .expect("row");
        }
        table
    }

    fn big_africa_or_medium_australia() -> Predicate {
        let africa = PredicateNode::eq("Location", "Africa").and(PredicateNode::eq("Size", "big"));
        let australia =
            PredicateNode::eq("Location", "Australia").and(PredicateNode::eq("Size", "medium"));
        Predicate::new(africa.or(australia))
    }

    #[test]
    fn test_select_compound_predicate() {
        // Arrange
        let mut table = animals();

        // Act
        let matched = table.select(&big_africa_or_medium_australia(), false).expect("select");

        // Assert
        assert_eq!(matched, vec![0, 1]);
        assert_eq!(table.num_valid_rows(), 3);
    }

    #[test]
    fn test_select_with_remove_deletes_matches() {
        let mut table = animals();

        let matched = table.select(&big_africa_or_medium_australia(), true).expect("select");

        assert_eq!(matched, vec![0, 1]);
        assert_eq!(table.logical_rows(), vec![2]);
    }

    #[test]
    fn test_complementary_selects_remove_everything_once() {
        // Arrange
        let mut table = animals();
        let pred = big_africa_or_medium_australia();

        // Act
        let first = table.select(&pred, true).expect("select");
        let second = table.select(&pred.negated(), true).expect("select");

        // Assert
        let mut all: Vec<usize> = first.into_iter().chain(second).collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_retain_keeps_matches() {
        let mut table = animals();

        let removed = table.retain(&Predicate::new(PredicateNode::eq("Location", "Africa"))).expect("retain");

        assert_eq!(removed, 1);
        assert_eq!(table.logical_rows(), vec![0, 2]);
    }

    #[test]
    fn test_select_unknown_column_leaves_table_untouched() {
        let mut table = animals();

        let err = table
            .select(&Predicate::new(PredicateNode::eq("Colour", "red")), true)
            .expect_err("unknown");

        assert_eq!(err.code(), "RINGO-001");
        assert_eq!(table.num_valid_rows(), 3);
    }

    #[test]
    fn test_select_in_candidates() {
        let mut table = animals();
        table.remove_row(2).expect("remove");

        let matched = table
            .select_in(&Predicate::new(PredicateNode::eq("Location", "Africa")), &[2, 0], false)
            .expect("select");

        assert_eq!(matched, vec![0]);
        assert!(table.select_in(&PredicateNode::eq("Number", 1).into(), &[9], false).is_err());
    }

    #[test]
    fn test_select_atomic_const_and_cols() {
        let mut table = animals();
        table.store_int_col("Legs", &[4, 4, 6]).expect("legs");

        let four_legs = table.select_atomic_const("Legs", 4, CompareOp::Eq, false).expect("const");
        let more_legs = table.select_atomic("Legs", "Number", CompareOp::Gt, false).expect("cols");

        assert_eq!(four_legs, vec![0, 1]);
        assert_eq!(more_legs, vec![0, 1, 2]);
    }

    #[test]
    fn test_string_ordering_is_lexicographic() {
        let mut table = animals();

        let before_l = table.select_atomic_const("Animal", "L", CompareOp::Lt, false).expect("select");

        assert_eq!(before_l, vec![1, 2]);
    }

    #[test]
    fn test_select_into_table_copies_matches() {
        let table = animals();

        let africa = table
            .select_into_table(&Predicate::new(PredicateNode::eq("Location", "Africa")))
            .expect("select");

        assert_eq!(africa.read_str_col("Animal").expect("names"), vec!["Lion", "Ant"]);
        assert_eq!(table.num_valid_rows(), 3);
    }

    #[test]
    fn test_classify_writes_labels() {
        // Arrange
        let mut table = animals();

        // Act
        table
            .classify(&big_africa_or_medium_australia(), "Match", 1, 0)
            .expect("classify");

        // Assert
        assert_eq!(table.read_int_col("Match").expect("labels"), vec![1, 1, 0]);
        assert_eq!(table.num_valid_rows(), 3);
    }

    #[test]
    fn test_classify_atomic() {
        let mut table = animals();
        table.store_int_col("Legs", &[4, 4, 6]).expect("legs");
        table.store_int_col("Wings", &[0, 0, 6]).expect("wings");

        table.classify_atomic("Legs", "Wings", CompareOp::Eq, "Same", 7, -1).expect("classify");

        assert_eq!(table.read_int_col("Same").expect("labels"), vec![-1, -1, 7]);
    }

    #[test]
    fn test_evaluate_single_row() {
        let table = animals();
        let pred = big_africa_or_medium_australia();

        assert!(table.evaluate(&pred, 0).expect("row 0"));
        assert!(!table.evaluate(&pred, 2).expect("row 2"));
        assert_eq!(table.evaluate(&pred, 3).expect_err("range").code(), "RINGO-004");
    }
}
