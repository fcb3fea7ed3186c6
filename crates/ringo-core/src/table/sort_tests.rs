//! Tests for `sort` module

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use crate::context::{ExecutionConfig, TableContext};
    use crate::schema::{ColumnType, Primitive, Schema};
    use crate::table::*;

    fn animals() -> Table {
        let schema = Schema::from_columns([
            ("Animal", ColumnType::Str),
            ("Location", ColumnType::Str),
            ("Weight", ColumnType::Float),
        ])
        .expect("schema");
        let mut table = Table::with_schema(schema, &TableContext::new());
        for (animal, location, weight) in [
            ("Lion", "Africa", 190.0),
            ("Koala", "Australia", 8.5),
            ("Ant", "Africa", 0.001),
            ("Emu", "Australia", 40.0),
        ] {
            table
                .add_row(&[animal.into(), location.into(), Primitive::Float(weight)])
                .expect("row");
        }
        table
    }

    fn shuffled(ctx: &TableContext, n: i64) -> Table {
        let schema = Schema::from_columns([("Key", ColumnType::Int)]).expect("schema");
        let mut table = Table::with_schema(schema, ctx);
        for i in 0..n {
            table.add_row(&[Primitive::Int((i * 37) % n)]).expect("row");
        }
        table
    }

    #[test]
    fn test_order_ascending_by_string() {
        let mut table = animals();

        table.order_by(&["Animal"], true).expect("order");

        assert_eq!(table.read_str_col("Animal").expect("names"), vec!["Ant", "Emu", "Koala", "Lion"]);
        assert_eq!(table.num_rows(), 4);
    }

    #[test]
    fn test_order_descending_by_float() {
        let mut table = animals();

        table.order(&SortSpec::new(&["Weight"]).descending()).expect("order");

        assert_eq!(table.logical_rows(), vec![0, 3, 1, 2]);
    }

    #[test]
    fn test_multi_key_order_with_reset_ranks() {
        // Arrange
        let mut table = animals();
        let spec = SortSpec::new(&["Location", "Weight"]).with_rank("Rank").reset_rank_by_msc();

        // Act
        table.order(&spec).expect("order");

        // Assert
        assert_eq!(table.read_str_col("Animal").expect("names"), vec!["Ant", "Lion", "Koala", "Emu"]);
        assert_eq!(table.read_int_col("Rank").expect("ranks"), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_ranks_without_reset_are_positions() {
        let mut table = animals();

        table.order(&SortSpec::new(&["Weight"]).with_rank("Rank")).expect("order");

        assert_eq!(table.read_int_col("Rank").expect("ranks"), vec![0, 1, 2, 3]);
        assert_eq!(table.get_int("Rank", 0).expect("lion"), 3);
    }

    #[test]
    fn test_order_skips_deleted_rows() {
        let mut table = animals();
        table.remove_row(2).expect("remove");

        table.order_by(&["Weight"], true).expect("order");

        assert_eq!(table.logical_rows(), vec![1, 3, 0]);
        assert!(!table.is_row_valid(2));
    }

    #[test]
    fn test_order_errors_leave_chain_untouched() {
        let mut table = animals();

        let unknown = table.order_by(&["Colour"], true).expect_err("unknown");
        let empty = table.order_by(&[], true).expect_err("empty");
        let rank = table
            .order(&SortSpec::new(&["Weight"]).with_rank("Animal"))
            .expect_err("rank type");

        assert_eq!(unknown.code(), "RINGO-001");
        assert_eq!(empty.code(), "RINGO-006");
        assert_eq!(rank.code(), "RINGO-003");
        assert_eq!(table.logical_rows(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_compare_rows() {
        let table = animals();

        assert_eq!(
            table.compare_rows(0, 2, &["Location"], true).expect("cmp"),
            Ordering::Equal
        );
        assert_eq!(
            table.compare_rows(0, 2, &["Location", "Weight"], true).expect("cmp"),
            Ordering::Greater
        );
        assert_eq!(
            table.compare_rows(0, 2, &["Location", "Weight"], false).expect("cmp"),
            Ordering::Less
        );
        assert_eq!(
            table.compare_rows(0, 9, &["Weight"], true).expect_err("range").code(),
            "RINGO-004"
        );
    }

    #[test]
    fn test_quicksort_handles_many_duplicates() {
        let schema = Schema::from_columns([("Key", ColumnType::Int)]).expect("schema");
        let mut table = Table::with_schema(schema, &TableContext::new());
        for i in 0..300 {
            table.add_row(&[Primitive::Int(i % 5)]).expect("row");
        }

        table.order_by(&["Key"], true).expect("order");

        let keys = table.read_int_col("Key").expect("keys");
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(keys.len(), 300);
    }

    #[test]
    fn test_parallel_order_matches_serial() {
        // Arrange
        let parallel_ctx = TableContext::new();
        parallel_ctx.set_execution(ExecutionConfig::parallel().with_min_parallel_rows(1));
        let mut serial = shuffled(&TableContext::new(), 1000);
        let mut parallel = shuffled(&parallel_ctx, 1000);

        // Act
        serial.order_by(&["Key"], false).expect("serial");
        parallel.order_by(&["Key"], false).expect("parallel");

        // Assert
        assert_eq!(parallel.logical_rows(), serial.logical_rows());
        assert_eq!(parallel.read_int_col("Key").expect("keys")[0], 999);
    }
}
