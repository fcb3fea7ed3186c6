//! Tests for `rows` module

#[cfg(test)]
mod tests {
    use crate::context::TableContext;
    use crate::schema::{ColumnType, Primitive, Schema};
    use crate::table::*;

    fn pairs(ctx: &TableContext, rows: &[(&str, i64)]) -> Table {
        let schema =
            Schema::from_columns([("Name", ColumnType::Str), ("Value", ColumnType::Int)]).expect("schema");
        let mut table = Table::with_schema(schema, ctx);
        for (name, value) in rows {
            table.add_row(&[(*name).into(), Primitive::Int(*value)]).expect("row");
        }
        table
    }

    #[test]
    fn test_add_row_validates_before_mutating() {
        // Arrange
        let ctx = TableContext::new();
        let mut table = pairs(&ctx, &[("a", 1)]);

        // Act
        let wrong_type = table.add_row(&[Primitive::Int(1), Primitive::Int(2)]);
        let wrong_len = table.add_row(&["b".into()]);

        // Assert
        assert_eq!(wrong_type.expect_err("type").code(), "RINGO-003");
        assert_eq!(wrong_len.expect_err("len").code(), "RINGO-006");
        assert_eq!(table.num_rows(), 1);
        assert!(ctx.pool().get_id("b").is_none());
    }

    #[test]
    fn test_add_row_promotes_int_into_float_column() {
        let ctx = TableContext::new();
        let schema = Schema::from_columns([("x", ColumnType::Float)]).expect("schema");
        let mut table = Table::with_schema(schema, &ctx);

        table.add_row(&[Primitive::Int(3)]).expect("row");

        assert_eq!(table.get_float("x", 0).expect("value"), 3.0);
    }

    #[test]
    fn test_add_table_across_contexts_reinterns_strings() {
        // Arrange
        let mut left = pairs(&TableContext::new(), &[("a", 1)]);
        let right = pairs(&TableContext::new(), &[("zz", 2), ("a", 3)]);

        // Act
        left.add_table(&right).expect("append");

        // Assert
        assert_eq!(left.read_str_col("Name").expect("names"), vec!["a", "zz", "a"]);
        assert_eq!(left.get_str_id("Name", 0).expect("id"), left.get_str_id("Name", 2).expect("id"));
    }

    #[test]
    fn test_add_table_incompatible_schema() {
        let ctx = TableContext::new();
        let mut table = pairs(&ctx, &[("a", 1)]);
        let schema = Schema::from_columns([("Value", ColumnType::Int)]).expect("schema");
        let other = Table::with_schema(schema, &ctx);

        assert_eq!(table.add_table(&other).expect_err("schema").code(), "RINGO-009");
    }

    #[test]
    fn test_add_row_from_copies_single_row() {
        let ctx = TableContext::new();
        let src = pairs(&ctx, &[("a", 1), ("b", 2)]);
        let mut dst = pairs(&ctx, &[]);

        let row = dst.add_row_from(&src, 1).expect("copy");

        assert_eq!(row, 0);
        assert_eq!(dst.get_str("Name", 0).expect("name"), "b");
        assert!(dst.add_row_from(&src, 5).is_err());
    }

    #[test]
    fn test_remove_row_twice_reports_false() {
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2)]);

        assert!(table.remove_row(0).expect("first"));
        assert!(!table.remove_row(0).expect("second"));
        assert_eq!(table.num_valid_rows(), 1);
    }

    #[test]
    fn test_select_first_n() {
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2), ("c", 3)]);

        table.select_first_n(2);

        assert_eq!(table.logical_rows(), vec![0, 1]);
    }

    #[test]
    fn test_defrag_compacts_in_logical_order() {
        // Arrange
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
        table.remove_row(1).expect("remove");
        table.order_by(&["Value"], false).expect("order");

        // Act
        table.defrag();

        // Assert
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.num_valid_rows(), 3);
        assert_eq!(table.logical_rows(), vec![0, 1, 2]);
        assert_eq!(table.read_int_col("Value").expect("values"), vec![4, 3, 1]);
    }

    #[test]
    fn test_partition_ranges_cover_logical_positions() {
        let table = pairs(&TableContext::new(), &[("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)]);

        let ranges = table.partition_ranges(2);

        assert_eq!(ranges, vec![0..3, 3..5]);
        assert_eq!(table.partition_ranges(10).len(), 5);
        assert!(pairs(&TableContext::new(), &[]).partition_ranges(3).is_empty());
    }

    #[test]
    fn test_init_ids_and_lookup() {
        // Arrange
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2), ("c", 3)]);

        // Act
        table.init_ids().expect("ids");

        // Assert
        assert!(table.has_ids());
        assert_eq!(table.read_int_col(ID_COL).expect("ids"), vec![0, 1, 2]);
        assert_eq!(table.physical_row(2), Some(2));
    }

    #[test]
    fn test_ids_survive_defrag() {
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2), ("c", 3)]);
        table.init_ids().expect("ids");
        table.remove_row(0).expect("remove");

        table.defrag();

        assert_eq!(table.physical_row(0), None);
        assert_eq!(table.physical_row(2), Some(1));
        assert_eq!(table.get_str("Name", 1).expect("name"), "c");
    }

    #[test]
    fn test_add_row_assigns_next_id() {
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2)]);
        table.init_ids().expect("ids");

        let row = table.add_row(&["c".into(), Primitive::Int(3)]).expect("row");

        assert_eq!(table.get_int(ID_COL, row).expect("id"), 2);
        assert_eq!(table.physical_row(2), Some(row));
    }

    #[test]
    fn test_remove_row_drops_id_mapping() {
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2)]);
        table.init_ids().expect("ids");

        table.remove_row(1).expect("remove");

        assert_eq!(table.physical_row(1), None);
        assert_eq!(table.physical_row(0), Some(0));
    }

    #[test]
    fn test_project_keeps_live_ids() {
        // Arrange
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2), ("c", 3)]);
        table.init_ids().expect("ids");
        table.remove_row(0).expect("remove");

        // Act
        let mut projected = table.project(&[ID_COL, "Name"]).expect("project");
        let row = projected.add_row(&["d".into()]).expect("row");

        // Assert
        assert!(projected.has_ids());
        assert_eq!(projected.physical_row(1), Some(0));
        assert_eq!(projected.physical_row(2), Some(1));
        assert_eq!(projected.read_int_col(ID_COL).expect("ids"), vec![1, 2, 3]);
        assert_eq!(projected.physical_row(3), Some(row));
    }

    #[test]
    fn test_join_output_has_no_live_ids() {
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("a", 2), ("b", 3)]);
        table.init_ids().expect("ids");

        let joined = table.self_join("Name").expect("join");

        assert!(!joined.has_ids());
        assert_eq!(joined.read_int_col("_id-1").expect("left ids"), vec![0, 0, 1, 1, 2]);
        assert_eq!(joined.read_int_col("_id-2").expect("right ids"), vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn test_summary_grouped_by_id_keeps_live_ids() {
        let mut table = pairs(&TableContext::new(), &[("a", 1), ("b", 2)]);
        table.init_ids().expect("ids");

        let summary = table
            .aggregate_summary(&[ID_COL], AggrPolicy::Sum, "Value", "Total")
            .expect("summary");

        assert!(summary.has_ids());
        let row = summary.physical_row(1).expect("id 1");
        assert_eq!(summary.get_int("Total", row).expect("total"), 2);
    }
}
