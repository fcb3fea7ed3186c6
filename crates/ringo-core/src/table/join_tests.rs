//! Tests for `join` module

#[cfg(test)]
mod tests {
    use crate::context::TableContext;
    use crate::distance::SimMetric;
    use crate::schema::{ColumnType, Primitive, Schema};
    use crate::table::*;

    fn animals(ctx: &TableContext) -> Table {
        let schema =
            Schema::from_columns([("Animal", ColumnType::Str), ("Location", ColumnType::Str)]).expect("schema");
        let mut table = Table::with_schema(schema, ctx);
        for (animal, location) in [("Lion", "Africa"), ("Koala", "Australia"), ("Ant", "Africa")] {
            table.add_row(&[animal.into(), location.into()]).expect("row");
        }
        table
    }

    fn regions(ctx: &TableContext) -> Table {
        let schema =
            Schema::from_columns([("Location", ColumnType::Str), ("Climate", ColumnType::Str)]).expect("schema");
        let mut table = Table::with_schema(schema, ctx);
        for (location, climate) in [("Africa", "hot"), ("Africa", "dry"), ("Europe", "mild")] {
            table.add_row(&[location.into(), climate.into()]).expect("row");
        }
        table
    }

    fn points(ctx: &TableContext) -> Table {
        let schema = Schema::from_columns([
            ("G", ColumnType::Str),
            ("X", ColumnType::Float),
            ("Lat", ColumnType::Float),
            ("Lon", ColumnType::Int),
        ])
        .expect("schema");
        let mut table = Table::with_schema(schema, ctx);
        for (g, x, lat, lon) in [("A", 0.0, 0.0, 0), ("A", 1.0, 0.0, 1), ("B", 5.0, 10.0, 0)] {
            table
                .add_row(&[g.into(), Primitive::Float(x), Primitive::Float(lat), Primitive::Int(lon)])
                .expect("row");
        }
        table
    }

    #[test]
    fn test_join_emits_every_matching_pair() {
        // Arrange
        let ctx = TableContext::new();
        let left = animals(&ctx);
        let right = regions(&ctx);

        // Act
        let joined = left.join("Location", &right, "Location").expect("join");

        // Assert
        assert_eq!(joined.num_rows(), 4);
        assert_eq!(
            joined.schema().names(),
            vec!["Animal-1", "Location-1", "Location-2", "Climate-1"]
        );
        assert_eq!(joined.read_str_col("Animal").expect("names"), vec!["Lion", "Lion", "Ant", "Ant"]);
        assert_eq!(joined.read_str_col("Climate").expect("climate"), vec!["hot", "dry", "hot", "dry"]);
        assert_eq!(joined.read_str_col("Location-2").expect("right key"), vec!["Africa"; 4]);
    }

    #[test]
    fn test_join_across_contexts() {
        let left = animals(&TableContext::new());
        let right = regions(&TableContext::new());

        let joined = left.join("Location", &right, "Location").expect("join");

        assert_eq!(joined.num_rows(), 4);
        assert!(joined.context().same_pool(left.context()));
        assert_eq!(joined.get_str("Climate", 1).expect("climate"), "dry");
    }

    #[test]
    fn test_join_ignores_deleted_rows() {
        let ctx = TableContext::new();
        let mut left = animals(&ctx);
        let mut right = regions(&ctx);
        left.remove_row(0).expect("remove");
        right.remove_row(1).expect("remove");

        let joined = left.join("Location", &right, "Location").expect("join");

        assert_eq!(joined.num_rows(), 1);
        assert_eq!(joined.get_str("Animal", 0).expect("name"), "Ant");
    }

    #[test]
    fn test_join_type_mismatch() {
        let ctx = TableContext::new();
        let left = animals(&ctx);
        let right = points(&ctx);

        let err = left.join("Location", &right, "X").expect_err("type");

        assert_eq!(err.code(), "RINGO-003");
        assert_eq!(left.join("Nope", &right, "X").expect_err("unknown").code(), "RINGO-001");
    }

    #[test]
    fn test_self_join_cardinality() {
        let table = animals(&TableContext::new());

        let joined = table.self_join("Location").expect("join");

        // Africa contributes 2 x 2 pairs, Australia 1 x 1.
        assert_eq!(joined.num_rows(), 5);
        assert!(joined.schema().contains("Animal-2"));
    }

    #[test]
    fn test_sim_join_l1_threshold() {
        // Arrange
        let table = points(&TableContext::new());

        // Act
        let joined = table.self_sim_join(&["X"], "Dist", SimMetric::L1, 1.0).expect("join");

        // Assert
        assert_eq!(joined.num_rows(), 5);
        assert_eq!(joined.read_float_col("Dist").expect("dist"), vec![0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sim_join_l2_mixes_int_and_float_columns() {
        let ctx = TableContext::new();
        let left = points(&ctx);
        let right = points(&ctx);

        let joined = left.sim_join(&["X", "Lon"], &right, &["X", "Lon"], "Dist", SimMetric::L2, 1.5).expect("join");

        let dist = joined.read_float_col("Dist").expect("dist");
        assert_eq!(joined.num_rows(), 5);
        assert!((dist[1] - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sim_join_jaccard_over_strings() {
        let schema =
            Schema::from_columns([("T1", ColumnType::Str), ("T2", ColumnType::Str)]).expect("schema");
        let mut table = Table::with_schema(schema, &TableContext::new());
        for (a, b) in [("a", "b"), ("a", "c"), ("b", "a")] {
            table.add_row(&[a.into(), b.into()]).expect("row");
        }

        let joined = table.self_sim_join(&["T1", "T2"], "Dist", SimMetric::Jaccard, 0.0).expect("join");

        // Identical value sets only: (0,0), (0,2), (1,1), (2,0), (2,2).
        assert_eq!(joined.num_rows(), 5);
        assert_eq!(joined.read_str_col("T2-2").expect("right"), vec!["b", "a", "c", "b", "a"]);
    }

    #[test]
    fn test_sim_join_haversine() {
        let table = points(&TableContext::new());

        let joined = table.self_sim_join(&["Lat", "Lon"], "Km", SimMetric::Haversine, 200.0).expect("join");

        let km = joined.read_float_col("Km").expect("km");
        assert_eq!(joined.num_rows(), 5);
        assert!((km[1] - 111.19).abs() < 0.1);
    }

    #[test]
    fn test_sim_join_argument_errors() {
        let table = points(&TableContext::new());

        let empty = table.self_sim_join(&[], "D", SimMetric::L1, 1.0).expect_err("empty");
        let unequal = table
            .sim_join(&["X"], &table, &["X", "Lat"], "D", SimMetric::L1, 1.0)
            .expect_err("unequal");
        let haversine = table.self_sim_join(&["X"], "D", SimMetric::Haversine, 1.0).expect_err("arity");
        let non_numeric = table.self_sim_join(&["G"], "D", SimMetric::L2, 1.0).expect_err("type");

        assert_eq!(empty.code(), "RINGO-006");
        assert_eq!(unequal.code(), "RINGO-006");
        assert_eq!(haversine.code(), "RINGO-006");
        assert_eq!(non_numeric.code(), "RINGO-003");
    }

    #[test]
    fn test_self_sim_join_per_group_includes_self_pairs() {
        // Arrange
        let table = points(&TableContext::new());

        // Act
        let joined = table
            .self_sim_join_per_group(&["G"], &["X"], "Dist", SimMetric::L1, 10.0)
            .expect("join");

        // Assert: group A has 2 x 2 pairs, group B only its self pair.
        assert_eq!(joined.num_rows(), 5);
        assert_eq!(joined.read_str_col("G").expect("left"), vec!["A", "A", "A", "A", "B"]);
        assert_eq!(joined.read_str_col("G-2").expect("right"), vec!["A", "A", "A", "A", "B"]);
    }
}
