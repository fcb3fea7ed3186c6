//! Tests for `schema` module

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::schema::*;

    fn animal_schema() -> Schema {
        Schema::from_columns([
            ("Animal", ColumnType::Str),
            ("Size", ColumnType::Str),
            ("Location", ColumnType::Str),
            ("Number", ColumnType::Int),
        ])
        .expect("schema")
    }

    // ========================================================================
    // Name normalization
    // ========================================================================

    #[test]
    fn test_normalize_appends_suffix() {
        assert_eq!(normalize_col_name("Animal"), "Animal-1");
        assert_eq!(normalize_col_name("x"), "x-1");
        assert_eq!(normalize_col_name(""), "-1");
    }

    #[test]
    fn test_normalize_keeps_underscore_and_suffixed_names() {
        assert_eq!(normalize_col_name("_id"), "_id");
        assert_eq!(normalize_col_name("Animal-1"), "Animal-1");
        assert_eq!(normalize_col_name("Animal-2"), "Animal-2");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for name in ["a", "Location", "_x", "b-3", "Size-1"] {
            let once = normalize_col_name(name);
            assert_eq!(normalize_col_name(&once), once);
        }
    }

    #[test]
    fn test_base_col_name_strips_ordinal() {
        assert_eq!(base_col_name("Animal-1"), "Animal");
        assert_eq!(base_col_name("Animal-2"), "Animal");
        assert_eq!(base_col_name("_id"), "_id");
        assert_eq!(base_col_name("plain"), "plain");
    }

    // ========================================================================
    // Schema construction
    // ========================================================================

    #[test]
    fn test_schema_typed_indices_follow_declaration_order() {
        // Arrange & Act
        let schema = animal_schema();

        // Assert
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.count_of(ColumnType::Str), 3);
        assert_eq!(schema.count_of(ColumnType::Int), 1);
        assert_eq!(
            schema.get("Location"),
            Some(ColumnRef {
                ty: ColumnType::Str,
                index: 2
            })
        );
        assert_eq!(schema.resolve("Number-1").expect("number").index, 0);
    }

    #[test]
    fn test_schema_rejects_duplicates_after_normalization() {
        let err = Schema::from_columns([("a", ColumnType::Int), ("a-1", ColumnType::Float)])
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.code(), "RINGO-002");
    }

    #[test]
    fn test_schema_resolve_missing_column() {
        let err = animal_schema().resolve("Weight").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("Weight-1"));
    }

    #[test]
    fn test_schema_resolve_typed_mismatch() {
        let err = animal_schema()
            .resolve_typed("Number", ColumnType::Str)
            .expect_err("mismatch");
        assert_eq!(err.code(), "RINGO-003");
    }

    #[test]
    fn test_schema_storage_order_groups_by_type() {
        let order: Vec<String> = animal_schema()
            .storage_order()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(order, vec!["Number-1", "Animal-1", "Size-1", "Location-1"]);
    }

    #[test]
    fn test_schema_compatibility_is_by_type_sequence() {
        let a = Schema::from_columns([("x", ColumnType::Int), ("y", ColumnType::Str)]).expect("a");
        let b = Schema::from_columns([("p", ColumnType::Int), ("q", ColumnType::Str)]).expect("b");
        let c = Schema::from_columns([("p", ColumnType::Str), ("q", ColumnType::Int)]).expect("c");
        assert!(a.is_compatible(&b));
        assert!(!a.is_compatible(&c));
    }

    // ========================================================================
    // Rename / remove
    // ========================================================================

    #[test]
    fn test_schema_rename_keeps_position() {
        // Arrange
        let mut schema = animal_schema();

        // Act
        schema.rename("Size", "Height").expect("rename");

        // Assert
        assert_eq!(
            schema.names(),
            vec!["Animal-1", "Height-1", "Location-1", "Number-1"]
        );
        assert!(!schema.contains("Size"));
    }

    #[test]
    fn test_schema_rename_to_existing_fails() {
        let mut schema = animal_schema();
        let err = schema.rename("Size", "Animal").expect_err("dup");
        assert_eq!(err.code(), "RINGO-002");
    }

    #[test]
    fn test_schema_remove_shifts_same_type_indices() {
        // Arrange
        let mut schema = animal_schema();

        // Act
        let removed = schema.remove_column("Animal").expect("remove");

        // Assert
        assert_eq!(removed.index, 0);
        assert_eq!(schema.get("Size").expect("size").index, 0);
        assert_eq!(schema.get("Location").expect("loc").index, 1);
        assert_eq!(schema.get("Number").expect("num").index, 0);
        assert_eq!(schema.count_of(ColumnType::Str), 2);
    }

    // ========================================================================
    // Primitive
    // ========================================================================

    #[test]
    fn test_primitive_conversions() {
        assert_eq!(Primitive::from(3).ty(), ColumnType::Int);
        assert_eq!(Primitive::from(2.5).as_f64(), Some(2.5));
        assert_eq!(Primitive::from(4_i64).as_f64(), Some(4.0));
        assert_eq!(Primitive::from("x").as_str(), Some("x"));
        assert_eq!(Primitive::from("x").as_f64(), None);
        assert_eq!(Primitive::Int(7).to_string(), "7");
    }
}
