//! Tests for `graph` module

#[cfg(test)]
mod tests {
    use crate::context::{ExecutionConfig, TableContext};
    use crate::schema::{ColumnType, Primitive, Schema};
    use crate::table::*;

    fn edges(ctx: &TableContext) -> Table {
        let schema = Schema::from_columns([
            ("Src", ColumnType::Int),
            ("Dst", ColumnType::Int),
            ("Time", ColumnType::Int),
            ("Weight", ColumnType::Float),
            ("Label", ColumnType::Str),
        ])
        .expect("schema");
        let mut table = Table::with_schema(schema, ctx);
        for (src, dst, time, weight, label) in [
            (1, 2, 0, 1.0, "a"),
            (2, 3, 1, 2.0, "b"),
            (1, 3, 2, 3.0, "a"),
            (3, 1, 5, 4.0, "c"),
        ] {
            table
                .add_row(&[
                    Primitive::Int(src),
                    Primitive::Int(dst),
                    Primitive::Int(time),
                    Primitive::Float(weight),
                    label.into(),
                ])
                .expect("row");
        }
        table.set_src_col("Src").expect("src");
        table.set_dst_col("Dst").expect("dst");
        table
    }

    fn edge_counts(graphs: &[GraphParts]) -> Vec<usize> {
        graphs.iter().map(GraphParts::num_edges).collect()
    }

    #[test]
    fn test_to_graph_nodes_edges_and_attrs() {
        // Arrange
        let mut table = edges(&TableContext::new());
        table.add_src_node_attr("Weight").expect("attr");
        table.add_edge_attr("Label").expect("edge attr");

        // Act
        let graph = table.to_graph(AggrPolicy::Sum).expect("graph");

        // Assert
        assert_eq!(graph.nodes, vec![1, 2, 3]);
        assert_eq!(graph.num_edges(), 4);
        assert_eq!(graph.edges[3], GraphEdge { id: 3, src: 3, dst: 1 });
        assert_eq!(graph.node_attrs[&1]["Weight-1"], Primitive::Float(4.0));
        assert_eq!(graph.node_attrs[&2]["Weight-1"], Primitive::Float(2.0));
        assert_eq!(graph.edge_attrs[&1]["Label-1"], Primitive::Str("b".to_string()));
        assert_eq!(graph.node_values[&3], Primitive::Int(3));
    }

    #[test]
    fn test_node_attr_covers_both_endpoints() {
        let mut table = edges(&TableContext::new());
        table.add_node_attr("Time").expect("attr");

        let graph = table.to_graph(AggrPolicy::Count).expect("graph");

        // Node 3 is destination of rows 1 and 2 and source of row 3.
        assert_eq!(graph.node_attrs[&3]["Time-1"], Primitive::Int(3));
        assert_eq!(table.graph_settings().src_node_attrs, vec!["Time-1".to_string()]);
        assert_eq!(table.graph_settings().dst_node_attrs, vec!["Time-1".to_string()]);
    }

    #[test]
    fn test_edge_ids_follow_permanent_ids() {
        let mut table = edges(&TableContext::new());
        table.init_ids().expect("ids");
        table.remove_row(0).expect("remove");
        table.defrag();

        let graph = table.to_graph(AggrPolicy::First).expect("graph");

        let ids: Vec<i64> = graph.edges.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_build_graph_skips_deleted_rows() {
        let mut table = edges(&TableContext::new());
        table.remove_row(1).expect("remove");

        let graph = table.build_graph(&[0, 1, 2], AggrPolicy::First).expect("graph");

        assert_eq!(graph.num_edges(), 2);
        assert_eq!(graph.nodes, vec![1, 2, 3]);
        assert_eq!(table.build_graph(&[7], AggrPolicy::First).expect_err("range").code(), "RINGO-004");
    }

    #[test]
    fn test_string_and_float_node_ids() {
        let ctx = TableContext::new();
        let mut table = edges(&ctx);
        table.set_src_col("Label").expect("src");
        table.set_dst_col("Label").expect("dst");

        let graph = table.to_graph(AggrPolicy::First).expect("graph");

        let a = ctx.pool().get_id("a").expect("interned").as_key();
        assert_eq!(graph.num_nodes(), 3);
        assert_eq!(graph.nodes[0], a);
        assert_eq!(graph.node_values[&a], Primitive::Str("a".to_string()));

        table.set_src_col("Weight").expect("src");
        table.set_dst_col("Weight").expect("dst");
        let graph = table.to_graph(AggrPolicy::First).expect("graph");
        assert_eq!(graph.nodes, vec![0, 1, 2, 3]);
        assert_eq!(graph.node_values[&2], Primitive::Float(3.0));
    }

    #[test]
    fn test_layout_errors() {
        let ctx = TableContext::new();
        let mut unset = Table::with_schema(
            Schema::from_columns([("Src", ColumnType::Int)]).expect("schema"),
            &ctx,
        );
        let mut table = edges(&ctx);

        let missing = unset.to_graph(AggrPolicy::First).expect_err("unset");
        unset.set_src_col("Src").expect("src");
        let missing_dst = unset.to_graph(AggrPolicy::First).expect_err("no dst");
        table.set_dst_col("Label").expect("dst");
        let mismatch = table.to_graph(AggrPolicy::First).expect_err("types");
        table.set_dst_col("Dst").expect("dst");
        table.add_src_node_attr("Label").expect("attr");
        let policy = table.to_graph(AggrPolicy::Mean).expect_err("policy");

        assert_eq!(missing.code(), "RINGO-010");
        assert_eq!(missing_dst.code(), "RINGO-010");
        assert_eq!(mismatch.code(), "RINGO-003");
        assert_eq!(policy.code(), "RINGO-006");
        assert_eq!(table.set_src_col("Nope").expect_err("unknown").code(), "RINGO-001");
    }

    #[test]
    fn test_window_sequences() {
        // Arrange
        let table = edges(&TableContext::new());

        // Act
        let tumbling = table
            .to_graph_sequence("Time", AggrPolicy::First, 2, 2, None, None)
            .expect("tumbling");
        let sliding = table
            .to_graph_sequence("Time", AggrPolicy::First, 3, 1, Some(0), Some(2))
            .expect("sliding");

        // Assert
        assert_eq!(edge_counts(&tumbling), vec![2, 1, 1]);
        assert_eq!(edge_counts(&sliding), vec![3, 2, 1]);
    }

    #[test]
    fn test_window_argument_errors() {
        let table = edges(&TableContext::new());

        let zero = table.to_graph_sequence("Time", AggrPolicy::First, 0, 1, None, None).expect_err("window");
        let reversed = table
            .to_graph_sequence("Time", AggrPolicy::First, 1, 1, Some(5), Some(1))
            .expect_err("range");
        let float_split = table.graph_windows("Weight", AggrPolicy::First, 1, 1, None, None).expect_err("type");
        let too_wide = table
            .to_graph_sequence("Time", AggrPolicy::First, 1, 1, Some(0), Some(i64::MAX))
            .expect_err("window count");

        assert_eq!(zero.code(), "RINGO-006");
        assert_eq!(reversed.code(), "RINGO-006");
        assert_eq!(too_wide.code(), "RINGO-006");
        assert_eq!(float_split.code(), "RINGO-003");
    }

    #[test]
    fn test_interval_sequences_are_half_open() {
        let table = edges(&TableContext::new());

        let graphs = table
            .to_var_graph_sequence("Time", AggrPolicy::First, &[(0, 2), (2, 6), (6, 9)])
            .expect("intervals");

        assert_eq!(edge_counts(&graphs), vec![2, 2, 0]);
        assert_eq!(
            table
                .to_var_graph_sequence("Time", AggrPolicy::First, &[(3, 3)])
                .expect_err("empty")
                .code(),
            "RINGO-006"
        );
    }

    #[test]
    fn test_graph_per_group_is_lazy_and_ordered() {
        let table = edges(&TableContext::new());

        let mut sequence = table.graph_groups("Src", AggrPolicy::First).expect("groups");
        assert_eq!(sequence.len(), 3);
        let first = sequence.next().expect("first").expect("graph");

        assert_eq!(first.nodes, vec![1, 2, 3]);
        assert_eq!(edge_counts(&table.to_graph_per_group("Src", AggrPolicy::First).expect("all")), vec![2, 1, 1]);
    }

    #[test]
    fn test_stateful_sequence_iteration() {
        // Arrange
        let mut table = edges(&TableContext::new());
        assert!(table.is_last_graph_of_sequence());
        assert_eq!(table.next_graph_iterator().expect_err("not started").code(), "RINGO-010");

        // Act
        let first = table.to_graph_per_group_iterator("Src", AggrPolicy::First).expect("first");
        let mut rest = Vec::new();
        while !table.is_last_graph_of_sequence() {
            rest.push(table.next_graph_iterator().expect("next"));
        }

        // Assert
        assert_eq!(first.num_edges(), 2);
        assert_eq!(edge_counts(&rest), vec![1, 1]);
        assert_eq!(table.next_graph_iterator().expect_err("exhausted").code(), "RINGO-010");
    }

    #[test]
    fn test_stateful_window_and_interval_iterators() {
        let mut table = edges(&TableContext::new());

        let window = table
            .to_graph_sequence_iterator("Time", AggrPolicy::First, 2, 2, None, None)
            .expect("window");
        assert_eq!(window.num_edges(), 2);
        assert!(!table.is_last_graph_of_sequence());

        let interval = table
            .to_var_graph_sequence_iterator("Time", AggrPolicy::First, &[(5, 6)])
            .expect("interval");
        assert_eq!(interval.edges, vec![GraphEdge { id: 3, src: 3, dst: 1 }]);
        assert!(table.is_last_graph_of_sequence());

        let empty = table.to_var_graph_sequence_iterator("Time", AggrPolicy::First, &[]);
        assert_eq!(empty.expect_err("empty").code(), "RINGO-010");
    }

    #[test]
    fn test_parallel_build_matches_serial() {
        let parallel_ctx = TableContext::new();
        parallel_ctx.set_execution(ExecutionConfig::parallel().with_min_parallel_rows(1));
        let serial = edges(&TableContext::new());
        let parallel = edges(&parallel_ctx);

        let expected = serial.to_graph(AggrPolicy::First).expect("serial");
        let actual = parallel.to_graph(AggrPolicy::First).expect("parallel");

        assert_eq!(actual.edges, expected.edges);
        assert_eq!(actual.nodes, expected.nodes);
    }

    #[test]
    fn test_settings_follow_rename_and_projection() {
        let mut table = edges(&TableContext::new());
        table.add_edge_attr("Weight").expect("attr");

        table.rename("Src", "From").expect("rename");
        table.project_in_place(&["From", "Dst", "Time"]).expect("project");

        let settings = table.graph_settings();
        assert_eq!(settings.src_col.as_deref(), Some("From-1"));
        assert!(settings.edge_attrs.is_empty());
        assert_eq!(table.to_graph(AggrPolicy::First).expect("graph").num_edges(), 4);
    }
}
