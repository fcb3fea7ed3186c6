//! Tests for `context` module

#[cfg(test)]
mod tests {
    use crate::config::RingoConfig;
    use crate::context::*;

    #[test]
    fn test_context_clones_share_pool() {
        // Arrange
        let ctx = TableContext::new();
        let clone = ctx.clone();

        // Act
        let id = ctx.intern("shared");

        // Assert
        assert!(ctx.same_pool(&clone));
        assert_eq!(clone.resolve(id).expect("resolve"), "shared");
        assert_eq!(clone.pool().get_id("shared"), Some(id));
    }

    #[test]
    fn test_context_independent_pools() {
        let a = TableContext::new();
        let b = TableContext::new();
        a.intern("only-in-a");
        assert!(!a.same_pool(&b));
        assert!(b.pool().get_id("only-in-a").is_none());
    }

    #[test]
    fn test_context_execution_toggle_is_shared() {
        let ctx = TableContext::new();
        let clone = ctx.clone();
        assert!(!clone.execution().parallel);

        ctx.set_parallel(true);

        assert!(clone.execution().parallel);
    }

    #[test]
    fn test_context_from_config() {
        // Arrange
        let mut config = RingoConfig::default();
        config.execution.parallel = true;
        config.execution.chunks_per_thread = 3;

        // Act
        let ctx = TableContext::from_config(&config);

        // Assert
        let exec = ctx.execution();
        assert!(exec.parallel);
        assert_eq!(exec.chunks_per_thread, 3);
    }

    #[test]
    fn test_execution_use_parallel_respects_threshold() {
        let exec = ExecutionConfig::parallel().with_min_parallel_rows(100);
        assert!(!exec.use_parallel(99));
        assert!(exec.use_parallel(100));
        assert!(!ExecutionConfig::serial().use_parallel(1_000_000));
    }

    #[test]
    fn test_execution_chunk_len_never_zero() {
        let exec = ExecutionConfig::parallel();
        assert!(exec.chunk_len(0) >= 1);
        assert!(exec.chunk_len(1) >= 1);
        let len = 10_000;
        assert!(exec.chunk_len(len) * exec.num_chunks() >= len);
    }

    #[test]
    fn test_context_bin_roundtrip() {
        // Arrange
        let ctx = TableContext::new();
        let a = ctx.intern("alpha");
        let b = ctx.intern("beta");
        let mut buf = Vec::new();

        // Act
        ctx.save_bin(&mut buf).expect("save");
        let loaded = TableContext::load_bin(buf.as_slice()).expect("load");

        // Assert
        assert_eq!(loaded.resolve(a).expect("a"), "alpha");
        assert_eq!(loaded.resolve(b).expect("b"), "beta");
        assert_eq!(loaded.pool().len(), 2);
    }

    #[test]
    fn test_context_load_rejects_bad_magic() {
        let err = TableContext::load_bin(&b"XXXXrest"[..]).expect_err("bad magic");
        assert_eq!(err.code(), "RINGO-013");
    }
}
