//! Tests for `string_pool` module

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::string_pool::*;

    #[test]
    fn test_string_pool_intern() {
        // Arrange
        let mut pool = StringPool::new();

        // Act
        let id1 = pool.intern("hello");
        let id2 = pool.intern("world");
        let id3 = pool.intern("hello");

        // Assert
        assert_eq!(id1, id3);
        assert_ne!(id1, id2);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_string_pool_ids_are_dense_and_stable() {
        let mut pool = StringPool::new();
        let a = pool.intern("a");
        let b = pool.intern("b");
        pool.intern("c");

        assert_eq!(a.as_u32(), 0);
        assert_eq!(b.as_u32(), 1);
        assert_eq!(pool.intern("a"), a);
        assert_eq!(pool.get(b), Some("b"));
    }

    #[test]
    fn test_string_pool_resolve_unknown_id() {
        // Arrange
        let pool = StringPool::new();

        // Act
        let err = pool.resolve(StringId(7)).expect_err("unknown id");

        // Assert
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_string_pool_get_id_does_not_intern() {
        let mut pool = StringPool::new();
        pool.intern("existing");

        assert!(pool.get_id("existing").is_some());
        assert!(pool.get_id("missing").is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_string_pool_empty_string_is_a_value() {
        let mut pool = StringPool::new();
        assert!(pool.is_empty());
        let id = pool.intern("");
        assert_eq!(pool.resolve(id).expect("resolve"), "");
        assert!(!pool.is_empty());
    }

    #[test]
    fn test_string_pool_bincode_roundtrip() {
        let mut pool = StringPool::new();
        let ids: Vec<StringId> = ["x", "y", "z"].iter().map(|s| pool.intern(s)).collect();

        let bytes = bincode::serialize(&pool).expect("serialize");
        let restored: StringPool = bincode::deserialize(&bytes).expect("deserialize");

        for (id, s) in ids.iter().zip(["x", "y", "z"]) {
            assert_eq!(restored.get(*id), Some(s));
            assert_eq!(restored.get_id(s), Some(*id));
        }
    }
}
