//! String interning pool backing every string column.
//!
//! The pool is append-only: an interned string keeps its id for the lifetime
//! of the pool and ids are never reused. Tables created under the same
//! [`TableContext`](crate::TableContext) share one pool, so equal strings in
//! different tables carry equal ids.
//!
//! Ids are `u32`, so one pool holds fewer than 2^32 strings.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Handle to a pooled string. Equal ids mean equal strings within one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StringId(pub(crate) u32);

impl StringId {
    /// Returns the raw integer id.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the id widened to `i64`, the form used inside group keys.
    #[must_use]
    pub const fn as_key(self) -> i64 {
        self.0 as i64
    }
}

/// Append-only table of distinct strings.
///
/// Serialization writes the strings in id order and nothing else. The lookup
/// index is rebuilt when an image is read back.
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    index: FxHashMap<String, StringId>,
    strings: Vec<String>,
}

impl StringPool {
    /// Empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `s`, adding it on first sight.
    ///
    /// # Panics
    ///
    /// Panics once `u32::MAX` distinct strings have been interned.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let raw = u32::try_from(self.strings.len())
            .ok()
            .filter(|&n| n < u32::MAX);
        let Some(raw) = raw else {
            panic!("string pool is full ({} entries)", u32::MAX);
        };
        let id = StringId(raw);
        self.strings.push(s.to_owned());
        self.index.insert(s.to_owned(), id);
        id
    }

    /// String behind `id`, if it was issued by this pool.
    #[must_use]
    pub fn get(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(String::as_str)
    }

    /// Like [`StringPool::get`] but fails with [`Error::UnknownStringId`].
    pub fn resolve(&self, id: StringId) -> Result<&str> {
        self.get(id).ok_or(Error::UnknownStringId(id.0))
    }

    /// Id of `s` if it is already interned.
    #[must_use]
    pub fn get_id(&self, s: &str) -> Option<StringId> {
        self.index.get(s).copied()
    }

    /// Distinct strings held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true before the first intern.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Serialize for StringPool {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.strings.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StringPool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        let mut index = FxHashMap::with_capacity_and_hasher(strings.len(), Default::default());
        for (pos, s) in strings.iter().enumerate() {
            let raw = u32::try_from(pos)
                .map_err(|_| serde::de::Error::custom("string pool exceeds u32 id space"))?;
            index.entry(s.clone()).or_insert(StringId(raw));
        }
        Ok(Self { index, strings })
    }
}
