//! Column types, scalar values and the ordered table schema.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Suffix appended by [`normalize_col_name`].
pub const NORMALIZED_SUFFIX: &str = "-1";

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Interned string.
    Str,
}

impl ColumnType {
    /// Returns true for `Int` and `Float`.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    pub(crate) const ALL: [Self; 3] = [Self::Int, Self::Float, Self::Str];
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
            Self::Str => f.write_str("String"),
        }
    }
}

/// A typed scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    Str(String),
}

impl Primitive {
    /// Returns the column type that stores this value.
    #[must_use]
    pub const fn ty(&self) -> ColumnType {
        match self {
            Self::Int(_) => ColumnType::Int,
            Self::Float(_) => ColumnType::Float,
            Self::Str(_) => ColumnType::Str,
        }
    }

    /// Numeric view of the value, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    /// Integer view of the value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// String view of the value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Primitive {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Primitive {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Primitive {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Primitive {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Primitive {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Normalizes a user-facing column name.
///
/// Names starting with `_` and names whose second-to-last character is `-`
/// are kept; every other name gets the `-1` suffix.
#[must_use]
pub fn normalize_col_name(name: &str) -> String {
    if name.starts_with('_') || has_ordinal_suffix(name) {
        return name.to_string();
    }
    format!("{name}{NORMALIZED_SUFFIX}")
}

fn has_ordinal_suffix(name: &str) -> bool {
    let mut rev = name.chars().rev();
    rev.next().is_some() && rev.next() == Some('-')
}

/// Strips a trailing `-N` ordinal from a normalized name.
#[must_use]
pub fn base_col_name(name: &str) -> &str {
    if name.starts_with('_') || !has_ordinal_suffix(name) {
        return name;
    }
    let cut = name
        .char_indices()
        .rev()
        .nth(1)
        .map_or(name.len(), |(idx, _)| idx);
    &name[..cut]
}

/// Location of a column inside the typed column store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Storage type.
    pub ty: ColumnType,
    /// Index among the columns of the same type.
    pub index: usize,
}

/// Ordered set of named, typed columns.
///
/// Names are stored normalized. Typed indices increase with declaration order
/// within each type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: IndexMap<String, ColumnRef>,
    counts: [usize; 3],
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from `(name, type)` pairs in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if two names normalize to the same name.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: AsRef<str>,
    {
        let mut schema = Self::new();
        for (name, ty) in columns {
            schema.add_column(name.as_ref(), ty)?;
        }
        Ok(schema)
    }

    /// Builder variant of [`Schema::add_column`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if the name already exists.
    pub fn with_column(mut self, name: &str, ty: ColumnType) -> Result<Self> {
        self.add_column(name, ty)?;
        Ok(self)
    }

    /// Appends a column and returns its typed location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if the name already exists.
    pub fn add_column(&mut self, name: &str, ty: ColumnType) -> Result<ColumnRef> {
        let name = normalize_col_name(name);
        if self.columns.contains_key(&name) {
            return Err(Error::DuplicateColumn(name));
        }
        let slot = type_slot(ty);
        let col = ColumnRef {
            ty,
            index: self.counts[slot],
        };
        self.counts[slot] += 1;
        self.columns.insert(name, col);
        Ok(col)
    }

    /// Looks up a column by (un-normalized or normalized) name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ColumnRef> {
        self.columns.get(&normalize_col_name(name)).copied()
    }

    /// Looks up a column, failing with a schema error if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`].
    pub fn resolve(&self, name: &str) -> Result<ColumnRef> {
        let key = normalize_col_name(name);
        self.columns
            .get(&key)
            .copied()
            .ok_or(Error::ColumnNotFound(key))
    }

    /// Resolves a column and checks its type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] or [`Error::TypeMismatch`].
    pub fn resolve_typed(&self, name: &str, ty: ColumnType) -> Result<ColumnRef> {
        let col = self.resolve(name)?;
        if col.ty != ty {
            return Err(Error::type_mismatch(&normalize_col_name(name), ty, col.ty));
        }
        Ok(col)
    }

    /// Returns true if the column exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(&normalize_col_name(name))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of columns of type `ty`.
    #[must_use]
    pub fn count_of(&self, ty: ColumnType) -> usize {
        self.counts[type_slot(ty)]
    }

    /// Iterates `(normalized name, location)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnRef)> + '_ {
        self.columns.iter().map(|(name, col)| (name.as_str(), *col))
    }

    /// Column names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Column at declaration position `pos`.
    #[must_use]
    pub fn column_at(&self, pos: usize) -> Option<(&str, ColumnRef)> {
        self.columns
            .get_index(pos)
            .map(|(name, col)| (name.as_str(), *col))
    }

    /// Column types in declaration order.
    #[must_use]
    pub fn types(&self) -> Vec<ColumnType> {
        self.columns.values().map(|col| col.ty).collect()
    }

    /// Returns true if both schemas have the same type sequence.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .columns
                .values()
                .zip(other.columns.values())
                .all(|(a, b)| a.ty == b.ty)
    }

    /// Names grouped by type then typed index: ints, floats, strings.
    #[must_use]
    pub fn storage_order(&self) -> Vec<(String, ColumnRef)> {
        let mut out: Vec<(String, ColumnRef)> = self
            .columns
            .iter()
            .map(|(name, col)| (name.clone(), *col))
            .collect();
        out.sort_by_key(|(_, col)| (type_slot(col.ty), col.index));
        out
    }

    /// Renames a column in place, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] or [`Error::DuplicateColumn`].
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let old_key = normalize_col_name(old);
        let new_key = normalize_col_name(new);
        let pos = self
            .columns
            .get_index_of(&old_key)
            .ok_or_else(|| Error::ColumnNotFound(old_key.clone()))?;
        if old_key == new_key {
            return Ok(());
        }
        if self.columns.contains_key(&new_key) {
            return Err(Error::DuplicateColumn(new_key));
        }
        let (_, col) = self
            .columns
            .shift_remove_index(pos)
            .ok_or(Error::ColumnNotFound(old_key))?;
        let (end, _) = self.columns.insert_full(new_key, col);
        self.columns.move_index(end, pos);
        Ok(())
    }

    /// Removes a column, shifting later typed indices of the same type down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`].
    pub fn remove_column(&mut self, name: &str) -> Result<ColumnRef> {
        let key = normalize_col_name(name);
        let removed = self
            .columns
            .shift_remove(&key)
            .ok_or(Error::ColumnNotFound(key))?;
        for col in self.columns.values_mut() {
            if col.ty == removed.ty && col.index > removed.index {
                col.index -= 1;
            }
        }
        self.counts[type_slot(removed.ty)] -= 1;
        Ok(removed)
    }
}

pub(crate) const fn type_slot(ty: ColumnType) -> usize {
    match ty {
        ColumnType::Int => 0,
        ColumnType::Float => 1,
        ColumnType::Str => 2,
    }
}
