//! Forward row iteration along the row chain.

use super::ChainIter;
use super::Table;
use crate::error::{Error, Result};
use crate::schema::Primitive;
use crate::string_pool::StringId;

/// Borrowed view of one valid row.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    row: usize,
}

impl<'a> RowRef<'a> {
    /// Physical row index.
    #[must_use]
    pub fn index(&self) -> usize {
        self.row
    }

    /// Owning table.
    #[must_use]
    pub fn table(&self) -> &'a Table {
        self.table
    }

    /// Integer value of `col` in this row.
    pub fn get_int(&self, col: &str) -> Result<i64> {
        self.table.get_int(col, self.row)
    }

    /// Float value of `col` in this row.
    pub fn get_float(&self, col: &str) -> Result<f64> {
        self.table.get_float(col, self.row)
    }

    /// String value of `col` in this row.
    pub fn get_str(&self, col: &str) -> Result<String> {
        self.table.get_str(col, self.row)
    }

    /// Pool id of the string in `col`.
    pub fn get_str_id(&self, col: &str) -> Result<StringId> {
        self.table.get_str_id(col, self.row)
    }

    /// Value of `col` in this row.
    pub fn get_value(&self, col: &str) -> Result<Primitive> {
        self.table.get_value(col, self.row)
    }
}

/// Iterator over the valid rows of a table in logical order.
#[derive(Debug, Clone)]
pub struct RowIter<'a> {
    table: &'a Table,
    inner: ChainIter<'a>,
}

impl<'a> Iterator for RowIter<'a> {
    type Item = RowRef<'a>;

    fn next(&mut self) -> Option<RowRef<'a>> {
        self.inner.next().map(|row| RowRef {
            table: self.table,
            row,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for RowIter<'_> {}

/// Mutable cursor that may delete the row immediately ahead of it.
///
/// The cursor starts before the first valid row. Removing the row ahead
/// relinks the chain so the following valid row becomes the new row ahead;
/// no valid row is skipped or visited twice.
#[derive(Debug)]
pub struct RowCursor<'a> {
    table: &'a mut Table,
    current: Option<usize>,
}

impl<'a> RowCursor<'a> {
    /// Row currently under the cursor (`None` before the first step).
    #[must_use]
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Row ahead of the cursor.
    #[must_use]
    pub fn peek_next(&self) -> Option<usize> {
        match self.current {
            None => self.table.chain.first(),
            Some(row) => self.table.chain.next_of(row),
        }
    }

    /// Moves onto the row ahead and returns it.
    pub fn advance(&mut self) -> Option<usize> {
        let next = self.peek_next()?;
        self.current = Some(next);
        Some(next)
    }

    /// Deletes the row ahead of the cursor without moving.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the cursor is at the end.
    pub fn remove_next(&mut self) -> Result<usize> {
        let next = self
            .peek_next()
            .ok_or_else(|| Error::InvalidState("no row ahead of cursor".to_string()))?;
        self.table.remove_row(next)?;
        Ok(next)
    }

    /// Read access to the table.
    #[must_use]
    pub fn table(&self) -> &Table {
        self.table
    }
}

impl Table {
    /// Iterates the valid rows in logical order.
    #[must_use]
    pub fn iter(&self) -> RowIter<'_> {
        RowIter {
            table: self,
            inner: self.chain.iter(),
        }
    }

    /// Valid physical row indices in logical order.
    #[must_use]
    pub fn rows(&self) -> ChainIter<'_> {
        self.chain.iter()
    }

    /// Cursor positioned before the first valid row.
    pub fn cursor(&mut self) -> RowCursor<'_> {
        RowCursor {
            table: self,
            current: None,
        }
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = RowRef<'a>;
    type IntoIter = RowIter<'a>;

    fn into_iter(self) -> RowIter<'a> {
        self.iter()
    }
}
