//! Logical row order and soft-delete linkage over physical row slots.
//!
//! # Architecture
//!
//! ```text
//! physical:  0      1        2      3
//! next:      Next(2) Deleted Next(3) Last
//! prev:      None    None    Some(0) Some(2)
//! first = 0, last = 3, valid = 3, total = 4
//! ```
//!
//! Appending and removing are O(1). Physical indices stay meaningful until the
//! owning table defrags.

use serde::{Deserialize, Serialize};

/// Chain entry of one physical slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowLink {
    /// Valid row followed by the given physical slot.
    Next(usize),
    /// Last valid row.
    Last,
    /// Soft-deleted slot.
    Deleted,
}

/// Row chain: one link per physical slot plus first/last/valid bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowChain {
    next: Vec<RowLink>,
    prev: Vec<Option<usize>>,
    first: Option<usize>,
    last: Option<usize>,
    valid: usize,
}

impl RowChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain of `len` valid rows in physical order.
    #[must_use]
    pub fn dense(len: usize) -> Self {
        let mut chain = Self::new();
        chain.next.reserve(len);
        chain.prev.reserve(len);
        for _ in 0..len {
            chain.append();
        }
        chain
    }

    /// Total physical slots, valid and deleted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.next.len()
    }

    /// Number of valid rows.
    #[must_use]
    pub fn valid(&self) -> usize {
        self.valid
    }

    /// First valid row in logical order.
    #[must_use]
    pub fn first(&self) -> Option<usize> {
        self.first
    }

    /// Last valid row in logical order.
    #[must_use]
    pub fn last(&self) -> Option<usize> {
        self.last
    }

    /// Link stored for `row`.
    #[must_use]
    pub fn link(&self, row: usize) -> Option<RowLink> {
        self.next.get(row).copied()
    }

    /// Returns true if `row` exists and is not deleted.
    #[must_use]
    pub fn is_valid(&self, row: usize) -> bool {
        matches!(self.next.get(row), Some(RowLink::Next(_) | RowLink::Last))
    }

    /// Successor of a valid `row`.
    #[must_use]
    pub fn next_of(&self, row: usize) -> Option<usize> {
        match self.next.get(row) {
            Some(RowLink::Next(n)) => Some(*n),
            _ => None,
        }
    }

    /// Predecessor of a valid `row`.
    #[must_use]
    pub fn prev_of(&self, row: usize) -> Option<usize> {
        self.prev.get(row).copied().flatten()
    }

    /// Allocates the next physical slot as the new last valid row.
    pub fn append(&mut self) -> usize {
        let row = self.next.len();
        self.next.push(RowLink::Last);
        self.prev.push(self.last);
        match self.last {
            Some(last) => self.next[last] = RowLink::Next(row),
            None => self.first = Some(row),
        }
        self.last = Some(row);
        self.valid += 1;
        row
    }

    /// Marks `row` deleted and relinks its neighbours. Returns false if the
    /// row was already deleted or out of range.
    pub fn remove(&mut self, row: usize) -> bool {
        if !self.is_valid(row) {
            return false;
        }
        let prev = self.prev[row];
        let next = self.next_of(row);
        match prev {
            Some(p) => self.next[p] = next.map_or(RowLink::Last, RowLink::Next),
            None => self.first = next,
        }
        match next {
            Some(n) => self.prev[n] = prev,
            None => self.last = prev,
        }
        self.next[row] = RowLink::Deleted;
        self.prev[row] = None;
        self.valid -= 1;
        true
    }

    /// Relinks the valid rows in the given logical order.
    ///
    /// `order` must be a permutation of the currently valid rows.
    pub fn relink(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.valid);
        for (pos, &row) in order.iter().enumerate() {
            self.prev[row] = pos.checked_sub(1).map(|p| order[p]);
            self.next[row] = order.get(pos + 1).map_or(RowLink::Last, |&n| RowLink::Next(n));
        }
        self.first = order.first().copied();
        self.last = order.last().copied();
    }

    /// Iterates valid physical rows in logical order.
    #[must_use]
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            cursor: self.first,
            remaining: self.valid,
        }
    }

    /// Valid rows in logical order.
    #[must_use]
    pub fn logical_rows(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

/// Iterator over a [`RowChain`].
#[derive(Debug, Clone)]
pub struct ChainIter<'a> {
    chain: &'a RowChain,
    cursor: Option<usize>,
    remaining: usize,
}

impl Iterator for ChainIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let row = self.cursor?;
        self.cursor = self.chain.next_of(row);
        self.remaining = self.remaining.saturating_sub(1);
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ChainIter<'_> {}
