//! Execution context shared by tables.
//!
//! A [`TableContext`] owns the string pool and the execution settings. Cloning
//! a context is cheap and yields a handle to the *same* pool and settings, so
//! every table built from clones of one context interns into one pool and
//! observes the same parallel-mode toggle.
//!
//! The pool is guarded by a `parking_lot::RwLock`. Callers must not intern
//! (write) while holding a guard obtained from [`TableContext::pool`].

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

use crate::config::{ExecutionSection, RingoConfig};
use crate::error::{Error, Result};
use crate::string_pool::{StringId, StringPool};

const POOL_MAGIC: [u8; 4] = *b"RNGP";

/// Settings for the optional data-parallel execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Whether qualifying operations run data-parallel.
    pub parallel: bool,
    /// Chunks handed to each rayon worker.
    pub chunks_per_thread: usize,
    /// Partitions at or below this size are insertion-sorted.
    pub insertion_sort_threshold: usize,
    /// Inputs smaller than this stay serial even in parallel mode.
    pub min_parallel_rows: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::from(&ExecutionSection::default())
    }
}

impl From<&ExecutionSection> for ExecutionConfig {
    fn from(section: &ExecutionSection) -> Self {
        Self {
            parallel: section.parallel,
            chunks_per_thread: section.chunks_per_thread.max(1),
            insertion_sort_threshold: section.insertion_sort_threshold.max(2),
            min_parallel_rows: section.min_parallel_rows,
        }
    }
}

impl ExecutionConfig {
    /// Serial execution with default tuning.
    #[must_use]
    pub fn serial() -> Self {
        Self::default()
    }

    /// Parallel execution with default tuning.
    #[must_use]
    pub fn parallel() -> Self {
        Self {
            parallel: true,
            ..Self::default()
        }
    }

    /// Overrides the minimum input size that triggers parallel execution.
    #[must_use]
    pub fn with_min_parallel_rows(mut self, rows: usize) -> Self {
        self.min_parallel_rows = rows;
        self
    }

    /// Returns true if an input of `len` items should be processed in parallel.
    #[must_use]
    pub fn use_parallel(&self, len: usize) -> bool {
        self.parallel && len > 1 && len >= self.min_parallel_rows
    }

    /// Number of contiguous chunks the input is partitioned into.
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        (rayon::current_num_threads() * self.chunks_per_thread).max(1)
    }

    /// Chunk length for an input of `len` items (never zero).
    #[must_use]
    pub fn chunk_len(&self, len: usize) -> usize {
        len.div_ceil(self.num_chunks()).max(1)
    }
}

/// Shared execution context: string pool plus execution settings.
#[derive(Debug, Clone, Default)]
pub struct TableContext {
    pool: Arc<RwLock<StringPool>>,
    execution: Arc<RwLock<ExecutionConfig>>,
}

impl TableContext {
    /// Creates a context with an empty pool and serial execution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context whose execution settings come from `config`.
    #[must_use]
    pub fn from_config(config: &RingoConfig) -> Self {
        Self::new().with_execution(ExecutionConfig::from(&config.execution))
    }

    /// Sets the execution settings (builder pattern).
    #[must_use]
    pub fn with_execution(self, execution: ExecutionConfig) -> Self {
        self.set_execution(execution);
        self
    }

    /// Returns a snapshot of the current execution settings.
    #[must_use]
    pub fn execution(&self) -> ExecutionConfig {
        *self.execution.read()
    }

    /// Replaces the execution settings for every table sharing this context.
    pub fn set_execution(&self, execution: ExecutionConfig) {
        *self.execution.write() = execution;
    }

    /// Toggles parallel mode, keeping the other settings.
    pub fn set_parallel(&self, parallel: bool) {
        self.execution.write().parallel = parallel;
    }

    /// Read access to the string pool.
    pub fn pool(&self) -> RwLockReadGuard<'_, StringPool> {
        self.pool.read()
    }

    /// Write access to the string pool.
    pub fn pool_mut(&self) -> RwLockWriteGuard<'_, StringPool> {
        self.pool.write()
    }

    /// Interns `s` in the shared pool.
    pub fn intern(&self, s: &str) -> StringId {
        self.pool.write().intern(s)
    }

    /// Resolves `id` to an owned string.
    pub fn resolve(&self, id: StringId) -> Result<String> {
        self.pool.read().resolve(id).map(str::to_string)
    }

    /// Returns true if both contexts share one string pool.
    #[must_use]
    pub fn same_pool(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool)
    }

    /// Saves the string pool in binary form.
    pub fn save_bin<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&POOL_MAGIC)?;
        let pool = self.pool.read();
        bincode::serialize_into(&mut writer, &*pool)?;
        Ok(())
    }

    /// Loads a context (string pool) saved with [`TableContext::save_bin`].
    pub fn load_bin<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != POOL_MAGIC {
            return Err(Error::Serialization(
                "not a Ringo string pool image".to_string(),
            ));
        }
        let pool: StringPool = bincode::deserialize_from(reader)?;
        Ok(Self {
            pool: Arc::new(RwLock::new(pool)),
            execution: Arc::new(RwLock::new(ExecutionConfig::default())),
        })
    }
}
