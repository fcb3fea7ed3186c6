//! Delimited-text and binary persistence.
//!
//! # Text format
//!
//! One record per line, fields separated by a single delimiter character. The
//! optional header line may start with `# `. Strings are stored verbatim, so
//! they must not contain the delimiter or line breaks.
//!
//! # Binary format
//!
//! ```text
//! ┌──────────┬──────────────────────────────────────────────────────────┐
//! │ "RNGT"   │ bincode(schema, columns, chain, ids, groups, graph, gen)  │
//! └──────────┴──────────────────────────────────────────────────────────┘
//! ```
//!
//! String columns hold pool ids, so a table image is only meaningful next to
//! the string pool it was saved with ([`crate::TableContext::save_bin`]).
//! [`Table::save_bin_file`] writes both into one file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use super::{ColumnStore, GraphSettings, RowChain, Table};
use super::group::GroupCache;
use crate::config::RingoConfig;
use crate::context::TableContext;
use crate::error::{Error, Result};
use crate::schema::{normalize_col_name, ColumnType, Schema};

const TABLE_MAGIC: [u8; 4] = *b"RNGT";

/// Options for [`Table::load_ss`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Field separator.
    pub delimiter: char,
    /// Whether the first line is a header.
    pub has_header: bool,
    /// Field positions feeding the schema columns, in schema order.
    pub relevant_cols: Option<Vec<usize>>,
    /// Log and skip malformed lines instead of failing.
    pub skip_bad_lines: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            has_header: true,
            relevant_cols: None,
            skip_bad_lines: false,
        }
    }
}

impl LoadOptions {
    /// Options taken from the `[loader]` section.
    #[must_use]
    pub fn from_config(config: &RingoConfig) -> Self {
        Self {
            delimiter: config.loader.delimiter,
            has_header: config.loader.has_header,
            relevant_cols: None,
            skip_bad_lines: config.loader.skip_bad_lines,
        }
    }

    /// Sets the delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Declares whether a header line is present.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Reads schema columns from the given field positions.
    #[must_use]
    pub fn with_relevant_cols(mut self, cols: Vec<usize>) -> Self {
        self.relevant_cols = Some(cols);
        self
    }
}

/// Per-column parse buffer.
enum Sink {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
}

#[derive(Serialize)]
struct TableImageRef<'a> {
    schema: &'a Schema,
    columns: &'a ColumnStore,
    chain: &'a RowChain,
    row_ids: &'a IndexMap<i64, usize>,
    next_row_id: i64,
    groups: &'a GroupCache,
    graph: &'a GraphSettings,
    generation: u64,
}

#[derive(Deserialize)]
struct TableImage {
    schema: Schema,
    columns: ColumnStore,
    chain: RowChain,
    row_ids: IndexMap<i64, usize>,
    next_row_id: i64,
    groups: GroupCache,
    graph: GraphSettings,
    generation: u64,
}

/// Field position for every schema column (schema order).
fn field_positions(schema: &Schema, header: Option<&[&str]>, opts: &LoadOptions) -> Result<Vec<usize>> {
    if let Some(fields) = header {
        let by_name: Vec<String> = fields.iter().map(|f| normalize_col_name(f.trim())).collect();
        let mapped: Option<Vec<usize>> = schema
            .names()
            .iter()
            .map(|name| by_name.iter().position(|f| f == name))
            .collect();
        if let Some(positions) = mapped {
            return Ok(positions);
        }
    }
    match &opts.relevant_cols {
        Some(cols) if cols.len() != schema.len() => Err(Error::InvalidArgument(format!(
            "{} relevant columns for a schema of {} columns",
            cols.len(),
            schema.len()
        ))),
        Some(cols) => Ok(cols.clone()),
        None => Ok((0..schema.len()).collect()),
    }
}

fn parse_record(
    fields: &[&str],
    positions: &[usize],
    types: &[ColumnType],
    line: usize,
) -> Result<Vec<ParsedCell>> {
    positions
        .iter()
        .zip(types)
        .map(|(&pos, ty)| {
            let raw = fields.get(pos).ok_or_else(|| Error::Parse {
                line,
                message: format!("expected at least {} fields, found {}", pos + 1, fields.len()),
            })?;
            match ty {
                ColumnType::Int => raw.trim().parse().map(ParsedCell::Int).map_err(|e| Error::Parse {
                    line,
                    message: format!("field {pos} '{raw}': {e}"),
                }),
                ColumnType::Float => raw.trim().parse().map(ParsedCell::Float).map_err(|e| Error::Parse {
                    line,
                    message: format!("field {pos} '{raw}': {e}"),
                }),
                ColumnType::Str => Ok(ParsedCell::Str((*raw).to_string())),
            }
        })
        .collect()
}

/// An empty line is a record only when every column reads field 0 as a string.
fn blank_is_record(positions: &[usize], types: &[ColumnType]) -> bool {
    !positions.is_empty()
        && positions
            .iter()
            .zip(types)
            .all(|(&pos, ty)| pos == 0 && *ty == ColumnType::Str)
}

enum ParsedCell {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Table {
    /// Loads a delimited-text file with the given schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Parse`]
    /// (with the 1-based line) for malformed records unless
    /// `skip_bad_lines` is set.
    pub fn load_ss<P: AsRef<Path>>(
        schema: Schema,
        path: P,
        context: &TableContext,
        opts: &LoadOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let table = Self::read_ss(schema, BufReader::new(file), context, opts)?;
        info!(
            path = %path.display(),
            rows = table.num_rows(),
            columns = table.schema.len(),
            "Loaded table"
        );
        Ok(table)
    }

    /// Reads delimited text from any buffered reader.
    ///
    /// # Errors
    ///
    /// See [`Table::load_ss`].
    pub fn read_ss<R: BufRead>(
        schema: Schema,
        reader: R,
        context: &TableContext,
        opts: &LoadOptions,
    ) -> Result<Self> {
        let types: Vec<ColumnType> = schema.iter().map(|(_, c)| c.ty).collect();
        let mut sinks: Vec<Sink> = types
            .iter()
            .map(|ty| match ty {
                ColumnType::Int => Sink::Int(Vec::new()),
                ColumnType::Float => Sink::Float(Vec::new()),
                ColumnType::Str => Sink::Str(Vec::new()),
            })
            .collect();
        let mut positions: Option<Vec<usize>> = None;
        let mut skipped = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            let fields: Vec<&str> = line.split(opts.delimiter).collect();

            if idx == 0 && opts.has_header {
                let header = line.strip_prefix("# ").unwrap_or(line);
                let header = header.strip_prefix('#').unwrap_or(header);
                let header_fields: Vec<&str> = header.split(opts.delimiter).collect();
                positions = Some(field_positions(&schema, Some(&header_fields), opts)?);
                continue;
            }
            if positions.is_none() {
                positions = Some(field_positions(&schema, None, opts)?);
            }
            let Some(cols) = positions.as_deref() else {
                continue;
            };
            if line.is_empty() && !blank_is_record(cols, &types) {
                continue;
            }

            match parse_record(&fields, cols, &types, line_no) {
                Ok(cells) => {
                    for (sink, cell) in sinks.iter_mut().zip(cells) {
                        match (sink, cell) {
                            (Sink::Int(v), ParsedCell::Int(x)) => v.push(x),
                            (Sink::Float(v), ParsedCell::Float(x)) => v.push(x),
                            (Sink::Str(v), ParsedCell::Str(x)) => v.push(x),
                            _ => {}
                        }
                    }
                }
                Err(err) if opts.skip_bad_lines => {
                    warn!(line = line_no, error = %err, "Skipping malformed line");
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        let rows = sinks.first().map_or(0, |s| match s {
            Sink::Int(v) => v.len(),
            Sink::Float(v) => v.len(),
            Sink::Str(v) => v.len(),
        });
        let mut table = Self::with_schema(schema, context);
        {
            let mut pool = context.pool_mut();
            for ((_, col), sink) in table.schema.iter().zip(sinks) {
                match sink {
                    Sink::Int(v) => table.columns.ints[col.index] = v,
                    Sink::Float(v) => table.columns.flts[col.index] = v,
                    Sink::Str(v) => {
                        table.columns.strs[col.index] = v.iter().map(|s| pool.intern(s)).collect();
                    }
                }
            }
        }
        table.chain = RowChain::dense(rows);
        debug!(rows, skipped, "Parsed delimited text");
        Ok(table)
    }

    /// Saves valid rows as delimited text, header first.
    ///
    /// Columns are written grouped by type (integers, floats, strings), each
    /// group in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on write failure.
    pub fn save_ss<P: AsRef<Path>>(&self, path: P, delimiter: char) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_ss(&mut writer, delimiter)?;
        writer.flush()?;
        info!(path = %path.display(), rows = self.num_valid_rows(), "Saved table");
        Ok(())
    }

    /// Writes valid rows as delimited text to any writer.
    ///
    /// # Errors
    ///
    /// See [`Table::save_ss`].
    pub fn write_ss<W: Write>(&self, mut writer: W, delimiter: char) -> Result<()> {
        let order = self.schema.storage_order();
        let sep = delimiter.to_string();
        let header: Vec<&str> = order.iter().map(|(name, _)| name.as_str()).collect();
        writeln!(writer, "# {}", header.join(&sep))?;

        let pool = self.context.pool();
        let mut record = Vec::with_capacity(order.len());
        for row in self.chain.iter() {
            record.clear();
            for (_, col) in &order {
                record.push(match col.ty {
                    ColumnType::Int => self.columns.int(col.index, row).to_string(),
                    ColumnType::Float => self.columns.flt(col.index, row).to_string(),
                    ColumnType::Str => pool.resolve(self.columns.str_id(col.index, row))?.to_string(),
                });
            }
            writeln!(writer, "{}", record.join(&sep))?;
        }
        Ok(())
    }

    // ========================================================================
    // Binary
    // ========================================================================

    /// Writes the table image (deleted slots and cached groupings included).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Serialization`].
    pub fn save_bin<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&TABLE_MAGIC)?;
        let image = TableImageRef {
            schema: &self.schema,
            columns: &self.columns,
            chain: &self.chain,
            row_ids: &self.row_ids,
            next_row_id: self.next_row_id,
            groups: &self.groups,
            graph: &self.graph,
            generation: self.generation,
        };
        bincode::serialize_into(&mut writer, &image)?;
        Ok(())
    }

    /// Reads a table image whose string ids refer to `context`'s pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] for a foreign or inconsistent image
    /// and [`Error::UnknownStringId`] if a string id is missing from the pool.
    pub fn load_bin<R: Read>(mut reader: R, context: &TableContext) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != TABLE_MAGIC {
            return Err(Error::Serialization("not a Ringo table image".to_string()));
        }
        let image: TableImage = bincode::deserialize_from(&mut reader)?;
        let total = image.chain.total();
        let lengths_ok = image.columns.ints.iter().all(|c| c.len() == total)
            && image.columns.flts.iter().all(|c| c.len() == total)
            && image.columns.strs.iter().all(|c| c.len() == total);
        if !lengths_ok {
            return Err(Error::Serialization(format!(
                "column lengths disagree with {total} rows"
            )));
        }
        {
            let pool = context.pool();
            if let Some(id) = image
                .columns
                .strs
                .iter()
                .flatten()
                .find(|id| pool.get(**id).is_none())
            {
                return Err(Error::UnknownStringId(id.as_u32()));
            }
        }
        Ok(Self {
            context: context.clone(),
            schema: image.schema,
            columns: image.columns,
            chain: image.chain,
            row_ids: image.row_ids,
            next_row_id: image.next_row_id,
            groups: image.groups,
            graph: image.graph,
            sequence: None,
            generation: image.generation,
        })
    }

    /// Saves the string pool followed by the table image.
    ///
    /// # Errors
    ///
    /// See [`Table::save_bin`].
    pub fn save_bin_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.context.save_bin(&mut writer)?;
        self.save_bin(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), rows = self.num_rows(), "Saved table image");
        Ok(())
    }

    /// Loads a file written by [`Table::save_bin_file`] into a fresh context.
    ///
    /// # Errors
    ///
    /// See [`Table::load_bin`].
    pub fn load_bin_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let context = TableContext::load_bin(&mut reader)?;
        let table = Self::load_bin(&mut reader, &context)?;
        info!(path = %path.display(), rows = table.num_rows(), "Loaded table image");
        Ok(table)
    }
}
