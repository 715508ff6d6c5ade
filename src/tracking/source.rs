//! Row-oriented positional data sources
//!
//! The tracker reads rows of `frame_number, pos_x, pos_y, pos_z` with
//! positions in metres, one row per marker per frame. Two sources are
//! provided: a comma-separated file with a header line, and an in-memory
//! table that can be shared with a writer.

use crate::{MocapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Columns every source must provide.
pub const REQUIRED_COLUMNS: [&str; 4] = ["frame_number", "pos_x", "pos_y", "pos_z"];

/// One persisted marker position, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct PersistedRow {
    pub frame_number: i64,
    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,
}

impl PersistedRow {
    pub fn new(frame_number: i64, pos_x: f64, pos_y: f64, pos_z: f64) -> Self {
        Self { frame_number, pos_x, pos_y, pos_z }
    }
}

/// Anything the tracker can read rows from.
pub trait FrameSource: fmt::Debug + Send + Sync {
    /// Every row currently in the source, in storage order.
    fn read_rows(&self) -> Result<Vec<PersistedRow>>;
}

/// Comma-separated file with a header naming at least [`REQUIRED_COLUMNS`].
///
/// Extra columns are allowed and ignored; column order is free.
#[derive(Debug, Clone)]
pub struct CsvFrameSource {
    path: PathBuf,
}

impl CsvFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for CsvFrameSource {
    fn read_rows(&self) -> Result<Vec<PersistedRow>> {
        if !self.path.exists() {
            return Err(MocapError::configuration(format!(
                "Data source not found at {}",
                self.path.display()
            )));
        }

        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| MocapError::file_error(self.path.clone(), e))?;
        let rows = parse_csv(&text, &self.path.display().to_string())?;
        debug!("Read {} rows from {}", rows.len(), self.path.display());
        Ok(rows)
    }
}

/// Parse CSV text; `origin` names the source in error messages.
fn parse_csv(text: &str, origin: &str) -> Result<Vec<PersistedRow>> {
    let mut lines = text.lines().enumerate();
    let header: Vec<&str> = match lines.next() {
        Some((_, line)) => line.split(',').map(str::trim).collect(),
        None => Vec::new(),
    };

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !header.contains(column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(MocapError::Schema { missing });
    }

    let index_of = |name: &str| header.iter().position(|h| *h == name).unwrap_or(0);
    let columns = REQUIRED_COLUMNS.map(index_of);

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let field = |i: usize| {
            fields.get(columns[i]).copied().ok_or_else(|| {
                MocapError::parse(
                    format!("{} line {}", origin, line_no + 1),
                    format!("missing value for {}", REQUIRED_COLUMNS[i]),
                )
            })
        };
        let number = |i: usize| -> Result<f64> {
            let raw = field(i)?;
            raw.parse::<f64>().map_err(|e| {
                MocapError::parse(
                    format!("{} line {}", origin, line_no + 1),
                    format!("{} = '{}': {}", REQUIRED_COLUMNS[i], raw, e),
                )
            })
        };

        let raw_frame = field(0)?;
        let frame_number = raw_frame.parse::<i64>().map_err(|e| {
            MocapError::parse(
                format!("{} line {}", origin, line_no + 1),
                format!("frame_number = '{}': {}", raw_frame, e),
            )
        })?;

        rows.push(PersistedRow::new(frame_number, number(1)?, number(2)?, number(3)?));
    }

    Ok(rows)
}

/// Shared in-memory row table.
///
/// Clones share storage, so one handle can append while the tracker reads
/// through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameSource {
    rows: Arc<RwLock<Vec<PersistedRow>>>,
}

impl MemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = PersistedRow>) -> Self {
        Self { rows: Arc::new(RwLock::new(rows.into_iter().collect())) }
    }

    pub fn push(&self, row: PersistedRow) {
        self.rows.write().unwrap_or_else(|e| e.into_inner()).push(row);
    }

    pub fn extend(&self, rows: impl IntoIterator<Item = PersistedRow>) {
        self.rows.write().unwrap_or_else(|e| e.into_inner()).extend(rows);
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSource for MemoryFrameSource {
    fn read_rows(&self) -> Result<Vec<PersistedRow>> {
        Ok(self.rows.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}
