//! Durable result log.
//!
//! An append-only CSV file, one row per probe, header first. The log is the
//! single source of truth for what has been measured so far: the run-number
//! estimator derives the rotation state from it on every iteration, so it is
//! never rewritten or compacted, only appended to.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::record::{ResultRecord, HEADER};

/// Append-only CSV store for probe results.
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the records in order, creating the file and writing the header
    /// row first if the file is absent or empty.
    ///
    /// Fields containing the delimiter, the quote character, or line breaks
    /// are quoted with the quote character doubled.
    pub fn append(&self, records: &[ResultRecord]) -> Result<()> {
        let needs_header = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("inspecting result log {}", self.path.display()))
            }
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening result log {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(HEADER).context("writing log header")?;
        }

        for record in records {
            writer
                .write_record(record.fields())
                .context("writing result row")?;
        }

        writer.flush().context("flushing result log")?;

        Ok(())
    }

    /// Every parsable row of the log, header included as the first entry.
    ///
    /// An absent file yields an empty list. Rows that cannot be parsed
    /// (including a trailing row left half-written by a crashed run) are
    /// skipped, never an error: the reader must stay usable on a log it does
    /// not fully trust.
    pub fn read_all(&self) -> Result<Vec<csv::StringRecord>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("opening result log {}", self.path.display()))
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let mut rows = Vec::new();
        for result in reader.records() {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => debug!(error = %e, "skipping unreadable log row"),
            }
        }

        Ok(rows)
    }
}
