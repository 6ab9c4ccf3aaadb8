// src/sink.rs
//
// Where deltas go once the poller has accepted them.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use crate::config::ExportFormat;
use crate::config::consts::{CONSOLIDATED_SUFFIX, STAMP_FORMAT};
use crate::csv::write_row;
use crate::data::{Row, Schema};
use crate::error::SinkError;
use crate::file::{append_rows, ensure_directory, read_first_line, truncate_to, unique_path, write_rows_start};

/// Durable storage for one cycle's delta. A failure is reported back to the
/// poller, which keeps the batch and offers it again later.
pub trait Sink {
    fn persist(&mut self, rows: &[Row], schema: &Schema) -> Result<(), SinkError>;
}

/// Tabular file output.
///
/// Every delta lands in its own `<prefix>_<YYYYmmdd_HHMMSS>.<ext>` and is also
/// appended to `<prefix>_consolidated.<ext>`. Both start with the schema row.
/// A consolidated file whose header row is not the current schema is moved
/// aside to `<prefix>_consolidated (N).<ext>` and a fresh one is started.
///
/// When a batch fails half way, offering the same rows again finishes it:
/// the delta keeps its file name and a partial consolidated append is cut
/// off before the rows are written again.
#[derive(Clone, Debug)]
pub struct CsvSink {
    dir: PathBuf,
    prefix: String,
    format: ExportFormat,
    unfinished: Option<Delivery>,
}

/// Progress of one batch through the two files.
#[derive(Clone, Debug)]
struct Delivery {
    rows: Vec<Row>,
    delta: Option<PathBuf>,
    delta_written: bool,
    /// Consolidated file length before this batch's rows.
    consolidated_base: Option<u64>,
}

impl Delivery {
    fn new(rows: &[Row]) -> Self {
        Self { rows: rows.to_vec(), delta: None, delta_written: false, consolidated_base: None }
    }
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, format: ExportFormat) -> Result<Self, SinkError> {
        let dir = dir.into();
        ensure_directory(&dir).map_err(|source| SinkError::Io { path: dir.clone(), source })?;
        Ok(Self { dir, prefix: prefix.into(), format, unfinished: None })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn consolidated_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}_{CONSOLIDATED_SUFFIX}.{}", self.prefix, self.format.ext()))
    }

    fn delta_path(&self) -> PathBuf {
        let stem = format!("{}_{}", self.prefix, Local::now().format(STAMP_FORMAT));
        unique_path(&self.dir, &stem, self.format.ext())
    }

    fn deliver(&self, d: &mut Delivery, schema: &Schema) -> Result<PathBuf, SinkError> {
        let sep = self.format.delim();

        let delta = d.delta.get_or_insert_with(|| self.delta_path()).clone();
        if !d.delta_written {
            write_rows_start(&delta, Some(schema.fields()), sep)
                .and_then(|_| append_rows(&delta, &d.rows, sep))
                .map_err(|source| SinkError::Io { path: delta.clone(), source })?;
            d.delta_written = true;
        }

        let path = self.consolidated_path();
        let io_err = |source| SinkError::Io { path: path.clone(), source };
        let len = if path.exists() { fs::metadata(&path).map_err(io_err)?.len() } else { 0 };
        match d.consolidated_base {
            Some(base) if base <= len => truncate_to(&path, base).map_err(io_err)?,
            _ => {
                self.prepare_consolidated(&path, schema)?;
                d.consolidated_base = Some(fs::metadata(&path).map_err(io_err)?.len());
            }
        }
        append_rows(&path, &d.rows, sep).map_err(io_err)?;
        Ok(delta)
    }

    /// Leave `path` holding exactly the schema header, or rows under it.
    fn prepare_consolidated(&self, path: &Path, schema: &Schema) -> Result<(), SinkError> {
        let sep = self.format.delim();
        let io_err = |source| SinkError::Io { path: path.to_path_buf(), source };

        if path.exists() {
            let mut header = Vec::new();
            write_row(&mut header, schema.fields(), sep).map_err(io_err)?;
            let found = read_first_line(path).map_err(io_err)?;
            if found.as_bytes() == header.as_slice() {
                return Ok(());
            }
            if !found.is_empty() {
                let stem = format!("{}_{CONSOLIDATED_SUFFIX}", self.prefix);
                let aside = unique_path(&self.dir, &stem, self.format.ext());
                fs::rename(path, &aside).map_err(io_err)?;
                warn!(
                    moved_to = %aside.display(),
                    found = found.trim_end(),
                    "consolidated file has another header; starting a new one"
                );
            }
        }
        write_rows_start(path, Some(schema.fields()), sep).map_err(io_err)
    }
}

impl Sink for CsvSink {
    fn persist(&mut self, rows: &[Row], schema: &Schema) -> Result<(), SinkError> {
        let mut delivery = match self.unfinished.take() {
            Some(d) if d.rows == rows => d,
            _ => Delivery::new(rows),
        };
        match self.deliver(&mut delivery, schema) {
            Ok(delta) => {
                debug!(path = %delta.display(), rows = rows.len(), "delta written");
                Ok(())
            }
            Err(e) => {
                self.unfinished = Some(delivery);
                Err(e)
            }
        }
    }
}
