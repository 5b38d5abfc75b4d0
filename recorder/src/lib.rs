use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tec_core::RunConfig;

pub mod export;

pub use export::{export_record, ExportOutcome};

pub const FIXED_COLUMNS: [&str; 5] = [
    "Datetime",
    "Cycle No.",
    "Operator",
    "Current I (A)",
    "Voltage (V)",
];
pub const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("cannot open record file '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to write record row: {0}")]
    Csv(#[from] csv::Error),
    #[error("record file io error: {0}")]
    Io(#[from] io::Error),
    #[error("row carries {found} channel values but the header declares {expected}")]
    SchemaMismatch { expected: usize, found: usize },
    #[error("record file '{0}' does not exist")]
    MissingRecord(PathBuf),
    #[error("cannot export '{from}' to '{to}': {reason}")]
    Export {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
}

/// Header of a record file: the fixed columns followed by one column per
/// active channel, named after its display name, in selection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    columns: Vec<String>,
}

impl RecordSchema {
    pub fn for_config(config: &RunConfig) -> Self {
        Self {
            columns: FIXED_COLUMNS
                .iter()
                .map(|name| name.to_string())
                .chain(config.display_names())
                .collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn channel_count(&self) -> usize {
        self.columns.len() - FIXED_COLUMNS.len()
    }

    pub fn into_columns(self) -> Vec<String> {
        self.columns
    }
}

pub fn record_file_name(wall: DateTime<Local>) -> String {
    format!("TEC cycling test {}.csv", wall.format("%d-%m-%Y %H.%M.%S"))
}

pub fn record_file_path(dir: &Path, wall: DateTime<Local>) -> PathBuf {
    dir.join(record_file_name(wall))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub timestamp: DateTime<Local>,
    pub cycle: u32,
    pub operator: String,
    pub current: f64,
    pub voltage: f64,
    pub temperatures: Vec<f64>,
}

impl SampleRow {
    pub fn to_record(&self) -> Vec<String> {
        let mut values = Vec::with_capacity(FIXED_COLUMNS.len() + self.temperatures.len());
        values.push(self.timestamp.format(DATETIME_FORMAT).to_string());
        values.push(self.cycle.to_string());
        values.push(self.operator.clone());
        values.push(self.current.to_string());
        values.push(self.voltage.to_string());
        values.extend(self.temperatures.iter().map(|value| value.to_string()));
        values
    }
}

/// Durable byte sink behind a record file.
pub trait RecordSink: Send {
    /// Writes all of `bytes` and makes them durable before returning.
    fn append_durable(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl RecordSink for File {
    fn append_durable(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.sync_data()
    }
}

/// Append-only CSV record for one run.
///
/// Rows are encoded in memory and handed to the sink in one piece, so a row
/// that fails to land is reported once and never written again later.
pub struct SampleRecorder {
    path: PathBuf,
    columns: Vec<String>,
    sink: Box<dyn RecordSink>,
    rows_written: u64,
}

impl std::fmt::Debug for SampleRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRecorder")
            .field("path", &self.path)
            .field("columns", &self.columns)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl SampleRecorder {
    /// Creates a new record file at `path` and writes its header. An existing
    /// file is never opened or truncated.
    pub fn open(path: &Path, columns: Vec<String>) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Open {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        let file = create_new(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_sink(path, columns, Box::new(file))
    }

    /// Creates the record for a run started at `wall` inside `dir`. When the
    /// name for that second is taken, ` (2)`, ` (3)`, ... are tried in turn.
    pub fn create(
        dir: &Path,
        wall: DateTime<Local>,
        columns: Vec<String>,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|source| StorageError::Open {
            path: dir.to_path_buf(),
            source,
        })?;
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let path = dir.join(numbered_record_file_name(wall, attempt));
            match create_new(&path) {
                Ok(file) => return Self::with_sink(&path, columns, Box::new(file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    log::debug!("{} exists, trying the next name", path.display());
                }
                Err(source) => return Err(StorageError::Open { path, source }),
            }
        }
        Err(StorageError::Open {
            path: record_file_path(dir, wall),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "every record file name for this second is taken",
            ),
        })
    }

    /// Writes the header to `sink` and returns a recorder appending to it.
    /// `path` names the record in logs and snapshots.
    pub fn with_sink(
        path: &Path,
        columns: Vec<String>,
        mut sink: Box<dyn RecordSink>,
    ) -> Result<Self, StorageError> {
        sink.append_durable(&encode_record(&columns)?)?;
        log::info!("recording to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            columns,
            sink,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn channel_count(&self) -> usize {
        self.columns.len().saturating_sub(FIXED_COLUMNS.len())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Writes one row and syncs it to disk before returning. Never retried.
    pub fn append(&mut self, row: &SampleRow) -> Result<(), StorageError> {
        if row.temperatures.len() != self.channel_count() {
            return Err(StorageError::SchemaMismatch {
                expected: self.channel_count(),
                found: row.temperatures.len(),
            });
        }
        let bytes = encode_record(&row.to_record())?;
        self.sink.append_durable(&bytes)?;
        self.rows_written += 1;
        Ok(())
    }
}

const MAX_NAME_ATTEMPTS: u32 = 100;

fn numbered_record_file_name(wall: DateTime<Local>, attempt: u32) -> String {
    if attempt <= 1 {
        record_file_name(wall)
    } else {
        format!(
            "TEC cycling test {} ({attempt}).csv",
            wall.format("%d-%m-%Y %H.%M.%S")
        )
    }
}

fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().append(true).create_new(true).open(path)
}

fn encode_record(values: &[String]) -> Result<Vec<u8>, StorageError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(values)?;
    writer
        .into_inner()
        .map_err(|err| StorageError::Io(err.into_error()))
}
