/// Append-only record of real moves.
///
/// The ledger is a JSON-lines file in the output root. The first line is a
/// versioned header; every following line is one [`MoveRecord`]. Records are
/// appended and synced one at a time as moves succeed, so a crash mid-run
/// leaves every completed move restorable.
use crate::mover::MoveRecord;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// File name of the ledger inside the output root.
pub const LEDGER_FILE_NAME: &str = ".snapsort_ledger.jsonl";

/// Current on-disk format version.
pub const LEDGER_VERSION: u32 = 1;

/// First line of every ledger file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub output_root: PathBuf,
}

/// Errors that can occur while reading or writing the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to write ledger {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },
    #[error("Failed to read ledger {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },
    #[error("Invalid ledger format at line {line}: {reason}")]
    InvalidFormat { line: usize, reason: String },
    #[error("Unsupported ledger version {0}")]
    UnsupportedVersion(u32),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// A loaded ledger: header plus records in the order they were written.
#[derive(Debug, Clone)]
pub struct LedgerContents {
    pub header: LedgerHeader,
    pub records: Vec<MoveRecord>,
}

/// Shared, serialized writer for one output root's ledger.
#[derive(Debug)]
pub struct MoveLedger {
    path: PathBuf,
    output_root: PathBuf,
    writer: Mutex<Option<File>>,
}

impl MoveLedger {
    /// Returns the ledger path for an output root.
    pub fn path_for(output_root: &Path) -> PathBuf {
        output_root.join(LEDGER_FILE_NAME)
    }

    /// Creates a ledger handle. The file is only created on the first append.
    pub fn new(output_root: &Path) -> Self {
        Self {
            path: Self::path_for(output_root),
            output_root: output_root.to_path_buf(),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and syncs it to disk.
    ///
    /// Safe to call from several workers; appends are serialized.
    pub fn append(&self, record: &MoveRecord) -> LedgerResult<()> {
        let write_err = |e| LedgerError::WriteFailed {
            path: self.path.clone(),
            source: e,
        };

        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.open_for_append().map_err(write_err)?);
        }
        let Some(file) = guard.as_mut() else {
            return Ok(());
        };

        let line = serde_json::to_string(record)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        writeln!(file, "{}", line).map_err(write_err)?;
        file.sync_data().map_err(write_err)
    }

    fn open_for_append(&self) -> io::Result<File> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if file.metadata()?.len() == 0 {
            let header = LedgerHeader {
                version: LEDGER_VERSION,
                created_at: Utc::now(),
                output_root: self.output_root.clone(),
            };
            let line = serde_json::to_string(&header)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{}", line)?;
        }
        Ok(file)
    }

    /// Loads the ledger of `output_root`, or `None` if there is none.
    ///
    /// A malformed last line is treated as a torn write and skipped.
    pub fn load(output_root: &Path) -> LedgerResult<Option<LedgerContents>> {
        let path = Self::path_for(output_root);
        if !path.exists() {
            return Ok(None);
        }
        let read_err = |e| LedgerError::ReadFailed {
            path: path.clone(),
            source: e,
        };

        let file = File::open(&path).map_err(read_err)?;
        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()
            .map_err(read_err)?;
        let mut numbered = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| (i + 1, l));

        let (first_line, header_text) =
            numbered.next().ok_or_else(|| LedgerError::InvalidFormat {
                line: 1,
                reason: "missing header".to_string(),
            })?;
        let header: LedgerHeader =
            serde_json::from_str(header_text).map_err(|e| LedgerError::InvalidFormat {
                line: first_line,
                reason: e.to_string(),
            })?;
        if header.version != LEDGER_VERSION {
            return Err(LedgerError::UnsupportedVersion(header.version));
        }

        let body: Vec<(usize, &String)> = numbered.collect();
        let mut records = Vec::with_capacity(body.len());
        for (idx, (line, text)) in body.iter().enumerate() {
            match serde_json::from_str::<MoveRecord>(text) {
                Ok(record) => records.push(record),
                Err(e) if idx + 1 == body.len() => {
                    warn!("Ignoring truncated last ledger line {}: {}", line, e);
                }
                Err(e) => {
                    return Err(LedgerError::InvalidFormat {
                        line: *line,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(Some(LedgerContents { header, records }))
    }

    /// Deletes the ledger of `output_root` if it exists.
    pub fn delete(output_root: &Path) -> LedgerResult<()> {
        let path = Self::path_for(output_root);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| LedgerError::WriteFailed { path, source: e })?;
        }
        Ok(())
    }
}
