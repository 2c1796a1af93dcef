//! Append-only record log, one per entity class.
//!
//! Every mutation of a class is appended here before it is applied to the
//! in-memory table, so replaying the log on open restores the class.
//!
//! # File Format
//! ```text
//! [MAGIC: 4 bytes][VERSION: 1 byte]
//! [ENTRY 1: codec frame of LogEntry]
//! [ENTRY 2: codec frame of LogEntry]
//! ...
//! ```
//!
//! A torn final frame (crash mid-append) is cut off on open; anything
//! else that fails to decode is reported as corruption.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Result as IoResult, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::eid::Eid;
use crate::storage::memory::ClassTable;
use crate::storage::traits::Record;

use super::codec;

/// A single entry in a class log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position of this entry in the log, starting at 1.
    pub position: u64,
    /// When this entry was written.
    pub timestamp: DateTime<Utc>,
    /// The mutation being logged.
    pub kind: LogEntryKind,
}

/// The mutation carried by a log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LogEntryKind {
    Put { record: Record },
    Remove { eid: Eid },
    Clear,
    Sequence { value: u64 },
    /// Full state of the class; replaces everything before it.
    Snapshot { records: Vec<Record>, sequence: u64 },
}

impl LogEntryKind {
    /// Applies this mutation to a table.
    pub fn apply(self, table: &mut ClassTable) {
        match self {
            Self::Put { record } => table.upsert(record),
            Self::Remove { eid } => {
                table.remove(&eid);
            }
            Self::Clear => table.clear(),
            Self::Sequence { value } => table.observe_sequence(value),
            Self::Snapshot { records, sequence } => {
                *table = ClassTable::from_records(records, sequence);
            }
        }
    }
}

/// Result of reading a log back on open.
#[derive(Debug, Default)]
pub struct Replay {
    /// State rebuilt from all complete entries.
    pub table: ClassTable,
    /// Number of entries applied.
    pub entries: u64,
    /// Bytes of a torn trailing frame that were cut off.
    pub truncated_bytes: u64,
}

/// Append-only log file for one class.
///
/// Thread-safe via internal mutex.
#[derive(Debug)]
pub struct ClassLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    sync_on_write: bool,
}

#[derive(Debug)]
struct LogWriter {
    file: BufWriter<File>,
    position: u64,
}

impl ClassLog {
    /// Opens (or creates) the log at `path` and replays it.
    ///
    /// A torn trailing frame is truncated away so later appends start on a
    /// frame boundary.
    ///
    /// # Errors
    /// I/O failures, a bad header, or a corrupted entry before the tail.
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<(Self, Replay)> {
        let fresh = fs::metadata(path).map_or(true, |m| m.len() == 0);
        if fresh {
            write_empty(path, sync_on_write)?;
        }

        let replay = replay(path)?;
        if replay.truncated_bytes > 0 {
            let file = OpenOptions::new().write(true).open(path)?;
            let len = file.metadata()?.len();
            file.set_len(len - replay.truncated_bytes)?;
            if sync_on_write {
                file.sync_all()?;
            }
        }

        let file = OpenOptions::new().append(true).open(path)?;
        let log = Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                file: BufWriter::new(file),
                position: replay.entries,
            }),
            sync_on_write,
        };
        Ok((log, replay))
    }

    /// Appends an entry, returning its position.
    pub fn append(&self, kind: LogEntryKind) -> IoResult<u64> {
        let mut writer = self.lock()?;
        let entry = LogEntry {
            position: writer.position + 1,
            timestamp: Utc::now(),
            kind,
        };
        let frame = codec::encode(&entry)?;

        writer.file.write_all(&frame)?;
        writer.file.flush()?;
        if self.sync_on_write {
            writer.file.get_ref().sync_all()?;
        }

        writer.position = entry.position;
        Ok(entry.position)
    }

    /// Replaces the whole log with a single entry.
    ///
    /// The new log is written to a temporary file and renamed over the old
    /// one, so a crash leaves either the old or the new log intact.
    pub fn rewrite(&self, kind: LogEntryKind) -> IoResult<()> {
        let mut writer = self.lock()?;
        writer.file.flush()?;

        let temp_path = self.path.with_extension("log.tmp");
        {
            let mut temp = BufWriter::new(
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&temp_path)?,
            );
            codec::write_header(&mut temp)?;
            let entry = LogEntry {
                position: 1,
                timestamp: Utc::now(),
                kind,
            };
            temp.write_all(&codec::encode(&entry)?)?;
            temp.flush()?;
            temp.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        writer.file = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        writer.position = 1;
        Ok(())
    }

    /// Truncates the log back to an empty header.
    pub fn reset(&self) -> IoResult<()> {
        let mut writer = self.lock()?;
        writer.file.flush()?;
        write_empty(&self.path, self.sync_on_write)?;
        writer.file = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        writer.position = 0;
        Ok(())
    }

    /// Number of entries currently in the log.
    pub fn position(&self) -> IoResult<u64> {
        Ok(self.lock()?.position)
    }

    /// Log file size in bytes.
    pub fn size_bytes(&self) -> IoResult<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> IoResult<std::sync::MutexGuard<'_, LogWriter>> {
        self.writer
            .lock()
            .map_err(|_| std::io::Error::new(ErrorKind::Other, "poisoned lock: class log"))
    }
}

fn write_empty(path: &Path, sync: bool) -> IoResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    codec::write_header(&mut file)?;
    if sync {
        file.sync_all()?;
    }
    Ok(())
}

fn replay(path: &Path) -> IoResult<Replay> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    codec::read_header(&mut reader)?;

    let mut out = Replay::default();
    loop {
        let start = reader.stream_position()?;
        if start >= file_size {
            break;
        }
        match codec::decode::<LogEntry>(&mut reader) {
            Ok(entry) => {
                entry.kind.apply(&mut out.table);
                out.entries += 1;
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                out.truncated_bytes = file_size - start;
                break;
            }
            Err(e) => {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("corrupted log entry {} at byte {start}: {e}", out.entries + 1),
                ));
            }
        }
    }
    Ok(out)
}
