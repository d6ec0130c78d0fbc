//! Reader-side index and access to the records of one log file.
//!
//! This module provides the read path: an [`EntryIndex`] of record offsets
//! built by scanning the data region, and a [`LogReader`] that keeps the
//! scanned bytes, the latest header and the index together.

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace, warn};

use crate::error::{Result, VxlError};
use crate::header::LogHeader;
use crate::layout::{RecordHeader, HEADER_SIZE, MAX_RECORD_SIZE, RECORD_FIXED_SIZE};
use crate::severity::{Severity, SEVERITY_COUNT};
use crate::writer::SEPARATOR;

/// Random-access offsets of the records in a log's data region.
///
/// Built by a sequential scan that can be resumed: each call to
/// [`build`](Self::build) starts where the previous good record ended, so
/// re-running it after the file grows only visits the new records.
///
/// Ordinals are positions in this index, which is append order.
#[derive(Debug, Clone, Default)]
pub struct EntryIndex {
    /// Offsets relative to the start of the data region.
    offsets: Vec<u64>,
    /// End of the last good record.
    end: usize,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every complete record in `data` past the last known one.
    ///
    /// `data` is the data region from its first byte; it may have grown
    /// since the previous call but must not have changed before `end`.
    ///
    /// Returns the number of records added.
    ///
    /// # Errors
    ///
    /// `Corrupt` when a record is truncated, exceeds the size bound, has an
    /// unknown severity or unterminated text. Records before it stay
    /// indexed and the next call rescans from the same place.
    pub fn build(&mut self, data: &[u8]) -> Result<usize> {
        let before = self.offsets.len();
        while self.end < data.len() {
            let size = validate_record(&data[self.end..])
                .map_err(|reason| VxlError::Corrupt {
                    offset: HEADER_SIZE + self.end as u64,
                    reason,
                })?;
            self.offsets.push(self.end as u64);
            self.end += size;
        }
        Ok(self.offsets.len() - before)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset of record `ordinal` within the data region.
    pub fn offset(&self, ordinal: u32) -> Option<usize> {
        self.offsets.get(ordinal as usize).map(|&o| o as usize)
    }

    /// `(ordinal, file offset)` pairs in append order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .map(|(i, &o)| (i as u32, HEADER_SIZE + o))
    }

    /// Bytes of the data region covered by indexed records.
    pub fn indexed_len(&self) -> usize {
        self.end
    }
}

/// Checks the record at the start of `bytes` and returns its size.
fn validate_record(bytes: &[u8]) -> std::result::Result<usize, &'static str> {
    let fixed = RecordHeader::decode(bytes).ok_or("truncated record header")?;
    let size = fixed.record_size();

    if size > MAX_RECORD_SIZE {
        return Err("record exceeds size bound");
    }
    if fixed.header_len == 0 {
        return Err("record has no header text");
    }
    if fixed.severity as usize >= SEVERITY_COUNT {
        return Err("severity out of range");
    }
    if size > bytes.len() {
        return Err("record extends past end of file");
    }

    let header_end = RECORD_FIXED_SIZE + fixed.header_len as usize;
    if bytes[header_end - 1] != 0 || (fixed.detail_len > 0 && bytes[size - 1] != 0) {
        return Err("unterminated record text");
    }
    Ok(size)
}

/// One decoded record, borrowing its text from the reader.
#[derive(Debug, Clone)]
pub struct LogEntry<'a> {
    /// Position in append order.
    pub ordinal: u32,
    /// Byte offset of the record in the file.
    pub offset: u64,
    /// Microseconds since the Unix epoch.
    pub time_micros: u64,
    pub process_id: u32,
    /// Writer's thread number within `process_id`, numbered from 1 in
    /// first-write order. Not an OS thread id; only the
    /// `(process_id, thread_id)` pair identifies a writer across processes.
    pub thread_id: u32,
    pub severity: Severity,
    pub source_line: u32,
    pub component: u16,
    pub file: u16,
    pub function: u16,
    /// Summary text, without its terminator.
    pub header: Cow<'a, str>,
    /// Expanded text, if the message had any.
    pub detail: Option<Cow<'a, str>>,
}

impl LogEntry<'_> {
    pub fn timestamp(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.time_micros)
    }

    /// The message as it was written: header and detail rejoined with the
    /// blank line they were split at.
    pub fn message(&self) -> Cow<'_, str> {
        match &self.detail {
            None => Cow::Borrowed(self.header.as_ref()),
            Some(detail) => {
                let mut text = String::with_capacity(self.header.len() + SEPARATOR.len() + detail.len());
                text.push_str(&self.header);
                text.push_str("\r\n\r\n");
                text.push_str(detail);
                Cow::Owned(text)
            }
        }
    }
}

/// Read-only view of a log file for the viewer side.
///
/// Holds a copy of the data region read so far, the most recently read
/// header, and the [`EntryIndex`] over the data. Nothing here takes the
/// writer's lock: records are immutable once appended and the header only
/// grows, so a reader can at worst miss the newest record until its next
/// [`refresh`](Self::refresh).
///
/// # Examples
///
/// ```
/// # use vxlog::{LogHandle, LogConfig, LogReader, Severity, vxl_info};
/// # let dir = tempfile::tempdir().unwrap();
/// # let path = dir.path().join("r.vxl");
/// let log = LogHandle::create(&path, LogConfig::testing()).unwrap();
/// let mut reader = LogReader::open(&path).unwrap();
/// assert!(reader.is_empty());
///
/// vxl_info!(log, "Loader", "started").unwrap();
/// assert_eq!(reader.refresh().unwrap(), 1);
///
/// let entry = reader.entry(0).unwrap();
/// assert_eq!(entry.header, "started");
/// assert_eq!(entry.severity, Severity::Information);
/// ```
pub struct LogReader {
    path: PathBuf,
    file: File,
    header: LogHeader,
    data: Vec<u8>,
    index: EntryIndex,
    corrupt_at: Option<u64>,
}

impl LogReader {
    /// Opens `path` and indexes every record in it.
    ///
    /// A corrupt record does not fail the open; the reader keeps the
    /// records before it and reports the offset through
    /// [`corruption`](Self::corruption).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = Self {
            path: path.to_path_buf(),
            file,
            header: LogHeader::new(),
            data: Vec::new(),
            index: EntryIndex::new(),
            corrupt_at: None,
        };
        match reader.refresh() {
            Ok(count) => debug!(path = %path.display(), entries = count, "Opened log for reading"),
            Err(err) if err.is_corruption() => {}
            Err(err) => return Err(err),
        }
        Ok(reader)
    }

    /// Reads whatever was appended since the last refresh, re-reads the
    /// header and extends the index.
    ///
    /// Data is read before the header. Writers persist a table slot before
    /// appending the first record that uses it, so every record read here
    /// resolves against the header read after it.
    ///
    /// Returns the number of new entries.
    pub fn refresh(&mut self) -> Result<usize> {
        let file_len = self.file.metadata()?.len();
        if file_len < HEADER_SIZE {
            return Err(VxlError::BadHeader("file shorter than header"));
        }
        self.file.seek(SeekFrom::Start(HEADER_SIZE + self.data.len() as u64))?;
        let read = self.file.read_to_end(&mut self.data)?;
        trace!(bytes = read, "Read appended log data");

        let mut header_bytes = vec![0u8; HEADER_SIZE as usize];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header_bytes).map_err(|_| VxlError::BadHeader("file shorter than header"))?;
        self.header = LogHeader::decode(&header_bytes)?;

        match self.index.build(&self.data) {
            Ok(added) => {
                self.corrupt_at = None;
                Ok(added)
            }
            Err(err) => {
                if let VxlError::Corrupt { offset, reason } = &err {
                    warn!(path = %self.path.display(), offset, reason, "Stopped indexing at corrupt record");
                    self.corrupt_at = Some(*offset);
                }
                Err(err)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    pub fn index(&self) -> &EntryIndex {
        &self.index
    }

    /// Per-severity event counts from the header.
    pub fn severity_counts(&self) -> &[u32; SEVERITY_COUNT] {
        self.header.counts()
    }

    /// File offset of the record indexing stopped at, if the last refresh
    /// hit one.
    pub fn corruption(&self) -> Option<u64> {
        self.corrupt_at
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Decodes entry `ordinal`.
    pub fn entry(&self, ordinal: u32) -> Option<LogEntry<'_>> {
        let start = self.index.offset(ordinal)?;
        let bytes = &self.data[start..];
        let fixed = RecordHeader::decode(bytes)?;

        let header_end = RECORD_FIXED_SIZE + fixed.header_len as usize;
        let header = String::from_utf8_lossy(&bytes[RECORD_FIXED_SIZE..header_end - 1]);
        let detail = (fixed.detail_len > 0).then(|| {
            let detail_end = header_end + fixed.detail_len as usize;
            String::from_utf8_lossy(&bytes[header_end..detail_end - 1])
        });

        Some(LogEntry {
            ordinal,
            offset: HEADER_SIZE + start as u64,
            time_micros: fixed.time_micros,
            process_id: fixed.process_id,
            thread_id: fixed.thread_id,
            severity: Severity::try_from(fixed.severity).ok()?,
            source_line: fixed.source_line,
            component: fixed.component,
            file: fixed.file,
            function: fixed.function,
            header,
            detail,
        })
    }

    /// All indexed entries in append order.
    pub fn iter(&self) -> impl Iterator<Item = LogEntry<'_>> + '_ {
        (0..self.len() as u32).filter_map(move |ordinal| self.entry(ordinal))
    }
}
