use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::LogConfig;
use crate::error::{Result, VxlError, WritePhase};
use crate::header::{encode_slot, LogHeader, Prelude};
use crate::layout::{self, TableKind, PRELUDE_SIZE, SLOT_SIZE};
use crate::severity::{Severity, SEVERITY_COUNT};

/// An open log file, ready for writing.
///
/// A handle owns two descriptors on the same file: an append-mode one that
/// every record goes through, and a positional one used to write header
/// words back in place. Both, together with the in-memory header, sit behind
/// one exclusive lock.
///
/// # Thread Safety
///
/// `LogHandle` is `Send + Sync`; share it with `Arc`. Within a process the
/// lock serializes the locked phase of every write, so records from one
/// handle land in the file in the order their writers took the lock.
///
/// Other processes may hold their own handles on the same file. There is
/// no lock between processes: each record is a single append-at-end write,
/// and the ordering of two processes' records is whatever the file system
/// makes of two concurrent appends.
///
/// # Examples
///
/// ```
/// # use vxlog::{LogHandle, LogConfig, Severity};
/// # let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("app.vxl");
/// let log = LogHandle::create(&path, LogConfig::testing()).unwrap();
///
/// log.write_entry(Some("Loader"), None, 0, None, Severity::Information,
///     format_args!("loaded {} modules", 12)).unwrap();
/// log.close().unwrap();
/// ```
pub struct LogHandle {
    path: PathBuf,
    config: LogConfig,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    header: LogHeader,
    append: File,
    header_file: File,
}

#[cfg(test)]
thread_local! {
    static INJECT_LOCKED_FAULT: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
    static INJECT_HEADER_WRITE_FAULT: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

impl LogHandle {
    /// Creates a new, empty log at `path`, replacing any existing file.
    pub fn create(path: impl AsRef<Path>, config: LogConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let header = LogHeader::new();
        file.write_all(&header.encode())?;
        file.sync_data()?;

        info!(path = %path.display(), "Created log file");
        Self::from_parts(path, config, header, file)
    }

    /// Opens an existing log, or creates one if it is missing and
    /// `config.create_if_missing` is set.
    pub fn open(path: impl AsRef<Path>, config: LogConfig) -> Result<Self> {
        let path = path.as_ref();
        if config.create_if_missing {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let header = LogHeader::new();
                    file.write_all(&header.encode())?;
                    file.sync_data()?;
                    info!(path = %path.display(), "Created log file");
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err.into()),
            }
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut bytes = vec![0u8; layout::HEADER_SIZE as usize];
        file.read_exact(&mut bytes).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => VxlError::BadHeader("file shorter than header"),
            _ => VxlError::Io(err),
        })?;
        let header = LogHeader::decode(&bytes)?;

        debug!(
            path = %path.display(),
            components = header.components().len(),
            files = header.files().len(),
            functions = header.functions().len(),
            "Opened log file"
        );
        Self::from_parts(path, config, header, file)
    }

    fn from_parts(path: &Path, config: LogConfig, header: LogHeader, header_file: File) -> Result<Self> {
        let append = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
            inner: Mutex::new(StoreInner {
                header,
                append,
                header_file,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Copy of the current header state.
    pub fn header_snapshot(&self) -> LogHeader {
        self.inner.lock().header.clone()
    }

    /// Events written so far, per severity, as this handle knows them.
    pub fn severity_counts(&self) -> [u32; SEVERITY_COUNT] {
        *self.inner.lock().header.counts()
    }

    /// Flushes the file to disk and releases the handle.
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner();
        inner.append.sync_data()?;
        inner.header_file.sync_data()?;
        debug!(path = %self.path.display(), "Closed log file");
        Ok(())
    }

    /// The locked phase of a write.
    ///
    /// `record` is a fully formatted record whose string-table indices are
    /// still unset. Under the lock, the three names are interned, the
    /// severity counter is bumped, the indices are patched in and the record
    /// is appended with a single write. A panic anywhere in here is caught
    /// and reported as a fault; the guard is released while unwinding.
    pub(crate) fn append_record(
        &self,
        names: [&str; 3],
        severity: Severity,
        record: &mut [u8],
    ) -> Result<()> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut inner = self.inner.lock();

            #[cfg(test)]
            if INJECT_LOCKED_FAULT.with(|f| f.replace(false)) {
                panic!("injected fault in locked phase");
            }

            inner.append_locked(names, severity, record)
        }));
        outcome.unwrap_or(Err(VxlError::Fault(WritePhase::Locked)))
    }

    #[cfg(test)]
    fn inject_locked_fault() {
        INJECT_LOCKED_FAULT.with(|f| f.set(true));
    }

    #[cfg(test)]
    fn inject_header_write_fault() {
        INJECT_HEADER_WRITE_FAULT.with(|f| f.set(true));
    }
}

impl StoreInner {
    fn append_locked(&mut self, names: [&str; 3], severity: Severity, record: &mut [u8]) -> Result<()> {
        self.sync_tables()?;

        let mut indices = [0u16; 3];
        for (kind, (name, slot)) in TableKind::ALL.into_iter().zip(names.into_iter().zip(&mut indices)) {
            *slot = self.find_or_create(kind, name)?;
        }

        let count = self.header.increment(severity);
        self.write_header_at(layout::counter_offset(severity.index()), &count.to_le_bytes())?;

        layout::patch_indices(record, indices);

        // A single append is the point where the record becomes durable.
        self.append.write_all(record)?;
        Ok(())
    }

    /// Picks up string-table slots and counter values other handles wrote
    /// to the file since we last looked.
    fn sync_tables(&mut self) -> Result<()> {
        let mut prelude_bytes = [0u8; PRELUDE_SIZE as usize];
        self.header_file.seek(SeekFrom::Start(0))?;
        self.header_file.read_exact(&mut prelude_bytes)?;
        let prelude = Prelude::decode(&prelude_bytes)?;

        let file = &mut self.header_file;
        self.header.load_slots(&prelude, |kind, ordinal| {
            let mut slot = vec![0u8; SLOT_SIZE];
            file.seek(SeekFrom::Start(layout::slot_offset(kind, ordinal)))?;
            file.read_exact(&mut slot)?;
            Ok(slot)
        })
    }

    /// Interns `name` and persists a new slot before its length word.
    /// If persisting fails the in-memory table is rolled back, so no
    /// record can reference an ordinal that is not on disk.
    fn find_or_create(&mut self, kind: TableKind, name: &str) -> Result<u16> {
        let before = self.header.table(kind).len();
        let ordinal = self.header.table_mut(kind).find_or_create(name)?;
        if self.header.table(kind).len() > before {
            if let Err(err) = self.persist_slot(kind, ordinal, name) {
                self.header.table_mut(kind).truncate(before);
                return Err(err);
            }
        }
        Ok(ordinal)
    }

    fn persist_slot(&mut self, kind: TableKind, ordinal: u16, name: &str) -> Result<()> {
        let mut slot = [0u8; SLOT_SIZE];
        encode_slot(name, &mut slot);
        self.write_header_at(layout::slot_offset(kind, ordinal as usize), &slot)?;
        let len = (ordinal + 1).to_le_bytes();
        self.write_header_at(layout::table_len_offset(kind), &len)
    }

    fn write_header_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        #[cfg(test)]
        if INJECT_HEADER_WRITE_FAULT.with(|f| f.replace(false)) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected header write failure").into());
        }
        self.header_file.seek(SeekFrom::Start(offset))?;
        self.header_file.write_all(bytes)?;
        Ok(())
    }
}
