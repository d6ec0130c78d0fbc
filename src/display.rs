use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::config::LogConfig;
use crate::index::LogReader;
use crate::layout::TableKind;
use crate::severity::Severity;

/// Display-ready form of one entry.
///
/// Everything a list row needs is resolved up front: table ordinals are
/// replaced by their text and the timestamp and line number are already
/// strings. Entries are immutable once written, so a `CacheEntry` stays
/// correct no matter how much is appended after it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub ordinal: u32,
    pub severity: Severity,
    pub time_micros: u64,
    pub process_id: u32,
    pub thread_id: u32,
    /// `YYYY-MM-DD HH:MM:SS`.
    pub short_date_time: String,
    pub source_line: String,
    pub component: String,
    pub file: String,
    pub function: String,
    pub header: String,
    pub detail: Option<String>,
}

/// Lazily built [`CacheEntry`] values, keyed by entry ordinal.
///
/// A virtualized list asks for a handful of rows at a time, so entries are
/// formatted only when first requested. Once the cache holds `capacity`
/// entries it is emptied and starts over; callers holding an `Arc` keep
/// their entry regardless.
///
/// # Examples
///
/// ```
/// # use vxlog::{LogHandle, LogConfig, LogReader, DisplayCache, vxl_warning, export_text};
/// # let dir = tempfile::tempdir().unwrap();
/// # let path = dir.path().join("d.vxl");
/// let log = LogHandle::create(&path, LogConfig::testing()).unwrap();
/// vxl_warning!(log, "Loader", "missing export\r\n\r\nGetSystemTimePreciseAsFileTime").unwrap();
///
/// let reader = LogReader::open(&path).unwrap();
/// let mut cache = DisplayCache::new(256, true);
/// let entry = cache.get(&reader, 0).unwrap();
///
/// assert_eq!(entry.component, "Loader");
/// assert_eq!(entry.header, "missing export");
/// assert_eq!(export_text(&entry, false), "missing export");
/// ```
#[derive(Debug)]
pub struct DisplayCache {
    entries: HashMap<u32, Arc<CacheEntry>>,
    capacity: usize,
    utc: bool,
}

impl DisplayCache {
    pub fn new(capacity: usize, utc: bool) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            utc,
        }
    }

    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(config.cache_capacity, config.utc_timestamps)
    }

    /// Returns the display form of entry `ordinal`, building it on first
    /// request. `None` if the reader has no such entry.
    pub fn get(&mut self, reader: &LogReader, ordinal: u32) -> Option<Arc<CacheEntry>> {
        if let Some(entry) = self.entries.get(&ordinal) {
            return Some(Arc::clone(entry));
        }

        let (entry, resolved) = self.build(reader, ordinal)?;
        let entry = Arc::new(entry);
        // A name the reader's header lacks may resolve after its next refresh
        if resolved {
            if self.entries.len() >= self.capacity {
                self.entries.clear();
            }
            self.entries.insert(ordinal, Arc::clone(&entry));
        }
        Some(entry)
    }

    /// Builds the display form of `ordinal`, and whether every name in it
    /// resolved against the reader's string tables.
    fn build(&self, reader: &LogReader, ordinal: u32) -> Option<(CacheEntry, bool)> {
        let entry = reader.entry(ordinal)?;
        let header = reader.header();
        let mut resolved = true;
        let mut name = |kind: TableKind, index: u16| match header.table(kind).get(index) {
            Some(text) => text.to_owned(),
            None => {
                resolved = false;
                format!("#{}", index)
            }
        };

        let cached = CacheEntry {
            ordinal,
            severity: entry.severity,
            time_micros: entry.time_micros,
            process_id: entry.process_id,
            thread_id: entry.thread_id,
            short_date_time: format_time(entry.time_micros, self.utc),
            source_line: entry.source_line.to_string(),
            component: name(TableKind::Components, entry.component),
            file: name(TableKind::Files, entry.file),
            function: name(TableKind::Functions, entry.function),
            header: entry.header.into_owned(),
            detail: entry.detail.map(|d| d.into_owned()),
        };
        Some((cached, resolved))
    }

    /// Drops every cached entry, e.g. after switching to another file.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn format_time(micros: u64, utc: bool) -> String {
    let secs = (micros / 1_000_000) as i64;
    let nanos = ((micros % 1_000_000) * 1_000) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(time) if utc => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        Some(time) => time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}

/// Message text for the clipboard: the header, plus the detail if asked for
/// and present, rejoined with the blank line it was split at.
pub fn export_text(entry: &CacheEntry, include_detail: bool) -> String {
    match (&entry.detail, include_detail) {
        (Some(detail), true) => format!("{}\r\n\r\n{}", entry.header, detail),
        _ => entry.header.clone(),
    }
}

/// One line of context followed by the message text, for "copy long".
pub fn export_line(entry: &CacheEntry, include_detail: bool) -> String {
    format!(
        "[{}] {} {} ({}:{}, {}) {}",
        entry.severity,
        entry.short_date_time,
        entry.component,
        entry.file,
        entry.source_line,
        entry.function,
        export_text(entry, include_detail)
    )
}
