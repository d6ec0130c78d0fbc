//! Viewer backend: a reader, the active filter, the rows it selects and
//! the display cache, kept in step with each other.
//!
//! The embedding viewer decides when to poll; every [`LogView::refresh`]
//! picks up appended records and runs only those through the current
//! filter.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::LogConfig;
use crate::display::{CacheEntry, DisplayCache};
use crate::error::Result;
use crate::filter::{self, FilterSpec};
use crate::index::LogReader;

pub struct LogView {
    reader: LogReader,
    filter: FilterSpec,
    rows: Vec<u32>,
    /// Entries before this ordinal have been run through `filter`.
    evaluated: u32,
    cache: DisplayCache,
}

impl LogView {
    /// Opens `path` with everything visible.
    pub fn open(path: impl AsRef<Path>, config: &LogConfig) -> Result<Self> {
        let reader = LogReader::open(path)?;
        let filter = FilterSpec::all(reader.header().components().len());
        let mut view = Self {
            reader,
            filter,
            rows: Vec::new(),
            evaluated: 0,
            cache: DisplayCache::from_config(config),
        };
        view.extend_rows();
        Ok(view)
    }

    /// Replaces the filter and recomputes the visible rows.
    pub fn set_filter(&mut self, filter: FilterSpec) {
        self.filter = filter;
        self.rows.clear();
        self.evaluated = 0;
        self.extend_rows();
        debug!(rows = self.rows.len(), "Applied filter");
    }

    /// Reads new records and filters them; returns how many became visible.
    ///
    /// Corruption stops indexing but keeps what was indexed, so the view
    /// still extends its rows before the error is returned.
    pub fn refresh(&mut self) -> Result<usize> {
        let before = self.rows.len();
        let outcome = self.reader.refresh();
        self.extend_rows();
        outcome.map(|_| self.rows.len() - before)
    }

    fn extend_rows(&mut self) {
        let added = filter::evaluate_from(&self.reader, &self.filter, self.evaluated);
        self.rows.extend(added);
        self.evaluated = self.reader.len() as u32;
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn reader(&self) -> &LogReader {
        &self.reader
    }

    /// Number of visible rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Entry ordinals of the visible rows, ascending.
    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    /// Display form of visible row `row`.
    pub fn row(&mut self, row: usize) -> Option<Arc<CacheEntry>> {
        let ordinal = *self.rows.get(row)?;
        self.display(ordinal)
    }

    /// Display form of entry `ordinal`, visible or not.
    pub fn display(&mut self, ordinal: u32) -> Option<Arc<CacheEntry>> {
        self.cache.get(&self.reader, ordinal)
    }

    /// Component names in ordinal order, for the component checklist.
    pub fn component_names(&self) -> Vec<&str> {
        self.reader.header().components().iter().collect()
    }
}
