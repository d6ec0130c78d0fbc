//! # vxlog
//!
//! A structured, binary event log for compatibility shims injected into
//! arbitrary host processes. Many threads and processes append to one file;
//! a viewer indexes it, filters it and formats rows on demand.
//!
//! ## Key Features
//!
//! * Zero-allocation formatting path, so logging keeps working when the host
//!   is out of memory
//! * Component, file and function names interned into per-log string tables
//! * Messages split into a summary header and an on-demand detail section at
//!   their first blank line
//! * Faults in formatting code are caught and reported, never propagated
//!   into the host
//! * Incremental index building for readers of a file that is still growing
//! * Severity, component and text filtering with wildcard support
//!
//! ## Main Components
//!
//! * `LogHandle`: open log file plus the exclusive lock guarding its header
//! * `StringTable`: append-only deduplicating name table
//! * `LogReader` / `EntryIndex`: read path and record offsets
//! * `FilterSpec` / `evaluate`: query engine
//! * `DisplayCache`: lazily formatted rows for list display
//! * `LogView`: all of the read side bundled for a viewer
//!
//! ## Quick Start
//!
//! ```
//! use vxlog::{LogHandle, LogConfig, LogReader, FilterSpec, TextFilter, Severity, evaluate, vxl_error, vxl_debug};
//!
//! # let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("process.vxl");
//! let log = LogHandle::create(&path, LogConfig::testing()).unwrap();
//!
//! vxl_error!(log, "KexDll", "disk full").unwrap();
//! vxl_debug!(log, "KexDll", "startup ok").unwrap();
//!
//! let reader = LogReader::open(&path).unwrap();
//! let mut spec = FilterSpec::all(reader.header().components().len());
//! spec.severities[Severity::Debug.index()] = false;
//! spec.text = TextFilter::wildcard("disk*");
//!
//! assert_eq!(evaluate(&reader, &spec), vec![0]);
//! ```

pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod filter;
pub mod header;
pub mod index;
pub mod layout;
pub mod severity;
pub mod store;
pub mod string_table;
pub mod telemetry;
pub mod view;
pub mod writer;

pub use config::{DiagnosticsConfig, LogConfig};
pub use display::{export_line, export_text, CacheEntry, DisplayCache};
pub use error::{Result, VxlError, WritePhase};
pub use filter::{evaluate, evaluate_from, wildcard_match, FilterSpec, TextFilter};
pub use header::LogHeader;
pub use index::{EntryIndex, LogEntry, LogReader};
pub use severity::Severity;
pub use store::LogHandle;
pub use string_table::StringTable;
pub use view::LogView;
