//! Error type shared by the write and read paths.

use std::fmt;
use std::io;

use thiserror::Error;

/// Which part of a write was running when a fault was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    /// Rendering the message, before the lock is taken.
    Formatting,
    /// Interning, counter update or the append itself.
    Locked,
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePhase::Formatting => f.write_str("formatting"),
            WritePhase::Locked => f.write_str("locked phase"),
        }
    }
}

/// Errors returned by the log engine.
///
/// None of these are ever raised as panics across the engine boundary; a
/// failed write leaves the file without a partial record.
#[derive(Debug, Error)]
pub enum VxlError {
    /// A caller-supplied value was rejected before any state changed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// A `Display` implementation reported `fmt::Error` while measuring.
    #[error("message could not be formatted")]
    InvalidFormat,

    /// The record would exceed the 16-bit length bound.
    #[error("record of {size} bytes exceeds the 65535 byte limit")]
    RecordTooLarge { size: usize },

    /// A string table or buffer could not grow.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// A panic was caught while the write was in progress.
    #[error("fault during {0}")]
    Fault(WritePhase),

    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The index scan found a record that cannot be valid.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: &'static str },

    /// The file does not start with a recognizable log header.
    #[error("bad log header: {0}")]
    BadHeader(&'static str),

    /// Rendering disagreed with the measuring pass.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl VxlError {
    /// True for errors that leave the reader usable with the entries it has.
    pub fn is_corruption(&self) -> bool {
        matches!(self, VxlError::Corrupt { .. })
    }
}

pub type Result<T> = std::result::Result<T, VxlError>;
