use std::fmt;
use std::str::FromStr;

use crate::error::VxlError;

/// Criticality attached to every log record.
///
/// The discriminant is what gets stored on disk and doubles as the index
/// into the header's per-severity counters and the filter's severity mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Severity {
    Critical = 0,
    Error = 1,
    Warning = 2,
    Information = 3,
    Detail = 4,
    Debug = 5,
}

/// Number of severity levels.
pub const SEVERITY_COUNT: usize = 6;

impl Severity {
    /// All levels, most critical first.
    pub const ALL: [Severity; SEVERITY_COUNT] = [
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Information,
        Severity::Detail,
        Severity::Debug,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name shown in the viewer's severity column.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Information => "Information",
            Severity::Detail => "Detail",
            Severity::Debug => "Debug",
        }
    }

    /// Parses a level name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Severity> {
        Severity::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name))
    }
}

impl TryFrom<u16> for Severity {
    type Error = VxlError;

    fn try_from(value: u16) -> Result<Self, VxlError> {
        Severity::ALL
            .get(value as usize)
            .copied()
            .ok_or(VxlError::InvalidParameter("severity out of range"))
    }
}

impl FromStr for Severity {
    type Err = VxlError;

    fn from_str(name: &str) -> Result<Self, VxlError> {
        Severity::from_name(name.trim()).ok_or(VxlError::InvalidParameter("unknown severity name"))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
