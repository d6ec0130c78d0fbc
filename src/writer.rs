use std::fmt::{self, Write as _};
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use crate::clock;
use crate::error::{Result, VxlError, WritePhase};
use crate::layout::{RecordHeader, MAX_RECORD_SIZE, RECORD_FIXED_SIZE};
use crate::severity::Severity;
use crate::store::LogHandle;

/// Blank line separating a message's header text from its detail text.
pub const SEPARATOR: &[u8] = b"\r\n\r\n";

/// Counts the bytes a message renders to without storing them.
struct CountingWriter {
    len: usize,
}

impl fmt::Write for CountingWriter {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.len += s.len();
        Ok(())
    }
}

/// Renders into a fixed slice, failing instead of growing.
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl fmt::Write for SliceWriter<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.pos + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(s.as_bytes());
        self.pos = end;
        Ok(())
    }
}

impl LogHandle {
    /// Formats a message and appends it to the log as one record.
    ///
    /// The write runs in two phases:
    ///
    /// 1. Without the lock, the message is measured, checked against the
    ///    record size bound, rendered into a stack buffer and split into
    ///    header and detail text. Nothing on this path touches the heap, so
    ///    logging keeps working when allocation does not.
    /// 2. Under the handle's lock, the component, file and function names
    ///    are interned, the severity counter is bumped and the record is
    ///    appended at end-of-file.
    ///
    /// Absent names are stored as the empty string.
    ///
    /// # Errors
    ///
    /// * `InvalidFormat` - a `Display` impl in `args` returned an error
    /// * `RecordTooLarge` - the record would exceed 65535 bytes
    /// * `ResourceExhausted` - a string table cannot take a new name
    /// * `Fault` - a panic was caught in either phase
    /// * `Io` - reading or writing the file failed
    ///
    /// On every error the file holds no part of the record.
    ///
    /// # Examples
    ///
    /// ```
    /// # use vxlog::{LogHandle, LogConfig, Severity};
    /// # let dir = tempfile::tempdir().unwrap();
    /// # let log = LogHandle::create(dir.path().join("w.vxl"), LogConfig::testing()).unwrap();
    /// log.write_entry(
    ///     Some("KexDll"),
    ///     Some(file!()),
    ///     line!(),
    ///     Some("install_handler"),
    ///     Severity::Error,
    ///     format_args!("Failed to install hard error handler\r\n\r\nStatus: {:#010x}", 0xC000_0001u32),
    /// ).unwrap();
    /// ```
    pub fn write_entry(
        &self,
        component: Option<&str>,
        file: Option<&str>,
        line: u32,
        function: Option<&str>,
        severity: Severity,
        args: fmt::Arguments<'_>,
    ) -> Result<()> {
        let names = [
            component.unwrap_or(""),
            file.unwrap_or(""),
            function.unwrap_or(""),
        ];

        let mut record = [0u8; MAX_RECORD_SIZE];
        let size = panic::catch_unwind(AssertUnwindSafe(|| {
            prepare_record(&mut record, line, severity, args)
        }))
        .unwrap_or(Err(VxlError::Fault(WritePhase::Formatting)))?;

        if self.config().echo {
            echo(names[0], severity, &record[..size]);
        }

        self.append_record(names, severity, &mut record[..size])
    }
}

/// Builds a complete record (indices left at 0) at the start of `record`
/// and returns its length.
fn prepare_record(
    record: &mut [u8],
    line: u32,
    severity: Severity,
    args: fmt::Arguments<'_>,
) -> Result<usize> {
    // Dry run so the size limit is checked before anything is rendered
    let mut counter = CountingWriter { len: 0 };
    counter.write_fmt(args).map_err(|_| VxlError::InvalidFormat)?;

    let text_len = counter.len;
    let unsplit_size = RECORD_FIXED_SIZE + text_len + 1;
    if unsplit_size > MAX_RECORD_SIZE || unsplit_size > record.len() {
        return Err(VxlError::RecordTooLarge { size: unsplit_size });
    }

    let text = &mut record[RECORD_FIXED_SIZE..unsplit_size];
    let mut writer = SliceWriter {
        buf: &mut text[..text_len],
        pos: 0,
    };
    if writer.write_fmt(args).is_err() || writer.pos != text_len {
        return Err(VxlError::Internal("rendered length differs from measured length"));
    }
    text[text_len] = 0;

    let (header_len, detail_len) = split_message(text);

    let fixed = RecordHeader {
        time_micros: clock::system_time_micros(),
        process_id: clock::process_id(),
        thread_id: clock::thread_id(),
        source_line: line,
        severity: severity as u16,
        component: 0,
        file: 0,
        function: 0,
        header_len: header_len as u16,
        detail_len: detail_len as u16,
    };
    fixed.encode(&mut record[..RECORD_FIXED_SIZE]);

    Ok(RECORD_FIXED_SIZE + header_len + detail_len)
}

/// Splits NUL-terminated message text in place at its first blank line.
///
/// If the text contains `\r\n\r\n` with something after it, the first byte
/// of the separator becomes the header's terminator and the detail is moved
/// up behind it, shrinking the text by 3 bytes. Otherwise the whole text is
/// the header.
///
/// Returns `(header_len, detail_len)`, both counting their terminator.
pub(crate) fn split_message(text: &mut [u8]) -> (usize, usize) {
    let total = text.len();
    let body = total.saturating_sub(1);

    let found = text[..body]
        .windows(SEPARATOR.len())
        .position(|w| w == SEPARATOR);

    match found {
        Some(at) if at + SEPARATOR.len() < body => {
            text[at] = 0;
            text.copy_within(at + SEPARATOR.len()..total, at + 1);
            let new_total = total - (SEPARATOR.len() - 1);
            let header_len = at + 1;
            (header_len, new_total - header_len)
        }
        _ => (total, 0),
    }
}

fn echo(component: &str, severity: Severity, record: &[u8]) {
    let Some(fixed) = RecordHeader::decode(record) else {
        return;
    };
    let start = RECORD_FIXED_SIZE;
    let header = &record[start..start + fixed.header_len.saturating_sub(1) as usize];
    debug!(
        target: "vxlog::echo",
        component,
        severity = severity.as_str(),
        "{}",
        String::from_utf8_lossy(header)
    );
}

/// Writes an entry, filling in the source file, line and module path.
///
/// Expands to a [`LogHandle::write_entry`] call and evaluates to its
/// `Result`. The module path stands in for the function name.
///
/// # Examples
///
/// ```
/// # use vxlog::{LogHandle, LogConfig, Severity, vxl_log};
/// # let dir = tempfile::tempdir().unwrap();
/// # let log = LogHandle::create(dir.path().join("m.vxl"), LogConfig::testing()).unwrap();
/// vxl_log!(log, "Loader", Severity::Warning, "retrying {} of {}", 1, 3).unwrap();
/// ```
#[macro_export]
macro_rules! vxl_log {
    ($handle:expr, $component:expr, $severity:expr, $($arg:tt)+) => {
        $handle.write_entry(
            ::core::option::Option::Some($component),
            ::core::option::Option::Some(::core::file!()),
            ::core::line!(),
            ::core::option::Option::Some(::core::module_path!()),
            $severity,
            ::core::format_args!($($arg)+),
        )
    };
}

#[macro_export]
macro_rules! vxl_critical {
    ($handle:expr, $component:expr, $($arg:tt)+) => {
        $crate::vxl_log!($handle, $component, $crate::Severity::Critical, $($arg)+)
    };
}

#[macro_export]
macro_rules! vxl_error {
    ($handle:expr, $component:expr, $($arg:tt)+) => {
        $crate::vxl_log!($handle, $component, $crate::Severity::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! vxl_warning {
    ($handle:expr, $component:expr, $($arg:tt)+) => {
        $crate::vxl_log!($handle, $component, $crate::Severity::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! vxl_info {
    ($handle:expr, $component:expr, $($arg:tt)+) => {
        $crate::vxl_log!($handle, $component, $crate::Severity::Information, $($arg)+)
    };
}

#[macro_export]
macro_rules! vxl_detail {
    ($handle:expr, $component:expr, $($arg:tt)+) => {
        $crate::vxl_log!($handle, $component, $crate::Severity::Detail, $($arg)+)
    };
}

#[macro_export]
macro_rules! vxl_debug {
    ($handle:expr, $component:expr, $($arg:tt)+) => {
        $crate::vxl_log!($handle, $component, $crate::Severity::Debug, $($arg)+)
    };
}
