//! On-disk layout of a log file.
//!
//! A file is a fixed-size header block followed by entry records packed back
//! to back in append order. Nothing before end-of-file is ever moved; the
//! header is the only region that is rewritten, and only word by word.
//!
//! # Header
//!
//! `[magic(4) | version(2) | reserved(2) | counts(6 * 4) | table_lens(3 * 2) | pad]`
//! padded to [`PRELUDE_SIZE`], then three string-table regions of
//! [`TABLE_CAPACITY`] slots each. A slot is `[len(2) | utf8(len)]`.
//!
//! # Record
//!
//! `[time(8) | pid(4) | tid(4) | line(4) | severity(2) | component(2) |
//!   file(2) | function(2) | header_len(2) | detail_len(2) | text]`
//!
//! The record length is derived from the two text lengths, which both count
//! their trailing NUL.

use crate::severity::SEVERITY_COUNT;

pub const MAGIC: [u8; 4] = *b"VXLF";
pub const FORMAT_VERSION: u16 = 1;

/// Number of string tables in the header (components, files, functions).
pub const TABLE_COUNT: usize = 3;
/// Slots per string table.
pub const TABLE_CAPACITY: usize = 128;
/// Bytes per string-table slot, including its length word.
pub const SLOT_SIZE: usize = 256;
/// Longest string a slot can hold.
pub const MAX_TABLE_STRING: usize = SLOT_SIZE - 2;

pub const COUNTS_OFFSET: u64 = 8;
pub const TABLE_LENS_OFFSET: u64 = COUNTS_OFFSET + (SEVERITY_COUNT as u64) * 4;
pub const PRELUDE_SIZE: u64 = 64;
pub const TABLE_REGION_SIZE: u64 = (TABLE_CAPACITY * SLOT_SIZE) as u64;
/// Offset of the first entry record.
pub const HEADER_SIZE: u64 = PRELUDE_SIZE + TABLE_COUNT as u64 * TABLE_REGION_SIZE;

pub const RECORD_FIXED_SIZE: usize = 32;
/// Upper bound on a whole record, imposed by the 16-bit length fields.
pub const MAX_RECORD_SIZE: usize = 0xFFFF;
/// Longest rendered message (without its terminator) that still fits.
pub const MAX_MESSAGE_LEN: usize = MAX_RECORD_SIZE - RECORD_FIXED_SIZE - 1;

/// Identifies one of the three header string tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Components = 0,
    Files = 1,
    Functions = 2,
}

impl TableKind {
    pub const ALL: [TableKind; TABLE_COUNT] =
        [TableKind::Components, TableKind::Files, TableKind::Functions];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[inline]
pub fn counter_offset(severity_index: usize) -> u64 {
    COUNTS_OFFSET + severity_index as u64 * 4
}

#[inline]
pub fn table_len_offset(kind: TableKind) -> u64 {
    TABLE_LENS_OFFSET + kind.index() as u64 * 2
}

#[inline]
pub fn slot_offset(kind: TableKind, ordinal: usize) -> u64 {
    PRELUDE_SIZE + kind.index() as u64 * TABLE_REGION_SIZE + (ordinal * SLOT_SIZE) as u64
}

#[inline]
pub(crate) fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(b)
}

#[inline]
pub(crate) fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(b)
}

/// The fixed part of an entry record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordHeader {
    /// Wall-clock time in microseconds since the Unix epoch.
    pub time_micros: u64,
    pub process_id: u32,
    pub thread_id: u32,
    pub source_line: u32,
    /// Raw severity; validated when decoded by the index.
    pub severity: u16,
    pub component: u16,
    pub file: u16,
    pub function: u16,
    /// Header text length including its NUL.
    pub header_len: u16,
    /// Detail text length including its NUL, 0 when there is no detail.
    pub detail_len: u16,
}

impl RecordHeader {
    /// Total on-disk size of the record this header describes.
    #[inline]
    pub fn record_size(&self) -> usize {
        RECORD_FIXED_SIZE + self.header_len as usize + self.detail_len as usize
    }

    pub fn encode(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.time_micros.to_le_bytes());
        out[8..12].copy_from_slice(&self.process_id.to_le_bytes());
        out[12..16].copy_from_slice(&self.thread_id.to_le_bytes());
        out[16..20].copy_from_slice(&self.source_line.to_le_bytes());
        out[20..22].copy_from_slice(&self.severity.to_le_bytes());
        out[22..24].copy_from_slice(&self.component.to_le_bytes());
        out[24..26].copy_from_slice(&self.file.to_le_bytes());
        out[26..28].copy_from_slice(&self.function.to_le_bytes());
        out[28..30].copy_from_slice(&self.header_len.to_le_bytes());
        out[30..32].copy_from_slice(&self.detail_len.to_le_bytes());
    }

    /// Decodes the fixed fields, or `None` if fewer than
    /// [`RECORD_FIXED_SIZE`] bytes are available.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RECORD_FIXED_SIZE {
            return None;
        }
        Some(Self {
            time_micros: read_u64(bytes, 0),
            process_id: read_u32(bytes, 8),
            thread_id: read_u32(bytes, 12),
            source_line: read_u32(bytes, 16),
            severity: read_u16(bytes, 20),
            component: read_u16(bytes, 22),
            file: read_u16(bytes, 24),
            function: read_u16(bytes, 26),
            header_len: read_u16(bytes, 28),
            detail_len: read_u16(bytes, 30),
        })
    }
}

/// Writes the component/file/function ordinals into an encoded record.
#[inline]
pub fn patch_indices(record: &mut [u8], indices: [u16; 3]) {
    record[22..24].copy_from_slice(&indices[0].to_le_bytes());
    record[24..26].copy_from_slice(&indices[1].to_le_bytes());
    record[26..28].copy_from_slice(&indices[2].to_le_bytes());
}
