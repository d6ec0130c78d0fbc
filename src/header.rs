//! In-memory form of the log file header: the three string tables and the
//! per-severity event counters.

use crate::error::{Result, VxlError};
use crate::layout::{
    self, TableKind, COUNTS_OFFSET, FORMAT_VERSION, HEADER_SIZE, MAGIC, MAX_TABLE_STRING,
    PRELUDE_SIZE, SLOT_SIZE, TABLE_CAPACITY, TABLE_COUNT, TABLE_LENS_OFFSET,
};
use crate::severity::{Severity, SEVERITY_COUNT};
use crate::string_table::StringTable;

/// Fixed leading part of the header: counters and table lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Prelude {
    pub counts: [u32; SEVERITY_COUNT],
    pub table_lens: [u16; TABLE_COUNT],
}

impl Prelude {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PRELUDE_SIZE as usize {
            return Err(VxlError::BadHeader("file shorter than header"));
        }
        if bytes[0..4] != MAGIC {
            return Err(VxlError::BadHeader("magic mismatch"));
        }
        if layout::read_u16(bytes, 4) != FORMAT_VERSION {
            return Err(VxlError::BadHeader("unsupported format version"));
        }

        let mut prelude = Prelude::default();
        for (i, count) in prelude.counts.iter_mut().enumerate() {
            *count = layout::read_u32(bytes, COUNTS_OFFSET as usize + i * 4);
        }
        for (i, len) in prelude.table_lens.iter_mut().enumerate() {
            *len = layout::read_u16(bytes, TABLE_LENS_OFFSET as usize + i * 2);
            if *len as usize > TABLE_CAPACITY {
                return Err(VxlError::BadHeader("string table length out of range"));
            }
        }
        Ok(prelude)
    }
}

/// Header state shared by all writers of one handle.
///
/// Mutated only under the handle's exclusive lock. Counters only increase
/// and tables only grow, so a snapshot taken at any time stays consistent
/// with every record written before it.
#[derive(Debug, Clone, Default)]
pub struct LogHeader {
    tables: [StringTable; TABLE_COUNT],
    counts: [u32; SEVERITY_COUNT],
}

impl LogHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a complete header block.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if (bytes.len() as u64) < HEADER_SIZE {
            return Err(VxlError::BadHeader("file shorter than header"));
        }
        let prelude = Prelude::decode(bytes)?;
        let mut header = LogHeader {
            counts: prelude.counts,
            ..LogHeader::default()
        };
        header.load_slots(&prelude, |kind, ordinal| {
            let at = layout::slot_offset(kind, ordinal) as usize;
            Ok(bytes[at..at + SLOT_SIZE].to_vec())
        })?;
        Ok(header)
    }

    /// Brings the tables up to the lengths in `prelude`, fetching each
    /// missing slot through `read_slot`. Also adopts the prelude's counters
    /// where they are ahead of ours.
    pub(crate) fn load_slots<F>(&mut self, prelude: &Prelude, mut read_slot: F) -> Result<()>
    where
        F: FnMut(TableKind, usize) -> Result<Vec<u8>>,
    {
        for kind in TableKind::ALL {
            let table = &mut self.tables[kind.index()];
            for ordinal in table.len()..prelude.table_lens[kind.index()] as usize {
                let slot = read_slot(kind, ordinal)?;
                table.restore(decode_slot(&slot)?)?;
            }
        }
        for (ours, theirs) in self.counts.iter_mut().zip(prelude.counts) {
            *ours = (*ours).max(theirs);
        }
        Ok(())
    }

    pub fn table(&self, kind: TableKind) -> &StringTable {
        &self.tables[kind.index()]
    }

    pub fn table_mut(&mut self, kind: TableKind) -> &mut StringTable {
        &mut self.tables[kind.index()]
    }

    pub fn components(&self) -> &StringTable {
        self.table(TableKind::Components)
    }

    pub fn files(&self) -> &StringTable {
        self.table(TableKind::Files)
    }

    pub fn functions(&self) -> &StringTable {
        self.table(TableKind::Functions)
    }

    pub fn counts(&self) -> &[u32; SEVERITY_COUNT] {
        &self.counts
    }

    pub fn count(&self, severity: Severity) -> u32 {
        self.counts[severity.index()]
    }

    /// Bumps the counter for `severity` and returns its new value.
    pub fn increment(&mut self, severity: Severity) -> u32 {
        let slot = &mut self.counts[severity.index()];
        *slot = slot.wrapping_add(1);
        *slot
    }

    /// Serializes the whole header block, as written when a log is created.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_SIZE as usize];
        out[0..4].copy_from_slice(&MAGIC);
        out[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        for (i, count) in self.counts.iter().enumerate() {
            let at = COUNTS_OFFSET as usize + i * 4;
            out[at..at + 4].copy_from_slice(&count.to_le_bytes());
        }
        for kind in TableKind::ALL {
            let table = self.table(kind);
            let at = layout::table_len_offset(kind) as usize;
            out[at..at + 2].copy_from_slice(&(table.len() as u16).to_le_bytes());
            for (ordinal, text) in table.iter().enumerate() {
                let at = layout::slot_offset(kind, ordinal) as usize;
                encode_slot(text, &mut out[at..at + SLOT_SIZE]);
            }
        }
        out
    }
}

/// Writes `text` into a slot as `[len(2) | bytes]`.
pub(crate) fn encode_slot(text: &str, slot: &mut [u8]) {
    let len = text.len().min(MAX_TABLE_STRING);
    slot[0..2].copy_from_slice(&(len as u16).to_le_bytes());
    slot[2..2 + len].copy_from_slice(&text.as_bytes()[..len]);
}

pub(crate) fn decode_slot(slot: &[u8]) -> Result<String> {
    let len = layout::read_u16(slot, 0) as usize;
    if len > MAX_TABLE_STRING || 2 + len > slot.len() {
        return Err(VxlError::BadHeader("string slot length out of range"));
    }
    Ok(String::from_utf8_lossy(&slot[2..2 + len]).into_owned())
}
