use std::collections::HashMap;

use crate::error::{Result, VxlError};
use crate::layout::{MAX_TABLE_STRING, TABLE_CAPACITY};

/// Deduplicating, append-only table of strings.
///
/// Each distinct string gets the ordinal of its insertion position. Ordinals
/// are stable forever: the table never shrinks and never reorders, so an
/// index stored in an old record always resolves to the same text.
///
/// Comparison is exact and case-sensitive.
///
/// A table is not synchronized on its own. The log header owns three of
/// them and only touches them while the log's exclusive lock is held.
///
/// # Examples
///
/// ```
/// # use vxlog::StringTable;
/// let mut table = StringTable::new();
///
/// let a = table.find_or_create("kernel32").unwrap();
/// let b = table.find_or_create("ntdll").unwrap();
/// assert_ne!(a, b);
///
/// // Same text, same ordinal
/// assert_eq!(table.find_or_create("kernel32").unwrap(), a);
/// assert_eq!(table.get(b), Some("ntdll"));
/// ```
#[derive(Debug, Clone)]
pub struct StringTable {
    strings: Vec<String>,
    lookup: HashMap<String, u16>,
    capacity: usize,
    max_len: usize,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    /// Creates an empty table sized to fit a header slot region.
    pub fn new() -> Self {
        Self::with_limits(TABLE_CAPACITY, MAX_TABLE_STRING)
    }

    /// Creates an empty table holding at most `capacity` strings of at most
    /// `max_len` bytes each.
    pub fn with_limits(capacity: usize, max_len: usize) -> Self {
        Self {
            strings: Vec::new(),
            lookup: HashMap::new(),
            capacity: capacity.min(u16::MAX as usize + 1),
            max_len,
        }
    }

    /// Returns the ordinal of `text`, inserting it first if it is new.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` if the table is full, `text` is longer than a
    /// slot, or memory for the new entry cannot be reserved. The table is
    /// unchanged in every error case.
    pub fn find_or_create(&mut self, text: &str) -> Result<u16> {
        // Fast path: already interned
        if let Some(&ordinal) = self.lookup.get(text) {
            return Ok(ordinal);
        }

        if text.len() > self.max_len {
            return Err(VxlError::ResourceExhausted("string longer than a table slot"));
        }
        if self.strings.len() >= self.capacity {
            return Err(VxlError::ResourceExhausted("string table full"));
        }

        // Slow path: reserve everything up front so a failure leaves no trace
        let stored = try_clone(text)?;
        let key = try_clone(text)?;
        self.strings
            .try_reserve(1)
            .map_err(|_| VxlError::ResourceExhausted("string table growth failed"))?;
        self.lookup
            .try_reserve(1)
            .map_err(|_| VxlError::ResourceExhausted("string table growth failed"))?;

        let ordinal = self.strings.len() as u16;
        self.strings.push(stored);
        self.lookup.insert(key, ordinal);
        Ok(ordinal)
    }

    /// Appends a string read back from disk at the next ordinal.
    ///
    /// Unlike [`find_or_create`](Self::find_or_create) this does not
    /// deduplicate: two processes racing on the same file can both persist
    /// the same text, and both slots must keep their ordinals. Lookups
    /// resolve to the first one.
    pub(crate) fn restore(&mut self, text: String) -> Result<u16> {
        if self.strings.len() >= self.capacity {
            return Err(VxlError::ResourceExhausted("string table full"));
        }
        let ordinal = self.strings.len() as u16;
        if !self.lookup.contains_key(text.as_str()) {
            self.lookup.insert(text.clone(), ordinal);
        }
        self.strings.push(text);
        Ok(ordinal)
    }

    /// Drops every string from ordinal `len` on.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.strings.len() {
            return;
        }
        self.strings.truncate(len);
        self.lookup.retain(|_, ordinal| (*ordinal as usize) < len);
    }

    /// Looks up the text stored at `ordinal`.
    pub fn get(&self, ordinal: u16) -> Option<&str> {
        self.strings.get(ordinal as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterates strings in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

fn try_clone(text: &str) -> Result<String> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(text.len())
        .map_err(|_| VxlError::ResourceExhausted("string allocation failed"))?;
    owned.push_str(text);
    Ok(owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_follow_insertion_order() {
        let mut table = StringTable::new();
        assert_eq!(table.find_or_create("").unwrap(), 0);
        assert_eq!(table.find_or_create("a").unwrap(), 1);
        assert_eq!(table.find_or_create("b").unwrap(), 2);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_full_table_rejects_new_but_finds_old() {
        let mut table = StringTable::with_limits(2, 16);
        table.find_or_create("x").unwrap();
        table.find_or_create("y").unwrap();
        assert!(matches!(
            table.find_or_create("z"),
            Err(VxlError::ResourceExhausted(_))
        ));
        assert_eq!(table.find_or_create("y").unwrap(), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_overlong_string_rejected() {
        let mut table = StringTable::with_limits(8, 4);
        assert!(table.find_or_create("12345").is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_restore_keeps_duplicate_slots() {
        let mut table = StringTable::new();
        table.restore("dup".to_string()).unwrap();
        table.restore("dup".to_string()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1), Some("dup"));
        assert_eq!(table.find_or_create("dup").unwrap(), 0);
    }

    #[test]
    fn test_truncate_forgets_dropped_strings() {
        let mut table = StringTable::new();
        table.find_or_create("kept").unwrap();
        table.find_or_create("dropped").unwrap();
        table.truncate(1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(1), None);
        assert_eq!(table.find_or_create("dropped").unwrap(), 1);
        assert_eq!(table.find_or_create("kept").unwrap(), 0);
    }
}
