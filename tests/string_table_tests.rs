use vxlog::{StringTable, VxlError};

static UNICODE_STR: &str = "Hello, 世界! 🌍";

#[test]
fn test_find_or_create_is_idempotent() {
    let mut table = StringTable::new();
    let id1 = table.find_or_create("KexDll").unwrap();
    let id2 = table.find_or_create("KexDll").unwrap();
    assert_eq!(id1, id2, "Same string should get same ordinal");
    assert_eq!(table.len(), 1);
}

#[test]
fn test_distinct_strings_get_distinct_ordinals() {
    static STRINGS: [&str; 3] = ["First", "Second", "Third"];
    let mut table = StringTable::new();
    let ids: Vec<_> = STRINGS.iter().map(|s| table.find_or_create(s).unwrap()).collect();

    for i in 0..ids.len() {
        for j in i + 1..ids.len() {
            assert_ne!(ids[i], ids[j], "Different strings should get different ordinals");
        }
    }
    for (s, id) in STRINGS.iter().zip(ids.iter()) {
        assert_eq!(table.get(*id).unwrap(), *s);
    }
}

#[test]
fn test_earlier_ordinals_survive_later_insertions() {
    let mut table = StringTable::new();
    let first = table.find_or_create("kexhe.c").unwrap();
    for i in 0..50 {
        table.find_or_create(&format!("file{}.c", i)).unwrap();
    }
    assert_eq!(table.get(first), Some("kexhe.c"));
    assert_eq!(table.find_or_create("kexhe.c").unwrap(), first);
}

#[test]
fn test_comparison_is_case_sensitive() {
    let mut table = StringTable::new();
    let lower = table.find_or_create("ntdll").unwrap();
    let upper = table.find_or_create("NTDLL").unwrap();
    assert_ne!(lower, upper);
}

#[test]
fn test_empty_string() {
    let mut table = StringTable::new();
    let id = table.find_or_create("").unwrap();
    assert_eq!(table.get(id).unwrap(), "");
}

#[test]
fn test_unicode_string() {
    let mut table = StringTable::new();
    let id = table.find_or_create(UNICODE_STR).unwrap();
    assert_eq!(table.get(id).unwrap(), UNICODE_STR);
}

#[test]
fn test_invalid_ordinal() {
    let table = StringTable::new();
    assert!(table.get(u16::MAX).is_none(), "Unknown ordinal should return None");
}

#[test]
fn test_capacity_exhaustion() {
    let mut table = StringTable::with_limits(100, 64);
    for i in 0..100 {
        table.find_or_create(&format!("String {}", i)).unwrap();
    }
    let err = table.find_or_create("String 100").unwrap_err();
    assert!(matches!(err, VxlError::ResourceExhausted(_)));

    // Existing entries remain reachable
    assert_eq!(table.find_or_create("String 42").unwrap(), 42);
    assert_eq!(table.iter().count(), 100);
}
