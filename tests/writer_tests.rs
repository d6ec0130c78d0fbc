use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use tempfile::tempdir;
use vxlog::layout::{MAX_MESSAGE_LEN, MAX_RECORD_SIZE, RECORD_FIXED_SIZE, TABLE_CAPACITY};
use vxlog::{
    vxl_error, vxl_info, vxl_log, LogConfig, LogHandle, LogReader, Severity, VxlError, WritePhase,
};

fn new_log(dir: &Path) -> LogHandle {
    LogHandle::create(dir.join("test.vxl"), LogConfig::testing()).unwrap()
}

fn entry_count(path: &Path) -> usize {
    LogReader::open(path).unwrap().len()
}

#[test]
fn test_write_then_rebuild_yields_one_record() {
    let dir = tempdir().unwrap();
    let log = new_log(dir.path());

    for severity in Severity::ALL {
        let before = entry_count(log.path());
        log.write_entry(
            Some("Test"),
            Some("writer_tests.rs"),
            10,
            Some("write"),
            severity,
            format_args!("{} event #{}", severity, severity as u16),
        )
        .unwrap();

        let reader = LogReader::open(log.path()).unwrap();
        assert_eq!(reader.len(), before + 1);
        let entry = reader.entry(before as u32).unwrap();
        assert_eq!(entry.severity, severity);
        assert_eq!(entry.header, format!("{} event #{}", severity, severity as u16));
        assert!(entry.detail.is_none());
        assert_eq!(entry.source_line, 10);
    }
}

#[test]
fn test_message_split_into_header_and_detail() {
    let dir = tempdir().unwrap();
    let log = new_log(dir.path());
    vxl_info!(log, "Split", "A\r\n\r\nB").unwrap();
    vxl_info!(log, "Split", "A\r\n\r\n").unwrap();

    let reader = LogReader::open(log.path()).unwrap();
    let split = reader.entry(0).unwrap();
    assert_eq!(split.header, "A");
    assert_eq!(split.detail.as_deref(), Some("B"));
    assert_eq!(split.message(), "A\r\n\r\nB");

    let trailing = reader.entry(1).unwrap();
    assert_eq!(trailing.header, "A\r\n\r\n");
    assert!(trailing.detail.is_none());
}

#[test]
fn test_split_record_is_three_bytes_shorter() {
    let dir = tempdir().unwrap();
    let log = new_log(dir.path());
    vxl_info!(log, "Split", "head\r\n\r\nbody").unwrap();
    vxl_info!(log, "Split", "next").unwrap();

    let reader = LogReader::open(log.path()).unwrap();
    let offsets: Vec<_> = reader.index().entries().map(|(_, offset)| offset).collect();
    let first_size = (offsets[1] - offsets[0]) as usize;
    assert_eq!(first_size, RECORD_FIXED_SIZE + "head\r\n\r\nbody".len() + 1 - 3);
}

#[test]
fn test_names_are_interned_once() {
    let dir = tempdir().unwrap();
    let log = new_log(dir.path());
    for i in 0..5 {
        log.write_entry(Some("Comp"), Some("a.c"), i, Some("f"), Severity::Debug, format_args!("{}", i))
            .unwrap();
    }
    log.write_entry(None, None, 0, None, Severity::Debug, format_args!("anonymous"))
        .unwrap();

    let reader = LogReader::open(log.path()).unwrap();
    let header = reader.header();
    assert_eq!(header.components().len(), 2);
    assert_eq!(header.files().len(), 2);
    assert_eq!(header.functions().len(), 2);

    let anonymous = reader.entry(5).unwrap();
    assert_eq!(header.components().get(anonymous.component), Some(""));
    assert_eq!(reader.entry(4).unwrap().component, reader.entry(0).unwrap().component);
}

#[test]
fn test_severity_counters_updated() {
    let dir = tempdir().unwrap();
    let log = new_log(dir.path());
    vxl_error!(log, "C", "one").unwrap();
    vxl_error!(log, "C", "two").unwrap();
    vxl_info!(log, "C", "three").unwrap();

    let counts = log.severity_counts();
    assert_eq!(counts[Severity::Error.index()], 2);
    assert_eq!(counts[Severity::Information.index()], 1);

    let reader = LogReader::open(log.path()).unwrap();
    assert_eq!(reader.severity_counts(), &counts);
}

#[test]
fn test_record_size_boundary() {
    let dir = tempdir().unwrap();
    let log = new_log(dir.path());

    let fits = "a".repeat(MAX_MESSAGE_LEN);
    log.write_entry(None, None, 0, None, Severity::Detail, format_args!("{}", fits))
        .unwrap();
    let size_after_max = fs::metadata(log.path()).unwrap().len();

    let reader = LogReader::open(log.path()).unwrap();
    let (_, offset) = reader.index().entries().next().unwrap();
    assert_eq!((size_after_max - offset) as usize, MAX_RECORD_SIZE);

    let too_big = "a".repeat(MAX_MESSAGE_LEN + 1);
    let err = log
        .write_entry(None, None, 0, None, Severity::Detail, format_args!("{}", too_big))
        .unwrap_err();
    assert!(matches!(err, VxlError::RecordTooLarge { size } if size == MAX_RECORD_SIZE + 1));

    assert_eq!(fs::metadata(log.path()).unwrap().len(), size_after_max);
    assert_eq!(entry_count(log.path()), 1);
}

#[test]
fn test_failing_display_leaves_file_unchanged() {
    struct Broken;
    impl fmt::Display for Broken {
        fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    let dir = tempdir().unwrap();
    let log = new_log(dir.path());
    let size = fs::metadata(log.path()).unwrap().len();

    let err = vxl_error!(log, "C", "value: {}", Broken).unwrap_err();
    assert!(matches!(err, VxlError::InvalidFormat));
    assert_eq!(fs::metadata(log.path()).unwrap().len(), size);
    assert!(log.header_snapshot().components().is_empty());
}

#[test]
fn test_panicking_display_is_caught() {
    struct Exploding;
    impl fmt::Display for Exploding {
        fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("bad argument");
        }
    }

    let dir = tempdir().unwrap();
    let log = new_log(dir.path());

    let err = vxl_error!(log, "C", "value: {}", Exploding).unwrap_err();
    assert!(matches!(err, VxlError::Fault(WritePhase::Formatting)));
    assert_eq!(log.severity_counts()[Severity::Error.index()], 0);

    // Handle is still usable
    vxl_error!(log, "C", "after fault").unwrap();
    assert_eq!(entry_count(log.path()), 1);
}

#[test]
fn test_full_component_table_is_resource_exhaustion() {
    let dir = tempdir().unwrap();
    let log = new_log(dir.path());
    for i in 0..TABLE_CAPACITY {
        let name = format!("component{}", i);
        vxl_log!(log, name.as_str(), Severity::Debug, "{}", i).unwrap();
    }
    let size = fs::metadata(log.path()).unwrap().len();

    let err = vxl_log!(log, "one too many", Severity::Debug, "overflow").unwrap_err();
    assert!(matches!(err, VxlError::ResourceExhausted(_)));
    assert_eq!(fs::metadata(log.path()).unwrap().len(), size);

    // Known components still work
    vxl_log!(log, "component0", Severity::Debug, "still fine").unwrap();
    assert_eq!(entry_count(log.path()), TABLE_CAPACITY + 1);
}

#[test]
fn test_concurrent_writers_produce_distinct_records() {
    const THREADS: usize = 16;

    let dir = tempdir().unwrap();
    let log = Arc::new(new_log(dir.path()));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let component = format!("worker{}", t % 4);
                log.write_entry(
                    Some(component.as_str()),
                    Some(file!()),
                    line!(),
                    Some("worker"),
                    Severity::Information,
                    format_args!("thread {} says hello\r\n\r\n{}", t, "x".repeat(t * 100 + 1)),
                )
                .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reader = LogReader::open(log.path()).unwrap();
    assert_eq!(reader.len(), THREADS);
    assert!(reader.corruption().is_none());

    let mut seen: Vec<usize> = reader
        .iter()
        .map(|entry| {
            let t: usize = entry
                .header
                .strip_prefix("thread ")
                .and_then(|rest| rest.strip_suffix(" says hello"))
                .unwrap()
                .parse()
                .unwrap();
            assert_eq!(entry.detail.as_deref(), Some("x".repeat(t * 100 + 1).as_str()));
            let component = reader.header().components().get(entry.component).unwrap();
            assert_eq!(component, format!("worker{}", t % 4));
            t
        })
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..THREADS).collect::<Vec<_>>());
}

#[test]
fn test_per_thread_order_preserved_under_contention() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 200;

    let dir = tempdir().unwrap();
    let log = Arc::new(new_log(dir.path()));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    log.write_entry(None, None, i, None, Severity::Debug, format_args!("{}:{}", t, i))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reader = LogReader::open(log.path()).unwrap();
    assert_eq!(reader.len(), (THREADS * PER_THREAD) as usize);

    let mut last = vec![None; THREADS as usize];
    let mut previous_ordinal = None;
    for entry in reader.iter() {
        if let Some(prev) = previous_ordinal {
            assert!(entry.ordinal > prev, "Ordinals must increase in append order");
        }
        previous_ordinal = Some(entry.ordinal);

        let (t, i) = entry.header.split_once(':').unwrap();
        let (t, i): (usize, u32) = (t.parse().unwrap(), i.parse().unwrap());
        assert_eq!(entry.source_line, i);
        if let Some(prev) = last[t] {
            assert!(i > prev, "Records of one thread must keep their order");
        }
        last[t] = Some(i);
    }
    assert_eq!(log.severity_counts()[Severity::Debug.index()], THREADS * PER_THREAD);
}

#[test]
fn test_reopened_handle_appends_after_existing_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reopen.vxl");
    {
        let log = LogHandle::create(&path, LogConfig::testing()).unwrap();
        vxl_info!(log, "First", "before close").unwrap();
        log.close().unwrap();
    }

    let log = LogHandle::open(&path, LogConfig::testing()).unwrap();
    vxl_info!(log, "Second", "after reopen").unwrap();
    vxl_info!(log, "First", "again").unwrap();

    let reader = LogReader::open(&path).unwrap();
    assert_eq!(reader.len(), 3);
    assert_eq!(reader.entry(0).unwrap().header, "before close");
    assert_eq!(reader.entry(1).unwrap().header, "after reopen");
    assert_eq!(reader.entry(2).unwrap().component, reader.entry(0).unwrap().component);
    assert_eq!(reader.header().count(Severity::Information), 3);
}

#[test]
fn test_writer_identified_by_process_and_thread() {
    let dir = tempdir().unwrap();
    let log = Arc::new(new_log(dir.path()));
    vxl_info!(log, "C", "main").unwrap();
    let worker = {
        let log = Arc::clone(&log);
        thread::spawn(move || vxl_info!(log, "C", "worker").unwrap())
    };
    worker.join().unwrap();
    vxl_info!(log, "C", "main again").unwrap();

    let reader = LogReader::open(log.path()).unwrap();
    let entries: Vec<_> = reader.iter().collect();
    assert!(entries.iter().all(|e| e.process_id == std::process::id()));
    assert!(entries.iter().all(|e| e.thread_id != 0));
    assert_eq!(entries[0].thread_id, entries[2].thread_id);
    assert_ne!(entries[0].thread_id, entries[1].thread_id);
}
