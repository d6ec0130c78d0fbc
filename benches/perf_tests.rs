use criterion::{black_box, criterion_group, criterion_main, Criterion};
use log::{info, LevelFilter};
use log4rs::{
    append::file::FileAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};
use std::sync::{Arc, Once};
use std::thread;
use tempfile::tempdir;
use vxlog::{evaluate, vxl_info, FilterSpec, LogConfig, LogHandle, LogReader, Severity, TextFilter};

const ITERATIONS: usize = 10_000;
const THREADS: usize = 4;

static LOGGER_INIT: Once = Once::new();

#[derive(Debug)]
struct TestEvent {
    id: i32,
    active: bool,
    data: [u8; 16],
    description: &'static str,
}

impl std::fmt::Display for TestEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Event[id={}, active={}, data={:?}]\r\n\r\n{}",
            self.id, self.active, self.data, self.description
        )
    }
}

const EVENT: TestEvent = TestEvent {
    id: 42,
    active: true,
    data: [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
    description: "Longer detail text with some context about the event. \
                  CPU: 95%, Memory: 2.5GB, Network: 1.2Gbps",
};

fn setup_log4rs(log_file: &str) {
    LOGGER_INIT.call_once(|| {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} - {m}{n}")))
            .append(true)
            .build(log_file)
            .unwrap();

        let config = Config::builder()
            .appender(Appender::builder().build("logfile", Box::new(logfile)))
            .build(Root::builder().appender("logfile").build(LevelFilter::Info))
            .unwrap();

        log4rs::init_config(config).unwrap();
    });
}

fn bench_write_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("Write Path");
    group.sample_size(10);

    let dir = tempdir().unwrap();
    let log = Arc::new(LogHandle::create(dir.path().join("bench.vxl"), LogConfig::testing()).unwrap());

    group.bench_function("vxlog_single_thread", |b| {
        b.iter(|| {
            for i in 0..ITERATIONS {
                vxl_info!(log, "Bench", "iteration={}, event={}", i, EVENT).unwrap();
            }
        })
    });

    group.bench_function("vxlog_contended", |b| {
        b.iter(|| {
            let workers: Vec<_> = (0..THREADS)
                .map(|t| {
                    let log = Arc::clone(&log);
                    thread::spawn(move || {
                        for i in 0..ITERATIONS / THREADS {
                            vxl_info!(log, "Bench", "thread={} iteration={}", t, i).unwrap();
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
        })
    });

    let text_log = dir.path().join("traditional.log");
    setup_log4rs(text_log.to_str().unwrap());
    group.bench_function("log4rs_text_file", |b| {
        b.iter(|| {
            for i in 0..ITERATIONS {
                info!("iteration={}, event={}", i, EVENT);
            }
        })
    });

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("filter.vxl");
    let log = LogHandle::create(&path, LogConfig::testing()).unwrap();
    for i in 0..ITERATIONS {
        let severity = Severity::ALL[i % Severity::ALL.len()];
        let component = ["Loader", "Hooks", "KexDll"][i % 3];
        log.write_entry(
            Some(component),
            Some(file!()),
            line!(),
            Some("bench_filter"),
            severity,
            format_args!("operation {} finished\r\n\r\n{}", i, EVENT),
        )
        .unwrap();
    }
    let reader = LogReader::open(&path).unwrap();
    let components = reader.header().components().len();

    let mut group = c.benchmark_group("Filter");
    group.bench_function("severity_only", |b| {
        let mut spec = FilterSpec::all(components);
        spec.severities[Severity::Debug.index()] = false;
        b.iter(|| black_box(evaluate(&reader, &spec)))
    });
    group.bench_function("wildcard_whole_text", |b| {
        let mut spec = FilterSpec::all(components);
        spec.text = TextFilter::wildcard("operation 1*memory*");
        spec.text.whole_text = true;
        b.iter(|| black_box(evaluate(&reader, &spec)))
    });
    group.finish();
}

criterion_group!(benches, bench_write_path, bench_filter);
criterion_main!(benches);
