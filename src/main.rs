use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use vxlog::{export_line, export_text, telemetry, FilterSpec, LogConfig, LogView, Severity};

#[derive(Parser, Debug)]
#[command(name = "vxlog", about = "Print the entries of a vxlog file through the query engine")]
struct Cli {
    /// Log file to read
    path: PathBuf,
    /// Only show these severities (comma separated, e.g. error,warning)
    #[arg(long, value_delimiter = ',')]
    severity: Option<Vec<Severity>>,
    /// Only show these components (comma separated)
    #[arg(long, value_delimiter = ',')]
    component: Option<Vec<String>>,
    /// Text to search for
    #[arg(long, default_value = "")]
    search: String,
    /// Treat `*` and `?` in the search text as wildcards
    #[arg(long)]
    wildcard: bool,
    /// Match case
    #[arg(long = "case")]
    case_sensitive: bool,
    /// Require the whole text to match
    #[arg(long)]
    exact: bool,
    /// Show entries that do not match the search
    #[arg(long = "invert")]
    inverted: bool,
    /// Search detail text as well as the header
    #[arg(long = "whole")]
    whole_text: bool,
    /// Print detail text
    #[arg(long)]
    detail: bool,
    /// Prefix each entry with severity, time and source location
    #[arg(long)]
    long: bool,
}

fn build_filter(cli: &Cli, view: &LogView) -> FilterSpec {
    let names = view.component_names();
    let mut spec = FilterSpec::all(names.len());

    if let Some(levels) = &cli.severity {
        for severity in Severity::ALL {
            spec.severities[severity.index()] = levels.contains(&severity);
        }
    }
    if let Some(wanted) = &cli.component {
        for (checked, name) in spec.components.iter_mut().zip(&names) {
            *checked = wanted.iter().any(|w| w.trim() == *name);
        }
    }

    spec.text.term = cli.search.clone();
    spec.text.wildcard = cli.wildcard;
    spec.text.case_sensitive = cli.case_sensitive;
    spec.text.exact = cli.exact;
    spec.text.inverted = cli.inverted;
    spec.text.whole_text = cli.whole_text;
    spec
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = LogConfig::from_env();
    if let Err(err) = telemetry::init(&config.diagnostics) {
        eprintln!("vxlog: diagnostics disabled: {}", err);
    }

    let mut view = match LogView::open(&cli.path, &config) {
        Ok(view) => view,
        Err(err) => {
            eprintln!("vxlog: {}: {}", cli.path.display(), err);
            return ExitCode::FAILURE;
        }
    };
    if let Some(offset) = view.reader().corruption() {
        eprintln!("vxlog: warning: stopped at corrupt record at offset {}", offset);
    }

    let spec = build_filter(&cli, &view);
    view.set_filter(spec);

    for row in 0..view.row_count() {
        let Some(entry) = view.row(row) else { continue };
        if cli.long {
            println!("{}", export_line(&entry, cli.detail));
        } else {
            println!("{}", export_text(&entry, cli.detail));
        }
    }

    let counts = view.reader().severity_counts();
    let summary: Vec<String> = Severity::ALL
        .iter()
        .map(|s| format!("{}={}", s, counts[s.index()]))
        .collect();
    eprintln!("{} of {} entries shown ({})", view.row_count(), view.reader().len(), summary.join(" "));
    ExitCode::SUCCESS
}
