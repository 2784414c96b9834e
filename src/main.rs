//! ProtoForge CLI
//!
//! Usage:
//!   protoforge [OPTIONS] [ROOTS]...
//!
//! Options:
//!   -o, --out <DIR>      Output root for generated files
//!   -c, --config <FILE>  Generator configuration (TOML format)
//!   -f, --force          Discard the round-completion marker first
//!   -n, --dry-run        Resolve and generate without writing files
//!   -h, --help           Print help

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use protoforge::host::MemoryOutputSink;
use protoforge::{
    generate_from_roots, run_round, EnrichmentPipeline, FsSourceProvider, GeneratorConfig,
    RoundReport,
};

#[derive(Parser)]
#[command(name = "protoforge")]
#[command(about = "Source-to-source generator for annotated declarations")]
struct Cli {
    /// Source root directories to scan (defaults to the current directory)
    roots: Vec<PathBuf>,

    /// Output root for generated files
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Generator configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Discard the round-completion marker before running
    #[arg(short, long)]
    force: bool,

    /// Resolve and generate without writing any files
    #[arg(short = 'n', long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "protoforge=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match GeneratorConfig::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error loading config '{}': {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => GeneratorConfig::default(),
    };
    if let Some(out) = &cli.out {
        config.output_root = out.clone();
    }

    let roots = if cli.roots.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.roots.clone()
    };

    if cli.force {
        let marker = config.marker_path();
        if marker.exists() {
            if let Err(err) = fs::remove_file(&marker) {
                eprintln!("Error removing marker '{}': {}", marker.display(), err);
                return ExitCode::FAILURE;
            }
        }
    }

    let report = if cli.dry_run {
        let provider = FsSourceProvider::new(roots, config.extension.clone());
        let mut sink = MemoryOutputSink::new();
        let report = run_round(&provider, &mut sink, &EnrichmentPipeline::standard(), &config);
        // A dry run leaves no completion marker behind
        if !report.skipped {
            let _ = fs::remove_file(config.marker_path());
        }
        for (name, _) in &sink.written {
            println!("would generate {}", name);
        }
        report
    } else {
        generate_from_roots(roots, &config)
    };

    print_summary(&report);
    ExitCode::SUCCESS
}

fn print_summary(report: &RoundReport) {
    if report.skipped {
        eprintln!("Nothing to do: round already complete");
        return;
    }
    eprintln!(
        "Generated {} artifact(s) ({} to explicit paths, {} through the output root)",
        report.emitted,
        report.written.len(),
        report.delegated.len()
    );
    for name in &report.unresolved_templates {
        eprintln!("warning: template not processed: {}", name);
    }
    for failure in &report.failures {
        eprintln!("warning: {}", failure);
    }
}
