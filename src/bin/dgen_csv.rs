// src/bin/dgen_csv.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line front end: parse options, run generation on a blocking
//! thread, and turn Ctrl-C / SIGTERM into cooperative cancellation.
//! `dgen-csv verify <file>` loads a CSV back and reports its shape.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dgen_csv::constants::*;
use dgen_csv::scheduler::default_worker_count;
use dgen_csv::{
    generate_csv, load_csv, parse_size, CancelToken, GenerationConfig, GenerationError,
    GenerationReport, ParsedCsv,
};

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Parser, Debug)]
#[command(name = "dgen-csv")]
#[command(version, about = "Generate a large random CSV file of at least a given size")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Minimum size of the output file (e.g. 1GiB, 500MB, 1048576)
    #[arg(long, short = 't', env = "DGEN_CSV_TARGET_SIZE", default_value = "1GiB", value_parser = parse_size)]
    target_size: u64,

    /// Extra bytes folded into the row estimate on top of the target
    #[arg(long, env = "DGEN_CSV_BUFFER_SIZE", default_value = "50MiB", value_parser = parse_size)]
    buffer_size: u64,

    /// Number of columns
    #[arg(long, short = 'c', env = "DGEN_CSV_COLUMNS", default_value_t = DEFAULT_COLUMNS)]
    columns: usize,

    /// Worker threads (default: available CPUs minus 2, at least 1)
    #[arg(long, short = 'w', env = "DGEN_CSV_WORKERS")]
    workers: Option<usize>,

    /// Rows per batch
    #[arg(long, short = 'b', env = "DGEN_CSV_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u64,

    /// Estimated characters per field; keep it low to over-generate
    #[arg(long, env = "DGEN_CSV_AVG_FIELD_WIDTH", default_value_t = DEFAULT_AVG_FIELD_WIDTH)]
    avg_field_width: f64,

    /// Multiplier applied to the estimated row count
    #[arg(long, env = "DGEN_CSV_SAFETY_MARGIN", default_value_t = DEFAULT_SAFETY_MARGIN)]
    safety_margin: f64,

    /// Output CSV path
    #[arg(long, short = 'o', env = "DGEN_CSV_OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Base random seed (batch i uses seed + i)
    #[arg(long, env = "DGEN_CSV_SEED", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Decimal places per value
    #[arg(long, env = "DGEN_CSV_PRECISION", default_value_t = DEFAULT_PRECISION)]
    precision: usize,

    /// Flush and fsync every N batches
    #[arg(long, default_value_t = DEFAULT_FLUSH_INTERVAL)]
    flush_interval: u64,

    /// Log progress every N batches
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,

    /// Maximum batches held in memory at once (default: 2 x workers)
    #[arg(long)]
    max_in_flight: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load an existing CSV and report rows, columns and value range
    Verify {
        /// CSV file to read
        path: PathBuf,

        /// Fail unless the file has exactly this many columns
        #[arg(long, short = 'c')]
        columns: Option<usize>,
    },
}

impl Cli {
    fn into_config(self) -> GenerationConfig {
        GenerationConfig {
            target_bytes: self.target_size,
            buffer_bytes: self.buffer_size,
            columns: self.columns,
            batch_size: self.batch_size,
            workers: self.workers.unwrap_or_else(default_worker_count),
            avg_field_width: self.avg_field_width,
            safety_margin: self.safety_margin,
            output: self.output,
            seed: self.seed,
            precision: self.precision,
            flush_interval: self.flush_interval,
            progress_interval: self.progress_interval,
            max_in_flight: self.max_in_flight,
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

/// Resolves on Ctrl-C or (on unix) SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn run(config: GenerationConfig) -> anyhow::Result<GenerationReport> {
    config
        .validate()
        .context("refusing to start with this configuration")?;

    println!(
        "Target size: {:.3} GiB ({} bytes), buffer {:.1} MiB",
        config.target_bytes as f64 / GIB,
        config.target_bytes,
        config.buffer_bytes as f64 / MIB
    );
    println!("Columns: {}, batch size: {} rows", config.columns, config.batch_size);
    println!("Workers: {}", config.workers);
    println!("Output: {}", config.output.display());

    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let output = config.output.clone();
    let mut task =
        tokio::task::spawn_blocking(move || generate_csv(&config, &worker_cancel));

    let result = tokio::select! {
        joined = &mut task => joined,
        _ = shutdown_signal() => {
            eprintln!("\nInterrupted, stopping and removing partial output...");
            cancel.cancel();
            task.await
        }
    };

    let report = result
        .context("generation task panicked")?
        .with_context(|| format!("failed to generate {}", output.display()))?;
    Ok(report)
}

async fn verify(path: PathBuf, expect_columns: Option<usize>) -> anyhow::Result<ParsedCsv> {
    let source = path.clone();
    let parsed = tokio::task::spawn_blocking(move || {
        load_csv(&source, |percent| tracing::info!("Loading: {}%", percent))
    })
    .await
    .context("load task panicked")??;

    if let Some(expected) = expect_columns {
        if parsed.cols != expected {
            anyhow::bail!(
                "{} has {} columns, expected {}",
                path.display(),
                parsed.cols,
                expected
            );
        }
    }
    Ok(parsed)
}

fn print_summary(path: &std::path::Path, csv: &ParsedCsv) {
    println!("File:     {}", path.display());
    println!("Columns:  {}", csv.cols);
    println!("Rows:     {}", csv.rows);
    println!("Values:   {}", csv.data.len());
    if let Some((lo, hi)) = csv.value_range() {
        println!("Range:    [{:.2}, {:.2}]", lo, hi);
    }
    let shown: Vec<&str> = csv.headers.iter().take(8).map(String::as_str).collect();
    let more = if csv.headers.len() > shown.len() { ", ..." } else { "" };
    println!("Headers:  {}{}", shown.join(", "), more);
}

fn print_report(report: &GenerationReport) {
    println!();
    println!("=== Generation complete ===");
    println!("Target size:  {:.6} GiB", report.target_bytes() as f64 / GIB);
    println!("Final size:   {:.6} GiB", report.final_size as f64 / GIB);
    println!("Difference:   {:+.2} MiB", report.delta_bytes() as f64 / MIB);
    if report.padding_bytes > 0 {
        println!("Padding:      {} filler bytes", report.padding_bytes);
    }
    println!("Rows:         {}", report.rows_written);
    println!("Batches:      {}", report.batches_written);
    println!("Elapsed:      {:.2}s", report.elapsed.as_secs_f64());
    println!("Throughput:   {:.2} MiB/s", report.throughput_mib_per_sec());
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let mut cli = Cli::parse();

    let outcome = match cli.command.take() {
        Some(Command::Verify { path, columns }) => verify(path.clone(), columns)
            .await
            .map(|csv| print_summary(&path, &csv)),
        None => run(cli.into_config())
            .await
            .map(|report| print_report(&report)),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<GenerationError>()
                .map(GenerationError::exit_code)
                .unwrap_or(1);
            eprintln!("Error: {:#}", e);
            ExitCode::from(code)
        }
    }
}
