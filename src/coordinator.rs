// src/coordinator.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One generation run: estimate, schedule, write, reconcile
//!
//! The coordinator is the only code that removes the output file. Any failure
//! after the file is created (worker failure, cancellation, IO error) deletes
//! the partial output before the error is returned.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::GenerationConfig;
use crate::error::{GenerationError, Result};
use crate::estimator::{self, SizeEstimate};
use crate::generator::{produce_batch, Batch, BatchSpec};
use crate::scheduler::{BatchScheduler, CancelToken};
use crate::writer::CsvWriter;

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub output: PathBuf,
    pub estimate: SizeEstimate,
    pub workers: usize,
    /// Size before padding
    pub generated_size: u64,
    /// Filler bytes appended to reach the target
    pub padding_bytes: u64,
    pub final_size: u64,
    pub rows_written: u64,
    pub batches_written: u64,
    pub target_reached: bool,
    pub elapsed: Duration,
}

impl GenerationReport {
    pub fn target_bytes(&self) -> u64 {
        self.estimate.target_bytes
    }

    /// Final size minus target; positive when over-generated
    pub fn delta_bytes(&self) -> i64 {
        self.final_size as i64 - self.estimate.target_bytes as i64
    }

    /// Average write throughput over the whole run
    pub fn throughput_mib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.final_size as f64 / (1024.0 * 1024.0) / secs
        } else {
            0.0
        }
    }
}

/// Generate the CSV described by `config`
///
/// # Example
/// ```rust,no_run
/// use dgen_csv::{generate_csv, CancelToken, GenerationConfig};
///
/// let config = GenerationConfig {
///     target_bytes: 64 * 1024 * 1024,
///     columns: 8,
///     output: "synthetic.csv".into(),
///     ..Default::default()
/// };
/// let report = generate_csv(&config, &CancelToken::new()).unwrap();
/// assert!(report.final_size >= config.target_bytes);
/// ```
pub fn generate_csv(config: &GenerationConfig, cancel: &CancelToken) -> Result<GenerationReport> {
    generate_csv_with(config, cancel, produce_batch)
}

/// Same as [`generate_csv`] with a caller-supplied batch producer
///
/// The producer must be deterministic per index and must not touch the
/// output file.
pub fn generate_csv_with<F>(
    config: &GenerationConfig,
    cancel: &CancelToken,
    produce: F,
) -> Result<GenerationReport>
where
    F: Fn(&BatchSpec, u64) -> Result<Batch> + Sync,
{
    let started = Instant::now();
    let estimate = estimator::estimate(config)?;

    tracing::info!(
        "Target: {} bytes ({} with buffer), {} columns, ~{:.0} bytes/row",
        estimate.target_bytes,
        estimate.target_with_buffer,
        config.columns,
        estimate.avg_row_size
    );
    tracing::info!(
        "Planned: {} rows in {} batches of {}, {} workers",
        estimate.expected_rows,
        estimate.total_batches,
        config.batch_size,
        config.workers
    );

    let scheduler = BatchScheduler::new(config.workers, config.in_flight_limit())?;
    let spec = BatchSpec::new(config, &estimate);

    if cancel.is_cancelled() {
        return Err(GenerationError::Cancelled);
    }

    let mut writer = CsvWriter::create(config, estimate.total_batches)?;

    let outcome = scheduler.run(
        estimate.total_batches,
        cancel,
        |index| produce(&spec, index),
        |batch| writer.append(&batch),
    );

    let outcome = match outcome {
        Ok(_) if cancel.is_cancelled() => Err(GenerationError::Cancelled),
        other => other,
    };
    if let Err(e) = outcome {
        tracing::error!("Generation aborted: {}", e);
        discard(writer);
        return Err(e);
    }

    let reconciliation = match writer.finish(cancel) {
        Ok(rec) => rec,
        Err(e @ GenerationError::SizeShortfall { .. }) if !cancel.is_cancelled() => return Err(e),
        Err(e) => {
            discard(writer);
            return Err(e);
        }
    };

    // A signal that lands after the last sync still aborts the run
    if cancel.is_cancelled() {
        tracing::error!("Generation aborted: {}", GenerationError::Cancelled);
        discard(writer);
        return Err(GenerationError::Cancelled);
    }

    let state = *writer.state();
    let report = GenerationReport {
        output: writer.path().to_path_buf(),
        estimate,
        workers: scheduler.workers(),
        generated_size: reconciliation.generated_size,
        padding_bytes: reconciliation.padding_bytes,
        final_size: reconciliation.final_size,
        rows_written: state.rows_written,
        batches_written: state.batches_written,
        target_reached: state.target_reached,
        elapsed: started.elapsed(),
    };

    tracing::info!(
        "Done: {} bytes ({:+} vs target), {} rows in {:.2}s ({:.2} MiB/s)",
        report.final_size,
        report.delta_bytes(),
        report.rows_written,
        report.elapsed.as_secs_f64(),
        report.throughput_mib_per_sec()
    );

    Ok(report)
}

fn discard(writer: CsvWriter) {
    let path = writer.path().to_path_buf();
    if let Err(e) = writer.discard() {
        tracing::warn!("Failed to remove partial output {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn init_tracing() {
        use tracing_subscriber::{fmt, EnvFilter};
        let _ = fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    #[test]
    fn test_small_run() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let config = GenerationConfig {
            target_bytes: 64 * 1024,
            buffer_bytes: 0,
            columns: 3,
            batch_size: 50,
            workers: 2,
            safety_margin: 1.0,
            output: dir.path().join("small.csv"),
            ..Default::default()
        };

        let report = generate_csv(&config, &CancelToken::new()).unwrap();
        assert!(report.final_size >= config.target_bytes);
        assert_eq!(report.padding_bytes, 0);
        assert!(report.target_reached);
        assert_eq!(report.rows_written, report.estimate.expected_rows);
        assert_eq!(report.batches_written, report.estimate.total_batches);
        assert!(report.delta_bytes() >= 0);
        assert_eq!(
            fs::metadata(&config.output).unwrap().len(),
            report.final_size
        );
    }

    #[test]
    fn test_invalid_config_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerationConfig {
            columns: 0,
            workers: 1,
            output: dir.path().join("never.csv"),
            ..Default::default()
        };
        let err = generate_csv(&config, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidConfiguration(_)));
        assert!(!config.output.exists());
    }

    #[test]
    fn test_pre_cancelled_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerationConfig {
            target_bytes: 1024,
            workers: 1,
            output: dir.path().join("never.csv"),
            ..Default::default()
        };
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = generate_csv(&config, &cancel).unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
        assert!(!config.output.exists());
    }

    #[test]
    fn test_cancel_after_last_batch_discards_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerationConfig {
            target_bytes: 4096,
            buffer_bytes: 0,
            columns: 2,
            batch_size: 10,
            workers: 2,
            output: dir.path().join("late.csv"),
            ..Default::default()
        };
        let cancel = CancelToken::new();
        let total = estimator::estimate(&config).unwrap().total_batches;

        // Signal arrives while the final batch is being produced
        let err = generate_csv_with(&config, &cancel, |spec, index| {
            let batch = produce_batch(spec, index);
            if index + 1 == total {
                cancel.cancel();
            }
            batch
        })
        .unwrap_err();

        assert!(matches!(err, GenerationError::Cancelled));
        assert!(!config.output.exists());
    }

    #[test]
    fn test_undershooting_producer_is_padded() {
        let dir = tempfile::tempdir().unwrap();
        let config = GenerationConfig {
            target_bytes: 10_000,
            buffer_bytes: 0,
            columns: 1,
            batch_size: 10,
            workers: 2,
            safety_margin: 1.0,
            output: dir.path().join("short.csv"),
            ..Default::default()
        };

        // One tiny row per batch: far below the estimate
        let report = generate_csv_with(&config, &CancelToken::new(), |spec, index| {
            let rows = spec.row_range(index);
            Ok(Batch {
                index,
                rows,
                data: bytes::Bytes::from_static(b"0\n"),
            })
        })
        .unwrap();

        assert!(report.padding_bytes > 0);
        assert_eq!(report.final_size, config.target_bytes);
        assert_eq!(report.delta_bytes(), 0);
    }
}
