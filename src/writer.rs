// src/writer.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequential CSV writer and post-run size reconciliation
//!
//! The writer is the only owner of the output file. Batches are appended
//! whole and in order; nothing is ever truncated. If the finished file is
//! still under target, it is padded with filler bytes.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::GenerationConfig;
use crate::constants::{PAD_BYTE, PAD_CHUNK_SIZE, WRITE_BUFFER_SIZE};
use crate::error::{GenerationError, Result};
use crate::generator::Batch;
use crate::scheduler::CancelToken;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Running totals for one run, updated once per appended batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteState {
    /// Header plus every appended batch
    pub bytes_written: u64,
    pub rows_written: u64,
    pub batches_written: u64,
    /// Set once `bytes_written` first reaches the (unbuffered) target
    pub target_reached: bool,
}

/// Result of comparing the finished file against the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    /// Size on disk before any padding
    pub generated_size: u64,
    /// Filler bytes appended to reach the target
    pub padding_bytes: u64,
    /// Size on disk after padding
    pub final_size: u64,
}

/// Owns the output file for the duration of a run
pub struct CsvWriter {
    path: PathBuf,
    out: BufWriter<File>,
    state: WriteState,
    target_bytes: u64,
    total_batches: u64,
    flush_interval: u64,
    progress_interval: u64,
    started: Instant,
}

impl CsvWriter {
    /// Replace any existing file at `config.output` and write the header row.
    pub fn create(config: &GenerationConfig, total_batches: u64) -> Result<Self> {
        let path = config.output.clone();

        match fs::remove_file(&path) {
            Ok(()) => tracing::info!("Removed existing output {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = File::create(&path)?;
        let mut out = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        let header = config.header();
        out.write_all(&header)?;

        let mut state = WriteState {
            bytes_written: header.len() as u64,
            ..Default::default()
        };
        state.target_reached = state.bytes_written >= config.target_bytes;

        tracing::debug!(
            "Opened {} ({} byte header, target {} bytes)",
            path.display(),
            header.len(),
            config.target_bytes
        );

        Ok(Self {
            path,
            out,
            state,
            target_bytes: config.target_bytes,
            total_batches,
            flush_interval: config.flush_interval.max(1),
            progress_interval: config.progress_interval.max(1),
            started: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &WriteState {
        &self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Append one batch in full. Must be called in batch-index order.
    pub fn append(&mut self, batch: &Batch) -> Result<()> {
        debug_assert_eq!(batch.index, self.state.batches_written);

        self.out.write_all(&batch.data)?;
        self.state.bytes_written += batch.len() as u64;
        self.state.rows_written += batch.row_count();
        self.state.batches_written += 1;

        let crossed = !self.state.target_reached && self.state.bytes_written >= self.target_bytes;
        if crossed {
            self.state.target_reached = true;
            tracing::info!(
                "Target size reached at batch {}; writing remaining {} scheduled batches",
                batch.index,
                self.total_batches.saturating_sub(self.state.batches_written)
            );
        }

        let is_last = self.state.batches_written == self.total_batches;
        if crossed || is_last || batch.index % self.progress_interval == 0 {
            self.log_progress();
        }

        if self.state.batches_written % self.flush_interval == 0 {
            self.out.flush()?;
            self.out.get_ref().sync_data()?;
            tracing::trace!("Flushed after {} batches", self.state.batches_written);
        }

        Ok(())
    }

    fn log_progress(&self) {
        let progress =
            (self.state.bytes_written as f64 / self.target_bytes as f64 * 100.0).min(100.0);
        let elapsed = self.started.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            self.state.bytes_written as f64 / elapsed / MIB
        } else {
            0.0
        };
        tracing::info!(
            "Progress: {:.1}% | size: {:.3} GiB | rows: {} | speed: {:.2} MiB/s",
            progress,
            self.state.bytes_written as f64 / GIB,
            self.state.rows_written,
            speed
        );
    }

    /// Make everything durable, then pad with filler if the file is under target.
    ///
    /// `cancel` is checked between padding chunks and once more before the
    /// result is returned; a cancelled run gets [`GenerationError::Cancelled`]
    /// and the caller is expected to discard the file.
    pub fn finish(&mut self, cancel: &CancelToken) -> Result<Reconciliation> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;

        let generated_size = self.out.get_ref().metadata()?.len();
        if generated_size != self.state.bytes_written {
            tracing::warn!(
                "On-disk size {} differs from accounted {} bytes",
                generated_size,
                self.state.bytes_written
            );
        }

        let padding_bytes = self.target_bytes.saturating_sub(generated_size);
        if padding_bytes > 0 {
            tracing::warn!(
                "Output is {} bytes short of the {} byte target, padding with filler",
                padding_bytes,
                self.target_bytes
            );
            let chunk = vec![PAD_BYTE; PAD_CHUNK_SIZE.min(padding_bytes as usize)];
            let mut remaining = padding_bytes;
            while remaining > 0 {
                if cancel.is_cancelled() {
                    return Err(GenerationError::Cancelled);
                }
                let n = remaining.min(chunk.len() as u64) as usize;
                self.out.write_all(&chunk[..n])?;
                remaining -= n as u64;
            }
            self.out.flush()?;
            self.out.get_ref().sync_all()?;
        } else {
            tracing::info!(
                "Output meets the target: {} bytes ({} over)",
                generated_size,
                generated_size - self.target_bytes
            );
        }

        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let final_size = self.out.get_ref().metadata()?.len();
        if final_size < self.target_bytes {
            return Err(GenerationError::SizeShortfall {
                final_size,
                target: self.target_bytes,
            });
        }

        Ok(Reconciliation {
            generated_size,
            padding_bytes,
            final_size,
        })
    }

    /// Close and delete the partial output.
    pub fn discard(self) -> Result<()> {
        let CsvWriter { path, out, .. } = self;
        // Buffered bytes are going away with the file
        drop(out.into_parts());
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Removed partial output {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
