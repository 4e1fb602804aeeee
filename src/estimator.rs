// src/estimator.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-count estimation from a byte budget
//!
//! The estimate is biased toward over-generation: the per-field width is a
//! deliberately low guess and the result is inflated by a safety margin.
//! Overshooting costs some extra bytes; undershooting forces the writer to
//! pad with filler, which meets the size but not the content.

use crate::config::GenerationConfig;
use crate::error::{GenerationError, Result};

/// Outcome of sizing a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeEstimate {
    /// Minimum acceptable output size
    pub target_bytes: u64,
    /// Target plus the absolute safety buffer
    pub target_with_buffer: u64,
    /// Estimated bytes per row (fields + separators + newline)
    pub avg_row_size: f64,
    /// Rows to generate across all batches
    pub expected_rows: u64,
    /// `ceil(expected_rows / batch_size)`
    pub total_batches: u64,
}

/// Estimated bytes per row: `width * columns + (columns - 1) separators + newline`
pub fn avg_row_size(avg_field_width: f64, columns: usize) -> f64 {
    avg_field_width * columns as f64 + (columns as f64 - 1.0) + 1.0
}

/// Size a run from its configuration
///
/// # Algorithm
/// 1. `target_with_buffer = target_bytes + buffer_bytes`
/// 2. `avg_row_size = avg_field_width * columns + (columns - 1) + 1`
/// 3. `expected_rows = floor(target_with_buffer / avg_row_size * safety_margin)`
/// 4. `total_batches = ceil(expected_rows / batch_size)`
pub fn estimate(config: &GenerationConfig) -> Result<SizeEstimate> {
    config.validate()?;

    let target_with_buffer = config
        .target_bytes
        .checked_add(config.buffer_bytes)
        .ok_or_else(|| GenerationError::invalid("target size plus buffer overflows 64 bits"))?;

    let row_size = avg_row_size(config.avg_field_width, config.columns);
    let expected_rows =
        (target_with_buffer as f64 / row_size * config.safety_margin).floor() as u64;
    let total_batches = expected_rows.div_ceil(config.batch_size);

    tracing::debug!(
        "Estimate: target={}, with_buffer={}, avg_row_size={:.1}, rows={}, batches={}",
        config.target_bytes,
        target_with_buffer,
        row_size,
        expected_rows,
        total_batches
    );

    Ok(SizeEstimate {
        target_bytes: config.target_bytes,
        target_with_buffer,
        avg_row_size: row_size,
        expected_rows,
        total_batches,
    })
}
