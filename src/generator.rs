// src/generator.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row and batch generation
//!
//! Every batch owns its own Xoshiro256++ stream seeded from `seed_base + index`,
//! so any batch can be regenerated in isolation and workers never share state.

use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::io::Write;
use std::ops::Range;

use crate::config::GenerationConfig;
use crate::constants::*;
use crate::error::{GenerationError, Result};
use crate::estimator::SizeEstimate;

/// Widest formatted field for a given precision: sign, five integer digits,
/// decimal point and fraction (`-10000.00`). `None` if it overflows.
pub fn max_field_width(precision: usize) -> Option<usize> {
    if precision == 0 {
        Some(6)
    } else {
        precision.checked_add(7)
    }
}

/// Widest serialized row: every field at full width plus separators and newline
pub fn max_row_width(columns: usize, precision: usize) -> Option<usize> {
    max_field_width(precision)?
        .checked_add(1)?
        .checked_mul(columns)
}

/// Produces CSV rows of uniformly distributed floats in [FIELD_MIN, FIELD_MAX]
pub struct RowGenerator {
    rng: Xoshiro256PlusPlus,
    columns: usize,
    precision: usize,
}

impl RowGenerator {
    /// Create a generator with its own deterministic stream
    pub fn new(columns: usize, precision: usize, seed: u64) -> Result<Self> {
        if columns == 0 {
            return Err(GenerationError::invalid("column count must be positive"));
        }
        if precision > MAX_PRECISION {
            return Err(GenerationError::invalid(format!(
                "precision must be at most {} decimal places, got {}",
                MAX_PRECISION, precision
            )));
        }
        Ok(Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            columns,
            precision,
        })
    }

    /// Append one newline-terminated row to `out`
    #[inline]
    pub fn write_row(&mut self, out: &mut Vec<u8>) {
        for col in 0..self.columns {
            if col > 0 {
                out.push(SEPARATOR);
            }
            let value: f64 = self.rng.random_range(FIELD_MIN..=FIELD_MAX);
            // Writes into a Vec<u8> cannot fail
            let _ = write!(out, "{:.*}", self.precision, value);
        }
        out.push(b'\n');
    }

    /// Generate one row as an owned buffer
    pub fn next_row(&mut self) -> Vec<u8> {
        let mut row =
            Vec::with_capacity(max_row_width(self.columns, self.precision).unwrap_or(0));
        self.write_row(&mut row);
        row
    }
}

/// Everything a worker needs to produce any batch of a run
#[derive(Debug, Clone, Copy)]
pub struct BatchSpec {
    pub batch_size: u64,
    pub expected_rows: u64,
    pub columns: usize,
    pub precision: usize,
    pub seed_base: u64,
}

impl BatchSpec {
    pub fn new(config: &GenerationConfig, estimate: &SizeEstimate) -> Self {
        Self {
            batch_size: config.batch_size,
            expected_rows: estimate.expected_rows,
            columns: config.columns,
            precision: config.precision,
            seed_base: config.seed,
        }
    }

    /// Rows owned by batch `index`, clamped to `expected_rows`.
    /// Empty once the start offset reaches the end.
    pub fn row_range(&self, index: u64) -> Range<u64> {
        let start = index
            .saturating_mul(self.batch_size)
            .min(self.expected_rows);
        let end = index
            .saturating_add(1)
            .saturating_mul(self.batch_size)
            .min(self.expected_rows);
        start..end
    }

    /// RNG seed for batch `index`
    pub fn seed_for(&self, index: u64) -> u64 {
        self.seed_base.wrapping_add(index)
    }
}

/// A generated, serialized run of rows
#[derive(Debug, Clone)]
pub struct Batch {
    pub index: u64,
    pub rows: Range<u64>,
    pub data: Bytes,
}

impl Batch {
    pub fn row_count(&self) -> u64 {
        self.rows.end - self.rows.start
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Generate batch `index` in full
///
/// Batches at or past `expected_rows` come back empty rather than failing,
/// so scheduling extra indices is harmless.
pub fn produce_batch(spec: &BatchSpec, index: u64) -> Result<Batch> {
    let rows = spec.row_range(index);
    let count = rows.end - rows.start;

    if count == 0 {
        tracing::trace!("Batch {} is past the end ({} rows), empty", index, spec.expected_rows);
        return Ok(Batch {
            index,
            rows,
            data: Bytes::new(),
        });
    }

    let mut generator = RowGenerator::new(spec.columns, spec.precision, spec.seed_for(index))?;

    // Upper bound on the serialized size, so the buffer never reallocates
    let row_bound = max_row_width(spec.columns, spec.precision)
        .and_then(|row| row.checked_mul(usize::try_from(count).ok()?))
        .ok_or_else(|| GenerationError::WorkerFailure {
            batch: index,
            reason: format!(
                "{} rows x {} columns exceeds addressable memory",
                count, spec.columns
            ),
        })?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(row_bound)
        .map_err(|e| GenerationError::WorkerFailure {
            batch: index,
            reason: format!("cannot allocate {} bytes: {}", row_bound, e),
        })?;

    for _ in 0..count {
        generator.write_row(&mut buf);
    }

    tracing::trace!(
        "Batch {}: rows {}..{}, {} bytes",
        index,
        rows.start,
        rows.end,
        buf.len()
    );

    Ok(Batch {
        index,
        rows,
        data: Bytes::from(buf),
    })
}
