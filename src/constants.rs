// src/constants.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Default minimum output size (1 GiB)
pub const DEFAULT_TARGET_BYTES: u64 = 1024 * 1024 * 1024;

/// Extra bytes folded into the row estimate on top of the target (50 MiB)
pub const DEFAULT_BUFFER_BYTES: u64 = 50 * 1024 * 1024;

/// Default number of CSV columns
pub const DEFAULT_COLUMNS: usize = 100;

/// Rows generated per batch (one unit of work on the pool)
pub const DEFAULT_BATCH_SIZE: u64 = 100_000;

/// Estimated characters per formatted field.
/// Deliberately low: two-decimal values over [-10000, 10000] average ~7.4,
/// so the estimate over-generates rather than under-generates.
pub const DEFAULT_AVG_FIELD_WIDTH: f64 = 7.0;

/// Multiplier applied to the estimated row count
pub const DEFAULT_SAFETY_MARGIN: f64 = 1.10;

/// Base seed; batch `i` is seeded with `DEFAULT_SEED + i`
pub const DEFAULT_SEED: u64 = 42;

/// Decimal places per field
pub const DEFAULT_PRECISION: usize = 2;

/// Flush + fsync the output every N batches
pub const DEFAULT_FLUSH_INTERVAL: u64 = 20;

/// Log a progress line every N batches
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 5;

/// CPUs held back from the pool for the coordinator and I/O
pub const COORDINATOR_RESERVED_CPUS: usize = 2;

/// Default output file name
pub const DEFAULT_OUTPUT: &str = "large_test_file.csv";

/// Lower bound of generated field values
pub const FIELD_MIN: f64 = -10_000.0;

/// Upper bound of generated field values
pub const FIELD_MAX: f64 = 10_000.0;

/// Field separator
pub const SEPARATOR: u8 = b',';

/// Filler byte appended when the file ends up short of the target
pub const PAD_BYTE: u8 = b' ';

/// Chunk size used when writing padding (1 MiB)
pub const PAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Output writer buffer capacity (8 MiB)
pub const WRITE_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Largest accepted decimal precision (f64 carries ~17 significant digits)
pub const MAX_PRECISION: usize = 17;

/// Loader progress is reported in steps of this many percent
pub const LOAD_PROGRESS_STEP: u8 = 10;
