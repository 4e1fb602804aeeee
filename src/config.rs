// src/config.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run configuration and human-readable size parsing

use std::path::PathBuf;

use crate::constants::*;
use crate::error::{GenerationError, Result};
use crate::scheduler::default_worker_count;

/// Configuration for one generation run
///
/// Built once at startup and read-only afterwards. Call [`validate`](Self::validate)
/// (or let [`generate_csv`](crate::generate_csv) do it) before use.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Minimum acceptable size of the finished file in bytes
    pub target_bytes: u64,
    /// Absolute slack added to the target before estimating rows
    pub buffer_bytes: u64,
    /// Number of CSV columns
    pub columns: usize,
    /// Rows per batch
    pub batch_size: u64,
    /// Worker threads in the generation pool
    pub workers: usize,
    /// Conservative (low) estimate of characters per formatted field
    pub avg_field_width: f64,
    /// Multiplier applied to the estimated row count (>= 1.0)
    pub safety_margin: f64,
    /// Output CSV path
    pub output: PathBuf,
    /// Base seed; batch `i` uses `seed + i`
    pub seed: u64,
    /// Decimal places per field
    pub precision: usize,
    /// Flush and fsync every N batches
    pub flush_interval: u64,
    /// Log progress every N batches
    pub progress_interval: u64,
    /// Upper bound on outstanding batches (None = 2 x workers)
    pub max_in_flight: Option<usize>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            target_bytes: DEFAULT_TARGET_BYTES,
            buffer_bytes: DEFAULT_BUFFER_BYTES,
            columns: DEFAULT_COLUMNS,
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_worker_count(),
            avg_field_width: DEFAULT_AVG_FIELD_WIDTH,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            output: PathBuf::from(DEFAULT_OUTPUT),
            seed: DEFAULT_SEED,
            precision: DEFAULT_PRECISION,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_in_flight: None,
        }
    }
}

impl GenerationConfig {
    /// Reject parameters that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.target_bytes == 0 {
            return Err(GenerationError::invalid("target size must be positive"));
        }
        if self.columns == 0 {
            return Err(GenerationError::invalid("column count must be positive"));
        }
        if self.batch_size == 0 {
            return Err(GenerationError::invalid("batch size must be positive"));
        }
        if self.workers == 0 {
            return Err(GenerationError::invalid("worker count must be positive"));
        }
        if !self.avg_field_width.is_finite() || self.avg_field_width <= 0.0 {
            return Err(GenerationError::invalid(format!(
                "average field width must be a positive number, got {}",
                self.avg_field_width
            )));
        }
        if !self.safety_margin.is_finite() || self.safety_margin < 1.0 {
            return Err(GenerationError::invalid(format!(
                "safety margin must be at least 1.0, got {}",
                self.safety_margin
            )));
        }
        if self.precision > MAX_PRECISION {
            return Err(GenerationError::invalid(format!(
                "precision must be at most {} decimal places, got {}",
                MAX_PRECISION, self.precision
            )));
        }
        if self.flush_interval == 0 || self.progress_interval == 0 {
            return Err(GenerationError::invalid(
                "flush and progress intervals must be at least 1 batch",
            ));
        }
        if self.max_in_flight == Some(0) {
            return Err(GenerationError::invalid("max in-flight batches must be positive"));
        }
        Ok(())
    }

    /// Effective in-flight window for the scheduler
    pub fn in_flight_limit(&self) -> usize {
        self.max_in_flight
            .unwrap_or_else(|| self.workers.saturating_mul(2))
            .max(1)
    }

    /// Header row: `col0,col1,...,col{N-1}\n`
    pub fn header(&self) -> Vec<u8> {
        let mut header = (0..self.columns)
            .map(|i| format!("col{}", i))
            .collect::<Vec<_>>()
            .join(",")
            .into_bytes();
        header.push(b'\n');
        header
    }
}

/// Parse a byte size such as `1GiB`, `50MB`, `512k` or `1048576`.
///
/// Decimal suffixes (KB, MB, GB, TB) are powers of 1000; binary suffixes
/// (KiB, MiB, GiB, TiB) and bare letters (K, M, G, T) are powers of 1024.
/// Fractional values are accepted (`1.5GiB`).
pub fn parse_size(input: &str) -> Result<u64> {
    let s = input.trim();
    let split = s
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let number = number.trim();

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1_000,
        "MB" => 1_000_000,
        "GB" => 1_000_000_000,
        "TB" => 1_000_000_000_000,
        "K" | "KIB" => 1 << 10,
        "M" | "MIB" => 1 << 20,
        "G" | "GIB" => 1 << 30,
        "T" | "TIB" => 1 << 40,
        other => {
            return Err(GenerationError::invalid(format!(
                "unknown size unit '{}' in '{}'",
                other, input
            )))
        }
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier).ok_or_else(|| {
            GenerationError::invalid(format!("size '{}' overflows 64 bits", input))
        });
    }

    let value: f64 = number
        .parse()
        .map_err(|_| GenerationError::invalid(format!("cannot parse size '{}'", input)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(GenerationError::invalid(format!("cannot parse size '{}'", input)));
    }
    let bytes = value * multiplier as f64;
    if bytes > u64::MAX as f64 {
        return Err(GenerationError::invalid(format!("size '{}' overflows 64 bits", input)));
    }
    Ok(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1048576").unwrap(), 1_048_576);
        assert_eq!(parse_size("1GiB").unwrap(), 1 << 30);
        assert_eq!(parse_size("50MiB").unwrap(), 50 << 20);
        assert_eq!(parse_size("500MB").unwrap(), 500_000_000);
        assert_eq!(parse_size(" 4k ").unwrap(), 4096);
        assert_eq!(parse_size("1.5GiB").unwrap(), 3 << 29);
        assert_eq!(parse_size("5b").unwrap(), 5);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("ten MB").is_err());
        assert!(parse_size("10XB").is_err());
        assert!(parse_size("-1MB").is_err());
        assert!(parse_size("99999999999TiB").is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = GenerationConfig::default();
        config.validate().unwrap();
        assert!(config.workers >= 1);
        assert_eq!(config.in_flight_limit(), config.workers * 2);
    }

    #[test]
    fn test_validate_rejects_non_positive_values() {
        let cases: [fn(&mut GenerationConfig); 11] = [
            |c: &mut GenerationConfig| c.target_bytes = 0,
            |c: &mut GenerationConfig| c.columns = 0,
            |c: &mut GenerationConfig| c.batch_size = 0,
            |c: &mut GenerationConfig| c.workers = 0,
            |c: &mut GenerationConfig| c.avg_field_width = 0.0,
            |c: &mut GenerationConfig| c.avg_field_width = f64::NAN,
            |c: &mut GenerationConfig| c.safety_margin = 0.9,
            |c: &mut GenerationConfig| c.flush_interval = 0,
            |c: &mut GenerationConfig| c.max_in_flight = Some(0),
            |c: &mut GenerationConfig| c.precision = MAX_PRECISION + 1,
            |c: &mut GenerationConfig| c.precision = usize::MAX,
        ];

        for mutate in cases {
            let mut config = GenerationConfig::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(GenerationError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_max_precision_is_accepted() {
        let config = GenerationConfig {
            precision: MAX_PRECISION,
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_header() {
        let config = GenerationConfig {
            columns: 4,
            ..Default::default()
        };
        assert_eq!(config.header(), b"col0,col1,col2,col3\n");

        let config = GenerationConfig {
            columns: 1,
            ..Default::default()
        };
        assert_eq!(config.header(), b"col0\n");
    }
}
