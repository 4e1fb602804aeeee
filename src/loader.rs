// src/loader.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory-mapped reader for numeric CSV files
//!
//! Reads a header row plus comma-separated float fields into one flat,
//! row-major `Vec<f32>`. Parsing is lenient: a field that is empty or not a
//! number becomes `0.0` rather than failing the load.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::constants::{LOAD_PROGRESS_STEP, SEPARATOR};
use crate::error::{GenerationError, Result};

/// A CSV loaded into memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCsv {
    /// Header names, trimmed, empty entries skipped
    pub headers: Vec<String>,
    pub rows: usize,
    pub cols: usize,
    /// Row-major values. Can run longer than `rows * cols` when the last
    /// line is ragged.
    pub data: Vec<f32>,
}

impl ParsedCsv {
    /// Values of row `index`, if it is complete
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index.checked_mul(self.cols)?;
        self.data.get(start..start.checked_add(self.cols)?)
    }

    /// Smallest and largest value, `None` when there is no data
    pub fn value_range(&self) -> Option<(f32, f32)> {
        let mut values = self.data.iter().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// Load the CSV at `path`
///
/// `progress` receives the share of the file consumed, in percent, each
/// time it crosses a multiple of 10, and a final `100` once parsing is done.
pub fn load_csv(path: impl AsRef<Path>, progress: impl FnMut(u8)) -> Result<ParsedCsv> {
    let path = path.as_ref();
    let failure = |reason: String| GenerationError::LoadFailure {
        path: PathBuf::from(path),
        reason,
    };

    let file = File::open(path).map_err(|e| failure(format!("cannot open file: {}", e)))?;
    let len = file
        .metadata()
        .map_err(|e| failure(format!("cannot stat file: {}", e)))?
        .len();
    if len == 0 {
        return Err(failure("file is empty".to_string()));
    }

    let mmap = unsafe { Mmap::map(&file) }
        .map_err(|e| failure(format!("cannot map file: {}", e)))?;

    let parsed = parse(&mmap, progress).map_err(|reason| failure(reason.to_string()))?;

    tracing::debug!(
        "Loaded {}: {} rows x {} columns ({} values)",
        path.display(),
        parsed.rows,
        parsed.cols,
        parsed.data.len()
    );
    Ok(parsed)
}

fn is_line_end(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

fn parse_field(field: &[u8]) -> f32 {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

fn parse(bytes: &[u8], mut progress: impl FnMut(u8)) -> std::result::Result<ParsedCsv, &'static str> {
    if bytes.is_empty() {
        return Err("file is empty");
    }
    let total = bytes.len() as u128;

    let header_end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(bytes.len());
    let headers: Vec<String> = String::from_utf8_lossy(&bytes[..header_end])
        .split(SEPARATOR as char)
        .filter(|part| !part.is_empty())
        .map(|part| part.trim().to_string())
        .collect();
    let cols = headers.len();
    if cols == 0 {
        return Err("header has no columns");
    }

    let mut data: Vec<f32> = Vec::new();
    let mut rows = 0usize;
    let mut col_index = 0usize;
    let mut last_percent = 0u8;
    let mut pos = (header_end + 1).min(bytes.len());

    while pos < bytes.len() {
        let field_end = bytes[pos..]
            .iter()
            .position(|&b| b == SEPARATOR || is_line_end(b))
            .map_or(bytes.len(), |offset| pos + offset);

        data.push(parse_field(&bytes[pos..field_end]));
        col_index += 1;

        if field_end < bytes.len() && bytes[field_end] == SEPARATOR {
            pos = field_end + 1;
        } else {
            pos = bytes[field_end..]
                .iter()
                .position(|&b| !is_line_end(b))
                .map_or(bytes.len(), |offset| field_end + offset);
            rows += 1;
            col_index = 0;
        }

        let percent = (pos as u128 * 100 / total) as u8;
        if percent != last_percent && percent % LOAD_PROGRESS_STEP == 0 {
            last_percent = percent;
            progress(percent);
        }
    }

    // Last line without a trailing newline
    if col_index != 0 {
        rows += 1;
    }

    if rows.checked_mul(cols) != Some(data.len()) {
        tracing::warn!(
            "{} values do not fill {} rows of {} columns, using {} rows",
            data.len(),
            rows,
            cols,
            data.len() / cols
        );
        rows = data.len() / cols;
    }

    data.shrink_to_fit();
    if last_percent != 100 {
        progress(100);
    }

    Ok(ParsedCsv {
        headers,
        rows,
        cols,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse_str(text: &str) -> ParsedCsv {
        parse(text.as_bytes(), |_| {}).unwrap()
    }

    #[test]
    fn test_basic_file() {
        let csv = parse_str("a, b ,c\n1.5,-2,3e2\n4,5,6\n");
        assert_eq!(csv.headers, vec!["a", "b", "c"]);
        assert_eq!((csv.rows, csv.cols), (2, 3));
        assert_eq!(csv.data, vec![1.5, -2.0, 300.0, 4.0, 5.0, 6.0]);
        assert_eq!(csv.row(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(csv.row(2), None);
        assert_eq!(csv.value_range(), Some((-2.0, 300.0)));
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        let csv = parse_str("x,y\r\n1,2\r\n\r\n3,4");
        assert_eq!(csv.headers, vec!["x", "y"]);
        assert_eq!(csv.rows, 2);
        assert_eq!(csv.data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_bad_and_empty_fields_are_zero() {
        let csv = parse_str("a,b,c\nabc,,7\n");
        assert_eq!(csv.rows, 1);
        assert_eq!(csv.data, vec![0.0, 0.0, 7.0]);
    }

    #[test]
    fn test_empty_header_parts_are_skipped() {
        let csv = parse_str(",a,,b,\n1,2\n");
        assert_eq!(csv.headers, vec!["a", "b"]);
        assert_eq!(csv.cols, 2);
        assert_eq!(csv.rows, 1);
    }

    #[test]
    fn test_ragged_rows_are_corrected() {
        // Three lines, but seven values: rows = 7 / 2
        let csv = parse_str("a,b\n1,2\n3,4,5\n6,7\n");
        assert_eq!(csv.data.len(), 7);
        assert_eq!(csv.rows, 3);

        let csv = parse_str("a,b\n1,2\n3\n");
        assert_eq!(csv.rows, 1);
        assert_eq!(csv.row(0), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_header_only() {
        let csv = parse_str("a,b\n");
        assert_eq!((csv.rows, csv.cols), (0, 2));
        assert!(csv.data.is_empty());
        assert_eq!(csv.value_range(), None);
    }

    #[test]
    fn test_zero_columns_rejected() {
        assert_eq!(parse(b"\n1,2\n", |_| {}), Err("header has no columns"));
        assert_eq!(parse(b",,\n", |_| {}), Err("header has no columns"));
        assert_eq!(parse(b"", |_| {}), Err("file is empty"));
    }

    #[test]
    fn test_progress_steps() {
        let mut text = String::from("v\n");
        for i in 0..1000 {
            text.push_str(&format!("{}\n", i));
        }
        let mut seen = Vec::new();
        parse(text.as_bytes(), |p| seen.push(p)).unwrap();

        assert_eq!(seen.last(), Some(&100));
        assert!(seen.iter().all(|p| p % LOAD_PROGRESS_STEP == 0));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.iter().filter(|&&p| p == 100).count(), 1);
        assert!(seen.len() >= 5);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "col0,col1\n1.25,-3.50\n").unwrap();

        let mut last = 0;
        let csv = load_csv(&path, |p| last = p).unwrap();
        assert_eq!(last, 100);
        assert_eq!(csv.headers, vec!["col0", "col1"]);
        assert_eq!(csv.data, vec![1.25, -3.5]);
    }

    #[test]
    fn test_load_failures() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.csv");
        let err = load_csv(&missing, |_| {}).unwrap_err();
        assert!(matches!(err, GenerationError::LoadFailure { ref path, .. } if *path == missing));

        let empty = dir.path().join("empty.csv");
        fs::write(&empty, b"").unwrap();
        let err = load_csv(&empty, |_| {}).unwrap_err();
        assert!(err.to_string().contains("file is empty"), "{}", err);

        let headerless = dir.path().join("headerless.csv");
        fs::write(&headerless, b"\n1,2\n").unwrap();
        let err = load_csv(&headerless, |_| {}).unwrap_err();
        assert!(err.to_string().contains("no columns"), "{}", err);
    }
}
