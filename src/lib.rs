// src/lib.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parallel synthetic CSV generation with a guaranteed minimum file size
//!
//! This library provides:
//! - Xoshiro256++ row generation, reproducible per batch (`seed + batch index`)
//! - A deliberately conservative row-count estimate that over-generates
//! - Rayon worker pool with strictly ordered, single-writer output
//! - Post-run reconciliation that pads the file if it ever falls short
//! - Cooperative cancellation that removes partial output
//! - A memory-mapped loader that reads numeric CSVs back into a flat `Vec<f32>`

// Core modules
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod estimator;
pub mod generator;
pub mod loader;
pub mod scheduler;
pub mod writer;

// Re-export main API
pub use config::{parse_size, GenerationConfig};
pub use coordinator::{generate_csv, generate_csv_with, GenerationReport};
pub use error::{GenerationError, Result};
pub use estimator::{estimate, SizeEstimate};
pub use generator::{produce_batch, Batch, BatchSpec, RowGenerator};
pub use loader::{load_csv, ParsedCsv};
pub use scheduler::{BatchScheduler, CancelToken};
pub use writer::{CsvWriter, Reconciliation, WriteState};
