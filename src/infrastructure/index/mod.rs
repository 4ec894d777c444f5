//! File index construction

pub mod scanner;

pub use scanner::{scan_dir, ScanError, ScanOptions};
