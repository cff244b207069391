//! Core module containing fundamental types for memscan
//!
//! This module provides the foundational building blocks used throughout
//! the engine, including address handling, scalar values, scan types and
//! error types.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    Address, CompareMode, MemoryError, MemoryResult, ScalarValue, ScanEvent, ScanOutcome,
    ScanStatus, ValueType,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
