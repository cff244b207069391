//! Core type definitions for memscan
//!
//! This module contains the fundamental types used throughout the engine:
//! addresses, scalar values, scan requests and outcomes, and error types.

mod address;
mod error;
mod scan_result;
mod value;

// Re-export all public types
pub use address::Address;
pub use error::{MemoryError, MemoryResult};
pub use scan_result::{
    CompareMode, ScanEvent, ScanMatch, ScanOutcome, ScanRequest, ScanStatus,
};
pub use value::{ScalarValue, ValueType};

// Common type aliases
pub type ProcessId = u32;
pub type SessionId = u64;
