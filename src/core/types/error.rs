//! Custom error types for memscan

use super::value::ValueType;
use std::fmt;
use thiserror::Error;

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("No process attached")]
    NotAttached,

    #[error("Process not found: {0}")]
    ProcessNotFound(u32),

    #[error("Access denied to process {pid}: {reason}")]
    AccessDenied { pid: u32, reason: String },

    #[error("Failed to read memory at {address}: {reason}")]
    ReadFailed { address: String, reason: String },

    #[error("Failed to write memory at {address}: {reason}")]
    WriteFailed { address: String, reason: String },

    #[error("Invalid {value_type} bytes: {reason}")]
    DecodeInvalid {
        value_type: ValueType,
        reason: String,
    },

    #[error("Scan truncated after {limit} matches")]
    Truncated { limit: usize },

    #[error("Session {0} is already scanning")]
    SessionBusy(u64),

    #[error("Session scans {expected} values, got {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid memory address: {0}")]
    InvalidAddress(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Creates an access denied error for a process
    pub fn access_denied(pid: u32, reason: impl Into<String>) -> Self {
        MemoryError::AccessDenied {
            pid,
            reason: reason.into(),
        }
    }

    /// Creates a read failed error
    pub fn read_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::ReadFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a write failed error
    pub fn write_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::WriteFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a decode error for the given value type
    pub fn decode_invalid(value_type: ValueType, reason: impl Into<String>) -> Self {
        MemoryError::DecodeInvalid {
            value_type,
            reason: reason.into(),
        }
    }

    /// Whether the error belongs to the attach phase
    pub fn is_attach_error(&self) -> bool {
        matches!(
            self,
            MemoryError::ProcessNotFound(_) | MemoryError::AccessDenied { .. }
        )
    }
}
