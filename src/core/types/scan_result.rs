//! Scan request, outcome and event types

use super::{Address, ScalarValue, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How scanned values are compared against the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    Exact,
    Greater,
    Less,
    Changed,
    Unchanged,
}

impl CompareMode {
    /// Checks if this mode compares against the session's previous values
    pub fn requires_previous(&self) -> bool {
        matches!(self, CompareMode::Changed | CompareMode::Unchanged)
    }

    /// Checks if this mode always walks the whole address space
    pub fn forces_full_scan(&self) -> bool {
        self.requires_previous()
    }
}

impl fmt::Display for CompareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompareMode::Exact => "exact",
            CompareMode::Greater => "greater",
            CompareMode::Less => "less",
            CompareMode::Changed => "changed",
            CompareMode::Unchanged => "unchanged",
        };
        f.write_str(name)
    }
}

impl FromStr for CompareMode {
    type Err = super::MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "eq" | "=" => Ok(CompareMode::Exact),
            "greater" | "gt" | ">" => Ok(CompareMode::Greater),
            "less" | "lt" | "<" => Ok(CompareMode::Less),
            "changed" => Ok(CompareMode::Changed),
            "unchanged" => Ok(CompareMode::Unchanged),
            other => Err(super::MemoryError::InvalidValue(format!(
                "unknown compare mode '{}'",
                other
            ))),
        }
    }
}

/// Parameters of a single scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub target: ScalarValue,
    pub mode: CompareMode,
}

impl ScanRequest {
    pub fn new(target: ScalarValue, mode: CompareMode) -> Self {
        ScanRequest { target, mode }
    }

    /// The value type every read, decode and compare of this scan uses
    pub fn value_type(&self) -> ValueType {
        self.target.value_type()
    }
}

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
    Cancelled,
    Truncated { limit: usize },
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Cancelled => write!(f, "cancelled"),
            ScanStatus::Truncated { limit } => write!(f, "truncated at {} matches", limit),
        }
    }
}

/// A matching address together with the value observed while scanning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanMatch {
    pub address: Address,
    pub value: ScalarValue,
}

impl ScanMatch {
    pub fn new(address: Address, value: ScalarValue) -> Self {
        ScanMatch { address, value }
    }
}

/// Result of a scan as seen by the caller
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Matching addresses in ascending order
    pub addresses: Vec<Address>,
    pub status: ScanStatus,
    /// Whether the whole address space was walked
    pub full_scan: bool,
    pub regions_scanned: usize,
    pub bytes_scanned: u64,
    pub addresses_checked: u64,
    pub elapsed: Duration,
}

impl ScanOutcome {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.status, ScanStatus::Truncated { .. })
    }
}

/// Events emitted while a scan runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Started { total: u64, full_scan: bool },
    Progress { checked: u64, total: u64, matches: usize },
    Truncated { limit: usize },
    Finished { matches: usize, status: ScanStatus },
}
