//! memscan: a value scanner and memory locker for live processes

pub mod config;
pub mod core;
pub mod engine;
pub mod lock;
pub mod memory;
pub mod process;
pub mod session;
#[cfg(windows)]
pub mod windows;

// Re-export main types from core module
pub use crate::core::types::{
    Address, CompareMode, MemoryError, MemoryResult, ProcessId, ScalarValue, ScanEvent, ScanMatch,
    ScanOutcome, ScanRequest, ScanStatus, SessionId, ValueType,
};

pub use engine::MemoryEngine;
pub use lock::{LockEntry, LockRegistry};
pub use memory::{NoopObserver, RecordingObserver, ScanObserver};
pub use process::{MemorySource, ProcessAccess, Protection, SimulatedProcess};
pub use session::{CancellationToken, ScanClaim, SearchSession, SessionPhase, SessionSnapshot};

// Re-export core directly for full access
pub use crate::core::*;
