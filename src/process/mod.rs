//! Process access for the engine
//!
//! This module provides the [`MemorySource`] backend seam, the native
//! backends (Windows and Linux), an in-memory [`SimulatedProcess`], and the
//! [`ProcessAccess`] owner that the rest of the engine reads and writes
//! through.

pub mod access;
pub mod handle;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod simulated;
pub mod source;
#[cfg(windows)]
pub mod win32;

pub use access::{ProcessAccess, DEFAULT_READ_CHUNK};
pub use handle::ProcessHandle;
pub use simulated::{SimulatedProcess, SimulatedProcessBuilder};
pub use source::{MemorySource, Protection, RegionInfo, RegionState};

use crate::core::types::MemoryResult;
use std::sync::Arc;

/// Opens `pid` with the backend native to this platform
#[cfg(windows)]
pub fn open_native(pid: u32) -> MemoryResult<Arc<dyn MemorySource>> {
    Ok(Arc::new(win32::WindowsProcess::open(pid)?))
}

/// Opens `pid` with the backend native to this platform
#[cfg(target_os = "linux")]
pub fn open_native(pid: u32) -> MemoryResult<Arc<dyn MemorySource>> {
    Ok(Arc::new(linux::LinuxProcess::open(pid)?))
}

/// Opens `pid` with the backend native to this platform
#[cfg(not(any(windows, target_os = "linux")))]
pub fn open_native(_pid: u32) -> MemoryResult<Arc<dyn MemorySource>> {
    Err(crate::core::types::MemoryError::UnsupportedOperation(
        "no native process backend for this platform".to_string(),
    ))
}
