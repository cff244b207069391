//! Windows API layer for the native backend
//!
//! Provides safe wrappers around the kernel32 functions the engine needs:
//! opening a process, querying its regions, reading and writing its memory.
//! All unsafe FFI calls are contained within this module.

pub mod bindings;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{Handle, MemoryBasicInfo};
pub use utils::ErrorCode;

// Re-export key bindings
pub use bindings::kernel32;
