//! Value locking
//!
//! The [`LockRegistry`] maps addresses to pinned values, each with its own
//! type. The [`LockWriter`] thread writes them all back on a fixed interval
//! while a process is attached.

pub mod registry;
pub mod writer;

pub use registry::{LockEntry, LockRegistry, TickReport};
pub use writer::{LockWriter, DEFAULT_LOCK_INTERVAL};
