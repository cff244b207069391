//! Memory region enumeration
//!
//! Walks a target's address space through its [`MemorySource`] and yields
//! the committed, accessible, unguarded regions a scan reads.
//!
//! [`MemorySource`]: crate::process::MemorySource

pub mod enumerator;

pub use enumerator::{MemoryRegion, RegionEnumerator};

use crate::process::ProcessAccess;

/// Collects every scannable region of the attached process
pub fn collect_regions(access: &ProcessAccess) -> Vec<MemoryRegion> {
    match access.current() {
        Some(handle) => RegionEnumerator::new(handle.source()).collect(),
        None => Vec::new(),
    }
}
