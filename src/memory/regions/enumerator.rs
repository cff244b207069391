//! Memory region enumeration functionality

use crate::core::types::Address;
use crate::process::{MemorySource, RegionInfo};
use serde::Serialize;
use tracing::trace;

/// A region the scanner may read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub base: Address,
    pub size: usize,
    pub committed: bool,
    pub readable: bool,
    pub writable: bool,
}

impl MemoryRegion {
    /// Get the end address of the region
    pub fn end(&self) -> Address {
        self.base.saturating_add(self.size)
    }

    /// Check if an address is within this region
    pub fn contains(&self, address: Address) -> bool {
        address >= self.base && address < self.end()
    }

    /// Builds a scannable region from a query answer, `None` if it is not one
    pub fn from_info(info: &RegionInfo) -> Option<Self> {
        let protection = info.protection;
        let usable = info.is_committed()
            && (protection.read || protection.write)
            && !protection.guard;

        usable.then(|| MemoryRegion {
            base: info.base,
            size: info.size,
            committed: true,
            readable: protection.read,
            writable: protection.write,
        })
    }
}

/// Lazily walks the address space from the lowest to the highest
/// application address.
///
/// The walk ends at the first failed query, and on a query that reports a
/// zero-sized region or one that does not move past the current address.
pub struct RegionEnumerator<'a> {
    source: &'a dyn MemorySource,
    current: Address,
    max: Address,
    done: bool,
}

impl<'a> RegionEnumerator<'a> {
    /// Create a new region enumerator over the whole address space
    pub fn new(source: &'a dyn MemorySource) -> Self {
        let (min, max) = source.address_bounds();
        Self::with_range(source, min, max)
    }

    /// Enumerate only `[start, end)`
    pub fn with_range(source: &'a dyn MemorySource, start: Address, end: Address) -> Self {
        RegionEnumerator {
            source,
            current: start,
            max: end,
            done: start >= end,
        }
    }
}

impl Iterator for RegionEnumerator<'_> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<MemoryRegion> {
        while !self.done && self.current < self.max {
            let Some(info) = self.source.query(self.current) else {
                trace!(address = %self.current, "region query failed, ending walk");
                self.done = true;
                break;
            };

            let next = info.end();
            if info.size == 0 || next <= self.current {
                self.done = true;
                break;
            }
            self.current = next;

            if let Some(region) = MemoryRegion::from_info(&info) {
                return Some(region);
            }
        }

        self.done = true;
        None
    }
}

impl std::iter::FusedIterator for RegionEnumerator<'_> {}
