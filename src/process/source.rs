//! Backend seam for the OS memory primitives
//!
//! Every backend (Windows, Linux, simulated) answers the same four
//! questions: where the application address space starts and ends, what
//! region contains an address, and how to read and write bytes.

use crate::core::types::{Address, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allocation state of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionState {
    Committed,
    Reserved,
    Free,
}

/// Page protection of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    pub guard: bool,
}

impl Protection {
    pub const NO_ACCESS: Self = Self::new(false, false, false);
    pub const READ_ONLY: Self = Self::new(true, false, false);
    pub const READ_WRITE: Self = Self::new(true, true, false);
    pub const READ_EXECUTE: Self = Self::new(true, false, true);
    pub const WRITE_ONLY: Self = Self::new(false, true, false);

    pub const fn new(read: bool, write: bool, execute: bool) -> Self {
        Protection {
            read,
            write,
            execute,
            guard: false,
        }
    }

    /// Marks the protection as a guard page
    pub const fn guarded(mut self) -> Self {
        self.guard = true;
        self
    }

    /// Parses the permission column of `/proc/<pid>/maps` (`rw-p`)
    pub fn from_maps(perms: &str) -> Self {
        let bytes = perms.as_bytes();
        Protection::new(
            bytes.first() == Some(&b'r'),
            bytes.get(1) == Some(&b'w'),
            bytes.get(2) == Some(&b'x'),
        )
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.execute { 'x' } else { '-' },
            if self.guard { 'g' } else { '-' }
        )
    }
}

/// Raw answer to a region query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    pub base: Address,
    pub size: usize,
    pub state: RegionState,
    pub protection: Protection,
}

impl RegionInfo {
    /// First address past the region
    pub fn end(&self) -> Address {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, address: Address) -> bool {
        address >= self.base && address < self.end()
    }

    pub fn is_committed(&self) -> bool {
        self.state == RegionState::Committed
    }
}

/// OS memory primitives of one attached process.
///
/// Implementations must be safe to call from several scan workers at once.
pub trait MemorySource: Send + Sync {
    /// Process id of the target
    fn pid(&self) -> u32;

    /// Lowest and highest application address, as `[min, max)`
    fn address_bounds(&self) -> (Address, Address);

    /// Describes the region containing `address`, `None` if the query fails
    fn query(&self, address: Address) -> Option<RegionInfo>;

    /// Reads into `buffer`, returning the number of bytes read
    fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize>;

    /// Writes `data`, returning the number of bytes written
    fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize>;
}
