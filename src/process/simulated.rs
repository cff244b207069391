//! In-memory process backend
//!
//! Models a target's address space as a sorted list of regions backed by
//! byte vectors. Used by the test suite, the benches and the console's
//! `attach sim` command.

use super::source::{MemorySource, Protection, RegionInfo, RegionState};
use crate::core::types::{Address, MemoryError, MemoryResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

const MIN_ADDRESS: usize = 0x10000;
const MAX_ADDRESS: usize = 0x7FFF_FFFF_0000;

#[derive(Debug)]
struct SimRegion {
    base: usize,
    data: Vec<u8>,
    state: RegionState,
    protection: Protection,
}

impl SimRegion {
    fn end(&self) -> usize {
        self.base + self.data.len()
    }

    fn contains_range(&self, address: usize, len: usize) -> bool {
        address >= self.base && address.saturating_add(len) <= self.end()
    }

    fn info(&self) -> RegionInfo {
        RegionInfo {
            base: Address::new(self.base),
            size: self.data.len(),
            state: self.state,
            protection: self.protection,
        }
    }
}

/// Builder for [`SimulatedProcess`]
#[derive(Debug)]
pub struct SimulatedProcessBuilder {
    pid: u32,
    regions: Vec<SimRegion>,
}

impl SimulatedProcessBuilder {
    /// Adds a committed region filled with zeroes
    pub fn region(self, base: usize, size: usize, protection: Protection) -> Self {
        self.region_with(base, vec![0; size], RegionState::Committed, protection)
    }

    /// Adds a committed region with the given contents
    pub fn region_data(self, base: usize, data: Vec<u8>, protection: Protection) -> Self {
        self.region_with(base, data, RegionState::Committed, protection)
    }

    /// Adds a reserved (uncommitted) region
    pub fn reserved(self, base: usize, size: usize) -> Self {
        self.region_with(base, vec![0; size], RegionState::Reserved, Protection::NO_ACCESS)
    }

    fn region_with(
        mut self,
        base: usize,
        data: Vec<u8>,
        state: RegionState,
        protection: Protection,
    ) -> Self {
        self.regions.push(SimRegion {
            base,
            data,
            state,
            protection,
        });
        self
    }

    /// Finishes the layout. Regions are sorted; overlapping regions are an error.
    pub fn build(mut self) -> MemoryResult<SimulatedProcess> {
        self.regions.sort_by_key(|r| r.base);

        for region in &self.regions {
            if region.data.is_empty() || region.base < MIN_ADDRESS || region.end() > MAX_ADDRESS {
                return Err(MemoryError::InvalidAddress(format!(
                    "region 0x{:X}+0x{:X} outside the simulated address space",
                    region.base,
                    region.data.len()
                )));
            }
        }
        for pair in self.regions.windows(2) {
            if pair[0].end() > pair[1].base {
                return Err(MemoryError::InvalidAddress(format!(
                    "regions at 0x{:X} and 0x{:X} overlap",
                    pair[0].base, pair[1].base
                )));
            }
        }

        Ok(SimulatedProcess {
            pid: self.pid,
            regions: RwLock::new(self.regions),
            terminated: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        })
    }
}

/// A fake target process living entirely in this process's heap
#[derive(Debug)]
pub struct SimulatedProcess {
    pid: u32,
    regions: RwLock<Vec<SimRegion>>,
    terminated: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl SimulatedProcess {
    pub fn builder(pid: u32) -> SimulatedProcessBuilder {
        SimulatedProcessBuilder {
            pid,
            regions: Vec::new(),
        }
    }

    /// Writes bytes as the target itself would, ignoring page protection
    pub fn poke(&self, address: usize, data: &[u8]) -> bool {
        let Ok(mut regions) = self.regions.write() else {
            return false;
        };
        match regions
            .iter_mut()
            .find(|r| r.contains_range(address, data.len()))
        {
            Some(region) => {
                let offset = address - region.base;
                region.data[offset..offset + data.len()].copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Reads bytes as the target itself would, ignoring page protection
    pub fn peek(&self, address: usize, len: usize) -> Option<Vec<u8>> {
        let regions = self.regions.read().ok()?;
        let region = regions.iter().find(|r| r.contains_range(address, len))?;
        let offset = address - region.base;
        Some(region.data[offset..offset + len].to_vec())
    }

    /// Changes the protection of the region starting at `base`
    pub fn protect(&self, base: usize, protection: Protection) -> bool {
        let Ok(mut regions) = self.regions.write() else {
            return false;
        };
        match regions.iter_mut().find(|r| r.base == base) {
            Some(region) => {
                region.protection = protection;
                true
            }
            None => false,
        }
    }

    /// Makes every later operation fail, as if the process had exited
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Makes external writes fail while set
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful external writes so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl MemorySource for SimulatedProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn address_bounds(&self) -> (Address, Address) {
        (Address::new(MIN_ADDRESS), Address::new(MAX_ADDRESS))
    }

    fn query(&self, address: Address) -> Option<RegionInfo> {
        if self.is_terminated() {
            return None;
        }
        let address = address.as_usize();
        if !(MIN_ADDRESS..MAX_ADDRESS).contains(&address) {
            return None;
        }

        let regions = self.regions.read().ok()?;
        if let Some(region) = regions
            .iter()
            .find(|r| address >= r.base && address < r.end())
        {
            return Some(region.info());
        }

        // Unmapped gap up to the next region
        let gap_start = regions
            .iter()
            .rev()
            .find(|r| r.end() <= address)
            .map_or(MIN_ADDRESS, |r| r.end());
        let gap_end = regions
            .iter()
            .find(|r| r.base > address)
            .map_or(MAX_ADDRESS, |r| r.base);

        Some(RegionInfo {
            base: Address::new(gap_start),
            size: gap_end - gap_start,
            state: RegionState::Free,
            protection: Protection::NO_ACCESS,
        })
    }

    fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        if self.is_terminated() {
            return Err(MemoryError::read_failed(address, "process has exited"));
        }

        let regions = self
            .regions
            .read()
            .map_err(|_| MemoryError::read_failed(address, "region table poisoned"))?;
        let start = address.as_usize();
        let region = regions
            .iter()
            .find(|r| r.contains_range(start, buffer.len()))
            .ok_or_else(|| MemoryError::read_failed(address, "range not mapped"))?;

        if region.state != RegionState::Committed
            || !region.protection.read
            || region.protection.guard
        {
            return Err(MemoryError::read_failed(address, "page not readable"));
        }

        let offset = start - region.base;
        buffer.copy_from_slice(&region.data[offset..offset + buffer.len()]);
        Ok(buffer.len())
    }

    fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        if self.is_terminated() {
            return Err(MemoryError::write_failed(address, "process has exited"));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MemoryError::write_failed(address, "write rejected"));
        }

        let mut regions = self
            .regions
            .write()
            .map_err(|_| MemoryError::write_failed(address, "region table poisoned"))?;
        let start = address.as_usize();
        let region = regions
            .iter_mut()
            .find(|r| r.contains_range(start, data.len()))
            .ok_or_else(|| MemoryError::write_failed(address, "range not mapped"))?;

        if region.state != RegionState::Committed || !region.protection.write {
            return Err(MemoryError::write_failed(address, "page not writable"));
        }

        let offset = start - region.base;
        region.data[offset..offset + data.len()].copy_from_slice(data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(data.len())
    }
}
