//! Memory region information wrapper

use crate::core::types::Address;
use crate::process::{Protection, RegionInfo, RegionState};
use winapi::um::winnt::MEMORY_BASIC_INFORMATION;

const MEM_COMMIT: u32 = 0x1000;
const MEM_RESERVE: u32 = 0x2000;

const PAGE_NOACCESS: u32 = 0x01;
const PAGE_READONLY: u32 = 0x02;
const PAGE_READWRITE: u32 = 0x04;
const PAGE_WRITECOPY: u32 = 0x08;
const PAGE_EXECUTE: u32 = 0x10;
const PAGE_EXECUTE_READ: u32 = 0x20;
const PAGE_EXECUTE_READWRITE: u32 = 0x40;
const PAGE_EXECUTE_WRITECOPY: u32 = 0x80;
const PAGE_GUARD: u32 = 0x100;

/// Wrapper for MEMORY_BASIC_INFORMATION
#[derive(Debug, Clone)]
pub struct MemoryBasicInfo {
    pub base_address: Address,
    pub region_size: usize,
    pub state: u32,
    pub protect: u32,
}

impl From<MEMORY_BASIC_INFORMATION> for MemoryBasicInfo {
    fn from(mbi: MEMORY_BASIC_INFORMATION) -> Self {
        MemoryBasicInfo {
            base_address: Address::new(mbi.BaseAddress as usize),
            region_size: mbi.RegionSize,
            state: mbi.State,
            protect: mbi.Protect,
        }
    }
}

impl MemoryBasicInfo {
    pub fn state(&self) -> RegionState {
        match self.state {
            MEM_COMMIT => RegionState::Committed,
            MEM_RESERVE => RegionState::Reserved,
            _ => RegionState::Free,
        }
    }

    /// Decodes the PAGE_* constants into a [`Protection`]
    pub fn protection(&self) -> Protection {
        let base = self.protect & 0xFF;
        let read = matches!(
            base,
            PAGE_READONLY
                | PAGE_READWRITE
                | PAGE_WRITECOPY
                | PAGE_EXECUTE_READ
                | PAGE_EXECUTE_READWRITE
                | PAGE_EXECUTE_WRITECOPY
        );
        let write = matches!(
            base,
            PAGE_READWRITE | PAGE_WRITECOPY | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY
        );
        let execute = matches!(
            base,
            PAGE_EXECUTE | PAGE_EXECUTE_READ | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY
        );

        Protection {
            read: read && base != PAGE_NOACCESS,
            write,
            execute,
            guard: self.protect & PAGE_GUARD != 0,
        }
    }
}

impl From<MemoryBasicInfo> for RegionInfo {
    fn from(info: MemoryBasicInfo) -> Self {
        RegionInfo {
            base: info.base_address,
            size: info.region_size,
            state: info.state(),
            protection: info.protection(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(state: u32, protect: u32) -> MemoryBasicInfo {
        MemoryBasicInfo {
            base_address: Address::new(0x1000),
            region_size: 4096,
            state,
            protect,
        }
    }

    #[test]
    fn test_state_decoding() {
        assert_eq!(info(MEM_COMMIT, 0x04).state(), RegionState::Committed);
        assert_eq!(info(MEM_RESERVE, 0x04).state(), RegionState::Reserved);
        assert_eq!(info(0x10000, 0x01).state(), RegionState::Free);
    }

    #[test]
    fn test_protection_decoding() {
        assert_eq!(info(MEM_COMMIT, PAGE_READWRITE).protection(), Protection::READ_WRITE);
        assert_eq!(info(MEM_COMMIT, PAGE_READONLY).protection(), Protection::READ_ONLY);
        assert_eq!(
            info(MEM_COMMIT, PAGE_EXECUTE_READ).protection(),
            Protection::READ_EXECUTE
        );
        assert_eq!(info(MEM_COMMIT, PAGE_NOACCESS).protection(), Protection::NO_ACCESS);

        let guarded = info(MEM_COMMIT, PAGE_READWRITE | PAGE_GUARD).protection();
        assert!(guarded.guard);
        assert!(guarded.read);
    }

    #[test]
    fn test_from_memory_basic_information() {
        use std::mem;

        let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { mem::zeroed() };
        mbi.BaseAddress = 0x2000 as *mut _;
        mbi.RegionSize = 8192;
        mbi.State = MEM_COMMIT;
        mbi.Protect = PAGE_WRITECOPY;

        let region = RegionInfo::from(MemoryBasicInfo::from(mbi));
        assert_eq!(region.base, Address::new(0x2000));
        assert_eq!(region.size, 8192);
        assert!(region.is_committed());
        assert!(region.protection.write);
    }
}
