//! Windows backend built on OpenProcess/VirtualQueryEx/ReadProcessMemory

use super::source::{MemorySource, RegionInfo};
use crate::core::types::{Address, MemoryResult};
use crate::windows::bindings::kernel32;
use crate::windows::types::{Handle, MemoryBasicInfo};
use std::fmt;

/// Access rights for process handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights {
    value: u32,
}

impl AccessRights {
    /// Query information access
    pub const QUERY_INFORMATION: Self = Self { value: 0x0400 };
    /// Read memory access
    pub const VM_READ: Self = Self { value: 0x0010 };
    /// Write memory access
    pub const VM_WRITE: Self = Self { value: 0x0020 };
    /// Required alongside VM_WRITE
    pub const VM_OPERATION: Self = Self { value: 0x0008 };

    /// Combine access rights
    pub fn combine(rights: &[Self]) -> Self {
        let mut value = 0;
        for right in rights {
            value |= right.value;
        }
        Self { value }
    }

    /// Rights needed to query, read and write the target
    pub fn read_write() -> Self {
        Self::combine(&[
            Self::QUERY_INFORMATION,
            Self::VM_READ,
            Self::VM_WRITE,
            Self::VM_OPERATION,
        ])
    }

    /// Get raw value
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// A live process opened with read/write/query rights
pub struct WindowsProcess {
    handle: Handle,
    pid: u32,
    bounds: (Address, Address),
}

impl WindowsProcess {
    pub fn open(pid: u32) -> MemoryResult<Self> {
        let handle = Handle::open_process(pid, AccessRights::read_write().value())?;
        Ok(WindowsProcess {
            handle,
            pid,
            bounds: kernel32::application_address_range(),
        })
    }
}

impl MemorySource for WindowsProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn address_bounds(&self) -> (Address, Address) {
        self.bounds
    }

    fn query(&self, address: Address) -> Option<RegionInfo> {
        let mbi = unsafe { kernel32::virtual_query_ex(self.handle.raw(), address)? };
        Some(MemoryBasicInfo::from(mbi).into())
    }

    fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        unsafe { kernel32::read_process_memory(self.handle.raw(), address, buffer) }
    }

    fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        unsafe { kernel32::write_process_memory(self.handle.raw(), address, data) }
    }
}

impl fmt::Debug for WindowsProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowsProcess")
            .field("pid", &self.pid)
            .field("valid", &!self.handle.is_null())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_rights_combine() {
        let combined = AccessRights::combine(&[AccessRights::VM_READ, AccessRights::VM_WRITE]);
        assert_eq!(combined.value(), 0x0030);
        assert_eq!(AccessRights::read_write().value(), 0x0438);
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_invalid_pid() {
        assert!(WindowsProcess::open(0).is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_self_read() {
        let value: Box<u32> = Box::new(0xCAFEBABE);
        let address = Address::new(&*value as *const u32 as usize);

        let process = WindowsProcess::open(std::process::id()).unwrap();
        let info = process.query(address).unwrap();
        assert!(info.contains(address));

        let mut buffer = [0u8; 4];
        assert_eq!(process.read(address, &mut buffer).unwrap(), 4);
        assert_eq!(u32::from_le_bytes(buffer), 0xCAFEBABE);
    }
}
