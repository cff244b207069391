//! Owned process HANDLE closed on drop

use crate::core::types::MemoryResult;
use crate::windows::bindings::kernel32;
use winapi::um::winnt::HANDLE;

/// Owned Windows HANDLE
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    /// Opens `pid` with the given access mask
    pub fn open_process(pid: u32, access: u32) -> MemoryResult<Self> {
        kernel32::open_process(pid, access).map(|handle| Handle { handle })
    }

    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }

    /// Raw handle, valid while `self` lives
    pub fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe {
                let _ = kernel32::close_handle(self.handle);
            }
        }
    }
}

// Process HANDLEs may be used from any thread of the owning process
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_current_process() {
        let handle = Handle::open_process(std::process::id(), 0x0410).unwrap();
        assert!(!handle.is_null());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_invalid_pid() {
        assert!(Handle::open_process(0, 0x0410).is_err());
    }
}
