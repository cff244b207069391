//! Attach/detach and byte-level access to the target process

use super::handle::ProcessHandle;
use super::source::{MemorySource, RegionInfo};
use crate::core::types::{Address, MemoryError, MemoryResult};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Default size of a single OS read; larger requests are split
pub const DEFAULT_READ_CHUNK: usize = 4 * 1024 * 1024;

/// Owns the handle to the attached process.
///
/// All methods take `&self` and may be called from many scan workers at once.
/// Reads and writes clone the handle out of the lock, so a concurrent
/// `detach` never invalidates an in-flight operation.
pub struct ProcessAccess {
    handle: RwLock<Option<ProcessHandle>>,
    read_chunk: usize,
}

impl ProcessAccess {
    pub fn new() -> Self {
        Self::with_read_chunk(DEFAULT_READ_CHUNK)
    }

    /// Uses `read_chunk` bytes as the sub-read size (at least 1)
    pub fn with_read_chunk(read_chunk: usize) -> Self {
        ProcessAccess {
            handle: RwLock::new(None),
            read_chunk: read_chunk.max(1),
        }
    }

    /// Opens `pid` with the native backend, replacing any previous target
    pub fn attach(&self, pid: u32) -> MemoryResult<()> {
        let source = super::open_native(pid)?;
        self.attach_source(source);
        Ok(())
    }

    /// Attaches an already opened backend, replacing any previous target
    pub fn attach_source(&self, source: Arc<dyn MemorySource>) {
        let handle = ProcessHandle::new(source);
        let pid = handle.pid();

        match self.handle.write() {
            Ok(mut guard) => {
                if let Some(previous) = guard.replace(handle) {
                    debug!(pid = previous.pid(), "replaced previous target");
                }
            }
            Err(poisoned) => {
                *poisoned.into_inner() = Some(handle);
            }
        }
        info!(pid, "attached to process");
    }

    /// Releases the handle; calling it when detached is a no-op
    pub fn detach(&self) {
        let previous = match self.handle.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = previous {
            info!(pid = handle.pid(), "detached from process");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.current().is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.current().map(|h| h.pid())
    }

    /// Clone of the current handle
    pub fn current(&self) -> Option<ProcessHandle> {
        match self.handle.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Current handle or [`MemoryError::NotAttached`]
    pub fn require(&self) -> MemoryResult<ProcessHandle> {
        self.current().ok_or(MemoryError::NotAttached)
    }

    /// Address range the region walk covers
    pub fn address_bounds(&self) -> Option<(Address, Address)> {
        self.current().map(|h| h.source().address_bounds())
    }

    /// Region containing `address`
    pub fn query(&self, address: Address) -> Option<RegionInfo> {
        self.current()?.source().query(address)
    }

    /// Reads `size` bytes.
    ///
    /// Requests larger than the chunk size are split into sub-reads. If a later
    /// chunk fails the bytes read so far are returned; `None` if nothing could
    /// be read.
    pub fn read(&self, address: Address, size: usize) -> Option<Vec<u8>> {
        let handle = self.current()?;
        read_chunked(handle.source(), address, size, self.read_chunk)
    }

    /// Writes `data`; true only if every byte was written
    pub fn write(&self, address: Address, data: &[u8]) -> bool {
        let Some(handle) = self.current() else {
            return false;
        };
        match handle.source().write(address, data) {
            Ok(written) => written == data.len(),
            Err(e) => {
                debug!(%address, error = %e, "write failed");
                false
            }
        }
    }

    pub fn read_chunk(&self) -> usize {
        self.read_chunk
    }
}

impl Default for ProcessAccess {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads through `source` in pieces of at most `chunk` bytes
pub(crate) fn read_chunked(
    source: &dyn MemorySource,
    address: Address,
    size: usize,
    chunk: usize,
) -> Option<Vec<u8>> {
    if size == 0 {
        return None;
    }

    let mut out = vec![0u8; size];
    let mut filled = 0;

    while filled < size {
        let len = chunk.min(size - filled);
        let at = address.checked_add(filled)?;

        match source.read(at, &mut out[filled..filled + len]) {
            Ok(n) if n > 0 => {
                filled += n;
                if n < len {
                    break;
                }
            }
            _ => break,
        }
    }

    if filled == 0 {
        return None;
    }
    out.truncate(filled);
    Some(out)
}
