//! Shared handle to an attached process

use super::source::MemorySource;
use std::fmt;
use std::sync::Arc;

/// An open target: the backend plus its pid.
///
/// Cloning is cheap; the backend is closed when the last clone is dropped.
#[derive(Clone)]
pub struct ProcessHandle {
    source: Arc<dyn MemorySource>,
    pid: u32,
}

impl ProcessHandle {
    pub fn new(source: Arc<dyn MemorySource>) -> Self {
        let pid = source.pid();
        ProcessHandle { source, pid }
    }

    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// The backend servicing this handle
    pub fn source(&self) -> &dyn MemorySource {
        self.source.as_ref()
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .finish()
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessHandle(pid={})", self.pid)
    }
}
