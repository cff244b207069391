//! Linux backend built on `/proc/<pid>/maps` and `/proc/<pid>/mem`

use super::source::{MemorySource, Protection, RegionInfo, RegionState};
use crate::core::types::{Address, MemoryError, MemoryResult};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

const MIN_ADDRESS: usize = 0x1000;
#[cfg(target_pointer_width = "64")]
const MAX_ADDRESS: usize = 0x7FFF_FFFF_F000;
#[cfg(not(target_pointer_width = "64"))]
const MAX_ADDRESS: usize = 0xC000_0000;

/// Maps are re-read when older than this, so one region walk parses them once
const MAPS_TTL: Duration = Duration::from_millis(250);

/// One line of `/proc/<pid>/maps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub start: usize,
    pub end: usize,
    pub protection: Protection,
    pub path: Option<String>,
}

impl MapEntry {
    /// Parses `00400000-00452000 r-xp 00000000 08:02 173521 /usr/bin/ls`
    pub fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();

        let (start, end) = parts.next()?.split_once('-')?;
        let start = usize::from_str_radix(start, 16).ok()?;
        let end = usize::from_str_radix(end, 16).ok()?;
        if end <= start {
            return None;
        }

        let protection = Protection::from_maps(parts.next()?);
        let path = parts.nth(3).map(str::to_string);

        Some(MapEntry {
            start,
            end,
            protection,
            path,
        })
    }

    fn is_vsyscall(&self) -> bool {
        self.path.as_deref() == Some("[vsyscall]")
    }
}

/// Parses the whole maps file, skipping malformed lines
pub fn parse_maps(content: &str) -> Vec<MapEntry> {
    let mut entries: Vec<MapEntry> = content
        .lines()
        .filter_map(MapEntry::from_line)
        .filter(|e| !e.is_vsyscall())
        .collect();
    entries.sort_by_key(|e| e.start);
    entries
}

fn read_maps(pid: u32) -> io::Result<Vec<MapEntry>> {
    let content = std::fs::read_to_string(format!("/proc/{}/maps", pid))?;
    Ok(parse_maps(&content))
}

struct MapsCache {
    loaded: Instant,
    entries: Vec<MapEntry>,
}

/// A live process opened through procfs
pub struct LinuxProcess {
    pid: u32,
    mem: File,
    writable: bool,
    maps: Mutex<Option<MapsCache>>,
}

impl LinuxProcess {
    /// Opens `/proc/<pid>/mem`, falling back to read-only access
    pub fn open(pid: u32) -> MemoryResult<Self> {
        let mem_path = format!("/proc/{}/mem", pid);

        let (mem, writable) = match OpenOptions::new().read(true).write(true).open(&mem_path) {
            Ok(file) => (file, true),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                let file = File::open(&mem_path).map_err(|e| open_error(pid, e))?;
                (file, false)
            }
            Err(e) => return Err(open_error(pid, e)),
        };

        let entries = read_maps(pid).map_err(|e| open_error(pid, e))?;

        debug!(pid, writable, regions = entries.len(), "opened /proc/{}/mem", pid);
        Ok(LinuxProcess {
            pid,
            mem,
            writable,
            maps: Mutex::new(Some(MapsCache {
                loaded: Instant::now(),
                entries,
            })),
        })
    }

    /// Whether writes can succeed at all
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn with_maps<T>(&self, f: impl FnOnce(&[MapEntry]) -> T) -> Option<T> {
        let mut cache = self.maps.lock().ok()?;
        let stale = cache
            .as_ref()
            .map_or(true, |c| c.loaded.elapsed() > MAPS_TTL);
        if stale {
            let entries = read_maps(self.pid).ok()?;
            *cache = Some(MapsCache {
                loaded: Instant::now(),
                entries,
            });
        }
        cache.as_ref().map(|c| f(&c.entries))
    }
}

fn open_error(pid: u32, error: io::Error) -> MemoryError {
    match error.kind() {
        io::ErrorKind::NotFound => MemoryError::ProcessNotFound(pid),
        io::ErrorKind::PermissionDenied => MemoryError::access_denied(pid, error.to_string()),
        _ => MemoryError::IoError(error),
    }
}

impl MemorySource for LinuxProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn address_bounds(&self) -> (Address, Address) {
        (Address::new(MIN_ADDRESS), Address::new(MAX_ADDRESS))
    }

    fn query(&self, address: Address) -> Option<RegionInfo> {
        let address = address.as_usize();
        if !(MIN_ADDRESS..MAX_ADDRESS).contains(&address) {
            return None;
        }

        self.with_maps(|entries| {
            if let Some(entry) = entries
                .iter()
                .find(|e| address >= e.start && address < e.end)
            {
                return RegionInfo {
                    base: Address::new(entry.start),
                    size: entry.end - entry.start,
                    state: RegionState::Committed,
                    protection: entry.protection,
                };
            }

            let gap_start = entries
                .iter()
                .rev()
                .find(|e| e.end <= address)
                .map_or(MIN_ADDRESS, |e| e.end.max(MIN_ADDRESS));
            let gap_end = entries
                .iter()
                .find(|e| e.start > address)
                .map_or(MAX_ADDRESS, |e| e.start.min(MAX_ADDRESS));

            RegionInfo {
                base: Address::new(gap_start),
                size: gap_end - gap_start,
                state: RegionState::Free,
                protection: Protection::NO_ACCESS,
            }
        })
    }

    fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        self.mem
            .read_at(buffer, address.as_usize() as u64)
            .map_err(|e| MemoryError::read_failed(address, e.to_string()))
    }

    fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        if !self.writable {
            return Err(MemoryError::write_failed(address, "opened read-only"));
        }
        self.mem
            .write_at(data, address.as_usize() as u64)
            .map_err(|e| MemoryError::write_failed(address, e.to_string()))
    }
}
