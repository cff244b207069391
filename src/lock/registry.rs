//! Address locks that are rewritten on every tick

use crate::core::types::{Address, ScalarValue, ValueType};
use crate::process::ProcessAccess;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// A value pinned at an address
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LockEntry {
    pub address: Address,
    pub value: ScalarValue,
    pub value_type: ValueType,
    /// Consecutive failed writes
    pub write_failures: u32,
}

impl LockEntry {
    pub fn is_failing(&self) -> bool {
        self.write_failures > 0
    }
}

/// Summary of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub written: usize,
    pub failed: usize,
}

/// Locked addresses keyed by address; one lock per address
#[derive(Debug, Default)]
pub struct LockRegistry {
    entries: Mutex<BTreeMap<Address, LockEntry>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<Address, LockEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Pins `value` at `address`, replacing any previous lock there.
    ///
    /// `value` must already be of `value_type`.
    pub fn lock(&self, address: Address, value: ScalarValue, value_type: ValueType) {
        debug_assert_eq!(value.value_type(), value_type);
        self.entries().insert(
            address,
            LockEntry {
                address,
                value,
                value_type,
                write_failures: 0,
            },
        );
        info!(%address, %value, %value_type, "address locked");
    }

    pub fn unlock(&self, address: Address) -> bool {
        let removed = self.entries().remove(&address).is_some();
        if removed {
            info!(%address, "address unlocked");
        }
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        if !entries.is_empty() {
            debug!(count = entries.len(), "clearing locks");
        }
        entries.clear();
    }

    pub fn get(&self, address: Address) -> Option<LockEntry> {
        self.entries().get(&address).copied()
    }

    /// All locks in ascending address order
    pub fn entries_snapshot(&self) -> Vec<LockEntry> {
        self.entries().values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Writes every locked value once.
    ///
    /// The registry stays locked for the whole pass, so an entry removed by
    /// `unlock` is never written afterwards. Failed entries stay registered.
    pub fn tick(&self, access: &ProcessAccess) -> TickReport {
        let mut report = TickReport::default();
        let mut entries = self.entries();

        for entry in entries.values_mut() {
            let bytes = entry.value.to_bytes();
            if access.write(entry.address, &bytes) {
                if entry.write_failures > 0 {
                    debug!(address = %entry.address, "locked write recovered");
                }
                entry.write_failures = 0;
                report.written += 1;
            } else {
                if entry.write_failures == 0 {
                    warn!(
                        address = %entry.address,
                        value_type = %entry.value_type,
                        "failed to write locked value"
                    );
                } else {
                    debug!(
                        address = %entry.address,
                        failures = entry.write_failures + 1,
                        "locked write still failing"
                    );
                }
                entry.write_failures = entry.write_failures.saturating_add(1);
                report.failed += 1;
            }
        }

        report
    }
}
