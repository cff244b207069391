//! One independent search: its candidates and the values seen at them

use super::cancel::CancellationToken;
use crate::core::types::{
    Address, CompareMode, MemoryError, MemoryResult, ScalarValue, ScanOutcome, ScanRequest,
    SessionId, ValueType,
};
use crate::memory::orchestrator::{ScanOrchestrator, ScanPlan, ScanResults};
use crate::memory::progress::ScanObserver;
use crate::memory::scanner::Reference;
use crate::process::ProcessAccess;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Empty,
    FirstScanned,
    Narrowed,
}

#[derive(Debug, Default)]
struct SessionState {
    value_type: Option<ValueType>,
    compare_mode: Option<CompareMode>,
    candidates: Vec<Address>,
    first_values: BTreeMap<Address, ScalarValue>,
    prev_values: BTreeMap<Address, ScalarValue>,
    current_values: BTreeMap<Address, ScalarValue>,
    last_target: Option<ScalarValue>,
    scan_count: u32,
}

impl SessionState {
    fn is_first_scan(&self) -> bool {
        self.scan_count == 0
    }

    fn phase(&self) -> SessionPhase {
        match self.scan_count {
            0 => SessionPhase::Empty,
            1 => SessionPhase::FirstScanned,
            _ => SessionPhase::Narrowed,
        }
    }

    fn commit(&mut self, request: &ScanRequest, results: ScanResults) {
        let first = self.is_first_scan();
        let current: BTreeMap<Address, ScalarValue> = results
            .matches
            .iter()
            .map(|m| (m.address, m.value))
            .collect();

        self.prev_values = std::mem::replace(&mut self.current_values, current);
        self.prev_values
            .retain(|address, _| self.current_values.contains_key(address));
        if first {
            self.first_values = self.current_values.clone();
        } else {
            self.first_values
                .retain(|address, _| self.current_values.contains_key(address));
        }

        self.candidates = results.matches.iter().map(|m| m.address).collect();
        self.value_type = Some(request.value_type());
        self.compare_mode = Some(request.mode);
        self.last_target = Some(request.target);
        self.scan_count += 1;
    }
}

/// A candidate with the values recorded for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub address: Address,
    pub first: Option<ScalarValue>,
    pub previous: Option<ScalarValue>,
    pub current: Option<ScalarValue>,
}

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub name: String,
    pub phase: SessionPhase,
    pub value_type: Option<ValueType>,
    pub compare_mode: Option<CompareMode>,
    pub last_target: Option<ScalarValue>,
    pub scan_count: u32,
    pub candidate_count: usize,
    /// At most the requested number of entries, lowest addresses first
    pub entries: Vec<SnapshotEntry>,
}

/// Clears the busy flag when a scan ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A session claimed for one scan; dropping it releases the session
#[derive(Debug)]
pub struct ScanClaim {
    session: Arc<SearchSession>,
}

impl ScanClaim {
    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    /// Runs the claimed scan, then releases the session
    pub fn run(
        self,
        orchestrator: &ScanOrchestrator,
        access: &ProcessAccess,
        target: ScalarValue,
        mode: CompareMode,
        observer: &dyn ScanObserver,
    ) -> MemoryResult<ScanOutcome> {
        self.session
            .run_claimed(orchestrator, access, target, mode, observer)
    }
}

impl Drop for ScanClaim {
    fn drop(&mut self) {
        self.session.busy.store(false, Ordering::Release);
    }
}

/// One search with its own value type, mode, candidates and cancel token.
///
/// Scans on one session run one at a time; different sessions scan
/// concurrently without sharing any state.
#[derive(Debug)]
pub struct SearchSession {
    id: SessionId,
    name: String,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    busy: AtomicBool,
}

impl SearchSession {
    pub fn new(id: SessionId, name: impl Into<String>) -> Self {
        SearchSession {
            id,
            name: name.into(),
            state: Mutex::new(SessionState::default()),
            cancel: CancellationToken::new(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Marks the session busy and re-arms its cancel token.
    ///
    /// A cancel issued after this returns applies to the claimed scan, even
    /// if that scan has not started running yet.
    fn try_claim(&self) -> MemoryResult<()> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(MemoryError::SessionBusy(self.id));
        }
        self.cancel.reset();
        Ok(())
    }

    /// Runs the next scan of this session.
    ///
    /// The first scan, and any `Changed`/`Unchanged` scan, walks the whole
    /// address space; later `Exact`/`Greater`/`Less` scans re-test only the
    /// current candidates. A cancelled or truncated scan still replaces the
    /// candidates with what it found.
    pub fn scan(
        &self,
        orchestrator: &ScanOrchestrator,
        access: &ProcessAccess,
        target: ScalarValue,
        mode: CompareMode,
        observer: &dyn ScanObserver,
    ) -> MemoryResult<ScanOutcome> {
        self.try_claim()?;
        let _busy = BusyGuard(&self.busy);
        self.run_claimed(orchestrator, access, target, mode, observer)
    }

    /// Claims the session for a scan that runs later, on another thread
    pub fn claim(self: &Arc<Self>) -> MemoryResult<ScanClaim> {
        self.try_claim()?;
        Ok(ScanClaim {
            session: Arc::clone(self),
        })
    }

    fn run_claimed(
        &self,
        orchestrator: &ScanOrchestrator,
        access: &ProcessAccess,
        target: ScalarValue,
        mode: CompareMode,
        observer: &dyn ScanObserver,
    ) -> MemoryResult<ScanOutcome> {
        let request = ScanRequest::new(target, mode);

        // Work on copies so snapshots stay available while the scan runs
        let (first, candidates, tracked) = {
            let state = self.state();
            if let Some(expected) = state.value_type {
                if !state.is_first_scan() && expected != request.value_type() {
                    return Err(MemoryError::TypeMismatch {
                        expected,
                        actual: request.value_type(),
                    });
                }
            }
            let first = state.is_first_scan();
            let candidates = (!first && !mode.forces_full_scan()).then(|| state.candidates.clone());
            let tracked =
                (!first && mode.requires_previous()).then(|| state.current_values.clone());
            (first, candidates, tracked)
        };

        let plan = match (&candidates, &tracked) {
            (Some(candidates), _) => ScanPlan::Narrow(candidates),
            (None, Some(tracked)) => ScanPlan::Full(Reference::Tracked(tracked)),
            (None, None) => ScanPlan::Full(Reference::Target),
        };

        debug!(session = self.id, first, %mode, "session scan");
        let results = orchestrator.run(access, &request, plan, &self.cancel, observer)?;

        let outcome = ScanOutcome {
            addresses: results.matches.iter().map(|m| m.address).collect(),
            status: results.status,
            full_scan: results.full_scan,
            regions_scanned: results.regions_scanned,
            bytes_scanned: results.bytes_scanned,
            addresses_checked: results.addresses_checked,
            elapsed: results.elapsed,
        };

        self.state().commit(&request, results);
        info!(
            session = self.id,
            name = %self.name,
            matches = outcome.len(),
            status = %outcome.status,
            "session updated"
        );
        Ok(outcome)
    }

    /// Requests cancellation of the running scan, if any
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_scanning(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Forgets all candidates and values; the next scan is a first scan
    pub fn clear(&self) {
        *self.state() = SessionState::default();
        debug!(session = self.id, "session cleared");
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.state().value_type
    }

    pub fn compare_mode(&self) -> Option<CompareMode> {
        self.state().compare_mode
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase()
    }

    pub fn is_first_scan(&self) -> bool {
        self.state().is_first_scan()
    }

    pub fn candidates(&self) -> Vec<Address> {
        self.state().candidates.clone()
    }

    pub fn candidate_count(&self) -> usize {
        self.state().candidates.len()
    }

    /// Value observed at `address` by the latest scan
    pub fn current_value(&self, address: Address) -> Option<ScalarValue> {
        self.state().current_values.get(&address).copied()
    }

    /// Value observed at `address` by the scan before the latest one
    pub fn previous_value(&self, address: Address) -> Option<ScalarValue> {
        self.state().prev_values.get(&address).copied()
    }

    /// Value observed at `address` by the first scan
    pub fn first_value(&self, address: Address) -> Option<ScalarValue> {
        self.state().first_values.get(&address).copied()
    }

    /// Serializable view with at most `limit` entries
    pub fn snapshot(&self, limit: usize) -> SessionSnapshot {
        let state = self.state();
        let entries = state
            .candidates
            .iter()
            .take(limit)
            .map(|address| SnapshotEntry {
                address: *address,
                first: state.first_values.get(address).copied(),
                previous: state.prev_values.get(address).copied(),
                current: state.current_values.get(address).copied(),
            })
            .collect();

        SessionSnapshot {
            id: self.id,
            name: self.name.clone(),
            phase: state.phase(),
            value_type: state.value_type,
            compare_mode: state.compare_mode,
            last_target: state.last_target,
            scan_count: state.scan_count,
            candidate_count: state.candidates.len(),
            entries,
        }
    }
}
