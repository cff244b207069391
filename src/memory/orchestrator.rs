//! Fans a scan out over a bounded worker pool
//!
//! Full scans are split into batches of whole regions, narrowing scans into
//! batches of candidate addresses. Each batch runs on the rayon pool; the
//! calling thread merges the partial results, checks for cancellation and
//! the match cap between batches, and reports progress.

use super::progress::{ProgressReporter, ScanObserver};
use super::regions::{MemoryRegion, RegionEnumerator};
use super::scanner::{Reference, ScanControl, Scanner};
use crate::core::types::{
    Address, MemoryError, MemoryResult, ScanEvent, ScanMatch, ScanRequest, ScanStatus,
};
use crate::process::{MemorySource, ProcessAccess};
use crate::session::CancellationToken;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tunables of the orchestrator
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub workers: usize,
    pub region_batch: usize,
    pub address_batch: usize,
    pub max_matches: usize,
    pub progress_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        OrchestratorSettings {
            workers: num_cpus::get().clamp(1, 8),
            region_batch: 16,
            address_batch: 4096,
            max_matches: 100_000,
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// Which addresses a scan looks at
#[derive(Debug, Clone, Copy)]
pub enum ScanPlan<'a> {
    /// Every aligned offset of every region
    Full(Reference<'a>),
    /// Only these addresses, in ascending order
    Narrow(&'a [Address]),
}

impl ScanPlan<'_> {
    pub fn is_full(&self) -> bool {
        matches!(self, ScanPlan::Full(_))
    }
}

/// Merged result of one orchestrated scan
#[derive(Debug, Clone)]
pub struct ScanResults {
    /// Matches in ascending address order
    pub matches: Vec<ScanMatch>,
    pub status: ScanStatus,
    pub full_scan: bool,
    pub regions_scanned: usize,
    pub bytes_scanned: u64,
    pub addresses_checked: u64,
    pub elapsed: Duration,
}

/// Runs scans on a dedicated rayon pool
pub struct ScanOrchestrator {
    pool: rayon::ThreadPool,
    scanner: Scanner,
    settings: OrchestratorSettings,
}

impl ScanOrchestrator {
    pub fn new(scanner: Scanner, settings: OrchestratorSettings) -> MemoryResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers.max(1))
            .thread_name(|i| format!("memscan-worker-{}", i))
            .build()
            .map_err(|e| MemoryError::UnsupportedOperation(format!("worker pool: {}", e)))?;

        Ok(ScanOrchestrator {
            pool,
            scanner,
            settings,
        })
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Runs one scan against the attached process.
    ///
    /// Fails only if nothing is attached; once started the scan always
    /// returns, possibly empty, cancelled or truncated.
    pub fn run(
        &self,
        access: &ProcessAccess,
        request: &ScanRequest,
        plan: ScanPlan<'_>,
        cancel: &CancellationToken,
        observer: &dyn ScanObserver,
    ) -> MemoryResult<ScanResults> {
        let handle = access.require()?;
        let source = handle.source();
        let started = Instant::now();
        let control = ScanControl::new(cancel.clone(), self.settings.max_matches);

        debug!(
            pattern = %hex::encode(request.target.to_bytes()),
            value_type = %request.value_type(),
            mode = %request.mode,
            full = plan.is_full(),
            "scan starting"
        );

        let mut results = match plan {
            ScanPlan::Full(reference) => {
                let regions: Vec<MemoryRegion> = RegionEnumerator::new(source).collect();
                let total: u64 = regions
                    .iter()
                    .map(|r| self.scanner.region_read_len(r) as u64)
                    .sum();
                observer.notify(ScanEvent::Started {
                    total,
                    full_scan: true,
                });
                let progress = ProgressReporter::new(observer, total, self.settings.progress_interval);
                let results =
                    self.run_full(source, &regions, request, reference, &control, &progress);
                self.finish(results, &control, observer, &progress)
            }
            ScanPlan::Narrow(candidates) => {
                let total = candidates.len() as u64;
                observer.notify(ScanEvent::Started {
                    total,
                    full_scan: false,
                });
                let progress = ProgressReporter::new(observer, total, self.settings.progress_interval);
                let results = self.run_narrow(source, candidates, request, &control, &progress);
                self.finish(results, &control, observer, &progress)
            }
        };

        results.elapsed = started.elapsed();
        info!(
            matches = results.matches.len(),
            status = %results.status,
            regions = results.regions_scanned,
            bytes = results.bytes_scanned,
            addresses = results.addresses_checked,
            elapsed_ms = results.elapsed.as_millis() as u64,
            "scan finished"
        );
        Ok(results)
    }

    fn run_full(
        &self,
        source: &dyn MemorySource,
        regions: &[MemoryRegion],
        request: &ScanRequest,
        reference: Reference<'_>,
        control: &ScanControl,
        progress: &ProgressReporter<'_>,
    ) -> ScanResults {
        let mut results = ScanResults::empty(true);

        for batch in regions.chunks(self.settings.region_batch.max(1)) {
            if control.should_stop() {
                break;
            }

            let partials: Vec<_> = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|region| {
                        let scan =
                            self.scanner
                                .scan_region(source, region, request, reference, control);
                        progress.advance(self.scanner.region_read_len(region) as u64, scan.matches.len());
                        scan
                    })
                    .collect()
            });

            for scan in partials {
                results.regions_scanned += 1;
                results.bytes_scanned += scan.bytes;
                results.matches.extend(scan.matches);
            }
            debug!(
                regions = results.regions_scanned,
                matches = results.matches.len(),
                "region batch merged"
            );
        }

        results
    }

    fn run_narrow(
        &self,
        source: &dyn MemorySource,
        candidates: &[Address],
        request: &ScanRequest,
        control: &ScanControl,
        progress: &ProgressReporter<'_>,
    ) -> ScanResults {
        let mut results = ScanResults::empty(false);
        let batch_size = self.settings.address_batch.max(1);
        let per_worker = batch_size
            .div_ceil(self.settings.workers.max(1))
            .max(1);

        for batch in candidates.chunks(batch_size) {
            if control.should_stop() {
                break;
            }

            let partials: Vec<_> = self.pool.install(|| {
                batch
                    .par_chunks(per_worker)
                    .map(|chunk| {
                        let scan = self.scanner.check_addresses(source, chunk, request, control);
                        progress.advance(scan.checked, scan.matches.len());
                        scan
                    })
                    .collect()
            });

            for scan in partials {
                results.addresses_checked += scan.checked;
                results.matches.extend(scan.matches);
            }
        }

        results
    }

    fn finish(
        &self,
        mut results: ScanResults,
        control: &ScanControl,
        observer: &dyn ScanObserver,
        progress: &ProgressReporter<'_>,
    ) -> ScanResults {
        results.matches.sort_unstable_by_key(|m| m.address);
        results.matches.dedup_by_key(|m| m.address);

        results.status = if control.is_truncated() {
            let limit = control.limit();
            warn!("{}", MemoryError::Truncated { limit });
            observer.notify(ScanEvent::Truncated { limit });
            ScanStatus::Truncated { limit }
        } else if control.is_cancelled() {
            ScanStatus::Cancelled
        } else {
            ScanStatus::Completed
        };

        progress.finish(results.matches.len(), results.status);
        results
    }
}

impl ScanResults {
    fn empty(full_scan: bool) -> Self {
        ScanResults {
            matches: Vec::new(),
            status: ScanStatus::Completed,
            full_scan,
            regions_scanned: 0,
            bytes_scanned: 0,
            addresses_checked: 0,
            elapsed: Duration::ZERO,
        }
    }
}
