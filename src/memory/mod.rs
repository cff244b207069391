//! Memory scanning
//!
//! This module provides the scanning pipeline over an attached process:
//! - Region enumeration over the target's address space
//! - Typed encode/decode and tolerant comparison of values
//! - Per-region and per-candidate scanning
//! - A worker pool that batches regions and candidates and merges results
//! - Throttled progress reporting

pub mod codec;
pub mod orchestrator;
pub mod progress;
pub mod regions;
pub mod scanner;

pub use codec::{Tolerance, ValueCodec};
pub use orchestrator::{OrchestratorSettings, ScanOrchestrator, ScanPlan, ScanResults};
pub use progress::{NoopObserver, ProgressReporter, RecordingObserver, ScanObserver};
pub use regions::{collect_regions, MemoryRegion, RegionEnumerator};
pub use scanner::{Reference, ScanControl, Scanner, DEFAULT_MAX_REGION_READ};
