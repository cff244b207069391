//! Per-region and per-address value matching
//!
//! The [`Scanner`] does the work of a single worker: test every aligned
//! offset of one region, or re-test one batch of candidate addresses. The
//! orchestrator fans these calls out over the worker pool.

use super::codec::ValueCodec;
use super::regions::MemoryRegion;
use crate::core::types::{Address, CompareMode, ScalarValue, ScanMatch, ScanRequest, ValueType};
use crate::process::access::read_chunked;
use crate::process::{MemorySource, DEFAULT_READ_CHUNK};
use crate::session::CancellationToken;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::trace;

/// Default cap on bytes read from a single region
pub const DEFAULT_MAX_REGION_READ: usize = 64 * 1024 * 1024;

/// Offsets tested between two cancellation checks
const CHECK_INTERVAL: usize = 4096;

/// What a full scan compares each value against
#[derive(Debug, Clone, Copy)]
pub enum Reference<'a> {
    /// The request's target value
    Target,
    /// Per-address values from the previous scan; untracked addresses are skipped
    Tracked(&'a BTreeMap<Address, ScalarValue>),
}

/// Stop conditions shared by every worker of one scan
#[derive(Debug)]
pub struct ScanControl {
    cancel: CancellationToken,
    found: AtomicUsize,
    limit: usize,
    truncated: AtomicBool,
}

impl ScanControl {
    pub fn new(cancel: CancellationToken, limit: usize) -> Self {
        ScanControl {
            cancel,
            found: AtomicUsize::new(0),
            limit,
            truncated: AtomicBool::new(false),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated.load(Ordering::Relaxed)
    }

    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.is_truncated()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Reserves room for one more match; false once the cap is reached
    pub fn claim_match(&self) -> bool {
        if self.found.fetch_add(1, Ordering::Relaxed) < self.limit {
            true
        } else {
            self.truncated.store(true, Ordering::Relaxed);
            false
        }
    }
}

/// Matches and byte count of one region
#[derive(Debug, Default)]
pub struct RegionScan {
    pub matches: Vec<ScanMatch>,
    pub bytes: u64,
}

/// Matches and address count of one candidate batch
#[derive(Debug, Default)]
pub struct CandidateScan {
    pub matches: Vec<ScanMatch>,
    pub checked: u64,
}

/// Matches values in raw target memory
#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    codec: ValueCodec,
    max_region_read: usize,
    read_chunk: usize,
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new(ValueCodec::default(), DEFAULT_MAX_REGION_READ, DEFAULT_READ_CHUNK)
    }
}

impl Scanner {
    pub fn new(codec: ValueCodec, max_region_read: usize, read_chunk: usize) -> Self {
        Scanner {
            codec,
            max_region_read: max_region_read.max(1),
            read_chunk: read_chunk.max(1),
        }
    }

    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Bytes a full scan reads from `region`
    pub fn region_read_len(&self, region: &MemoryRegion) -> usize {
        region.size.min(self.max_region_read)
    }

    /// Tests every aligned offset of `region`
    pub fn scan_region(
        &self,
        source: &dyn MemorySource,
        region: &MemoryRegion,
        request: &ScanRequest,
        reference: Reference<'_>,
        control: &ScanControl,
    ) -> RegionScan {
        let len = self.region_read_len(region);
        let Some(buffer) = read_chunked(source, region.base, len, self.read_chunk) else {
            trace!(base = %region.base, len, "region unreadable, skipped");
            return RegionScan::default();
        };

        let matches = match reference {
            Reference::Tracked(values) => {
                self.match_tracked(region.base, &buffer, request, values, control)
            }
            Reference::Target => self.match_target(region.base, &buffer, request, control),
        };

        RegionScan {
            matches,
            bytes: buffer.len() as u64,
        }
    }

    fn match_target(
        &self,
        base: Address,
        buffer: &[u8],
        request: &ScanRequest,
        control: &ScanControl,
    ) -> Vec<ScanMatch> {
        let value_type = request.value_type();
        let size = value_type.size();
        let first = base.align_up(value_type.alignment()).offset_from(base);
        let mut matches = Vec::new();

        if buffer.len() < first + size {
            return matches;
        }

        let offsets = (first..=buffer.len() - size).step_by(value_type.alignment());

        // Raw byte comparison is exact for integers
        if value_type == ValueType::Int32 && request.mode == CompareMode::Exact {
            let needle = self.codec.encode(request.target);
            for (n, offset) in offsets.enumerate() {
                if n % CHECK_INTERVAL == 0 && control.should_stop() {
                    break;
                }
                if buffer[offset..offset + size] == needle[..] {
                    if !control.claim_match() {
                        break;
                    }
                    matches.push(ScanMatch::new(base.saturating_add(offset), request.target));
                }
            }
            return matches;
        }

        for (n, offset) in offsets.enumerate() {
            if n % CHECK_INTERVAL == 0 && control.should_stop() {
                break;
            }
            let Some(current) = self.codec.decode(&buffer[offset..offset + size], value_type)
            else {
                continue;
            };
            if self.codec.compare(current, request.target, request.mode) {
                if !control.claim_match() {
                    break;
                }
                matches.push(ScanMatch::new(base.saturating_add(offset), current));
            }
        }
        matches
    }

    fn match_tracked(
        &self,
        base: Address,
        buffer: &[u8],
        request: &ScanRequest,
        values: &BTreeMap<Address, ScalarValue>,
        control: &ScanControl,
    ) -> Vec<ScanMatch> {
        let value_type = request.value_type();
        let size = value_type.size();
        let end = base.saturating_add(buffer.len());
        let mut matches = Vec::new();

        for (n, (&address, &previous)) in values.range(base..end).enumerate() {
            if n % CHECK_INTERVAL == 0 && control.should_stop() {
                break;
            }
            let offset = address.offset_from(base);
            if offset + size > buffer.len() {
                continue;
            }
            let Some(current) = self.codec.decode(&buffer[offset..offset + size], value_type)
            else {
                continue;
            };
            if self.codec.compare(current, previous, request.mode) {
                if !control.claim_match() {
                    break;
                }
                matches.push(ScanMatch::new(address, current));
            }
        }
        matches
    }

    /// Re-reads and re-tests each of `addresses`
    pub fn check_addresses(
        &self,
        source: &dyn MemorySource,
        addresses: &[Address],
        request: &ScanRequest,
        control: &ScanControl,
    ) -> CandidateScan {
        let value_type = request.value_type();
        let size = value_type.size();
        let mut scan = CandidateScan::default();
        let mut raw = [0u8; 8];

        for (n, &address) in addresses.iter().enumerate() {
            if n % CHECK_INTERVAL == 0 && control.should_stop() {
                break;
            }
            scan.checked += 1;

            let buffer = &mut raw[..size];
            match source.read(address, buffer) {
                Ok(read) if read == size => {}
                _ => continue,
            }
            let Some(current) = self.codec.decode(buffer, value_type) else {
                continue;
            };
            if self.codec.compare(current, request.target, request.mode) {
                if !control.claim_match() {
                    break;
                }
                scan.matches.push(ScanMatch::new(address, current));
            }
        }
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::regions::RegionEnumerator;
    use crate::process::{Protection, SimulatedProcess};

    fn process_with(values: &[(usize, &[u8])]) -> SimulatedProcess {
        let sim = SimulatedProcess::builder(1)
            .region(0x10000, 0x1000, Protection::READ_WRITE)
            .build()
            .unwrap();
        for (address, bytes) in values {
            assert!(sim.poke(*address, bytes));
        }
        sim
    }

    fn region(sim: &SimulatedProcess) -> MemoryRegion {
        RegionEnumerator::new(sim).next().unwrap()
    }

    fn control() -> ScanControl {
        ScanControl::new(CancellationToken::new(), usize::MAX)
    }

    #[test]
    fn test_int32_exact_fast_path() {
        let sim = process_with(&[
            (0x10100, &1000i32.to_le_bytes()),
            (0x10800, &1000i32.to_le_bytes()),
            // Unaligned copy must not match
            (0x10202, &1000i32.to_le_bytes()),
        ]);
        let request = ScanRequest::new(ScalarValue::Int32(1000), CompareMode::Exact);
        let scan = Scanner::default().scan_region(&sim, &region(&sim), &request, Reference::Target, &control());

        let addresses: Vec<usize> = scan.matches.iter().map(|m| m.address.as_usize()).collect();
        assert_eq!(addresses, vec![0x10100, 0x10800]);
        assert_eq!(scan.bytes, 0x1000);
    }

    #[test]
    fn test_float_scan_uses_tolerance() {
        let sim = process_with(&[(0x10010, &100.005f32.to_le_bytes())]);
        let request = ScanRequest::new(ScalarValue::Float32(100.0), CompareMode::Exact);
        let scan = Scanner::default().scan_region(&sim, &region(&sim), &request, Reference::Target, &control());

        assert_eq!(scan.matches.len(), 1);
        assert_eq!(scan.matches[0].value, ScalarValue::Float32(100.005));
    }

    #[test]
    fn test_greater_scan() {
        let sim = process_with(&[(0x10000, &5i32.to_le_bytes()), (0x10004, &9i32.to_le_bytes())]);
        let request = ScanRequest::new(ScalarValue::Int32(6), CompareMode::Greater);
        let scan = Scanner::default().scan_region(&sim, &region(&sim), &request, Reference::Target, &control());

        assert_eq!(scan.matches, vec![ScanMatch::new(Address::new(0x10004), ScalarValue::Int32(9))]);
    }

    #[test]
    fn test_tracked_reference_only_tests_tracked_addresses() {
        let sim = process_with(&[(0x10000, &1i32.to_le_bytes()), (0x10004, &2i32.to_le_bytes())]);
        let mut tracked = BTreeMap::new();
        tracked.insert(Address::new(0x10000), ScalarValue::Int32(1));
        tracked.insert(Address::new(0x10004), ScalarValue::Int32(7));

        let request = ScanRequest::new(ScalarValue::Int32(0), CompareMode::Changed);
        let scan = Scanner::default().scan_region(
            &sim,
            &region(&sim),
            &request,
            Reference::Tracked(&tracked),
            &control(),
        );
        assert_eq!(scan.matches, vec![ScanMatch::new(Address::new(0x10004), ScalarValue::Int32(2))]);
    }

    #[test]
    fn test_region_read_is_capped() {
        let sim = SimulatedProcess::builder(1)
            .region(0x10000, 0x4000, Protection::READ_WRITE)
            .build()
            .unwrap();
        sim.poke(0x13000, &42i32.to_le_bytes());

        let scanner = Scanner::new(ValueCodec::default(), 0x2000, 0x1000);
        let request = ScanRequest::new(ScalarValue::Int32(42), CompareMode::Exact);
        let scan = scanner.scan_region(&sim, &region(&sim), &request, Reference::Target, &control());

        assert_eq!(scan.bytes, 0x2000);
        assert!(scan.matches.is_empty());
    }

    #[test]
    fn test_unreadable_region_is_skipped() {
        let sim = SimulatedProcess::builder(1)
            .region(0x10000, 0x1000, Protection::WRITE_ONLY)
            .build()
            .unwrap();
        let request = ScanRequest::new(ScalarValue::Int32(0), CompareMode::Exact);
        let scan = Scanner::default().scan_region(&sim, &region(&sim), &request, Reference::Target, &control());
        assert_eq!(scan.bytes, 0);
        assert!(scan.matches.is_empty());
    }

    #[test]
    fn test_match_cap() {
        let sim = process_with(&[]);
        let request = ScanRequest::new(ScalarValue::Int32(0), CompareMode::Exact);
        let control = ScanControl::new(CancellationToken::new(), 10);
        let scan = Scanner::default().scan_region(&sim, &region(&sim), &request, Reference::Target, &control);

        assert_eq!(scan.matches.len(), 10);
        assert!(control.is_truncated());
    }

    #[test]
    fn test_cancelled_before_start() {
        let sim = process_with(&[]);
        let token = CancellationToken::new();
        token.cancel();
        let control = ScanControl::new(token, usize::MAX);
        let request = ScanRequest::new(ScalarValue::Int32(0), CompareMode::Exact);

        let scan = Scanner::default().scan_region(&sim, &region(&sim), &request, Reference::Target, &control);
        assert!(scan.matches.is_empty());
    }

    #[test]
    fn test_check_addresses() {
        let sim = process_with(&[(0x10000, &3i32.to_le_bytes()), (0x10008, &4i32.to_le_bytes())]);
        let request = ScanRequest::new(ScalarValue::Int32(4), CompareMode::Exact);
        let candidates = [Address::new(0x10000), Address::new(0x10008), Address::new(0x90000)];

        let scan = Scanner::default().check_addresses(&sim, &candidates, &request, &control());
        assert_eq!(scan.checked, 3);
        assert_eq!(scan.matches, vec![ScanMatch::new(Address::new(0x10008), ScalarValue::Int32(4))]);
    }
}
