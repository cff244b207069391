//! Scan event delivery and throttled progress reporting

use crate::core::types::{ScanEvent, ScanStatus};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Receives events while a scan runs.
///
/// Called from scan worker threads; implementations must not block.
pub trait ScanObserver: Send + Sync {
    fn notify(&self, event: ScanEvent);
}

impl ScanObserver for UnboundedSender<ScanEvent> {
    fn notify(&self, event: ScanEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.send(event);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {
    fn notify(&self, _event: ScanEvent) {}
}

/// Collects every event, for inspection after the scan
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ScanEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ScanObserver for RecordingObserver {
    fn notify(&self, event: ScanEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Shared progress counter that forwards throttled `Progress` events.
///
/// `checked` only grows. The first update and the final one are always
/// delivered; in between at most one update per `interval`.
pub struct ProgressReporter<'a> {
    observer: &'a dyn ScanObserver,
    total: u64,
    checked: AtomicU64,
    matches: AtomicUsize,
    interval: Duration,
    last_sent: Mutex<Option<Instant>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(observer: &'a dyn ScanObserver, total: u64, interval: Duration) -> Self {
        ProgressReporter {
            observer,
            total,
            checked: AtomicU64::new(0),
            matches: AtomicUsize::new(0),
            interval,
            last_sent: Mutex::new(None),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn checked(&self) -> u64 {
        self.checked.load(Ordering::Relaxed)
    }

    /// Adds `amount` units of work and `new_matches` matches
    pub fn advance(&self, amount: u64, new_matches: usize) {
        self.checked.fetch_add(amount, Ordering::Relaxed);
        self.matches.fetch_add(new_matches, Ordering::Relaxed);
        self.report();
    }

    fn report(&self) {
        // Skip rather than wait when another worker is reporting
        let Ok(mut last) = self.last_sent.try_lock() else {
            return;
        };
        let due = last.map_or(true, |at| at.elapsed() >= self.interval);
        if due {
            *last = Some(Instant::now());
            // Counters are read under the lock so reports never go backwards
            self.observer.notify(ScanEvent::Progress {
                checked: self.checked().min(self.total),
                total: self.total,
                matches: self.matches.load(Ordering::Relaxed),
            });
        }
    }

    /// Sends the final progress update and the `Finished` event
    pub fn finish(&self, matches: usize, status: ScanStatus) {
        let checked = match status {
            ScanStatus::Completed => self.total,
            _ => self.checked().min(self.total),
        };
        self.observer.notify(ScanEvent::Progress {
            checked,
            total: self.total,
            matches,
        });
        self.observer.notify(ScanEvent::Finished { matches, status });
    }
}
