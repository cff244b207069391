//! Background thread that ticks the lock registry

use super::registry::LockRegistry;
use crate::process::ProcessAccess;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Default pause between two ticks
pub const DEFAULT_LOCK_INTERVAL: Duration = Duration::from_millis(100);

/// Runs [`LockRegistry::tick`] every `interval` until stopped or dropped
pub struct LockWriter {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl LockWriter {
    pub fn start(
        registry: Arc<LockRegistry>,
        access: Arc<ProcessAccess>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("memscan-lock-writer".to_string())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "lock writer started");
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if !registry.is_empty() {
                                registry.tick(&access);
                            }
                        }
                        // Explicit stop or the owner went away
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("lock writer stopped");
            })?;

        Ok(LockWriter {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the thread and waits for it to exit
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for LockWriter {
    fn drop(&mut self) {
        self.stop();
    }
}
