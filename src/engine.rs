//! The engine facade
//!
//! [`MemoryEngine`] wires the process access, sessions, scan orchestrator
//! and lock writer together behind one handle.

use crate::config::Config;
use crate::core::types::{
    Address, CompareMode, MemoryResult, ScalarValue, ScanEvent, ScanOutcome, SessionId, ValueType,
};
use crate::lock::{LockEntry, LockRegistry, LockWriter};
use crate::memory::codec::ValueCodec;
use crate::memory::orchestrator::ScanOrchestrator;
use crate::memory::progress::ScanObserver;
use crate::memory::scanner::Scanner;
use crate::process::{MemorySource, ProcessAccess};
use crate::session::{SearchSession, SessionRegistry};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Attach, scan, read, write and lock through one object
pub struct MemoryEngine {
    config: Config,
    access: Arc<ProcessAccess>,
    orchestrator: Arc<ScanOrchestrator>,
    sessions: SessionRegistry,
    locks: Arc<LockRegistry>,
    writer: Mutex<Option<LockWriter>>,
}

impl MemoryEngine {
    /// Creates an engine with the default configuration
    pub fn new() -> MemoryResult<Self> {
        Self::with_config(Config::default())
    }

    /// Creates an engine from `config`.
    ///
    /// The config is expected to have passed validation.
    pub fn with_config(config: Config) -> MemoryResult<Self> {
        let codec = ValueCodec::new(config.tolerance());
        let scanner = Scanner::new(
            codec,
            config.scanner.max_region_read,
            config.scanner.read_chunk_size,
        );
        let orchestrator = ScanOrchestrator::new(scanner, config.orchestrator_settings())?;

        Ok(MemoryEngine {
            access: Arc::new(ProcessAccess::with_read_chunk(config.scanner.read_chunk_size)),
            orchestrator: Arc::new(orchestrator),
            sessions: SessionRegistry::new(),
            locks: Arc::new(LockRegistry::new()),
            writer: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn access(&self) -> &ProcessAccess {
        &self.access
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    fn codec(&self) -> &ValueCodec {
        self.orchestrator.scanner().codec()
    }

    fn writer(&self) -> MutexGuard<'_, Option<LockWriter>> {
        match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Opens `pid` and starts the lock writer.
    ///
    /// Any previous target is detached first, dropping its locks.
    pub fn attach(&self, pid: u32) -> MemoryResult<()> {
        let source = crate::process::open_native(pid)?;
        self.attach_source(source)
    }

    /// Attaches an already opened backend and starts the lock writer
    pub fn attach_source(&self, source: Arc<dyn MemorySource>) -> MemoryResult<()> {
        if self.access.is_attached() {
            self.detach();
        }
        self.access.attach_source(source);

        let writer = LockWriter::start(
            Arc::clone(&self.locks),
            Arc::clone(&self.access),
            self.config.lock_interval(),
        )?;
        *self.writer() = Some(writer);
        Ok(())
    }

    /// Stops the lock writer, clears every lock and releases the target
    pub fn detach(&self) {
        if let Some(mut writer) = self.writer().take() {
            writer.stop();
        }
        self.locks.clear();
        if let Some(pid) = self.access.pid() {
            info!(pid, "detaching");
        }
        self.access.detach();
    }

    pub fn is_attached(&self) -> bool {
        self.access.is_attached()
    }

    pub fn pid(&self) -> Option<u32> {
        self.access.pid()
    }

    pub fn create_session(&self, name: impl Into<String>) -> Arc<SearchSession> {
        self.sessions.create(name)
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<SearchSession>> {
        self.sessions.get(id)
    }

    /// Drops the registry's reference and cancels any running scan
    pub fn remove_session(&self, id: SessionId) -> bool {
        self.sessions.remove(id)
    }

    /// Runs the session's next scan on the calling thread
    pub fn scan(
        &self,
        session: &SearchSession,
        value: ScalarValue,
        mode: CompareMode,
        observer: &dyn ScanObserver,
    ) -> MemoryResult<ScanOutcome> {
        session.scan(&self.orchestrator, &self.access, value, mode, observer)
    }

    /// Runs the session's next scan on tokio's blocking pool.
    ///
    /// The session is claimed before this returns, so a cancel issued right
    /// after still stops the scan while it waits for a blocking thread.
    /// Events arrive on the returned receiver until the scan ends. Must be
    /// called from within a tokio runtime.
    pub fn spawn_scan(
        &self,
        session: Arc<SearchSession>,
        value: ScalarValue,
        mode: CompareMode,
    ) -> (
        JoinHandle<MemoryResult<ScanOutcome>>,
        UnboundedReceiver<ScanEvent>,
    ) {
        let (events, receiver) = mpsc::unbounded_channel();
        let orchestrator = Arc::clone(&self.orchestrator);
        let access = Arc::clone(&self.access);

        let claim = match session.claim() {
            Ok(claim) => claim,
            Err(e) => return (tokio::spawn(async move { Err(e) }), receiver),
        };
        let task = tokio::task::spawn_blocking(move || {
            claim.run(&orchestrator, &access, value, mode, &events)
        });
        (task, receiver)
    }

    /// Reads and decodes one value; `None` if unreadable or invalid
    pub fn read_value(&self, address: Address, value_type: ValueType) -> Option<ScalarValue> {
        let bytes = self.access.read(address, value_type.size())?;
        self.codec().decode(&bytes, value_type)
    }

    /// Writes `value` as `value_type`, casting it first
    pub fn write_value(&self, address: Address, value_type: ValueType, value: ScalarValue) -> bool {
        let value = match value.cast(value_type) {
            Ok(value) => value,
            Err(e) => {
                debug!(%address, error = %e, "write rejected");
                return false;
            }
        };
        self.access.write(address, &self.codec().encode(value))
    }

    /// Pins `value`, cast to `value_type`, at `address`
    pub fn lock(&self, address: Address, value: ScalarValue, value_type: ValueType) -> MemoryResult<()> {
        self.access.require()?;
        let value = value.cast(value_type)?;
        self.locks.lock(address, value, value_type);
        Ok(())
    }

    pub fn unlock(&self, address: Address) -> bool {
        self.locks.unlock(address)
    }

    /// Current locks in address order
    pub fn locked(&self) -> Vec<LockEntry> {
        self.locks.entries_snapshot()
    }

    /// Cancels the running scan of one session
    pub fn cancel(&self, id: SessionId) -> bool {
        self.sessions.cancel(id)
    }

    /// Cancels every session's running scan; returns how many were signalled
    pub fn cancel_all(&self) -> usize {
        self.sessions.cancel_all()
    }
}

impl Drop for MemoryEngine {
    fn drop(&mut self) {
        self.cancel_all();
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MemoryError, ScanStatus};
    use crate::memory::progress::NoopObserver;
    use crate::process::{Protection, SimulatedProcess};
    use std::time::Duration;

    fn simulated() -> Arc<SimulatedProcess> {
        let mut data = vec![0u8; 0x4000];
        data[0x100..0x104].copy_from_slice(&1000i32.to_le_bytes());
        Arc::new(
            SimulatedProcess::builder(77)
                .region_data(0x10000, data, Protection::READ_WRITE)
                .build()
                .unwrap(),
        )
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.lock.interval_ms = 10;
        config.scanner.max_workers = 2;
        config
    }

    #[test]
    fn test_attach_and_detach() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        assert!(!engine.is_attached());

        engine.attach_source(simulated()).unwrap();
        assert_eq!(engine.pid(), Some(77));
        assert!(engine.writer().as_ref().is_some_and(|w| w.is_running()));

        engine.detach();
        assert!(!engine.is_attached());
        assert!(engine.writer().is_none());
    }

    #[test]
    fn test_read_write_value() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        engine.attach_source(simulated()).unwrap();

        let address = Address::new(0x10100);
        assert_eq!(
            engine.read_value(address, ValueType::Int32),
            Some(ScalarValue::Int32(1000))
        );

        assert!(engine.write_value(address, ValueType::Float32, ScalarValue::Int32(3)));
        assert_eq!(
            engine.read_value(address, ValueType::Float32),
            Some(ScalarValue::Float32(3.0))
        );
    }

    #[test]
    fn test_write_value_rejects_uncastable() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        engine.attach_source(simulated()).unwrap();
        let huge = ScalarValue::Float64(1e20);
        assert!(!engine.write_value(Address::new(0x10100), ValueType::Int32, huge));
    }

    #[test]
    fn test_lock_requires_attach() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        let result = engine.lock(Address::new(0x10100), ScalarValue::Int32(5), ValueType::Int32);
        assert!(matches!(result, Err(MemoryError::NotAttached)));
    }

    #[test]
    fn test_lock_restores_value() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        let sim = simulated();
        engine.attach_source(sim.clone()).unwrap();

        engine
            .lock(Address::new(0x10100), ScalarValue::Int32(42), ValueType::Int32)
            .unwrap();
        sim.poke(0x10100, &7i32.to_le_bytes());
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(sim.peek(0x10100, 4).unwrap(), 42i32.to_le_bytes().to_vec());
        assert_eq!(engine.locked().len(), 1);
    }

    #[test]
    fn test_detach_clears_locks() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        engine.attach_source(simulated()).unwrap();
        engine
            .lock(Address::new(0x10100), ScalarValue::Int32(1), ValueType::Int32)
            .unwrap();

        engine.detach();
        assert!(engine.locked().is_empty());
    }

    #[test]
    fn test_scan_through_engine() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        engine.attach_source(simulated()).unwrap();
        let session = engine.create_session("hp");

        let outcome = engine
            .scan(&session, ScalarValue::Int32(1000), CompareMode::Exact, &NoopObserver)
            .unwrap();
        assert_eq!(outcome.addresses, vec![Address::new(0x10100)]);
        assert_eq!(outcome.status, ScanStatus::Completed);
    }

    #[test]
    fn test_scan_detached_fails() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        let session = engine.create_session("hp");
        let result = engine.scan(&session, ScalarValue::Int32(1), CompareMode::Exact, &NoopObserver);
        assert!(matches!(result, Err(MemoryError::NotAttached)));
    }

    #[test]
    fn test_remove_session() {
        let engine = MemoryEngine::with_config(fast_config()).unwrap();
        let session = engine.create_session("a");
        assert!(engine.session(session.id()).is_some());
        assert!(engine.remove_session(session.id()));
        assert!(engine.session(session.id()).is_none());
    }
}
