use anyhow::{anyhow, bail, Context, Result};
use memscan::config::{load_config, validate_config, Config, ConfigLoader};
use memscan::{
    Address, CompareMode, MemoryEngine, Protection, ScalarValue, ScanEvent, SearchSession,
    SimulatedProcess, ValueType,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  attach <pid>|sim             open a process (sim: built-in demo target)
  detach                       stop locks and release the process
  new <name>                   create a session and switch to it
  use <id>                     switch to another session
  sessions                     list sessions
  scan <type> <value> [mode]   start over with a full scan (type: int32|float32|float64)
  next [value] [mode]          narrow the current session (mode: exact|greater|less|changed|unchanged)
  show [n]                     print the current session as JSON (default 20 entries)
  clear                        reset the current session
  stop                         cancel the current session's scan
  stopall                      cancel every running scan
  read <addr> <type>           read one value
  write <addr> <type> <value>  write one value
  lock <addr> <type> <value>   keep writing a value
  unlock <addr>                remove a lock
  locks                        list locks
  help                         this text
  quit                         exit";

fn parse_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("usage: memscan [--config <path>]\n\n{}", HELP);
                std::process::exit(0);
            }
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(config)
}

fn load(path: Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => ConfigLoader::new(&path)
            .load()
            .with_context(|| format!("loading {}", path.display()))?,
        None => load_config()?,
    };
    validate_config(&config)?;
    Ok(config)
}

/// Demo target: a small heap with a few known values
fn demo_process() -> Result<SimulatedProcess> {
    let mut heap = vec![0u8; 0x10000];
    heap[0x100..0x104].copy_from_slice(&1000i32.to_le_bytes());
    heap[0x2000..0x2004].copy_from_slice(&1000i32.to_le_bytes());
    heap[0x3000..0x3004].copy_from_slice(&100.0f32.to_le_bytes());
    heap[0x4000..0x4008].copy_from_slice(&3.5f64.to_le_bytes());

    let mut stack = vec![0u8; 0x4000];
    stack[0x10..0x14].copy_from_slice(&1000i32.to_le_bytes());

    Ok(SimulatedProcess::builder(std::process::id())
        .region_data(0x0040_0000, heap, Protection::READ_WRITE)
        .region(0x0050_0000, 0x2000, Protection::READ_ONLY)
        .reserved(0x0060_0000, 0x10000)
        .region_data(0x7FF0_0000, stack, Protection::READ_WRITE)
        .build()?)
}

struct Console {
    engine: Arc<MemoryEngine>,
    /// The registry only holds weak references
    sessions: Vec<Arc<SearchSession>>,
    current: Option<Arc<SearchSession>>,
}

impl Console {
    fn session(&self) -> Result<Arc<SearchSession>> {
        self.current
            .clone()
            .ok_or_else(|| anyhow!("no session; create one with 'new <name>'"))
    }

    /// Returns false when the console should exit
    fn execute(&mut self, line: &str) -> Result<bool> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            return Ok(true);
        };

        match (command, args) {
            ("quit" | "exit", _) => return Ok(false),
            ("help", _) => println!("{}", HELP),
            ("attach", ["sim"]) => {
                self.engine.attach_source(Arc::new(demo_process()?))?;
                println!("attached to simulated process");
            }
            ("attach", [pid]) => {
                let pid: u32 = pid.parse().context("pid must be a number")?;
                self.engine.attach(pid)?;
                println!("attached to {}", pid);
            }
            ("detach", []) => {
                self.engine.detach();
                println!("detached");
            }
            ("new", [name]) => {
                let session = self.engine.create_session(*name);
                println!("session {} '{}'", session.id(), session.name());
                self.sessions.push(session.clone());
                self.current = Some(session);
            }
            ("use", [id]) => {
                let id: u64 = id.parse().context("session id must be a number")?;
                let session = self
                    .engine
                    .session(id)
                    .ok_or_else(|| anyhow!("no session {}", id))?;
                println!("using session {} '{}'", session.id(), session.name());
                self.current = Some(session);
            }
            ("sessions", []) => {
                for session in self.engine.sessions().list() {
                    println!(
                        "{:>4}  {:<16} {:?} candidates={}{}",
                        session.id(),
                        session.name(),
                        session.phase(),
                        session.candidate_count(),
                        if session.is_scanning() { " (scanning)" } else { "" }
                    );
                }
            }
            ("scan", [value_type, value, rest @ ..]) => {
                let session = self.session()?;
                let value_type: ValueType = value_type.parse()?;
                let target = ScalarValue::parse(value, value_type)?;
                let mode = parse_mode(rest.first())?;
                session.clear();
                self.spawn(session, target, mode);
            }
            ("next", rest) => {
                let session = self.session()?;
                let value_type = session
                    .value_type()
                    .ok_or_else(|| anyhow!("no first scan yet; use 'scan'"))?;
                let (target, mode) = match rest {
                    [] => (last_target(&session)?, CompareMode::Exact),
                    [word] => match word.parse::<CompareMode>() {
                        Ok(mode) => (last_target(&session)?, mode),
                        Err(_) => (ScalarValue::parse(word, value_type)?, CompareMode::Exact),
                    },
                    [value, mode, ..] => {
                        (ScalarValue::parse(value, value_type)?, mode.parse::<CompareMode>()?)
                    }
                };
                self.spawn(session, target, mode);
            }
            ("show", rest) => {
                let session = self.session()?;
                let limit = match rest.first() {
                    Some(n) => n.parse::<usize>().context("limit must be a number")?,
                    None => 20,
                };
                println!("{}", serde_json::to_string_pretty(&session.snapshot(limit))?);
            }
            ("clear", []) => {
                self.session()?.clear();
                println!("session cleared");
            }
            ("stop", []) => self.session()?.cancel(),
            ("stopall", []) => {
                let cancelled = self.engine.cancel_all();
                println!("signalled {} session(s)", cancelled);
            }
            ("read", [address, value_type]) => {
                let address: Address = address.parse()?;
                let value_type: ValueType = value_type.parse()?;
                match self.engine.read_value(address, value_type) {
                    Some(value) => println!("{} = {}", address, value),
                    None => println!("{} is not readable as {}", address, value_type),
                }
            }
            ("write", [address, value_type, value]) => {
                let address: Address = address.parse()?;
                let value_type: ValueType = value_type.parse()?;
                let value = ScalarValue::parse(value, value_type)?;
                if !self.engine.write_value(address, value_type, value) {
                    bail!("write to {} failed", address);
                }
                println!("{} <- {}", address, value);
            }
            ("lock", [address, value_type, value]) => {
                let address: Address = address.parse()?;
                let value_type: ValueType = value_type.parse()?;
                let value = ScalarValue::parse(value, value_type)?;
                self.engine.lock(address, value, value_type)?;
                println!("locked {} = {}", address, value);
            }
            ("unlock", [address]) => {
                let address: Address = address.parse()?;
                if self.engine.unlock(address) {
                    println!("unlocked {}", address);
                } else {
                    println!("{} was not locked", address);
                }
            }
            ("locks", []) => {
                for entry in self.engine.locked() {
                    println!(
                        "{}  {:<8} {}{}",
                        entry.address,
                        entry.value_type.to_string(),
                        entry.value,
                        if entry.is_failing() { "  (failing)" } else { "" }
                    );
                }
            }
            _ => bail!("unrecognised command '{}'; try 'help'", line.trim()),
        }
        Ok(true)
    }

    /// Starts a scan in the background and reports its progress
    fn spawn(&self, session: Arc<SearchSession>, target: ScalarValue, mode: CompareMode) {
        let id = session.id();
        let (task, mut events) = self.engine.spawn_scan(session, target, mode);
        println!("[{}] scanning for {} ({})", id, target, mode);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ScanEvent::Progress { checked, total, matches } if total > 0 => {
                        println!("[{}] {:>3}%  {} matches", id, checked * 100 / total, matches);
                    }
                    ScanEvent::Truncated { limit } => {
                        println!("[{}] stopped at {} matches", id, limit);
                    }
                    _ => {}
                }
            }

            match task.await {
                Ok(Ok(outcome)) => println!(
                    "[{}] {}: {} matches in {:.2?}",
                    id,
                    outcome.status,
                    outcome.len(),
                    outcome.elapsed
                ),
                Ok(Err(e)) => println!("[{}] scan failed: {}", id, e),
                Err(e) => warn!("scan task for session {} failed: {}", id, e),
            }
        });
    }
}

fn parse_mode(word: Option<&&str>) -> Result<CompareMode> {
    match word {
        Some(word) => Ok(word.parse::<CompareMode>()?),
        None => Ok(CompareMode::Exact),
    }
}

fn last_target(session: &SearchSession) -> Result<ScalarValue> {
    session
        .snapshot(0)
        .last_target
        .ok_or_else(|| anyhow!("no previous value; give one"))
}

/// Reads stdin on its own thread; the channel closes on EOF
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("memscan-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load(parse_args()?)?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting memscan v{}", env!("CARGO_PKG_VERSION"));

    let mut console = Console {
        engine: Arc::new(MemoryEngine::with_config(config)?),
        sessions: Vec::new(),
        current: None,
    };

    println!("memscan {}; type 'help' for commands", env!("CARGO_PKG_VERSION"));
    let mut lines = spawn_stdin_reader()?;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                match console.execute(&line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("error: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    info!("Shutting down memscan");
    console.engine.cancel_all();
    console.engine.detach();
    Ok(())
}
