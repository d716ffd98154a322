//! The scanner: one active rule configuration plus configure, scan and
//! introspection operations.
//!
//! ## Two-phase operations
//!
//! [`Scanner::configure`] and [`Scanner::scan`] validate their request on the
//! caller's thread and return `Err` right away when it is malformed. Only a
//! valid request reaches a worker thread; its outcome is collected from the
//! returned [`Pending`] handle.
//!
//! ```no_run
//! # #[cfg(feature = "yara-x")]
//! # fn main() -> yarabind_core::Result<()> {
//! use yarabind_core::{ConfigureRequest, RuleSource, Runtime, ScanRequest, YaraX};
//!
//! let runtime = Runtime::initialize(YaraX::new())?;
//! let scanner = runtime.scanner()?;
//!
//! let request = ConfigureRequest::new()
//!     .rule(RuleSource::inline("rule demo { strings: $a = \"demo\" condition: $a }"));
//! scanner.configure(request)?.wait()?.into_result()?;
//!
//! let result = scanner.scan(ScanRequest::from_buffer("a demo buffer"))?.wait()?;
//! for rule in result.rules {
//!     println!("{} matched {} times", rule.id, rule.matches.len());
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "yara-x"))]
//! # fn main() {}
//! ```
//!
//! ## Concurrency
//!
//! Each scanner owns a fixed-size worker pool, shared by its clones, sized by
//! [`ScannerConfig::worker_threads`]. Requests beyond the pool size queue
//! until a worker is free.
//!
//! The compiled rules sit behind a reader/writer lock as an `Arc`. A scan
//! takes its own reference when it is issued, so a configure that lands while
//! the scan runs never affects it. Configure calls are serialized; a failed
//! configure leaves the previous rules in place.

pub mod decode;
pub mod request;

use crate::config::{self, variables, ConfigureOutcome, ConfigureRequest};
use crate::engine::{Engine, EngineScan, EngineTarget};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

pub use decode::{Match, Meta, MetaValue, Rule, ScanResult};
pub use request::{ScanFlags, ScanRequest, ScanTarget, ValidatedScan};

/// Configuration for the scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Timeout applied when a request does not set one
    pub default_timeout: Option<Duration>,
    /// Flags applied when a request does not set any
    pub default_flags: ScanFlags,
    /// Prefix for worker thread names
    pub worker_name: String,
    /// Number of worker threads; 0 picks one per available CPU
    pub worker_threads: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_timeout: None,
            default_flags: ScanFlags::empty(),
            worker_name: "yarabind".to_string(),
            worker_threads: 0,
        }
    }
}

impl ScannerConfig {
    /// Creates a new scanner config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default scan timeout
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the default scan flags
    pub fn default_flags(mut self, flags: ScanFlags) -> Self {
        self.default_flags = flags;
        self
    }

    /// Sets the worker thread name prefix
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Sets the number of worker threads
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }
}

/// Handle to the outcome of an asynchronous operation
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Block until the operation completes
    pub fn wait(self) -> Result<T> {
        self.rx.recv().map_err(|_| Error::WorkerLost)?
    }

    /// Block for at most `timeout`; gives the handle back if still running
    pub fn wait_timeout(self, timeout: Duration) -> std::result::Result<Result<T>, Self> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(outcome),
            Err(RecvTimeoutError::Disconnected) => Ok(Err(Error::WorkerLost)),
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }

    /// Poll without blocking
    pub fn try_wait(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Disconnected) => Some(Err(Error::WorkerLost)),
            Err(TryRecvError::Empty) => None,
        }
    }
}

/// A scanner holding at most one compiled rule set
pub struct Scanner<E: Engine> {
    runtime: Runtime<E>,
    config: ScannerConfig,
    pool: Arc<rayon::ThreadPool>,
    active: Arc<RwLock<Option<Arc<E::Rules>>>>,
    configure_gate: Arc<Mutex<()>>,
}

impl<E: Engine> Clone for Scanner<E> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            config: self.config.clone(),
            pool: Arc::clone(&self.pool),
            active: Arc::clone(&self.active),
            configure_gate: Arc::clone(&self.configure_gate),
        }
    }
}

impl<E: Engine> fmt::Debug for Scanner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("runtime", &self.runtime)
            .field("config", &self.config)
            .field("workers", &self.pool.current_num_threads())
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl<E: Engine> Scanner<E> {
    /// Creates an unconfigured scanner and starts its worker pool
    pub fn new(runtime: Runtime<E>, config: ScannerConfig) -> Result<Self> {
        let name = config.worker_name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(move |index| format!("{name}-{index}"))
            .build()?;

        debug!(
            "Started scanner with {} workers",
            pool.current_num_threads()
        );

        Ok(Self {
            runtime,
            config,
            pool: Arc::new(pool),
            active: Arc::new(RwLock::new(None)),
            configure_gate: Arc::new(Mutex::new(())),
        })
    }

    /// Returns the scanner configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Returns true once a configure call has succeeded
    pub fn is_configured(&self) -> bool {
        self.active_rules().is_some()
    }

    /// Compile a new rule configuration.
    ///
    /// Variable type codes are checked before this returns. Compilation then
    /// runs on a worker; on success the new rules replace the active ones, on
    /// failure the active rules are kept.
    pub fn configure(&self, request: ConfigureRequest) -> Result<Pending<ConfigureOutcome>> {
        let variables = variables::bind_all(&request.variables)?;
        let sources = request.rules;

        let runtime = self.runtime.clone();
        let active = Arc::clone(&self.active);
        let gate = Arc::clone(&self.configure_gate);

        Ok(self.spawn(move || {
            let _serialized = gate.lock().unwrap_or_else(PoisonError::into_inner);

            let (result, warnings) = config::compile(runtime.engine(), &sources, &variables);
            let result = match result {
                Ok(rules) => {
                    *active.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(rules));
                    debug!("Installed new rules ({} warnings)", warnings.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("Configure failed, keeping previous rules: {}", e);
                    Err(e)
                }
            };

            Ok(ConfigureOutcome { result, warnings })
        }))
    }

    /// Scan a buffer window or a file.
    ///
    /// Fails immediately with [`Error::NotConfigured`] before any successful
    /// configure, and with a validation error for malformed requests.
    pub fn scan(&self, request: ScanRequest) -> Result<Pending<ScanResult>> {
        let rules = self.active_rules().ok_or(Error::NotConfigured)?;
        let scan = request::validate(request, &self.config)?;

        let runtime = self.runtime.clone();
        Ok(self.spawn(move || execute(runtime.engine(), &rules, &scan)))
    }

    /// List the rules of the active configuration, with empty matches.
    ///
    /// An unconfigured scanner lists nothing.
    pub fn rules(&self) -> Result<ScanResult> {
        match self.active_rules() {
            Some(rules) => decode::decode_rules(self.runtime.engine().list_rules(&rules), None),
            None => Ok(ScanResult::default()),
        }
    }

    fn active_rules(&self) -> Option<Arc<E::Rules>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn spawn<T, F>(&self, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);

        self.pool.spawn(move || {
            // The receiver may be gone; the caller stopped waiting.
            let _ = tx.send(work());
        });

        Pending { rx }
    }
}

/// Run a validated scan against a rule set
fn execute<E: Engine>(engine: &E, rules: &E::Rules, scan: &ValidatedScan) -> Result<ScanResult> {
    let target = scan.target.engine_target();

    if let EngineTarget::File(path) = target {
        let exists = path
            .try_exists()
            .map_err(|e| Error::scan_file_open(path, e))?;
        if !exists {
            debug!("Scan target {} does not exist, nothing to scan", path.display());
            return Ok(ScanResult::default());
        }
    }

    debug!(
        "Starting scan (fast mode: {}, matched bytes: {:?})",
        scan.fast_mode, scan.matched_bytes
    );

    let raw = engine.scan(
        rules,
        &EngineScan {
            target,
            matched_bytes: scan.matched_bytes,
            fast_mode: scan.fast_mode,
            timeout: scan.timeout,
        },
    )?;

    let result = decode::decode_rules(raw, scan.matched_bytes)?;
    debug!("Scan complete: {} rules matched", result.rules.len());
    Ok(result)
}
