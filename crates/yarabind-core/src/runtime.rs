//! Process-wide engine handle.
//!
//! The engine is initialized exactly once through [`Runtime::initialize`];
//! every [`Scanner`] is created from the resulting handle. Clones share the
//! engine, and the engine's teardown runs when the last clone (including the
//! ones held by scanners and in-flight work) is dropped.

use crate::engine::Engine;
use crate::error::Result;
use crate::scanner::{Scanner, ScannerConfig};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

struct Inner<E: Engine> {
    engine: E,
}

impl<E: Engine> Drop for Inner<E> {
    fn drop(&mut self) {
        debug!("Finalizing engine {}", self.engine.version());
        self.engine.finalize();
    }
}

/// Shared handle to an initialized engine
pub struct Runtime<E: Engine> {
    inner: Arc<Inner<E>>,
}

impl<E: Engine> Clone for Runtime<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Engine> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("engine", &self.inner.engine.version())
            .finish()
    }
}

impl<E: Engine> Runtime<E> {
    /// Initialize the engine and wrap it in a shared handle
    pub fn initialize(engine: E) -> Result<Self> {
        engine.initialize()?;
        debug!("Initialized engine {}", engine.version());
        Ok(Self {
            inner: Arc::new(Inner { engine }),
        })
    }

    /// The engine's version string
    pub fn engine_version(&self) -> &str {
        self.inner.engine.version()
    }

    /// Creates an unconfigured scanner
    pub fn scanner(&self) -> Result<Scanner<E>> {
        Scanner::new(self.clone(), ScannerConfig::default())
    }

    /// Creates an unconfigured scanner with custom configuration
    pub fn scanner_with_config(&self, config: ScannerConfig) -> Result<Scanner<E>> {
        Scanner::new(self.clone(), config)
    }

    pub(crate) fn engine(&self) -> &E {
        &self.inner.engine
    }
}
