//! # yarabind-core
//!
//! Host-facing marshaling layer for a YARA-style pattern-matching engine.
//!
//! This crate provides:
//! - Validation of configure and scan requests before any engine work starts
//! - Compilation of ordered rule sources with external variables, collecting
//!   every diagnostic as `(sourceIndex, line, message)`
//! - Scanning of buffer windows and files on worker threads
//! - Decoding of the engine's colon-delimited records into typed results
//!
//! ## Architecture
//!
//! - [`runtime`]: One-time engine initialization and teardown
//! - [`scanner`]: The scanner, request validation and result decoding
//! - [`config`]: Rule sources, variables and compilation
//! - [`engine`]: The [`Engine`](engine::Engine) seam and its adapters
//! - [`wire`]: The colon-delimited record format
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "yara-x")]
//! # fn main() -> yarabind_core::Result<()> {
//! use yarabind_core::{ConfigureRequest, Runtime, ScanRequest, YaraX};
//!
//! let runtime = Runtime::initialize(YaraX::new())?;
//! let scanner = runtime.scanner()?;
//!
//! let request = ConfigureRequest::from_json(
//!     r#"{"rules": [{"filename": "rules/index.yar"}],
//!         "variables": [{"type": 4, "id": "owner", "value": "root"}]}"#,
//! )?;
//! let warnings = scanner.configure(request)?.wait()?.into_result()?;
//! for warning in warnings {
//!     eprintln!("{warning}");
//! }
//!
//! let scan = ScanRequest::from_json(r#"{"filename": "/bin/ls", "matchedBytes": 16}"#)?;
//! let result = scanner.scan(scan)?.wait()?;
//! println!("{}", result.to_json()?);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "yara-x"))]
//! # fn main() {}
//! ```
//!
//! ## Features
//!
//! - `yara-x`: enables [`engine::yara_x`], an [`Engine`](engine::Engine)
//!   backed by the `yara-x` crate

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod scanner;
pub mod wire;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience
pub use config::{
    ConfigureOutcome, ConfigureRequest, RuleSource, SourceKind, Variable, VariableSpec,
    VariableType, VariableValue,
};
#[cfg(feature = "yara-x")]
pub use engine::YaraX;
pub use error::{Error, Result};
pub use runtime::Runtime;
pub use scanner::{
    Match, Meta, MetaValue, Pending, Rule, ScanFlags, ScanRequest, ScanResult, ScanTarget,
    Scanner, ScannerConfig,
};
pub use wire::{Diagnostic, MetaType};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Flag bit requesting fast mode
pub const SCAN_FLAG_FAST_MODE: u32 = ScanFlags::FAST_MODE.bits();
