//! The engine collaborator.
//!
//! The matching automaton and rule compiler live outside this crate. They are
//! reached through the [`Engine`] and [`RuleCompiler`] traits, which exchange
//! rule text in one direction and colon-encoded records (see [`crate::wire`])
//! in the other.
//!
//! ## Implementing an engine
//!
//! ```no_run
//! use yarabind_core::engine::{
//!     DiagnosticLevel, Engine, EngineScan, RawRule, RuleCompiler, SourceUnit,
//! };
//! use yarabind_core::{Result, Variable};
//!
//! struct NullEngine;
//! struct NullCompiler;
//!
//! impl RuleCompiler for NullCompiler {
//!     type Rules = ();
//!
//!     fn define_variable(&mut self, _variable: &Variable) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn add_source(
//!         &mut self,
//!         _unit: &SourceUnit<'_>,
//!         _report: &mut dyn FnMut(DiagnosticLevel, u32, &str),
//!     ) -> usize {
//!         0
//!     }
//!
//!     fn build(self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! impl Engine for NullEngine {
//!     type Rules = ();
//!     type Compiler = NullCompiler;
//!
//!     fn version(&self) -> &str {
//!         "null"
//!     }
//!
//!     fn compiler(&self) -> Result<NullCompiler> {
//!         Ok(NullCompiler)
//!     }
//!
//!     fn scan(&self, _rules: &(), _request: &EngineScan<'_>) -> Result<Vec<RawRule>> {
//!         Ok(vec![])
//!     }
//!
//!     fn list_rules(&self, _rules: &()) -> Vec<RawRule> {
//!         vec![]
//!     }
//! }
//! ```

#[cfg(feature = "yara-x")]
pub mod yara_x;

use crate::config::Variable;
use crate::error::Result;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "yara-x")]
pub use self::yara_x::YaraX;

/// Severity of a compiler diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// Blocks compilation
    Error,
    /// Reported but never blocks compilation
    Warning,
}

/// One rule source handed to the engine compiler
#[derive(Debug, Clone, Copy)]
pub struct SourceUnit<'a> {
    /// Rule text
    pub text: &'a str,
    /// File the text was read from, if any
    pub origin: Option<&'a Path>,
    /// Namespace to compile the rules into
    pub namespace: Option<&'a str>,
}

/// What the engine is asked to scan
#[derive(Debug, Clone, Copy)]
pub enum EngineTarget<'a> {
    /// An in-memory window, already cut to `offset..offset + length`
    Memory(&'a [u8]),
    /// A file on disk
    File(&'a Path),
}

/// A fully validated scan invocation
#[derive(Debug, Clone, Copy)]
pub struct EngineScan<'a> {
    /// Content to scan
    pub target: EngineTarget<'a>,
    /// Cap on captured bytes per match; `None` disables capture
    pub matched_bytes: Option<usize>,
    /// Record only the first occurrence of each pattern
    pub fast_mode: bool,
    /// Abort the scan after this long
    pub timeout: Option<Duration>,
}

/// Per-rule output of the engine, before decoding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRule {
    /// Rule identifier
    pub id: String,
    /// Namespace the rule was compiled into
    pub namespace: Option<String>,
    /// Tags, in declaration order
    pub tags: Vec<String>,
    /// `<type>:<id>:<value>` records
    pub metas: Vec<String>,
    /// `<offset>:<length>:<id>` records
    pub matches: Vec<String>,
    /// Captured bytes, parallel to `matches` when capture was requested
    pub datas: Vec<Bytes>,
}

/// Compilation session for a single configure call.
pub trait RuleCompiler {
    /// Compiled rule set produced by [`RuleCompiler::build`]
    type Rules;

    /// Define an external variable. Fails when the value does not fit the
    /// declared type.
    fn define_variable(&mut self, variable: &Variable) -> Result<()>;

    /// Compile one source, reporting each diagnostic as
    /// `(level, line, message)`. Returns the number of errors reported.
    fn add_source(
        &mut self,
        unit: &SourceUnit<'_>,
        report: &mut dyn FnMut(DiagnosticLevel, u32, &str),
    ) -> usize;

    /// Finish compilation
    fn build(self) -> Result<Self::Rules>;
}

/// A pattern-matching engine.
///
/// Implementations are shared across threads: compilation and scanning are
/// driven from worker threads while the host keeps issuing requests.
pub trait Engine: Send + Sync + 'static {
    /// Compiled rule set
    type Rules: Send + Sync + 'static;

    /// Compilation session type
    type Compiler: RuleCompiler<Rules = Self::Rules>;

    /// Engine version string
    fn version(&self) -> &str;

    /// One-time process-wide setup
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Teardown, run when the last runtime handle is dropped
    fn finalize(&self) {}

    /// Open a new compilation session
    fn compiler(&self) -> Result<Self::Compiler>;

    /// Scan a target, returning one record per matching rule
    fn scan(&self, rules: &Self::Rules, request: &EngineScan<'_>) -> Result<Vec<RawRule>>;

    /// List every compiled rule, without matches
    fn list_rules(&self, rules: &Self::Rules) -> Vec<RawRule>;
}
