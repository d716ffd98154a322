//! Error types for the yarabind-core library.
//!
//! Errors fall into two groups. Validation errors are returned synchronously,
//! before any engine work is scheduled, and indicate a malformed request.
//! Everything else (compile failures, I/O, engine faults) is delivered through
//! the pending handle of an asynchronous operation.

use crate::wire::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for yarabind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fixed message carried by every rule compilation failure
pub const COMPILE_RULES_MESSAGE: &str = "Error compiling rules";

/// Comprehensive error type for all yarabind operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// One or more rule sources failed to compile
    #[error("{}", COMPILE_RULES_MESSAGE)]
    CompileRules {
        /// Every error reported across all sources, in source order
        errors: Vec<Diagnostic>,
    },

    /// A rule file could not be opened or read
    #[error("failed to open rule file '{path}': {source}")]
    RuleFileOpen {
        /// Path of the rule file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A scan target file exists but could not be read
    #[error("failed to open scan target '{path}': {source}")]
    ScanFileOpen {
        /// Path of the scan target
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A variable declared a type code that is not recognized
    #[error("Unknown variable type: {code}")]
    UnknownVariableType {
        /// The raw type code observed (0 when omitted)
        code: i64,
    },

    /// Neither a buffer nor a filename was supplied to scan
    #[error("Either filename or buffer is required")]
    MissingTarget,

    /// Both a buffer and a filename were supplied to scan
    #[error("Only one of filename or buffer may be supplied")]
    AmbiguousTarget,

    /// Buffer offset outside `0..=buffer.len()`
    #[error("Offset is out of bounds")]
    OffsetOutOfBounds {
        /// Requested offset
        offset: i64,
        /// Length of the supplied buffer
        buffer_len: usize,
    },

    /// Buffer length negative or running past the end of the buffer
    #[error("Length is out of bounds")]
    LengthOutOfBounds {
        /// Requested length
        length: i64,
        /// Effective offset
        offset: usize,
        /// Length of the supplied buffer
        buffer_len: usize,
    },

    /// Negative captured-bytes cap
    #[error("Matched bytes is out of bounds")]
    MatchedBytesOutOfBounds {
        /// Requested cap
        matched_bytes: i64,
    },

    /// Negative scan timeout
    #[error("Timeout cannot be negative")]
    TimeoutOutOfBounds {
        /// Requested timeout in seconds
        timeout: i64,
    },

    /// Scan requested before any successful configure
    #[error("Please call configure() before scan()")]
    NotConfigured,

    /// The engine could not be initialized
    #[error("engine initialization failed: {0}")]
    Initialize(String),

    /// The engine reported a failure outside of rule diagnostics
    #[error("engine error: {0}")]
    Engine(String),

    /// The engine produced a record that does not follow the wire format
    #[error("malformed {kind} record from engine: '{record}'")]
    MalformedRecord {
        /// Record family (`diagnostic`, `meta`, `match`)
        kind: &'static str,
        /// The offending record text
        record: String,
    },

    /// A host request could not be parsed
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] serde_json::Error),

    /// The worker pool could not be built
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// A worker finished without reporting a result
    #[error("worker exited without reporting a result")]
    WorkerLost,
}

impl Error {
    /// Creates a new compile failure from aggregated diagnostics
    pub fn compile_rules(errors: Vec<Diagnostic>) -> Self {
        Self::CompileRules { errors }
    }

    /// Creates a new rule file open error
    pub fn rule_file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RuleFileOpen {
            path: path.into(),
            source,
        }
    }

    /// Creates a new scan file open error
    pub fn scan_file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ScanFileOpen {
            path: path.into(),
            source,
        }
    }

    /// Creates a new engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Creates a new initialization error
    pub fn initialize(msg: impl Into<String>) -> Self {
        Self::Initialize(msg.into())
    }

    /// Creates a new malformed record error
    pub fn malformed_record(kind: &'static str, record: impl Into<String>) -> Self {
        Self::MalformedRecord {
            kind,
            record: record.into(),
        }
    }

    /// Returns true for errors raised synchronously while validating a request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownVariableType { .. }
                | Self::MissingTarget
                | Self::AmbiguousTarget
                | Self::OffsetOutOfBounds { .. }
                | Self::LengthOutOfBounds { .. }
                | Self::MatchedBytesOutOfBounds { .. }
                | Self::TimeoutOutOfBounds { .. }
                | Self::NotConfigured
        )
    }

    /// Returns the compile diagnostics carried by a compile failure
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::CompileRules { errors } => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownVariableType { code: 0 };
        assert_eq!(err.to_string(), "Unknown variable type: 0");

        let err = Error::compile_rules(vec![]);
        assert_eq!(err.to_string(), COMPILE_RULES_MESSAGE);
        assert_eq!(err.to_string(), "Error compiling rules");

        assert_eq!(
            Error::NotConfigured.to_string(),
            "Please call configure() before scan()"
        );
    }

    #[test]
    fn test_rule_file_open_names_path_and_reason() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::rule_file_open("rules/missing.yara", source);
        let msg = err.to_string();
        assert!(msg.contains("rules/missing.yara"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_is_validation() {
        assert!(Error::MissingTarget.is_validation());
        assert!(Error::NotConfigured.is_validation());
        assert!(Error::UnknownVariableType { code: 9 }.is_validation());
        assert!(!Error::engine("boom").is_validation());
        assert!(!Error::compile_rules(vec![]).is_validation());
    }

    #[test]
    fn test_diagnostics_only_for_compile_failures() {
        let diag = Diagnostic::new(1, 4, "syntax error");
        let err = Error::compile_rules(vec![diag.clone()]);
        assert_eq!(err.diagnostics(), &[diag]);
        assert!(Error::MissingTarget.diagnostics().is_empty());
    }
}
