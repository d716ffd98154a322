//! Rule configuration and compilation.
//!
//! A configure request carries an ordered list of rule sources and a list of
//! external variables. Compilation runs in three steps:
//!
//! 1. Variables are bound (see [`variables`]) on the caller's thread; the
//!    first unknown type code aborts the request.
//! 2. Each non-empty source is handed to the engine in order. Diagnostics are
//!    recorded in the `<sourceIndex>:<line>:<message>` wire form and decoded
//!    once compilation is over.
//! 3. Any error across any source fails the whole request with a single
//!    [`Error::CompileRules`] listing every error. Warnings are returned on
//!    both paths.

pub mod variables;

use crate::engine::{DiagnosticLevel, Engine, RuleCompiler, SourceUnit};
use crate::error::{Error, Result};
use crate::wire::{self, Diagnostic};
use serde::Deserialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub use variables::{Variable, VariableSpec, VariableType, VariableValue};

/// Where a rule source's text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Rule text supplied inline
    Inline(String),
    /// Path to a rule file
    File(PathBuf),
}

/// One entry of a configure request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RuleSpec")]
pub struct RuleSource {
    /// Text or file
    pub kind: SourceKind,
    /// Namespace to compile into; empty means the default namespace
    pub namespace: Option<String>,
}

/// Host-facing rule entry: `{string?, filename?, namespace?}`.
///
/// A non-empty `filename` wins over `string`.
#[derive(Debug, Clone, Default, Deserialize)]
struct RuleSpec {
    #[serde(default)]
    string: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

impl From<RuleSpec> for RuleSource {
    fn from(spec: RuleSpec) -> Self {
        let kind = match spec.filename.filter(|f| !f.is_empty()) {
            Some(filename) => SourceKind::File(PathBuf::from(filename)),
            None => SourceKind::Inline(spec.string.unwrap_or_default()),
        };
        Self {
            kind,
            namespace: spec.namespace,
        }
    }
}

impl RuleSource {
    /// Creates an inline source
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Inline(text.into()),
            namespace: None,
        }
    }

    /// Creates a file source
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::File(path.into()),
            namespace: None,
        }
    }

    /// Sets the namespace
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Returns true when the source resolves to an empty string
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            SourceKind::Inline(text) => text.is_empty(),
            SourceKind::File(path) => path.as_os_str().is_empty(),
        }
    }

    /// Returns the file path for file sources
    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            SourceKind::File(path) => Some(path),
            SourceKind::Inline(_) => None,
        }
    }

    /// Load the rule text. Returns `None` for empty sources.
    fn load(&self) -> Result<Option<Cow<'_, str>>> {
        if self.is_empty() {
            return Ok(None);
        }
        match &self.kind {
            SourceKind::Inline(text) => Ok(Some(Cow::Borrowed(text))),
            SourceKind::File(path) => std::fs::read_to_string(path)
                .map(|text| Some(Cow::Owned(text)))
                .map_err(|e| Error::rule_file_open(path, e)),
        }
    }
}

/// A configure request: `{rules: [...], variables: [...]}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigureRequest {
    /// Rule sources, in compilation order
    #[serde(default)]
    pub rules: Vec<RuleSource>,
    /// External variable declarations
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
}

impl ConfigureRequest {
    /// Creates an empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON request
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Appends a rule source
    pub fn rule(mut self, source: RuleSource) -> Self {
        self.rules.push(source);
        self
    }

    /// Appends a variable
    pub fn variable(mut self, variable: impl Into<VariableSpec>) -> Self {
        self.variables.push(variable.into());
        self
    }
}

/// Completion of a configure call: the outcome plus every warning
#[derive(Debug)]
pub struct ConfigureOutcome {
    /// `Ok` when the new rules are active
    pub result: Result<()>,
    /// Warnings across all sources, in source then emission order
    pub warnings: Vec<Diagnostic>,
}

impl ConfigureOutcome {
    /// Drops the outcome into a plain result, keeping warnings on success
    pub fn into_result(self) -> Result<Vec<Diagnostic>> {
        self.result.map(|()| self.warnings)
    }
}

/// Diagnostic records collected during one compilation
#[derive(Debug, Default)]
struct Records {
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Compile bound sources and variables into a rule set.
///
/// Returns the compiled rules (or the failure) together with the warnings.
pub(crate) fn compile<E: Engine>(
    engine: &E,
    sources: &[RuleSource],
    variables: &[Variable],
) -> (Result<E::Rules>, Vec<Diagnostic>) {
    debug!(
        "Compiling {} rule sources with {} variables",
        sources.len(),
        variables.len()
    );

    let mut records = Records::default();
    let result = compile_sources(engine, sources, variables, &mut records);

    match decode_records(&records.warnings) {
        Ok(warnings) => (result, warnings),
        Err(e) => (Err(e), Vec::new()),
    }
}

fn compile_sources<E: Engine>(
    engine: &E,
    sources: &[RuleSource],
    variables: &[Variable],
    records: &mut Records,
) -> Result<E::Rules> {
    let mut compiler = engine.compiler()?;

    for variable in variables {
        trace!("Defining {} variable '{}'", variable.kind, variable.id);
        compiler.define_variable(variable)?;
    }

    let mut error_count = 0;

    for (index, source) in sources.iter().enumerate() {
        let Some(text) = source.load()? else {
            trace!("Skipping empty rule source {}", index);
            continue;
        };

        let unit = SourceUnit {
            text: &text,
            origin: source.path(),
            namespace: source.namespace.as_deref().filter(|ns| !ns.is_empty()),
        };

        let mut report = |level: DiagnosticLevel, line: u32, message: &str| {
            let record = wire::encode_diagnostic(index, line, message);
            match level {
                DiagnosticLevel::Error => records.errors.push(record),
                DiagnosticLevel::Warning => records.warnings.push(record),
            }
        };

        error_count += compiler.add_source(&unit, &mut report);
        trace!("Compiled rule source {} ({} errors so far)", index, error_count);
    }

    if error_count > 0 || !records.errors.is_empty() {
        let errors = decode_records(&records.errors)?;
        debug!("Rule compilation failed with {} errors", errors.len());
        return Err(Error::compile_rules(errors));
    }

    compiler.build()
}

fn decode_records(records: &[String]) -> Result<Vec<Diagnostic>> {
    records.iter().map(|r| wire::decode_diagnostic(r)).collect()
}
