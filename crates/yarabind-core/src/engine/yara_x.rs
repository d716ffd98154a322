//! [`Engine`] adapter for the `yara-x` crate.

use super::{
    DiagnosticLevel, Engine, EngineScan, EngineTarget, RawRule, RuleCompiler, SourceUnit,
};
use crate::config::{Variable, VariableType, VariableValue};
use crate::error::{Error, Result};
use crate::wire::{self, MetaType};
use bytes::Bytes;
use std::ops::Range;
use tracing::trace;

/// Namespace rules land in when a source does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Version of the `yara-x` crate this adapter is built against; keep in step
/// with the workspace pin
pub const YARA_X_VERSION: &str = "1.0";

/// Engine backed by `yara-x`
#[derive(Debug, Clone, Copy, Default)]
pub struct YaraX;

impl YaraX {
    /// Creates the engine
    pub fn new() -> Self {
        Self
    }
}

/// Compilation session wrapping [`yara_x::Compiler`]
pub struct YaraXCompiler {
    inner: yara_x::Compiler<'static>,
}

/// 1-based line of a byte offset within `text`; line 1 when there is no span
fn line_of(text: &str, span: Option<Range<usize>>) -> u32 {
    let Some(span) = span else {
        return 1;
    };
    let end = span.start.min(text.len());
    let newlines = text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count();
    u32::try_from(newlines + 1).unwrap_or(u32::MAX)
}

impl RuleCompiler for YaraXCompiler {
    type Rules = yara_x::Rules;

    fn define_variable(&mut self, variable: &Variable) -> Result<()> {
        let id = variable.id.as_str();
        let defined = match (variable.kind, &variable.value) {
            (VariableType::Integer, VariableValue::Integer(v)) => self.inner.define_global(id, *v),
            (VariableType::Float, VariableValue::Float(v)) => self.inner.define_global(id, *v),
            (VariableType::Float, VariableValue::Integer(v)) => {
                self.inner.define_global(id, *v as f64)
            }
            (VariableType::Boolean, VariableValue::Boolean(v)) => self.inner.define_global(id, *v),
            (VariableType::String, VariableValue::String(v)) => {
                self.inner.define_global(id, v.as_str())
            }
            (kind, _) => {
                return Err(Error::engine(format!("variable '{id}' is not a {kind}")));
            }
        };
        defined.map_err(|e| Error::engine(e.to_string()))?;
        Ok(())
    }

    fn add_source(
        &mut self,
        unit: &SourceUnit<'_>,
        report: &mut dyn FnMut(DiagnosticLevel, u32, &str),
    ) -> usize {
        let errors_before = self.inner.errors().len();
        let warnings_before = self.inner.warnings().len();

        self.inner
            .new_namespace(unit.namespace.unwrap_or(DEFAULT_NAMESPACE));

        let origin = unit.origin.map(|p| p.to_string_lossy().into_owned());
        let mut source = yara_x::SourceCode::from(unit.text);
        if let Some(origin) = origin.as_deref() {
            source = source.with_origin(origin);
        }
        // Failures are also collected by the compiler and read back below.
        let _ = self.inner.add_source(source);

        for warning in &self.inner.warnings()[warnings_before..] {
            let span = warning.labels().next().map(|l| l.span().range());
            report(
                DiagnosticLevel::Warning,
                line_of(unit.text, span),
                &warning.title(),
            );
        }

        let errors = &self.inner.errors()[errors_before..];
        for error in errors {
            let span = error.labels().next().map(|l| l.span().range());
            report(DiagnosticLevel::Error, line_of(unit.text, span), &error.title());
        }
        errors.len()
    }

    fn build(self) -> Result<yara_x::Rules> {
        Ok(self.inner.build())
    }
}

fn encode_metadata(id: &str, value: &yara_x::MetaValue<'_>) -> String {
    match value {
        yara_x::MetaValue::Integer(v) => wire::encode_meta(MetaType::Integer, id, &v.to_string()),
        yara_x::MetaValue::Bool(v) => wire::encode_meta(MetaType::Boolean, id, &v.to_string()),
        yara_x::MetaValue::Float(v) => wire::encode_meta(MetaType::String, id, &v.to_string()),
        yara_x::MetaValue::String(v) => wire::encode_meta(MetaType::String, id, v),
        yara_x::MetaValue::Bytes(v) => {
            wire::encode_meta(MetaType::String, id, &String::from_utf8_lossy(v))
        }
    }
}

fn raw_rule(rule: &yara_x::Rule<'_, '_>) -> RawRule {
    RawRule {
        id: rule.identifier().to_string(),
        namespace: Some(rule.namespace().to_string()),
        tags: rule.tags().map(|t| t.identifier().to_string()).collect(),
        metas: rule
            .metadata()
            .map(|(id, value)| encode_metadata(id, &value))
            .collect(),
        matches: Vec::new(),
        datas: Vec::new(),
    }
}

impl Engine for YaraX {
    type Rules = yara_x::Rules;
    type Compiler = YaraXCompiler;

    fn version(&self) -> &str {
        YARA_X_VERSION
    }

    fn compiler(&self) -> Result<YaraXCompiler> {
        Ok(YaraXCompiler {
            inner: yara_x::Compiler::new(),
        })
    }

    fn scan(&self, rules: &yara_x::Rules, request: &EngineScan<'_>) -> Result<Vec<RawRule>> {
        let mut scanner = yara_x::Scanner::new(rules);
        if let Some(timeout) = request.timeout {
            scanner.set_timeout(timeout);
        }

        let results = match request.target {
            EngineTarget::Memory(data) => scanner.scan(data),
            EngineTarget::File(path) => scanner.scan_file(path),
        }
        .map_err(|e| Error::engine(e.to_string()))?;

        let limit = if request.fast_mode { 1 } else { usize::MAX };
        let mut out = Vec::new();

        for rule in results.matching_rules() {
            let mut raw = raw_rule(&rule);
            for pattern in rule.patterns() {
                for m in pattern.matches().take(limit) {
                    let range = m.range();
                    raw.matches.push(wire::encode_match(
                        range.start as u64,
                        range.len() as u64,
                        pattern.identifier(),
                    ));
                    if let Some(cap) = request.matched_bytes {
                        let data = m.data();
                        raw.datas
                            .push(Bytes::copy_from_slice(&data[..data.len().min(cap)]));
                    }
                }
            }
            trace!("Rule '{}' matched {} times", raw.id, raw.matches.len());
            out.push(raw);
        }

        Ok(out)
    }

    fn list_rules(&self, rules: &yara_x::Rules) -> Vec<RawRule> {
        rules.iter().map(|rule| raw_rule(&rule)).collect()
    }
}
