//! Scripted engine used by unit tests.
//!
//! Rules are registered up front and selected by the source text, one
//! directive per line:
//!
//! - `rule <name>` includes a registered rule
//! - `error <line> <message>` reports a compile error
//! - `warning <line> <message>` reports a compile warning
//!
//! Patterns are literal byte strings; every occurrence is a match.

use crate::config::{Variable, VariableType, VariableValue};
use crate::engine::{
    DiagnosticLevel, Engine, EngineScan, EngineTarget, RawRule, RuleCompiler, SourceUnit,
};
use crate::error::{Error, Result};
use crate::wire::{self, MetaType};
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct TestRule {
    pub(crate) id: String,
    pub(crate) tags: Vec<String>,
    pub(crate) metas: Vec<(MetaType, String, String)>,
    pub(crate) patterns: Vec<(String, Vec<u8>)>,
}

impl TestRule {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tags: Vec::new(),
            metas: Vec::new(),
            patterns: Vec::new(),
        }
    }

    pub(crate) fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub(crate) fn meta(mut self, kind: MetaType, id: &str, value: &str) -> Self {
        self.metas.push((kind, id.to_string(), value.to_string()));
        self
    }

    pub(crate) fn pattern(mut self, id: &str, literal: &str) -> Self {
        self.patterns.push((id.to_string(), literal.as_bytes().to_vec()));
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) rule: TestRule,
    pub(crate) namespace: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct TestStats {
    pub(crate) compiles: AtomicUsize,
    pub(crate) scans: AtomicUsize,
    pub(crate) finalized: AtomicUsize,
    /// Names of the threads scans ran on
    pub(crate) scan_threads: Mutex<HashSet<String>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TestEngine {
    rules: Vec<TestRule>,
    fail_init: bool,
    scan_delay: Option<Duration>,
    stats: Arc<TestStats>,
}

impl TestEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_rule(mut self, rule: TestRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub(crate) fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Make every scan take at least `delay`
    pub(crate) fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = Some(delay);
        self
    }

    pub(crate) fn stats(&self) -> Arc<TestStats> {
        Arc::clone(&self.stats)
    }

    /// The rules used throughout the scanner tests
    pub(crate) fn people() -> Self {
        Self::new()
            .with_rule(
                TestRule::new("is_stephen")
                    .tag("human")
                    .tag("man")
                    .meta(MetaType::String, "m1", "m1")
                    .meta(MetaType::Boolean, "m2", "true")
                    .meta(MetaType::Integer, "m3", "123")
                    .pattern("$s1", "stephen"),
            )
            .with_rule(
                TestRule::new("is_either")
                    .tag("human")
                    .tag("man")
                    .tag("woman")
                    .pattern("$s1", "stephen")
                    .pattern("$s2", "silvia"),
            )
    }
}

pub(crate) struct TestCompiler {
    registry: Vec<TestRule>,
    compiled: Vec<CompiledRule>,
}

impl RuleCompiler for TestCompiler {
    type Rules = Vec<CompiledRule>;

    fn define_variable(&mut self, variable: &Variable) -> Result<()> {
        let fits = matches!(
            (variable.kind, &variable.value),
            (VariableType::Integer, VariableValue::Integer(_))
                | (VariableType::Float, VariableValue::Float(_) | VariableValue::Integer(_))
                | (VariableType::Boolean, VariableValue::Boolean(_))
                | (VariableType::String, VariableValue::String(_))
        );
        if fits {
            Ok(())
        } else {
            Err(Error::engine(format!(
                "variable '{}' is not a {}",
                variable.id, variable.kind
            )))
        }
    }

    fn add_source(
        &mut self,
        unit: &SourceUnit<'_>,
        report: &mut dyn FnMut(DiagnosticLevel, u32, &str),
    ) -> usize {
        let mut errors = 0;

        for (number, line) in unit.text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (directive, rest) = line.split_once(' ').unwrap_or((line, ""));
            match directive {
                "rule" => match self.registry.iter().find(|r| r.id == rest) {
                    Some(rule) => self.compiled.push(CompiledRule {
                        rule: rule.clone(),
                        namespace: unit.namespace.map(str::to_string),
                    }),
                    None => {
                        errors += 1;
                        report(
                            DiagnosticLevel::Error,
                            number as u32 + 1,
                            &format!("undefined rule \"{rest}\""),
                        );
                    }
                },
                "error" | "warning" => {
                    let (at, message) = rest.split_once(' ').unwrap_or((rest, ""));
                    let at = at.parse().unwrap_or(number as u32 + 1);
                    if directive == "error" {
                        errors += 1;
                        report(DiagnosticLevel::Error, at, message);
                    } else {
                        report(DiagnosticLevel::Warning, at, message);
                    }
                }
                _ => {
                    errors += 1;
                    report(DiagnosticLevel::Error, number as u32 + 1, "syntax error");
                }
            }
        }

        errors
    }

    fn build(self) -> Result<Vec<CompiledRule>> {
        Ok(self.compiled)
    }
}

fn raw_rule(compiled: &CompiledRule) -> RawRule {
    RawRule {
        id: compiled.rule.id.clone(),
        namespace: compiled.namespace.clone(),
        tags: compiled.rule.tags.clone(),
        metas: compiled
            .rule
            .metas
            .iter()
            .map(|(kind, id, value)| wire::encode_meta(*kind, id, value))
            .collect(),
        matches: Vec::new(),
        datas: Vec::new(),
    }
}

impl Engine for TestEngine {
    type Rules = Vec<CompiledRule>;
    type Compiler = TestCompiler;

    fn version(&self) -> &str {
        "test-1.0"
    }

    fn initialize(&self) -> Result<()> {
        if self.fail_init {
            Err(Error::initialize("ERROR_INSUFFICIENT_MEMORY"))
        } else {
            Ok(())
        }
    }

    fn finalize(&self) {
        self.stats.finalized.fetch_add(1, Ordering::SeqCst);
    }

    fn compiler(&self) -> Result<TestCompiler> {
        self.stats.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(TestCompiler {
            registry: self.rules.clone(),
            compiled: Vec::new(),
        })
    }

    fn scan(&self, rules: &Vec<CompiledRule>, request: &EngineScan<'_>) -> Result<Vec<RawRule>> {
        self.stats.scans.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = std::thread::current().name() {
            self.stats
                .scan_threads
                .lock()
                .unwrap()
                .insert(name.to_string());
        }
        if let Some(delay) = self.scan_delay {
            std::thread::sleep(delay);
        }

        let owned;
        let data: &[u8] = match request.target {
            EngineTarget::Memory(data) => data,
            EngineTarget::File(path) => {
                owned = std::fs::read(path).map_err(|e| Error::scan_file_open(path, e))?;
                &owned
            }
        };

        let mut out = Vec::new();
        for compiled in rules {
            let mut raw = raw_rule(compiled);
            for (id, literal) in &compiled.rule.patterns {
                if literal.is_empty() || literal.len() > data.len() {
                    continue;
                }
                let offsets = data
                    .windows(literal.len())
                    .enumerate()
                    .filter(|(_, window)| *window == literal.as_slice())
                    .map(|(offset, _)| offset);
                let limit = if request.fast_mode { 1 } else { usize::MAX };
                for offset in offsets.take(limit) {
                    raw.matches
                        .push(wire::encode_match(offset as u64, literal.len() as u64, id));
                    if let Some(cap) = request.matched_bytes {
                        let end = offset + literal.len().min(cap);
                        raw.datas.push(Bytes::copy_from_slice(&data[offset..end]));
                    }
                }
            }
            if !raw.matches.is_empty() {
                out.push(raw);
            }
        }
        Ok(out)
    }

    fn list_rules(&self, rules: &Vec<CompiledRule>) -> Vec<RawRule> {
        rules.iter().map(raw_rule).collect()
    }
}
