//! Run accounting: per-unit failures and the final report.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::parser::{CodeUnit, UnitKind};

/// Pipeline step where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Discovery,
    Parse,
    Generation,
    Extraction,
    Rewrite,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Parse => "parse",
            Stage::Generation => "generation",
            Stage::Extraction => "extraction",
            Stage::Rewrite => "rewrite",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One isolated failure. `unit` is empty for module-level failures.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub module: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<UnitKind>,
    pub stage: Stage,
    pub message: String,
}

impl Failure {
    pub fn module(module: impl Into<PathBuf>, stage: Stage, message: impl fmt::Display) -> Self {
        Self {
            module: module.into(),
            unit: None,
            kind: None,
            stage,
            message: message.to_string(),
        }
    }

    pub fn unit(unit: &CodeUnit, stage: Stage, message: impl fmt::Display) -> Self {
        Self {
            module: unit.module_path.clone(),
            unit: Some(unit.name.clone()),
            kind: Some(unit.kind),
            stage,
            message: message.to_string(),
        }
    }
}

/// Counters shared by all workers of a run.
#[derive(Debug, Default)]
pub struct RunCounters {
    pub modules_discovered: AtomicUsize,
    pub modules_parsed: AtomicUsize,
    pub units_queued: AtomicUsize,
    pub units_skipped: AtomicUsize,
    pub units_updated: AtomicUsize,
    pub units_unchanged: AtomicUsize,
    pub fallbacks: AtomicUsize,
}

impl RunCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub modules_discovered: usize,
    pub modules_parsed: usize,
    /// Units sent to generation.
    pub units_queued: usize,
    /// Units already documented under the overwrite policy.
    pub units_skipped: usize,
    pub units_updated: usize,
    /// Units whose rewrite produced no change on disk.
    pub units_unchanged: usize,
    /// Function units documented with the raw generated text.
    pub fallbacks: usize,
    pub failures: Vec<Failure>,
}

impl RunReport {
    pub fn from_counters(counters: &RunCounters, mut failures: Vec<Failure>) -> Self {
        failures.sort_by(|a, b| (&a.module, &a.unit).cmp(&(&b.module, &b.unit)));
        Self {
            modules_discovered: RunCounters::get(&counters.modules_discovered),
            modules_parsed: RunCounters::get(&counters.modules_parsed),
            units_queued: RunCounters::get(&counters.units_queued),
            units_skipped: RunCounters::get(&counters.units_skipped),
            units_updated: RunCounters::get(&counters.units_updated),
            units_unchanged: RunCounters::get(&counters.units_unchanged),
            fallbacks: RunCounters::get(&counters.fallbacks),
            failures,
        }
    }

    /// Modules with at least one failure.
    pub fn failed_modules(&self) -> BTreeSet<PathBuf> {
        self.failures.iter().map(|f| f.module.clone()).collect()
    }

    pub fn units_failed(&self) -> usize {
        self.failures.iter().filter(|f| f.unit.is_some()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
