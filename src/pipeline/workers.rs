//! Long-lived stage workers.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::locks::PathLocks;
use super::outcome::{Failure, RunCounters, Stage};
use super::queue::{QueueReceiver, QueueSender};
use crate::config::{Config, IgnoreSet, OverwritePolicy};
use crate::discover::{ModuleDiscovery, ModuleTask};
use crate::generate::{generate_with_retry, GenerationClient, GenerationRequest};
use crate::parser::docstring::{extract_class_docstrings, extract_function_docstring};
use crate::parser::units::extract_units;
use crate::parser::{CodeUnit, Extraction};
use crate::persist::Persister;
use crate::rewrite::{rewrite_class, rewrite_function, RewriteError};

/// Everything a worker shares with the rest of the run.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub config: Arc<Config>,
    pub policy: OverwritePolicy,
    pub client: Arc<dyn GenerationClient>,
    pub persister: Arc<Persister>,
    pub locks: Arc<PathLocks>,
    pub counters: Arc<RunCounters>,
    pub failures: mpsc::UnboundedSender<Failure>,
}

impl WorkerContext {
    fn report(&self, failure: Failure) {
        match &failure.unit {
            Some(unit) => warn!(
                module = %failure.module.display(),
                unit = %unit,
                stage = %failure.stage,
                "{}",
                failure.message
            ),
            None => warn!(
                module = %failure.module.display(),
                stage = %failure.stage,
                "{}",
                failure.message
            ),
        }
        // The receiver lives until every worker has been joined.
        let _ = self.failures.send(failure);
    }

    fn unit_failed(&self, unit: &CodeUnit, stage: Stage, message: impl Display) {
        self.report(Failure::unit(unit, stage, message));
    }

    async fn generate(&self, unit: &CodeUnit) -> Option<String> {
        let request = GenerationRequest::for_unit(unit, self.config.documentation_style);
        let generation = &self.config.generation;
        match generate_with_retry(
            self.client.as_ref(),
            &request,
            generation.timeout(),
            generation.max_retries,
        )
        .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                self.unit_failed(unit, Stage::Generation, e);
                None
            }
        }
    }

    /// Read, rewrite, persist and format one module while holding its lock.
    async fn rewrite_and_persist<F>(&self, unit: &CodeUnit, rewrite: F)
    where
        F: FnOnce(&Path, &str) -> Result<String, RewriteError> + Send + 'static,
    {
        let path = unit.module_path.clone();
        let _guard = self.locks.lock(&path).await;

        let original = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(e) => {
                self.unit_failed(unit, Stage::Rewrite, format!("failed to read module: {e}"));
                return;
            }
        };

        let task_path = path.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = rewrite(&task_path, &original);
            (original, result)
        })
        .await;

        let (original, rewritten) = match joined {
            Ok((original, Ok(rewritten))) => (original, rewritten),
            Ok((_, Err(e))) => {
                self.unit_failed(unit, Stage::Rewrite, e);
                return;
            }
            Err(e) => {
                self.unit_failed(unit, Stage::Rewrite, format!("rewrite task failed: {e}"));
                return;
            }
        };

        if rewritten == original {
            debug!(module = %path.display(), unit = %unit.name, "nothing to change");
            RunCounters::bump(&self.counters.units_unchanged);
            return;
        }

        match self.persister.persist(&path, &rewritten).await {
            Ok(()) => {
                info!(module = %path.display(), unit = %unit.name, kind = %unit.kind, "docstring written");
                RunCounters::bump(&self.counters.units_updated);
            }
            Err(e) => self.unit_failed(unit, Stage::Persist, e),
        }
    }

    async fn process_function(&self, unit: CodeUnit) {
        let Some(text) = self.generate(&unit).await else {
            return;
        };

        let extraction = extract_function_docstring(&text);
        match &extraction {
            Extraction::Failed(e) => {
                self.unit_failed(&unit, Stage::Extraction, e);
                return;
            }
            Extraction::Fallback(_) => {
                debug!(module = %unit.module_path.display(), unit = %unit.name, "using raw generated text");
                RunCounters::bump(&self.counters.fallbacks);
            }
            Extraction::Extracted(_) => {}
        }

        let name = unit.name.clone();
        let overwrite = self.policy.function;
        self.rewrite_and_persist(&unit, move |path, source| {
            rewrite_function(path, source, &name, &extraction, overwrite)
        })
        .await;
    }

    async fn process_class(&self, unit: CodeUnit) {
        let Some(text) = self.generate(&unit).await else {
            return;
        };

        let docs = match extract_class_docstrings(&text) {
            Ok(docs) => docs,
            Err(e) => {
                self.unit_failed(&unit, Stage::Extraction, e);
                return;
            }
        };

        let name = unit.name.clone();
        let policy = self.policy;
        self.rewrite_and_persist(&unit, move |path, source| {
            rewrite_class(path, source, &name, &docs, &policy)
        })
        .await;
    }
}

/// Walk the roots and fill the module queue. Runs on a blocking thread;
/// dropping `modules` at the end closes the queue.
pub(crate) fn discovery_worker(
    roots: Vec<PathBuf>,
    ignore: IgnoreSet,
    modules: QueueSender<ModuleTask>,
    ctx: WorkerContext,
) {
    for item in ModuleDiscovery::new(roots, ignore) {
        match item {
            Ok(path) => {
                debug!(module = %path.display(), "discovered");
                RunCounters::bump(&ctx.counters.modules_discovered);
                if modules.send(ModuleTask::new(path)).is_err() {
                    warn!("module queue closed, stopping discovery");
                    return;
                }
            }
            Err(e) => ctx.report(Failure::module(e.path(), Stage::Discovery, &e)),
        }
    }
}

/// Parse modules and split their units into the function and class queues.
pub(crate) async fn extraction_worker(
    modules: QueueReceiver<ModuleTask>,
    functions: QueueSender<CodeUnit>,
    classes: QueueSender<CodeUnit>,
    ctx: WorkerContext,
) {
    while let Some(task) = modules.recv().await {
        let path = task.module_path.clone();
        match tokio::task::spawn_blocking(move || extract_units(&path)).await {
            Ok(Ok(units)) => {
                RunCounters::bump(&ctx.counters.modules_parsed);
                let queues = [(units.functions, &functions), (units.classes, &classes)];
                for (batch, queue) in queues {
                    for unit in batch {
                        if !unit.needs_documentation(&ctx.policy) {
                            debug!(module = %unit.module_path.display(), unit = %unit.name, "already documented");
                            RunCounters::bump(&ctx.counters.units_skipped);
                            continue;
                        }
                        RunCounters::bump(&ctx.counters.units_queued);
                        if let Err(unit) = queue.send(unit) {
                            ctx.unit_failed(&unit, Stage::Parse, "unit queue closed");
                        }
                    }
                }
            }
            Ok(Err(e)) => ctx.report(Failure::module(&task.module_path, Stage::Parse, e)),
            Err(e) => ctx.report(Failure::module(
                &task.module_path,
                Stage::Parse,
                format!("extraction task failed: {e}"),
            )),
        }
        modules.ack();
    }
}

pub(crate) async fn function_worker(units: QueueReceiver<CodeUnit>, ctx: WorkerContext) {
    while let Some(unit) = units.recv().await {
        ctx.process_function(unit).await;
        units.ack();
    }
}

pub(crate) async fn class_worker(units: QueueReceiver<CodeUnit>, ctx: WorkerContext) {
    while let Some(unit) = units.recv().await {
        ctx.process_class(unit).await;
        units.ack();
    }
}
