//! Concurrent discovery → extraction → generation/rewrite pipeline.
//!
//! ```text
//! discovery ──► modules ──► extraction ─┬─► functions ──► function workers ─┐
//!                                       └─► classes   ──► class workers    ─┴─► persist
//! ```
//!
//! Every stage is a fixed set of long-lived tasks draining an unbounded
//! queue. A queue closes when all of its senders are dropped, which happens
//! when the upstream stage has finished; stages are then joined in order.
//! Function and class workers may target the same module, so every
//! read-modify-write of a module runs under that module's lock.

mod locks;
mod outcome;
mod queue;
mod workers;

pub use locks::PathLocks;
pub use outcome::{Failure, RunCounters, RunReport, Stage};
pub use queue::{work_queue, QueueReceiver, QueueSender, QueueStats};

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::discover::ModuleTask;
use crate::generate::GenerationClient;
use crate::parser::CodeUnit;
use crate::persist::Persister;
use workers::{class_worker, discovery_worker, extraction_worker, function_worker, WorkerContext};

/// A configured pipeline. `run` can be called more than once.
pub struct Pipeline {
    config: Arc<Config>,
    client: Arc<dyn GenerationClient>,
    persister: Arc<Persister>,
}

impl Pipeline {
    pub fn new(config: Config, client: Arc<dyn GenerationClient>) -> Self {
        let persister = Persister::from_config(&config);
        Self {
            config: Arc::new(config),
            client,
            persister: Arc::new(persister),
        }
    }

    pub fn with_persister(mut self, persister: Persister) -> Self {
        self.persister = Arc::new(persister);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage to completion and collect the outcome.
    pub async fn run(&self) -> RunReport {
        let config = &self.config;
        let (modules_tx, modules_rx) = work_queue::<ModuleTask>("modules");
        let (functions_tx, functions_rx) = work_queue::<CodeUnit>("functions");
        let (classes_tx, classes_rx) = work_queue::<CodeUnit>("classes");
        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(RunCounters::default());

        let ctx = WorkerContext {
            config: Arc::clone(config),
            policy: config.overwrite_policy(),
            client: Arc::clone(&self.client),
            persister: Arc::clone(&self.persister),
            locks: Arc::new(PathLocks::new()),
            counters: Arc::clone(&counters),
            failures: failures_tx,
        };

        info!(
            roots = config.paths.len(),
            style = %config.documentation_style,
            "starting docstring generation"
        );

        let discovery = {
            let roots = config.paths.clone();
            let ignore = config.ignore_set();
            let ctx = ctx.clone();
            tokio::task::spawn_blocking(move || discovery_worker(roots, ignore, modules_tx, ctx))
        };

        let extractors: Vec<JoinHandle<()>> = (0..config.workers.extraction)
            .map(|_| {
                tokio::spawn(extraction_worker(
                    modules_rx.clone(),
                    functions_tx.clone(),
                    classes_tx.clone(),
                    ctx.clone(),
                ))
            })
            .collect();
        // Unit queues close once the last extractor is done.
        drop(functions_tx);
        drop(classes_tx);

        let function_workers: Vec<JoinHandle<()>> = (0..config.workers.function)
            .map(|_| tokio::spawn(function_worker(functions_rx.clone(), ctx.clone())))
            .collect();
        let class_workers: Vec<JoinHandle<()>> = (0..config.workers.class)
            .map(|_| tokio::spawn(class_worker(classes_rx.clone(), ctx.clone())))
            .collect();
        drop(ctx);

        if let Err(e) = discovery.await {
            error!("discovery worker failed: {}", e);
        }
        join_stage("extraction", extractors).await;
        join_stage("function", function_workers).await;
        join_stage("class", class_workers).await;

        for stats in [modules_rx.stats(), functions_rx.stats(), classes_rx.stats()] {
            if stats.in_flight() != 0 {
                warn!(
                    queue = stats.name(),
                    in_flight = stats.in_flight(),
                    "queue finished with unacknowledged items"
                );
            }
        }

        // All worker contexts are gone, so the failure channel is closed.
        let mut failures = Vec::new();
        while let Some(failure) = failures_rx.recv().await {
            failures.push(failure);
        }

        let report = RunReport::from_counters(&counters, failures);
        info!(
            modules = report.modules_discovered,
            updated = report.units_updated,
            skipped = report.units_skipped,
            failed = report.failures.len(),
            "docstring generation finished"
        );
        report
    }
}

async fn join_stage(stage: &str, handles: Vec<JoinHandle<()>>) {
    for result in join_all(handles).await {
        if let Err(e) = result {
            error!(stage, "worker failed: {}", e);
        }
    }
}
