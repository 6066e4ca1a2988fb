//! Iteration orchestration.
//!
//! One iteration: derive the run number from the log, plan the rotation,
//! execute every probe against a freshly launched browser, append the
//! results. The browser is scoped to the iteration and torn down in every
//! exit path, so a failed iteration never leaks a renderer into the next
//! one.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::probe::ProbeExecutor;
use crate::renderer::cdp::CdpRenderer;
use crate::rotation::{estimate, plan};
use crate::sched::Scheduler;
use crate::sink::ResultLog;

pub struct Agent {
    cfg: Config,
    log: ResultLog,
    executor: ProbeExecutor<SystemClock>,
}

impl Agent {
    pub fn new(cfg: Config) -> Self {
        let log = ResultLog::new(cfg.result_log.clone());
        let executor = ProbeExecutor::new(cfg.probe.clone(), SystemClock);

        Self { cfg, log, executor }
    }

    /// Run iterations on the configured cadence until cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let scheduler = Scheduler::new(self.cfg.schedule.interval, SystemClock);

        let agent = self;
        scheduler
            .run(cancel, move |iteration| agent.run_iteration(iteration))
            .await
    }

    /// One full iteration: estimate, plan, probe, persist.
    pub async fn run_iteration(&self, iteration: u64) -> Result<()> {
        let rows = self.log.read_all().context("reading result log")?;
        let run = estimate(&rows, &self.cfg.routes, self.cfg.backends.len());
        let targets = plan(run, &self.cfg.routes, &self.cfg.backends);

        info!(iteration, run, probes = targets.len(), "starting iteration");

        if targets.is_empty() {
            warn!("nothing to probe, skipping iteration");
            return Ok(());
        }

        let renderer = CdpRenderer::launch(&self.cfg.renderer)
            .await
            .context("launching renderer")?;

        let outcome = async {
            let records = self.executor.run_plan(&renderer, &targets).await;
            self.log
                .append(&records)
                .context("appending results to the log")?;
            Ok::<usize, anyhow::Error>(records.len())
        }
        .await;

        // Teardown happens before the iteration outcome is propagated.
        if let Err(e) = renderer.close().await {
            warn!(error = %format!("{e:#}"), "renderer teardown failed");
        }

        let appended = outcome?;
        info!(iteration, run, appended, "iteration complete");

        Ok(())
    }
}
