//! Probe execution.
//!
//! One probe is one measurement of one (backend, route) pair. A probe never
//! fails: every failure path degrades to sentinel fields, and the record is
//! appended to the log either way, which is what keeps the log-derived
//! rotation accounting honest.

pub mod extract;

use anyhow::Result;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::ProbeConfig;
use crate::record::ResultRecord;
use crate::renderer::Page;
use crate::rotation::Target;
use self::extract::{json_field, or_na, ExtractError, Extracted};

// Element ids of the on-page value holders read in page mode. The probed
// pages expose their measurements through these ids.
const HOLDER_COLD_START: &str = "cold-start-indicator";
const HOLDER_REQUEST_COUNT: &str = "request-count";
const HOLDER_INSTANCE_AGE: &str = "instance-age";
const HOLDER_PAGE_PROCESSING: &str = "page-processing-time";
const HOLDER_START_RENDER: &str = "start-render-time";
const HOLDER_INITIALIZED_FROM: &str = "initialized-from";

// Payload keys read in data mode.
const FIELD_COLD_START: &str = "coldStart";
const FIELD_REQUEST_COUNT: &str = "requestCount";
const FIELD_INSTANCE_AGE: &str = "instanceAge";
const FIELD_PAGE_PROCESSING: &str = "pageProcessingTime";
const FIELD_INITIALIZED_FROM: &str = "initializedFrom";

/// Executes planned probes sequentially against a shared page.
pub struct ProbeExecutor<C: Clock> {
    cfg: ProbeConfig,
    clock: C,
}

impl<C: Clock> ProbeExecutor<C> {
    pub fn new(cfg: ProbeConfig, clock: C) -> Self {
        Self { cfg, clock }
    }

    /// Execute every probe of the plan in order, spacing consecutive probes
    /// by the configured inter-probe delay. No delay after the final probe.
    pub async fn run_plan<P: Page>(&self, page: &P, plan: &[Target<'_>]) -> Vec<ResultRecord> {
        let mut records = Vec::with_capacity(plan.len());

        for (i, target) in plan.iter().enumerate() {
            records.push(self.execute(page, target).await);

            if i + 1 < plan.len() {
                self.clock.sleep(self.cfg.inter_probe_delay).await;
            }
        }

        records
    }

    /// One measurement. Never fails: a probe-level error produces a record
    /// with every measured field set to the sentinel.
    pub async fn execute<P: Page>(&self, page: &P, target: &Target<'_>) -> ResultRecord {
        let mode = if target.route.data { "data" } else { "page" };
        info!(
            backend = target.backend,
            path = %target.route.path,
            mode,
            "probing",
        );

        let result = if target.route.data {
            self.probe_data(page, target).await
        } else {
            self.probe_page(page, target).await
        };

        match result {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    backend = target.backend,
                    path = %target.route.path,
                    error = %format!("{e:#}"),
                    "probe failed, recording sentinel row",
                );
                ResultRecord::failed(target.backend, &target.route.path)
            }
        }
    }

    /// Page mode: load, let the page's own scripts publish their values,
    /// then read the six holders. A missing holder only loses its field.
    async fn probe_page<P: Page>(&self, page: &P, target: &Target<'_>) -> Result<ResultRecord> {
        let url = target.url();

        page.goto_loaded(&url, self.cfg.navigation_timeout).await?;
        self.clock.sleep(self.cfg.settle_delay).await;

        Ok(ResultRecord {
            backend: target.backend.to_string(),
            path: target.route.path.clone(),
            cold_start_indicator: or_na(HOLDER_COLD_START, holder(page, HOLDER_COLD_START).await),
            request_count: or_na(HOLDER_REQUEST_COUNT, holder(page, HOLDER_REQUEST_COUNT).await),
            instance_age: or_na(HOLDER_INSTANCE_AGE, holder(page, HOLDER_INSTANCE_AGE).await),
            page_processing_time: or_na(
                HOLDER_PAGE_PROCESSING,
                holder(page, HOLDER_PAGE_PROCESSING).await,
            ),
            start_render_time: or_na(HOLDER_START_RENDER, holder(page, HOLDER_START_RENDER).await),
            initialized_from: or_na(
                HOLDER_INITIALIZED_FROM,
                holder(page, HOLDER_INITIALIZED_FROM).await,
            ),
        })
    }

    /// Data mode: register the capture before navigating so the exchange
    /// cannot be missed, await quiescence, then map the payload onto the
    /// output fields. Start-render-time comes from the exchange's
    /// time-to-first-byte, not from the payload.
    async fn probe_data<P: Page>(&self, page: &P, target: &Target<'_>) -> Result<ResultRecord> {
        let url = target.url();

        let watch = page.watch_response(&target.route.path).await?;
        page.goto_idle(&url, self.cfg.navigation_timeout).await?;

        let exchange = watch.wait(self.cfg.capture_timeout).await;
        let body = exchange.as_ref().and_then(|x| x.body.as_ref());

        let start_render: Extracted = match &exchange {
            None => Err(ExtractError::CaptureTimeout),
            Some(x) => x
                .ttfb
                .map(|d| d.as_millis().to_string())
                .ok_or(ExtractError::TimingUnavailable),
        };

        Ok(ResultRecord {
            backend: target.backend.to_string(),
            path: target.route.path.clone(),
            cold_start_indicator: or_na(HOLDER_COLD_START, json_field(body, FIELD_COLD_START)),
            request_count: or_na(HOLDER_REQUEST_COUNT, json_field(body, FIELD_REQUEST_COUNT)),
            instance_age: or_na(HOLDER_INSTANCE_AGE, json_field(body, FIELD_INSTANCE_AGE)),
            page_processing_time: or_na(
                HOLDER_PAGE_PROCESSING,
                json_field(body, FIELD_PAGE_PROCESSING),
            ),
            start_render_time: or_na(HOLDER_START_RENDER, start_render),
            initialized_from: or_na(
                HOLDER_INITIALIZED_FROM,
                json_field(body, FIELD_INITIALIZED_FROM),
            ),
        })
    }
}

/// Read one on-page value holder.
async fn holder<P: Page>(page: &P, id: &str) -> Extracted {
    match page.element_text(id).await {
        Ok(Some(text)) => Ok(text.trim().to_string()),
        Ok(None) => Err(ExtractError::ElementNotFound(id.to_string())),
        Err(e) => Err(ExtractError::Other(e)),
    }
}
