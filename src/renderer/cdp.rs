//! Chrome DevTools Protocol renderer.
//!
//! Owns one headless browser process and one page, both reused for every
//! probe of an iteration. The agent calls [`CdpRenderer::close`] at
//! iteration end in every exit path.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived, GetResponseBodyParams,
    RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::RendererConfig;
use crate::renderer::{CapturedExchange, Page, ResponseWatch};

/// Lifecycle event name the quiescence wait resolves on.
const NETWORK_IDLE: &str = "networkIdle";

pub struct CdpRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
    page: chromiumoxide::Page,
}

impl CdpRenderer {
    /// Launch the browser and open the single page reused for the whole
    /// iteration.
    pub async fn launch(cfg: &RendererConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder();

        if !cfg.headless {
            builder = builder.with_head();
        }

        if let Some(executable) = &cfg.executable {
            builder = builder.chrome_executable(executable.clone());
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("building browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launching headless browser")?;

        // The handler stream must be polled for the browser's lifetime.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("opening page")?;

        page.execute(SetLifecycleEventsEnabledParams { enabled: true })
            .await
            .context("enabling lifecycle events")?;

        info!("renderer launched");

        Ok(Self {
            browser,
            handler,
            page,
        })
    }

    /// Tear down the browser process and the handler task. Best-effort: the
    /// iteration outcome must never be masked by teardown problems.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "browser close request failed");
        }

        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "waiting for browser exit failed");
        }

        self.handler.abort();

        info!("renderer closed");

        Ok(())
    }
}

impl Page for CdpRenderer {
    async fn goto_loaded(&self, url: &str, timeout: Duration) -> Result<()> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .with_context(|| format!("navigating to {url}"))?;
            self.page
                .wait_for_navigation()
                .await
                .context("waiting for page load")?;
            Ok(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => bail!("navigation to {url} timed out after {timeout:?}"),
        }
    }

    async fn goto_idle(&self, url: &str, timeout: Duration) -> Result<()> {
        let mut lifecycle = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .context("subscribing to lifecycle events")?;

        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigating to {url}"))?;

        let idle = async {
            while let Some(event) = lifecycle.next().await {
                if event.name == NETWORK_IDLE {
                    return Ok(());
                }
            }
            bail!("lifecycle event stream ended before network idle")
        };

        match tokio::time::timeout(timeout, idle).await {
            Ok(result) => result,
            Err(_) => bail!("network idle for {url} timed out after {timeout:?}"),
        }
    }

    async fn element_text(&self, id: &str) -> Result<Option<String>> {
        let element = match self.page.find_element(format!("#{id}")).await {
            Ok(element) => element,
            Err(e) => {
                debug!(id, error = %e, "element not found");
                return Ok(None);
            }
        };

        element
            .inner_text()
            .await
            .with_context(|| format!("reading inner text of #{id}"))
    }

    async fn watch_response(&self, fragment: &str) -> Result<ResponseWatch> {
        let mut requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("subscribing to request events")?;
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("subscribing to response events")?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("subscribing to loading-finished events")?;

        let page = self.page.clone();
        let fragment = fragment.to_owned();
        let (tx, watch) = ResponseWatch::channel();

        // One-shot capture task. It ends as soon as the exchange resolves or
        // the watch side gives up, dropping every listener registration with
        // it.
        tokio::spawn(async move {
            let mut request_starts: HashMap<RequestId, Instant> = HashMap::new();
            let mut finished_ids: HashSet<RequestId> = HashSet::new();
            let mut matched: Option<(RequestId, Option<Duration>)> = None;
            let mut idle_check = tokio::time::interval(Duration::from_secs(1));

            loop {
                // The watch side dropping (timeout or probe teardown) ends
                // the capture; no listener survives past resolution.
                if tx.is_closed() {
                    return;
                }

                tokio::select! {
                    _ = idle_check.tick() => {}
                    event = requests.next() => {
                        let Some(event) = event else { return };
                        request_starts.insert(event.request_id.clone(), Instant::now());
                    }
                    event = responses.next() => {
                        let Some(event) = event else { return };
                        if matched.is_none() && event.response.url.contains(&fragment) {
                            let ttfb = request_starts
                                .get(&event.request_id)
                                .map(|start| start.elapsed());

                            if finished_ids.contains(&event.request_id) {
                                let body = fetch_json_body(&page, event.request_id.clone()).await;
                                let _ = tx.send(CapturedExchange { body, ttfb });
                                return;
                            }

                            matched = Some((event.request_id.clone(), ttfb));
                        }
                    }
                    event = finished.next() => {
                        let Some(event) = event else { return };
                        if let Some((id, ttfb)) = &matched {
                            if event.request_id == *id {
                                let body = fetch_json_body(&page, id.clone()).await;
                                let _ = tx.send(CapturedExchange { body, ttfb: *ttfb });
                                return;
                            }
                        } else {
                            finished_ids.insert(event.request_id.clone());
                        }
                    }
                }
            }
        });

        Ok(watch)
    }
}

/// Fetch and parse the body of a finished exchange. Any failure is local:
/// the capture still resolves and the payload fields fall back to the
/// sentinel.
async fn fetch_json_body(
    page: &chromiumoxide::Page,
    request_id: RequestId,
) -> Option<serde_json::Value> {
    let response = match page.execute(GetResponseBodyParams::new(request_id)).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "fetching response body failed");
            return None;
        }
    };

    if response.result.base64_encoded {
        debug!("response body is base64-encoded, skipping payload extraction");
        return None;
    }

    match serde_json::from_str(&response.result.body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "response body is not valid JSON");
            None
        }
    }
}
