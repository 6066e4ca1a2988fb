//! End-to-end rotation accounting: the probe order of every iteration is
//! derived from the log written by the previous ones, across both probe
//! modes and configuration growth.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use coldprobe::clock::SystemClock;
use coldprobe::config::{ProbeConfig, Route};
use coldprobe::probe::ProbeExecutor;
use coldprobe::renderer::{CapturedExchange, Page, ResponseWatch};
use coldprobe::rotation::{estimate, plan};
use coldprobe::sink::ResultLog;

/// Page whose holders and data payloads always resolve.
struct StaticPage {
    texts: HashMap<String, String>,
    exchange: CapturedExchange,
}

impl StaticPage {
    fn new() -> Self {
        let texts = [
            ("cold-start-indicator", "true"),
            ("request-count", "1"),
            ("instance-age", "64"),
            ("page-processing-time", "9.5"),
            ("start-render-time", "310"),
            ("initialized-from", "snapshot"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            texts,
            exchange: CapturedExchange {
                body: Some(serde_json::json!({
                    "coldStart": false,
                    "requestCount": 5,
                    "instanceAge": 120,
                    "pageProcessingTime": 3.75,
                    "initializedFrom": "pool",
                })),
                ttfb: Some(Duration::from_millis(180)),
            },
        }
    }
}

impl Page for StaticPage {
    async fn goto_loaded(&self, _url: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn goto_idle(&self, _url: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn element_text(&self, id: &str) -> Result<Option<String>> {
        Ok(self.texts.get(id).cloned())
    }

    async fn watch_response(&self, _fragment: &str) -> Result<ResponseWatch> {
        let (tx, watch) = ResponseWatch::channel();
        let _ = tx.send(self.exchange.clone());
        Ok(watch)
    }
}

fn instant_probe_config() -> ProbeConfig {
    ProbeConfig {
        inter_probe_delay: Duration::ZERO,
        settle_delay: Duration::ZERO,
        navigation_timeout: Duration::from_secs(30),
        capture_timeout: Duration::from_secs(30),
    }
}

/// Run one full iteration the way the agent does, returning the planned
/// probe order as (backend, path) pairs.
async fn run_iteration(
    log: &ResultLog,
    routes: &[Route],
    backends: &[String],
    page: &StaticPage,
) -> Vec<(String, String)> {
    let executor = ProbeExecutor::new(instant_probe_config(), SystemClock);

    let rows = log.read_all().expect("read log");
    let run = estimate(&rows, routes, backends.len());
    let targets = plan(run, routes, backends);

    let order: Vec<(String, String)> = targets
        .iter()
        .map(|t| (t.backend.to_string(), t.route.path.clone()))
        .collect();

    let records = executor.run_plan(page, &targets).await;
    log.append(&records).expect("append records");

    order
}

fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter()
        .map(|(b, p)| (b.to_string(), p.to_string()))
        .collect()
}

#[tokio::test]
async fn rotation_is_fair_across_iterations_and_restarts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = ResultLog::new(dir.path().join("results.csv"));
    let page = StaticPage::new();

    let backends = vec!["https://b0.example.com".to_string(), "https://b1.example.com".to_string()];
    let routes = vec![
        Route::new("/p0", false),
        Route::new("/p1", false),
        Route::new("/p2", true),
    ];

    // Iteration 1: empty log, run number 0, p0 leads.
    let order = run_iteration(&log, &routes, &backends, &page).await;
    assert_eq!(
        order,
        pairs(&[
            ("https://b0.example.com", "/p0"),
            ("https://b1.example.com", "/p0"),
            ("https://b0.example.com", "/p1"),
            ("https://b1.example.com", "/p1"),
            ("https://b0.example.com", "/p2"),
            ("https://b1.example.com", "/p2"),
        ])
    );

    // Six records: every route probed once per backend, one complete cycle.
    let rows = log.read_all().expect("read log");
    assert_eq!(rows.len(), 1 + 6);
    assert_eq!(estimate(&rows, &routes, backends.len()), 1);

    // Iteration 2: derived run number 1, p1 leads. A new ResultLog stands
    // in for a process restart; nothing but the file carries the state.
    let log = ResultLog::new(dir.path().join("results.csv"));
    let order = run_iteration(&log, &routes, &backends, &page).await;
    assert_eq!(
        order,
        pairs(&[
            ("https://b0.example.com", "/p1"),
            ("https://b1.example.com", "/p1"),
            ("https://b0.example.com", "/p2"),
            ("https://b1.example.com", "/p2"),
            ("https://b0.example.com", "/p0"),
            ("https://b1.example.com", "/p0"),
        ])
    );

    // Iteration 3: run number 2, p2 leads.
    let order = run_iteration(&log, &routes, &backends, &page).await;
    assert_eq!(order[0], ("https://b0.example.com".to_string(), "/p2".to_string()));

    let rows = log.read_all().expect("read log");
    assert_eq!(rows.len(), 1 + 18);
    assert_eq!(estimate(&rows, &routes, backends.len()), 3);
}

#[tokio::test]
async fn new_route_is_scheduled_on_the_next_iteration() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = ResultLog::new(dir.path().join("results.csv"));
    let page = StaticPage::new();

    let backends = vec!["https://b0.example.com".to_string()];
    let mut routes = vec![Route::new("/p0", false), Route::new("/p1", false)];

    run_iteration(&log, &routes, &backends, &page).await;
    run_iteration(&log, &routes, &backends, &page).await;

    let rows = log.read_all().expect("read log");
    assert_eq!(estimate(&rows, &routes, backends.len()), 2);

    // Grow the configuration: the unprobed route drags the run number back
    // to zero, so the very next plan includes it.
    routes.push(Route::new("/p2", false));
    assert_eq!(estimate(&rows, &routes, backends.len()), 0);

    let order = run_iteration(&log, &routes, &backends, &page).await;
    assert!(order.iter().any(|(_, p)| p == "/p2"));
}

#[tokio::test]
async fn both_probe_modes_write_their_extracted_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = ResultLog::new(dir.path().join("results.csv"));
    let page = StaticPage::new();

    let backends = vec!["https://b0.example.com".to_string()];
    let routes = vec![Route::new("/page", false), Route::new("/api/startup", true)];

    run_iteration(&log, &routes, &backends, &page).await;

    let rows = log.read_all().expect("read log");
    assert_eq!(rows.len(), 3);

    // Page mode: values read from the DOM holders.
    assert_eq!(rows[1].get(1), Some("/page"));
    assert_eq!(rows[1].get(2), Some("true"));
    assert_eq!(rows[1].get(6), Some("310"));

    // Data mode: values mapped from the payload, TTFB as start-render-time.
    assert_eq!(rows[2].get(1), Some("/api/startup"));
    assert_eq!(rows[2].get(2), Some("false"));
    assert_eq!(rows[2].get(6), Some("180"));
    assert_eq!(rows[2].get(7), Some("pool"));
}
