//! Page-rendering collaborator port.
//!
//! The probe executor drives a single browser page through the [`Page`]
//! trait; the production implementation speaks the Chrome DevTools Protocol
//! ([`cdp`]). Tests substitute an in-memory page.

pub mod cdp;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;

/// The network exchange captured for a data-mode probe.
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    /// Parsed JSON body of the matched response, if it could be read.
    pub body: Option<serde_json::Value>,

    /// Request-start to response-start of the matched exchange, if both
    /// lifecycle events were observed.
    pub ttfb: Option<Duration>,
}

/// One-shot handle for a data-mode network capture.
///
/// Resolves to the first exchange whose URL matches the watched fragment, or
/// to `None` once the timeout elapses or the producer goes away without a
/// match.
pub struct ResponseWatch {
    rx: oneshot::Receiver<CapturedExchange>,
}

impl ResponseWatch {
    /// Create a watch and the sender its producer resolves it with.
    pub fn channel() -> (oneshot::Sender<CapturedExchange>, ResponseWatch) {
        let (tx, rx) = oneshot::channel();
        (tx, ResponseWatch { rx })
    }

    /// Wait for the matched exchange, bounded by `timeout`.
    pub async fn wait(self, timeout: Duration) -> Option<CapturedExchange> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(exchange)) => Some(exchange),
            // Producer dropped without a match.
            Ok(Err(_)) => None,
            // Timeout.
            Err(_) => None,
        }
    }
}

/// A single browser page reused across one iteration's probes.
pub trait Page: Send + Sync {
    /// Navigate and wait for the page load signal.
    fn goto_loaded(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Navigate and wait for network quiescence.
    fn goto_idle(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Inner text of the element with the given id, or `None` if absent.
    fn element_text(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>>> + Send;

    /// Start watching for the first response whose URL contains `fragment`.
    ///
    /// Must be called before the navigation that triggers the request, so
    /// the exchange cannot be missed.
    fn watch_response(
        &self,
        fragment: &str,
    ) -> impl std::future::Future<Output = Result<ResponseWatch>> + Send;
}
