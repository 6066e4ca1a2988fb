use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for the coldprobe agent.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    #[allow(dead_code)]
    pub log_level: String,

    /// Path of the durable result log. Default: "results.csv".
    #[serde(default = "default_result_log")]
    pub result_log: PathBuf,

    /// Ordered deployment origins to probe (e.g. "https://app.example.com").
    #[serde(default)]
    pub backends: Vec<String>,

    /// Ordered routes probed on every backend.
    #[serde(default)]
    pub routes: Vec<Route>,

    /// Probe execution tuning.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Iteration cadence.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Headless browser settings.
    #[serde(default)]
    pub renderer: RendererConfig,
}

/// A relative route, optionally flagged as a structured-data endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Route {
    /// Relative path, starting with "/".
    pub path: String,

    /// The route returns a machine-readable payload instead of a page.
    #[serde(default)]
    pub data: bool,
}

impl Route {
    pub fn new(path: impl Into<String>, data: bool) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }
}

/// Probe execution tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Pause between consecutive probes of one iteration. Default: 20s.
    #[serde(default = "default_inter_probe_delay", with = "humantime_serde")]
    pub inter_probe_delay: Duration,

    /// Wait after page load before reading value holders. Default: 5s.
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,

    /// Per-navigation timeout. Default: 30s.
    #[serde(default = "default_navigation_timeout", with = "humantime_serde")]
    pub navigation_timeout: Duration,

    /// Data-mode response capture timeout. Default: 30s.
    #[serde(default = "default_capture_timeout", with = "humantime_serde")]
    pub capture_timeout: Duration,
}

/// Iteration cadence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Wall-clock gap between iteration starts. Default: 1h.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

/// Headless browser settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    /// Run the browser headless. Default: true.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Browser executable override. Default: auto-detect.
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_result_log() -> PathBuf {
    PathBuf::from("results.csv")
}

fn default_inter_probe_delay() -> Duration {
    Duration::from_secs(20)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_navigation_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_capture_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_true() -> bool {
    true
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            result_log: default_result_log(),
            backends: Vec::new(),
            routes: Vec::new(),
            probe: ProbeConfig::default(),
            schedule: ScheduleConfig::default(),
            renderer: RendererConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            inter_probe_delay: default_inter_probe_delay(),
            settle_delay: default_settle_delay(),
            navigation_timeout: default_navigation_timeout(),
            capture_timeout: default_capture_timeout(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            bail!("backends must not be empty");
        }

        for backend in &self.backends {
            if !backend.starts_with("http://") && !backend.starts_with("https://") {
                bail!("backend {backend:?} must be an absolute http(s) origin");
            }
        }

        if self.routes.is_empty() {
            bail!("routes must not be empty");
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if !route.path.starts_with('/') {
                bail!("route path {:?} must start with '/'", route.path);
            }

            // Duplicate paths would double-count in run-number estimation.
            if !seen.insert(route.path.as_str()) {
                bail!("route path {:?} appears more than once", route.path);
            }
        }

        if self.schedule.interval.is_zero() {
            bail!("schedule.interval must be positive");
        }

        if self.probe.navigation_timeout.is_zero() {
            bail!("probe.navigation_timeout must be positive");
        }

        if self.probe.capture_timeout.is_zero() {
            bail!("probe.capture_timeout must be positive");
        }

        Ok(())
    }
}
