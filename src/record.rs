//! Result record schema for the durable probe log.

/// Sentinel written for any field that could not be determined.
pub const NA: &str = "N/A";

/// Column headers of the durable result log, in writing order.
pub const HEADER: [&str; 8] = [
    "BACKEND",
    "PATH",
    "cold-start-indicator",
    "request-count",
    "instance-age",
    "page-processing-time",
    "start-render-time",
    "initialized-from",
];

/// Header name of the path column used by the run-number estimator.
pub const PATH_COLUMN: &str = "PATH";

/// One probe result: a single row in the durable result log.
///
/// `backend` and `path` identify the probed endpoint and are always
/// populated; the six measured fields are free-form strings and fall back
/// to [`NA`] individually when a value could not be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub backend: String,
    pub path: String,
    pub cold_start_indicator: String,
    pub request_count: String,
    pub instance_age: String,
    pub page_processing_time: String,
    pub start_render_time: String,
    pub initialized_from: String,
}

impl ResultRecord {
    /// Record for a probe that failed entirely: identity fields populated,
    /// every measured field set to the sentinel.
    pub fn failed(backend: &str, path: &str) -> Self {
        Self {
            backend: backend.to_string(),
            path: path.to_string(),
            cold_start_indicator: NA.to_string(),
            request_count: NA.to_string(),
            instance_age: NA.to_string(),
            page_processing_time: NA.to_string(),
            start_render_time: NA.to_string(),
            initialized_from: NA.to_string(),
        }
    }

    /// The record's fields in header order.
    pub fn fields(&self) -> [&str; 8] {
        [
            &self.backend,
            &self.path,
            &self.cold_start_indicator,
            &self.request_count,
            &self.instance_age,
            &self.page_processing_time,
            &self.start_render_time,
            &self.initialized_from,
        ]
    }
}
