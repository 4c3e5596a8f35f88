//! Core data model: per-request records, replica samples, run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal outcome of one executed request.
///
/// The distinction between `HttpError` (server answered, rejected) and
/// `Timeout`/`TransportError` (network broke) is load-bearing: aggregation
/// separates "server rejected or slow" from "connection failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    HttpError,
    Timeout,
    TransportError,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::HttpError => write!(f, "http_error"),
            Outcome::Timeout => write!(f, "timeout"),
            Outcome::TransportError => write!(f, "transport_error"),
        }
    }
}

/// Result of one executed request. Created by the executor, appended once to
/// the collector, never mutated afterward.
///
/// Column names `start_iso`, `end_iso` and `latency_ms` match what the
/// offline analysis scripts expect in `{label}_requests.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Monotonic sequence id, assigned at launch; equals launch order.
    pub seq: u64,
    pub start_iso: DateTime<Utc>,
    pub end_iso: DateTime<Utc>,
    pub latency_ms: f64,
    pub outcome: Outcome,
    /// HTTP status code when the server answered (200 on success).
    pub http_code: Option<u16>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Server-reported prompt evaluation time, seconds.
    pub prompt_eval_duration_s: f64,
    /// Server-reported generation time, seconds.
    pub eval_duration_s: f64,
    /// Truncated error text for non-success outcomes.
    pub error: Option<String>,
}

impl RequestRecord {
    /// CSV column names, in struct field order. Written explicitly so even
    /// an empty table carries its header row.
    pub const CSV_HEADER: [&'static str; 11] = [
        "seq",
        "start_iso",
        "end_iso",
        "latency_ms",
        "outcome",
        "http_code",
        "prompt_tokens",
        "completion_tokens",
        "prompt_eval_duration_s",
        "eval_duration_s",
        "error",
    ];

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// One timestamped observation of a workload's replica counts.
///
/// A failed poll degrades to a sample with absent counts rather than
/// aborting the loop. Column names match `{label}_replicas.csv` as read by
/// the autoscale analysis scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSample {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "availableReplicas")]
    pub available: Option<u32>,
    #[serde(rename = "readyReplicas")]
    pub ready: Option<u32>,
}

impl ReplicaSample {
    /// CSV column names, matching the serde renames above.
    pub const CSV_HEADER: [&'static str; 3] = ["timestamp", "availableReplicas", "readyReplicas"];
}

/// Aggregate statistics over a full, frozen record set.
///
/// Always recomputed from the complete set at run end, never maintained
/// incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: u64,
    pub successful: u64,
    pub http_errors: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    /// Latency percentiles over successful requests, milliseconds.
    /// 0.0 when no request succeeded.
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p95_ms: f64,
    pub prompt_tokens: u64,
    pub generated_tokens: u64,
    /// Total server-reported prompt evaluation time, seconds.
    pub prompt_eval_time_s: f64,
    /// Total server-reported generation time, seconds.
    pub gen_eval_time_s: f64,
    /// generated_tokens / gen_eval_time_s; 0.0 when no generation time
    /// was reported.
    pub aggregate_gen_tokens_per_sec: f64,
    /// Wall-clock span from first launch to last completion, seconds.
    pub wall_clock_s: f64,
}
