//! Configuration structs for a benchmark run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::HarnessError;

/// The immutable knobs for one run. Set once before the run starts.
///
/// Every field has a default so no tunable is silently required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Target endpoint URL (default `http://localhost:11434/api/generate`)
    pub endpoint: String,
    /// Model identifier sent in every request body (default `llama3.2:3b`)
    pub model: String,
    /// Target arrival rate in requests/second; 0 = unbounded (default 0)
    pub rate: f64,
    /// Maximum simultaneously in-flight requests (default 32)
    pub concurrency: usize,
    /// Hard per-request timeout in seconds (default 120)
    pub timeout_secs: u64,
    /// Generation-length cap, `options.num_predict` (default 256)
    pub max_tokens: u32,
    /// Sampling temperature sent with every request (default 0.0)
    pub temperature: f64,
    /// Use at most this many corpus prompts; 0 = all (default 0)
    pub prompt_cap: usize,
    /// Run for this many seconds, wrapping the corpus cyclically;
    /// 0 = drain the corpus once (default 0)
    pub duration_secs: u64,
    /// Extra attempts after a transport-level failure (default 2).
    /// 4xx/5xx responses are never retried.
    pub max_retries: u32,
    /// Seed for the arrival pacer; None = entropy (default None)
    pub seed: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "llama3.2:3b".to_string(),
            rate: 0.0,
            concurrency: 32,
            timeout_secs: 120,
            max_tokens: 256,
            temperature: 0.0,
            prompt_cap: 0,
            duration_secs: 0,
            max_retries: 2,
            seed: None,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.concurrency == 0 {
            return Err(HarnessError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(HarnessError::InvalidConfig(format!(
                "rate must be a non-negative finite number, got {}",
                self.rate
            )));
        }
        if self.timeout_secs == 0 {
            return Err(HarnessError::InvalidConfig(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replica-sampling settings for autoscale experiments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Deployment whose replica counts are polled
    pub deployment: String,
    /// Namespace of the deployment (default `default`)
    pub namespace: String,
    /// Poll interval in seconds (default 1)
    pub interval_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            deployment: String::new(),
            namespace: "default".to_string(),
            interval_secs: 1,
        }
    }
}

/// Configuration for the mock inference server (standalone mode and tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockServerConfig {
    /// Port to listen on (0 for ephemeral)
    pub port: u16,
    /// Simulated time to produce a response, milliseconds (default 20)
    pub latency_ms: u64,
    /// `eval_count` reported in every success body (default 10)
    pub eval_count: u64,
    /// `eval_duration` reported, nanoseconds (default 1s)
    pub eval_duration_ns: u64,
    /// `prompt_eval_count` reported (default 5)
    pub prompt_eval_count: u64,
    /// `prompt_eval_duration` reported, nanoseconds (default 0.1s)
    pub prompt_eval_duration_ns: u64,
    /// Fraction of requests answered with HTTP 500 (default 0.0)
    pub error_rate: f64,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            latency_ms: 20,
            eval_count: 10,
            eval_duration_ns: 1_000_000_000,
            prompt_eval_count: 5,
            prompt_eval_duration_ns: 100_000_000,
            error_rate: 0.0,
        }
    }
}

/// Where the run's artifacts land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for artifacts (default `out`)
    pub out_dir: PathBuf,
    /// Run label; prefixes every artifact file name
    pub label: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            label: default_label(),
        }
    }
}

/// Timestamped label so consecutive runs never collide.
pub fn default_label() -> String {
    chrono::Utc::now().format("run_%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint, "http://localhost:11434/api/generate");
        assert_eq!(config.concurrency, 32);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.duration_secs, 0);
        assert_eq!(config.rate, 0.0);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = HarnessConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_negative_or_nan_rate_is_rejected() {
        for rate in [-1.0, f64::NAN, f64::INFINITY] {
            let config = HarnessConfig {
                rate,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "rate {rate} should fail");
        }
    }

    #[test]
    fn test_default_label_has_run_prefix() {
        assert!(default_label().starts_with("run_"));
    }

    #[test]
    fn test_sampler_defaults() {
        let sampler = SamplerConfig::default();
        assert_eq!(sampler.namespace, "default");
        assert_eq!(sampler.interval_secs, 1);
    }
}
