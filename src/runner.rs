//! Run coordination: open-loop arrivals, admission, structured joins.
//!
//! One scheduler loop drives launches; each admitted request runs as its
//! own task that executes, appends its record and releases its permit.
//! The scheduler shares nothing with the request tasks except the
//! semaphore and the collector.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::collector::ResultCollector;
use crate::config::HarnessConfig;
use crate::corpus::Prompt;
use crate::executor::RequestExecutor;
use crate::pacing::{Pacer, PacingMode};
use crate::record::RequestRecord;

/// Drives one benchmark run to completion.
pub struct LoadRunner {
    config: HarnessConfig,
    executor: Arc<RequestExecutor>,
}

/// Corpus position for a given launch; wraps around in duration-bound mode.
fn prompt_index(seq: u64, corpus_len: usize) -> usize {
    (seq % corpus_len as u64) as usize
}

/// Resolves when the duration bound elapses; pends forever without one.
async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

impl LoadRunner {
    pub fn new(config: HarnessConfig) -> anyhow::Result<Self> {
        let executor = Arc::new(RequestExecutor::new(config.clone())?);
        Ok(Self { config, executor })
    }

    /// Launch requests until the corpus drains (or the duration bound
    /// elapses), then join every in-flight task and return the full record
    /// set. Cancellation stops new launches promptly; in-flight requests
    /// run to completion or their own timeout.
    ///
    /// Every launch contributes exactly one record: the returned set is
    /// quiesced, never concurrently appended to.
    pub async fn run(
        &self,
        corpus: Arc<Vec<Prompt>>,
        cancel: CancellationToken,
    ) -> Vec<RequestRecord> {
        let collector = Arc::new(ResultCollector::new());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut pacer = Pacer::new(PacingMode::from_rate(self.config.rate), self.config.seed);
        let deadline = (self.config.duration_secs > 0)
            .then(|| tokio::time::Instant::now() + Duration::from_secs(self.config.duration_secs));

        tracing::info!(
            prompts = corpus.len(),
            concurrency = self.config.concurrency,
            rate = self.config.rate,
            duration_secs = self.config.duration_secs,
            "starting load run"
        );

        let mut handles = Vec::new();
        let mut seq: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            // Corpus-drain mode ends after one pass; duration mode wraps.
            if deadline.is_none() && seq as usize >= corpus.len() {
                break;
            }

            // Open loop: the inter-arrival delay elapses regardless of how
            // long earlier requests are taking. The deadline cuts the delay
            // short, so a bound expiring mid-draw ends the run on time.
            if let Some(delay) = pacer.next_delay() {
                let stopped = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = sleep_until_deadline(deadline) => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if stopped {
                    break;
                }
            }

            // Admission gate, biased so a simultaneously-ready permit can
            // never win a launch after the stop condition has fired.
            let acquired = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                _ = sleep_until_deadline(deadline) => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = acquired else { break };

            let executor = self.executor.clone();
            let collector = collector.clone();
            let corpus = corpus.clone();
            let launched = seq;
            handles.push(tokio::spawn(async move {
                let prompt = &corpus[prompt_index(launched, corpus.len())];
                let record = executor.execute(launched, prompt).await;
                collector.append(record);
                drop(permit);
            }));
            seq += 1;
        }

        tracing::info!(launched = seq, "stopped launching, draining in-flight requests");
        for result in futures::future::join_all(handles).await {
            // A panicked request task shrinks the record set; say so.
            if let Err(e) = result {
                tracing::error!(error = %e, "request task panicked");
            }
        }

        Arc::try_unwrap(collector)
            .expect("all request tasks joined")
            .into_records()
    }
}
