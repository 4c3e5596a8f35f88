//! Replica sampling for autoscale experiments.
//!
//! An independent cancellable loop that polls an external workload's
//! replica counts on a fixed interval, for the same wall-clock window as
//! the request stream. Sampling is best-effort: a failed poll becomes a
//! null sample, never a harness failure.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::record::ReplicaSample;

/// Point-in-time replica counts of a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaCounts {
    pub available: u32,
    pub ready: u32,
}

/// Read-only view of an external workload's replica counts.
#[async_trait]
pub trait ReplicaSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<ReplicaCounts>;
}

/// Poll `source` every `interval` until cancelled, returning the collected
/// series.
///
/// Each fetch is capped at one interval so a hung source cannot delay the
/// end of the run by more than one tick; the cancellation signal is
/// likewise observed at most one tick late.
pub async fn sample_replicas(
    source: Arc<dyn ReplicaSource>,
    interval: Duration,
    cancel: CancellationToken,
) -> Vec<ReplicaSample> {
    let mut samples = Vec::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Cancellation wins over a simultaneously-ready tick.
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let timestamp = Utc::now();
                let sample = match tokio::time::timeout(interval, source.fetch()).await {
                    Ok(Ok(counts)) => ReplicaSample {
                        timestamp,
                        available: Some(counts.available),
                        ready: Some(counts.ready),
                    },
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "replica poll failed, recording null sample");
                        ReplicaSample { timestamp, available: None, ready: None }
                    }
                    Err(_) => {
                        tracing::warn!("replica poll timed out, recording null sample");
                        ReplicaSample { timestamp, available: None, ready: None }
                    }
                };
                samples.push(sample);
            }
        }
    }

    tracing::debug!(count = samples.len(), "replica sampling stopped");
    samples
}

#[cfg(feature = "kube-sampler")]
pub use kube_source::KubeReplicaSource;

#[cfg(feature = "kube-sampler")]
mod kube_source {
    use super::{ReplicaCounts, ReplicaSource};
    use anyhow::Context;
    use async_trait::async_trait;
    use k8s_openapi::api::apps::v1::Deployment;
    use kube::{Api, Client};

    /// Reads a named Deployment's replica counts from the Kubernetes API.
    pub struct KubeReplicaSource {
        api: Api<Deployment>,
        name: String,
    }

    impl KubeReplicaSource {
        /// Connects using the ambient kubeconfig or in-cluster environment.
        pub async fn new(namespace: &str, deployment: &str) -> anyhow::Result<Self> {
            let client = Client::try_default()
                .await
                .context("failed to create Kubernetes client")?;
            Ok(Self {
                api: Api::namespaced(client, namespace),
                name: deployment.to_string(),
            })
        }
    }

    #[async_trait]
    impl ReplicaSource for KubeReplicaSource {
        async fn fetch(&self) -> anyhow::Result<ReplicaCounts> {
            let deployment = self
                .api
                .get(&self.name)
                .await
                .with_context(|| format!("reading deployment {}", self.name))?;
            let status = deployment.status.unwrap_or_default();
            Ok(ReplicaCounts {
                available: status.available_replicas.unwrap_or(0).max(0) as u32,
                ready: status.ready_replicas.unwrap_or(0).max(0) as u32,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Source that succeeds, fails, or both, with a call counter.
    struct FakeSource {
        calls: AtomicU64,
        fail_on: Option<u64>,
    }

    impl FakeSource {
        fn steady() -> Self {
            Self {
                calls: AtomicU64::new(0),
                fail_on: None,
            }
        }

        fn failing_on(n: u64) -> Self {
            Self {
                calls: AtomicU64::new(0),
                fail_on: Some(n),
            }
        }
    }

    #[async_trait]
    impl ReplicaSource for FakeSource {
        async fn fetch(&self) -> anyhow::Result<ReplicaCounts> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_on {
                anyhow::bail!("api unavailable");
            }
            Ok(ReplicaCounts {
                available: 3,
                ready: 2,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_ticks_on_interval_until_cancelled() {
        let source = Arc::new(FakeSource::steady());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sample_replicas(
            source.clone(),
            Duration::from_secs(1),
            cancel.clone(),
        ));

        // Paused clock: sleeping advances virtual time deterministically.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        cancel.cancel();
        let samples = handle.await.unwrap();

        // Ticks at t=0,1,2,3.
        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.available == Some(3)));
        assert!(samples.iter().all(|s| s.ready == Some(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_degrades_to_null_sample() {
        let source = Arc::new(FakeSource::failing_on(1));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sample_replicas(
            source,
            Duration::from_secs(1),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        let samples = handle.await.unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].available, Some(3));
        // The failure is a row, not a crash.
        assert_eq!(samples[1].available, None);
        assert_eq!(samples[1].ready, None);
        assert_eq!(samples[2].available, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_observed_promptly() {
        let source = Arc::new(FakeSource::steady());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let samples =
            sample_replicas(source, Duration::from_secs(1), cancel).await;
        assert!(samples.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_source_cannot_stall_shutdown() {
        struct HungSource;

        #[async_trait]
        impl ReplicaSource for HungSource {
            async fn fetch(&self) -> anyhow::Result<ReplicaCounts> {
                std::future::pending().await
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sample_replicas(
            Arc::new(HungSource),
            Duration::from_secs(1),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        let samples = handle.await.unwrap();

        // Every tick produced a null sample despite the source never
        // resolving.
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.available.is_none()));
    }
}
