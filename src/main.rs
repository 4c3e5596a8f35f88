use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod collector;
mod config;
mod corpus;
mod error;
mod executor;
mod mock_server;
mod pacing;
mod record;
mod report;
mod runner;
mod sampler;
mod summary;

use config::{HarnessConfig, MockServerConfig, OutputConfig};
use mock_server::MockInferenceServer;
use record::ReplicaSample;
use report::Reporter;
use runner::LoadRunner;

#[derive(Parser)]
#[command(
    name = "inferload",
    version,
    about = "Rate-controlled load harness for LLM inference endpoints"
)]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a load experiment against an existing endpoint
    Run(RunArgs),
    /// Start the built-in mock server and run the experiment against it
    Standalone(StandaloneArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Prompt corpus file, one prompt per non-blank line
    #[arg(long, env = "INFERLOAD_CORPUS")]
    corpus: PathBuf,

    /// Target endpoint URL
    #[arg(
        long,
        env = "INFERLOAD_ENDPOINT",
        default_value = "http://localhost:11434/api/generate"
    )]
    endpoint: String,

    /// Model identifier sent in every request body
    #[arg(long, env = "INFERLOAD_MODEL", default_value = "llama3.2:3b")]
    model: String,

    /// Target arrival rate in requests/second; 0 = unbounded
    #[arg(long, default_value_t = 0.0)]
    rate: f64,

    /// Maximum simultaneously in-flight requests
    #[arg(long, default_value_t = 32)]
    concurrency: usize,

    /// Hard per-request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Generation-length cap sent as options.num_predict
    #[arg(long, default_value_t = 256)]
    max_tokens: u32,

    /// Sampling temperature sent with every request
    #[arg(long, default_value_t = 0.0)]
    temperature: f64,

    /// Use at most this many corpus prompts; 0 = all
    #[arg(long, default_value_t = 0)]
    prompt_cap: usize,

    /// Run for this many seconds, wrapping the corpus; 0 = drain once
    #[arg(long, default_value_t = 0)]
    duration_secs: u64,

    /// Extra attempts after a transport-level failure
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Pacer seed for a reproducible arrival schedule
    #[arg(long)]
    seed: Option<u64>,

    /// Directory the run's artifacts are written to
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Run label; prefixes every artifact file name
    #[arg(long)]
    label: Option<String>,

    /// Poll this Deployment's replica counts during the run
    #[cfg(feature = "kube-sampler")]
    #[arg(long)]
    deployment: Option<String>,

    /// Namespace of the polled Deployment
    #[cfg(feature = "kube-sampler")]
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Replica poll interval in seconds
    #[cfg(feature = "kube-sampler")]
    #[arg(long, default_value_t = 1)]
    sample_interval_secs: u64,
}

#[derive(Args)]
struct StandaloneArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Simulated response latency of the mock server, milliseconds
    #[arg(long, default_value_t = 20)]
    mock_latency_ms: u64,

    /// Fraction of mock responses answered with HTTP 500
    #[arg(long, default_value_t = 0.0)]
    mock_error_rate: f64,

    /// Mock server port; 0 picks an ephemeral port
    #[arg(long, default_value_t = 0)]
    mock_port: u16,
}

impl RunArgs {
    fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            rate: self.rate,
            concurrency: self.concurrency,
            timeout_secs: self.timeout_secs,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            prompt_cap: self.prompt_cap,
            duration_secs: self.duration_secs,
            max_retries: self.max_retries,
            seed: self.seed,
        }
    }

    fn output_config(&self) -> OutputConfig {
        OutputConfig {
            out_dir: self.out_dir.clone(),
            label: self
                .label
                .clone()
                .unwrap_or_else(config::default_label),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Run(args) => {
            let config = args.harness_config();
            execute_run(config, &args).await
        }
        Command::Standalone(args) => {
            let mut server = MockInferenceServer::new(MockServerConfig {
                port: args.mock_port,
                latency_ms: args.mock_latency_ms,
                error_rate: args.mock_error_rate,
                ..Default::default()
            });
            server.start().await?;
            tracing::info!("🧪 Mock inference server listening at {}", server.endpoint());

            let mut config = args.run.harness_config();
            config.endpoint = server.endpoint();
            let result = execute_run(config, &args.run).await;
            server.stop();
            result
        }
    }
}

async fn execute_run(config: HarnessConfig, args: &RunArgs) -> Result<()> {
    config.validate()?;
    let prompts = corpus::load_corpus(&args.corpus, config.prompt_cap)?;
    tracing::info!("📚 Loaded {} prompts from {}", prompts.len(), args.corpus.display());

    // Ctrl-C stops new launches; in-flight requests finish or time out.
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping new launches");
            ctrl_c_token.cancel();
        }
    });

    // The sampler outlives the load loop slightly: it is cancelled only
    // after every request has been joined, so scale-down tails are captured.
    let sampler_cancel = CancellationToken::new();
    let sampler_task = spawn_replica_sampler(args, &sampler_cancel).await?;

    let runner = LoadRunner::new(config.clone())?;
    let records = runner.run(Arc::new(prompts), cancel.clone()).await;

    sampler_cancel.cancel();
    let replicas: Vec<ReplicaSample> = match sampler_task {
        Some(task) => task.await?,
        None => Vec::new(),
    };

    let summary = summary::summarize(&records);
    let reporter = Reporter::new(&args.output_config());
    reporter.persist(&records, &summary, &replicas)?;

    tracing::info!(
        "✅ Run complete: {}/{} requests succeeded ({} http errors, {} timeouts, {} transport errors)",
        summary.successful,
        summary.total,
        summary.http_errors,
        summary.timeouts,
        summary.transport_errors
    );
    tracing::info!(
        "   Latency p50 {:.1} ms, p90 {:.1} ms, p95 {:.1} ms over {:.1} s wall clock",
        summary.latency_p50_ms,
        summary.latency_p90_ms,
        summary.latency_p95_ms,
        summary.wall_clock_s
    );
    tracing::info!(
        "   {} generated tokens at {:.1} tok/s aggregate",
        summary.generated_tokens,
        summary.aggregate_gen_tokens_per_sec
    );
    tracing::info!("📄 Artifacts written to {}", args.out_dir.display());
    Ok(())
}

#[cfg(feature = "kube-sampler")]
async fn spawn_replica_sampler(
    args: &RunArgs,
    cancel: &CancellationToken,
) -> Result<Option<tokio::task::JoinHandle<Vec<ReplicaSample>>>> {
    use std::time::Duration;

    let Some(deployment) = &args.deployment else {
        return Ok(None);
    };
    let sampler_config = config::SamplerConfig {
        deployment: deployment.clone(),
        namespace: args.namespace.clone(),
        interval_secs: args.sample_interval_secs.max(1),
    };
    let source = Arc::new(
        sampler::KubeReplicaSource::new(&sampler_config.namespace, &sampler_config.deployment)
            .await?,
    ) as Arc<dyn sampler::ReplicaSource>;
    let interval = Duration::from_secs(sampler_config.interval_secs);
    tracing::info!(
        "🔭 Sampling replicas of {}/{} every {:?}",
        sampler_config.namespace,
        sampler_config.deployment,
        interval
    );
    Ok(Some(tokio::spawn(sampler::sample_replicas(
        source,
        interval,
        cancel.clone(),
    ))))
}

#[cfg(not(feature = "kube-sampler"))]
async fn spawn_replica_sampler(
    _args: &RunArgs,
    _cancel: &CancellationToken,
) -> Result<Option<tokio::task::JoinHandle<Vec<ReplicaSample>>>> {
    Ok(None)
}
