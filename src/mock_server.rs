//! Mock inference server answering native-style generate responses.
//!
//! Used by the `standalone` subcommand and by the integration tests:
//! simulates an endpoint with configurable latency, token counts and
//! error rate, so the harness can be exercised without a real model.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use rand::Rng;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::MockServerConfig;

/// Mock inference endpoint for benchmarking without a backend.
pub struct MockInferenceServer {
    config: MockServerConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockInferenceServer {
    pub fn new(config: MockServerConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            port: 0,
        }
    }

    /// Start the server and return the actual port.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("127.0.0.1:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        self.port = port;

        let config = Arc::new(self.config.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = Router::new()
            .route("/api/generate", post(handle_generate))
            .with_state(config);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give the server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Ok(port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Full endpoint URL for a harness config.
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}/api/generate", self.port)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockInferenceServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_generate(
    State(config): State<Arc<MockServerConfig>>,
    body: Json<serde_json::Value>,
) -> Response {
    if config.error_rate > 0.0 {
        let roll: f64 = rand::thread_rng().gen();
        if roll < config.error_rate {
            return (StatusCode::INTERNAL_SERVER_ERROR, "simulated backend error").into_response();
        }
    }

    if config.latency_ms > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(config.latency_ms)).await;
    }

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    let response = serde_json::json!({
        "model": model,
        "response": generate_content(config.eval_count as usize),
        "done": true,
        "prompt_eval_count": config.prompt_eval_count,
        "prompt_eval_duration": config.prompt_eval_duration_ns,
        "eval_count": config.eval_count,
        "eval_duration": config.eval_duration_ns,
    });

    (StatusCode::OK, Json(response)).into_response()
}

/// Generate filler output, one word per simulated token.
fn generate_content(words: usize) -> String {
    const WORDS: &[&str] = &[
        "the", "model", "considers", "several", "factors", "first", "light", "scatters", "because",
        "shorter", "wavelengths", "interact", "more", "with", "air", "molecules", "therefore",
        "answers", "vary",
    ];

    let mut rng = rand::thread_rng();
    let mut result = String::new();
    for i in 0..words {
        if i > 0 {
            result.push(' ');
        }
        result.push_str(WORDS[rng.gen_range(0..WORDS.len())]);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_answers_native_body() {
        let mut server = MockInferenceServer::new(MockServerConfig {
            latency_ms: 1,
            ..Default::default()
        });
        let port = server.start().await.unwrap();
        assert!(port > 0);

        let client = reqwest::Client::new();
        let resp = client
            .post(server.endpoint())
            .json(&serde_json::json!({"model": "m", "prompt": "q", "stream": false}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["eval_count"], 10);
        assert_eq!(body["eval_duration"], 1_000_000_000u64);
        assert_eq!(body["model"], "m");
        assert!(body["response"].is_string());

        server.stop();
    }

    #[tokio::test]
    async fn test_mock_server_full_error_rate() {
        let mut server = MockInferenceServer::new(MockServerConfig {
            latency_ms: 0,
            error_rate: 1.0,
            ..Default::default()
        });
        server.start().await.unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .post(server.endpoint())
            .json(&serde_json::json!({"model": "m", "prompt": "q"}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 500);
    }

    #[test]
    fn test_generate_content_word_count() {
        let content = generate_content(8);
        assert_eq!(content.split(' ').count(), 8);
        assert_eq!(generate_content(0), "");
    }
}
