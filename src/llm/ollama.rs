use super::{GenerationError, TextGenerator};
use crate::context::STOP_SEQUENCES;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub base_url: String,
    pub model: String,
    /// Kept low so answers stay close to the supplied context.
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "mistral".to_string(),
            temperature: 0.1,
            max_tokens: 256,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    num_predict: u32,
    stop: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for a local Ollama server's `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    settings: GenerationSettings,
    client: reqwest::Client,
    shutdown: CancellationToken,
}

impl OllamaClient {
    pub fn new(settings: GenerationSettings, shutdown: CancellationToken) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            shutdown,
        }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    async fn request(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.settings.base_url.trim_end_matches('/'));

        let request = GenerateRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
                stop: &STOP_SEQUENCES,
            },
        };

        debug!("-> Sending prompt to {} ({} chars)", url, prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            return Err(GenerationError::Status { status, body });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;

        debug!("<- Received {} chars", reply.response.len());

        Ok(reply.response.trim().to_string())
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let timeout = self.settings.timeout;
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(GenerationError::Cancelled),
            result = tokio::time::timeout(timeout, self.request(prompt)) => match result {
                Ok(reply) => reply,
                Err(_) => Err(GenerationError::Timeout(timeout)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FALLBACK_REPLY;
    use crate::test_support::spawn_router;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn client_for(base_url: String, timeout: Duration) -> OllamaClient {
        let settings = GenerationSettings {
            base_url,
            timeout,
            ..GenerationSettings::default()
        };
        OllamaClient::new(settings, CancellationToken::new())
    }

    #[tokio::test]
    async fn sends_prompt_with_options_and_returns_response() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route(
                "/api/generate",
                post(
                    |State(seen): State<Arc<Mutex<Option<Value>>>>, Json(body): Json<Value>| async move {
                        *seen.lock().unwrap() = Some(body);
                        Json(json!({ "response": "  Refunds take weeks.  ", "done": true }))
                    },
                ),
            )
            .with_state(seen.clone());
        let base = spawn_router(app).await;

        let client = client_for(base, Duration::from_secs(5));
        let reply = client.generate("What about refunds?").await.expect("reply");
        assert_eq!(reply, "Refunds take weeks.");

        let body = seen.lock().unwrap().clone().expect("request captured");
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["prompt"], "What about refunds?");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 256);
        assert!(body["options"]["temperature"].as_f64().unwrap() < 0.2);
        assert_eq!(body["options"]["stop"].as_array().unwrap().len(), STOP_SEQUENCES.len());
        assert_eq!(body["options"]["stop"][0], "### DATASET");
    }

    #[tokio::test]
    async fn server_error_becomes_fallback_reply() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        );
        let base = spawn_router(app).await;
        let client = client_for(base, Duration::from_secs(5));

        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: 500, .. }));
        assert_eq!(client.respond("hi").await, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let app = Router::new().route("/api/generate", post(|| async { "not json" }));
        let base = spawn_router(app).await;
        let client = client_for(base, Duration::from_secs(5));

        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr), Duration::from_secs(5));
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "response": "too late" }))
            }),
        );
        let base = spawn_router(app).await;
        let client = client_for(base, Duration::from_millis(100));

        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "response": "too late" }))
            }),
        );
        let base = spawn_router(app).await;

        let shutdown = CancellationToken::new();
        let settings = GenerationSettings {
            base_url: base,
            ..GenerationSettings::default()
        };
        let client = OllamaClient::new(settings, shutdown.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
        });

        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled));
        canceller.await.unwrap();
    }
}
