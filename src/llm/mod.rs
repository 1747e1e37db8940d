pub mod ollama;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

pub use ollama::{GenerationSettings, OllamaClient};

/// What the user sees when the backend could not produce a reply.
pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation backend unreachable: {0}")]
    Transport(String),

    #[error("generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode generation response: {0}")]
    Decode(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation cancelled")]
    Cancelled,
}

/// A backend that turns a prompt into reply text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One attempt, no retries.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Like `generate`, but every failure becomes the fallback reply.
    async fn respond(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!("Generation failed: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
