//! Docstring generation through an external text-generation service.
//!
//! The pipeline only sees the `GenerationClient` trait; `OpenAiClient` is
//! the production implementation and tests inject scripted doubles.

mod openai;
pub mod prompts;

pub use openai::OpenAiClient;

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DocumentationStyle;
use crate::parser::{CodeUnit, UnitKind};

/// Errors that can occur during a generation call.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("rate limited by generation service")]
    RateLimited,
    #[error("generation service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("generation service returned no content")]
    EmptyResponse,
    #[error("generation client misconfigured: {0}")]
    Config(String),
}

impl GenerationError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Network(_) | GenerationError::Timeout(_) => true,
            GenerationError::RateLimited => true,
            GenerationError::Api { status, .. } => *status >= 500,
            GenerationError::EmptyResponse | GenerationError::Config(_) => false,
        }
    }
}

/// What to document and how.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: UnitKind,
    pub name: String,
    pub source: String,
    pub style: DocumentationStyle,
}

impl GenerationRequest {
    pub fn for_unit(unit: &CodeUnit, style: DocumentationStyle) -> Self {
        Self {
            kind: unit.kind,
            name: unit.name.clone(),
            source: unit.source.clone(),
            style,
        }
    }

    /// User prompt for this request.
    pub fn prompt(&self) -> String {
        prompts::render(self.kind, &self.source, self.style)
    }
}

/// Capability: turn a unit's source into freeform text that should contain
/// the unit re-emitted with docstrings.
pub trait GenerationClient: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>>;
}

/// Call `client` with a per-attempt timeout, retrying retryable failures up
/// to `max_retries` extra times with exponential backoff.
pub async fn generate_with_retry(
    client: &dyn GenerationClient,
    request: &GenerationRequest,
    timeout: Duration,
    max_retries: u32,
) -> Result<String, GenerationError> {
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(timeout, client.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(timeout)),
        };

        match result {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = backoff(attempt);
                attempt += 1;
                warn!(
                    unit = %request.name,
                    attempt,
                    "generation failed, retrying in {:?}: {}",
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!(unit = %request.name, "generation failed: {}", e);
                return Err(e);
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1 << attempt.min(6)))
}
