use std::sync::Arc;
use std::time::Duration;

use config::{EnvSource, ImageSettings};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BackendResponse, ImageBackend, ResponsePart};
use crate::error::GenerationError;
use crate::gemini::GeminiBackend;
use crate::traffic_log;
use crate::transcode::{self, JPEG_QUALITY};
use crate::OUTPUT_MIME_TYPE;

/// HTTP statuses worth another attempt.
const TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Lower-cased message fragments that mark a failure as worth another attempt.
const TRANSIENT_MARKERS: [&str; 6] = [
    "timeout",
    "timed out",
    "etimedout",
    "connection reset",
    "econnreset",
    "temporary",
];

/// Builds a backend handle for a credential.
pub type BackendFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn ImageBackend>, BackendError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each one after.
    pub base_delay: Duration,
    /// Bound on each individual backend call.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            request_timeout: Duration::from_millis(60_000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Whether another attempt could plausibly succeed.
pub fn is_transient(err: &BackendError) -> bool {
    if let Some(status) = err.status {
        if TRANSIENT_STATUSES.contains(&status) {
            return true;
        }
    }
    let message = err.message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| message.contains(marker))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// JPEG-encoded image.
    pub image: Vec<u8>,
    pub mime_type: String,
    pub model: String,
    /// Text fragments from the model, newline-joined.
    pub text: Option<String>,
}

struct CachedBackend {
    api_key: String,
    backend: Arc<dyn ImageBackend>,
}

/// Generates images through an [`ImageBackend`], retrying transient failures.
///
/// Credential and model are read from the environment on every call. The
/// backend handle is cached for the last credential seen and rebuilt when
/// the credential changes.
pub struct GenerationClient {
    env: Arc<dyn EnvSource>,
    factory: BackendFactory,
    policy: RetryPolicy,
    cached: RwLock<Option<CachedBackend>>,
}

impl GenerationClient {
    pub fn new(env: Arc<dyn EnvSource>, factory: BackendFactory) -> Self {
        Self {
            env,
            factory,
            policy: RetryPolicy::default(),
            cached: RwLock::new(None),
        }
    }

    /// Client backed by the Gemini API at the configured base URL.
    pub fn gemini(env: Arc<dyn EnvSource>) -> Self {
        let base_url = ImageSettings::load(env.as_ref()).base_url;
        let factory: BackendFactory = Arc::new(move |api_key: &str| {
            let backend = GeminiBackend::new(&base_url, api_key)?;
            Ok(Arc::new(backend) as Arc<dyn ImageBackend>)
        });
        Self::new(env, factory)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn generate(&self, prompt: &str) -> Result<GenerationResult, GenerationError> {
        let settings = ImageSettings::load(self.env.as_ref());
        let api_key = settings
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredential)?;
        let backend = self.backend_for(api_key).await?;

        info!(model = %settings.model, "Generating image");
        let response = self
            .call_with_retry(backend.as_ref(), &settings.model, prompt)
            .await
            .map_err(GenerationError::from_backend)?;

        let (raw_image, text) = split_response(response)?;
        let image = tokio::task::spawn_blocking(move || transcode::to_jpeg(&raw_image, JPEG_QUALITY))
            .await
            .map_err(|e| GenerationError::Unknown {
                detail: format!("image conversion task failed: {}", e),
            })?
            .map_err(|e| GenerationError::Unknown {
                detail: e.to_string(),
            })?;

        Ok(GenerationResult {
            image,
            mime_type: OUTPUT_MIME_TYPE.to_string(),
            model: settings.model,
            text,
        })
    }

    async fn backend_for(&self, api_key: &str) -> Result<Arc<dyn ImageBackend>, GenerationError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.api_key == api_key {
                    return Ok(Arc::clone(&entry.backend));
                }
            }
        }

        debug!("Creating backend handle for new credential");
        let backend = (self.factory)(api_key).map_err(GenerationError::from_backend)?;
        *self.cached.write().await = Some(CachedBackend {
            api_key: api_key.to_string(),
            backend: Arc::clone(&backend),
        });
        Ok(backend)
    }

    async fn call_with_retry(
        &self,
        backend: &dyn ImageBackend,
        model: &str,
        prompt: &str,
    ) -> Result<BackendResponse, BackendError> {
        let mut attempt = 0;
        loop {
            traffic_log::log_request(model, attempt, prompt);
            let outcome = match tokio::time::timeout(
                self.policy.request_timeout,
                backend.generate(model, prompt),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::new(format!(
                    "request timed out after {}ms",
                    self.policy.request_timeout.as_millis()
                ))),
            };

            let err = match outcome {
                Ok(response) => {
                    traffic_log::log_response(model, attempt, &response);
                    return Ok(response);
                }
                Err(err) => err,
            };
            traffic_log::log_error(model, attempt, &err);

            if attempt >= self.policy.max_retries || !is_transient(&err) {
                return Err(err);
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient backend failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// First non-empty image wins; text fragments are joined with newlines.
fn split_response(response: BackendResponse) -> Result<(Vec<u8>, Option<String>), GenerationError> {
    let mut image = None;
    let mut texts = Vec::new();

    for part in response.parts {
        match part {
            ResponsePart::Image { data, .. } => {
                if image.is_none() && !data.is_empty() {
                    image = Some(data);
                }
            }
            ResponsePart::Text(text) => texts.push(text),
        }
    }

    let image = image.ok_or(GenerationError::EmptyResponse {
        reason: response.block_reason,
    })?;
    let text = Some(texts.join("\n")).filter(|t| !t.trim().is_empty());
    Ok((image, text))
}
