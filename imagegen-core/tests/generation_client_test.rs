use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use config::MapEnv;
use config::settings::{API_KEY_ENV, FALLBACK_API_KEY_ENV, MODEL_ENV};
use image::{DynamicImage, ImageFormat, RgbImage};
use imagegen_core::{
    BackendError, BackendFactory, BackendResponse, GenerationClient, GenerationError,
    ImageBackend, ResponsePart, RetryPolicy,
};

fn png_bytes() -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(8, 8))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn image_response() -> BackendResponse {
    BackendResponse::new(vec![
        ResponsePart::Text("A cat.".to_string()),
        ResponsePart::Image {
            mime_type: "image/png".to_string(),
            data: png_bytes(),
        },
    ])
}

enum Step {
    Reply(Result<BackendResponse, BackendError>),
    Hang,
}

/// Plays back a fixed script, one step per call.
#[derive(Default)]
struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    models: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBackend for ScriptedBackend {
    async fn generate(&self, model: &str, _prompt: &str) -> Result<BackendResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.to_string());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => reply,
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BackendError::new("unreachable"))
            }
            None => Err(BackendError::new("script exhausted")),
        }
    }
}

/// Factory that always hands out `backend` and counts how often it is asked.
fn factory_for(backend: Arc<ScriptedBackend>, created: Arc<AtomicUsize>) -> BackendFactory {
    Arc::new(move |_key: &str| {
        created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&backend) as Arc<dyn ImageBackend>)
    })
}

fn client_with(env: MapEnv, backend: Arc<ScriptedBackend>) -> GenerationClient {
    GenerationClient::new(Arc::new(env), factory_for(backend, Arc::new(AtomicUsize::new(0))))
}

fn keyed_env() -> MapEnv {
    MapEnv::new().with(API_KEY_ENV, "test-key")
}

#[tokio::test]
async fn test_success_returns_jpeg_and_text() {
    let backend = ScriptedBackend::new(vec![Step::Reply(Ok(image_response()))]);
    let client = client_with(keyed_env(), backend.clone());

    let result = client.generate("draw a cat").await.unwrap();

    assert_eq!(result.mime_type, "image/jpeg");
    assert_eq!(image::guess_format(&result.image).unwrap(), ImageFormat::Jpeg);
    assert_eq!(result.model, config::settings::DEFAULT_MODEL);
    assert_eq!(result.text.as_deref(), Some("A cat."));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_model_override_reaches_backend() {
    let backend = ScriptedBackend::new(vec![Step::Reply(Ok(image_response()))]);
    let env = keyed_env().with(MODEL_ENV, "  my-image-model ");
    let client = client_with(env, backend.clone());

    let result = client.generate("draw a cat").await.unwrap();

    assert_eq!(result.model, "my-image-model");
    assert_eq!(*backend.models.lock().unwrap(), vec!["my-image-model".to_string()]);
}

#[tokio::test]
async fn test_missing_credential_fails_before_any_attempt() {
    let backend = ScriptedBackend::new(vec![Step::Reply(Ok(image_response()))]);
    let created = Arc::new(AtomicUsize::new(0));
    let client = GenerationClient::new(
        Arc::new(MapEnv::new()),
        factory_for(backend.clone(), created.clone()),
    );

    let err = client.generate("draw a cat").await.unwrap_err();

    assert_eq!(err, GenerationError::MissingCredential);
    assert!(err.to_string().contains("environment variable is required"));
    assert_eq!(backend.calls(), 0);
    assert_eq!(created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_secondary_credential_is_accepted() {
    let backend = ScriptedBackend::new(vec![Step::Reply(Ok(image_response()))]);
    let env = MapEnv::new().with(FALLBACK_API_KEY_ENV, "google-key");
    let client = client_with(env, backend.clone());

    assert!(client.generate("draw a cat").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_with_backoff() {
    let backend = ScriptedBackend::new(vec![
        Step::Reply(Err(BackendError::with_status(503, "overloaded"))),
        Step::Reply(Err(BackendError::with_status(503, "overloaded"))),
        Step::Reply(Ok(image_response())),
    ]);
    let client = client_with(keyed_env(), backend.clone());

    let started = tokio::time::Instant::now();
    let result = client.generate("draw a cat").await;

    assert!(result.is_ok());
    assert_eq!(backend.calls(), 3);
    // 500ms after the first failure, 1000ms after the second
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(1500), "waited {:?}", waited);
    assert!(waited < Duration::from_millis(1600), "waited {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_translated_error() {
    let backend = ScriptedBackend::new(vec![
        Step::Reply(Err(BackendError::with_status(503, "raw upstream text"))),
        Step::Reply(Err(BackendError::with_status(503, "raw upstream text"))),
        Step::Reply(Err(BackendError::with_status(503, "raw upstream text"))),
        Step::Reply(Ok(image_response())),
    ]);
    let client = client_with(keyed_env(), backend.clone());

    let err = client.generate("draw a cat").await.unwrap_err();

    assert_eq!(backend.calls(), 3);
    assert!(matches!(err, GenerationError::BackendUnavailable { status: 503, .. }));
    assert!(err.to_string().contains("temporarily unavailable"));
    assert!(!err.to_string().contains("raw upstream text"));
}

#[tokio::test(start_paused = true)]
async fn test_custom_policy_bounds_attempts_and_delays() {
    let backend = ScriptedBackend::new(
        (0..5)
            .map(|_| Step::Reply(Err(BackendError::with_status(502, "bad gateway"))))
            .collect(),
    );
    let client = client_with(keyed_env(), backend.clone()).with_policy(RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(10),
        request_timeout: Duration::from_secs(1),
    });

    let started = tokio::time::Instant::now();
    let err = client.generate("draw a cat").await.unwrap_err();

    assert_eq!(backend.calls(), 4);
    assert!(matches!(err, GenerationError::BackendUnavailable { status: 502, .. }));
    // 10 + 20 + 40ms
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(70), "waited {:?}", waited);
    assert!(waited < Duration::from_millis(100), "waited {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhaustion() {
    let backend = ScriptedBackend::new(
        (0..3)
            .map(|_| Step::Reply(Err(BackendError::with_status(429, "quota"))))
            .collect(),
    );
    let client = client_with(keyed_env(), backend.clone());

    let err = client.generate("draw a cat").await.unwrap_err();

    assert_eq!(backend.calls(), 3);
    assert!(matches!(err, GenerationError::RateLimited { .. }));
}

#[tokio::test]
async fn test_non_transient_failure_is_not_retried() {
    let backend = ScriptedBackend::new(vec![
        Step::Reply(Err(BackendError::with_status(400, "bad request"))),
        Step::Reply(Ok(image_response())),
    ]);
    let client = client_with(keyed_env(), backend.clone());

    let err = client.generate("draw a cat").await.unwrap_err();

    assert_eq!(backend.calls(), 1);
    assert_eq!(err.to_string(), "Image generation failed: status 400: bad request");
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let backend = ScriptedBackend::new(vec![Step::Reply(Err(BackendError::with_status(
        403,
        "permission denied",
    )))]);
    let client = client_with(keyed_env(), backend.clone());

    let err = client.generate("draw a cat").await.unwrap_err();

    assert_eq!(backend.calls(), 1);
    assert!(matches!(err, GenerationError::AuthenticationFailed { status: 403, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_connection_reset_message_is_retried() {
    let backend = ScriptedBackend::new(vec![
        Step::Reply(Err(BackendError::new("connection reset by peer"))),
        Step::Reply(Ok(image_response())),
    ]);
    let client = client_with(keyed_env(), backend.clone());

    assert!(client.generate("draw a cat").await.is_ok());
    assert_eq!(backend.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_counts_as_transient() {
    let backend = ScriptedBackend::new(vec![Step::Hang, Step::Reply(Ok(image_response()))]);
    let client = client_with(keyed_env(), backend.clone());

    let started = tokio::time::Instant::now();
    assert!(client.generate("draw a cat").await.is_ok());

    assert_eq!(backend.calls(), 2);
    assert!(started.elapsed() >= Duration::from_millis(60_000 + 500));
}

#[tokio::test(start_paused = true)]
async fn test_every_attempt_timing_out_reports_timeout() {
    let backend = ScriptedBackend::new(vec![Step::Hang, Step::Hang, Step::Hang]);
    let client = client_with(keyed_env(), backend.clone());

    let err = client.generate("draw a cat").await.unwrap_err();

    assert_eq!(backend.calls(), 3);
    assert!(err.to_string().contains("timed out"), "{}", err);
}

#[tokio::test]
async fn test_response_without_image_is_empty_response() {
    let backend = ScriptedBackend::new(vec![Step::Reply(Ok(BackendResponse::new(vec![
        ResponsePart::Text("I can't draw that".to_string()),
    ])))]);
    let client = client_with(keyed_env(), backend.clone());

    let err = client.generate("draw a cat").await.unwrap_err();

    assert!(matches!(err, GenerationError::EmptyResponse { .. }));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_undecodable_image_is_fatal() {
    let backend = ScriptedBackend::new(vec![Step::Reply(Ok(BackendResponse::new(vec![
        ResponsePart::Image {
            mime_type: "image/png".to_string(),
            data: b"garbage".to_vec(),
        },
    ])))]);
    let client = client_with(keyed_env(), backend.clone());

    let err = client.generate("draw a cat").await.unwrap_err();

    assert!(matches!(err, GenerationError::Unknown { .. }));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_backend_handle_cached_per_credential() {
    let backend = ScriptedBackend::new(
        (0..3).map(|_| Step::Reply(Ok(image_response()))).collect(),
    );
    let created = Arc::new(AtomicUsize::new(0));
    let env = Arc::new(keyed_env());
    let client = GenerationClient::new(env.clone(), factory_for(backend, created.clone()));

    client.generate("one").await.unwrap();
    client.generate("two").await.unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 1);

    env.set(API_KEY_ENV, "rotated-key");
    client.generate("three").await.unwrap();
    assert_eq!(created.load(Ordering::SeqCst), 2);
}
