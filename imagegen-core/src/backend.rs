//! Boundary to the remote image generation service

use async_trait::async_trait;
use std::fmt;

/// One content fragment returned by the backend, in response order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    pub parts: Vec<ResponsePart>,
    /// Why the backend stopped or refused, when it said so (e.g. "SAFETY").
    pub block_reason: Option<String>,
}

impl BackendResponse {
    pub fn new(parts: Vec<ResponsePart>) -> Self {
        Self {
            parts,
            block_reason: None,
        }
    }
}

/// A single failed attempt against the backend.
///
/// This is the raw failure; classification into a caller-facing
/// [`GenerationError`](crate::GenerationError) happens once retries are done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub status: Option<u16>,
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Run one generation request. No retries happen at this level.
    async fn generate(&self, model: &str, prompt: &str) -> Result<BackendResponse, BackendError>;
}
