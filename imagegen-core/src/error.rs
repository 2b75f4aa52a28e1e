use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;

/// Terminal outcome of a failed generation.
///
/// `Display` is the message shown to the caller, so every variant reads
/// as an instruction rather than a diagnostic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error(
        "{primary} environment variable is required (or set {secondary}) to generate images",
        primary = config::settings::API_KEY_ENV,
        secondary = config::settings::FALLBACK_API_KEY_ENV
    )]
    MissingCredential,

    #[error(
        "Authentication failed (status {status}). Check that {key} is valid and has access to the image model.",
        key = config::settings::API_KEY_ENV
    )]
    AuthenticationFailed { status: u16, detail: String },

    #[error("Rate limit exceeded (status {status}). Please retry later.")]
    RateLimited { status: u16, detail: String },

    #[error("Image generation service is temporarily unavailable (status {status}). Please try again later.")]
    BackendUnavailable { status: u16, detail: String },

    #[error("No image data in response{}", describe_reason(.reason))]
    EmptyResponse { reason: Option<String> },

    #[error("Image generation failed: {detail}")]
    Unknown { detail: String },
}

fn describe_reason(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" (reason: {})", r),
        None => String::new(),
    }
}

impl GenerationError {
    /// Translate the last backend failure into its caller-facing form.
    pub fn from_backend(err: BackendError) -> Self {
        match err.status {
            Some(status @ (401 | 403)) => GenerationError::AuthenticationFailed {
                status,
                detail: err.message,
            },
            Some(status @ 429) => GenerationError::RateLimited {
                status,
                detail: err.message,
            },
            Some(status @ 500..=599) => GenerationError::BackendUnavailable {
                status,
                detail: err.message,
            },
            _ => GenerationError::Unknown {
                detail: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Unsupported file extension '.{extension}' for {}: only .jpg and .jpeg are supported", .path.display())]
    InvalidExtension { path: PathBuf, extension: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("{} is empty after writing", .path.display())]
    EmptyWrite { path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PathError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PathError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Image payload is empty; nothing to save")]
    EmptyPayload,

    #[error("Unsupported file extension '.{extension}' for {}: only .jpg and .jpeg are supported", .path.display())]
    InvalidExtension { path: PathBuf, extension: String },

    #[error("Failed to save image: {last}{}", describe_first(.first))]
    Exhausted { last: String, first: Option<String> },
}

fn describe_first(first: &Option<String>) -> String {
    match first {
        Some(f) => format!(" (first attempt: {})", f),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("could not decode image returned by the model: {0}")]
    Decode(#[source] image::ImageError),

    #[error("could not encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
}
