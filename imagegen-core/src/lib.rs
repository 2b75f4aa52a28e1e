//! Image generation core
//!
//! - [`GenerationClient`] wraps the image backend with a per-attempt timeout,
//!   retry with exponential backoff, and error classification
//! - [`PathResolver`] turns a requested location into a concrete file path
//! - [`ImagePersistor`] writes the generated bytes, falling back across the
//!   default output directories when the requested location is unusable

pub mod backend;
mod client;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod paths;
pub mod persist;
mod traffic_log;
pub mod transcode;

pub use backend::{BackendError, BackendResponse, ImageBackend, ResponsePart};
pub use error::{GenerationError, PathError, PersistError, TranscodeError};
pub use gemini::GeminiBackend;
pub use generation::{BackendFactory, GenerationClient, GenerationResult, RetryPolicy};
pub use paths::{OutputLocations, PathResolver};
pub use persist::{ImagePersistor, PersistenceOutcome};

/// MIME type of every image this crate hands back.
pub const OUTPUT_MIME_TYPE: &str = "image/jpeg";

/// Upper bound on prompt length, in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;
