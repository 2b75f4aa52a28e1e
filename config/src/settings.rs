//! Image generation settings read from environment-style keys

use crate::EnvSource;

/// Primary credential key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Secondary credential key, consulted when the primary is unset or blank.
pub const FALLBACK_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const MODEL_ENV: &str = "GEMINI_IMAGE_MODEL";
pub const OUTPUT_DIR_ENV: &str = "IMAGE_OUTPUT_DIR";
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Snapshot of the settings relevant to one operation.
///
/// Loaded fresh per call; nothing here is validated beyond
/// "non-empty after trim".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub output_dir: Option<String>,
    pub base_url: String,
}

impl ImageSettings {
    pub fn load(env: &dyn EnvSource) -> Self {
        let api_key = env
            .non_empty(API_KEY_ENV)
            .or_else(|| env.non_empty(FALLBACK_API_KEY_ENV));

        Self {
            api_key,
            model: env
                .non_empty(MODEL_ENV)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            output_dir: env.non_empty(OUTPUT_DIR_ENV),
            base_url: env
                .non_empty(BASE_URL_ENV)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}
