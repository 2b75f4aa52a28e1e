//! Traffic logging for backend calls
//!
//! Summaries only. Prompts are truncated and image data is reduced to its size.

use tracing::debug;

use crate::backend::{BackendError, BackendResponse, ResponsePart};

/// Maximum characters to log for content (to protect privacy)
const MAX_CONTENT_LOG_CHARS: usize = 200;

/// Truncate a string for logging, adding ellipsis if truncated
fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}... ({} chars total)", truncated, char_count)
    }
}

pub(crate) fn log_request(model: &str, attempt: u32, prompt: &str) {
    debug!(
        target: "traffic",
        model,
        attempt,
        prompt = %truncate_for_log(prompt, MAX_CONTENT_LOG_CHARS),
        "REQUEST"
    );
}

pub(crate) fn log_response(model: &str, attempt: u32, response: &BackendResponse) {
    let summary: Vec<String> = response
        .parts
        .iter()
        .map(|part| match part {
            ResponsePart::Text(text) => format!("text({})", truncate_for_log(text, MAX_CONTENT_LOG_CHARS)),
            ResponsePart::Image { mime_type, data } => format!("image({}, {} bytes)", mime_type, data.len()),
        })
        .collect();
    debug!(
        target: "traffic",
        model,
        attempt,
        parts = %summary.join(", "),
        block_reason = ?response.block_reason,
        "RESPONSE"
    );
}

pub(crate) fn log_error(model: &str, attempt: u32, error: &BackendError) {
    debug!(
        target: "traffic",
        model,
        attempt,
        status = ?error.status,
        error = %truncate_for_log(&error.message, MAX_CONTENT_LOG_CHARS),
        "ERROR"
    );
}
