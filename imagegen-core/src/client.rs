use reqwest::header::HeaderMap;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{Level, event, instrument};

use crate::backend::BackendError;

#[derive(Clone)]
pub(crate) struct Client {
    client: reqwest::Client,
}

impl Client {
    pub(crate) fn with_headers(headers: HeaderMap) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BackendError::new(format!("failed to build HTTP client: {}", e)))?;
        Ok(Client { client })
    }

    #[instrument(level = "trace", skip(self, request))]
    pub(crate) async fn post<S, T>(&self, url: &str, request: &S) -> Result<T, BackendError>
    where
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(BackendError::with_status(
                status.as_u16(),
                error_detail(&error_body),
            ));
        }

        let text = response.text().await.map_err(transport_error)?;
        event!(Level::TRACE, response_len = text.len());

        serde_json::from_str::<T>(&text)
            .map_err(|e| BackendError::new(format!("malformed response body: {}", e)))
    }
}

/// Describe a reqwest failure so that timeouts and resets read as such.
fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::new(format!("request timed out: {}", err))
    } else if err.is_connect() {
        BackendError::new(format!("connection failed: {}", err))
    } else {
        BackendError::new(format!("request failed: {}", err))
    }
}

/// Pull `error.message` out of a Google-style error body, else return the body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_prefers_google_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_detail(body), "API key not valid.");
    }

    #[test]
    fn test_error_detail_falls_back_to_raw_body() {
        assert_eq!(error_detail("  upstream exploded \n"), "upstream exploded");
    }
}
