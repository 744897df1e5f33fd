use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::{NetworkFailureKind, RawFailure};
use crate::settings::HttpSettings;

/// Posts JSON submissions to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    client: Client,
    url: String,
}

impl HttpSubmitter {
    /// Creates a submitter for `url`.
    ///
    /// # Errors
    ///
    /// Returns an unrecognized failure if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, settings: &HttpSettings) -> Result<Self, RawFailure> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| {
                RawFailure::unrecognized(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Submits `payload`, returning the response body.
    ///
    /// A non-JSON or empty success body yields `Value::Null`.
    ///
    /// # Errors
    ///
    /// Transport failures map to network failures; non-2xx responses map to
    /// API failures carrying the response status.
    pub async fn submit(&self, payload: &Value) -> Result<Value, RawFailure> {
        tracing::debug!(url = %self.url, "submitting payload");

        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_failure)?;
        let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(body);
        }

        let error = body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status_error_code(status.as_u16()).to_string());
        let mut failure = RawFailure::api(error, Some(status.as_u16()));
        if let Some(text) = body.get("message").and_then(Value::as_str) {
            failure = failure.with_message(text);
        }

        tracing::warn!(status = status.as_u16(), url = %self.url, "submission rejected");
        Err(failure)
    }
}

fn transport_failure(error: reqwest::Error) -> RawFailure {
    let kind = if error.is_timeout() {
        NetworkFailureKind::Timeout
    } else {
        NetworkFailureKind::Failed
    };
    RawFailure::network(kind).with_message(error.to_string())
}

/// API error string derived from a status when the body carries none.
pub fn status_error_code(status: u16) -> &'static str {
    match StatusCode::from_u16(status) {
        Ok(StatusCode::TOO_MANY_REQUESTS) => "rate_limited",
        Ok(StatusCode::SERVICE_UNAVAILABLE) => "service_unavailable",
        Ok(s) if s.is_server_error() => "server_error",
        _ => "api_error",
    }
}
