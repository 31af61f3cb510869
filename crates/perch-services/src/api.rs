//! Shared HTTP plumbing for collaborator services
//!
//! Both services answer with the same envelope:
//!
//! ```json
//! { "success": true, "result": { ... }, "errors": [] }
//! ```

use crate::error::{Result, ServiceError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one collaborator service
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub timeout: Duration,
}

impl ServiceEndpoint {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ServiceError::InvalidConfig(format!(
                "service URL must be http(s): '{}'",
                base_url
            )));
        }
        Ok(Self { base_url, timeout })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder().timeout(self.timeout).build()?)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Decode an envelope. `Ok(None)` for 404 or an empty `result`.
pub(crate) fn decode<T: DeserializeOwned>(url: &str, status: u16, body: &str) -> Result<Option<T>> {
    if status == 404 {
        return Ok(None);
    }
    if !(200..300).contains(&status) {
        return Err(ServiceError::Status {
            url: url.to_string(),
            status,
        });
    }

    let response: ApiResponse<T> = serde_json::from_str(body)?;
    if !response.success {
        let error_msg = response
            .errors
            .first()
            .map(|e| match &e.code {
                Some(code) => format!("{} ({})", e.message, code),
                None => e.message.clone(),
            })
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ServiceError::ApiError(error_msg));
    }
    Ok(response.result)
}

/// Send a prepared request and decode its envelope
pub(crate) async fn fetch<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    url: &str,
) -> Result<Option<T>> {
    let response = request.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    tracing::debug!("{} answered HTTP {}", url, status);
    decode(url, status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        name: String,
    }

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let endpoint = ServiceEndpoint::new("https://id.internal/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(endpoint.url("/users"), "https://id.internal/users");
    }

    #[test]
    fn test_endpoint_rejects_non_http() {
        assert!(ServiceEndpoint::new("id.internal", DEFAULT_TIMEOUT).is_err());
    }

    #[test]
    fn test_decode_success() {
        let body = r#"{"success": true, "result": {"name": "a"}, "errors": []}"#;
        let thing: Option<Thing> = decode("u", 200, body).unwrap();
        assert_eq!(thing, Some(Thing { name: "a".into() }));
    }

    #[test]
    fn test_decode_404_is_absent() {
        let thing: Option<Thing> = decode("u", 404, "").unwrap();
        assert!(thing.is_none());
    }

    #[test]
    fn test_decode_reports_first_error() {
        let body = r#"{"success": false, "result": null,
            "errors": [{"code": "E1", "message": "denied"}, {"message": "other"}]}"#;
        let err = decode::<Thing>("u", 200, body).unwrap_err();
        assert_eq!(err.to_string(), "service reported an error: denied (E1)");
    }

    #[test]
    fn test_decode_error_without_code() {
        let body = r#"{"success": false, "result": null, "errors": [{"message": "other"}]}"#;
        let err = decode::<Thing>("u", 200, body).unwrap_err();
        assert_eq!(err.to_string(), "service reported an error: other");
    }

    #[test]
    fn test_decode_server_error_status() {
        let err = decode::<Thing>("https://x/users", 503, "").unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 503, .. }));
    }
}
