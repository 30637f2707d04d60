//! Uniform failure value for Jira API calls.

use serde::Serialize;
use thiserror::Error;

/// A failed API call, normalized into plain data.
///
/// Every non-2xx response and every transport failure collapses into this
/// shape at the client boundary. Callers branch on the value instead of
/// catching exceptions; serialized it reads
/// `{"error": ..., "status_code": ..., "details": ...}`.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[error("{error}")]
pub struct ApiFailure {
    /// Human-readable description of what went wrong.
    pub error: String,
    /// HTTP status code, when the server answered at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Response body or transport detail, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiFailure {
    /// Failure from an HTTP response the server actually sent.
    pub fn http(status: u16, details: impl Into<String>) -> Self {
        let details = details.into();
        Self {
            error: describe_status(status),
            status_code: Some(status),
            details: if details.is_empty() {
                None
            } else {
                Some(details)
            },
        }
    }

    /// Failure that never produced a response (DNS, timeout, TLS, ...).
    pub fn transport(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status_code: None,
            details: None,
        }
    }

    /// Failure parsing a response body that should have been JSON.
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self {
            error: format!("Invalid API response: {}", msg.into()),
            status_code: None,
            details: None,
        }
    }

    /// Whether this failure is an HTTP 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }
}

impl From<reqwest::Error> for ApiFailure {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ApiFailure::http(status.as_u16(), err.to_string()),
            None => ApiFailure::transport(err.to_string()),
        }
    }
}

/// Result type for API operations. The error side is data, not an exception.
pub type ApiResult<T> = std::result::Result<T, ApiFailure>;

/// Map an HTTP status code to a short user-facing message.
fn describe_status(status: u16) -> String {
    match status {
        401 => "Authentication failed: check your email and API token".to_string(),
        403 => "Permission denied: you don't have access to this resource".to_string(),
        404 => "Resource not found".to_string(),
        429 => "Rate limited: please wait before retrying".to_string(),
        500..=599 => format!("Jira server error (HTTP {})", status),
        _ => format!("Unexpected HTTP status {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_failure_carries_status() {
        let failure = ApiFailure::http(404, "issue PROJ-123");
        assert_eq!(failure.status_code, Some(404));
        assert!(failure.is_not_found());
        assert_eq!(failure.details.as_deref(), Some("issue PROJ-123"));
    }

    #[test]
    fn test_http_failure_empty_details_omitted() {
        let failure = ApiFailure::http(500, "");
        assert_eq!(failure.details, None);
    }

    #[test]
    fn test_transport_failure_has_no_status() {
        let failure = ApiFailure::transport("connection refused");
        assert_eq!(failure.status_code, None);
        assert!(!failure.is_not_found());
    }

    #[test]
    fn test_describe_status_401() {
        let failure = ApiFailure::http(401, "");
        assert!(failure.error.contains("Authentication failed"));
    }

    #[test]
    fn test_describe_status_5xx() {
        let failure = ApiFailure::http(503, "");
        assert!(failure.error.contains("server error"));
        assert!(failure.error.contains("503"));
    }

    #[test]
    fn test_serialized_shape_has_error_key() {
        let failure = ApiFailure::http(404, "not here");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["error"], "Resource not found");
        assert_eq!(json["status_code"], 404);
        assert_eq!(json["details"], "not here");
    }

    #[test]
    fn test_serialized_shape_skips_absent_fields() {
        let failure = ApiFailure::transport("timed out");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["error"], "timed out");
        assert!(json.get("status_code").is_none());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_display_uses_error_message() {
        let failure = ApiFailure::transport("timed out");
        assert_eq!(failure.to_string(), "timed out");
    }
}
