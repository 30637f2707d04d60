//! Jira API request and response types.
//!
//! The client is payload-preserving: entity bodies travel as raw
//! `serde_json::Value` so the cache can mirror exactly what Jira sent. Only
//! the envelopes needed for pagination and the small fixed responses are
//! typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiFailure;

/// The current authenticated user.
///
/// Returned by `GET /rest/api/3/myself`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// The user's display name.
    #[serde(default)]
    pub display_name: String,
    /// The user's email address (may be empty if hidden).
    #[serde(default)]
    pub email_address: String,
}

/// Outcome of a connection test against the `myself` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    /// Whether the connection and credentials worked.
    pub success: bool,
    /// Short user-facing message.
    pub message: String,
    /// Display name of the authenticated user, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Email of the authenticated user, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The normalized failure, when the test failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiFailure>,
}

/// A board from the Agile API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    /// The board ID.
    pub id: u64,
    /// The board name.
    #[serde(default)]
    pub name: String,
}

/// Envelope for `GET /rest/agile/1.0/board`.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardsResponse {
    #[serde(default)]
    pub values: Vec<Board>,
}

/// Envelope for `GET /rest/agile/1.0/board/{id}/issue`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardIssuesResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<Value>,
    #[serde(default)]
    pub max_results: u32,
}

/// Envelope for `POST /rest/api/3/search/jql`.
///
/// The newer search endpoint returns matches under `values`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JqlSearchResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub values: Vec<Value>,
    #[serde(default)]
    pub max_results: u32,
}

/// A page of issues, however it was fetched (board or JQL).
#[derive(Debug, Clone, Serialize)]
pub struct IssuePage {
    /// Total matches reported by the server.
    pub total: u64,
    /// The raw issue payloads, truncated to the requested maximum.
    pub issues: Vec<Value>,
    /// The maximum count that was requested.
    pub max_results: u32,
}

/// Attachment metadata from `GET /rest/api/3/attachment/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentMeta {
    /// File name to save the attachment under.
    #[serde(default)]
    pub filename: Option<String>,
    /// Authenticated URL for the attachment bytes.
    #[serde(default)]
    pub content: Option<String>,
}

/// Downloaded attachment bytes plus their content type.
#[derive(Debug, Clone)]
pub struct AttachmentContent {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Walk nested object fields and return the string leaf, if present and
/// non-empty.
///
/// `nested_str(issue, &["fields", "status", "name"])` is the defensive
/// counterpart of chained lookups over a payload whose shape Jira does not
/// guarantee.
pub fn nested_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    current.as_str().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_str_walks_objects() {
        let issue = json!({"fields": {"status": {"name": "In Progress"}}});
        assert_eq!(
            nested_str(&issue, &["fields", "status", "name"]),
            Some("In Progress")
        );
    }

    #[test]
    fn test_nested_str_missing_segment_is_none() {
        let issue = json!({"fields": {}});
        assert_eq!(nested_str(&issue, &["fields", "status", "name"]), None);
    }

    #[test]
    fn test_nested_str_empty_string_is_none() {
        let issue = json!({"fields": {"summary": ""}});
        assert_eq!(nested_str(&issue, &["fields", "summary"]), None);
    }

    #[test]
    fn test_nested_str_non_string_leaf_is_none() {
        let issue = json!({"fields": {"summary": 42}});
        assert_eq!(nested_str(&issue, &["fields", "summary"]), None);
    }

    #[test]
    fn test_connection_status_keeps_structured_failure() {
        let status = ConnectionStatus {
            success: false,
            message: "Failed to connect to Jira".to_string(),
            user: None,
            email: None,
            error: Some(ApiFailure::http(401, "bad token")),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["error"]["status_code"], 401);
        assert_eq!(json["error"]["details"], "bad token");
    }

    #[test]
    fn test_board_issues_response_defaults() {
        let resp: BoardIssuesResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(resp.total, 0);
        assert!(resp.issues.is_empty());
    }

    #[test]
    fn test_jql_search_response_reads_values() {
        let resp: JqlSearchResponse = serde_json::from_value(json!({
            "total": 2,
            "maxResults": 50,
            "values": [{"key": "PROJ-1"}, {"key": "PROJ-2"}]
        }))
        .unwrap();
        assert_eq!(resp.total, 2);
        assert_eq!(resp.values.len(), 2);
        assert_eq!(resp.max_results, 50);
    }
}
