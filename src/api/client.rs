//! Jira API client implementation.
//!
//! Wraps outbound calls against the REST (v3) and Agile (1.0) surfaces and
//! normalizes every outcome into either a success payload or an
//! [`ApiFailure`](super::error::ApiFailure). Nothing past this boundary deals
//! in transport errors.

use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::auth::BasicAuth;
use super::error::{ApiFailure, ApiResult};
use super::types::{
    AttachmentContent, AttachmentMeta, Board, BoardIssuesResponse, BoardsResponse,
    ConnectionStatus, CurrentUser, IssuePage, JqlSearchResponse,
};

/// Fixed request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Issue fields requested from JQL searches; these are the fields the local
/// cache persists.
const ISSUE_FIELDS: [&str; 10] = [
    "summary",
    "status",
    "assignee",
    "priority",
    "created",
    "updated",
    "issuetype",
    "project",
    "description",
    "reporter",
];

/// Which API surface an endpoint lives on.
#[derive(Debug, Clone, Copy)]
enum ApiRoot {
    /// REST API v3 (`/rest/api/3`).
    V3,
    /// Agile API (`/rest/agile/1.0`).
    Agile,
}

impl ApiRoot {
    fn prefix(self) -> &'static str {
        match self {
            ApiRoot::V3 => "/rest/api/3",
            ApiRoot::Agile => "/rest/agile/1.0",
        }
    }
}

/// The Jira API client.
///
/// Credentials are fixed per instance; build one from the active connection
/// configuration.
#[derive(Debug, Clone)]
pub struct JiraClient {
    /// The HTTP client.
    http: Client,
    /// Normalized base URL of the Jira instance.
    base_url: String,
    /// Authentication credentials.
    auth: BasicAuth,
}

impl JiraClient {
    /// Create a new client for a Jira instance.
    ///
    /// `jira_url` may be a bare host ("company.atlassian.net"); a missing
    /// scheme defaults to HTTPS.
    pub fn new(jira_url: &str, email: &str, api_token: &str) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiFailure::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: normalize_base_url(jira_url),
            auth: BasicAuth::new(email, api_token),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make one authenticated request and normalize the outcome.
    ///
    /// A 204 or empty body maps to `{"success": true}`; any non-2xx status or
    /// transport failure maps to an `ApiFailure` carrying the status code and
    /// response body.
    #[instrument(skip(self, query, body), fields(endpoint = %endpoint))]
    async fn request(
        &self,
        method: Method,
        root: ApiRoot,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let url = format!("{}{}/{}", self.base_url, root.prefix(), endpoint);
        debug!(%url, "Jira request");

        let mut request = self
            .http
            .request(method, &url)
            .header(header::AUTHORIZATION, self.auth.header_value())
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiFailure::from)?;
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await.map_err(ApiFailure::from)?;
            decode_body(status, &bytes)
        } else {
            let details = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %url, "Jira request failed");
            Err(ApiFailure::http(status.as_u16(), details))
        }
    }

    /// Request and deserialize into a typed envelope.
    async fn request_as<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        root: ApiRoot,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> ApiResult<T> {
        let value = self.request(method, root, endpoint, query, body).await?;
        serde_json::from_value(value).map_err(|e| ApiFailure::invalid_response(e.to_string()))
    }

    /// Test the connection by calling the `myself` endpoint.
    pub async fn test_connection(&self) -> ConnectionStatus {
        match self
            .request_as::<CurrentUser>(Method::GET, ApiRoot::V3, "myself", &[], None)
            .await
        {
            Ok(user) => ConnectionStatus {
                success: true,
                message: "Connected to Jira successfully!".to_string(),
                user: Some(user.display_name),
                email: Some(user.email_address),
                error: None,
            },
            Err(failure) => ConnectionStatus {
                success: false,
                message: "Failed to connect to Jira".to_string(),
                user: None,
                email: None,
                error: Some(failure),
            },
        }
    }

    /// Get all projects visible to the authenticated user.
    pub async fn get_projects(&self) -> ApiResult<Vec<Value>> {
        let value = self
            .request(Method::GET, ApiRoot::V3, "project", &[], None)
            .await?;
        value
            .as_array()
            .cloned()
            .ok_or_else(|| ApiFailure::invalid_response("expected a project array"))
    }

    /// Get one project by key.
    pub async fn get_project(&self, project_key: &str) -> ApiResult<Value> {
        let endpoint = format!("project/{}", urlencoding::encode(project_key));
        self.request(Method::GET, ApiRoot::V3, &endpoint, &[], None)
            .await
    }

    /// Get all boards, optionally filtered by project.
    pub async fn get_boards(&self, project_key: Option<&str>) -> ApiResult<Vec<Board>> {
        let mut query = Vec::new();
        if let Some(key) = project_key.filter(|k| !k.is_empty()) {
            query.push(("projectKeyOrId", key.to_string()));
        }

        let response: BoardsResponse = self
            .request_as(Method::GET, ApiRoot::Agile, "board", &query, None)
            .await?;
        Ok(response.values)
    }

    /// Get issues from one board via the Agile API.
    pub async fn get_board_issues(&self, board_id: u64, max_results: u32) -> ApiResult<IssuePage> {
        let endpoint = format!("board/{}/issue", board_id);
        let query = [("maxResults", max_results.to_string())];

        let response: BoardIssuesResponse = self
            .request_as(Method::GET, ApiRoot::Agile, &endpoint, &query, None)
            .await?;

        Ok(IssuePage {
            total: response.total,
            issues: response.issues,
            max_results: if response.max_results > 0 {
                response.max_results
            } else {
                max_results
            },
        })
    }

    /// Get issues, preferring board-backed queries over raw JQL.
    ///
    /// With no explicit JQL: boards are tried first (filtered by project when
    /// one is given). No project filter means issues from every board,
    /// concatenated and truncated to `max_results`; a failing board is logged
    /// and skipped. When no boards exist, or a JQL string is supplied, this
    /// falls back to a JQL search; no project and no JQL defaults to issues
    /// assigned to or reported by the current caller, which avoids an
    /// unbounded full-instance scan.
    pub async fn get_issues(
        &self,
        project_key: Option<&str>,
        max_results: u32,
        jql: Option<&str>,
    ) -> ApiResult<IssuePage> {
        let project_key = project_key.filter(|k| !k.is_empty());
        let jql = jql.filter(|q| !q.is_empty());

        if jql.is_none() {
            let boards = match self.get_boards(project_key).await {
                Ok(boards) => boards,
                Err(failure) => {
                    warn!(error = %failure, "Error fetching boards");
                    Vec::new()
                }
            };

            if !boards.is_empty() {
                match project_key {
                    None => return self.collect_board_issues(&boards, max_results).await,
                    Some(_) => {
                        // Use the first board found for this project.
                        let board_id = boards[0].id;
                        info!(board_id, "Using Agile API board");
                        return self.get_board_issues(board_id, max_results).await;
                    }
                }
            }
        }

        self.search_jql(&fallback_jql(project_key, jql), max_results)
            .await
    }

    /// Concatenate issues from every board, truncated to `max_results`.
    async fn collect_board_issues(
        &self,
        boards: &[Board],
        max_results: u32,
    ) -> ApiResult<IssuePage> {
        let mut all_issues = Vec::new();
        let mut total = 0;

        for board in boards {
            info!(board_id = board.id, "Fetching issues from board");
            match self.get_board_issues(board.id, max_results).await {
                Ok(page) => {
                    total += page.total;
                    all_issues.extend(page.issues);
                }
                Err(failure) => {
                    warn!(board_id = board.id, error = %failure, "Skipping board");
                }
            }
        }

        all_issues.truncate(max_results as usize);
        Ok(IssuePage {
            total,
            issues: all_issues,
            max_results,
        })
    }

    /// Run a JQL search through `POST search/jql`.
    async fn search_jql(&self, jql: &str, max_results: u32) -> ApiResult<IssuePage> {
        let body = json!({
            "jql": jql,
            "maxResults": max_results,
            "fields": ISSUE_FIELDS,
        });

        let response: JqlSearchResponse = self
            .request_as(Method::POST, ApiRoot::V3, "search/jql", &[], Some(&body))
            .await?;

        let mut issues = response.values;
        issues.truncate(max_results as usize);

        Ok(IssuePage {
            total: response.total,
            issues,
            max_results: if response.max_results > 0 {
                response.max_results
            } else {
                max_results
            },
        })
    }

    /// Search issues with an explicit JQL query.
    pub async fn search_issues(&self, jql: &str, max_results: u32) -> ApiResult<IssuePage> {
        self.get_issues(None, max_results, Some(jql)).await
    }

    /// Get one issue by key.
    pub async fn get_issue(&self, issue_key: &str) -> ApiResult<Value> {
        let endpoint = format!("issue/{}", urlencoding::encode(issue_key));
        self.request(Method::GET, ApiRoot::V3, &endpoint, &[], None)
            .await
    }

    /// Get comments for an issue.
    ///
    /// Comment listing is best-effort decoration of the issue view; a failure
    /// is logged and yields an empty list.
    pub async fn get_issue_comments(&self, issue_key: &str) -> Vec<Value> {
        let endpoint = format!("issue/{}/comment", urlencoding::encode(issue_key));
        match self
            .request(Method::GET, ApiRoot::V3, &endpoint, &[], None)
            .await
        {
            Ok(value) => value
                .get("comments")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            Err(failure) => {
                warn!(issue_key, error = %failure, "Error fetching comments");
                Vec::new()
            }
        }
    }

    /// Get all issue statuses.
    pub async fn get_statuses(&self) -> ApiResult<Vec<Value>> {
        self.catalog("status").await
    }

    /// Get all issue priorities.
    pub async fn get_priorities(&self) -> ApiResult<Vec<Value>> {
        self.catalog("priority").await
    }

    /// Get all issue types.
    pub async fn get_issue_types(&self) -> ApiResult<Vec<Value>> {
        self.catalog("issuetype").await
    }

    /// Get users assignable to issues in a project.
    pub async fn get_assignable_users(&self, project_key: &str) -> ApiResult<Vec<Value>> {
        let query = [("project", project_key.to_string())];
        let value = self
            .request(
                Method::GET,
                ApiRoot::V3,
                "user/assignable/search",
                &query,
                None,
            )
            .await?;
        value
            .as_array()
            .cloned()
            .ok_or_else(|| ApiFailure::invalid_response("expected a user array"))
    }

    async fn catalog(&self, endpoint: &str) -> ApiResult<Vec<Value>> {
        let value = self
            .request(Method::GET, ApiRoot::V3, endpoint, &[], None)
            .await?;
        value
            .as_array()
            .cloned()
            .ok_or_else(|| ApiFailure::invalid_response(format!("expected an array from {}", endpoint)))
    }

    /// Get attachment metadata by ID.
    pub async fn get_attachment(&self, attachment_id: &str) -> ApiResult<Value> {
        let endpoint = format!("attachment/{}", urlencoding::encode(attachment_id));
        self.request(Method::GET, ApiRoot::V3, &endpoint, &[], None)
            .await
    }

    /// Download attachment bytes from a content URL.
    ///
    /// This is the second step of the two-step download: the metadata fetch
    /// yields the content URL, this call retrieves the bytes with the same
    /// credentials. Any failure here means "unavailable" and yields `None`.
    pub async fn download_attachment(&self, content_url: &str) -> Option<AttachmentContent> {
        let response = self
            .http
            .get(content_url)
            .header(header::AUTHORIZATION, self.auth.header_value())
            .send()
            .await
            .map_err(|e| warn!(error = %e, "Error downloading attachment"))
            .ok()?;

        if !response.status().is_success() {
            warn!(
                status = response.status().as_u16(),
                "Attachment download failed"
            );
            return None;
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| warn!(error = %e, "Error reading attachment body"))
            .ok()?;

        Some(AttachmentContent {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    /// Resolve attachment metadata into its parsed form.
    pub fn parse_attachment_meta(value: &Value) -> AttachmentMeta {
        serde_json::from_value(value.clone()).unwrap_or(AttachmentMeta {
            filename: None,
            content: None,
        })
    }
}

/// Map a successful response body to its JSON value.
///
/// 204 and empty bodies become `{"success": true}` so callers always get a
/// payload.
fn decode_body(status: StatusCode, bytes: &[u8]) -> ApiResult<Value> {
    if status == StatusCode::NO_CONTENT || bytes.is_empty() {
        return Ok(json!({"success": true}));
    }
    serde_json::from_slice(bytes).map_err(|e| ApiFailure::invalid_response(e.to_string()))
}

/// Build the JQL string for the search fallback.
///
/// Explicit JQL wins; a project filter is next; otherwise scope to the
/// current caller so the query stays bounded.
fn fallback_jql(project_key: Option<&str>, jql: Option<&str>) -> String {
    if let Some(jql) = jql {
        return jql.to_string();
    }
    if let Some(key) = project_key {
        return format!("project = {} ORDER BY created DESC", key);
    }
    "assignee = currentUser() OR reporter = currentUser() ORDER BY created DESC".to_string()
}

/// Normalize the base URL: default to HTTPS for bare hosts, strip trailing
/// slashes.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');

    if url.starts_with("https://") {
        return url.to_string();
    }
    if let Some(rest) = url.strip_prefix("http://") {
        if !rest.contains("localhost") && !rest.starts_with("127.") {
            warn!("Jira URL does not use HTTPS: {}", url);
        }
        return url.to_string();
    }
    format!("https://{}", url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_adds_https_to_bare_host() {
        assert_eq!(
            normalize_base_url("company.atlassian.net"),
            "https://company.atlassian.net"
        );
    }

    #[test]
    fn test_normalize_base_url_removes_trailing_slashes() {
        assert_eq!(
            normalize_base_url("https://company.atlassian.net///"),
            "https://company.atlassian.net"
        );
    }

    #[test]
    fn test_normalize_base_url_preserves_http() {
        assert_eq!(
            normalize_base_url("http://localhost:8080"),
            "http://localhost:8080"
        );
    }

    #[test]
    fn test_decode_body_204_maps_to_success() {
        let value = decode_body(StatusCode::NO_CONTENT, b"").unwrap();
        assert_eq!(value["success"], true);
    }

    #[test]
    fn test_decode_body_empty_maps_to_success() {
        let value = decode_body(StatusCode::OK, b"").unwrap();
        assert_eq!(value["success"], true);
    }

    #[test]
    fn test_decode_body_parses_json() {
        let value = decode_body(StatusCode::OK, br#"{"key": "PROJ-1"}"#).unwrap();
        assert_eq!(value["key"], "PROJ-1");
    }

    #[test]
    fn test_decode_body_invalid_json_is_failure() {
        let failure = decode_body(StatusCode::OK, b"<html>").unwrap_err();
        assert!(failure.error.contains("Invalid API response"));
    }

    #[test]
    fn test_fallback_jql_prefers_explicit_query() {
        let jql = fallback_jql(Some("PROJ"), Some("status = Done"));
        assert_eq!(jql, "status = Done");
    }

    #[test]
    fn test_fallback_jql_project_filter() {
        let jql = fallback_jql(Some("PROJ"), None);
        assert_eq!(jql, "project = PROJ ORDER BY created DESC");
    }

    #[test]
    fn test_fallback_jql_defaults_to_current_user() {
        let jql = fallback_jql(None, None);
        assert!(jql.contains("currentUser()"));
        assert!(jql.contains("assignee"));
        assert!(jql.contains("reporter"));
    }

    #[test]
    fn test_api_root_prefixes() {
        assert_eq!(ApiRoot::V3.prefix(), "/rest/api/3");
        assert_eq!(ApiRoot::Agile.prefix(), "/rest/agile/1.0");
    }

    #[test]
    fn test_parse_attachment_meta() {
        let meta = JiraClient::parse_attachment_meta(&json!({
            "filename": "report.pdf",
            "content": "https://example.atlassian.net/secure/attachment/1"
        }));
        assert_eq!(meta.filename.as_deref(), Some("report.pdf"));
        assert!(meta.content.is_some());
    }

    #[test]
    fn test_parse_attachment_meta_missing_content_url() {
        let meta = JiraClient::parse_attachment_meta(&json!({"filename": "x"}));
        assert!(meta.content.is_none());

        let meta = JiraClient::parse_attachment_meta(&json!("not an object"));
        assert!(meta.filename.is_none());
        assert!(meta.content.is_none());
    }
}
