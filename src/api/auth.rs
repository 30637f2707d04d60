//! Authentication handling for the Jira API.
//!
//! Jira Cloud uses Basic Auth with email + API token. Credentials come from
//! the active connection configuration in the local store; the header is
//! built once per client and the raw token is not retained.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Basic Auth credentials for a Jira instance.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    /// The complete "Basic ..." authorization header value.
    auth_header: String,
}

impl BasicAuth {
    /// Create new credentials from email and API token.
    ///
    /// The token is immediately encoded and the raw token is not stored.
    pub fn new(email: &str, token: &str) -> Self {
        Self {
            auth_header: build_auth_header(email, token),
        }
    }

    /// Get the authorization header value for HTTP requests.
    pub fn header_value(&self) -> &str {
        &self.auth_header
    }
}

/// Build the Basic Auth header value.
///
/// Encodes "email:token" in Base64 and prepends "Basic ".
fn build_auth_header(email: &str, token: &str) -> String {
    let credentials = format!("{}:{}", email, token);
    let encoded = BASE64.encode(credentials.as_bytes());
    format!("Basic {}", encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_auth_header() {
        let header = build_auth_header("user@example.com", "api_token_here");
        assert!(header.starts_with("Basic "));

        let encoded = header.strip_prefix("Basic ").unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        let decoded_str = String::from_utf8(decoded).unwrap();
        assert_eq!(decoded_str, "user@example.com:api_token_here");
    }

    #[test]
    fn test_auth_new() {
        let auth = BasicAuth::new("user@example.com", "secret_token");
        assert!(auth.header_value().starts_with("Basic "));
    }

    #[test]
    fn test_auth_does_not_expose_token() {
        let auth = BasicAuth::new("user@example.com", "secret_token");
        let debug_output = format!("{:?}", auth);
        assert!(!debug_output.contains("secret_token"));
    }
}
