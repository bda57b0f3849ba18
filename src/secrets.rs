//! Rollbar API request and response bodies.

use serde::{Deserialize, Serialize};

/// Status given to every token the backend creates.
pub const TOKEN_STATUS_ENABLED: &str = "enabled";

/// `POST /project/{id}/access_tokens` body.
///
/// Field order is part of the wire format.
#[derive(Debug, Serialize)]
pub struct CreateAccessTokenRequest<'a> {
    /// Token status, always `enabled`
    pub status: &'a str,
    /// Scopes granted to the token
    pub scopes: [&'a str; 1],
    /// Token name shown in the Rollbar UI
    pub name: &'a str,
}

impl<'a> CreateAccessTokenRequest<'a> {
    /// Enabled token with a single opaque scope string.
    #[must_use]
    pub const fn enabled(scope: &'a str, name: &'a str) -> Self {
        Self {
            status: TOKEN_STATUS_ENABLED,
            scopes: [scope],
            name,
        }
    }
}

/// `POST /project/{id}/access_tokens` success body.
#[derive(Debug, Deserialize)]
pub struct CreateAccessTokenResponse {
    /// The created token
    pub result: AccessTokenResult,
}

/// Token record nested under `result`.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResult {
    /// Token value; empty when the upstream omits it
    #[serde(default)]
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_is_bit_exact() {
        let body = serde_json::to_string(&CreateAccessTokenRequest::enabled("read", "r1-abc")).unwrap();
        assert_eq!(body, r#"{"status":"enabled","scopes":["read"],"name":"r1-abc"}"#);
    }

    #[test]
    fn test_response_ignores_extra_fields() {
        let resp: CreateAccessTokenResponse = serde_json::from_str(
            r#"{"err":0,"result":{"access_token":"abc123","project_id":42,"scopes":["read"]}}"#,
        )
        .unwrap();
        assert_eq!(resp.result.access_token, "abc123");
    }

    #[test]
    fn test_response_missing_result_fails() {
        assert!(serde_json::from_str::<CreateAccessTokenResponse>(r#"{"err":1}"#).is_err());
    }
}
