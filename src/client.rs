//! Rollbar API client.
//!
//! Only the two project access token calls the backend needs are modeled.
//! Every request carries the account token and shares one client-wide
//! timeout; any status other than 200 is an error carrying the raw body.

use crate::{
    config::RollbarConfig,
    error::{BackendError, BackendResult},
    secrets::{CreateAccessTokenRequest, CreateAccessTokenResponse},
    settings::BackendSettings,
};
use reqwest::{Client, RequestBuilder, StatusCode, Url, header::ACCEPT};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use tracing::{debug, instrument, warn};

/// Header carrying the account access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Rollbar-Access-Token";

/// Authenticated Rollbar API client.
pub struct RollbarClient {
    http: Client,
    base_url: Url,
    account_access_token: SecretString,
}

impl fmt::Debug for RollbarClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbarClient")
            .field("base_url", &self.base_url.as_str())
            .field("account_access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RollbarClient {
    /// Create a client from stored configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the account token is empty or the
    /// API URL does not parse, or a transport error if the HTTP client
    /// cannot be built.
    pub fn new(config: &RollbarConfig, settings: &BackendSettings) -> BackendResult<Self> {
        if !config.has_token() {
            return Err(BackendError::config(
                "client account access token is not defined",
            ));
        }

        let base_url = Url::parse(settings.api_root()).map_err(|e| {
            BackendError::config(format!("invalid API URL {}: {e}", settings.api_root()))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::config(format!(
                "invalid API URL {}: cannot be a base",
                settings.api_root()
            )));
        }

        let http = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(&settings.user_agent)
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            http,
            base_url,
            account_access_token: config.account_access_token.clone(),
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::config("API URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Create an enabled project access token named `name` with `scopes`.
    ///
    /// # Errors
    ///
    /// Returns an upstream error for any non-200 response, a transport error
    /// if the request fails, or a decode error if the body is not the
    /// expected JSON.
    #[instrument(skip(self, scopes))]
    pub async fn create_project_access_token(
        &self,
        scopes: &str,
        project_id: i64,
        name: &str,
    ) -> BackendResult<String> {
        let project = project_id.to_string();
        let url = self.endpoint(&["project", &project, "access_tokens"])?;
        let request = self
            .http
            .post(url)
            .json(&CreateAccessTokenRequest::enabled(scopes, name));

        let body = self.send(request).await?;
        let response: CreateAccessTokenResponse = serde_json::from_slice(&body)?;

        debug!(project_id, "Created project access token");
        Ok(response.result.access_token)
    }

    /// Delete a project access token.
    ///
    /// Deleting a token that no longer exists is reported by the API as an
    /// error and surfaced unchanged. The token is sent as a single path
    /// segment.
    ///
    /// # Errors
    ///
    /// Returns an upstream error for any non-200 response, or a transport
    /// error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn delete_project_access_token(&self, project_id: i64, token: &str) -> BackendResult<()> {
        let project = project_id.to_string();
        let url = self.endpoint(&["project", &project, "access_token", token])?;
        self.send(self.http.delete(url)).await?;

        debug!(project_id, "Deleted project access token");
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Vec<u8>> {
        let response = request
            .header(ACCESS_TOKEN_HEADER, self.account_access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Rollbar API request failed");
            return Err(BackendError::Upstream {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }
}
