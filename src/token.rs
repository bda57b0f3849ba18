//! Project access token leases.
//!
//! Issue mints a token for a role and hands the runtime a lease whose
//! internal data names the token and the role. Renew and revoke look the
//! role up again by name, so the current role policy always applies. A
//! role deleted while leases are outstanding makes their renew and revoke
//! fail with [`BackendError::RoleNotFound`].

use crate::backend::RollbarBackend;
use crate::error::{BackendError, BackendResult, ResultExt};
use crate::logical::{Response, Secret};
use crate::role::RoleEntry;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Secret type of issued project access tokens.
pub const PROJECT_ACCESS_TOKEN_TYPE: &str = "rollbar_project_access_token";

/// Data and internal data key holding the issued token.
pub const TOKEN_KEY: &str = "project_access_token";

/// Internal data key holding the role name.
pub const ROLE_KEY: &str = "role";

/// Name given to a token issued for `role_name`.
#[must_use]
pub fn token_name(role_name: &str) -> String {
    format!("{role_name}-{}", Uuid::new_v4())
}

fn apply_lease_policy(secret: &mut Secret, role: &RoleEntry) {
    if !role.ttl.is_zero() {
        secret.ttl = role.ttl;
    }
    if !role.max_ttl.is_zero() {
        secret.max_ttl = role.max_ttl;
    }
}

impl RollbarBackend {
    async fn require_role(&self, name: &str) -> BackendResult<RoleEntry> {
        self.get_role(name)
            .await?
            .ok_or_else(|| BackendError::role_not_found(name))
    }

    /// Issue a project access token for a role.
    ///
    /// The response data carries the token; the lease carries the token and
    /// role name as internal data and takes the role's TTLs where non-zero.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the role does not exist (no upstream call
    /// is made), a configuration error if no account token is stored, and
    /// the upstream error, with its cause, if token creation fails.
    #[instrument(skip(self))]
    pub async fn issue_token(&self, role_name: &str) -> BackendResult<Response> {
        let role = self
            .require_role(role_name)
            .await
            .context("error retrieving role")?;
        let client = self.get_client().await.context("error getting client")?;

        let name = token_name(&role.name);
        let token = client
            .create_project_access_token(&role.project_access_token_scopes, role.project_id, &name)
            .await
            .map_err(|e| {
                warn!(role = %role.name, error = %e, "Project access token creation failed");
                e.context("error creating project access token")
            })?;

        if token.is_empty() {
            return Err(BackendError::Issuance(
                "empty project access token in response".to_string(),
            ));
        }

        let mut internal = Map::new();
        internal.insert(TOKEN_KEY.to_string(), Value::String(token.clone()));
        internal.insert(ROLE_KEY.to_string(), Value::String(role.name.clone()));

        let mut secret = Secret::new(PROJECT_ACCESS_TOKEN_TYPE, internal);
        apply_lease_policy(&mut secret, &role);

        let mut data = Map::new();
        data.insert(TOKEN_KEY.to_string(), Value::String(token));

        info!(role = %role.name, project_id = role.project_id, token_name = %name, "Issued project access token");
        Ok(Response {
            data,
            secret: Some(secret),
            error: None,
        })
    }

    /// Renew a lease, applying the role's current TTLs.
    ///
    /// # Errors
    ///
    /// Returns a malformed-secret error if the lease does not name a role,
    /// and a not-found error if that role no longer exists.
    #[instrument(skip(self, secret))]
    pub async fn renew_token(&self, secret: &Secret) -> BackendResult<Response> {
        let role_name = secret.internal_str(ROLE_KEY)?;
        let role = self
            .require_role(role_name)
            .await
            .context("error retrieving role")?;

        let mut renewed = secret.clone();
        apply_lease_policy(&mut renewed, &role);

        Ok(Response {
            secret: Some(renewed),
            ..Response::default()
        })
    }

    /// Revoke a lease by deleting its token upstream.
    ///
    /// A lease without a token is still sent upstream with an empty token;
    /// whatever the API answers is returned.
    ///
    /// # Errors
    ///
    /// Returns a malformed-secret error if the lease does not name a role, a
    /// not-found error if the role no longer exists, and the upstream error
    /// if the delete fails. Failures are never reported as success.
    #[instrument(skip(self, secret))]
    pub async fn revoke_token(&self, secret: &Secret) -> BackendResult<()> {
        let client = self.get_client().await.context("error getting client")?;

        let token = secret.optional_internal_str(TOKEN_KEY)?.unwrap_or_default();
        let role_name = secret.internal_str(ROLE_KEY)?;
        let role = self
            .require_role(role_name)
            .await
            .context("error retrieving role")?;

        client
            .delete_project_access_token(role.project_id, token)
            .await
            .map_err(|e| {
                warn!(role = %role.name, error = %e, "Project access token revocation failed");
                e.context("error revoking project access token")
            })?;

        info!(role = %role.name, project_id = role.project_id, "Revoked project access token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::InMemoryStorage;
    use crate::role::RoleUpdate;
    use crate::settings::BackendSettings;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn backend() -> RollbarBackend {
        RollbarBackend::new(Arc::new(InMemoryStorage::new()), BackendSettings::default())
    }

    fn lease(internal: Value) -> Secret {
        let Value::Object(map) = internal else {
            panic!("internal data must be an object");
        };
        Secret::new(PROJECT_ACCESS_TOKEN_TYPE, map)
    }

    #[test]
    fn test_token_names_are_unique() {
        let a = token_name("r1");
        let b = token_name("r1");
        assert!(a.starts_with("r1-"));
        assert_eq!(a.len(), "r1-".len() + 36);
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_ttls_leave_lease_untouched() {
        let mut secret = Secret::new(PROJECT_ACCESS_TOKEN_TYPE, Map::new());
        secret.ttl = Duration::from_secs(60);
        let role = RoleEntry {
            name: "r1".to_string(),
            project_id: 1,
            project_access_token_scopes: String::new(),
            ttl: Duration::ZERO,
            max_ttl: Duration::ZERO,
        };

        apply_lease_policy(&mut secret, &role);
        assert_eq!(secret.ttl, Duration::from_secs(60));
        assert_eq!(secret.max_ttl, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_issue_unknown_role_is_not_found() {
        let err = backend().issue_token("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_renew_without_role_is_malformed() {
        let err = backend()
            .renew_token(&lease(json!({"project_access_token": "abc"})))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MalformedSecret(_)));
    }

    #[tokio::test]
    async fn test_renew_uses_current_role_policy() {
        let backend = backend();
        backend
            .write_role("r1", RoleUpdate::default().project_id(42))
            .await
            .unwrap();
        let secret = lease(json!({"project_access_token": "abc", "role": "r1"}));

        let resp = backend.renew_token(&secret).await.unwrap();
        assert_eq!(resp.secret.unwrap().ttl, Duration::from_secs(3600));

        backend
            .write_role("r1", RoleUpdate::default().ttl(Duration::from_secs(1800)))
            .await
            .unwrap();
        let renewed = backend.renew_token(&secret).await.unwrap().secret.unwrap();
        assert_eq!(renewed.ttl, Duration::from_secs(1800));
        assert_eq!(renewed.max_ttl, Duration::from_secs(7200));
        assert_eq!(renewed.internal_data, secret.internal_data);
    }

    #[tokio::test]
    async fn test_renew_after_role_deleted_fails() {
        let backend = backend();
        backend
            .write_role("r1", RoleUpdate::default().project_id(42))
            .await
            .unwrap();
        backend.delete_role("r1").await.unwrap();

        let err = backend
            .renew_token(&lease(json!({"role": "r1"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_revoke_without_config_is_config_error() {
        let err = backend()
            .revoke_token(&lease(json!({"project_access_token": "abc", "role": "r1"})))
            .await
            .unwrap_err();
        assert!(err.is_config());
    }
}
