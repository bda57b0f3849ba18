//! Request routing for the paths the backend serves.
//!
//! | Path | Operations |
//! |---|---|
//! | `config` | create, read, update, delete |
//! | `roles/` | list |
//! | `roles/<name>` | create, read, update, delete |
//! | `projectaccesstoken/<name>` | read, update (issues a token) |
//!
//! Caller mistakes come back as error responses; everything else is
//! returned as an error for the runtime to handle.

use crate::backend::RollbarBackend;
use crate::config::{CONFIG_STORAGE_PATH, RollbarConfig};
use crate::error::{BackendError, BackendResult};
use crate::logical::{FieldData, Operation, Response, Secret};
use crate::role::{ROLE_STORAGE_PREFIX, RoleUpdate, normalize_role_name};
use crate::token::PROJECT_ACCESS_TOKEN_TYPE;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tracing::debug;

/// Token issue path prefix.
pub const TOKEN_PATH_PREFIX: &str = "projectaccesstoken/";

const ACCOUNT_ACCESS_TOKEN_FIELD: &str = "account_access_token";

impl RollbarBackend {
    /// Handle a request against one of the backend's paths.
    ///
    /// Returns `Ok(None)` for operations with nothing to report, such as
    /// writes and reads of missing records.
    ///
    /// # Errors
    ///
    /// Returns every failure that is not a caller mistake.
    pub async fn handle_request(
        &self,
        operation: Operation,
        path: &str,
        data: &FieldData,
    ) -> BackendResult<Option<Response>> {
        debug!(?operation, path, "Handling request");
        match self.route(operation, path, data).await {
            Err(e) if e.is_user_error() => Ok(Some(Response::error(e.to_string()))),
            other => other,
        }
    }

    /// Handle a lease callback from the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown secret types, unsupported operations and
    /// any renew or revoke failure.
    pub async fn handle_secret(
        &self,
        operation: Operation,
        secret: &Secret,
    ) -> BackendResult<Option<Response>> {
        if secret.secret_type != PROJECT_ACCESS_TOKEN_TYPE {
            return Err(BackendError::malformed_secret(format!(
                "unknown secret type: {}",
                secret.secret_type
            )));
        }

        match operation {
            Operation::Renew => self.renew_token(secret).await.map(Some),
            Operation::Revoke => self.revoke_token(secret).await.map(|()| None),
            _ => Err(BackendError::UnsupportedOperation),
        }
    }

    /// Whether a write to `path` updates an existing record.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the path is not writable.
    pub async fn existence_check(&self, path: &str) -> BackendResult<bool> {
        if path == CONFIG_STORAGE_PATH {
            return self.config_exists().await;
        }
        match path.strip_prefix(ROLE_STORAGE_PREFIX) {
            Some(name) if !name.is_empty() => Ok(self.get_role(name).await?.is_some()),
            _ => Err(BackendError::UnsupportedPath(path.to_string())),
        }
    }

    async fn route(
        &self,
        operation: Operation,
        path: &str,
        data: &FieldData,
    ) -> BackendResult<Option<Response>> {
        if path == CONFIG_STORAGE_PATH {
            return self.path_config(operation, data).await;
        }
        if path == ROLE_STORAGE_PREFIX || path == ROLE_STORAGE_PREFIX.trim_end_matches('/') {
            return match operation {
                Operation::List => Ok(Some(Response::list(self.list_roles().await?))),
                _ => Err(BackendError::UnsupportedOperation),
            };
        }
        if let Some(name) = path.strip_prefix(ROLE_STORAGE_PREFIX) {
            return self.path_role(operation, name, data).await;
        }
        if let Some(name) = path.strip_prefix(TOKEN_PATH_PREFIX) {
            return match operation {
                Operation::Read | Operation::Update => {
                    let name = normalize_role_name(name)?;
                    self.issue_token(&name).await.map(Some)
                }
                _ => Err(BackendError::UnsupportedOperation),
            };
        }
        Err(BackendError::UnsupportedPath(path.to_string()))
    }

    async fn path_config(
        &self,
        operation: Operation,
        data: &FieldData,
    ) -> BackendResult<Option<Response>> {
        match operation {
            Operation::Read => Ok(self.read_config().await?.map(|config| {
                let mut out = Map::new();
                out.insert(
                    ACCOUNT_ACCESS_TOKEN_FIELD.to_string(),
                    Value::String(config.account_access_token.expose_secret().to_string()),
                );
                Response::with_data(out)
            })),
            Operation::Create | Operation::Update => {
                let create = operation == Operation::Create;
                let mut config = match self.read_config().await? {
                    Some(config) => config,
                    None if create => RollbarConfig::default(),
                    None => {
                        return Err(BackendError::validation(
                            "config not found during update operation",
                        ));
                    }
                };

                match data.get_str(ACCOUNT_ACCESS_TOKEN_FIELD)? {
                    Some(token) => config = RollbarConfig::new(token),
                    None if create => {
                        return Err(BackendError::validation(
                            "missing Account Access Token in configuration",
                        ));
                    }
                    None => {}
                }

                self.write_config(&config).await?;
                Ok(None)
            }
            Operation::Delete => {
                self.delete_config().await?;
                Ok(None)
            }
            _ => Err(BackendError::UnsupportedOperation),
        }
    }

    async fn path_role(
        &self,
        operation: Operation,
        name: &str,
        data: &FieldData,
    ) -> BackendResult<Option<Response>> {
        match operation {
            Operation::Read => Ok(self
                .get_role(name)
                .await?
                .map(|role| Response::with_data(role.to_response_data()))),
            Operation::Create | Operation::Update => {
                let update = RoleUpdate {
                    project_id: data.get_int("project_id")?,
                    project_access_token_scopes: data.get_str("project_access_token_scopes")?,
                    ttl: data.get_duration_secs("ttl")?,
                    max_ttl: data.get_duration_secs("max_ttl")?,
                };
                self.write_role(name, update).await?;
                Ok(None)
            }
            Operation::Delete => {
                self.delete_role(name).await?;
                Ok(None)
            }
            _ => Err(BackendError::UnsupportedOperation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::InMemoryStorage;
    use crate::settings::BackendSettings;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn backend() -> RollbarBackend {
        RollbarBackend::new(Arc::new(InMemoryStorage::new()), BackendSettings::default())
    }

    #[tokio::test]
    async fn test_config_create_read_delete() {
        let backend = backend();
        let data = FieldData::new().with("account_access_token", "acct");

        assert!(!backend.existence_check("config").await.unwrap());
        let resp = backend
            .handle_request(Operation::Create, "config", &data)
            .await
            .unwrap();
        assert!(resp.is_none());
        assert!(backend.existence_check("config").await.unwrap());

        let resp = backend
            .handle_request(Operation::Read, "config", &FieldData::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.data["account_access_token"], json!("acct"));

        backend
            .handle_request(Operation::Delete, "config", &FieldData::new())
            .await
            .unwrap();
        let resp = backend
            .handle_request(Operation::Read, "config", &FieldData::new())
            .await
            .unwrap();
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_config_update_without_config_is_error_response() {
        let resp = backend()
            .handle_request(
                Operation::Update,
                "config",
                &FieldData::new().with("account_access_token", "acct"),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.error.as_deref(), Some("config not found during update operation"));
    }

    #[tokio::test]
    async fn test_config_create_requires_token() {
        let resp = backend()
            .handle_request(Operation::Create, "config", &FieldData::new())
            .await
            .unwrap()
            .unwrap();
        assert!(resp.is_error());
    }

    #[tokio::test]
    async fn test_role_round_trip_through_fields() {
        let backend = backend();
        let data = FieldData::new()
            .with("project_id", 42)
            .with("project_access_token_scopes", "read")
            .with("ttl", "30m");

        backend
            .handle_request(Operation::Create, "roles/R1", &data)
            .await
            .unwrap();
        assert!(backend.existence_check("roles/r1").await.unwrap());

        let resp = backend
            .handle_request(Operation::Read, "roles/r1", &FieldData::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.data["project_id"], json!(42));
        assert_eq!(resp.data["ttl"], json!(1800));
        assert_eq!(resp.data["max_ttl"], json!(7200));

        let resp = backend
            .handle_request(Operation::List, "roles/", &FieldData::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.data["keys"], json!(["r1"]));
    }

    #[tokio::test]
    async fn test_role_accepts_compound_ttl() {
        let backend = backend();
        let data = FieldData::new()
            .with("project_id", 7)
            .with("ttl", "1h 30m")
            .with("max_ttl", "2h30m");

        let resp = backend
            .handle_request(Operation::Create, "roles/r2", &data)
            .await
            .unwrap();
        assert!(!resp.is_some_and(|r| r.is_error()));

        let role = backend.get_role("r2").await.unwrap().unwrap();
        assert_eq!(role.ttl, Duration::from_secs(5400));
        assert_eq!(role.max_ttl, Duration::from_secs(9000));
    }

    #[tokio::test]
    async fn test_role_validation_is_error_response() {
        let resp = backend()
            .handle_request(
                Operation::Create,
                "roles/r1",
                &FieldData::new().with("project_id", 1).with("ttl", 10).with("max_ttl", 5),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.error.as_deref(), Some("ttl cannot be greater than max_ttl"));
    }

    #[tokio::test]
    async fn test_issue_for_missing_role_is_an_error() {
        let err = backend()
            .handle_request(Operation::Read, "projectaccesstoken/ghost", &FieldData::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_paths_and_operations() {
        let backend = backend();
        let resp = backend
            .handle_request(Operation::Read, "nope", &FieldData::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.error.as_deref(), Some("unsupported path: nope"));

        let resp = backend
            .handle_request(Operation::Delete, "projectaccesstoken/r1", &FieldData::new())
            .await
            .unwrap()
            .unwrap();
        assert!(resp.is_error());
    }

    #[tokio::test]
    async fn test_handle_secret_rejects_foreign_type() {
        let secret = Secret::new("other_type", Map::new());
        let err = backend()
            .handle_secret(Operation::Renew, &secret)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MalformedSecret(_)));
    }
}
