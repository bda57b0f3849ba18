//! Roles: which project a token is minted for, with what scope, and under
//! which lease policy.

use crate::backend::RollbarBackend;
use crate::error::{BackendError, BackendResult};
use crate::logical::StorageEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{info, instrument};

/// Storage prefix for role records.
pub const ROLE_STORAGE_PREFIX: &str = "roles/";

/// TTL given to a role created without one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Maximum TTL given to a role created without one.
pub const DEFAULT_MAX_TTL: Duration = Duration::from_secs(7200);

static ROLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w(([\w.-]+)?\w)?$").expect("role name pattern is valid"));

/// Stored role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Role name
    pub name: String,
    /// Rollbar project the tokens belong to
    pub project_id: i64,
    /// Scope string passed through to Rollbar unchecked
    #[serde(default)]
    pub project_access_token_scopes: String,
    /// Default lease TTL; zero defers to the runtime default
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// Maximum lease TTL; zero defers to the runtime default
    #[serde(with = "duration_secs")]
    pub max_ttl: Duration,
}

impl RoleEntry {
    /// Caller-facing view of the role.
    #[must_use]
    pub fn to_response_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("project_id".to_string(), json!(self.project_id));
        data.insert(
            "project_access_token_scopes".to_string(),
            json!(self.project_access_token_scopes),
        );
        data.insert("ttl".to_string(), json!(self.ttl.as_secs()));
        data.insert("max_ttl".to_string(), json!(self.max_ttl.as_secs()));
        data
    }

    fn validate(&self) -> BackendResult<()> {
        if self.project_id <= 0 {
            return Err(BackendError::validation("missing project ID"));
        }
        if !self.max_ttl.is_zero() && self.ttl > self.max_ttl {
            return Err(BackendError::validation("ttl cannot be greater than max_ttl"));
        }
        Ok(())
    }
}

/// Fields supplied on a role write. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleUpdate {
    /// Rollbar project ID, required when the role is created
    pub project_id: Option<i64>,
    /// Token scope string
    pub project_access_token_scopes: Option<String>,
    /// Default lease TTL
    pub ttl: Option<Duration>,
    /// Maximum lease TTL
    pub max_ttl: Option<Duration>,
}

impl RoleUpdate {
    /// Set the project ID.
    #[must_use]
    pub const fn project_id(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Set the scope string.
    #[must_use]
    pub fn scopes(mut self, scopes: impl Into<String>) -> Self {
        self.project_access_token_scopes = Some(scopes.into());
        self
    }

    /// Set the TTL.
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the maximum TTL.
    #[must_use]
    pub const fn max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = Some(max_ttl);
        self
    }

    fn apply(self, entry: &mut RoleEntry) {
        if let Some(project_id) = self.project_id {
            entry.project_id = project_id;
        }
        if let Some(scopes) = self.project_access_token_scopes {
            entry.project_access_token_scopes = scopes;
        }
        if let Some(ttl) = self.ttl {
            entry.ttl = ttl;
        }
        if let Some(max_ttl) = self.max_ttl {
            entry.max_ttl = max_ttl;
        }
    }
}

/// Lower-case and check a role name.
///
/// # Errors
///
/// Returns a validation error for empty names or names with characters
/// outside letters, digits, `_`, `-` and `.`.
pub fn normalize_role_name(name: &str) -> BackendResult<String> {
    if name.is_empty() {
        return Err(BackendError::validation("missing role name"));
    }
    let name = name.to_lowercase();
    if !ROLE_NAME.is_match(&name) {
        return Err(BackendError::validation(format!("invalid role name: {name}")));
    }
    Ok(name)
}

fn role_key(name: &str) -> String {
    format!("{ROLE_STORAGE_PREFIX}{name}")
}

impl RollbarBackend {
    /// Load a role by name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid name, or an error if storage
    /// fails or the record cannot be decoded.
    pub async fn get_role(&self, name: &str) -> BackendResult<Option<RoleEntry>> {
        let name = normalize_role_name(name)?;
        match self.storage().get(&role_key(&name)).await? {
            Some(entry) => Ok(Some(entry.decode_json()?)),
            None => Ok(None),
        }
    }

    /// Create or update a role.
    ///
    /// A new role starts from the default TTLs; an existing role keeps every
    /// field the update leaves unset. Nothing is written if the merged role
    /// is invalid.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing project ID or a TTL above a
    /// non-zero maximum TTL.
    #[instrument(skip(self, update))]
    pub async fn write_role(&self, name: &str, update: RoleUpdate) -> BackendResult<RoleEntry> {
        let name = normalize_role_name(name)?;
        if update.project_id.is_some_and(|id| id <= 0) {
            return Err(BackendError::validation("missing project ID"));
        }

        let mut entry = self.get_role(&name).await?.unwrap_or_else(|| RoleEntry {
            name: name.clone(),
            project_id: 0,
            project_access_token_scopes: String::new(),
            ttl: DEFAULT_TTL,
            max_ttl: DEFAULT_MAX_TTL,
        });
        entry.name.clone_from(&name);
        update.apply(&mut entry);
        entry.validate()?;

        self.storage()
            .put(StorageEntry::json(role_key(&name), &entry)?)
            .await?;

        info!(role = %name, project_id = entry.project_id, "Role written");
        Ok(entry)
    }

    /// Delete a role. Tokens already issued from it are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or storage fails.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, name: &str) -> BackendResult<()> {
        let name = normalize_role_name(name)?;
        self.storage()
            .delete(&role_key(&name))
            .await
            .map_err(|e| e.context("error deleting rollbar role"))?;

        info!(role = %name, "Role deleted");
        Ok(())
    }

    /// Names of all stored roles.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list_roles(&self) -> BackendResult<Vec<String>> {
        self.storage().list(ROLE_STORAGE_PREFIX).await
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
