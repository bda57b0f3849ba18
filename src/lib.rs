//! Rollbar project access token secrets backend.
//!
//! Mints short-lived Rollbar project access tokens from declarative roles,
//! hands them to the hosting secrets runtime as leases, and renews or
//! revokes them on the runtime's schedule.
//!
//! - [`RollbarBackend`] is the per-mount handle: storage, settings and the
//!   cached [`RollbarClient`]
//! - roles and configuration live in runtime-provided [`Storage`]
//! - issue, renew and revoke are in [`token`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod logical;
pub mod paths;
pub mod role;
pub mod secrets;
pub mod settings;
pub mod telemetry;
pub mod token;

pub use backend::RollbarBackend;
pub use client::RollbarClient;
pub use config::RollbarConfig;
pub use error::{BackendError, BackendResult};
pub use logical::{FieldData, InMemoryStorage, Operation, Response, Secret, Storage, StorageEntry};
pub use role::{RoleEntry, RoleUpdate};
pub use settings::BackendSettings;
