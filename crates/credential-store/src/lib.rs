//! Credential provider collaborators.
//!
//! The login flow consumes the [`CredentialProvider`] contract only; the
//! in-memory store backs tests and demos, the JSON-file store backs the
//! CLI.

use async_trait::async_trait;
use passage_core_types::{CredentialBundle, IdentityRef};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Failure modes when fetching a credential bundle.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("identity '{0}' not found")]
    NotFound(String),
    #[error("not authorized to read identity '{0}'")]
    Unauthorized(String),
    #[error("credential store I/O failure: {0}")]
    Io(String),
    #[error("malformed credential store: {0}")]
    Malformed(String),
}

/// Resolves an identity reference to its stored credential bundle.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self, identity: &IdentityRef) -> Result<CredentialBundle, CredentialError>;
}

/// In-memory provider. Used by tests and as a scratch store for demos.
#[derive(Default)]
pub struct MemoryCredentialStore {
    bundles: RwLock<HashMap<String, CredentialBundle>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, identity: IdentityRef, bundle: CredentialBundle) {
        self.bundles.write().await.insert(identity.0, bundle);
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentialStore {
    async fn fetch(&self, identity: &IdentityRef) -> Result<CredentialBundle, CredentialError> {
        self.bundles
            .read()
            .await
            .get(identity.as_str())
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(identity.to_string()))
    }
}

#[derive(Deserialize)]
struct StoreFile {
    identities: HashMap<String, CredentialBundle>,
}

/// Provider backed by a JSON file mapping identity references to bundles.
///
/// The file is re-read on every fetch; bundles are expected to be small
/// and edits should take effect without a restart.
pub struct JsonFileCredentialStore {
    path: PathBuf,
}

impl JsonFileCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CredentialProvider for JsonFileCredentialStore {
    async fn fetch(&self, identity: &IdentityRef) -> Result<CredentialBundle, CredentialError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| CredentialError::Io(format!("{}: {err}", self.path.display())))?;
        let store: StoreFile = serde_json::from_str(&raw)
            .map_err(|err| CredentialError::Malformed(err.to_string()))?;
        debug!(
            identities = store.identities.len(),
            path = %self.path.display(),
            "loaded credential store"
        );
        store
            .identities
            .get(identity.as_str())
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(identity.to_string()))
    }
}
