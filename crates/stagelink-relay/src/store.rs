//! Disk-backed model store
//!
//! Uploaded model files live flat in the configured directory next to a
//! JSON manifest that carries per-model metadata (author, folder, upload
//! time). The manifest is rewritten on every change; model files themselves
//! are the source of truth for existence, so a file with no manifest entry
//! still shows up in the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagelink_core::catalog::{ModelDescriptor, ACCEPTED_EXTENSIONS};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model not found: {0}")]
    NotFound(String),
    #[error("invalid model name: {0}")]
    InvalidName(String),
}

/// Metadata recorded for a model on upload completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    models: BTreeMap<String, ModelMeta>,
}

/// Store of uploaded model files plus their manifest
pub struct ModelStore {
    root: PathBuf,
    manifest: RwLock<Manifest>,
}

impl ModelStore {
    /// Open (or create) a store rooted at `root`. Synchronous; runs once
    /// at startup before the server loop.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            match serde_json::from_str(&content) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %manifest_path.display(), error = %e, "Failed to parse manifest, starting empty");
                    Manifest::default()
                }
            }
        } else {
            Manifest::default()
        };

        info!(path = %root.display(), "Opened model store");
        Ok(Self {
            root,
            manifest: RwLock::new(manifest),
        })
    }

    /// List the catalog, building model URLs against `public_url`
    pub async fn list(&self, public_url: &str) -> Vec<ModelDescriptor> {
        let manifest = self.manifest.read().await;
        let mut models = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "Failed to read model directory");
                return models;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if !has_accepted_extension(&name) {
                continue;
            }
            let meta = manifest.models.get(&name);
            models.push(ModelDescriptor {
                url: format!("{}/models/{}", public_url, name),
                name,
                author: meta.and_then(|m| m.author.clone()),
                folder: meta.and_then(|m| m.folder.clone()),
            });
        }

        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }

    /// Names currently in the catalog (for duplicate checks)
    pub async fn names(&self) -> Vec<String> {
        self.list("").await.into_iter().map(|m| m.name).collect()
    }

    /// Write model bytes to disk. Does not register metadata; that happens
    /// on `upload_complete`.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.model_path(name)?;
        tokio::fs::write(path, bytes).await?;
        info!(model = %name, size = bytes.len(), "Stored model file");
        Ok(())
    }

    /// Record author/folder metadata for an uploaded model
    pub async fn register(
        &self,
        name: &str,
        author: Option<String>,
        folder: Option<String>,
    ) -> Result<(), StoreError> {
        if !tokio::fs::try_exists(self.model_path(name)?).await? {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let mut manifest = self.manifest.write().await;
        manifest.models.insert(
            name.to_string(),
            ModelMeta {
                author,
                folder,
                uploaded_at: Utc::now(),
            },
        );
        self.write_manifest(&manifest).await?;
        info!(model = %name, "Registered model");
        Ok(())
    }

    /// Delete a model file and its metadata
    pub async fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.model_path(name)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(name.to_string()));
        }
        tokio::fs::remove_file(path).await?;

        let mut manifest = self.manifest.write().await;
        manifest.models.remove(name);
        self.write_manifest(&manifest).await?;
        info!(model = %name, "Removed model");
        Ok(())
    }

    /// Resolve the playable URL of a stored model
    pub async fn resolve(&self, name: &str, public_url: &str) -> Result<String, StoreError> {
        let path = self.model_path(name)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(format!("{}/models/{}", public_url, name))
    }

    /// Directory served under `/models`
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn model_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        // Reject anything that could escape the store directory
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    async fn write_manifest(&self, manifest: &Manifest) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(manifest)?;
        tokio::fs::write(self.root.join(MANIFEST_FILE), content).await?;
        Ok(())
    }
}

fn has_accepted_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_register_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();

        store.save("robot.glb", b"glTF").await.unwrap();
        store
            .register("robot.glb", Some("alice".to_string()), None)
            .await
            .unwrap();

        let models = store.list("http://localhost:8080").await;
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "robot.glb");
        assert_eq!(models[0].author.as_deref(), Some("alice"));
        assert_eq!(models[0].url, "http://localhost:8080/models/robot.glb");
    }

    #[tokio::test]
    async fn test_manifest_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ModelStore::open(dir.path()).unwrap();
            store.save("a.stl", b"solid").await.unwrap();
            store
                .register("a.stl", None, Some("user".to_string()))
                .await
                .unwrap();
        }
        let store = ModelStore::open(dir.path()).unwrap();
        let models = store.list("").await;
        assert_eq!(models[0].folder.as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn test_unregistered_file_still_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.obj"), b"o").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"t").unwrap();

        let store = ModelStore::open(dir.path()).unwrap();
        let models = store.list("").await;
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "old.obj");
        assert_eq!(models[0].author, None);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save("robot.glb", b"glTF").await.unwrap();
        store.remove("robot.glb").await.unwrap();
        assert!(store.list("").await.is_empty());
        assert!(matches!(
            store.remove("robot.glb").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.save("../evil.glb", b"x").await,
            Err(StoreError::InvalidName(_))
        ));
    }
}
