//! Package configuration and file version stores

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-package key/value settings behind `config.get` / `config.set`.
#[async_trait]
pub trait PackageConfigStore: Send + Sync {
    async fn get(&self, package: &str, key: &str) -> Result<Option<serde_json::Value>, String>;

    async fn set(&self, package: &str, key: &str, value: serde_json::Value) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    pub id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub size: usize,
    pub message: Option<String>,
}

/// Saved snapshots of files, keyed by VFS namespace and absolute path.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Versions of a file, oldest first.
    async fn list(&self, namespace: &str, path: &str) -> Result<Vec<FileVersion>, String>;

    async fn get(&self, namespace: &str, path: &str, id: &str) -> Result<Option<String>, String>;

    /// Record `content` as a new version and return its id.
    async fn save(
        &self,
        namespace: &str,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<String, String>;

    async fn has_history(&self, namespace: &str, path: &str) -> Result<bool, String> {
        Ok(!self.list(namespace, path).await?.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPackageConfigStore {
    entries: RwLock<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryPackageConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageConfigStore for MemoryPackageConfigStore {
    async fn get(&self, package: &str, key: &str) -> Result<Option<serde_json::Value>, String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&(package.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, package: &str, key: &str, value: serde_json::Value) -> Result<(), String> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((package.to_string(), key.to_string()), value);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    versions: RwLock<HashMap<(String, String), Vec<(FileVersion, String)>>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn list(&self, namespace: &str, path: &str) -> Result<Vec<FileVersion>, String> {
        let versions = self.versions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(versions
            .get(&(namespace.to_string(), path.to_string()))
            .map(|list| list.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default())
    }

    async fn get(&self, namespace: &str, path: &str, id: &str) -> Result<Option<String>, String> {
        let versions = self.versions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(versions
            .get(&(namespace.to_string(), path.to_string()))
            .and_then(|list| list.iter().find(|(v, _)| v.id == id))
            .map(|(_, content)| content.clone()))
    }

    async fn save(
        &self,
        namespace: &str,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<String, String> {
        let version = FileVersion {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_millis(),
            size: content.len(),
            message: message.map(str::to_string),
        };
        let id = version.id.clone();
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((namespace.to_string(), path.to_string()))
            .or_default()
            .push((version, content.to_string()));
        Ok(id)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
