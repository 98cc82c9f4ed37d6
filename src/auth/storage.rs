//! File-backed credential storage.

use super::CredentialStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Storage file format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthFile {
    access_token: Option<String>,
}

/// Credential store persisted as a small JSON file.
///
/// A missing or unreadable file means "not signed in".
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a new access token.
    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let auth_file = AuthFile {
            access_token: Some(token.to_string()),
        };
        let content = serde_json::to_string_pretty(&auth_file)?;
        fs::write(&self.path, content)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, permissions)?;
        }

        Ok(())
    }

    /// Remove the stored token.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }

    fn read_file(&self) -> Result<AuthFile> {
        if !self.path.exists() {
            return Ok(AuthFile::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let auth_file: AuthFile = serde_json::from_str(&content)?;
        Ok(auth_file)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        match self.read_file() {
            Ok(file) => file.access_token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read credentials: {e}");
                None
            }
        }
    }

    fn clear(&self) {
        if let Err(e) = self.remove() {
            tracing::warn!("Failed to clear credentials: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("auth.json"));
        assert!(store.get().is_none());
        // Clearing a missing file is not an error
        store.clear();
    }

    #[test]
    fn test_save_get_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("auth.json"));

        store.save("token-123").unwrap();
        assert_eq!(store.get().as_deref(), Some("token-123"));

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"access_token\": \"token-123\""));

        store.clear();
        assert!(store.get().is_none());
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("auth.json"));
        store.save("secret").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        fs::write(&path, "not json").unwrap();
        let store = FileCredentialStore::new(path);
        assert!(store.get().is_none());
    }
}
