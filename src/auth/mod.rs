//! Credential and navigation capabilities used by the stream driver.
//!
//! The driver never reads ambient state: it is handed a [`CredentialStore`]
//! to read and clear the bearer token, and a [`Navigator`] to send the user
//! to the sign-in surface when the server rejects that token.

mod storage;

pub use storage::FileCredentialStore;

use std::sync::RwLock;

/// Source of the bearer credential attached to stream requests.
pub trait CredentialStore: Send + Sync {
    /// Current access token, if signed in.
    fn get(&self) -> Option<String>;

    /// Forget the stored token. Called when the server answers 401.
    fn clear(&self);
}

/// Moves the application to another surface (e.g. the sign-in route).
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// In-process credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.into());
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }
}

/// Navigator that only logs. For headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, path: &str) {
        tracing::debug!(path, "Navigation requested (ignored)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::default();
        assert!(store.get().is_none());

        store.set("abc");
        assert_eq!(store.get().as_deref(), Some("abc"));

        store.clear();
        assert!(store.get().is_none());
        // Clearing twice is fine
        store.clear();
        assert!(store.get().is_none());
    }
}
