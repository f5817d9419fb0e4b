//! Anonymous identity resolution
//!
//! Events without a user id are attributed to an anonymous id generated
//! once per client and persisted through an [`IdentityStore`], so the same
//! device keeps the same id across restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::Result;

/// Prefix of generated anonymous ids.
pub const ANONYMOUS_PREFIX: &str = "anon-";

/// Persistence seam for the anonymous id of this client.
pub trait IdentityStore: Send + Sync {
    /// Load a previously persisted id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn load(&self) -> Result<Option<String>>;

    /// Persist the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be written.
    fn save(&self, id: &str) -> Result<()>;
}

/// Process-lifetime identity store.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    id: Mutex<Option<String>>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.id.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, id: &str) -> Result<()> {
        *self.id.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.to_string());
        Ok(())
    }
}

/// Identity store backed by a single plain-text file.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    /// Use `path` to persist the id. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let id = contents.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, id)?;
        Ok(())
    }
}

/// Resolves the user id for tracked events.
///
/// The anonymous id is generated at most once per resolver and cached;
/// store failures are logged and the in-memory id keeps being used.
pub struct IdentityResolver {
    store: Box<dyn IdentityStore>,
    cached: Mutex<Option<String>>,
}

impl IdentityResolver {
    /// Create a resolver over an identity store.
    #[must_use]
    pub fn new(store: Box<dyn IdentityStore>) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    /// Return `user_id` when present and non-empty, otherwise the anonymous id.
    #[must_use]
    pub fn resolve(&self, user_id: Option<&str>) -> String {
        match user_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => self.anonymous_id(),
        }
    }

    /// The anonymous id of this client, loading or generating it on first use.
    #[must_use]
    pub fn anonymous_id(&self) -> String {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = cached.as_ref() {
            return id.clone();
        }

        let id = match self.store.load() {
            Ok(Some(id)) => id,
            Ok(None) => self.generate(),
            Err(e) => {
                warn!(error = %e, "failed to load anonymous id, generating a new one");
                self.generate()
            }
        };
        *cached = Some(id.clone());
        id
    }

    fn generate(&self) -> String {
        let id = format!("{ANONYMOUS_PREFIX}{}", Uuid::new_v4());
        if let Err(e) = self.store.save(&id) {
            warn!(error = %e, "failed to persist anonymous id");
        }
        debug!(anonymous_id = %id, "generated anonymous id");
        id
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(Box::new(MemoryIdentityStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_user_id_wins() {
        let resolver = IdentityResolver::default();
        assert_eq!(resolver.resolve(Some("user-7")), "user-7");
    }

    #[test]
    fn test_anonymous_id_is_cached() {
        let resolver = IdentityResolver::default();
        let first = resolver.resolve(None);
        assert!(first.starts_with(ANONYMOUS_PREFIX));
        assert_eq!(resolver.resolve(None), first);
        assert_eq!(resolver.resolve(Some("  ")), first);
    }

    #[test]
    fn test_file_store_persists_across_resolvers() {
        let path = std::env::temp_dir().join(format!(
            "conversion_lab_identity_{}.txt",
            Uuid::new_v4()
        ));

        let first = IdentityResolver::new(Box::new(FileIdentityStore::new(&path))).anonymous_id();
        let second = IdentityResolver::new(Box::new(FileIdentityStore::new(&path))).anonymous_id();
        assert_eq!(first, second);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_file_store_missing_file() {
        let store = FileIdentityStore::new(std::env::temp_dir().join("conversion_lab_missing/id"));
        assert!(store.load().unwrap().is_none());
    }
}
