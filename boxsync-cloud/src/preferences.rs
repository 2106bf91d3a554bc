//! Per-user preferences stored as small objects.
//!
//! Each preference lives at `<namespace>/<key>` in its own bucket, holding the
//! raw UTF-8 value.

use crate::error::CloudResult;
use crate::store::ObjectStore;
use boxsync_types::NamespaceRoot;
use std::sync::Arc;
use tracing::debug;

/// Preference holding the user's local root directory.
pub const ROOT_DIRECTORY_KEY: &str = "rootDirectory";

/// Key/value preferences scoped per namespace.
pub struct PreferenceStore {
    store: Arc<dyn ObjectStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn object_key(namespace: &NamespaceRoot, key: &str) -> String {
        format!("{namespace}/{key}")
    }

    /// Saves `value` under `key`, replacing any previous value.
    pub async fn save(&self, namespace: &NamespaceRoot, key: &str, value: &str) -> CloudResult<()> {
        debug!("Saving preference {} for {}", key, namespace);
        self.store
            .put_object(&Self::object_key(namespace, key), value.as_bytes())
            .await
    }

    /// Loads the value under `key`, or `None` if it was never saved.
    pub async fn load(&self, namespace: &NamespaceRoot, key: &str) -> CloudResult<Option<String>> {
        match self.store.get_object(&Self::object_key(namespace, key)).await {
            Ok(data) => Ok(Some(String::from_utf8(data.content)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Removes the value under `key`.
    pub async fn delete(&self, namespace: &NamespaceRoot, key: &str) -> CloudResult<()> {
        self.store
            .delete_object(&Self::object_key(namespace, key))
            .await
    }
}
