//! Session setup performed before the shell starts.

use anyhow::{Context, Result, bail};
use boxsync_cloud::{PreferenceStore, ROOT_DIRECTORY_KEY};
use boxsync_types::{NamespaceRoot, SEPARATOR};
use std::path::PathBuf;
use tracing::{info, warn};

/// Rejects usernames that cannot be used as a single path component.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty()
        || username == "."
        || username == ".."
        || username.contains(SEPARATOR)
        || username.contains('\\')
    {
        bail!("invalid username {username:?}");
    }
    Ok(())
}

/// Picks the local root directory for a session.
///
/// Tries the saved `rootDirectory` preference first (ignored if it no longer
/// names a directory), then `configured`, then the current directory.
pub async fn resolve_root_directory(
    preferences: Option<&PreferenceStore>,
    namespace: &NamespaceRoot,
    configured: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(preferences) = preferences {
        match preferences.load(namespace, ROOT_DIRECTORY_KEY).await {
            Ok(Some(saved)) => {
                let saved = PathBuf::from(saved);
                if saved.is_dir() {
                    info!("Using saved root directory {:?}", saved);
                    return Ok(saved);
                }
                warn!("Saved root directory {:?} is not a directory; ignoring", saved);
            }
            Ok(None) => {}
            Err(e) => warn!("Could not load saved root directory: {}", e),
        }
    }

    if let Some(configured) = configured {
        return Ok(configured);
    }
    std::env::current_dir().context("Failed to determine the current directory")
}
