mod config;
pub mod database;
pub mod firebase;
mod memory;

pub use config::{Config, CountdownConfig, DelayConfig, HabitConfig, MediaConfig, SoundConfig, StoreBackend};
pub use database::LocalStore;
pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::{ConfigError, CoreError, StoreError};
use crate::integrations::HttpExecutor;
use crate::secrets;

/// Hierarchical JSON document store addressed by slash-separated paths.
///
/// Writes are best-effort from the caller's point of view: the controller
/// logs failures and carries on with its in-memory state.
pub trait PersistenceStore: Send + Sync {
    /// Read the value at `path`; `Ok(None)` when nothing is stored there.
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value at `path`.
    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Set one `key` inside the object at `path`, creating the object if needed.
    fn update_field(&self, path: &str, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Open the store selected by `backend`.
///
/// `Auto` picks Firebase when `FIREBASE_DB_URL` is set and the local
/// SQLite store otherwise.
///
/// # Errors
/// Returns an error if the selected store cannot be opened.
pub fn open_store(
    backend: StoreBackend,
    http: &HttpExecutor,
) -> Result<Arc<dyn PersistenceStore>, CoreError> {
    let db_url = secrets::optional(secrets::FIREBASE_DB_URL);
    let store: Arc<dyn PersistenceStore> = match (backend, db_url) {
        (StoreBackend::Memory, _) => Arc::new(MemoryStore::new()),
        (StoreBackend::Local, _) | (StoreBackend::Auto, None) => Arc::new(LocalStore::open()?),
        (StoreBackend::Firebase, None) => {
            return Err(CoreError::Gateway(crate::error::GatewayError::MissingSecret(
                secrets::FIREBASE_DB_URL,
            )))
        }
        (StoreBackend::Firebase | StoreBackend::Auto, Some(url)) => Arc::new(FirebaseStore::new(
            &url,
            secrets::optional(secrets::FIREBASE_AUTH),
            http.clone(),
        )?),
    };
    info!(?backend, "store opened");
    Ok(store)
}

/// Split a store path into its non-empty segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Returns `~/.config/pomotray[-dev]/` based on POMOTRAY_ENV.
///
/// `POMOTRAY_HOME` replaces the whole directory (used by tests).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("POMOTRAY_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOTRAY_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomotray-dev")
            } else {
                base_dir.join("pomotray")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_skip_empty_parts() {
        let parts: Vec<_> = segments("/pomodoro//time_done/2024-01-02/").collect();
        assert_eq!(parts, vec!["pomodoro", "time_done", "2024-01-02"]);
    }
}
