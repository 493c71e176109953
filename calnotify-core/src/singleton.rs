//! Ensures only one dispatcher runs against a given database.
//!
//! Two dispatchers sharing a store would race on the cursor and could
//! publish the same reminder twice.

use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::config::DatabaseConfig;
use crate::error::{ConfigError, ConfigResult};

/// A lock guard that releases the lock when dropped
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_path(database: &DatabaseConfig) -> ConfigResult<PathBuf> {
    if database.is_persistent() {
        let db_path = database.resolved_path();
        let mut name = db_path.file_name().unwrap_or_default().to_os_string();
        name.push(".dispatch.lock");
        return Ok(db_path.with_file_name(name));
    }

    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .ok_or_else(|| ConfigError::Invalid("Could not determine runtime directory".into()))?;

    Ok(runtime_dir
        .join("calnotify")
        .join(format!("dispatch-{}.lock", std::process::id())))
}

/// Acquire an exclusive dispatcher lock, failing if another instance holds it
pub fn acquire_lock(database: &DatabaseConfig) -> ConfigResult<LockGuard> {
    acquire_at(lock_path(database)?)
}

fn acquire_at(path: PathBuf) -> ConfigResult<LockGuard> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = File::create(&path)?;

    file.try_lock_exclusive()
        .map_err(|_| ConfigError::AlreadyRunning(path.clone()))?;

    tracing::debug!(path = %path.display(), "acquired dispatcher lock");
    Ok(LockGuard { _file: file, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_lock_on_same_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let database = DatabaseConfig {
            path: dir.path().join("calnotify.db"),
            ..DatabaseConfig::default()
        };

        let guard = acquire_lock(&database).unwrap();
        assert_eq!(guard.path(), dir.path().join("calnotify.db.dispatch.lock"));

        let err = acquire_lock(&database).err().unwrap();
        assert!(matches!(err, ConfigError::AlreadyRunning(_)));

        drop(guard);
        assert!(acquire_lock(&database).is_ok());
    }
}
