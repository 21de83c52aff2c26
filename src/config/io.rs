//! Configuration file I/O operations

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::Config;

impl Config {
    /// Get the global config directory path (~/.libris/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".libris")
    }

    /// Get the global config file path (~/.libris/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Load the config at `path`, or the global config when `path` is `None`.
    ///
    /// A missing global config is created with defaults. A missing explicit
    /// path falls back to defaults without writing anything.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(_) => Ok(Self::with_defaults()),
            None => {
                let global_path = Self::global_config_path();
                if !global_path.exists() {
                    Self::with_defaults().save_if_missing(&global_path)?;
                }
                Self::from_file(&global_path)
            }
        }
    }

    /// Save configuration to a file with atomic write and file locking.
    ///
    /// An exclusive lock keeps concurrent CLI invocations from interleaving
    /// writes; the temp file + rename keeps a crash from truncating the file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let _lock = lock_config(path)?;
        self.write_atomic(path)
    }

    /// Write the config unless the file already exists. Returns true if written.
    pub fn save_if_missing(&self, path: &Path) -> Result<bool> {
        let _lock = lock_config(path)?;
        // Re-check under the lock; another process may have created it
        if path.exists() {
            return Ok(false);
        }
        self.write_atomic(path)?;
        tracing::info!("Created {}", path.display());
        Ok(true)
    }

    fn write_atomic(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        let temp_path = path.with_extension("toml.tmp");
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        temp_file
            .write_all(content.as_bytes())
            .with_context(|| "Failed to write config content")?;
        temp_file
            .sync_all()
            .with_context(|| "Failed to sync config file")?;

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename config file: {}", path.display()))?;
        Ok(())
    }
}

/// Create the parent directory and take the exclusive config lock.
/// The lock is released when the returned file is dropped.
fn lock_config(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
    }

    // Separate lock file so the rename never replaces a locked inode
    let lock_path = path.with_extension("toml.lock");
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

    lock_file
        .lock_exclusive()
        .with_context(|| "Failed to acquire config lock")?;
    Ok(lock_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::with_defaults();
        config.settings.busy_timeout_ms = 1234;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.settings.busy_timeout_ms, 1234);
        assert_eq!(loaded.achievements, config.achievements);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_save_if_missing_does_not_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut first = Config::default();
        first.settings.busy_timeout_ms = 1;
        assert!(first.save_if_missing(&path).unwrap());

        let second = Config::with_defaults();
        assert!(!second.save_if_missing(&path).unwrap());

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.settings.busy_timeout_ms, 1);
    }

    #[test]
    fn test_missing_explicit_path_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.achievements, Config::with_defaults().achievements);
        assert!(!path.exists());
    }
}
