//! Workspace layout
//!
//! A fk-infra workspace is the directory holding `fk-infra.yml`. Rendered definitions
//! land next to it, downloaded tools in `.fk-infra/` and key material in `keys/`.

pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "fk-infra.yml";
/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "FK_INFRA_CONFIG";
pub const CACHE_DIR_NAME: &str = ".fk-infra";
pub const KEYS_DIR_NAME: &str = "keys";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The current working directory.
    pub fn current() -> Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tool cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR_NAME)
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.root.join(KEYS_DIR_NAME)
    }

    /// Where `init` writes the config.
    pub fn default_config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Config location, honouring `FK_INFRA_CONFIG`.
    pub fn config_path(&self) -> PathBuf {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                tracing::debug!(path = %path, "Using config path from {}", CONFIG_PATH_ENV);
                PathBuf::from(path)
            }
            _ => self.default_config_path(),
        }
    }

    /// Config location, which must exist.
    pub fn find_config_file(&self) -> Result<PathBuf> {
        let path = self.config_path();
        if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::ConfigFileNotFound { path })
        }
    }

    pub fn ensure_cache_dir(&self) -> Result<PathBuf> {
        let dir = self.cache_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_layout() {
        let workspace = Workspace::new("/srv/staging");
        assert_eq!(workspace.cache_dir(), PathBuf::from("/srv/staging/.fk-infra"));
        assert_eq!(workspace.keys_dir(), PathBuf::from("/srv/staging/keys"));
        assert_eq!(
            workspace.default_config_path(),
            PathBuf::from("/srv/staging/fk-infra.yml")
        );
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "spec: {}").unwrap();

        temp_env::with_var_unset(CONFIG_PATH_ENV, || {
            let found = Workspace::new(temp_dir.path()).find_config_file().unwrap();
            assert!(found.ends_with(CONFIG_FILE_NAME));
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_override() {
        let temp_dir = tempfile::tempdir().unwrap();
        let custom = temp_dir.path().join("staging.yml");
        fs::write(&custom, "spec: {}").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(custom.to_str().unwrap()), || {
            let found = Workspace::new("/nonexistent").find_config_file().unwrap();
            assert_eq!(found, custom);
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();

        temp_env::with_var_unset(CONFIG_PATH_ENV, || {
            let result = Workspace::new(temp_dir.path()).find_config_file();
            match result {
                Err(ConfigError::ConfigFileNotFound { path }) => {
                    assert!(path.ends_with(CONFIG_FILE_NAME))
                }
                other => panic!("Expected ConfigFileNotFound, got {:?}", other),
            }
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "spec: {}").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, || {
            Workspace::current().and_then(|workspace| workspace.find_config_file())
        });
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_ensure_cache_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(temp_dir.path());

        let dir = workspace.ensure_cache_dir().unwrap();
        assert!(dir.is_dir());
        // idempotent
        assert!(workspace.ensure_cache_dir().is_ok());
    }
}
