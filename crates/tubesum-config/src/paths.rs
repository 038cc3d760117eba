//! Application paths management.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Manages all application paths following platform conventions.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
    pub video_cache_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Create paths using platform-specific directories.
    pub fn new() -> Option<Self> {
        let proj_dirs = ProjectDirs::from("com", "tubesum", "tubesum")?;

        let config_dir = proj_dirs.config_dir().to_path_buf();
        let data_dir = proj_dirs.data_dir().to_path_buf();

        Some(Self::build(config_dir, data_dir))
    }

    /// Keep everything under a single root directory (tests, portable installs).
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::build(root.join("config"), root.join("data"))
    }

    /// Relocate data (database, caches, screenshots) to another directory.
    pub fn with_data_dir(self, data_dir: PathBuf) -> Self {
        Self::build(self.config_dir, data_dir)
    }

    fn build(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join("config.toml"),
            database_file: data_dir.join("tubesum.db"),
            video_cache_dir: data_dir.join("cached-videos"),
            screenshots_dir: data_dir.join("screenshots"),
            log_dir: data_dir.join("logs"),
            config_dir,
            data_dir,
        }
    }

    /// Create all necessary directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.video_cache_dir)?;
        std::fs::create_dir_all(&self.screenshots_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    /// Check if tubesum has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths_creation() {
        let paths = AppPaths::new();
        assert!(paths.is_some());

        let paths = paths.unwrap();
        assert!(paths.config_file.to_string_lossy().contains("config.toml"));
        assert!(paths.database_file.to_string_lossy().contains("tubesum.db"));
    }

    #[test]
    fn test_with_data_dir_keeps_config_location() {
        let paths = AppPaths::from_root("/tmp/ts").with_data_dir(PathBuf::from("/srv/tubesum"));
        assert_eq!(paths.config_file, PathBuf::from("/tmp/ts/config/config.toml"));
        assert_eq!(paths.video_cache_dir, PathBuf::from("/srv/tubesum/cached-videos"));
        assert_eq!(paths.screenshots_dir, PathBuf::from("/srv/tubesum/screenshots"));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_root(temp.path());
        paths.ensure_dirs().unwrap();
        assert!(paths.video_cache_dir.is_dir());
        assert!(paths.screenshots_dir.is_dir());
        assert!(!paths.is_initialized());
    }
}
