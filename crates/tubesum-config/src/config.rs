//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub subtitles: SubtitleConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub screenshots: ScreenshotConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub ui: UiConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        let default_config = Self::default_config_string();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, default_config)?;
        Ok(())
    }

    /// Application paths, honoring `general.data_dir`.
    pub fn paths(&self) -> ConfigResult<AppPaths> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Ok(self.apply_data_dir(paths))
    }

    /// Relocate `paths` if a data directory override is configured.
    pub fn apply_data_dir(&self, paths: AppPaths) -> AppPaths {
        match &self.general.data_dir {
            Some(dir) => {
                let expanded = shellexpand::tilde(dir).into_owned();
                paths.with_data_dir(PathBuf::from(expanded))
            }
            None => paths,
        }
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.llm.min_segments == 0 || self.llm.min_segments > self.llm.max_segments {
            return Err(ConfigError::Invalid(format!(
                "llm.min_segments ({}) must be between 1 and llm.max_segments ({})",
                self.llm.min_segments, self.llm.max_segments
            )));
        }
        if self.screenshots.width == 0 || self.screenshots.height == 0 {
            return Err(ConfigError::Invalid(
                "screenshot dimensions must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Set a single value by dotted key, e.g. `llm.model`.
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["general", "data_dir"] => self.general.data_dir = Some(value.to_string()),
            ["general", "storage"] => {
                self.general.storage = StorageBackend::from_str(value).ok_or_else(|| invalid(key, value))?
            }
            ["general", "stale_job_minutes"] => self.general.stale_job_minutes = parse(key, value)?,
            ["llm", "base_url"] => self.llm.base_url = value.to_string(),
            ["llm", "model"] => self.llm.model = value.to_string(),
            ["llm", "api_key_env"] => self.llm.api_key_env = value.to_string(),
            ["llm", "timeout_seconds"] => self.llm.timeout_seconds = parse(key, value)?,
            ["llm", "temperature"] => self.llm.temperature = parse(key, value)?,
            ["llm", "min_segments"] => self.llm.min_segments = parse(key, value)?,
            ["llm", "max_segments"] => self.llm.max_segments = parse(key, value)?,
            ["subtitles", "primary_languages"] => self.subtitles.primary_languages = split_list(value),
            ["subtitles", "secondary_languages"] => {
                self.subtitles.secondary_languages = split_list(value)
            }
            ["cache", "max_age_hours"] => self.cache.max_age_hours = parse(key, value)?,
            ["cache", "max_size_gb"] => self.cache.max_size_gb = parse(key, value)?,
            ["cache", "cleanup_interval_minutes"] => {
                self.cache.cleanup_interval_minutes = parse(key, value)?
            }
            ["screenshots", "width"] => self.screenshots.width = parse(key, value)?,
            ["screenshots", "height"] => self.screenshots.height = parse(key, value)?,
            ["screenshots", "jpeg_quality"] => self.screenshots.jpeg_quality = parse(key, value)?,
            ["screenshots", "url_prefix"] => self.screenshots.url_prefix = value.to_string(),
            ["screenshots", "max_age_minutes"] => {
                self.screenshots.max_age_minutes = parse(key, value)?
            }
            ["tools", "ytdlp"] => self.tools.ytdlp = value.to_string(),
            ["tools", "ffmpeg"] => self.tools.ffmpeg = value.to_string(),
            ["ui", "color"] => self.ui.color = parse(key, value)?,
            ["ui", "date_format"] => self.ui.date_format = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        self.validate()
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Tubesum Configuration
# AI summaries of YouTube videos, segment by segment

[general]
# Data directory for database, cached videos and screenshots
# data_dir = "~/.local/share/tubesum"

# Job storage backend: "sqlite" (persistent) or "memory"
storage = "sqlite"

# A job left "processing" this long (e.g. by a killed run) is marked failed
stale_job_minutes = 60

[llm]
# Any OpenAI-compatible chat completions endpoint
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"

# Environment variable holding the API key
api_key_env = "OPENAI_API_KEY"

# Request timeout in seconds
timeout_seconds = 120
temperature = 0.3

# How many topical segments to ask for
min_segments = 4
max_segments = 6

[subtitles]
# Caption track preference; first match wins, then the first available track
primary_languages = ["zh", "zh-CN"]
secondary_languages = ["en", "en-US"]

[cache]
# Cached videos are evicted after this many hours without access
max_age_hours = 24

# Total cache size cap; oldest-accessed videos are evicted first
max_size_gb = 10.0

# How often the eviction sweep runs
cleanup_interval_minutes = 60

[screenshots]
width = 1280
height = 720

# ffmpeg JPEG quality (2 = best, 31 = worst)
jpeg_quality = 2

# URL prefix under which the screenshots directory is served
url_prefix = "/screenshots"

# Screenshots older than this are removed by 'tubesum screenshots cleanup'
max_age_minutes = 60

[tools]
ytdlp = "yt-dlp"
ffmpeg = "ffmpeg"

[ui]
# Enable colored output
color = true

# Date format (strftime)
date_format = "%Y-%m-%d %H:%M"
"#
        .to_string()
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Where analysis jobs are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Some(StorageBackend::Sqlite),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
    pub storage: StorageBackend,
    /// A `processing` job with no store update for this long is treated as
    /// interrupted and marked failed on its next submission.
    pub stale_job_minutes: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            storage: StorageBackend::default(),
            stale_job_minutes: 60,
        }
    }
}

/// Chat-completion model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
    pub min_segments: usize,
    pub max_segments: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 120,
            temperature: 0.3,
            min_segments: 4,
            max_segments: 6,
        }
    }
}

/// Caption track selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub primary_languages: Vec<String>,
    pub secondary_languages: Vec<String>,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            primary_languages: vec!["zh".to_string(), "zh-CN".to_string()],
            secondary_languages: vec!["en".to_string(), "en-US".to_string()],
        }
    }
}

/// Video cache eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_age_hours: u64,
    pub max_size_gb: f64,
    pub cleanup_interval_minutes: u64,
}

impl CacheConfig {
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_gb.max(0.0) * 1024.0 * 1024.0 * 1024.0) as u64
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            max_size_gb: 10.0,
            cleanup_interval_minutes: 60,
        }
    }
}

/// Screenshot rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub url_prefix: String,
    pub max_age_minutes: u64,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            jpeg_quality: 2,
            url_prefix: "/screenshots".to_string(),
            max_age_minutes: 60,
        }
    }
}

/// External tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ytdlp: String,
    pub ffmpeg: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

/// UI/Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub color: bool,
    pub date_format: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            color: true,
            date_format: "%Y-%m-%d %H:%M".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.cache.max_age_hours, 24);
        assert_eq!(config.screenshots.width, 1280);
        assert_eq!(config.subtitles.primary_languages, vec!["zh", "zh-CN"]);
        assert_eq!(config.general.storage, StorageBackend::Sqlite);
    }

    #[test]
    fn test_default_string_matches_defaults() {
        let parsed: Config = toml::from_str(&Config::default_config_string()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.llm.base_url, defaults.llm.base_url);
        assert_eq!(parsed.cache.max_size_gb, defaults.cache.max_size_gb);
        assert_eq!(parsed.screenshots.url_prefix, defaults.screenshots.url_prefix);
        assert_eq!(parsed.subtitles.secondary_languages, defaults.subtitles.secondary_languages);
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
            [llm]
            model = "llama3"

            [cache]
            max_age_hours = 6
            "#
        )
        .unwrap();

        let config = Config::load_from(temp_file.path()).unwrap();

        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.cache.max_age_hours, 6);
        // Defaults should still work
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.cache.cleanup_interval_minutes, 60);
    }

    #[test]
    fn test_load_rejects_bad_segment_range() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[llm]\nmin_segments = 8\nmax_segments = 3").unwrap();

        assert!(matches!(
            Config::load_from(temp_file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();
        config.set_value("llm.model", "gpt-4o").unwrap();
        config.set_value("cache.max_size_gb", "2.5").unwrap();
        config.set_value("subtitles.primary_languages", "ja, ja-JP").unwrap();
        config.set_value("general.storage", "memory").unwrap();
        config.set_value("general.stale_job_minutes", "15").unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.cache.max_size_gb, 2.5);
        assert_eq!(config.subtitles.primary_languages, vec!["ja", "ja-JP"]);
        assert_eq!(config.general.storage, StorageBackend::Memory);
        assert_eq!(config.general.stale_job_minutes, 15);

        assert!(matches!(
            config.set_value("cache.max_age_hours", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set_value("nope.key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_save_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.llm.temperature = 0.7;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.llm.temperature, 0.7);
    }

    #[test]
    fn test_data_dir_override() {
        let mut config = Config::default();
        config.general.data_dir = Some("/srv/tubesum".to_string());
        let paths = config.apply_data_dir(AppPaths::from_root("/tmp/x"));
        assert_eq!(paths.database_file, PathBuf::from("/srv/tubesum/tubesum.db"));
    }

    #[test]
    fn test_max_size_bytes() {
        let cache = CacheConfig {
            max_size_gb: 1.0,
            ..Default::default()
        };
        assert_eq!(cache.max_size_bytes(), 1024 * 1024 * 1024);
    }
}
