//! CLI command implementations.

pub mod analyze;
pub mod cache;
pub mod config;
pub mod init;
pub mod list;
pub mod show;
pub mod status;
pub mod tools;

use anyhow::{Context, Result};
use tracing::debug;
use tubesum_config::{AppPaths, Config, StorageBackend};
use tubesum_db::Database;
use tubesum_pipeline::PipelineBuilder;

/// Get the application paths, before any `general.data_dir` override.
pub fn get_paths() -> Result<AppPaths> {
    AppPaths::new().context("Failed to determine application directories")
}

/// Load the config file and the paths it points at.
pub fn load_config() -> Result<(Config, AppPaths)> {
    let paths = get_paths()?;

    if !paths.is_initialized() {
        anyhow::bail!("tubesum is not initialized. Run 'tubesum init' first.");
    }

    let config = Config::load_from(&paths.config_file).context("Failed to load config")?;
    let paths = config.apply_data_dir(paths);
    debug!("Data directory: {}", paths.data_dir.display());
    Ok((config, paths))
}

/// Get a database connection, ensuring tubesum is initialized.
pub fn get_database() -> Result<Database> {
    let (config, paths) = load_config()?;

    if config.general.storage == StorageBackend::Memory {
        anyhow::bail!(
            "Job history is not kept with general.storage = \"memory\". \
             Run 'tubesum config set general.storage sqlite' to keep it."
        );
    }

    Database::open(&paths.database_file).context("Failed to open database")
}

/// Get a pipeline builder for the current configuration.
pub fn get_builder() -> Result<PipelineBuilder> {
    let (config, paths) = load_config()?;
    Ok(PipelineBuilder::new(config, paths))
}

/// Disable colors when the config asks for it. Errors fall back to colors on.
pub fn apply_color_setting() {
    let Some(paths) = AppPaths::new() else {
        return;
    };
    if let Ok(config) = Config::load_from(&paths.config_file) {
        if !config.ui.color {
            colored::control::set_override(false);
        }
    }
}

/// Format a file size in human-readable form.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// First eight characters of an id, as shown in listings.
pub fn short(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Shorten text to `max` characters, appending "..." when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
