//! Cache commands - inspect and manage downloaded videos.

use super::{format_size, get_builder, load_config};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tubesum_core::DownloadStatus;
use tubesum_media::{cleanup_old_screenshots, ByteRange, VideoCache};

fn open_cache() -> Result<Arc<VideoCache>> {
    let builder = get_builder()?;
    builder.open_cache().context("Failed to open video cache")
}

pub fn list() -> Result<()> {
    let cache = open_cache()?;
    let (config, _) = load_config()?;
    let entries = cache.entries()?;

    if entries.is_empty() {
        println!("{}", "No cached videos.".dimmed());
        return Ok(());
    }

    println!("{}", "Cached Videos".cyan().bold());
    println!("{}", "─".repeat(70));

    for entry in entries {
        let status = match entry.download_status {
            DownloadStatus::Completed => "●".green(),
            DownloadStatus::Downloading => "◐".blue(),
            DownloadStatus::Pending => "○".yellow(),
            DownloadStatus::Failed => "✗".red(),
        };
        let title = if entry.title.is_empty() {
            entry.video_id.clone()
        } else {
            entry.title.clone()
        };

        println!(
            "{} {} {} {}",
            status,
            title.white().bold(),
            format!("[{}]", entry.video_id).dimmed(),
            format_size(entry.file_size).dimmed()
        );
        println!(
            "  {} {}",
            entry.file_name.dimmed(),
            format!(
                "last used {}",
                entry.last_accessed_at.format(&config.ui.date_format)
            )
            .dimmed()
        );
    }

    Ok(())
}

pub fn stats() -> Result<()> {
    let cache = open_cache()?;
    let stats = cache.stats()?;

    println!("{}", "Cache Statistics".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("  Directory: {}", cache.dir().display());
    println!("  Videos: {}", stats.count);
    println!("  Total size: {}", format_size(stats.total_size_bytes));
    println!("  {} Completed: {}", "●".green(), stats.completed);
    println!("  {} Downloading: {}", "◐".blue(), stats.downloading);
    if stats.failed > 0 {
        println!("  {} Failed: {}", "✗".red(), stats.failed);
    }

    Ok(())
}

pub fn delete(video_id: &str) -> Result<()> {
    let cache = open_cache()?;

    if cache.delete(video_id)? {
        println!("{} Deleted cached video {}", "✓".green(), video_id.cyan());
    } else {
        println!(
            "{} Video {} is not in the cache.",
            "Note:".yellow().bold(),
            video_id
        );
    }

    Ok(())
}

pub fn cleanup(max_age_hours: Option<u64>, max_size_gb: Option<f64>) -> Result<()> {
    let builder = get_builder()?;
    let config = builder.config();
    let cache = builder.open_cache().context("Failed to open video cache")?;

    let max_age = Duration::from_secs(max_age_hours.unwrap_or(config.cache.max_age_hours) * 3600);
    let max_size_bytes = match max_size_gb {
        Some(gb) => (gb.max(0.0) * 1024.0 * 1024.0 * 1024.0) as u64,
        None => config.cache.max_size_bytes(),
    };

    let report = cache.cleanup(max_age, max_size_bytes)?;
    if report.removed.is_empty() {
        println!("{} No videos to evict.", "✓".green());
    } else {
        println!(
            "{} Evicted {} videos, freed {}",
            "✓".green(),
            report.removed.len(),
            format_size(report.freed_bytes)
        );
        for video_id in &report.removed {
            println!("  {} {}", "•".dimmed(), video_id);
        }
    }

    let screenshot_age = Duration::from_secs(config.screenshots.max_age_minutes * 60);
    let removed = cleanup_old_screenshots(&builder.paths().screenshots_dir, screenshot_age)?;
    println!("{} Removed {} old screenshots", "✓".green(), removed);

    Ok(())
}

pub fn export(video_id: &str, dest: &str, range: Option<&str>) -> Result<()> {
    let cache = open_cache()?;
    let dest = PathBuf::from(shellexpand::tilde(dest).into_owned());
    let range = range.map(ByteRange::parse).transpose()?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    match range {
        Some(range) => {
            let (start, end, total_size) = rt.block_on(async {
                let slice = cache.read_range(video_id, Some(range)).await?;
                let span = (slice.start, slice.end, slice.total_size);
                let mut out = tokio::fs::File::create(&dest)
                    .await
                    .with_context(|| format!("Failed to create {}", dest.display()))?;
                slice
                    .copy_to(&mut out)
                    .await
                    .with_context(|| format!("Failed to write {}", dest.display()))?;
                anyhow::Ok(span)
            })?;
            println!(
                "{} Wrote bytes {}-{}/{} to {}",
                "✓".green(),
                start,
                end,
                total_size,
                dest.display()
            );
        }
        None => {
            let written = rt.block_on(cache.export(video_id, &dest))?;
            println!(
                "{} Exported {} ({}) to {}",
                "✓".green(),
                video_id.cyan(),
                format_size(written),
                dest.display()
            );
        }
    }

    Ok(())
}
