//! Status command - job counts and cache usage.

use super::{format_size, get_builder, get_database};
use anyhow::{Context, Result};
use colored::Colorize;

pub fn run() -> Result<()> {
    let db = get_database()?;
    let builder = get_builder()?;
    let paths = builder.paths();

    println!("{}", "tubesum Status".cyan().bold());
    println!("{}", "─".repeat(50));

    let counts = db.status_counts()?;

    println!();
    println!("{}", "Analyses".white().bold());
    println!("  {} Processing: {}", "◐".blue(), counts.processing);
    println!("  {} Completed: {}", "●".green(), counts.completed);
    if counts.failed > 0 {
        println!("  {} Failed: {}", "✗".red(), counts.failed);
    }

    let cache = builder.open_cache().context("Failed to open video cache")?;
    let stats = cache.stats()?;
    let limits = &builder.config().cache;

    println!();
    println!("{}", "Video Cache".white().bold());
    println!(
        "  Videos: {} ({} completed, {} downloading, {} failed)",
        stats.count, stats.completed, stats.downloading, stats.failed
    );
    println!(
        "  Size: {} of {:.1} GB",
        format_size(stats.total_size_bytes),
        limits.max_size_gb
    );
    println!("  Max age: {}h", limits.max_age_hours);

    println!();
    println!("{}", "Locations".white().bold());
    println!("  Database: {}", paths.database_file.display().to_string().dimmed());
    println!("  Videos: {}", paths.video_cache_dir.display().to_string().dimmed());
    println!(
        "  Screenshots: {}",
        paths.screenshots_dir.display().to_string().dimmed()
    );

    Ok(())
}
