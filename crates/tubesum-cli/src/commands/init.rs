//! Initialize tubesum.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use tubesum_config::Config;
use tubesum_db::Database;

pub fn run() -> Result<()> {
    let paths = get_paths()?;

    if paths.is_initialized() {
        println!("{} tubesum is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Database: {}", paths.database_file.display());
        return Ok(());
    }

    println!("{}", "Initializing tubesum...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
    println!(
        "  {} Created config: {}",
        "✓".green(),
        paths.config_file.display()
    );

    let db = Database::open(&paths.database_file).context("Failed to initialize database")?;
    if !db.integrity_check().context("Failed to check database")? {
        anyhow::bail!("Database integrity check failed: {}", paths.database_file.display());
    }
    println!(
        "  {} Created database: {}",
        "✓".green(),
        paths.database_file.display()
    );

    println!();
    println!("{}", "tubesum initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  1. Export your API key: {}",
        "export OPENAI_API_KEY=...".cyan()
    );
    println!("  2. Check external tools: {}", "tubesum tools".cyan());
    println!(
        "  3. Analyze a video: {}",
        "tubesum analyze https://www.youtube.com/watch?v=<id>".cyan()
    );

    Ok(())
}
