//! Tools command - check external dependencies.

use super::get_builder;
use anyhow::{Context, Result};
use colored::Colorize;
use tubesum_llm::ChatClient;
use tubesum_media::check_dependencies;

pub fn run() -> Result<()> {
    let builder = get_builder()?;
    let config = builder.config();

    println!("{}", "External Tools".cyan().bold());
    println!("{}", "─".repeat(50));

    let tools = check_dependencies(&config.tools.ytdlp, &config.tools.ffmpeg);
    let mut missing = 0;
    for (tool, available) in &tools {
        if *available {
            println!("  {} {}", "✓".green(), tool);
        } else {
            missing += 1;
            println!("  {} {} {}", "✗".red(), tool, "(not found)".dimmed());
        }
    }

    println!();
    println!("{}", "Language Model".cyan().bold());
    println!("{}", "─".repeat(50));

    let client = ChatClient::from_config(&config.llm)?;
    println!("  Endpoint: {}", client.base_url());
    println!("  Model: {}", config.llm.model);
    if client.has_api_key() {
        println!("  {} API key from {}", "✓".green(), config.llm.api_key_env);
    } else {
        println!(
            "  {} {} is not set",
            "✗".red(),
            config.llm.api_key_env
        );
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    if rt.block_on(client.is_available()) {
        println!("  {} Endpoint reachable", "✓".green());
    } else {
        println!("  {} Endpoint not reachable", "✗".red());
    }

    if missing > 0 {
        println!();
        println!(
            "{} Screenshots fall back to thumbnails and captions cannot be fetched without these tools.",
            "Note:".yellow().bold()
        );
    }

    Ok(())
}
