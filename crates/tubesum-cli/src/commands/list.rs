//! List command - recent analyses.

use super::{get_database, load_config, short, truncate};
use anyhow::Result;
use colored::Colorize;
use tubesum_core::JobStatus;

pub fn run(limit: i64) -> Result<()> {
    let db = get_database()?;
    let (config, _) = load_config()?;

    let jobs = db.list_analyses(Some(limit))?;

    if jobs.is_empty() {
        println!(
            "{}",
            "No analyses yet. Use 'tubesum analyze <url>' to add one.".dimmed()
        );
        return Ok(());
    }

    println!("{}", "Recent Analyses".cyan().bold());
    println!("{}", "─".repeat(70));

    for job in jobs {
        let icon = match job.status {
            JobStatus::Processing => "◐".blue(),
            JobStatus::Completed => "●".green(),
            JobStatus::Failed => "✗".red(),
        };

        let date = job.created_at.format(&config.ui.date_format).to_string();

        println!(
            "{} {} {} {}",
            icon,
            truncate(&job.metadata.title, 60).white().bold(),
            format!("[{}]", short(&job.id)).dimmed(),
            date.dimmed()
        );

        let mut detail = format!("{} · {} sections", job.video_id, job.segments.len());
        if !job.metadata.channel.is_empty() {
            detail.push_str(" · ");
            detail.push_str(&job.metadata.channel);
        }
        println!("  {}", detail.dimmed());

        if let Some(ref error) = job.error {
            println!("  {}", truncate(error, 80).red());
        }
    }

    Ok(())
}
