//! Show command - display an analysis.

use super::get_database;
use anyhow::Result;
use colored::Colorize;
use tubesum_core::{AnalysisJob, JobStatus};
use tubesum_llm::format_timestamp;

pub fn run(id: &str, subtitles: bool, json: bool) -> Result<()> {
    let db = get_database()?;
    let job = db.get_analysis_by_prefix(id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(());
    }

    let (config, _) = super::load_config()?;
    print_job(&job, subtitles, &config.ui.date_format);
    Ok(())
}

/// Colored status label.
pub fn status_label(status: JobStatus) -> colored::ColoredString {
    match status {
        JobStatus::Processing => "processing".blue(),
        JobStatus::Completed => "completed".green(),
        JobStatus::Failed => "failed".red(),
    }
}

/// Print a job with its sections.
pub fn print_job(job: &AnalysisJob, with_subtitles: bool, date_format: &str) {
    let meta = &job.metadata;

    println!("🎬 {}", meta.title.white().bold());
    println!("{}", "─".repeat(70));

    println!("  {}: {}", "ID".cyan(), job.id);
    println!("  {}: {}", "Video".cyan(), job.source_url);
    if !meta.channel.is_empty() {
        println!("  {}: {}", "Channel".cyan(), meta.channel);
    }
    if meta.duration > 0 {
        println!(
            "  {}: {}",
            "Duration".cyan(),
            format_timestamp(meta.duration as f64)
        );
    }
    if !meta.publish_date.is_empty() {
        println!("  {}: {}", "Published".cyan(), meta.publish_date);
    }
    println!("  {}: {}", "Status".cyan(), status_label(job.status));
    println!(
        "  {}: {}",
        "Created".cyan(),
        job.created_at.format(date_format)
    );
    println!(
        "  {}: {}",
        "Updated".cyan(),
        job.updated_at.format(date_format)
    );
    if let Some(ref error) = job.error {
        println!("  {}: {}", "Error".red(), error);
    }
    if !job.subtitles.is_empty() {
        println!("  {}: {}", "Subtitles".cyan(), job.subtitles.len());
    }

    if job.segments.is_empty() {
        return;
    }

    println!();
    println!(
        "{} ({} sections)",
        "Sections".white().bold(),
        job.segments.len()
    );
    println!("{}", "─".repeat(70));

    for (i, segment) in job.segments.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!(
            "{} {}",
            format!(
                "[{} - {}]",
                format_timestamp(segment.start_time),
                format_timestamp(segment.end_time)
            )
            .yellow(),
            segment.title.white().bold()
        );
        println!("  {} {}", "Screenshot:".dimmed(), segment.screenshot_url.dimmed());
        println!("  {}", segment.ai_summary);

        if with_subtitles {
            for subtitle in &segment.subtitles {
                println!(
                    "    {} {}",
                    format!("[{}]", format_timestamp(subtitle.start)).dimmed(),
                    subtitle.text
                );
            }
        }
    }
}
