//! Analyze command - run the pipeline for a URL and follow its progress.

use super::{get_builder, short, show};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tubesum_core::{JobStatus, ProgressEvent, ProgressStatus};
use tubesum_pipeline::{PipelineBuilder, ProgressMessage};

pub fn run(url: &str, force: bool, json: bool) -> Result<()> {
    let builder = get_builder()?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(analyze(&builder, url, force, json))
}

async fn analyze(builder: &PipelineBuilder, url: &str, force: bool, json: bool) -> Result<()> {
    let services = builder.build().context("Failed to set up pipeline")?;
    let pipeline = &services.pipeline;
    let date_format = &builder.config().ui.date_format;

    let submission = pipeline.submit(url, force).await?;
    let job = submission.job;

    if !submission.needs_run {
        if json {
            println!("{}", serde_json::to_string(&job)?);
            return Ok(());
        }
        if job.status == JobStatus::Processing {
            println!(
                "{} Job {} is still being analyzed by another process.",
                "Note:".yellow().bold(),
                short(&job.id)
            );
        } else {
            println!(
                "{} Showing the existing analysis. Use {} to regenerate it.",
                "Note:".yellow().bold(),
                "--force".cyan()
            );
        }
        println!();
        show::print_job(&job, false, date_format);
        return Ok(());
    }

    let reporter = if json {
        Reporter::Json
    } else {
        println!(
            "{} {}",
            "Analyzing".cyan().bold(),
            job.metadata.title.white().bold()
        );
        println!("  {} {}", "Job:".dimmed(), job.id);
        Reporter::bar()?
    };

    // Subscribe before spawning so no event is missed.
    let mut events = pipeline.bus().subscribe(&job.id);
    let maintenance = builder.spawn_maintenance(&services);
    let task = pipeline.spawn(&job.id);

    let followed = follow(&mut events, task, &reporter).await;
    for handle in maintenance {
        handle.abort();
    }
    reporter.finish();
    followed?;

    let job = pipeline
        .get(&job.id)?
        .with_context(|| format!("Job {} disappeared from the store", job.id))?;

    match job.status {
        JobStatus::Completed if json => Ok(()),
        JobStatus::Completed => {
            println!("{}", "Analysis complete!".green().bold());
            println!();
            show::print_job(&job, false, date_format);
            Ok(())
        }
        _ => anyhow::bail!(
            "Analysis failed: {}",
            job.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Render events until the run ends.
async fn follow(
    events: &mut UnboundedReceiver<ProgressEvent>,
    mut task: tokio::task::JoinHandle<()>,
    reporter: &Reporter,
) -> Result<()> {
    let mut task_done = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    reporter.show(&event)?;
                    if event.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            result = &mut task, if !task_done => {
                result.context("Analysis task stopped unexpectedly")?;
                task_done = true;
                // The terminal event may still be queued.
                while let Ok(event) = events.try_recv() {
                    reporter.show(&event)?;
                }
                break;
            }
        }
    }

    if !task_done {
        task.await.context("Analysis task stopped unexpectedly")?;
    }
    Ok(())
}

enum Reporter {
    Bar(ProgressBar),
    Json,
}

impl Reporter {
    fn bar() -> Result<Self> {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
                .progress_chars("█▓░"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Ok(Reporter::Bar(pb))
    }

    fn show(&self, event: &ProgressEvent) -> Result<()> {
        match self {
            Reporter::Json => {
                println!("{}", ProgressMessage::from(event.clone()).to_json()?);
            }
            Reporter::Bar(pb) => {
                pb.set_position(u64::from(event.progress));
                pb.set_message(format!("{}: {}", event.step, event.message));
                match event.status {
                    ProgressStatus::Completed => {
                        pb.println(format!("  {} {}", "✓".green(), event.message));
                    }
                    ProgressStatus::Error => {
                        let kind = event
                            .details
                            .as_ref()
                            .and_then(|d| d.get("errorKind"))
                            .and_then(|k| k.as_str())
                            .unwrap_or("Error");
                        pb.println(format!(
                            "  {} {} ({})",
                            "✗".red(),
                            event.message,
                            kind.dimmed()
                        ));
                    }
                    ProgressStatus::Running | ProgressStatus::Pending => {}
                }
            }
        }
        Ok(())
    }

    fn finish(&self) {
        if let Reporter::Bar(pb) = self {
            pb.finish_and_clear();
        }
    }
}
