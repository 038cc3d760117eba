//! Tubesum CLI - segment, summarize and screenshot YouTube videos

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tubesum - turn a YouTube video into summarized, illustrated sections
#[derive(Parser)]
#[command(name = "tubesum")]
#[command(author = "Lalo Morales <lalomorales22@github.com>")]
#[command(version)]
#[command(about = "Turn a YouTube video into summarized, illustrated sections", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize tubesum (create config and database)
    Init,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Analyze a video and follow its progress
    Analyze {
        /// Video URL (watch, youtu.be, embed, shorts or live link)
        url: String,

        /// Regenerate even if the video was analyzed before
        #[arg(short, long)]
        force: bool,

        /// Print progress as JSON lines instead of a progress bar
        #[arg(long)]
        json: bool,
    },

    /// Show an analysis
    Show {
        /// Job ID (a unique prefix is enough)
        id: String,

        /// Include the subtitles of each section
        #[arg(short, long)]
        subtitles: bool,

        /// Print the job record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent analyses
    List {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Show job and cache statistics
    Status,

    /// Manage the local video cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Check for required external tools and the LLM endpoint
    Tools,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., llm.model)
        key: String,

        /// Value to set
        value: String,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached videos
    List,

    /// Show cache statistics
    Stats,

    /// Remove a cached video
    Delete {
        /// Video ID
        video_id: String,
    },

    /// Evict old videos and screenshots using the configured limits
    Cleanup {
        /// Override the maximum age in hours
        #[arg(long)]
        max_age_hours: Option<u64>,

        /// Override the maximum cache size in GB
        #[arg(long)]
        max_size_gb: Option<f64>,
    },

    /// Copy a cached video (or a byte range of it) to a file
    Export {
        /// Video ID
        video_id: String,

        /// Destination path
        dest: String,

        /// Byte range, e.g. "bytes=0-1048575"
        #[arg(short, long)]
        range: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tubesum=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tubesum=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    commands::apply_color_setting();

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Set { key, value } => commands::config::set(&key, &value),
        },
        Commands::Analyze { url, force, json } => commands::analyze::run(&url, force, json),
        Commands::Show {
            id,
            subtitles,
            json,
        } => commands::show::run(&id, subtitles, json),
        Commands::List { limit } => commands::list::run(limit),
        Commands::Status => commands::status::run(),
        Commands::Cache(cmd) => match cmd {
            CacheCommands::List => commands::cache::list(),
            CacheCommands::Stats => commands::cache::stats(),
            CacheCommands::Delete { video_id } => commands::cache::delete(&video_id),
            CacheCommands::Cleanup {
                max_age_hours,
                max_size_gb,
            } => commands::cache::cleanup(max_age_hours, max_size_gb),
            CacheCommands::Export {
                video_id,
                dest,
                range,
            } => commands::cache::export(&video_id, &dest, range.as_deref()),
        },
        Commands::Tools => commands::tools::run(),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
