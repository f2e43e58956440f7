// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
// Add other lints specific to this module that you want to allow but not auto-fix

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use captrack::app_config::{Config, LogLevel};
use captrack::export::{ExportJob, ExportPipeline, HeaderStyle};
use captrack::file_utils::{DirectorySink, FileManager};
use captrack::language_utils;
use captrack::providers::HttpFetcher;
use captrack::subtitle_processor::{CaptionTrack, DiscoveredItem, SubtitleFormat, TrackCodec};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for SubtitleFormat to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    Srt,
    Txt,
}

impl From<CliFormat> for SubtitleFormat {
    fn from(cli_format: CliFormat) -> Self {
        match cli_format {
            CliFormat::Srt => SubtitleFormat::Srt,
            CliFormat::Txt => SubtitleFormat::Txt,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the caption tracks of an item
    List {
        /// Item identifier (the `v` parameter of a watch link)
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Download caption tracks of one or more items
    Download(DownloadArgs),

    /// Generate shell completions for captrack
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct DownloadArgs {
    /// Item identifiers
    #[arg(value_name = "ID", required = true, num_args = 1..)]
    ids: Vec<String>,

    /// Language codes to export (e.g., 'en', 'es', 'fr'); all tracks when omitted
    #[arg(short, long = "lang", value_name = "CODE")]
    languages: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "srt")]
    format: CliFormat,

    /// Output directory (defaults to the user download directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the aggregated payload to stdout instead of writing files
    #[arg(long)]
    copy: bool,
}

/// captrack - caption track discovery and export
///
/// Finds the caption tracks of catalog items and exports them as SRT or
/// plain text.
#[derive(Parser, Debug)]
#[command(name = "captrack")]
#[command(version = "0.1.0")]
#[command(about = "Caption track discovery and export tool")]
#[command(long_about = "captrack discovers the caption tracks of catalog items and exports them.

EXAMPLES:
    captrack list abc123                          # List the tracks of an item
    captrack download abc123                      # Export every track as SRT
    captrack download -l en -l fr abc123 def456   # Export English and French tracks
    captrack download -f txt -o ./subs abc123     # Plain text into ./subs
    captrack download --copy -l en abc123         # Print the payload instead
    captrack completions bash > captrack.bash     # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace is the ceiling; the effective level is set once the config is loaded
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "captrack", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config_path, cli.log_level.clone())?;
    log::set_max_level(config.log_level.to_level_filter());

    let fetcher = Arc::new(HttpFetcher::new(config.timings.request_timeout()));
    let codec = Arc::new(TrackCodec::from_config(fetcher, &config)?);

    match cli.command {
        Commands::List { id } => run_list(&codec, &id).await,
        Commands::Download(args) => run_download(codec, &config, args).await,
        Commands::Completions { .. } => Ok(()),
    }
}

/// Load the configuration file, creating a default one when missing
fn load_config(config_path: &str, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if FileManager::file_exists(config_path) {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader::<_, Config>(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        FileManager::write_to_file(config_path, &config_json)?;
        config
    };

    // Command line log level wins over the file
    if let Some(log_level) = log_level {
        config.log_level = log_level.into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

async fn discover(codec: &TrackCodec, id: &str) -> Result<DiscoveredItem> {
    let progress = spinner(&format!("Loading subtitles for {}...", id));
    let result = codec.discover_item(id).await;
    progress.finish_and_clear();
    result.with_context(|| format!("Failed to fetch subtitles for {}", id))
}

async fn run_list(codec: &TrackCodec, id: &str) -> Result<()> {
    let tracks = discover(codec, id).await?.tracks;
    if tracks.is_empty() {
        warn!("No subtitles available for {}", id);
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    for track in &tracks {
        let kind = if track.auto_generated { " (auto-generated)" } else { "" };
        writeln!(stdout, "{}\t{}{}", track.language_code, track.language_name, kind)?;
    }
    Ok(())
}

async fn run_download(codec: Arc<TrackCodec>, config: &Config, args: DownloadArgs) -> Result<()> {
    let format: SubtitleFormat = args.format.into();

    let mut jobs = Vec::new();
    for id in &args.ids {
        let item = match discover(&codec, id).await {
            Ok(item) => item,
            Err(e) => {
                // one failing item does not abort the others
                warn!("{:#}", e);
                continue;
            }
        };

        let picked: Vec<CaptionTrack> = item
            .tracks
            .into_iter()
            .filter(|track| {
                args.languages.is_empty()
                    || args
                        .languages
                        .iter()
                        .any(|lang| language_utils::language_codes_match(&track.language_code, lang))
            })
            .collect();

        if picked.is_empty() {
            warn!("No matching subtitles for {}", id);
            continue;
        }
        let title = item.title.unwrap_or_else(|| id.clone());
        debug!("Picked {} track(s) for {} ({})", picked.len(), id, title);
        jobs.extend(picked.into_iter().map(|track| ExportJob::new(title.clone(), track)));
    }

    if jobs.is_empty() {
        return Err(anyhow!("No subtitles to export"));
    }

    let output_dir = args
        .output
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let sink = Arc::new(DirectorySink::new(output_dir.clone()));
    let pipeline = ExportPipeline::new(codec, sink, config.timings.download_delay());

    if args.copy {
        let style = if args.ids.len() > 1 {
            HeaderStyle::ItemAndTrack
        } else {
            HeaderStyle::Track
        };
        let progress = spinner("Copying subtitles...");
        let result = pipeline.copy(&jobs, format, style).await;
        progress.finish_and_clear();
        result?;
    } else {
        let progress = spinner("Downloading subtitles...");
        let result = pipeline.download(&jobs, format).await;
        progress.finish_and_clear();
        let count = result?;
        info!("Success: {} file(s) in {}", count, output_dir.display());
    }

    Ok(())
}
