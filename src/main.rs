//! CLI entry point for the assignment rater.
//!
//! Provides subcommands for creating the mode settings, classifying a
//! submissions export into an assignment sheet, listing what a sheet
//! contains, and aggregating a sheet into a per-student summary.

use anyhow::{Context, Result};
use assignment_rater::analyzers::analyzer::{Selection, Targets, classify_source, load_sheet, summarize_sheet};
use assignment_rater::output::{
    CsvSink, JsonSink, TableSink, ensure_writable, print_json, print_pretty, summary_name,
};
use assignment_rater::services::submission_source::{API_TOKEN_VAR, open_source};
use assignment_rater::settings::{DEFAULT_SETTINGS_PATH, ModeSettings, resolve_mode};
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "assignment_rater")]
#[command(about = "Classify assignment submissions and summarize them per student", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default mode settings file
    InitSettings {
        /// Settings file (defaults to $RATER_SETTINGS_PATH or setting.json)
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Show the scoring mode the settings file selects
    ShowMode {
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Classify a submissions export (file or URL) into an assignment sheet
    Classify {
        /// Path or URL of the submissions CSV
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Assignment sheet to write
        #[arg(long, default_value = "assignment.csv")]
        sheet: PathBuf,

        #[arg(long)]
        settings: Option<PathBuf>,

        /// Overwrite an existing sheet
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// List the classes and assignments in an assignment sheet
    ListTargets {
        #[arg(long, default_value = "assignment.csv")]
        sheet: PathBuf,
    },
    /// Aggregate an assignment sheet into a per-student summary
    Aggregate {
        #[arg(long, default_value = "assignment.csv")]
        sheet: PathBuf,

        /// Class to include (repeatable; defaults to every class in the sheet)
        #[arg(short, long = "class")]
        classes: Vec<String>,

        /// Assignment title to include (repeatable)
        #[arg(short, long = "assignment")]
        assignments: Vec<String>,

        /// Include every assignment in the sheet
        #[arg(long, default_value_t = false)]
        all_assignments: bool,

        /// Summary name; `_summary` is appended if missing
        #[arg(short, long)]
        name: String,

        /// Directory to write the summary into
        #[arg(short = 'd', long, default_value = ".")]
        output_dir: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// Overwrite an existing summary
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Re-fetch and re-classify from this file or URL before aggregating
        #[arg(long, value_name = "FILE_OR_URL")]
        refresh: Option<String>,

        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/assignment_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("assignment_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let result = run(cli.command).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Command failed");
    }
    result
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::InitSettings { settings } => {
            let path = settings_path(settings);
            if ModeSettings::write_default(&path)? {
                info!(path = %path.display(), "Settings file created");
            } else {
                warn!(path = %path.display(), "Settings file already exists, left unchanged");
            }
        }
        Commands::ShowMode { settings } => {
            let resolution = resolve_mode(&settings_path(settings))?;
            info!(
                mode = resolution.config.mode_name(),
                label = %resolution.config.flag_header_label,
                "Active scoring mode"
            );
            print_json(&resolution.config)?;
        }
        Commands::Classify {
            source,
            sheet,
            settings,
            force,
        } => {
            let settings = settings_path(settings);
            if ModeSettings::write_default(&settings)? {
                warn!(
                    path = %settings.display(),
                    "Created the mode settings file; review it and run classify again"
                );
                return Ok(());
            }
            ensure_writable(&sheet, force)?;
            refresh_sheet(&source, &sheet, &settings).await?;
        }
        Commands::ListTargets { sheet } => {
            let sheet = load_sheet(&sheet)?;
            let targets = Targets::from_sheet(&sheet);
            info!(
                classes = targets.classes.len(),
                assignments = targets.assignments.len(),
                rule = %targets.rule,
                "Sheet contents"
            );
            print_json(&targets)?;
        }
        Commands::Aggregate {
            sheet,
            classes,
            assignments,
            all_assignments,
            name,
            output_dir,
            format,
            force,
            refresh,
            settings,
        } => {
            let name = summary_name(name.trim());
            if name == summary_name("") {
                anyhow::bail!("summary name must not be empty");
            }
            let output = output_dir.join(format!("{name}.{}", format.extension()));
            ensure_writable(&output, force)?;

            if let Some(source) = refresh {
                info!(source = %source, "Refreshing assignment sheet before aggregation");
                refresh_sheet(&source, &sheet, &settings_path(settings))
                    .await
                    .context("refresh failed, aggregation aborted")?;
            }

            let mut sink: Box<dyn TableSink> = match format {
                OutputFormat::Csv => Box::new(CsvSink::new(&output)),
                OutputFormat::Json => Box::new(JsonSink::new(&output)),
            };
            let selection = Selection {
                classes,
                assignments,
                all_assignments,
            };
            let table = summarize_sheet(&sheet, &selection, sink.as_mut())?;
            print_pretty(&table);
        }
    }

    Ok(())
}

/// Resolves the mode and classifies `source` into `sheet`.
async fn refresh_sheet(source: &str, sheet: &Path, settings: &Path) -> Result<()> {
    let resolution = resolve_mode(settings)?;
    info!(mode = resolution.config.mode_name(), "Classifying submissions");

    let token = std::env::var(API_TOKEN_VAR).ok();
    let source = open_source(source, token.as_deref())?;
    classify_source(source.as_ref(), &resolution.config, sheet).await?;
    Ok(())
}

fn settings_path(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var_os("RATER_SETTINGS_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH))
}
