mod batch;
mod combined;
mod config;
mod dedupe;
mod table;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use prodscore_criteria::AuditProfile;
use prodscore_logging::{init_tracing, LogFormat, Logger};

use crate::batch::RunContext;
use crate::config::{Overrides, ProjectConfig, Settings};

/// Exit code for setup failures
const EXIT_SETUP: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "prodscore",
    about = "Score AI-optimized product titles and descriptions against a fixed rubric",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Also append run events as JSON lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Rows (and scoring calls) in flight at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Minimum delay between the start of two scoring calls, in milliseconds
    #[arg(long, global = true)]
    min_delay_ms: Option<u64>,

    /// Retries for rate-limited or failed scoring calls
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json_output: bool,

    /// Do not write a run journal
    #[arg(long, global = true)]
    no_journal: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate optimized titles and descriptions
    #[command(alias = "evaluate")]
    Run {
        /// Input CSV file
        input: PathBuf,

        /// Output CSV (default: results/<input>_evaluated.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        scorer: ScorerArgs,
    },

    /// Audit product records for manual review
    Audit {
        /// Input CSV file
        input: PathBuf,

        /// Output CSV (default: report/<input>_audit_result.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Source of the records
        #[arg(long, value_enum, default_value = "scraped")]
        profile: ProfileChoice,

        #[command(flatten)]
        scorer: ScorerArgs,
    },

    /// Combine every *_audit_result.csv in a report directory
    Summary {
        /// Directory holding the audit result files
        #[arg(default_value = "report")]
        dir: PathBuf,

        /// Prefix for the report files (default: <dir>/combined_summary_<timestamp>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Keep the first row of every (url, title) pair
    Dedupe {
        /// Input CSV file with url and title columns
        input: PathBuf,

        /// Output CSV (default: <input>_filtered_<timestamp>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct ScorerArgs {
    /// Model tier (fast, balanced, accurate) or model id
    #[arg(short, long)]
    model: Option<String>,

    /// API key (default: QWEN_API_KEY or DASHSCOPE_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileChoice {
    Scraped,
    Online,
}

impl From<ProfileChoice> for AuditProfile {
    fn from(choice: ProfileChoice) -> Self {
        match choice {
            ProfileChoice::Scraped => AuditProfile::Scraped,
            ProfileChoice::Online => AuditProfile::Online,
        }
    }
}

#[tokio::main]
async fn main() {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_format: LogFormat = cli.log_format.into();
    init_tracing("warn", log_format);

    let code = match run(cli, log_format).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_SETUP
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, log_format: LogFormat) -> Result<i32> {
    let (input, output, scorer_args, profile) = match cli.command {
        Commands::Dedupe { input, output } => {
            dedupe::handle_dedupe_command(&input, output, cli.json_output)?;
            return Ok(0);
        }
        Commands::Summary { dir, output } => {
            combined::handle_summary_command(&dir, output, cli.json_output)?;
            return Ok(0);
        }
        Commands::Run { input, output, scorer } => (input, output, scorer, None),
        Commands::Audit {
            input,
            output,
            profile,
            scorer,
        } => (input, output, scorer, Some(AuditProfile::from(profile))),
    };

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let file = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    let overrides = Overrides {
        model: scorer_args.model,
        api_key: scorer_args.api_key,
        concurrency: cli.concurrency,
        min_delay_ms: cli.min_delay_ms,
        max_retries: cli.max_retries,
    };
    let settings = Settings::resolve(&file, &overrides, |name| std::env::var(name).ok())?;

    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let ctx = RunContext {
        settings,
        logger: Arc::new(logger),
        journal: !cli.no_journal,
        json_output: cli.json_output,
    };

    match profile {
        None => batch::run_evaluation(&ctx, &input, output).await,
        Some(profile) => batch::run_audit(&ctx, &input, output, profile).await,
    }
}
