//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod categorize;
mod ocr;
mod parse;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::models::{CategoryId, ExpenseId, UserId};

#[derive(Parser)]
#[command(name = "spendscan")]
#[command(about = "Receipt OCR, field extraction and expense categorization")]
#[command(version)]
pub struct Cli {
    /// Config file (overrides discovery)
    #[arg(short, long, global = true, env = "SPENDSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check for verbose flag before clap parsing, so logging can be set up first.
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Check OCR backend availability
    Check,

    /// Extract amount, date and merchant from recognized text
    Parse {
        /// Text file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Run a receipt image through preprocessing, OCR and extraction
    Process {
        /// Receipt image
        image: PathBuf,

        /// Skip image preprocessing
        #[arg(long)]
        no_preprocess: bool,

        /// Also print the recognized text
        #[arg(long)]
        show_text: bool,
    },

    /// List categorization rules in evaluation order
    Rules,

    /// Categorize an expense from a fixture
    Categorize {
        /// Fixture file with categories and expenses (JSON, TOML or YAML)
        #[arg(long)]
        fixture: PathBuf,

        /// Owner of the expense
        #[arg(long)]
        user: UserId,

        /// Expense to categorize
        #[arg(long)]
        expense: ExpenseId,
    },

    /// Ask a user's classifier for a category
    Classify {
        /// Fixture file with categories and expenses (JSON, TOML or YAML)
        #[arg(long)]
        fixture: PathBuf,

        /// User whose history trains the classifier
        #[arg(long)]
        user: UserId,

        /// Text to classify
        text: String,
    },

    /// Correct an expense's category and teach the user's classifier
    Feedback {
        /// Fixture file with categories and expenses (JSON, TOML or YAML)
        #[arg(long)]
        fixture: PathBuf,

        /// Owner of the expense
        #[arg(long)]
        user: UserId,

        /// Expense being corrected
        #[arg(long)]
        expense: ExpenseId,

        /// Correct category id
        #[arg(long)]
        category: CategoryId,
    },
}

async fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e)),
        None => Ok(Config::load().await),
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).await?;
    tracing::debug!("Loaded config from {:?}", config.source_path);

    match cli.command {
        Commands::Check => ocr::cmd_check(&config).await,
        Commands::Parse { file } => parse::cmd_parse(file.as_deref()).await,
        Commands::Process {
            image,
            no_preprocess,
            show_text,
        } => ocr::cmd_process(&config, &image, no_preprocess, show_text).await,
        Commands::Rules => categorize::cmd_rules(&config),
        Commands::Categorize {
            fixture,
            user,
            expense,
        } => categorize::cmd_categorize(&config, &fixture, user, expense).await,
        Commands::Classify {
            fixture,
            user,
            text,
        } => categorize::cmd_classify(&config, &fixture, user, &text).await,
        Commands::Feedback {
            fixture,
            user,
            expense,
            category,
        } => categorize::cmd_feedback(&config, &fixture, user, expense, category).await,
    }
}
