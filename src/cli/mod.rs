pub mod config;
pub mod process;
pub mod rules;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use txnorm::dates::DateLocale;

#[derive(Parser)]
#[command(
    name = "txnorm",
    version,
    about = "Normalize bank and card exports into one categorized transaction schema."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/txnorm/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Log progress to stderr; repeat for more detail
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize a CSV or spreadsheet export and print the records.
    Process(ProcessArgs),
    /// Show the effective categorization rules, in evaluation order.
    Rules {
        /// JSON rule file evaluated before the built-in rules
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Use only the rule file, without the built-in rules
        #[arg(long)]
        replace_defaults: bool,
    },
    /// Inspect or create the settings file.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print a shell completion script.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the settings in effect.
    Show,
    /// Write a settings file with every default spelled out.
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
    Table,
}

#[derive(Args)]
pub struct ProcessArgs {
    /// CSV, XLSX, XLS or ODS file to normalize
    pub file: PathBuf,
    /// How to read ambiguous dates such as 03/04/2024
    #[arg(long, value_enum)]
    pub locale: Option<DateLocale>,
    /// JSON rule file evaluated before the built-in rules
    #[arg(long)]
    pub rules: Option<PathBuf>,
    /// Stop at the first row that cannot be normalized
    #[arg(long)]
    pub fail_fast: bool,
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
    /// The source lists purchases as positive numbers
    #[arg(long)]
    pub charges_positive: bool,
    /// Worksheet to read (default: the first one)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Date column: header name or zero-based position
    #[arg(long)]
    pub date_column: Option<String>,
    /// Description column: header name or zero-based position
    #[arg(long)]
    pub description_column: Option<String>,
    /// Signed amount column: header name or zero-based position
    #[arg(long, conflicts_with_all = ["debit_column", "credit_column"])]
    pub amount_column: Option<String>,
    /// Debit column, used together with --credit-column
    #[arg(long, requires = "credit_column")]
    pub debit_column: Option<String>,
    /// Credit column, used together with --debit-column
    #[arg(long, requires = "debit_column")]
    pub credit_column: Option<String>,
    /// Worker threads (default from settings)
    #[arg(long)]
    pub workers: Option<usize>,
}
