pub mod handler;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ListCommands {
    /// Resource name (see `portal-batch resources`)
    pub resource: String,

    /// Filter as a JSON object, e.g. '{">ID": 100, "ACTIVE": "Y"}'
    #[arg(long)]
    pub filter: Option<String>,

    /// Order as a JSON object, e.g. '{"ID": "DESC"}'
    #[arg(long)]
    pub order: Option<String>,

    /// Comma-separated fields to select
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Stop after this many items
    #[arg(long)]
    pub limit: Option<usize>,

    /// Extra method parameter, repeatable (e.g. --param IBLOCK_ID=7)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "json-lines")]
    pub format: OutputFormat,

    /// Write items to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print timing and counts to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One compact JSON object per line
    JsonLines,
    /// A single pretty-printed JSON array
    Json,
}
