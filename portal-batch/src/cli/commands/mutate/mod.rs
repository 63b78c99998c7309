pub mod handler;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct MutateCommands {
    /// Resource name (see `portal-batch resources`)
    pub resource: String,

    /// JSON file with the items
    #[arg(short, long)]
    pub file: PathBuf,

    /// Split inputs larger than one batch into sequential calls
    #[arg(long)]
    pub sequential: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Add,
    Update,
    Delete,
}
