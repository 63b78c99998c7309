//! Command-line surface

pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{BatchClient, HttpTransport};
use crate::config::Config;
use commands::list::ListCommands;
use commands::mutate::{MutateCommands, MutationOp};

#[derive(Parser, Debug)]
#[command(name = "portal-batch", version, about = "Batched listing and mutation for portal REST APIs")]
pub struct Cli {
    /// Config file (defaults to <config dir>/portal-batch/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream every item of a resource as JSON
    List(ListCommands),
    /// Add items from a JSON array
    Add(MutateCommands),
    /// Update items from a JSON object keyed by item id
    Update(MutateCommands),
    /// Delete items from a JSON array
    Delete(MutateCommands),
    /// Show the supported resources
    Resources,
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resources => commands::resources::handle_resources_command(),
        Commands::List(args) => {
            let client = build_client(cli.config.as_deref())?;
            commands::list::handler::handle_list_command(&client, args).await
        }
        Commands::Add(args) => {
            let client = build_client(cli.config.as_deref())?;
            commands::mutate::handler::handle_mutate_command(&client, MutationOp::Add, args).await
        }
        Commands::Update(args) => {
            let client = build_client(cli.config.as_deref())?;
            commands::mutate::handler::handle_mutate_command(&client, MutationOp::Update, args).await
        }
        Commands::Delete(args) => {
            let client = build_client(cli.config.as_deref())?;
            commands::mutate::handler::handle_mutate_command(&client, MutationOp::Delete, args).await
        }
    }
}

fn build_client(config_path: Option<&std::path::Path>) -> Result<BatchClient> {
    let config = Config::load(config_path)?;
    let transport = HttpTransport::from_config(&config)?;
    Ok(BatchClient::new(Arc::new(transport)).with_options(config.batch))
}
