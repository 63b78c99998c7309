//! Add / update / delete command handler

use anyhow::{Context, Result, bail};
use colored::*;
use serde_json::Value;
use std::fs;

use super::{MutateCommands, MutationOp};
use crate::api::{BatchClient, CommandResult, ItemKey, MutationChunking};
use crate::cli::commands::{parse_json, resolve_resource};
use crate::error::BatchError;

pub async fn handle_mutate_command(
    client: &BatchClient,
    op: MutationOp,
    args: MutateCommands,
) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let resource = resolve_resource(&args.resource)?;
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read items file: {}", args.file.display()))?;
    let items = parse_json(&content, &args.file.display().to_string())?;

    let client = if args.sequential {
        let mut options = *client.options();
        options.mutation_chunking = MutationChunking::Sequential;
        client.clone().with_options(options)
    } else {
        client.clone()
    };

    let outcome = match op {
        MutationOp::Add => client.add(&resource, array_items(items)?).await,
        MutationOp::Update => client.update(&resource, keyed_items(items)?).await,
        MutationOp::Delete => client.delete(&resource, array_items(items)?).await,
    };
    let results = match outcome {
        Ok(results) => results,
        Err(BatchError::PartiallyApplied { applied, source }) => {
            // Earlier calls went through; show what the portal already has
            print_results(applied);
            return Err(anyhow::Error::new(*source)).with_context(|| {
                format!("Batch {:?} on {} stopped part way", op, resource.name)
            });
        }
        Err(error) => {
            return Err(error)
                .with_context(|| format!("Batch {:?} on {} failed", op, resource.name));
        }
    };

    let failed = print_results(results);
    if failed > 0 {
        bail!("{} item(s) failed", failed);
    }
    Ok(())
}

fn array_items(items: Value) -> Result<Vec<Value>> {
    match items {
        Value::Array(items) => Ok(items),
        _ => bail!("Items file must contain a JSON array"),
    }
}

/// Update input is an object keyed by item id
fn keyed_items(items: Value) -> Result<Vec<(ItemKey, Value)>> {
    match items {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, item)| (ItemKey::from_map_key(&key), item))
            .collect()),
        _ => bail!("Update items file must contain a JSON object keyed by item id"),
    }
}

fn print_results(results: impl IntoIterator<Item = (ItemKey, CommandResult)>) -> usize {
    let mut failed = 0;
    let mut total = 0;
    for (key, result) in results {
        total += 1;
        if result.is_success() {
            let data = result.data.map(|d| d.to_string()).unwrap_or_default();
            println!("{} {} {}", "✓".green(), key, data.dimmed());
        } else {
            failed += 1;
            println!(
                "{} {} {}",
                "✗".red(),
                key,
                result.error.unwrap_or_default().red()
            );
        }
    }
    println!(
        "{} succeeded, {} failed",
        (total - failed).to_string().bright_green(),
        failed.to_string().bright_red()
    );
    failed
}
