//! `resources` command: print the catalog

use anyhow::Result;
use colored::*;

use crate::api::{PaginationMode, PayloadLocation, Resource};

pub fn handle_resources_command() -> Result<()> {
    println!("{}", "Supported resources:".bold());
    for resource in Resource::all() {
        let mode = match resource.strategy.pagination() {
            PaginationMode::Offset => "offset",
            PaginationMode::IdBased => "id-based",
        };
        let payload = match resource.strategy.payload() {
            PayloadLocation::Root => String::new(),
            PayloadLocation::Key(key) => format!(" [{}]", key),
        };
        println!(
            "  {:<14} {:<32} {}{}",
            resource.name.bright_green(),
            resource.list_method,
            mode.dimmed(),
            payload.dimmed()
        );
    }
    Ok(())
}
