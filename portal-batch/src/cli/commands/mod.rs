pub mod list;
pub mod mutate;
pub mod resources;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::api::Resource;

/// Catalog lookup with a hint listing the valid names
pub fn resolve_resource(name: &str) -> Result<Resource> {
    match Resource::by_name(name) {
        Some(resource) => Ok(resource),
        None => bail!(
            "Unknown resource '{}'. Available: {}",
            name,
            Resource::all_names().join(", ")
        ),
    }
}

pub fn parse_json(text: &str, what: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("Failed to parse {} as JSON", what))
}
