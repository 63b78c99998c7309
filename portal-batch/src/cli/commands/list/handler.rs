//! List command handler

use anyhow::{Context, Result, bail};
use colored::*;
use futures::StreamExt;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Instant;

use super::{ListCommands, OutputFormat};
use crate::api::{BatchClient, ListRequest, ParamValue, Parameters};
use crate::cli::commands::{parse_json, resolve_resource};

pub async fn handle_list_command(client: &BatchClient, args: ListCommands) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let resource = resolve_resource(&args.resource)?;
    let request = build_request(&args)?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let started = Instant::now();
    let mut stream = std::pin::pin!(client.list(&resource, request).into_stream());
    let mut collected = Vec::new();
    let mut count = 0usize;
    while let Some(item) = stream.next().await {
        let item = item.with_context(|| format!("Listing {} failed after {} items", resource.name, count))?;
        count += 1;
        match args.format {
            OutputFormat::JsonLines => {
                writeln!(out, "{}", serde_json::to_string(&item)?)?;
            }
            OutputFormat::Json => collected.push(item),
        }
    }
    if args.format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(&Value::Array(collected))?)?;
    }
    out.flush().context("Failed to write output")?;

    if args.verbose {
        eprintln!(
            "Fetched {} {} in {:.2}ms",
            count.to_string().bright_green(),
            resource.name,
            started.elapsed().as_secs_f64() * 1000.0
        );
        if let Some(path) = &args.output {
            eprintln!("Results saved to: {}", path.display().to_string().bright_green());
        }
    }
    Ok(())
}

fn build_request(args: &ListCommands) -> Result<ListRequest> {
    let mut request = ListRequest::new().select(args.select.iter().cloned());
    if let Some(filter) = &args.filter {
        request.filter = json_object(filter, "--filter")?;
    }
    if let Some(order) = &args.order {
        request.order = json_object(order, "--order")?;
    }
    if let Some(limit) = args.limit {
        request = request.limit(limit);
    }
    for param in &args.params {
        let (key, value) = parse_param(param)?;
        request.extra.insert(key, value);
    }
    Ok(request)
}

fn json_object(text: &str, what: &str) -> Result<Parameters> {
    match Parameters::from_json(parse_json(text, what)?) {
        Some(params) => Ok(params),
        None => bail!("{} must be a JSON object", what),
    }
}

/// `KEY=VALUE`; the value is read as JSON when it parses, otherwise as a string
pub fn parse_param(param: &str) -> Result<(String, ParamValue)> {
    let Some((key, value)) = param.split_once('=') else {
        bail!("Invalid --param '{}', expected KEY=VALUE", param);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid --param '{}', key is empty", param);
    }
    let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), ParamValue::from(value)))
}
