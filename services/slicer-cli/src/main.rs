//! Command-line front end for datacube slicing.
//!
//! Reads a document describing a datacube, its axis options and a request,
//! extracts the request and prints the resulting index tree as JSON.

mod document;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use datacube_slicer::{Datacube, EngineConfig, Request, Retriever};
use document::{LoadedDatacube, SliceDocument};

#[derive(Parser, Debug)]
#[command(name = "slicer-cli")]
#[command(about = "Extract polytope requests from a datacube")]
struct Args {
    /// Request document (.yaml, .yml or .json)
    #[arg(short, long)]
    request: PathBuf,

    /// Print the tree in storage keys instead of request coordinates
    #[arg(long)]
    storage_keys: bool,

    /// Slice only; do not fill leaf values
    #[arg(long)]
    no_values: bool,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "SLICER_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let document = SliceDocument::from_file(&args.request)?;
    let config = document.engine_config();
    info!(
        request = %args.request.display(),
        shapes = document.shapes.shapes().len(),
        parallel = config.parallel,
        "Loaded request document"
    );

    let output = match document.build_datacube()? {
        LoadedDatacube::Mock(datacube) => run(datacube, config, &document.shapes, &args)?,
        LoadedDatacube::Array(datacube) => run(datacube, config, &document.shapes, &args)?,
    };

    let text = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays a single JSON document.
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn run<D: Datacube>(
    datacube: D,
    config: EngineConfig,
    request: &Request,
    args: &Args,
) -> Result<serde_json::Value> {
    let retriever = Retriever::new(datacube, config).context("Invalid engine configuration")?;

    let tree = if args.no_values {
        retriever.slice(request.polytopes()?)?
    } else {
        retriever.retrieve(request)?
    };
    tree.pprint();

    let leaves = tree.leaves().len();
    let tree = if args.storage_keys {
        retriever.storage_tree(&tree)?
    } else {
        tree
    };

    Ok(json!({
        "leaves": leaves,
        "tree": tree.to_json(),
    }))
}
