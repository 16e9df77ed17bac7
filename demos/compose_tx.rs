use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::prelude::*;

use utxo_composer::{compose, ComposeRequest};

#[derive(Parser, Debug)]
#[clap(version)]
pub struct Cli {
    /// path to a JSON compose request
    #[clap(long, value_parser)]
    request_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer();
    tracing_subscriber::registry().with(fmt_layer).init();

    let Cli { request_path } = Cli::parse();

    tracing::info!("Request file {:?}", request_path);
    let file = File::open(&request_path).with_context(|| {
        format!(
            "Cannot read request file {path}",
            path = request_path.display()
        )
    })?;
    let request: ComposeRequest = serde_json::from_reader(file).with_context(|| {
        format!(
            "Cannot parse request file {path}",
            path = request_path.display()
        )
    })?;

    let result = compose(&request)?;

    tracing::info!("Fee: {}", result.fee);
    tracing::info!("Total spent: {}", result.total_spent);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
