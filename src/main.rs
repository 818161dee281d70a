//! CLI entry point for the image archiver.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use image_archiver_core::{
    DownloadOptions, FileConfig, HttpClient, VerbositySetting, load_default_file_config,
};
use tracing::{debug, error, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let loaded_config = load_default_file_config()?;
    let file_config = loaded_config.config.unwrap_or_default();

    init_tracing(&args, file_config.verbosity);

    debug!(?args, config_path = ?loaded_config.path, "CLI arguments parsed");

    let urls = read_urls(&args)?;
    if urls.is_empty() {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        return Ok(ExitCode::SUCCESS);
    }

    let options = resolve_options(&args, &file_config);
    let client = HttpClient::with_options(options)?;
    let output_dir = args
        .output_dir
        .clone()
        .or(file_config.output_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    info!(urls = urls.len(), output_dir = %output_dir.display(), "Archiving images");

    let mut completed = 0usize;
    let mut failed = 0usize;

    // One failing image never aborts the batch: log it and move on.
    for url in &urls {
        match client.download_image_with_metadata(url, &output_dir).await {
            Ok(download) => {
                completed += 1;
                if args.json {
                    println!("{}", serde_json::to_string(&download)?);
                } else {
                    println!("{}", download.path.display());
                }
            }
            Err(err) => {
                failed += 1;
                error!(url = %url, kind = err.kind().as_str(), error = %err, "Unable to download image");
            }
        }
    }

    info!(completed, failed, total = urls.len(), "Finished archiving images");

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

/// Priority: `RUST_LOG` > quiet flag > verbose flag > config verbosity > info.
fn init_tracing(args: &Args, config_verbosity: Option<VerbositySetting>) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => config_verbosity.map_or("info", VerbositySetting::log_level),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn resolve_options(args: &Args, file_config: &FileConfig) -> DownloadOptions {
    let base = file_config.apply_to(DownloadOptions::default());
    DownloadOptions {
        connect_timeout_secs: args.connect_timeout.unwrap_or(base.connect_timeout_secs),
        read_timeout_secs: args.read_timeout.unwrap_or(base.read_timeout_secs),
        sniff_bytes: args.sniff_bytes.unwrap_or(base.sniff_bytes),
    }
}

fn read_urls(args: &Args) -> Result<Vec<String>> {
    if !args.urls.is_empty() {
        return Ok(args.urls.clone());
    }
    if io::stdin().is_terminal() {
        return Ok(Vec::new());
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer.split_whitespace().map(str::to_string).collect())
}
