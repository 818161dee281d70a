//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use image_archiver_core::download::MAX_SNIFF_BYTES;

/// Download images referenced by archived stories.
///
/// Each image is saved under the output directory at a path derived from its
/// URL, with the extension corrected to match the detected image encoding.
#[derive(Parser, Debug)]
#[command(name = "image-archiver")]
#[command(author, version, about)]
pub struct Args {
    /// Image URLs to download (read from stdin when omitted)
    pub urls: Vec<String>,

    /// Destination root for downloaded images
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// HTTP read timeout in seconds, per read rather than per download (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Leading bytes gathered before detecting the image type (0 = first chunk only)
    #[arg(long, value_parser = parse_sniff_bytes)]
    pub sniff_bytes: Option<usize>,

    /// Print one JSON record per downloaded image instead of the bare path
    #[arg(long)]
    pub json: bool,
}

fn parse_sniff_bytes(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a non-negative integer"))?;
    if value > MAX_SNIFF_BYTES {
        return Err(format!("must be at most {MAX_SNIFF_BYTES}"));
    }
    Ok(value)
}
