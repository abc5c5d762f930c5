use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hot_media::config::{self, LoadOptions};
use hot_media::Pipeline;

/// Collect direct image links from a community's hot posts.
#[derive(Debug, Parser)]
#[command(name = "hot-media", version)]
struct Cli {
    /// Community url, e.g. https://www.reddit.com/r/EarthPorn/
    community_url: String,

    /// Number of hot posts to request (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=100))]
    limit: Option<u32>,

    /// Config file (defaults to <config dir>/hot-media/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hot_media={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cfg = config::load(LoadOptions {
        config_file: cli.config,
        env_prefix: None,
    })?;
    let limit = cli.limit.unwrap_or(cfg.media.default_limit);

    let pipeline = Pipeline::new(&cfg).context("failed to set up reddit client")?;
    let images = pipeline.images(&cli.community_url, limit)?;

    if cli.json {
        let out = serde_json::to_string_pretty(&images).context("failed to encode result")?;
        println!("{out}");
    } else if images.is_empty() {
        println!("no qualifying images");
    } else {
        for post in &images {
            println!("{}\t{}", post.media_url, post.title);
        }
    }
    Ok(())
}
