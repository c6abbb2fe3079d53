use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stemcell_fetch::resource::{self, CheckRequest, InRequest};
use stemcell_fetch::{BarProgress, FetchConfig, RetryPolicy, SilentProgress, StemcellClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stemcell-fetch")]
#[command(about = "Resolve and download BOSH stemcells from a bosh.io-style catalog", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Catalog base URL
    #[arg(long, global = true, default_value = "https://bosh.io")]
    catalog_url: String,

    /// Number of concurrent range requests
    #[arg(short, long, global = true, default_value_t = 10)]
    workers: usize,

    /// Wait between retries of failed connections (e.g. "30s", "5m")
    #[arg(long, global = true, value_parser = humantime::parse_duration, default_value = "5m")]
    retry_wait: Duration,

    /// Give up after this many retries instead of retrying forever
    #[arg(long, global = true)]
    max_retries: Option<usize>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List versions newer than or equal to the one given on stdin
    Check,
    /// Fetch the version given on stdin into a directory
    In {
        /// Destination directory
        destination: PathBuf,
    },
}

impl Args {
    fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            catalog_url: self.catalog_url.clone(),
            workers: self.workers,
            transport_retry: RetryPolicy {
                interval: self.retry_wait,
                max_attempts: self.max_retries,
            },
            truncation_retry: RetryPolicy {
                max_attempts: self.max_retries,
                ..defaults.truncation_retry
            },
            ..defaults
        }
    }
}

fn read_request<T: serde::de::DeserializeOwned>() -> anyhow::Result<T> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed reading json")?;
    serde_json::from_str(&raw).context("failed unmarshalling")
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.fetch_config();

    match args.command {
        Command::Check => {
            let request: CheckRequest = read_request()?;
            let client = StemcellClient::new(config, Arc::new(SilentProgress::default()))?;
            let versions = resource::check(&client, &request)
                .await
                .context("failed checking for versions")?;
            println!("{}", serde_json::to_string(&versions)?);
        }
        Command::In { destination } => {
            let request: InRequest = read_request()?;
            std::fs::create_dir_all(&destination).with_context(|| {
                format!("failed creating destination {}", destination.display())
            })?;
            let client = StemcellClient::new(config, Arc::new(BarProgress::new()))?;
            let response = resource::fetch_into(&client, &request, &destination)
                .await
                .with_context(|| format!("failed fetching version {}", request.version.version))?;
            info!("✅ Stemcell {} fetched", response.version.version);
            println!("{}", serde_json::to_string(&response)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // stdout carries the JSON response, so logs go to stderr
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stemcell_fetch={}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}
