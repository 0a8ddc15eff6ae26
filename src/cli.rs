//! Command-line interface

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::CredentialStore;
use crate::cache::FsStore;
use crate::client::ProductionGmailClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::SenderCounts;
use crate::pipeline::{Pipeline, RunReport};

#[derive(Parser, Debug)]
#[command(name = "gmail-top-senders")]
#[command(version)]
#[command(about = "Parses your Gmail inbox and prints the senders that email you most", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file [default: from config]
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Path to token cache file [default: from config]
    #[arg(long)]
    pub token_cache: Option<PathBuf>,

    /// Directory holding the message list and sender tallies [default: from config]
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Ignore cached results and refetch everything, overwriting the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Number of senders to output [default: from config, 20]
    #[arg(long, value_name = "N")]
    pub top_n_senders: Option<usize>,

    /// Fetch message metadata with a bounded pool of concurrent requests
    #[arg(long)]
    pub multithreaded: bool,

    /// Concurrent requests in multithreaded mode [default: from config, 6]
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Messages per cached chunk [default: from config, 10000]
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Write an example configuration file to --config and exit
    #[arg(long)]
    pub init_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Command-line values win over the config file
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.credentials {
            config.auth.credentials_path = path.clone();
        }
        if let Some(path) = &self.token_cache {
            config.auth.token_path = path.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = dir.clone();
        }
        if let Some(n) = self.top_n_senders {
            config.report.top_n = n;
        }
        if let Some(workers) = self.workers {
            config.fetch.max_workers = workers;
        }
        if let Some(size) = self.chunk_size {
            config.fetch.chunk_size = size;
        }
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(MultiProgress::new())
    }
}

/// Sender totals of a run plus what the CLI needs to print them
#[derive(Debug)]
pub struct RunOutcome {
    pub totals: SenderCounts,
    pub report: RunReport,
    pub top_n: usize,
}

/// Config file with command-line overrides applied, validated once
pub async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config).await?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Load config, authenticate, and run the pipeline against live Gmail
pub async fn run_pipeline(cli: &Cli, multi: MultiProgress) -> Result<RunOutcome> {
    let reporter = ProgressReporter::new(multi);

    let config_spinner = reporter.add_spinner("Loading configuration...");
    let config = match load_config(cli).await {
        Ok(config) => config,
        Err(e) => {
            config_spinner.finish_and_clear();
            return Err(e);
        }
    };
    reporter.finish_spinner(&config_spinner, &format!("Configuration loaded from {:?}", cli.config));

    let auth_spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let credentials = CredentialStore::new(
        &config.auth.credentials_path,
        &config.auth.token_path,
        config.auth.redirect_port,
    );
    let hub = match credentials.ensure_valid().await {
        Ok(hub) => hub,
        Err(e) => {
            auth_spinner.finish_and_clear();
            return Err(e);
        }
    };
    reporter.finish_spinner(&auth_spinner, "Gmail API authenticated successfully");

    let client = ProductionGmailClient::new(hub, config.fetch.max_workers, config.fetch.page_size);
    let store = FsStore::new(&config.cache.dir);

    let fetch_bar = reporter.add_progress_bar(0, "Fetching senders...");
    let pipeline = Pipeline::from_config(client, store, &config, cli.multithreaded)
        .with_progress_bar(fetch_bar.clone());

    let (totals, report) = pipeline.run(!cli.no_cache).await;
    fetch_bar.finish_and_clear();

    if let Some(e) = &report.listing_error {
        tracing::warn!("Could not list messages: {}", e);
    }

    Ok(RunOutcome {
        totals,
        report,
        top_n: config.report.top_n,
    })
}
