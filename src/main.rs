use anyhow::Result;
use clap::Parser;
use gmail_top_senders::cli::{self, Cli};
use gmail_top_senders::config::Config;
use gmail_top_senders::report;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn buffer(&self) -> std::io::Result<MutexGuard<'_, Vec<u8>>> {
        self.buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer()?.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer()?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            // Logs go to stderr either way; stdout is reserved for the report
            if !msg.is_empty() {
                if self.multi.is_hidden() {
                    eprintln!("{}", msg);
                } else {
                    let _ = self.multi.println(msg);
                }
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl MultiProgressMakeWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self { multi }
    }
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: gmail-top-senders --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // On non-Windows platforms, use aws-lc-rs; on Windows, use ring
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_top_senders=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_top_senders=info,warn"))
    };

    let multi_progress = Arc::new(MultiProgress::new());
    let make_writer = MultiProgressMakeWriter::new(Arc::clone(&multi_progress));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    if cli.init_config {
        if cli.config.exists() {
            anyhow::bail!(
                "{:?} already exists; remove it first to generate a fresh example",
                cli.config
            );
        }
        Config::create_example(&cli.config).await?;
        println!("Example configuration written to {:?}", cli.config);
        return Ok(());
    }

    tracing::info!("Gmail sender inventory starting...");

    let outcome = cli::run_pipeline(&cli, (*multi_progress).clone()).await?;

    report::print_report(&outcome.totals, outcome.top_n);

    let summary = &outcome.report;
    let source = if summary.used_cached_totals {
        "cached totals".to_string()
    } else {
        format!(
            "{} messages in {} chunks ({} from cache)",
            summary.messages_listed, summary.chunks_total, summary.chunks_from_cache
        )
    };
    tracing::info!(
        "Done in {}s: {} senders from {}",
        summary.duration_seconds,
        summary.senders_found,
        source
    );

    Ok(())
}
