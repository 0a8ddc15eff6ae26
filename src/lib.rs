//! Gmail Top Senders
//!
//! Inventories a Gmail mailbox: lists every message, looks up each
//! message's `From` header, tallies sender addresses and reports the most
//! frequent ones.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 installed flow with an on-disk token cache
//! - **Listing**: paginated walk over `users.messages.list`
//! - **Fetching**: metadata-only lookups with exponential-backoff retries,
//!   sequential or through a bounded pool of concurrent requests
//! - **Checkpointing**: the message list and one tally per chunk of
//!   messages are cached, so an interrupted run resumes at the last chunk
//! - **Reporting**: chunk tallies are summed, sorted and truncated to top N
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_top_senders::{
//!     auth::CredentialStore, cache::FsStore, client::ProductionGmailClient,
//!     config::Config, pipeline::Pipeline, report,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     config.validate()?;
//!
//!     let hub = CredentialStore::new(
//!         &config.auth.credentials_path,
//!         &config.auth.token_path,
//!         config.auth.redirect_port,
//!     )
//!     .ensure_valid()
//!     .await?;
//!
//!     let client = ProductionGmailClient::new(hub, config.fetch.max_workers, config.fetch.page_size);
//!     let pipeline = Pipeline::from_config(client, FsStore::new(&config.cache.dir), &config, true);
//!
//!     let (totals, _run) = pipeline.run(true).await;
//!     report::print_report(&totals, config.report.top_n);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 credential store and Gmail hub initialization
//! - [`batch`] - Chunking and per-chunk sender counting
//! - [`cache`] - Key-value checkpoint stores and the typed blob cache
//! - [`cli`] - Command-line interface
//! - [`client`] - Gmail API client trait and production implementation
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`fetcher`] - Sender lookup and `From` header parsing
//! - [`lister`] - Paginated message listing
//! - [`models`] - Core data structures
//! - [`pipeline`] - Fetch-and-cache orchestration
//! - [`report`] - Aggregation and top-N report
//! - [`retry`] - Retry policy with exponential backoff

pub mod auth;
pub mod batch;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod lister;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod retry;

// Re-export commonly used types for convenience
pub use error::{GmailError, Result};

// Core data models
pub use models::{Header, MessageList, MessagePage, MessageRef, SenderCount, SenderCounts};

// Storage
pub use cache::{BlobCache, CheckpointStore, FsStore, MemoryStore};

// Client traits
pub use client::{GmailClient, ProductionGmailClient};

// Pipeline pieces
pub use batch::{BatchProcessor, FetchMode};
pub use fetcher::{extract_sender_email, SenderFetcher};
pub use pipeline::{Pipeline, PipelineOptions, RunReport};
pub use retry::RetryPolicy;

// Config types
pub use config::Config;

// CLI types (for binary usage)
pub use cli::{Cli, ProgressReporter};
