//! Fetch-and-cache pipeline from message list to sender totals

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::batch::{chunk_count, chunk_messages, BatchProcessor, FetchMode};
use crate::cache::{chunk_key, BlobCache, CheckpointStore, MESSAGES_KEY, SENDER_COUNTS_KEY};
use crate::client::{GmailClient, ProgressCallback};
use crate::config::Config;
use crate::fetcher::SenderFetcher;
use crate::lister::list_all;
use crate::models::{MessageList, SenderCounts};
use crate::report::aggregate;

/// Key of the chunk layout the cached chunk tallies were built with
pub const MANIFEST_KEY: &str = "senders_count/manifest";

/// Layout of the cached chunks
///
/// Chunk tallies are only reusable if they were cut from the same list with
/// the same chunk size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub chunk_size: usize,
    pub message_count: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub chunk_size: usize,
    pub mode: FetchMode,
    pub list_progress_every: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            mode: FetchMode::Sequential,
            list_progress_every: 2500,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config, parallel: bool) -> Self {
        Self {
            chunk_size: config.fetch.chunk_size,
            mode: FetchMode::from_flag(parallel, config.fetch.max_workers),
            list_progress_every: config.progress.list_every,
        }
    }
}

/// What one pipeline run did
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub used_cached_totals: bool,
    pub messages_listed: usize,
    pub chunks_total: usize,
    pub chunks_from_cache: usize,
    pub senders_found: usize,
    /// Set when listing failed and the run produced no totals
    pub listing_error: Option<String>,
}

impl RunReport {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            duration_seconds: 0,
            used_cached_totals: false,
            messages_listed: 0,
            chunks_total: 0,
            chunks_from_cache: 0,
            senders_found: 0,
            listing_error: None,
        }
    }

    fn finish(mut self, totals: &SenderCounts) -> Self {
        self.senders_found = totals.len();
        self.duration_seconds = (Utc::now() - self.started_at).num_seconds();
        self
    }
}

/// Lists the mailbox, tallies senders chunk by chunk and caches every step
pub struct Pipeline<C, S> {
    processor: BatchProcessor<C>,
    cache: BlobCache<S>,
    options: PipelineOptions,
    progress: Option<ProgressBar>,
}

impl<C, S> Pipeline<C, S>
where
    C: GmailClient,
    S: CheckpointStore,
{
    pub fn new(processor: BatchProcessor<C>, store: S, options: PipelineOptions) -> Self {
        Self {
            processor,
            cache: BlobCache::new(store),
            options,
            progress: None,
        }
    }

    /// Build the whole stack from configuration
    pub fn from_config(client: C, store: S, config: &Config, parallel: bool) -> Self {
        let fetcher = SenderFetcher::new(client, config.fetch.retry_policy());
        let processor = BatchProcessor::new(fetcher).with_progress_intervals(
            config.progress.sequential_every,
            config.progress.parallel_every,
        );
        Self::new(processor, store, PipelineOptions::from_config(config, parallel))
    }

    /// Advance `bar` once per fetched message
    ///
    /// Its length is set to the number of messages that actually need
    /// fetching once the cached chunks are known.
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        let ticker = bar.clone();
        let callback: ProgressCallback = Arc::new(move || ticker.inc(1));
        self.processor = self.processor.with_progress_callback(callback);
        self.progress = Some(bar);
        self
    }

    pub fn cache(&self) -> &BlobCache<S> {
        &self.cache
    }

    /// Produce sender totals, reusing cached work unless `use_cache` is off
    ///
    /// With `use_cache` off every cached entry is ignored and overwritten.
    /// A listing failure yields empty totals and leaves the cache untouched.
    pub async fn run(&self, use_cache: bool) -> (SenderCounts, RunReport) {
        let mut report = RunReport::start();

        if use_cache {
            let totals: SenderCounts = self.cache.read(SENDER_COUNTS_KEY).await;
            if !totals.is_empty() {
                info!("Using cached sender totals ({} senders)", totals.len());
                report.used_cached_totals = true;
                return (totals.clone(), report.finish(&totals));
            }
        }

        let messages = match self.message_list(use_cache).await {
            Ok(messages) => messages,
            Err(e) => {
                report.listing_error = Some(e);
                let totals = SenderCounts::new();
                return (totals.clone(), report.finish(&totals));
            }
        };
        report.messages_listed = messages.len();

        let totals = self.count_chunks(&messages, use_cache, &mut report).await;

        info!("Found {} senders! Writing to local cache...", totals.len());
        self.cache.write(SENDER_COUNTS_KEY, &totals).await;

        let report = report.finish(&totals);
        (totals, report)
    }

    /// Cached message list, or a fresh listing that is then cached
    async fn message_list(&self, use_cache: bool) -> std::result::Result<MessageList, String> {
        if use_cache {
            let cached: MessageList = self.cache.read(MESSAGES_KEY).await;
            if !cached.is_empty() {
                info!("Using cached message list ({} messages)", cached.len());
                return Ok(cached);
            }
        }

        let client = self.processor.fetcher().client();
        let listing = list_all(client, self.options.list_progress_every).await;
        if let Some(e) = listing.error {
            warn!(
                "Listing stopped after {} messages; nothing to report",
                listing.messages.len()
            );
            return Err(e.to_string());
        }

        self.cache.write(MESSAGES_KEY, &listing.messages).await;
        Ok(listing.messages)
    }

    /// Remove chunk tallies `1..=count`, `false` if any removal failed
    async fn clear_chunks(&self, count: usize) -> bool {
        let mut cleared = true;
        for index in 1..=count {
            let key = chunk_key(index);
            if let Err(e) = self.cache.store().remove(&key).await {
                error!("Failed to remove stale chunk {}: {}", key, e);
                cleared = false;
            }
        }
        cleared
    }

    async fn count_chunks(
        &self,
        messages: &MessageList,
        use_cache: bool,
        report: &mut RunReport,
    ) -> SenderCounts {
        let chunk_size = self.options.chunk_size;
        report.chunks_total = chunk_count(messages.len(), chunk_size);

        let manifest = ChunkManifest {
            chunk_size,
            message_count: messages.len(),
        };
        let cached_manifest: ChunkManifest = self.cache.read(MANIFEST_KEY).await;
        let reuse_chunks = use_cache && cached_manifest == manifest;
        if !reuse_chunks {
            if use_cache && cached_manifest != ChunkManifest::default() {
                warn!(
                    "Cached chunks were built for {} messages in chunks of {}; recounting",
                    cached_manifest.message_count, cached_manifest.chunk_size
                );
            }
            // Old chunks must be gone before the new manifest vouches for
            // whatever chunk files exist
            let stale = chunk_count(cached_manifest.message_count, cached_manifest.chunk_size)
                .max(report.chunks_total);
            if self.clear_chunks(stale).await {
                self.cache.write(MANIFEST_KEY, &manifest).await;
            } else {
                self.cache.invalidate(MANIFEST_KEY).await;
            }
        }

        // Load what is cached first so the progress bar only covers real work
        let mut chunk_totals = Vec::with_capacity(report.chunks_total);
        let mut to_fetch = 0u64;
        for (index, chunk) in chunk_messages(messages, chunk_size) {
            let cached: SenderCounts = if reuse_chunks {
                self.cache.read(&chunk_key(index)).await
            } else {
                SenderCounts::new()
            };
            if cached.is_empty() {
                to_fetch += chunk.len() as u64;
                chunk_totals.push((index, chunk, None));
            } else {
                report.chunks_from_cache += 1;
                chunk_totals.push((index, chunk, Some(cached)));
            }
        }

        if let Some(bar) = &self.progress {
            bar.set_length(to_fetch);
        }

        let mut chunk_maps = Vec::with_capacity(chunk_totals.len());
        for (index, chunk, cached) in chunk_totals {
            let counts = match cached {
                Some(counts) => counts,
                None => {
                    info!(
                        "Processing chunk {}/{} ({} messages)",
                        index,
                        report.chunks_total,
                        chunk.len()
                    );
                    let counts = self.processor.process_batch(chunk, self.options.mode).await;
                    self.cache.write(&chunk_key(index), &counts).await;
                    counts
                }
            };
            chunk_maps.push(counts);
        }
        let totals = aggregate(&chunk_maps);

        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }

        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    #[test]
    fn test_pipeline_options_from_config() {
        let mut config = Config::default();
        config.fetch.chunk_size = 250;
        config.fetch.max_workers = 8;

        let options = PipelineOptions::from_config(&config, true);
        assert_eq!(options.chunk_size, 250);
        assert_eq!(options.mode, FetchMode::Parallel { workers: 8 });
        assert_eq!(options.list_progress_every, 2500);

        let options = PipelineOptions::from_config(&config, false);
        assert_eq!(options.mode, FetchMode::Sequential);
    }

    #[tokio::test]
    async fn test_manifest_roundtrip_through_cache() {
        let cache = BlobCache::new(MemoryStore::new());
        let manifest = ChunkManifest {
            chunk_size: 3,
            message_count: 7,
        };
        cache.write(MANIFEST_KEY, &manifest).await;
        let loaded: ChunkManifest = cache.read(MANIFEST_KEY).await;
        assert_eq!(loaded, manifest);
    }
}
