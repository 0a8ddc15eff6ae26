//! Chunking and per-chunk sender counting

use futures::stream::{self, StreamExt};
use tracing::info;

use crate::client::{GmailClient, ProgressCallback};
use crate::fetcher::SenderFetcher;
use crate::models::{MessageRef, SenderCounts};

/// How a batch fetches its messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One message at a time, in list order
    Sequential,
    /// Up to `workers` fetches in flight, counted in completion order
    Parallel { workers: usize },
}

impl FetchMode {
    pub fn from_flag(parallel: bool, workers: usize) -> Self {
        if parallel {
            FetchMode::Parallel {
                workers: workers.max(1),
            }
        } else {
            FetchMode::Sequential
        }
    }
}

/// Split `messages` into contiguous chunks of `size`, numbered from 1
///
/// Concatenating the chunks in index order gives back `messages`.
pub fn chunk_messages(
    messages: &[MessageRef],
    size: usize,
) -> impl Iterator<Item = (usize, &[MessageRef])> {
    messages
        .chunks(size.max(1))
        .enumerate()
        .map(|(i, chunk)| (i + 1, chunk))
}

/// Number of chunks `chunk_messages` yields for `len` messages
pub fn chunk_count(len: usize, size: usize) -> usize {
    let size = size.max(1);
    (len + size - 1) / size
}

/// Turns a chunk of message ids into a sender tally
pub struct BatchProcessor<C> {
    fetcher: SenderFetcher<C>,
    sequential_every: usize,
    parallel_every: usize,
    on_progress: Option<ProgressCallback>,
}

impl<C: GmailClient> BatchProcessor<C> {
    pub fn new(fetcher: SenderFetcher<C>) -> Self {
        Self {
            fetcher,
            sequential_every: 1000,
            parallel_every: 100,
            on_progress: None,
        }
    }

    /// Log progress every `sequential` messages in sequential mode and every
    /// `parallel` completions in parallel mode
    pub fn with_progress_intervals(mut self, sequential: usize, parallel: usize) -> Self {
        self.sequential_every = sequential.max(1);
        self.parallel_every = parallel.max(1);
        self
    }

    /// Called once per processed message, whatever its outcome
    pub fn with_progress_callback(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn fetcher(&self) -> &SenderFetcher<C> {
        &self.fetcher
    }

    fn tick(&self) {
        if let Some(on_progress) = &self.on_progress {
            on_progress();
        }
    }

    /// Count senders over `messages`
    ///
    /// Messages whose sender cannot be fetched are skipped; they never abort
    /// the batch.
    pub async fn process_batch(&self, messages: &[MessageRef], mode: FetchMode) -> SenderCounts {
        match mode {
            FetchMode::Sequential => self.process_sequential(messages).await,
            FetchMode::Parallel { workers } => self.process_parallel(messages, workers).await,
        }
    }

    async fn process_sequential(&self, messages: &[MessageRef]) -> SenderCounts {
        let mut counts = SenderCounts::new();
        let total = messages.len();

        for (i, message) in messages.iter().enumerate() {
            if let Some(sender) = self.fetcher.fetch_sender(&message.id).await {
                counts.increment(&sender);
            }
            self.tick();

            let processed = i + 1;
            if processed % self.sequential_every == 0 {
                info!("Processed {}/{} messages...", processed, total);
            }
        }

        counts
    }

    async fn process_parallel(&self, messages: &[MessageRef], workers: usize) -> SenderCounts {
        let total = messages.len();

        // Results are folded by this task alone, so the tally needs no lock
        let mut results = stream::iter(messages)
            .map(|message| self.fetcher.fetch_sender(&message.id))
            .buffer_unordered(workers.max(1));

        let mut counts = SenderCounts::new();
        let mut completed = 0usize;
        while let Some(sender) = results.next().await {
            if let Some(sender) = sender {
                counts.increment(&sender);
            }
            self.tick();

            completed += 1;
            if completed % self.parallel_every == 0 {
                info!("Processed {}/{} messages...", completed, total);
            }
        }

        counts
    }
}
