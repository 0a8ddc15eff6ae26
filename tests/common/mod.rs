//! Common test utilities and fixtures

#![allow(dead_code)]

use gmail_top_senders::batch::{BatchProcessor, FetchMode};
use gmail_top_senders::client::GmailClient;
use gmail_top_senders::error::{GmailError, Result};
use gmail_top_senders::fetcher::SenderFetcher;
use gmail_top_senders::models::{Header, MessagePage, MessageRef};
use gmail_top_senders::pipeline::{Pipeline, PipelineOptions};
use gmail_top_senders::retry::RetryPolicy;
use gmail_top_senders::CheckpointStore;
use mockall::mock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_messages_page(&self, page_token: Option<String>) -> Result<MessagePage>;
        async fn get_message_headers(&self, id: &str) -> Result<Vec<Header>>;
    }
}

/// What a fake mailbox answers for one message
#[derive(Debug, Clone)]
pub enum Fixture {
    From(String),
    /// Every fetch fails with a transient network error
    AlwaysTransient,
    /// The message has been deleted
    NotFound,
}

/// A mailbox served page by page, with call counters
pub struct Mailbox {
    pub messages: Vec<(String, Fixture)>,
    pub page_size: usize,
    pub list_calls: Arc<AtomicUsize>,
    pub get_calls: Arc<AtomicUsize>,
}

impl Mailbox {
    /// Messages `m0..` sent by the given From values
    pub fn from_senders(froms: &[&str]) -> Self {
        let messages = froms
            .iter()
            .enumerate()
            .map(|(i, from)| (format!("m{}", i), Fixture::From(from.to_string())))
            .collect();
        Self::new(messages)
    }

    pub fn new(messages: Vec<(String, Fixture)>) -> Self {
        Self {
            messages,
            page_size: 2,
            list_calls: Arc::new(AtomicUsize::new(0)),
            get_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// A mock client serving this mailbox
    pub fn client(&self) -> MockGmailClient {
        let mut client = MockGmailClient::new();

        let ids: Vec<String> = self.messages.iter().map(|(id, _)| id.clone()).collect();
        let page_size = self.page_size;
        let list_calls = Arc::clone(&self.list_calls);
        client
            .expect_list_messages_page()
            .returning(move |token| {
                list_calls.fetch_add(1, Ordering::SeqCst);
                let start: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
                let end = (start + page_size).min(ids.len());
                Ok(MessagePage {
                    messages: ids[start..end].iter().map(MessageRef::new).collect(),
                    next_page_token: (end < ids.len()).then(|| end.to_string()),
                })
            });

        let fixtures: HashMap<String, Fixture> = self.messages.iter().cloned().collect();
        let get_calls = Arc::clone(&self.get_calls);
        client
            .expect_get_message_headers()
            .returning(move |id| {
                get_calls.fetch_add(1, Ordering::SeqCst);
                match fixtures.get(id) {
                    Some(Fixture::From(from)) => Ok(vec![
                        Header::new("Subject", "hello"),
                        Header::new("From", from.clone()),
                    ]),
                    Some(Fixture::AlwaysTransient) => {
                        Err(GmailError::NetworkError("connection reset by peer".to_string()))
                    }
                    Some(Fixture::NotFound) | None => {
                        Err(GmailError::MessageNotFound(id.to_string()))
                    }
                }
            });

        client
    }
}

/// Retries with millisecond delays so tests stay fast
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_millis(1), 2.0)
}

/// Pipeline over a test client with explicit chunking and mode
pub fn pipeline<C: GmailClient, S: CheckpointStore>(
    client: C,
    store: S,
    chunk_size: usize,
    mode: FetchMode,
) -> Pipeline<C, S> {
    let processor = BatchProcessor::new(SenderFetcher::new(client, fast_policy()));
    let options = PipelineOptions {
        chunk_size,
        mode,
        list_progress_every: 2500,
    };
    Pipeline::new(processor, store, options)
}
