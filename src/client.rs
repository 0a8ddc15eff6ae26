//! Gmail API client seam

use async_trait::async_trait;
use google_gmail1::api::Message;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::auth::{GmailHub, READONLY_SCOPES};
use crate::error::{GmailError, Result};
use crate::models::{Header, MessagePage, MessageRef};

/// Progress callback type for batch operations
pub type ProgressCallback = Arc<dyn Fn() + Send + Sync>;

/// The two Gmail calls the sender inventory needs
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// Fetch one page of message ids, continuing from `page_token`
    async fn list_messages_page(&self, page_token: Option<String>) -> Result<MessagePage>;

    /// Fetch the metadata headers of a single message
    async fn get_message_headers(&self, id: &str) -> Result<Vec<Header>>;
}

/// Gmail client over the `google-gmail1` hub
///
/// A semaphore caps the number of requests in flight regardless of how many
/// fetches callers schedule at once.
pub struct ProductionGmailClient {
    hub: GmailHub,
    rate_limiter: Arc<Semaphore>,
    page_size: u32,
}

impl ProductionGmailClient {
    /// Create a new production Gmail client
    ///
    /// # Arguments
    /// * `hub` - Gmail API hub instance
    /// * `max_concurrent` - Maximum concurrent requests
    /// * `page_size` - Message ids requested per list call (at most 500)
    pub fn new(hub: GmailHub, max_concurrent: usize, page_size: u32) -> Self {
        Self {
            hub,
            rate_limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
            page_size,
        }
    }

    async fn acquire_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.rate_limiter
            .acquire()
            .await
            .map_err(|e| GmailError::ApiError(format!("Request limiter closed: {}", e)))
    }
}

/// Pull `(name, value)` header pairs out of a metadata-format message
fn message_headers(msg: Message) -> Vec<Header> {
    msg.payload
        .and_then(|p| p.headers)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|h| match (h.name, h.value) {
            (Some(name), Some(value)) => Some(Header { name, value }),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_messages_page(&self, page_token: Option<String>) -> Result<MessagePage> {
        let _permit = self.acquire_permit().await?;

        let mut call = self
            .hub
            .users()
            .messages_list("me")
            .max_results(self.page_size);

        if let Some(token) = page_token.as_ref() {
            call = call.page_token(token);
        }

        let (_, response) = call.add_scope(READONLY_SCOPES[0]).doit().await?;

        let messages = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                m.id.map(|id| MessageRef {
                    id,
                    thread_id: m.thread_id,
                })
            })
            .collect::<Vec<_>>();

        debug!(
            "Listed page of {} messages (more: {})",
            messages.len(),
            response.next_page_token.is_some()
        );

        Ok(MessagePage {
            messages,
            next_page_token: response.next_page_token,
        })
    }

    async fn get_message_headers(&self, id: &str) -> Result<Vec<Header>> {
        let _permit = self.acquire_permit().await?;

        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", id)
            .format("metadata")
            .add_metadata_headers("From")
            .add_scope(READONLY_SCOPES[0])
            .doit()
            .await?;

        Ok(message_headers(msg))
    }
}

// Implement GmailClient for Arc<T> to allow shared ownership
#[async_trait]
impl<T: GmailClient + ?Sized> GmailClient for Arc<T> {
    async fn list_messages_page(&self, page_token: Option<String>) -> Result<MessagePage> {
        self.as_ref().list_messages_page(page_token).await
    }

    async fn get_message_headers(&self, id: &str) -> Result<Vec<Header>> {
        self.as_ref().get_message_headers(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::{MessagePart, MessagePartHeader};

    fn header(name: Option<&str>, value: Option<&str>) -> MessagePartHeader {
        MessagePartHeader {
            name: name.map(str::to_string),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn test_message_headers_keeps_named_pairs() {
        let msg = Message {
            payload: Some(MessagePart {
                headers: Some(vec![
                    header(Some("From"), Some("Jane <jane@example.com>")),
                    header(None, Some("orphan value")),
                    header(Some("Subject"), None),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let headers = message_headers(msg);
        assert_eq!(headers, vec![Header::new("From", "Jane <jane@example.com>")]);
    }

    #[test]
    fn test_message_headers_without_payload() {
        assert!(message_headers(Message::default()).is_empty());
    }
}
