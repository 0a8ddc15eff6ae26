//! Sender lookup for a single message

use tracing::{debug, error};

use crate::client::GmailClient;
use crate::error::GmailError;
use crate::models::Header;
use crate::retry::RetryPolicy;

/// Pull the address out of a `From` header value
///
/// Takes whatever follows the last `<` and strips `>` from both ends, so
/// `Jane Doe <jane@example.com>` becomes `jane@example.com`. A value without
/// angle brackets comes back unchanged. Not an RFC 5322 parser.
pub fn extract_sender_email(from: &str) -> String {
    from.rsplit('<')
        .next()
        .unwrap_or(from)
        .trim_matches('>')
        .to_string()
}

/// First header named exactly `From`
pub fn find_from_header(headers: &[Header]) -> Option<&str> {
    headers
        .iter()
        .find(|h| h.name == "From")
        .map(|h| h.value.as_str())
}

/// Resolves message ids to sender addresses, retrying transient failures
pub struct SenderFetcher<C> {
    client: C,
    policy: RetryPolicy,
}

impl<C: GmailClient> SenderFetcher<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Sender address of `message_id`, or `None` if it cannot be determined
    ///
    /// `None` covers a message without a From header, a permanent API error
    /// and running out of retries. Callers skip the message in all three
    /// cases.
    pub async fn fetch_sender(&self, message_id: &str) -> Option<String> {
        let operation = format!("Fetching message {}", message_id);
        let result = self
            .policy
            .run(
                &operation,
                || self.client.get_message_headers(message_id),
                GmailError::is_transient,
            )
            .await;

        match result {
            Ok(headers) => {
                let sender = find_from_header(&headers).map(extract_sender_email);
                if sender.is_none() {
                    debug!("Message {} has no From header", message_id);
                }
                sender
            }
            Err(e) if e.is_transient() => {
                error!(
                    "Giving up on message {} after {} attempts: {}",
                    message_id,
                    self.policy.max_attempts(),
                    e
                );
                None
            }
            Err(e) => {
                error!("Failed to fetch message {}: {}", message_id, e);
                None
            }
        }
    }
}
