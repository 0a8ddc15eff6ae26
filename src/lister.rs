//! Paginated listing of every message id in the mailbox

use tracing::{error, info};

use crate::client::GmailClient;
use crate::error::GmailError;
use crate::models::MessageList;

/// Outcome of a listing run
///
/// `messages` holds everything accumulated before `error`, if any, stopped
/// the walk. A listing with an error is therefore possibly incomplete.
#[derive(Debug, Default)]
pub struct Listing {
    pub messages: MessageList,
    pub error: Option<GmailError>,
}

impl Listing {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Walk `nextPageToken` until the last page, logging every `progress_every`
/// accumulated ids
pub async fn list_all<C>(client: &C, progress_every: usize) -> Listing
where
    C: GmailClient + ?Sized,
{
    let progress_every = progress_every.max(1);
    let mut messages = MessageList::new();
    let mut page_token: Option<String> = None;

    info!("Fetching messages from Gmail API...");

    loop {
        let page = match client.list_messages_page(page_token.take()).await {
            Ok(page) => page,
            Err(e) => {
                error!(
                    "Failed to fetch messages from Gmail API after {} messages: {}",
                    messages.len(),
                    e
                );
                return Listing {
                    messages,
                    error: Some(e),
                };
            }
        };

        let before = messages.len();
        messages.extend(page.messages);
        if messages.len() / progress_every > before / progress_every {
            info!("Fetched {} messages...", messages.len());
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    info!("Found {} total messages!", messages.len());
    Listing {
        messages,
        error: None,
    }
}
