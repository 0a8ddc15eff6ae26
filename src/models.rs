use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Minimal message identifier as returned by `users.messages.list`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    #[serde(rename = "threadId", default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
        }
    }
}

/// Every message reference of a run, in fetch order
pub type MessageList = Vec<MessageRef>;

/// One page of the message list endpoint
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

/// A single header record of a message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A sender and how many messages it sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCount {
    pub sender: String,
    pub count: u64,
}

/// Sender address to message count, kept in first-seen order
///
/// Serializes as a JSON object whose key order is the first-seen order, so
/// a reloaded map breaks ties the same way the run that wrote it did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderCounts {
    counts: IndexMap<String, u64>,
}

impl SenderCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more message from `sender`
    pub fn increment(&mut self, sender: &str) {
        self.add(sender, 1);
    }

    /// Add `count` messages for `sender`, inserting it at the end if unseen
    pub fn add(&mut self, sender: &str, count: u64) {
        match self.counts.get_mut(sender) {
            Some(existing) => *existing += count,
            None => {
                self.counts.insert(sender.to_string(), count);
            }
        }
    }

    /// Sum another map into this one
    pub fn merge(&mut self, other: &SenderCounts) {
        for (sender, count) in other.iter() {
            self.add(sender, count);
        }
    }

    pub fn get(&self, sender: &str) -> Option<u64> {
        self.counts.get(sender).copied()
    }

    /// Number of distinct senders
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total messages counted across all senders
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterate in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(sender, count)| (sender.as_str(), *count))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for SenderCounts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = SenderCounts::new();
        for (sender, count) in iter {
            let sender: String = sender.into();
            counts.add(&sender, count);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ref_deserializes_list_record() {
        let json = r#"[{"id": "18c1", "threadId": "18c0"}, {"id": "18c2"}]"#;
        let refs: Vec<MessageRef> = serde_json::from_str(json).unwrap();
        assert_eq!(refs[0].id, "18c1");
        assert_eq!(refs[0].thread_id.as_deref(), Some("18c0"));
        assert_eq!(refs[1].thread_id, None);
    }

    #[test]
    fn test_increment_and_merge_sum_counts() {
        let mut first = SenderCounts::new();
        first.increment("a@x.com");
        first.increment("a@x.com");
        first.increment("b@y.com");

        let mut second = SenderCounts::new();
        second.increment("c@z.com");
        second.increment("a@x.com");

        first.merge(&second);
        assert_eq!(first.get("a@x.com"), Some(3));
        assert_eq!(first.get("b@y.com"), Some(1));
        assert_eq!(first.get("c@z.com"), Some(1));
        assert_eq!(first.total(), 5);
    }

    #[test]
    fn test_first_seen_order_survives_json() {
        let counts: SenderCounts = vec![("zed@x.com", 1), ("amy@x.com", 4), ("mid@x.com", 2)]
            .into_iter()
            .collect();

        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"zed@x.com":1,"amy@x.com":4,"mid@x.com":2}"#);

        let reloaded: SenderCounts = serde_json::from_str(&json).unwrap();
        let senders: Vec<&str> = reloaded.iter().map(|(s, _)| s).collect();
        assert_eq!(senders, vec!["zed@x.com", "amy@x.com", "mid@x.com"]);
        assert_eq!(reloaded, counts);
    }
}
