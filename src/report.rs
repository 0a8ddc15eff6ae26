//! Aggregation and top-N reporting

use crate::models::{SenderCount, SenderCounts};

/// Sum chunk tallies into one map
///
/// A sender seen in several chunks gets the total of its counts. Key order
/// is first-seen across the chunks in the order given.
pub fn aggregate<'a, I>(chunk_maps: I) -> SenderCounts
where
    I: IntoIterator<Item = &'a SenderCounts>,
{
    let mut total = SenderCounts::new();
    for chunk in chunk_maps {
        total.merge(chunk);
    }
    total
}

/// The `n` most frequent senders, highest count first
///
/// Ties keep the map's first-seen order.
pub fn top_senders(counts: &SenderCounts, n: usize) -> Vec<SenderCount> {
    let mut entries: Vec<SenderCount> = counts
        .iter()
        .map(|(sender, count)| SenderCount {
            sender: sender.to_string(),
            count,
        })
        .collect();

    // sort_by is stable
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries.truncate(n);
    entries
}

/// Text of the report as printed to stdout
pub fn render_report(entries: &[SenderCount], top_n: usize) -> String {
    let mut out = format!(" - Top {} Senders to your Inbox - \n", top_n);
    for entry in entries {
        out.push_str(&format!("{}: {}\n", entry.sender, entry.count));
    }
    out
}

/// Print the top `top_n` senders of `counts`
pub fn print_report(counts: &SenderCounts, top_n: usize) -> Vec<SenderCount> {
    let entries = top_senders(counts, top_n);
    print!("{}", render_report(&entries, top_n));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> SenderCounts {
        pairs.iter().map(|(s, c)| (*s, *c)).collect()
    }

    fn pairs(entries: &[SenderCount]) -> Vec<(&str, u64)> {
        entries.iter().map(|e| (e.sender.as_str(), e.count)).collect()
    }

    #[test]
    fn test_aggregate_sums_across_chunks() {
        let first = counts(&[("a@x.com", 3), ("b@y.com", 1)]);
        let second = counts(&[("c@z.com", 2), ("a@x.com", 4)]);

        let total = aggregate([&first, &second]);
        assert_eq!(total.get("a@x.com"), Some(7));
        assert_eq!(total.get("b@y.com"), Some(1));
        assert_eq!(total.get("c@z.com"), Some(2));

        let order: Vec<&str> = total.iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec!["a@x.com", "b@y.com", "c@z.com"]);
    }

    #[test]
    fn test_aggregate_of_nothing_is_empty() {
        let total = aggregate(std::iter::empty::<&SenderCounts>());
        assert!(total.is_empty());
    }

    #[test]
    fn test_top_senders_scenario() {
        let mut tally = SenderCounts::new();
        for sender in ["a@x.com", "a@x.com", "b@y.com"] {
            tally.increment(sender);
        }

        let top = top_senders(&tally, 2);
        assert_eq!(pairs(&top), vec![("a@x.com", 2), ("b@y.com", 1)]);
    }

    #[test]
    fn test_top_senders_ties_keep_first_seen_order() {
        let tally = counts(&[("late@x.com", 1), ("big@x.com", 5), ("tie1@x.com", 2), ("tie2@x.com", 2)]);
        let top = top_senders(&tally, 10);
        assert_eq!(
            pairs(&top),
            vec![("big@x.com", 5), ("tie1@x.com", 2), ("tie2@x.com", 2), ("late@x.com", 1)]
        );
    }

    #[test]
    fn test_top_senders_truncates() {
        let tally = counts(&[("a", 3), ("b", 2), ("c", 1)]);
        assert_eq!(top_senders(&tally, 0).len(), 0);
        assert_eq!(top_senders(&tally, 2).len(), 2);
        assert_eq!(top_senders(&tally, 20).len(), 3);
    }

    #[test]
    fn test_render_report() {
        let entries = vec![
            SenderCount {
                sender: "a@x.com".to_string(),
                count: 2,
            },
            SenderCount {
                sender: "b@y.com".to_string(),
                count: 1,
            },
        ];
        assert_eq!(
            render_report(&entries, 2),
            " - Top 2 Senders to your Inbox - \na@x.com: 2\nb@y.com: 1\n"
        );
    }
}
