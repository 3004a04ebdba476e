//! Local filtering of an already-loaded channel's messages.
//!
//! Matching is a case-insensitive substring test against the message body
//! or the author's display name. A blank query matches everything.

use std::sync::Arc;

use crate::models::ChatMessage;

fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// `needle` must already be lowercased.
fn message_matches(message: &ChatMessage, needle: &str) -> bool {
    message.body.to_lowercase().contains(needle)
        || message
            .author_name()
            .map_or(false, |name| name.to_lowercase().contains(needle))
}

/// Messages matching `query`, in their original order.
pub fn filter_messages<'a>(messages: &'a [ChatMessage], query: &str) -> Vec<&'a ChatMessage> {
    match normalize_query(query) {
        None => messages.iter().collect(),
        Some(needle) => messages
            .iter()
            .filter(|message| message_matches(message, &needle))
            .collect(),
    }
}

/// Search box state over a message list.
///
/// `filtered()` is recomputed lazily and only after the messages or the
/// query have changed; the source list is shared, never modified.
#[derive(Debug, Default)]
pub struct MessageSearch {
    messages: Arc<Vec<ChatMessage>>,
    query: String,
    /// Indices into `messages`; `None` means stale.
    cached: Option<Vec<usize>>,
    recomputations: u64,
}

impl MessageSearch {
    pub fn new(messages: Arc<Vec<ChatMessage>>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn messages(&self) -> &Arc<Vec<ChatMessage>> {
        &self.messages
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query != self.query {
            self.query = query;
            self.cached = None;
        }
    }

    pub fn set_messages(&mut self, messages: Arc<Vec<ChatMessage>>) {
        if !Arc::ptr_eq(&messages, &self.messages) {
            self.messages = messages;
            self.cached = None;
        }
    }

    pub fn filtered(&mut self) -> Vec<&ChatMessage> {
        if self.cached.is_none() {
            self.cached = Some(self.compute());
            self.recomputations += 1;
        }
        let messages = &self.messages;
        self.cached
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|&index| messages.get(index))
            .collect()
    }

    pub fn match_count(&mut self) -> usize {
        self.filtered().len()
    }

    /// How many times the filter has actually run.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    fn compute(&self) -> Vec<usize> {
        match normalize_query(&self.query) {
            None => (0..self.messages.len()).collect(),
            Some(needle) => self
                .messages
                .iter()
                .enumerate()
                .filter(|(_, message)| message_matches(message, &needle))
                .map(|(index, _)| index)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, UserId};
    use chrono::Utc;

    fn message(id: &str, body: &str, author: Option<&str>) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            channel_id: "general".into(),
            body: body.into(),
            author: author.map(|name| Author {
                id: UserId::new(format!("user-{name}")),
                display_name: name.into(),
                avatar_url: None,
            }),
            created_at: Utc::now(),
            voice_url: None,
        }
    }

    fn sample() -> Vec<ChatMessage> {
        vec![
            message("1", "Welcome to the Rust course", Some("Alice")),
            message("2", "anyone up for the meetup?", Some("Bob")),
            message("3", "voice note", None),
            message("4", "RUST is great", Some("carol")),
        ]
    }

    fn ids(messages: &[&ChatMessage]) -> Vec<String> {
        messages.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn blank_query_returns_everything() {
        let messages = sample();
        assert_eq!(filter_messages(&messages, "").len(), 4);
        assert_eq!(filter_messages(&messages, "   \t").len(), 4);
    }

    #[test]
    fn matches_body_case_insensitively_in_order() {
        let messages = sample();
        assert_eq!(ids(&filter_messages(&messages, "rust")), vec!["1", "4"]);
    }

    #[test]
    fn matches_author_name() {
        let messages = sample();
        assert_eq!(ids(&filter_messages(&messages, "BOB")), vec!["2"]);
        assert_eq!(ids(&filter_messages(&messages, "caro")), vec!["4"]);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let messages = sample();
        assert_eq!(ids(&filter_messages(&messages, "  meetup ")), vec!["2"]);
    }

    #[test]
    fn no_match_is_empty() {
        let messages = sample();
        assert!(filter_messages(&messages, "kotlin").is_empty());
    }

    #[test]
    fn results_are_an_ordered_subsequence() {
        let messages = sample();
        for query in ["", "r", "e", "o", "xyz", "Rust"] {
            let result = filter_messages(&messages, query);
            let mut last = None;
            for hit in result {
                let position = messages.iter().position(|m| m.id == hit.id).unwrap();
                assert!(last.map_or(true, |prev| position > prev));
                last = Some(position);
            }
        }
    }

    #[test]
    fn search_recomputes_only_on_change() {
        let shared = Arc::new(sample());
        let mut search = MessageSearch::new(shared.clone());

        assert_eq!(search.match_count(), 4);
        assert_eq!(search.match_count(), 4);
        assert_eq!(search.recomputations(), 1);

        search.set_query("rust");
        assert_eq!(ids(&search.filtered()), vec!["1", "4"]);
        search.set_query("rust");
        search.filtered();
        assert_eq!(search.recomputations(), 2);

        search.set_messages(shared.clone());
        search.filtered();
        assert_eq!(search.recomputations(), 2);

        let mut updated = sample();
        updated.push(message("5", "more rust", Some("dave")));
        search.set_messages(Arc::new(updated));
        assert_eq!(ids(&search.filtered()), vec!["1", "4", "5"]);
        assert_eq!(search.recomputations(), 3);

        assert_eq!(shared.len(), 4);
    }
}
