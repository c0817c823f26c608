//! Transcript parsing: turns a raw broadcast chat log into structured events.
//!
//! The collector only relies on the aggregate view (`ParsedTranscript`) and the
//! two visitor helpers; line-level matching lives in `parser`.

mod parser;
mod visitors;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::summary::TopTipper;

pub use parser::parse;
pub use visitors::{calculate_avg_watch_time, categorize_visitors};

#[derive(Debug, Error, PartialEq)]
pub enum TranscriptError {
    #[error("transcript is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipEvent {
    pub username: String,
    pub tokens: i64,
}

/// A user seen entering or leaving the room.
/// `dwell_seconds` is `None` when the transcript carries no timestamps for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visitor {
    pub username: String,
    pub dwell_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedTranscript {
    pub total_tokens: i64,
    pub tips: Vec<TipEvent>,
    /// Sorted, distinct usernames across every event kind.
    pub unique_usernames: Vec<String>,
    pub follows: Vec<String>,
    pub unfollows: Vec<String>,
    pub visitors: Vec<Visitor>,
    pub banned: Vec<String>,
    /// Distinct room subjects in first-seen order.
    pub room_subjects: Vec<String>,
    pub chat_message_count: usize,
}

impl ParsedTranscript {
    /// Tip totals per user, highest first; ties broken by username.
    pub fn top_tippers(&self, limit: usize) -> Vec<TopTipper> {
        let mut totals: Vec<TopTipper> = Vec::new();
        for tip in &self.tips {
            match totals.iter_mut().find(|t| t.username == tip.username) {
                Some(existing) => existing.tokens = existing.tokens.saturating_add(tip.tokens),
                None => totals.push(TopTipper {
                    username: tip.username.clone(),
                    tokens: tip.tokens,
                }),
            }
        }
        totals.sort_by(|a, b| b.tokens.cmp(&a.tokens).then_with(|| a.username.cmp(&b.username)));
        totals.truncate(limit);
        totals
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitorCategories {
    pub stayed: Vec<String>,
    pub quick: Vec<String>,
    pub banned: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tip(username: &str, tokens: i64) -> TipEvent {
        TipEvent {
            username: username.to_string(),
            tokens,
        }
    }

    #[test]
    fn test_top_tippers_aggregates_and_orders() {
        let parsed = ParsedTranscript {
            tips: vec![tip("bob", 10), tip("alice", 5), tip("bob", 15), tip("carol", 25)],
            ..Default::default()
        };
        let top = parsed.top_tippers(10);
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].username, "bob");
        assert_eq!(top[0].tokens, 25);
        // tie with bob on 25, alphabetical after
        assert_eq!(top[1].username, "carol");
        assert_eq!(top[2].username, "alice");
    }

    #[test]
    fn test_top_tippers_saturates_per_user_total() {
        let parsed = ParsedTranscript {
            tips: vec![tip("whale", i64::MAX), tip("whale", 500)],
            ..Default::default()
        };
        let top = parsed.top_tippers(10);
        assert_eq!(top[0].tokens, i64::MAX);
    }

    #[test]
    fn test_top_tippers_respects_limit() {
        let parsed = ParsedTranscript {
            tips: vec![tip("a", 1), tip("b", 2), tip("c", 3)],
            ..Default::default()
        };
        let top = parsed.top_tippers(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].username, "c");
    }
}
