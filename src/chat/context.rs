//! Token estimation and context truncation
//!
//! Token counts use a fixed heuristic of four characters per token. It is
//! a known approximation: real tokenizers disagree with it, especially for
//! code and non-Latin scripts, so budgets should leave headroom.

use crate::providers::{HistoryMessage, MessageContent};

/// Characters assumed per token
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token cost of `text` as ceil(chars / 4)
///
/// # Examples
///
/// ```
/// use nymval::chat::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcd"), 1);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

fn message_tokens(message: &HistoryMessage) -> usize {
    estimate_tokens(&message.content.cost_text())
}

/// Total estimated tokens of a history
pub fn history_tokens(messages: &[HistoryMessage]) -> usize {
    messages.iter().map(message_tokens).sum()
}

/// Keep the newest messages that fit in `max_tokens`
///
/// Messages are walked newest first. When the next one would overflow, its
/// first `remaining * 4` characters are kept and the walk stops. The result
/// is in chronological order.
pub fn truncate_to_budget(messages: &[HistoryMessage], max_tokens: usize) -> Vec<HistoryMessage> {
    let mut kept = Vec::new();
    let mut used = 0usize;

    for message in messages.iter().rev() {
        let remaining = max_tokens - used;
        if remaining == 0 {
            break;
        }

        let cost = message_tokens(message);
        if cost <= remaining {
            used += cost;
            kept.push(message.clone());
            continue;
        }

        let head: String = message
            .content
            .cost_text()
            .chars()
            .take(remaining * CHARS_PER_TOKEN)
            .collect();
        // A whitespace-only head carries nothing and would fail validation
        if head.trim().is_empty() {
            break;
        }
        kept.push(HistoryMessage {
            role: message.role.clone(),
            content: MessageContent::Text(head),
        });
        break;
    }

    kept.reverse();
    kept
}

/// Information about the current context window status
///
/// Provides context window metrics including maximum tokens, tokens used,
/// remaining tokens, and percentage of context utilized.
#[derive(Debug, Clone, Copy)]
pub struct ContextInfo {
    /// Maximum tokens available for this context
    pub max_tokens: usize,
    /// Tokens used by the context
    pub used_tokens: usize,
    /// Tokens remaining in the context window
    pub remaining_tokens: usize,
    /// Percentage of context window used (0.0-100.0)
    pub percentage_used: f64,
}

impl ContextInfo {
    /// Create a new ContextInfo instance
    ///
    /// # Examples
    ///
    /// ```
    /// use nymval::chat::ContextInfo;
    ///
    /// let context = ContextInfo::new(8192, 1000);
    /// assert_eq!(context.remaining_tokens, 7192);
    /// assert!(context.percentage_used > 12.0 && context.percentage_used < 13.0);
    /// ```
    pub fn new(max_tokens: usize, used_tokens: usize) -> Self {
        let used_tokens = used_tokens.min(max_tokens);
        let remaining_tokens = max_tokens - used_tokens;
        let percentage_used = if max_tokens == 0 {
            0.0
        } else {
            (used_tokens as f64 / max_tokens as f64) * 100.0
        };

        Self {
            max_tokens,
            used_tokens,
            remaining_tokens,
            percentage_used,
        }
    }

    /// Context status of `messages` against `max_tokens`
    pub fn for_history(messages: &[HistoryMessage], max_tokens: usize) -> Self {
        Self::new(max_tokens, history_tokens(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ContentItem;

    fn text(role: &str, s: &str) -> HistoryMessage {
        HistoryMessage::text(role, s)
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
    }

    #[test]
    fn test_estimate_tokens_counts_chars() {
        assert_eq!(estimate_tokens("ééééé"), 2);
    }

    #[test]
    fn test_everything_fits() {
        let messages = vec![text("user", "aaaa"), text("assistant", "bbbb")];
        assert_eq!(truncate_to_budget(&messages, 10), messages);
    }

    #[test]
    fn test_zero_budget_is_empty() {
        let messages = vec![text("user", "aaaa")];
        assert!(truncate_to_budget(&messages, 0).is_empty());
        assert!(truncate_to_budget(&[], 100).is_empty());
    }

    #[test]
    fn test_oldest_message_is_head_truncated() {
        // 3 tokens, 2 tokens, 2 tokens; budget 5 leaves 1 token for the oldest
        let messages = vec![
            text("user", "abcdefghijkl"),
            text("assistant", "12345678"),
            text("user", "ABCDEFGH"),
        ];
        let out = truncate_to_budget(&messages, 5);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], text("user", "abcd"));
        assert_eq!(out[1], messages[1]);
        assert_eq!(out[2], messages[2]);
        assert!(history_tokens(&out) <= 5);
    }

    #[test]
    fn test_stops_after_partial_message() {
        let messages = vec![
            text("user", "old"),
            text("user", "abcdefghijkl"),
            text("user", "ABCD"),
        ];
        let out = truncate_to_budget(&messages, 2);
        assert_eq!(out, vec![text("user", "abcd"), text("user", "ABCD")]);
    }

    #[test]
    fn test_single_oversized_message_is_truncated_alone() {
        let long = "x".repeat(100);
        let out = truncate_to_budget(&[text("user", &long)], 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, MessageContent::Text("x".repeat(12)));
    }

    #[test]
    fn test_truncation_never_splits_utf8() {
        let out = truncate_to_budget(&[text("user", &"日本語".repeat(10))], 1);
        assert_eq!(out[0].content, MessageContent::Text("日本語日".to_string()));
    }

    #[test]
    fn test_truncated_parts_become_text() {
        let message = HistoryMessage::parts(
            "user",
            vec![ContentItem::text("abcdefgh"), ContentItem::image("u")],
        );
        let out = truncate_to_budget(&[message], 1);
        assert_eq!(out[0].content, MessageContent::Text("abcd".to_string()));
    }

    #[test]
    fn test_exact_fit_keeps_remaining_intact() {
        let messages = vec![text("user", "abcd"), text("user", "efgh")];
        let out = truncate_to_budget(&messages, 1);
        assert_eq!(out, vec![text("user", "efgh")]);
    }

    #[test]
    fn test_whitespace_only_head_is_dropped() {
        let padded = format!("\n\n\n\n{}", "x".repeat(40));
        let messages = vec![text("assistant", &padded), text("user", "abcdefgh")];
        let out = truncate_to_budget(&messages, 3);
        assert_eq!(out, vec![text("user", "abcdefgh")]);

        // With room past the padding the head is kept
        let out = truncate_to_budget(&messages, 4);
        assert_eq!(out[0], text("assistant", "\n\n\n\nxxxx"));
    }

    #[test]
    fn test_truncation_holds_for_every_budget() {
        let messages = vec![
            text("user", "first question about the weather"),
            text("assistant", "   \n\t  leading blanks then an answer"),
            text("user", "é"),
            text("assistant", &"long reply ".repeat(12)),
            text("user", "short"),
        ];
        let total = history_tokens(&messages);

        for budget in 0..=total + 2 {
            let out = truncate_to_budget(&messages, budget);
            assert!(history_tokens(&out) <= budget, "budget {}", budget);
            assert!(out.len() <= messages.len());

            let offset = messages.len() - out.len();
            for (i, kept) in out.iter().enumerate() {
                let original = &messages[offset + i];
                assert_eq!(kept.role, original.role, "budget {}", budget);
                let kept_text = kept.content.cost_text();
                assert!(!kept_text.trim().is_empty(), "budget {}", budget);
                if i == 0 {
                    assert!(
                        original.content.cost_text().starts_with(kept_text.as_str()),
                        "budget {}",
                        budget
                    );
                } else {
                    assert_eq!(kept, original, "budget {}", budget);
                }
            }

            let last = &messages[messages.len() - 1];
            if message_tokens(last) <= budget {
                assert_eq!(out.last(), Some(last), "budget {}", budget);
            }
        }
    }

    #[test]
    fn test_context_info_for_history() {
        let messages = vec![text("user", "abcdefgh")];
        let info = ContextInfo::for_history(&messages, 8);
        assert_eq!(info.used_tokens, 2);
        assert_eq!(info.remaining_tokens, 6);
        assert_eq!(ContextInfo::new(0, 10).percentage_used, 0.0);
    }
}
