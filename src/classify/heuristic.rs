// Local heuristic fallback, used only when the primary classifier call fails.
//
// A repetition/length spam signal plus a short keyword list. Confidence
// stays low so downstream consumers can tell these verdicts apart from
// classifier-backed ones.

use serde_json::json;

use super::verdict::{Verdict, ViolationType};

/// Keywords that mark a message as inappropriate (case-insensitive substring).
pub const FALLBACK_KEYWORDS: [&str; 5] = ["spam", "scam", "hack", "cheat", "bot"];

/// Messages longer than this many characters are treated as spam.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// More than this many repeated tokens marks a message as spam.
pub const MAX_REPEATED_TOKENS: usize = 3;

/// Tokens shorter than this are ignored when counting repetitions.
pub const MIN_REPEATED_TOKEN_CHARS: usize = 3;

/// Count tokens that already appeared earlier in the text.
///
/// Only tokens of at least `MIN_REPEATED_TOKEN_CHARS` characters count, so
/// filler like "a a a a" is not mistaken for spam.
pub fn repeated_token_count(text: &str) -> usize {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens
        .iter()
        .enumerate()
        .filter(|&(i, token)| {
            token.chars().count() >= MIN_REPEATED_TOKEN_CHARS && tokens[..i].contains(token)
        })
        .count()
}

/// Whether the text looks like spam: heavy repetition or excessive length.
pub fn looks_like_spam(text: &str) -> bool {
    repeated_token_count(text) > MAX_REPEATED_TOKENS || text.chars().count() > MAX_MESSAGE_CHARS
}

/// The first fallback keyword found in the text, if any.
pub fn keyword_hit(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    FALLBACK_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| lower.contains(keyword))
}

/// Classify text with local heuristics only.
pub fn classify(text: &str) -> Verdict {
    let spam = looks_like_spam(text);
    let keyword = keyword_hit(text);

    if spam || keyword.is_some() {
        let (severity, kind, reason) = if spam {
            (0.6, ViolationType::Spam, "Message appears to be spam")
        } else {
            (
                0.5,
                ViolationType::Inappropriate,
                "Message contains inappropriate content",
            )
        };
        return Verdict {
            violation: true,
            severity,
            kind,
            reason: reason.to_string(),
            confidence: 0.4,
            details: json!({
                "fallback_detection": true,
                "spam_signal": spam,
                "keyword": keyword,
            }),
        };
    }

    Verdict {
        violation: false,
        severity: 0.0,
        kind: ViolationType::Clean,
        reason: "No violations detected".to_string(),
        confidence: 0.3,
        details: json!({ "fallback_detection": true }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_short_filler_is_not_spam() {
        assert_eq!(repeated_token_count("a a a a a a"), 0);
        assert!(!looks_like_spam("a a a a a a"));
    }

    #[test]
    fn repetition_counts_only_later_occurrences() {
        // "now" appears six times: five of them are repeats
        assert_eq!(
            repeated_token_count("buy cheap followers now now now now now now"),
            5
        );
    }

    #[test]
    fn exactly_three_repeats_is_not_spam() {
        assert!(!looks_like_spam("hello hello hello hello"));
        assert!(looks_like_spam("hello hello hello hello hello"));
    }

    #[test]
    fn long_text_is_spam() {
        let text = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(looks_like_spam(&text));
        assert!(!looks_like_spam(&"x".repeat(MAX_MESSAGE_CHARS)));
    }

    #[test]
    fn keyword_verdict_is_inappropriate() {
        let v = classify("Totally not a SCAM");
        assert!(v.violation);
        assert_eq!(v.kind, ViolationType::Inappropriate);
        assert_eq!(v.severity, 0.5);
        assert_eq!(v.confidence, 0.4);
    }

    #[test]
    fn spam_wins_over_keyword() {
        let v = classify("scam scam scam scam scam");
        assert_eq!(v.kind, ViolationType::Spam);
        assert_eq!(v.severity, 0.6);
    }

    #[test]
    fn clean_text() {
        let v = classify("good morning everyone");
        assert!(!v.violation);
        assert_eq!(v.kind, ViolationType::Clean);
        assert_eq!(v.confidence, 0.3);
    }
}
