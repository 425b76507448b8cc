//! Emergency-trigger detector: the deterministic signal that snaps the
//! retention ladder to its final step (§4.6). Grounded on
//! `coordination/src/router/classifier.rs`'s candidate-array scoring
//! pattern — a list of `(condition, trigger name)` pairs evaluated in one
//! pass rather than a chain of independent `if` statements.

const TRIGGER_KEYWORDS: &[&str] = &[
    "lawsuit",
    "sue",
    "attorney",
    "lawyer",
    "reviews",
    "bad review",
    "consumer protection",
    "better business bureau",
    "bbb",
    "chargeback",
];

const MIN_SHOUT_LEN: usize = 8;

/// True if the message is ALL-CAPS and longer than 8 characters, or
/// contains any declared trigger keyword.
pub fn detect_emergency(message: &str) -> bool {
    let candidates: &[bool] = &[
        is_all_caps_shout(message),
        contains_trigger_keyword(message),
    ];
    candidates.iter().any(|triggered| *triggered)
}

fn is_all_caps_shout(message: &str) -> bool {
    let letters: String = message.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() > MIN_SHOUT_LEN && letters.chars().all(|c| c.is_uppercase())
}

fn contains_trigger_keyword(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRIGGER_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shouting_triggers() {
        assert!(detect_emergency("THIS IS COMPLETELY UNACCEPTABLE"));
    }

    #[test]
    fn legal_threat_triggers() {
        assert!(detect_emergency("I will sue you and leave bad reviews."));
    }

    #[test]
    fn ordinary_message_does_not_trigger() {
        assert!(!detect_emergency("I'd like a refund please."));
    }

    #[test]
    fn short_all_caps_does_not_trigger() {
        assert!(!detect_emergency("OK"));
    }
}
