//! Token counting using tiktoken-rs for budget checks on outgoing context.

use tiktoken_rs::cl100k_base;

/// Count tokens in text using the cl100k_base encoding.
///
/// Falls back to a character-based estimate if the encoder fails to load.
pub fn count_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    match cl100k_base() {
        Ok(bpe) => bpe.encode_with_special_tokens(text).len() as u32,
        Err(_) => estimate_tokens(text),
    }
}

/// Quick token estimate (~4 chars per token), no encoder involved.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() as f64 / 4.0).ceil() as u32
}

/// Check if text exceeds a token budget.
///
/// Uses the quick estimate to short-circuit the clear cases and only runs
/// the real encoder near the boundary.
pub fn exceeds_budget(text: &str, budget: u32) -> bool {
    let quick = estimate_tokens(text);
    if quick < budget / 2 {
        return false;
    }
    if quick > budget.saturating_mul(2) {
        return true;
    }
    count_tokens(text) > budget
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tokens_empty() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_count_tokens_simple() {
        let count = count_tokens("Hello, world!");
        assert!(count > 0);
        assert!(count < 10);
    }

    #[test]
    fn test_estimate_tracks_length() {
        assert!(estimate_tokens("a longer piece of text") > estimate_tokens("short"));
    }

    #[test]
    fn test_exceeds_budget() {
        assert!(!exceeds_budget("Hi", 100));
        let long = "This is a much longer piece of text that should definitely \
                    exceed a very small token budget.";
        assert!(exceeds_budget(long, 5));
    }
}
