//! Completion cost estimation
//!
//! A price-table estimate of what one completed call cost. Token counts are
//! approximated at roughly four characters per token; the result is an
//! accounting estimate, not a billing source of truth.

use crate::transport::ChatMessage;

/// Approximate characters per token for the supported model family
const CHARS_PER_TOKEN: usize = 4;

/// USD per million tokens: (model prefix, input, output).
///
/// Longest/most specific prefixes must come before their base model so that
/// `gpt-4o-mini` does not price as `gpt-4o`.
const PRICING: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-4", 30.00, 60.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
    ("o1-mini", 1.10, 4.40),
    ("o1", 15.00, 60.00),
];

/// Estimate the cost of one completed call in USD.
///
/// Returns `None` when the model is not in the price table; callers decide
/// what an unknown cost means (the session records it as zero).
pub fn estimate_cost(model: &str, messages: &[ChatMessage], completion: &str) -> Option<f64> {
    let (input_per_mtok, output_per_mtok) = pricing_for(model)?;

    let prompt_tokens: usize = messages.iter().map(|m| estimate_tokens(&m.content)).sum();
    let completion_tokens = estimate_tokens(completion);

    Some(
        prompt_tokens as f64 * input_per_mtok / 1_000_000.0
            + completion_tokens as f64 * output_per_mtok / 1_000_000.0,
    )
}

fn pricing_for(model: &str) -> Option<(f64, f64)> {
    PRICING
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))
        .map(|(_, input, output)| (*input, *output))
}

fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_has_positive_cost() {
        let messages = vec![ChatMessage::user("list the ten largest files in my home directory")];
        let cost = estimate_cost("gpt-4o", &messages, "import os\nprint('ok')").unwrap();
        assert!(cost > 0.0);
    }

    #[test]
    fn test_unknown_model_is_none() {
        let messages = vec![ChatMessage::user("hello")];
        assert!(estimate_cost("mistral-large", &messages, "hi").is_none());
        assert!(estimate_cost("", &messages, "hi").is_none());
    }

    #[test]
    fn test_mini_does_not_price_as_base() {
        let messages = vec![ChatMessage::user("x".repeat(4000))];
        let base = estimate_cost("gpt-4o", &messages, "").unwrap();
        let mini = estimate_cost("gpt-4o-mini", &messages, "").unwrap();
        assert!(mini < base);
    }

    #[test]
    fn test_empty_call_is_zero() {
        let cost = estimate_cost("gpt-4o", &[], "").unwrap();
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_output_tokens_cost_more_than_input() {
        let msg = vec![ChatMessage::user("a".repeat(400))];
        let input_heavy = estimate_cost("gpt-4o", &msg, "").unwrap();
        let output_heavy = estimate_cost("gpt-4o", &[], &"a".repeat(400)).unwrap();
        assert!(output_heavy > input_heavy);
    }

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
