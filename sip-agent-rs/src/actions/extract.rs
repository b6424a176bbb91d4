//! Parameter extraction from free-form chat text.

use crate::chain::Chain;
use regex::Regex;

lazy_static::lazy_static! {
    static ref AMOUNT: Regex = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:tokens?|sip)").unwrap();
    static ref TARGET: Regex = Regex::new(r"(?i)target[:\s]+(\d+(?:\.\d+)?)").unwrap();
    static ref GOAL_AMOUNT: Regex = Regex::new(r"(?i)goal[:\s]+(\d+(?:\.\d+)?)").unwrap();
    static ref GOAL: Regex = Regex::new(r"(?i)goal[:\s]+([^.!?]+)").unwrap();
    static ref GOAL_FOR: Regex = Regex::new(r"(?i)for[:\s]+([^.!?]+)").unwrap();
    static ref GOAL_KEYWORD: Regex =
        Regex::new(r"(?i)(retirement|house|car|vacation|emergency|investment|ai|agent|demo)").unwrap();
    static ref FROM_CHAIN: Regex = Regex::new(r"(?i)from\s+(fuji|echo|dispatch)").unwrap();
    static ref TO_CHAIN: Regex = Regex::new(r"(?i)to\s+(fuji|echo|dispatch)").unwrap();
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `20 tokens`, `5 sip`, `2.5 token`
pub fn extract_amount(text: &str) -> Option<String> {
    first_capture(&AMOUNT, text)
}

/// `target 240`, falling back to `goal: 240`.
pub fn extract_target(text: &str) -> Option<String> {
    first_capture(&TARGET, text).or_else(|| first_capture(&GOAL_AMOUNT, text))
}

/// `goal ...` up to the end of the sentence, then `for ...`, then a known keyword.
pub fn extract_goal(text: &str) -> Option<String> {
    first_capture(&GOAL, text)
        .or_else(|| first_capture(&GOAL_FOR, text))
        .or_else(|| first_capture(&GOAL_KEYWORD, text))
}

pub fn extract_from_chain(text: &str) -> Option<Chain> {
    first_capture(&FROM_CHAIN, text).and_then(|c| c.parse().ok())
}

pub fn extract_to_chain(text: &str) -> Option<Chain> {
    first_capture(&TO_CHAIN, text).and_then(|c| c.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_needs_a_token_unit() {
        assert_eq!(extract_amount("Create a SIP with 20 tokens monthly").as_deref(), Some("20"));
        assert_eq!(extract_amount("move 2.5 SIP to echo").as_deref(), Some("2.5"));
        assert_eq!(extract_amount("1 token please").as_deref(), Some("1"));
        assert_eq!(extract_amount("create a plan for 2030"), None);
    }

    #[test]
    fn target_prefers_target_over_goal() {
        assert_eq!(extract_target("target: 500, goal 300").as_deref(), Some("500"));
        assert_eq!(extract_target("goal 300 tokens").as_deref(), Some("300"));
        assert_eq!(extract_target("no numbers here"), None);
    }

    #[test]
    fn goal_stops_at_sentence_end() {
        assert_eq!(
            extract_goal("Start a plan. Goal: buy a house! Thanks").as_deref(),
            Some("buy a house")
        );
        assert_eq!(
            extract_goal("create sip with 10 tokens for retirement.").as_deref(),
            Some("retirement")
        );
        assert_eq!(extract_goal("make a monthly investment").as_deref(), Some("investment"));
        assert_eq!(extract_goal("make it so"), None);
    }

    #[test]
    fn chains_are_read_from_direction_words() {
        let text = "Move 5 tokens from Dispatch to fuji";
        assert_eq!(extract_from_chain(text), Some(Chain::Dispatch));
        assert_eq!(extract_to_chain(text), Some(Chain::Fuji));
        assert_eq!(extract_from_chain("bridge to echo"), None);
    }
}
