//! Shared keyword tables.
//!
//! Every phrase list that gates behavior lives here, one table per concern,
//! so the classifier's sticky rules and the submission handlers' confirmation
//! gates can never drift apart.  Matching is substring-based over a
//! case-insensitive Aho-Corasick automaton, built once on first use.

use std::sync::OnceLock;

use aho_corasick::AhoCorasick;

/// A phrase table with a lazily-built matcher.
pub struct KeywordSet {
    phrases: &'static [&'static str],
    automaton: OnceLock<AhoCorasick>,
}

impl KeywordSet {
    const fn new(phrases: &'static [&'static str]) -> Self {
        Self {
            phrases,
            automaton: OnceLock::new(),
        }
    }

    /// Whether any phrase in the table occurs in `text` (case-insensitive).
    pub fn matches(&self, text: &str) -> bool {
        self.automaton().is_match(text)
    }

    /// The raw phrase list, e.g. for rendering "confirm with ..." hints.
    pub fn phrases(&self) -> &'static [&'static str] {
        self.phrases
    }

    fn automaton(&self) -> &AhoCorasick {
        self.automaton.get_or_init(|| {
            AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(self.phrases)
                .expect("keyword tables are small static phrase lists")
        })
    }
}

/// Phrases that confirm a pending **bug** template for submission.  Part of
/// the protocol surface: consumed by both the classifier sticky rule and the
/// bug submission gate.
pub static BUG_CONFIRMATION: KeywordSet = KeywordSet::new(&[
    "log it",
    "submit",
    "submit bug",
    "log bug",
    "create bug",
    "raise bug",
    "file bug",
    "confirm bug",
    "raise ticket",
    "log ticket",
]);

/// Phrases that confirm a pending **story** template for submission.
pub static STORY_CONFIRMATION: KeywordSet = KeywordSet::new(&[
    "log it",
    "submit",
    "submit story",
    "log story",
    "create story",
    "raise story",
    "file story",
    "confirm story",
    "raise ticket",
    "log ticket",
    "add as story",
    "new story",
]);

/// Explicit bug-logging phrases that bypass the model entirely.
pub static BUG_PHRASES: KeywordSet = KeywordSet::new(&[
    "log a bug",
    "log bug",
    "create a bug",
    "raise bug",
    "file bug",
    "bug report",
    "register bug",
    "log issue",
    "file issue",
    "register issue",
]);

/// "Show me the details" phrases that resolve against `last_entity`.
pub static DETAILS_REQUEST: KeywordSet = KeywordSet::new(&[
    "yes",
    "show me",
    "details",
    "see it",
    "more info",
    "see details",
    "show details",
    "yep",
    "of course",
]);

/// Product-domain vocabulary used for keyword-bias correction: a turn
/// mentioning these must never fall through to ambiguity.
pub static PRODUCT_KEYWORDS: KeywordSet = KeywordSet::new(&[
    "login",
    "dashboard",
    "report",
    "filter",
    "button",
    "page",
    "screen",
    "feature",
    "settings",
    "upload",
    "export",
    "app",
    "story",
    "bug",
]);

/// Bug-flavored vocabulary, used to offer "log this as a bug?".
pub static BUG_HINTS: KeywordSet = KeywordSet::new(&[
    "bug",
    "issue",
    "defect",
    "error",
    "not working",
    "fail",
    "unable",
]);

/// Story-flavored vocabulary, used to offer "log this as a story?".
pub static STORY_HINTS: KeywordSet = KeywordSet::new(&["story", "feature", "enhancement", "request"]);

/// Phrases in general chat that skip the model and go straight to web search.
pub static WEB_SEARCH_TRIGGERS: KeywordSet = KeywordSet::new(&[
    "top news",
    "latest news",
    "trending",
    "headlines",
    "breaking news",
    "today",
    "weather",
    "price of",
    "who won",
    "current events",
    "capital of",
    "population",
    "stock price",
    "temperature",
]);

/// Greeting, farewell, and thanks tokens.  Matched at the edges of the
/// input, not as substrings (see [`is_greeting`]).
pub const GREETING_TOKENS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "namaste",
    "good morning",
    "good afternoon",
    "good evening",
    "bye",
    "goodbye",
    "see you",
    "thanks",
    "thank you",
];

/// Whether the input is a greeting: it equals, starts with, or ends with one
/// of the greeting tokens on a word boundary.  Substring matching would be
/// wrong here ("history" starts with "hi").
pub fn is_greeting(input: &str) -> bool {
    let normalized = input.trim().trim_end_matches(['!', '.', '?']).trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }

    GREETING_TOKENS.iter().any(|token| {
        normalized == *token
            || bounded_starts_with(&normalized, token)
            || bounded_ends_with(&normalized, token)
    })
}

fn bounded_starts_with(text: &str, token: &str) -> bool {
    text.starts_with(token)
        && text[token.len()..].chars().next().is_some_and(|c| !c.is_alphanumeric())
}

fn bounded_ends_with(text: &str, token: &str) -> bool {
    text.ends_with(token)
        && text[..text.len() - token.len()]
            .chars()
            .next_back()
            .is_some_and(|c| !c.is_alphanumeric())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_matching_is_case_insensitive() {
        assert!(BUG_CONFIRMATION.matches("LOG IT please"));
        assert!(STORY_CONFIRMATION.matches("ok, Submit Story"));
    }

    #[test]
    fn log_it_confirms_both_domains() {
        // Shared phrase: which domain wins is decided by the sticky rules'
        // priority order, not by the tables.
        assert!(BUG_CONFIRMATION.matches("log it"));
        assert!(STORY_CONFIRMATION.matches("log it"));
    }

    #[test]
    fn bug_phrases_catch_explicit_requests() {
        assert!(BUG_PHRASES.matches("please log a bug: upload crashes"));
        assert!(BUG_PHRASES.matches("can you register issue for this"));
        assert!(!BUG_PHRASES.matches("the app is slow"));
    }

    #[test]
    fn greeting_matches_whole_and_edges() {
        assert!(is_greeting("Hi"));
        assert!(is_greeting("hi!"));
        assert!(is_greeting("Hello, I need help"));
        assert!(is_greeting("ok thanks"));
        assert!(is_greeting("Good Morning team"));
    }

    #[test]
    fn greeting_respects_word_boundaries() {
        assert!(!is_greeting("history lesson please"));
        assert!(!is_greeting("highlight the row"));
        assert!(!is_greeting("the graph is wrong"));
    }

    #[test]
    fn product_keywords_catch_domain_terms() {
        assert!(PRODUCT_KEYWORDS.matches("the dashboard is empty"));
        assert!(!PRODUCT_KEYWORDS.matches("tell me a joke"));
    }

    #[test]
    fn phrases_are_exposed_for_hints() {
        assert!(BUG_CONFIRMATION.phrases().contains(&"log it"));
    }
}
