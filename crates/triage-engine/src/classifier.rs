//! Intent classification.
//!
//! A tiered cascade evaluated once per turn, first match wins:
//!
//! | Level | Rule | Technique |
//! |-------|------|-----------|
//! | 1 | Sticky bug confirmation  | pending template + keyword table |
//! | 2 | Sticky story confirmation | pending template + keyword table |
//! | 3 | Explicit bug phrase | keyword table |
//! | 4 | Greeting | edge-token match |
//! | 5 | Model label | completion service, validated against the allowed set |
//! | 6 | Clarify resolution | product-keyword bias |
//!
//! The sticky rules strictly precede the model call: once a template is
//! pending, a confirmation keyword decides the intent no matter what the
//! model would have said.  A model failure is classified as `clarify` and
//! resolved by level 6, so classification itself never fails.

use std::sync::Arc;

use tracing::{debug, warn};

use triage_adapters::CompletionService;
use triage_store::SessionState;

use crate::intent::Intent;
use crate::keywords;

/// System prompt for the model-backed fallback.
const CLASSIFIER_PROMPT: &str = "\
You are the intent classifier for a product support assistant. Classify the \
user's latest message into exactly ONE of these labels:

- greeting: greetings like 'Hi', 'Hello', 'Namaste', or similar.
- general_chat: messages NOT about this product's features, UI, usage, \
issues, or functionality -- jokes, small talk, general facts, tech outside \
this product.
- product_question: ANY message about this product's features, \
functionality, usage, settings, screens, bugs, enhancements, configuration, \
or troubleshooting.
- bug_log: the user explicitly asks to log a bug in the tracker.
- story_log: the user explicitly asks to create a user story in the tracker.
- clarify: the message is too ambiguous to place in any label above.

Reply with the label only, in lowercase. Do not explain.";

/// Response text for a turn the classifier could not disambiguate.
const CLARIFY_RESPONSE: &str = "I want to make sure I help with the right thing -- \
are you asking about the product, reporting a problem, or something else? \
You can also say 'log a bug' or 'create a story' to file one directly.";

/// The outcome of classifying one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    /// When set, the turn terminates here: this is the disambiguation prompt
    /// and no handler runs.
    pub clarify_response: Option<String>,
}

impl Classification {
    fn of(intent: Intent) -> Self {
        Self {
            intent,
            clarify_response: None,
        }
    }
}

/// The per-turn intent classifier.
pub struct IntentClassifier {
    completion: Arc<dyn CompletionService>,
}

impl IntentClassifier {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Classify the current turn.  Never fails: every error path resolves to
    /// a routable intent or a clarify response.
    pub async fn classify(&self, state: &SessionState) -> Classification {
        let input = state.user_input.trim().to_lowercase();

        // Level 1-2: sticky confirmations. A pending template plus a
        // confirmation keyword is unambiguous regardless of the model.
        if state.bug_template.is_some() && keywords::BUG_CONFIRMATION.matches(&input) {
            debug!("sticky bug confirmation");
            return Classification::of(Intent::BugLog);
        }
        if state.story_template.is_some() && keywords::STORY_CONFIRMATION.matches(&input) {
            debug!("sticky story confirmation");
            return Classification::of(Intent::StoryLog);
        }

        // Level 3: explicit bug-logging phrases bypass the model.
        if keywords::BUG_PHRASES.matches(&input) {
            debug!("bug phrase override");
            return Classification::of(Intent::BugLog);
        }

        // Level 4: greetings.
        if keywords::is_greeting(&input) {
            debug!("greeting token match");
            return Classification::of(Intent::Greeting);
        }

        // Level 5: ask the model, falling back to keyword bias when the
        // label is outside the allowed set or the call fails.
        let label = match self.model_label(state).await {
            Ok(label) if Intent::is_allowed_model_label(&label) => label,
            Ok(other) => {
                warn!(label = %other, "model label outside allowed set, applying keyword bias");
                bias_correct(&input).to_owned()
            }
            Err(e) => {
                warn!(error = %e, "classifier model call failed, treating as clarify");
                "clarify".to_owned()
            }
        };

        // Level 6: clarify resolution. Product context must never fall
        // through to ambiguity.
        if label == "clarify" {
            if keywords::PRODUCT_KEYWORDS.matches(&input) {
                debug!("clarify resolved to product_question by keyword bias");
                return Classification::of(Intent::ProductQuestion);
            }
            return Classification {
                intent: Intent::Clarify,
                clarify_response: Some(CLARIFY_RESPONSE.to_owned()),
            };
        }

        Classification::of(Intent::from_label(&label))
    }

    async fn model_label(&self, state: &SessionState) -> triage_adapters::Result<String> {
        let user = format!(
            "Chat so far:\n{}\n\nUser now said:\n{}",
            state.history, state.user_input
        );
        let raw = self.completion.complete(Some(CLASSIFIER_PROMPT), &user).await?;
        Ok(sanitize_label(&raw))
    }
}

/// Keyword-bias correction for labels outside the allowed set.
fn bias_correct(input: &str) -> &'static str {
    if keywords::PRODUCT_KEYWORDS.matches(input) {
        "product_question"
    } else if keywords::is_greeting(input) {
        "greeting"
    } else {
        "clarify"
    }
}

/// Reduce a model reply to a bare label: lowercase, stripped of whitespace,
/// quotes, and trailing punctuation.
fn sanitize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .trim_matches(['"', '\'', '`', '.', ':', ' '])
        .to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_decoration() {
        assert_eq!(sanitize_label("  Bug_Log.\n"), "bug_log");
        assert_eq!(sanitize_label("\"greeting\""), "greeting");
        assert_eq!(sanitize_label("'clarify'"), "clarify");
    }

    #[test]
    fn bias_prefers_product_over_greeting() {
        // "hi, the dashboard is broken" has both signals; product wins.
        assert_eq!(bias_correct("hi, the dashboard is broken"), "product_question");
        assert_eq!(bias_correct("hello there"), "greeting");
        assert_eq!(bias_correct("qwzx"), "clarify");
    }
}
