//! Turn routing.
//!
//! A pure, total function from (intent, pending-template flags) to a handler.
//! Totality is the contract: every intent value, including `Unknown`, maps to
//! a defined handler, so no label can ever abort a turn.

use crate::intent::Intent;

/// The handlers a turn can be dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    BugTemplateBuilder,
    BugSubmission,
    StoryTemplateBuilder,
    StorySubmission,
    Greeting,
    Farewell,
    GeneralChat,
    ProductQuestion,
    WebSearch,
    /// Generic "didn't understand" responder for unmapped intents.
    Fallback,
}

impl Handler {
    /// The audit-trail name recorded in `SessionState::node`.
    pub fn name(self) -> &'static str {
        match self {
            Self::BugTemplateBuilder => "bug_template_builder",
            Self::BugSubmission => "bug_submission",
            Self::StoryTemplateBuilder => "story_template_builder",
            Self::StorySubmission => "story_submission",
            Self::Greeting => "greeting",
            Self::Farewell => "farewell",
            Self::GeneralChat => "general_chat",
            Self::ProductQuestion => "product_question",
            Self::WebSearch => "web_search",
            Self::Fallback => "fallback",
        }
    }
}

/// Select the handler for a turn.
///
/// The two-phase template lifecycle lives here: a `bug_log` intent goes to
/// the builder until a bug template is pending, then to submission; the
/// story flow is symmetric.  `Clarify` is terminal in the classifier, so if
/// it ever reaches the router it gets the fallback responder like any other
/// unmapped label.
pub fn route(intent: &Intent, has_bug_template: bool, has_story_template: bool) -> Handler {
    match intent {
        Intent::BugLog if has_bug_template => Handler::BugSubmission,
        Intent::BugLog => Handler::BugTemplateBuilder,
        Intent::StoryLog if has_story_template => Handler::StorySubmission,
        Intent::StoryLog => Handler::StoryTemplateBuilder,
        Intent::Greeting => Handler::Greeting,
        Intent::Farewell => Handler::Farewell,
        Intent::GeneralChat => Handler::GeneralChat,
        Intent::ProductQuestion => Handler::ProductQuestion,
        Intent::WebSearch => Handler::WebSearch,
        Intent::Clarify | Intent::Unknown(_) => Handler::Fallback,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bug_log_routes_by_template_presence() {
        assert_eq!(route(&Intent::BugLog, false, false), Handler::BugTemplateBuilder);
        assert_eq!(route(&Intent::BugLog, true, false), Handler::BugSubmission);
    }

    #[test]
    fn story_log_routes_by_template_presence() {
        assert_eq!(route(&Intent::StoryLog, false, false), Handler::StoryTemplateBuilder);
        assert_eq!(route(&Intent::StoryLog, false, true), Handler::StorySubmission);
    }

    #[test]
    fn conversational_intents_map_directly() {
        assert_eq!(route(&Intent::Greeting, false, false), Handler::Greeting);
        assert_eq!(route(&Intent::Farewell, false, false), Handler::Farewell);
        assert_eq!(route(&Intent::GeneralChat, false, false), Handler::GeneralChat);
        assert_eq!(route(&Intent::ProductQuestion, false, false), Handler::ProductQuestion);
        assert_eq!(route(&Intent::WebSearch, false, false), Handler::WebSearch);
    }

    #[test]
    fn unknown_intents_fall_back_instead_of_failing() {
        assert_eq!(route(&Intent::Unknown("gibberish".into()), false, false), Handler::Fallback);
        assert_eq!(route(&Intent::Clarify, false, false), Handler::Fallback);
    }

    #[test]
    fn router_is_total_over_all_flag_combinations() {
        let intents = [
            Intent::Greeting,
            Intent::Farewell,
            Intent::GeneralChat,
            Intent::ProductQuestion,
            Intent::BugLog,
            Intent::StoryLog,
            Intent::WebSearch,
            Intent::Clarify,
            Intent::Unknown("x".into()),
        ];

        for intent in &intents {
            for has_bug in [false, true] {
                for has_story in [false, true] {
                    // Must return a handler for every combination; the
                    // assertion is that this never panics and the name is
                    // non-empty.
                    let handler = route(intent, has_bug, has_story);
                    assert!(!handler.name().is_empty());
                }
            }
        }
    }
}
