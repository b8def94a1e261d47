//! The intent type.
//!
//! Intents are a closed tagged union with an explicit [`Intent::Unknown`]
//! escape hatch: a label the engine has never heard of still produces a
//! routable value instead of crashing the turn.

use serde::{Deserialize, Serialize};

/// Labels the model-backed classifier is allowed to return.  Anything else
/// goes through keyword-bias correction.
pub const ALLOWED_MODEL_LABELS: &[&str] = &[
    "product_question",
    "bug_log",
    "story_log",
    "general_chat",
    "greeting",
    "clarify",
];

/// The classified purpose of a user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Farewell,
    GeneralChat,
    ProductQuestion,
    BugLog,
    StoryLog,
    WebSearch,
    /// The turn is too ambiguous to route; the classifier answers with a
    /// disambiguation prompt instead.
    Clarify,
    /// A label the engine does not recognize.  Routes to the fallback
    /// responder.
    Unknown(String),
}

impl Intent {
    /// Parse a label into an intent, capturing unrecognized labels verbatim.
    pub fn from_label(label: &str) -> Self {
        match label {
            "greeting" => Self::Greeting,
            "farewell" => Self::Farewell,
            "general_chat" => Self::GeneralChat,
            "product_question" => Self::ProductQuestion,
            "bug_log" => Self::BugLog,
            "story_log" => Self::StoryLog,
            "web_search" => Self::WebSearch,
            "clarify" => Self::Clarify,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// The wire label for this intent.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Greeting => "greeting",
            Self::Farewell => "farewell",
            Self::GeneralChat => "general_chat",
            Self::ProductQuestion => "product_question",
            Self::BugLog => "bug_log",
            Self::StoryLog => "story_log",
            Self::WebSearch => "web_search",
            Self::Clarify => "clarify",
            Self::Unknown(label) => label,
        }
    }

    /// Whether `label` is in the classifier's allowed model label set.
    pub fn is_allowed_model_label(label: &str) -> bool {
        ALLOWED_MODEL_LABELS.contains(&label)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_round_trip() {
        for label in [
            "greeting",
            "farewell",
            "general_chat",
            "product_question",
            "bug_log",
            "story_log",
            "web_search",
            "clarify",
        ] {
            let intent = Intent::from_label(label);
            assert_eq!(intent.as_str(), label);
            assert!(!matches!(intent, Intent::Unknown(_)));
        }
    }

    #[test]
    fn unknown_labels_are_captured_not_lost() {
        let intent = Intent::from_label("banana");
        assert_eq!(intent, Intent::Unknown("banana".into()));
        assert_eq!(intent.as_str(), "banana");
    }

    #[test]
    fn allowed_model_labels_exclude_farewell_and_web_search() {
        assert!(Intent::is_allowed_model_label("bug_log"));
        assert!(Intent::is_allowed_model_label("clarify"));
        assert!(!Intent::is_allowed_model_label("farewell"));
        assert!(!Intent::is_allowed_model_label("web_search"));
    }
}
