//! Template generation machinery, generalized over the bug and story domains.
//!
//! A domain bundles everything that differs between the two record kinds:
//! prompts, normalization, which state slot the pending record lives in, and
//! the tracker mapping.  The build machine itself is shared and bounded:
//!
//! ```text
//! Attempt -> Parse -> Accept
//!                  -> Retry (stricter prompt, once)
//!                  -> GiveUp
//! ```
//!
//! Parsing takes the first balanced brace-delimited substring of the model
//! output, so prose wrapped around the JSON does not sink the attempt.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use triage_adapters::{CompletionService, KnowledgeItem, WorkItemKind};
use triage_store::{BugTemplate, SessionState, StoryTemplate};

use crate::keywords::{self, KeywordSet};
use crate::router::Handler;

/// Total attempts before the build machine gives up.
const MAX_ATTEMPTS: usize = 2;

// ---------------------------------------------------------------------------
// Domain trait
// ---------------------------------------------------------------------------

/// Everything that distinguishes the bug flow from the story flow.
///
/// The builder and submission handlers are generic over this trait; adding a
/// third record kind means implementing it once, not copying a handler.
pub trait TemplateDomain {
    type Record: DeserializeOwned + Serialize + Clone + Send + Sync;

    /// Lowercase noun used in user-facing text ("bug", "story").
    const NAME: &'static str;
    /// Capitalized noun for message openings.
    const TITLE: &'static str;

    fn work_item_kind() -> WorkItemKind;
    fn builder_handler() -> Handler;
    fn submission_handler() -> Handler;

    /// The confirmation phrase table shared with the classifier's sticky
    /// rule for this domain.
    fn confirmation_keywords() -> &'static KeywordSet;

    fn template(state: &SessionState) -> Option<&Self::Record>;
    fn set_template(state: &mut SessionState, record: Option<Self::Record>);

    fn generation_prompt(description: &str, context: Option<&[KnowledgeItem]>) -> String;
    /// Stricter reprompt used on the single retry.
    fn retry_prompt() -> &'static str;

    fn normalize(record: Self::Record) -> Self::Record;
    fn render(record: &Self::Record) -> String;
    fn tracker_fields(record: &Self::Record) -> Vec<(String, Value)>;

    /// Textual field format offered when generation gives up.
    fn manual_format_hint() -> &'static str;
}

/// The bug-report domain.
pub struct BugDomain;

impl TemplateDomain for BugDomain {
    type Record = BugTemplate;

    const NAME: &'static str = "bug";
    const TITLE: &'static str = "Bug";

    fn work_item_kind() -> WorkItemKind {
        WorkItemKind::Bug
    }

    fn builder_handler() -> Handler {
        Handler::BugTemplateBuilder
    }

    fn submission_handler() -> Handler {
        Handler::BugSubmission
    }

    fn confirmation_keywords() -> &'static KeywordSet {
        &keywords::BUG_CONFIRMATION
    }

    fn template(state: &SessionState) -> Option<&Self::Record> {
        state.bug_template.as_ref()
    }

    fn set_template(state: &mut SessionState, record: Option<Self::Record>) {
        state.bug_template = record;
    }

    fn generation_prompt(description: &str, context: Option<&[KnowledgeItem]>) -> String {
        format!(
            "You are an expert product support engineer. Generate a bug report \
             template in JSON from the user's exact description below. Do NOT ask \
             any follow-up questions. Populate all fields; if unsure, use the \
             allowed default values: for priority use 2, for severity use \
             '3 - Medium', for repro_steps use 'No steps provided'. Reply ONLY \
             with raw, valid JSON.\n\n\
             Required JSON keys: title, description, repro_steps, priority, severity.\
             \n\nUser description:\n{description}\n\nContext:{}\n\n\
             Return ONLY the JSON object, no explanation.",
            render_context(context)
        )
    }

    fn retry_prompt() -> &'static str {
        "Return only valid JSON for the previous bug template request. The JSON \
         MUST have these keys: title, description, repro_steps, priority, severity. \
         Use allowed default values for missing fields: priority=2, \
         severity='3 - Medium', repro_steps='No steps provided'."
    }

    fn normalize(record: Self::Record) -> Self::Record {
        record.normalize()
    }

    fn render(record: &Self::Record) -> String {
        record.render()
    }

    fn tracker_fields(record: &Self::Record) -> Vec<(String, Value)> {
        record.tracker_fields()
    }

    fn manual_format_hint() -> &'static str {
        "Title: ...\nDescription: ...\nRepro Steps: ...\nPriority: ...\nSeverity: ..."
    }
}

/// The user-story domain.
pub struct StoryDomain;

impl TemplateDomain for StoryDomain {
    type Record = StoryTemplate;

    const NAME: &'static str = "story";
    const TITLE: &'static str = "Story";

    fn work_item_kind() -> WorkItemKind {
        WorkItemKind::UserStory
    }

    fn builder_handler() -> Handler {
        Handler::StoryTemplateBuilder
    }

    fn submission_handler() -> Handler {
        Handler::StorySubmission
    }

    fn confirmation_keywords() -> &'static KeywordSet {
        &keywords::STORY_CONFIRMATION
    }

    fn template(state: &SessionState) -> Option<&Self::Record> {
        state.story_template.as_ref()
    }

    fn set_template(state: &mut SessionState, record: Option<Self::Record>) {
        state.story_template = record;
    }

    fn generation_prompt(description: &str, _context: Option<&[KnowledgeItem]>) -> String {
        format!(
            "You are an expert product manager. Given the user's description, \
             generate a clear, actionable user story template in JSON. Do NOT ask \
             follow-up questions. If unsure, use defaults: acceptance_criteria='N/A', \
             story_points=1. Reply ONLY with raw, valid JSON.\n\n\
             Required keys: title, description, acceptance_criteria, story_points.\
             \n\nUser description:\n{description}\n\n\
             Return ONLY the JSON object, no explanation."
        )
    }

    fn retry_prompt() -> &'static str {
        "Return only valid JSON for the previous story template request. The JSON \
         MUST have these keys: title, description, acceptance_criteria, story_points. \
         Use allowed default values: acceptance_criteria='N/A', story_points=1."
    }

    fn normalize(record: Self::Record) -> Self::Record {
        record.normalize()
    }

    fn render(record: &Self::Record) -> String {
        record.render()
    }

    fn tracker_fields(record: &Self::Record) -> Vec<(String, Value)> {
        record.tracker_fields()
    }

    fn manual_format_hint() -> &'static str {
        "Title: ...\nDescription: ...\nAcceptance Criteria: ...\nStory Points: ..."
    }
}

/// Render retrieved items as a short bullet list for the generation prompt.
fn render_context(context: Option<&[KnowledgeItem]>) -> String {
    let items: Vec<String> = context
        .unwrap_or_default()
        .iter()
        .take(5)
        .map(|item| format!("- {} (ID: {})", item.title, item.id))
        .collect();

    if items.is_empty() {
        " None".to_owned()
    } else {
        format!("\n{}", items.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// Build machine
// ---------------------------------------------------------------------------

/// Terminal states of the bounded build machine.
pub enum BuildOutcome<R> {
    /// A record was parsed and normalized.
    Built(R),
    /// Every attempt failed; the caller falls back to manual field entry.
    GaveUp,
}

/// Run the bounded generation machine for one domain.
///
/// The first attempt uses the full generation prompt; a parse failure earns
/// exactly one retry with the stricter reprompt.  A completion-service error
/// consumes an attempt like a parse failure does, so the machine can never
/// loop.
pub async fn generate<D: TemplateDomain>(
    completion: &Arc<dyn CompletionService>,
    description: &str,
    context: Option<&[KnowledgeItem]>,
) -> BuildOutcome<D::Record> {
    let mut prompt = D::generation_prompt(description, context);

    for attempt in 1..=MAX_ATTEMPTS {
        let raw = match completion.complete(None, &prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(domain = D::NAME, attempt, error = %e, "template generation call failed");
                String::new()
            }
        };

        match parse_record::<D>(&raw) {
            Some(record) => {
                debug!(domain = D::NAME, attempt, "template generated");
                return BuildOutcome::Built(D::normalize(record));
            }
            None => {
                warn!(domain = D::NAME, attempt, "no parseable record in generated text");
                prompt = D::retry_prompt().to_owned();
            }
        }
    }

    BuildOutcome::GaveUp
}

/// Parse the first balanced JSON object out of the model's reply.
fn parse_record<D: TemplateDomain>(raw: &str) -> Option<D::Record> {
    let json = extract_braced(raw)?;
    serde_json::from_str(json).ok()
}

/// The first balanced `{...}` substring of `text`, honoring string literals
/// and escapes so braces inside field values cannot unbalance the scan.
pub fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_braced_finds_plain_object() {
        assert_eq!(extract_braced(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn extract_braced_skips_surrounding_prose() {
        let text = "Sure! Here is the JSON:\n{\"title\": \"X\"}\nLet me know.";
        assert_eq!(extract_braced(text), Some("{\"title\": \"X\"}"));
    }

    #[test]
    fn extract_braced_handles_nested_objects() {
        let text = r#"{"outer": {"inner": 2}} trailing"#;
        assert_eq!(extract_braced(text), Some(r#"{"outer": {"inner": 2}}"#));
    }

    #[test]
    fn extract_braced_ignores_braces_inside_strings() {
        let text = r#"{"title": "uses { and } freely"}"#;
        assert_eq!(extract_braced(text), Some(text));
    }

    #[test]
    fn extract_braced_handles_escaped_quotes() {
        let text = r#"{"title": "she said \"hi\""}"#;
        assert_eq!(extract_braced(text), Some(text));
    }

    #[test]
    fn extract_braced_rejects_unbalanced_input() {
        assert_eq!(extract_braced(r#"{"a": 1"#), None);
        assert_eq!(extract_braced("no json here"), None);
    }

    #[test]
    fn bug_record_parses_from_wrapped_reply() {
        let raw = "Here you go:\n{\"title\": \"Upload crashes\", \"priority\": \"1\"}";
        let record = parse_record::<BugDomain>(raw).expect("parseable record");
        assert_eq!(record.title, "Upload crashes");
        assert_eq!(record.priority, 1);
    }

    #[test]
    fn bug_prompt_lists_context_items() {
        let items = vec![KnowledgeItem {
            id: "42".into(),
            title: "Export hangs".into(),
            ..Default::default()
        }];
        let prompt = BugDomain::generation_prompt("export is broken", Some(&items));
        assert!(prompt.contains("- Export hangs (ID: 42)"));
        assert!(prompt.contains("title, description, repro_steps, priority, severity"));
    }

    #[test]
    fn bug_prompt_without_context_says_none() {
        let prompt = BugDomain::generation_prompt("export is broken", None);
        assert!(prompt.contains("Context: None"));
    }
}
