//! The per-session state record and the pending template types.
//!
//! [`SessionState`] is one exhaustively-defined struct: every handler reads
//! and writes the same fields, so there is no duck-typed merging of partial
//! states between handler versions.  The template types own their own
//! normalization so the builder and the submission handler cannot drift
//! apart on defaulting rules.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use triage_adapters::KnowledgeItem;

// ═══════════════════════════════════════════════════════════════════════
//  Session state
// ═══════════════════════════════════════════════════════════════════════

/// All state carried for one session between turns.
///
/// Owned by the orchestrator; mutated by exactly one handler per turn and
/// written back to the [`crate::SessionStateStore`] at end of turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// The current turn's raw input text.
    #[serde(default)]
    pub user_input: String,

    /// Legacy duplicate of `intent`, kept for response-shape compatibility.
    #[serde(default, rename = "type")]
    pub kind: String,

    /// Classification output; drives routing.
    #[serde(default)]
    pub intent: String,

    /// Name of the handler that last produced a response.
    #[serde(default)]
    pub node: String,

    /// The turn's final user-facing text.
    #[serde(default)]
    pub response: String,

    /// Formatted transcript injected into model prompts; recomputed from the
    /// transcript store at the start of every turn.
    #[serde(default)]
    pub history: String,

    /// Most recent retrieval results (similarity + tracker search).
    #[serde(default, rename = "ado_context")]
    pub retrieval_context: Option<Vec<KnowledgeItem>>,

    /// Most recently surfaced item, for "yes / show details" follow-ups.
    #[serde(default)]
    pub last_entity: Option<KnowledgeItem>,

    /// Pending bug record awaiting confirmation. Non-null means "awaiting
    /// confirmation"; at most one of `bug_template` / `story_template` is
    /// non-null at any time.
    #[serde(default)]
    pub bug_template: Option<BugTemplate>,

    /// Pending story record awaiting confirmation.
    #[serde(default)]
    pub story_template: Option<StoryTemplate>,

    /// Most recent progress thought, surfaced on the streaming path.
    #[serde(default)]
    pub thought: Option<String>,

    /// All progress thoughts recorded during the current turn.
    #[serde(default)]
    pub reasoning_steps: Vec<String>,
}

impl SessionState {
    /// Fresh state for a session's first turn.
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    /// Reset the per-turn fields and install the new input and history.
    /// Cross-turn fields (templates, `last_entity`, retrieval context) are
    /// left untouched.
    pub fn begin_turn(&mut self, user_input: impl Into<String>, history: impl Into<String>) {
        self.user_input = user_input.into();
        self.history = history.into();
        self.kind.clear();
        self.intent.clear();
        self.node.clear();
        self.response.clear();
        self.thought = None;
        self.reasoning_steps.clear();
    }

    /// Whether either template is awaiting confirmation.
    pub fn has_pending_template(&self) -> bool {
        self.bug_template.is_some() || self.story_template.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Template records
// ═══════════════════════════════════════════════════════════════════════

/// Field placeholder used when the generator left a value empty.
pub const EMPTY_FIELD: &str = "N/A";

/// Default bug priority.
pub const DEFAULT_BUG_PRIORITY: i64 = 2;

/// Default bug severity.
pub const DEFAULT_BUG_SEVERITY: &str = "3 - Medium";

/// Default reproduction steps.
pub const DEFAULT_REPRO_STEPS: &str = "No steps provided";

/// Default story points.
pub const DEFAULT_STORY_POINTS: f64 = 1.0;

/// A structured bug report awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugTemplate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repro_steps: String,
    /// Priority as a typed integer; `0` means "not yet normalized".
    #[serde(default, deserialize_with = "lenient_i64")]
    pub priority: i64,
    #[serde(default)]
    pub severity: String,
}

impl BugTemplate {
    /// Apply the defaulting rules. Total and idempotent: normalizing an
    /// already-normalized record is a no-op.
    pub fn normalize(mut self) -> Self {
        self.title = default_text(self.title, EMPTY_FIELD);
        self.description = default_text(self.description, EMPTY_FIELD);
        self.repro_steps = default_text(self.repro_steps, DEFAULT_REPRO_STEPS);
        self.severity = default_text(self.severity, DEFAULT_BUG_SEVERITY);
        if self.priority <= 0 {
            self.priority = DEFAULT_BUG_PRIORITY;
        }
        self
    }

    /// Pretty rendering for the confirmation message.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }

    /// Map to the tracker's reference field names, re-applying the
    /// defaulting rules as a second safety net.
    pub fn tracker_fields(&self) -> Vec<(String, Value)> {
        let normalized = self.clone().normalize();
        vec![
            ("System.Title".into(), json!(normalized.title)),
            ("System.Description".into(), json!(normalized.description)),
            ("Microsoft.VSTS.TCM.ReproSteps".into(), json!(normalized.repro_steps)),
            ("Microsoft.VSTS.Common.Priority".into(), json!(normalized.priority)),
            ("Microsoft.VSTS.Common.Severity".into(), json!(normalized.severity)),
        ]
    }
}

/// A structured user story awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryTemplate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: String,
    /// Story points; `0` means "not yet normalized".
    #[serde(default, deserialize_with = "lenient_f64")]
    pub story_points: f64,
}

impl StoryTemplate {
    /// Apply the defaulting rules. Total and idempotent.
    pub fn normalize(mut self) -> Self {
        self.title = default_text(self.title, EMPTY_FIELD);
        self.description = default_text(self.description, EMPTY_FIELD);
        self.acceptance_criteria = default_text(self.acceptance_criteria, EMPTY_FIELD);
        if self.story_points <= 0.0 {
            self.story_points = DEFAULT_STORY_POINTS;
        }
        self
    }

    /// Pretty rendering for the confirmation message.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }

    /// Map to the tracker's reference field names, re-applying the
    /// defaulting rules as a second safety net.
    pub fn tracker_fields(&self) -> Vec<(String, Value)> {
        let normalized = self.clone().normalize();
        vec![
            ("System.Title".into(), json!(normalized.title)),
            ("System.Description".into(), json!(normalized.description)),
            ("Microsoft.VSTS.Common.AcceptanceCriteria".into(), json!(normalized.acceptance_criteria)),
            ("Microsoft.VSTS.Scheduling.StoryPoints".into(), json!(normalized.story_points)),
        ]
    }
}

/// Replace an empty or placeholder value with its default.
fn default_text(value: String, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == EMPTY_FIELD {
        default.to_owned()
    } else {
        trimmed.to_owned()
    }
}

// Generators return numbers as strings often enough that strict numeric
// deserialization would throw away otherwise-usable records.

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_i64(&value))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value))
}

/// Best-effort integer coercion; `0` ("unset") when the value is absent or
/// unparseable, so `normalize` can apply the default.
pub fn coerce_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Best-effort float coercion; `0.0` when absent or unparseable.
pub fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bug_normalize_applies_defaults() {
        let template = BugTemplate {
            title: String::new(),
            description: "N/A".into(),
            repro_steps: "  ".into(),
            priority: 0,
            severity: String::new(),
        }
        .normalize();

        assert_eq!(template.title, "N/A");
        assert_eq!(template.description, "N/A");
        assert_eq!(template.repro_steps, "No steps provided");
        assert_eq!(template.priority, 2);
        assert_eq!(template.severity, "3 - Medium");
    }

    #[test]
    fn bug_normalize_is_idempotent() {
        let template = BugTemplate {
            title: "Upload crashes".into(),
            description: String::new(),
            repro_steps: String::new(),
            priority: 0,
            severity: "N/A".into(),
        };

        let once = template.normalize();
        let twice = once.clone().normalize();
        assert_eq!(once, twice);
    }

    #[test]
    fn bug_normalize_keeps_populated_fields() {
        let template = BugTemplate {
            title: "Export button dead".into(),
            description: "Clicking export does nothing".into(),
            repro_steps: "1. Open report 2. Click export".into(),
            priority: 1,
            severity: "2 - High".into(),
        };

        let normalized = template.clone().normalize();
        assert_eq!(normalized, template);
    }

    #[test]
    fn story_normalize_is_idempotent() {
        let template = StoryTemplate {
            title: String::new(),
            description: "As a user I want exports".into(),
            acceptance_criteria: String::new(),
            story_points: 0.0,
        };

        let once = template.normalize();
        assert_eq!(once.story_points, 1.0);
        assert_eq!(once.acceptance_criteria, "N/A");
        let twice = once.clone().normalize();
        assert_eq!(once, twice);
    }

    #[test]
    fn bug_template_parses_string_priority() {
        let template: BugTemplate = serde_json::from_value(serde_json::json!({
            "title": "T",
            "description": "D",
            "repro_steps": "R",
            "priority": "3",
            "severity": "1 - Critical"
        }))
        .unwrap();
        assert_eq!(template.priority, 3);
    }

    #[test]
    fn bug_template_tolerates_garbage_priority() {
        let template: BugTemplate = serde_json::from_value(serde_json::json!({
            "title": "T",
            "priority": "high"
        }))
        .unwrap();
        assert_eq!(template.priority, 0);
        assert_eq!(template.normalize().priority, 2);
    }

    #[test]
    fn bug_tracker_fields_use_reference_names() {
        let template = BugTemplate {
            title: "T".into(),
            description: "D".into(),
            repro_steps: String::new(),
            priority: 0,
            severity: String::new(),
        };

        let fields = template.tracker_fields();
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "System.Title",
                "System.Description",
                "Microsoft.VSTS.TCM.ReproSteps",
                "Microsoft.VSTS.Common.Priority",
                "Microsoft.VSTS.Common.Severity",
            ]
        );

        // Defaults applied even when the stored template was never normalized.
        assert_eq!(fields[3].1, json!(2));
        assert_eq!(fields[4].1, json!("3 - Medium"));
    }

    #[test]
    fn story_tracker_fields_emit_numeric_points() {
        let template = StoryTemplate {
            title: "S".into(),
            description: "D".into(),
            acceptance_criteria: "C".into(),
            story_points: 5.0,
        };

        let fields = template.tracker_fields();
        assert_eq!(fields[3].0, "Microsoft.VSTS.Scheduling.StoryPoints");
        assert_eq!(fields[3].1, json!(5.0));
    }

    #[test]
    fn state_begin_turn_preserves_cross_turn_fields() {
        let mut state = SessionState::new("log a bug");
        state.bug_template = Some(
            BugTemplate {
                title: "X".into(),
                description: String::new(),
                repro_steps: String::new(),
                priority: 2,
                severity: String::new(),
            }
            .normalize(),
        );
        state.response = "old response".into();
        state.reasoning_steps.push("old thought".into());

        state.begin_turn("log it", "User: log a bug");

        assert_eq!(state.user_input, "log it");
        assert!(state.response.is_empty());
        assert!(state.reasoning_steps.is_empty());
        assert!(state.bug_template.is_some());
    }

    #[test]
    fn state_serializes_legacy_field_names() {
        let mut state = SessionState::new("hi");
        state.kind = "greeting".into();
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("type").is_some());
        assert!(value.get("ado_context").is_some());
        assert!(value.get("kind").is_none());
    }
}
