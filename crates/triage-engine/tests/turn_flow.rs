//! End-to-end turn flow tests for the triage-engine crate.
//!
//! These tests drive the orchestrator through full multi-turn conversations
//! against scripted collaborators, verifying classification, routing, the
//! template lifecycle, and the streaming event contract.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;

use triage_adapters::{
    AdapterError, CompletionService, CompletionStream, CreatedWorkItem, KnowledgeItem,
    Result as AdapterResult, SimilaritySearch, Tracker, TrackerSearchResults, WebAnswer,
    WebSearch, WorkItemKind,
};
use triage_engine::{Orchestrator, TurnEvent, TurnRole};

// ═══════════════════════════════════════════════════════════════════════
//  Scripted collaborators
// ═══════════════════════════════════════════════════════════════════════

/// Completion service that replays a fixed list of replies in order and
/// fails once the script runs dry.
struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| (*r).to_owned()).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, _system: Option<&str>, _user: &str) -> AdapterResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies.lock().unwrap().pop_front().ok_or(AdapterError::RequestFailed {
            service: "completion",
            reason: "script exhausted".into(),
        })
    }

    async fn complete_stream(
        &self,
        system: Option<&str>,
        user: &str,
    ) -> AdapterResult<CompletionStream> {
        let text = self.complete(system, user).await?;
        Ok(futures::stream::once(async move { Ok(text) }).boxed())
    }
}

/// Similarity search that always returns the same ranked items.
struct StubSimilarity {
    items: Vec<KnowledgeItem>,
}

#[async_trait]
impl SimilaritySearch for StubSimilarity {
    async fn search_similar(&self, _text: &str, k: usize) -> AdapterResult<Vec<KnowledgeItem>> {
        Ok(self.items.iter().take(k).cloned().collect())
    }
}

/// Tracker with empty keyword search and a creation call that either
/// succeeds with a fixed id or simulates an outage.
struct StubTracker {
    fail_creates: bool,
    created: Mutex<Vec<(WorkItemKind, Vec<(String, Value)>)>>,
}

impl StubTracker {
    fn new(fail_creates: bool) -> Arc<Self> {
        Arc::new(Self {
            fail_creates,
            created: Mutex::new(Vec::new()),
        })
    }

    fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl Tracker for StubTracker {
    async fn search_items(&self, _query: &str, _k: usize) -> AdapterResult<TrackerSearchResults> {
        Ok(TrackerSearchResults::default())
    }

    async fn create_item(
        &self,
        kind: WorkItemKind,
        fields: Vec<(String, Value)>,
    ) -> AdapterResult<CreatedWorkItem> {
        if self.fail_creates {
            return Err(AdapterError::UnexpectedStatus {
                service: "tracker",
                status: 503,
                detail: "simulated outage".into(),
            });
        }

        let title = fields
            .iter()
            .find(|(name, _)| name == "System.Title")
            .and_then(|(_, value)| value.as_str())
            .unwrap_or_default()
            .to_owned();
        self.created.lock().unwrap().push((kind, fields));

        Ok(CreatedWorkItem {
            id: 4312,
            title,
            url: Some("https://tracker.example/_workitems/edit/4312".into()),
        })
    }
}

/// Web search that always finds the same short answer.
struct StubWeb;

#[async_trait]
impl WebSearch for StubWeb {
    async fn search(&self, _query: &str) -> AdapterResult<WebAnswer> {
        Ok(WebAnswer {
            text: "Cacio e pepe takes fifteen minutes.".into(),
            source: Some("https://example.com/pasta".into()),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Test bed
// ═══════════════════════════════════════════════════════════════════════

struct TestBed {
    orchestrator: Arc<Orchestrator>,
    completion: Arc<ScriptedCompletion>,
    tracker: Arc<StubTracker>,
}

fn bed_with(replies: &[&str], similar: Vec<KnowledgeItem>, tracker_fails: bool) -> TestBed {
    let completion = ScriptedCompletion::new(replies);
    let tracker = StubTracker::new(tracker_fails);
    let orchestrator = Arc::new(Orchestrator::new(
        completion.clone(),
        Arc::new(StubSimilarity { items: similar }),
        tracker.clone(),
        Arc::new(StubWeb),
    ));

    TestBed {
        orchestrator,
        completion,
        tracker,
    }
}

fn bed(replies: &[&str]) -> TestBed {
    bed_with(replies, Vec::new(), false)
}

/// A generator reply with empty priority/severity so defaulting is visible.
const BUG_JSON: &str = r#"{"title": "Upload crashes", "description": "Crash on files over 1GB",
    "repro_steps": "", "priority": "", "severity": ""}"#;

// ═══════════════════════════════════════════════════════════════════════
//  Conversational turns
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn greeting_on_a_fresh_session() {
    let t = bed(&[]);
    let state = t.orchestrator.handle_turn("s1", "Hi").await;

    assert_eq!(state.intent, "greeting");
    assert_eq!(state.kind, "greeting");
    assert_eq!(state.node, "greeting");
    assert!(state.response.contains("product support assistant"));
    // The greeting rule fired before the model could be consulted.
    assert_eq!(t.completion.calls(), 0);

    let transcript = t.orchestrator.transcript("s1");
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, TurnRole::User);
    assert_eq!(transcript[1].role, TurnRole::Agent);
}

#[tokio::test]
async fn out_of_set_label_is_bias_corrected_to_product_question() {
    let t = bed(&["banana", "The dashboard loads widgets configured per user."]);
    let state = t.orchestrator.handle_turn("s1", "why is the dashboard empty").await;

    // "dashboard" is product vocabulary, so a garbage label must resolve to
    // product_question, never general_chat.
    assert_eq!(state.intent, "product_question");
    assert_eq!(state.node, "product_question");
    assert!(state.response.contains("widgets"));
}

#[tokio::test]
async fn ambiguous_turn_without_product_keywords_gets_clarify_prompt() {
    let t = bed(&["clarify"]);
    let state = t.orchestrator.handle_turn("s1", "hmm what about that other thing").await;

    assert_eq!(state.intent, "clarify");
    assert_eq!(state.node, "clarify");
    assert!(state.response.contains("log a bug"));
    // The clarify prompt still lands in the transcript like any response.
    assert_eq!(t.orchestrator.transcript("s1").len(), 2);
}

#[tokio::test]
async fn classifier_failure_with_product_keywords_still_answers_the_question() {
    // The empty script makes every completion call fail: classification
    // degrades to clarify, product keywords rescue it, and the product
    // handler degrades its own failed answer call into a retry suggestion.
    let t = bed(&[]);
    let state = t.orchestrator.handle_turn("s1", "the export page is broken").await;

    assert_eq!(state.intent, "product_question");
    assert!(state.response.contains("couldn't look that up"));
}

#[tokio::test]
async fn hedging_chat_answer_falls_back_to_web_search() {
    let t = bed(&["general_chat", "I don't know."]);
    let state = t.orchestrator.handle_turn("s1", "what's a good pasta recipe").await;

    assert_eq!(state.intent, "web_search");
    assert_eq!(state.node, "web_search");
    assert!(state.response.contains("Cacio e pepe"));
    assert!(state.response.contains("Source: https://example.com/pasta"));
}

#[tokio::test]
async fn forced_trigger_goes_to_web_search_without_a_chat_completion() {
    let t = bed(&["general_chat"]);
    let state = t.orchestrator.handle_turn("s1", "what are the latest news on rust").await;

    assert_eq!(state.intent, "web_search");
    // One call for classification, none for chat: the trigger phrase skipped
    // the model.
    assert_eq!(t.completion.calls(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Template build lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn explicit_bug_phrase_builds_a_template_with_defaults() {
    let t = bed(&[BUG_JSON]);
    let state = t
        .orchestrator
        .handle_turn("s1", "log a bug: upload crashes when the file is over 1GB")
        .await;

    assert_eq!(state.intent, "bug_log");
    assert_eq!(state.node, "bug_template_builder");

    let template = state.bug_template.expect("template pending after build");
    assert_eq!(template.title, "Upload crashes");
    assert_eq!(template.priority, 2);
    assert_eq!(template.severity, "3 - Medium");
    assert_eq!(template.repro_steps, "No steps provided");

    // The bug phrase bypassed the model; the single call was generation.
    assert_eq!(t.completion.calls(), 1);
    assert!(state.response.contains("log it"));
}

#[tokio::test]
async fn generation_retries_once_with_a_stricter_prompt() {
    let t = bed(&["sorry, no JSON from me today", BUG_JSON]);
    let state = t.orchestrator.handle_turn("s1", "log a bug: export hangs").await;

    assert_eq!(t.completion.calls(), 2);
    assert!(state.bug_template.is_some());
}

#[tokio::test]
async fn exhausted_generation_falls_back_to_manual_fields() {
    let t = bed(&["still prose", "more prose"]);
    let state = t.orchestrator.handle_turn("s1", "log a bug: export hangs").await;

    assert!(state.bug_template.is_none());
    assert!(state.response.contains("Title: ..."));
    // Attempts are bounded at two.
    assert_eq!(t.completion.calls(), 2);
}

#[tokio::test]
async fn near_duplicate_short_circuits_the_build() {
    let duplicate = KnowledgeItem {
        id: "991".into(),
        title: "Upload crashes on large files".into(),
        description: "Known crash past 1GB".into(),
        status: "Active".into(),
        work_item_type: "Bug".into(),
        similarity: 0.97,
        source: "work_item".into(),
    };
    let t = bed_with(&["product_question"], vec![duplicate], false);

    let state = t.orchestrator.handle_turn("s1", "log a bug: upload crashes").await;
    assert!(state.bug_template.is_none());
    assert!(state.response.contains("already exists"));
    assert_eq!(state.last_entity.as_ref().map(|e| e.id.as_str()), Some("991"));

    // "yes" resolves against the surfaced item instead of building anything.
    let state = t.orchestrator.handle_turn("s1", "yes, show me the details").await;
    assert!(state.response.contains("Here are the details for"));
    assert!(state.response.contains("991"));
    assert!(state.bug_template.is_none());
}

#[tokio::test]
async fn story_lifecycle_builds_and_submits() {
    const STORY_JSON: &str = r#"{"title": "CSV export", "description": "As a user I want to export reports as CSV", "acceptance_criteria": "", "story_points": ""}"#;
    let t = bed(&["story_log", STORY_JSON]);

    let state = t
        .orchestrator
        .handle_turn("s1", "I'd like to request csv export for reports")
        .await;

    assert_eq!(state.intent, "story_log");
    assert_eq!(state.node, "story_template_builder");
    let template = state.story_template.expect("story pending after build");
    assert_eq!(template.title, "CSV export");
    assert_eq!(template.story_points, 1.0);
    assert_eq!(template.acceptance_criteria, "N/A");

    // The sticky story rule catches the confirmation without a model call.
    let calls_after_build = t.completion.calls();
    let state = t.orchestrator.handle_turn("s1", "looks right, add as story").await;

    assert_eq!(state.node, "story_submission");
    assert!(state.response.contains("4312"));
    assert!(state.story_template.is_none());
    assert_eq!(t.tracker.created_count(), 1);
    assert_eq!(t.completion.calls(), calls_after_build);
}

#[tokio::test]
async fn second_domain_request_never_violates_template_exclusivity() {
    let t = bed(&[BUG_JSON, "story_log"]);
    t.orchestrator.handle_turn("s1", "log a bug: upload crashes").await;

    let state = t
        .orchestrator
        .handle_turn("s1", "I want exporting as a csv, make that a user request")
        .await;

    // The builder refuses to start a second template while one is pending.
    assert!(state.bug_template.is_some());
    assert!(state.story_template.is_none());
}

// ═══════════════════════════════════════════════════════════════════════
//  Submission lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn confirmation_submits_and_clears_the_template() {
    let t = bed(&[BUG_JSON]);
    t.orchestrator.handle_turn("s1", "log a bug: upload crashes").await;
    let calls_after_build = t.completion.calls();

    let state = t.orchestrator.handle_turn("s1", "ok, log it").await;

    assert_eq!(state.intent, "bug_log");
    assert_eq!(state.node, "bug_submission");
    assert!(state.response.contains("4312"));
    assert!(state.response.contains("Upload crashes"));
    assert!(state.bug_template.is_none());
    assert_eq!(t.tracker.created_count(), 1);

    // The sticky rule decided the intent; the model was never consulted.
    assert_eq!(t.completion.calls(), calls_after_build);
}

#[tokio::test]
async fn non_confirmation_keeps_the_template_and_asks_again() {
    let t = bed(&[BUG_JSON, "bug_log"]);
    let built = t.orchestrator.handle_turn("s1", "log a bug: upload crashes").await;
    let pending = built.bug_template.expect("template pending");

    let state = t.orchestrator.handle_turn("s1", "maybe later").await;

    assert_eq!(state.node, "bug_submission");
    assert!(state.response.contains("confirm"));
    assert_eq!(state.bug_template, Some(pending));
    assert_eq!(t.tracker.created_count(), 0);
}

#[tokio::test]
async fn tracker_failure_preserves_the_template_for_retry() {
    let t = bed_with(&[BUG_JSON], Vec::new(), true);
    let built = t.orchestrator.handle_turn("s1", "log a bug: upload crashes").await;
    let pending = built.bug_template.expect("template pending");

    let state = t.orchestrator.handle_turn("s1", "log it").await;

    assert!(state.response.contains("Failed to submit"));
    assert!(state.response.contains("simulated outage"));
    assert_eq!(state.bug_template, Some(pending));
}

// ═══════════════════════════════════════════════════════════════════════
//  Sessions and streaming
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn sessions_are_isolated() {
    let t = bed(&[BUG_JSON]);
    t.orchestrator.handle_turn("a", "log a bug: upload crashes").await;
    let state_b = t.orchestrator.handle_turn("b", "Hi").await;

    assert!(state_b.bug_template.is_none());
    assert_eq!(t.orchestrator.transcript("a").len(), 2);
    assert_eq!(t.orchestrator.transcript("b").len(), 2);
    assert_eq!(t.orchestrator.session_count(), 2);
}

#[tokio::test]
async fn reset_clears_the_transcript_but_keeps_pending_state() {
    let t = bed(&[BUG_JSON]);
    t.orchestrator.handle_turn("s1", "log a bug: upload crashes").await;

    t.orchestrator.reset_session("s1");
    assert!(t.orchestrator.transcript("s1").is_empty());

    // The pending template survived the reset; confirmation still works.
    let state = t.orchestrator.handle_turn("s1", "log it").await;
    assert!(state.response.contains("4312"));
}

#[tokio::test]
async fn streamed_turn_emits_thoughts_then_response_then_done() {
    let t = bed(&[BUG_JSON]);
    let mut rx = t.orchestrator.handle_turn_stream("s1", "log a bug: upload crashes");

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(events.len() >= 3, "expected thoughts + response + done, got {events:?}");
    assert!(matches!(events.last(), Some(TurnEvent::Done)));
    assert!(matches!(events[events.len() - 2], TurnEvent::Response(_)));
    assert!(events[..events.len() - 2]
        .iter()
        .all(|e| matches!(e, TurnEvent::Thought(_))));

    // The streamed turn persisted its state: confirmation works next turn.
    let state = t.orchestrator.handle_turn("s1", "log it").await;
    assert!(state.bug_template.is_none());
    assert_eq!(t.tracker.created_count(), 1);
}

#[tokio::test]
async fn streamed_no_op_turn_terminates_with_error_then_done() {
    let t = bed(&[BUG_JSON, "story_log"]);
    t.orchestrator.handle_turn("s1", "log a bug: upload crashes").await;

    // A story request while a bug is pending is a handler no-op, so the
    // stream has no response to deliver.
    let mut rx = t
        .orchestrator
        .handle_turn_stream("s1", "I want exporting as a csv, make that a user request");

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events[events.len() - 2], TurnEvent::Error(_)));
    assert!(matches!(events.last(), Some(TurnEvent::Done)));
}
