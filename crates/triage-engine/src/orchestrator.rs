//! The turn orchestrator.
//!
//! One entry point per transport style: [`Orchestrator::handle_turn`] for
//! request/response and [`Orchestrator::handle_turn_stream`] for SSE.  Both
//! run the same pipeline: lock the session, load or initialize its state,
//! classify, route, dispatch, then persist the state and the transcript turn.
//! The per-session lock is held for the whole turn, so turns within one
//! session serialize while distinct sessions run concurrently.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use triage_adapters::{CompletionService, SimilaritySearch, Tracker, WebSearch};
use triage_store::{SessionState, SessionStateStore, TranscriptStore, TranscriptTurn, TurnRole};

use crate::classifier::IntentClassifier;
use crate::error::{EngineError, Result};
use crate::events::TurnEvent;
use crate::handlers::{TurnContext, dispatch};
use crate::router::route;

/// Node name recorded when the classifier terminates a turn with a
/// disambiguation prompt instead of routing it.
const CLARIFY_NODE: &str = "clarify";

/// Streamed turns buffer this many events before the sender awaits.
const EVENT_BUFFER: usize = 32;

/// The session-state machine driver.
///
/// Owns the session and transcript stores and the collaborator handles; one
/// instance serves every session for the lifetime of the process.
pub struct Orchestrator {
    classifier: IntentClassifier,
    completion: Arc<dyn CompletionService>,
    similarity: Arc<dyn SimilaritySearch>,
    tracker: Arc<dyn Tracker>,
    web: Arc<dyn WebSearch>,
    sessions: SessionStateStore,
    transcripts: TranscriptStore,
}

impl Orchestrator {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        similarity: Arc<dyn SimilaritySearch>,
        tracker: Arc<dyn Tracker>,
        web: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(Arc::clone(&completion)),
            completion,
            similarity,
            tracker,
            web,
            sessions: SessionStateStore::new(),
            transcripts: TranscriptStore::new(),
        }
    }

    /// Run one turn to completion and return the persisted state snapshot.
    ///
    /// Infallible by construction: classification resolves every error path
    /// to a routable intent, handlers degrade collaborator failures into chat
    /// responses, and both stores are process-memory.
    pub async fn handle_turn(&self, session_id: &str, input: &str) -> SessionState {
        self.run_turn(session_id, input, None).await
    }

    /// Run one turn, streaming events as they happen.
    ///
    /// The receiver yields handler thoughts in generation order, then exactly
    /// one `response` (or `error` if the turn produced no response), then the
    /// terminal [`TurnEvent::Done`].  The turn runs to completion and its
    /// state is persisted even if the receiver is dropped mid-stream; only
    /// event delivery stops early.
    pub fn handle_turn_stream(
        self: &Arc<Self>,
        session_id: impl Into<String>,
        input: impl Into<String>,
    ) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = Arc::clone(self);
        let session_id = session_id.into();
        let input = input.into();

        tokio::spawn(async move {
            let state = this.run_turn(&session_id, &input, Some(tx.clone())).await;

            let final_event = if state.response.is_empty() {
                TurnEvent::Error("the turn produced no response".to_owned())
            } else {
                TurnEvent::Response(state.response)
            };

            if let Err(EngineError::ChannelClosed) = emit(&tx, final_event).await {
                debug!(session_id, "stream receiver dropped before the response");
                return;
            }
            let _ = emit(&tx, TurnEvent::Done).await;
        });

        rx
    }

    /// Clear a session's transcript.  Pending templates and the rest of the
    /// session state survive a reset, matching the reference behavior.
    pub fn reset_session(&self, session_id: &str) {
        self.transcripts.reset(session_id);
    }

    /// Snapshot of a session's transcript, oldest turn first.
    pub fn transcript(&self, session_id: &str) -> Vec<TranscriptTurn> {
        self.transcripts.turns(session_id)
    }

    /// Number of sessions with stored state.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The shared pipeline behind both entry points.
    async fn run_turn(
        &self,
        session_id: &str,
        input: &str,
        events: Option<mpsc::Sender<TurnEvent>>,
    ) -> SessionState {
        let turn_id = Uuid::now_v7();

        // Serialize turns within this session for the whole read-modify-write
        // cycle; the template invariant depends on it.
        let lock = self.sessions.turn_lock(session_id);
        let _guard = lock.lock().await;

        // History is rendered before the current turn is appended, so the
        // prompt-facing transcript never contains the input being classified.
        let history = self.transcripts.formatted(session_id);
        let mut state = self
            .sessions
            .get(session_id)
            .unwrap_or_else(|| SessionState::new(input));
        state.begin_turn(input, history);

        let classification = self.classifier.classify(&state).await;
        state.intent = classification.intent.as_str().to_owned();
        state.kind = state.intent.clone();

        match classification.clarify_response {
            Some(response) => {
                debug!(session_id, turn_id = %turn_id, "turn terminated by clarify prompt");
                state.node = CLARIFY_NODE.to_owned();
                state.response = response;
            }
            None => {
                let handler = route(
                    &classification.intent,
                    state.bug_template.is_some(),
                    state.story_template.is_some(),
                );
                info!(
                    session_id,
                    turn_id = %turn_id,
                    intent = %state.intent,
                    handler = handler.name(),
                    "dispatching turn"
                );

                let mut ctx = TurnContext::new(
                    Arc::clone(&self.completion),
                    Arc::clone(&self.similarity),
                    Arc::clone(&self.tracker),
                    Arc::clone(&self.web),
                );
                if let Some(tx) = events {
                    ctx = ctx.with_events(tx);
                }
                dispatch(&ctx, handler, &mut state).await;
            }
        }

        self.sessions.put(session_id, state.clone());
        self.transcripts.append(session_id, TurnRole::User, input);
        self.transcripts.append(session_id, TurnRole::Agent, &state.response);

        state
    }
}

/// Send one event, distinguishing a closed channel from success so the
/// caller can stop emitting.
async fn emit(events: &mpsc::Sender<TurnEvent>, event: TurnEvent) -> Result<()> {
    events.send(event).await.map_err(|_| EngineError::ChannelClosed)
}
