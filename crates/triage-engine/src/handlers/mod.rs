//! Turn handlers.
//!
//! One module per concern: canned and model-backed chat in [`chat`], the
//! retrieval-driven product Q&A in [`product`], and the generic template
//! builder/submission pair in [`builder`] and [`submission`].  Every handler
//! takes the same shape: a [`TurnContext`] with the collaborators and a
//! mutable [`SessionState`] it writes its response into.  Handlers never
//! return errors; a collaborator failure becomes a degraded response.

pub mod builder;
pub mod chat;
pub mod product;
pub mod retrieval;
pub mod submission;

use std::sync::Arc;

use tokio::sync::mpsc;

use triage_adapters::{CompletionService, SimilaritySearch, Tracker, WebSearch};
use triage_store::SessionState;

use crate::events::TurnEvent;
use crate::router::Handler;
use crate::template::{BugDomain, StoryDomain};

/// Everything a handler needs for one turn.
///
/// On the streaming path an event sender is attached; [`TurnContext::think`]
/// then forwards each recorded thought as it happens.  On the non-streaming
/// path thoughts only accumulate in `SessionState::reasoning_steps`.
pub struct TurnContext {
    pub completion: Arc<dyn CompletionService>,
    pub similarity: Arc<dyn SimilaritySearch>,
    pub tracker: Arc<dyn Tracker>,
    pub web: Arc<dyn WebSearch>,
    events: Option<mpsc::Sender<TurnEvent>>,
}

impl TurnContext {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        similarity: Arc<dyn SimilaritySearch>,
        tracker: Arc<dyn Tracker>,
        web: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            completion,
            similarity,
            tracker,
            web,
            events: None,
        }
    }

    /// Attach the streaming event channel.
    pub fn with_events(mut self, events: mpsc::Sender<TurnEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Record a progress thought and forward it to the stream if one is
    /// attached.  A dropped receiver is not an error: the turn still runs to
    /// completion so its state lands in the store.
    pub async fn think(&self, state: &mut SessionState, text: impl Into<String>) {
        let text = text.into();
        state.thought = Some(text.clone());
        state.reasoning_steps.push(text.clone());

        if let Some(events) = &self.events {
            let _ = events.send(TurnEvent::Thought(text)).await;
        }
    }
}

/// Run the routed handler against the session state.
pub async fn dispatch(ctx: &TurnContext, handler: Handler, state: &mut SessionState) {
    match handler {
        Handler::Greeting => chat::greeting(state),
        Handler::Farewell => chat::farewell(state),
        Handler::Fallback => chat::fallback(state),
        Handler::GeneralChat => chat::general_chat(ctx, state).await,
        Handler::WebSearch => chat::web_search(ctx, state).await,
        Handler::ProductQuestion => product::product_question(ctx, state).await,
        Handler::BugTemplateBuilder => builder::build::<BugDomain>(ctx, state).await,
        Handler::StoryTemplateBuilder => builder::build::<StoryDomain>(ctx, state).await,
        Handler::BugSubmission => submission::submit::<BugDomain>(ctx, state).await,
        Handler::StorySubmission => submission::submit::<StoryDomain>(ctx, state).await,
    }
}
