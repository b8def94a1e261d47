//! Conversational handlers: greeting, farewell, fallback, general chat, and
//! the web-search fallback.
//!
//! General chat is the only one with control flow: a forced-trigger phrase or
//! a hedging model answer reroutes the turn to web search and relabels the
//! intent, so the response shape tells the caller where the answer came from.

use tracing::warn;

use triage_store::SessionState;

use crate::handlers::TurnContext;
use crate::intent::Intent;
use crate::keywords;
use crate::router::Handler;

const GREETING_RESPONSE: &str = "Hello! Welcome to the product support assistant. \
I can answer questions about the app's features and workflows, troubleshoot \
issues, and log bugs or user stories in the tracker. What can I do for you today?";

const FAREWELL_RESPONSE: &str = "Thanks for stopping by! If you need help later, \
just ping me anytime.";

const FALLBACK_RESPONSE: &str = "I didn't quite catch that. I can answer product \
questions, help troubleshoot, or log a bug or user story -- what would you like \
to do?";

const GENERAL_CHAT_PROMPT: &str = "You are a smart and friendly assistant. \
Respond conversationally like a helpful human teammate. You can use the full \
chat history. If you are unsure or don't know something, say: 'I don't know.'";

/// Canned greeting.
pub fn greeting(state: &mut SessionState) {
    state.node = Handler::Greeting.name().to_owned();
    state.response = GREETING_RESPONSE.to_owned();
}

/// Canned farewell.
pub fn farewell(state: &mut SessionState) {
    state.node = Handler::Farewell.name().to_owned();
    state.response = FAREWELL_RESPONSE.to_owned();
}

/// Generic responder for intents nothing else claims.
pub fn fallback(state: &mut SessionState) {
    state.node = Handler::Fallback.name().to_owned();
    state.response = FALLBACK_RESPONSE.to_owned();
}

/// Open-ended chat over the session history.
///
/// Forced-trigger phrases (news, weather, prices) skip the model entirely;
/// an empty or hedging answer falls back to web search.  Both fallback paths
/// relabel the turn as `web_search`.
pub async fn general_chat(ctx: &TurnContext, state: &mut SessionState) {
    let query = state.user_input.trim().to_owned();

    if keywords::WEB_SEARCH_TRIGGERS.matches(&query.to_lowercase()) {
        return web_search(ctx, state).await;
    }

    ctx.think(state, "Answering from the chat history...").await;
    let user = format!(
        "Chat so far:\n{}\n\nUser now asked:\n{}",
        state.history, query
    );

    match ctx.completion.complete(Some(GENERAL_CHAT_PROMPT), &user).await {
        Ok(answer) if !hedges(&answer) => {
            state.node = Handler::GeneralChat.name().to_owned();
            state.intent = Intent::GeneralChat.as_str().to_owned();
            state.kind = state.intent.clone();
            state.response = answer;
        }
        Ok(_) => {
            ctx.think(state, "The model came up empty; searching the web instead...").await;
            web_search(ctx, state).await;
        }
        Err(e) => {
            warn!(error = %e, "general chat completion failed, falling back to web search");
            web_search(ctx, state).await;
        }
    }
}

/// Whether the model's answer is empty or admits it does not know.
fn hedges(answer: &str) -> bool {
    let lowered = answer.trim().to_lowercase();
    lowered.is_empty() || lowered.contains("i don't know") || lowered.contains("not sure")
}

/// Answer from the web-search collaborator, citing the source.
pub async fn web_search(ctx: &TurnContext, state: &mut SessionState) {
    state.node = Handler::WebSearch.name().to_owned();
    state.intent = Intent::WebSearch.as_str().to_owned();
    state.kind = state.intent.clone();

    ctx.think(state, "Searching the web...").await;
    match ctx.web.search(state.user_input.trim()).await {
        Ok(answer) if !answer.text.is_empty() => {
            state.response = match answer.source {
                Some(url) => format!("{}\n(Source: {})", answer.text, url),
                None => answer.text,
            };
        }
        Ok(_) => {
            state.response = "I couldn't find anything helpful online.".to_owned();
        }
        Err(e) => {
            warn!(error = %e, "web search failed");
            state.response =
                "I couldn't reach web search right now. Please try again in a moment.".to_owned();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
