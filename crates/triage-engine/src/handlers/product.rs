//! Product Q&A.
//!
//! A four-step pipeline, each step short-circuiting the rest:
//!
//! 1. "Show details" follow-up answered from `last_entity`.
//! 2. Similarity search; a strong match becomes a "similar item exists" card.
//! 3. Tracker keyword search with the same short-circuit rule.
//! 4. Contextual answer from the completion service, with an offer to log a
//!    bug or story when the input hints at one.

use tracing::warn;

use triage_store::SessionState;

use crate::handlers::{TurnContext, retrieval};
use crate::keywords;
use crate::router::Handler;

const PRODUCT_PROMPT: &str = "You are a highly skilled, empathetic AI product \
specialist for this web application. Use the CONTEXT to answer user questions \
or requests, or offer to log a new bug/story if nothing relevant is found. \
Be specific and helpful. If you are unsure, clarify or ask for more info, but \
always offer the next step.";

/// How many items to pull per retrieval source.
const RETRIEVAL_K: usize = 5;

pub async fn product_question(ctx: &TurnContext, state: &mut SessionState) {
    state.node = Handler::ProductQuestion.name().to_owned();
    let input = state.user_input.trim().to_owned();
    let reply = input.to_lowercase();

    // 1. Follow-up on the previously surfaced item.
    if let Some(entity) = state.last_entity.clone() {
        if keywords::DETAILS_REQUEST.matches(&reply) {
            ctx.think(state, format!("User requested details for '{}'.", entity.title)).await;
            state.response = retrieval::details_card(&entity);
            return;
        }
    }

    // 2. Similarity search over the knowledge index.
    ctx.think(state, "Searching the knowledge index for similar work items...").await;
    let semantic = match ctx.similarity.search_similar(&input, RETRIEVAL_K).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "similarity search failed, continuing without it");
            Vec::new()
        }
    };
    state.retrieval_context = Some(semantic.clone());

    if let Some(found) = retrieval::strong_match(&semantic, &input) {
        ctx.think(state, format!("Found a strong match: {} (ID: {}).", found.title, found.id)).await;
        state.last_entity = Some(found.clone());
        state.response = retrieval::similar_item_card(found);
        return;
    }

    // 3. Tracker keyword search across stories, bugs, features, and wikis.
    ctx.think(state, "No strong index match. Searching the tracker by keywords...").await;
    match ctx.tracker.search_items(&input, RETRIEVAL_K).await {
        Ok(results) => {
            let combined = results.combined();
            if !combined.is_empty() {
                state.retrieval_context = Some(combined.clone());
            }
            if let Some(found) = retrieval::strong_match(&combined, &input) {
                ctx.think(
                    state,
                    format!("Found a tracker keyword match: {} (ID: {}).", found.title, found.id),
                )
                .await;
                state.last_entity = Some(found.clone());
                state.response = retrieval::similar_item_card(found);
                return;
            }
        }
        Err(e) => {
            warn!(error = %e, "tracker keyword search failed, continuing without it");
        }
    }

    // 4. No match anywhere: answer from whatever context was retrieved.
    ctx.think(state, "No existing matches. Composing an answer from the retrieved context...").await;
    let context = retrieval::context_blocks(&semantic);
    let user = format!(
        "Chat so far:\n{}\n\nUser's latest question:\n{}\n\n---\nCONTEXT:\n{}\n---",
        state.history, input, context
    );

    let answer = match ctx.completion.complete(Some(PRODUCT_PROMPT), &user).await {
        Ok(answer) => answer.trim().to_owned(),
        Err(e) => {
            warn!(error = %e, "product answer completion failed");
            state.response = "I couldn't look that up right now. Please try again in a \
                              moment, or say 'log a bug' and I'll capture it for the team."
                .to_owned();
            return;
        }
    };

    state.response = answer + &log_offer(&reply, semantic.is_empty());
}

/// The offer appended after a contextual answer: log a bug or story when the
/// input hints at one, a generic capture offer when nothing was retrieved.
fn log_offer(reply: &str, nothing_found: bool) -> String {
    let mut offer = String::new();
    if keywords::BUG_HINTS.matches(reply) {
        offer.push_str("\n\nWould you like me to log this as a bug?");
    }
    if keywords::STORY_HINTS.matches(reply) {
        offer.push_str("\n\nWould you like me to log this as a user story?");
    }
    if offer.is_empty() && nothing_found {
        offer.push_str("\n\nWould you like me to log this for the team?");
    }
    offer.push_str("\n\nOr would you like to clarify, edit, or ask something else?");
    offer
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
