//! The template builder, generic over the bug and story domains.
//!
//! Before generating anything the builder tries two cheaper exits: a "show
//! details" follow-up on the last surfaced item, and a duplicate check
//! against the similarity index.  Only a genuinely new description reaches
//! the bounded generation machine.

use tracing::warn;

use triage_store::SessionState;

use crate::handlers::{TurnContext, retrieval};
use crate::keywords;
use crate::template::{BuildOutcome, TemplateDomain, generate};

/// How many candidates to pull for the duplicate check.
const DUPLICATE_K: usize = 5;

pub async fn build<D: TemplateDomain>(ctx: &TurnContext, state: &mut SessionState) {
    // Precondition: nothing pending in either domain.  The router already
    // guarantees this for the matching domain; checking both is what keeps
    // the at-most-one-template invariant unconditional.
    if state.has_pending_template() {
        return;
    }
    state.node = D::builder_handler().name().to_owned();

    let description = state.user_input.trim().to_owned();
    let reply = description.to_lowercase();

    // 1. "Show details" follow-up instead of building a template.
    if let Some(entity) = state.last_entity.clone() {
        if keywords::DETAILS_REQUEST.matches(&reply) {
            ctx.think(state, format!("User requested details for '{}'.", entity.title)).await;
            state.response = format!(
                "{}\n\nIf you still want a new {}, just say 'log {}' or describe it.",
                retrieval::details_card(&entity),
                D::NAME,
                D::NAME,
            );
            return;
        }
    }

    // 2. Duplicate check against the similarity index.  A search failure is
    // survivable: we just build without the check.
    ctx.think(state, format!("Checking for existing items similar to this {}...", D::NAME)).await;
    match ctx.similarity.search_similar(&description, DUPLICATE_K).await {
        Ok(items) => {
            if let Some(duplicate) = retrieval::strong_match(&items, &description) {
                ctx.think(
                    state,
                    format!("Found a likely duplicate: {} (ID: {}).", duplicate.title, duplicate.id),
                )
                .await;
                state.last_entity = Some(duplicate.clone());
                state.response = retrieval::similar_item_card(duplicate);
                state.retrieval_context = Some(items);
                return;
            }
            state.retrieval_context = Some(items);
        }
        Err(e) => {
            warn!(error = %e, domain = D::NAME, "duplicate check failed, building anyway");
        }
    }

    // 3. Bounded generation.
    ctx.think(state, format!("Generating a {} template from the description...", D::NAME)).await;
    let context = state.retrieval_context.as_deref();
    match generate::<D>(&ctx.completion, &description, context).await {
        BuildOutcome::Built(record) => {
            state.response = format!(
                "Here's your auto-generated {} template. Reply 'log it' to submit it, \
                 or reply with any edits to update the template:\n\n{}",
                D::NAME,
                D::render(&record),
            );
            D::set_template(state, Some(record));
        }
        BuildOutcome::GaveUp => {
            D::set_template(state, None);
            state.response = format!(
                "Sorry, I couldn't auto-generate a {} from your description right now. \
                 You can provide the fields directly in this format:\n{}",
                D::NAME,
                D::manual_format_hint(),
            );
        }
    }
}
