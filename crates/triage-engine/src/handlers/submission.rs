//! The submission handler, generic over the bug and story domains.
//!
//! Gated on the domain's confirmation phrase table -- the same table the
//! classifier's sticky rule reads.  Success clears the pending template;
//! failure preserves it so the user can retry with another confirmation
//! instead of rebuilding from scratch.

use tracing::{info, warn};

use triage_store::SessionState;

use crate::handlers::TurnContext;
use crate::template::TemplateDomain;

pub async fn submit<D: TemplateDomain>(ctx: &TurnContext, state: &mut SessionState) {
    // Precondition: a pending template in this domain.  The router only
    // sends confirmed-intent turns here, so a missing template is a no-op.
    let Some(record) = D::template(state).cloned() else {
        return;
    };
    state.node = D::submission_handler().name().to_owned();

    if !D::confirmation_keywords().matches(&state.user_input.to_lowercase()) {
        state.response = format!(
            "To submit this {}, please confirm by saying something like 'log it' or \
             'submit {}'. You can also reply with edits, or say 'cancel' to drop it.",
            D::NAME,
            D::NAME,
        );
        return;
    }

    ctx.think(state, format!("Submitting the {} to the tracker...", D::NAME)).await;

    // Defaulting is re-applied inside the field mapping, so an edited or
    // hand-built template goes out normalized too.
    let fields = D::tracker_fields(&record);
    match ctx.tracker.create_item(D::work_item_kind(), fields).await {
        Ok(created) => {
            info!(domain = D::NAME, id = created.id, "work item created");
            state.response = format!(
                "{} successfully logged in the tracker!\n\
                 - ID: {}\n\
                 - Title: {}\n\
                 - Link: {}",
                D::TITLE,
                created.id,
                created.title,
                created.url.as_deref().unwrap_or("N/A"),
            );
            D::set_template(state, None);
        }
        Err(e) => {
            warn!(domain = D::NAME, error = %e, "work item creation failed, keeping template");
            state.response = format!(
                "Failed to submit the {} to the tracker. Please try again in a moment.\n\
                 Error: {e}\n\
                 {} details:\n{}",
                D::NAME,
                D::TITLE,
                D::render(&record),
            );
        }
    }
}
