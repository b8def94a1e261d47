//! Shared retrieval helpers.
//!
//! The strong-match rule and the response cards are used by both template
//! builders and the product-question handler, so they live here once.

use std::collections::HashSet;

use triage_adapters::KnowledgeItem;

/// A similarity score at or above this is treated as a duplicate.
pub const SIMILARITY_THRESHOLD: f64 = 0.93;

/// Wiki excerpts in context blocks are capped at this many characters.
const WIKI_EXCERPT_CHARS: usize = 700;

/// Words that carry signal: longer than two characters, lowercased.
pub fn significant_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Find the first item that matches the input strongly enough to count as a
/// duplicate: similarity at or above [`SIMILARITY_THRESHOLD`], or every
/// significant input word appearing among the title's words.
pub fn strong_match<'a>(items: &'a [KnowledgeItem], input: &str) -> Option<&'a KnowledgeItem> {
    let words = significant_words(input);

    items.iter().find(|item| {
        if item.similarity >= SIMILARITY_THRESHOLD {
            return true;
        }
        if words.is_empty() {
            return false;
        }
        let title_words: HashSet<String> = item
            .title
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        words.is_subset(&title_words)
    })
}

/// The item's kind in lowercase, with a generic fallback for wiki pages.
fn kind_label(item: &KnowledgeItem) -> String {
    if item.work_item_type.is_empty() {
        "item".to_owned()
    } else {
        item.work_item_type.to_lowercase()
    }
}

fn status_label(item: &KnowledgeItem) -> &str {
    if item.status.is_empty() { "Unknown" } else { &item.status }
}

/// "A similar item already exists" card.
pub fn similar_item_card(item: &KnowledgeItem) -> String {
    format!(
        "It looks like a similar {} already exists:\n\
         - Title: {}\n\
         - Status: {}\n\
         - ID: {}\n\
         Would you like to see more details, update this, or log a new one anyway?",
        kind_label(item),
        item.title,
        status_label(item),
        item.id,
    )
}

/// Detail card for a "show details" follow-up on the last surfaced item.
pub fn details_card(item: &KnowledgeItem) -> String {
    let description = if item.description.trim().is_empty() {
        "No further description available."
    } else {
        item.description.trim()
    };

    format!(
        "Here are the details for '{}' (ID: {}):\n\
         Type: {}\n\
         Status: {}\n\
         Description: {}\n\
         Would you like to log a new bug or story about this, update it, or ask something else?",
        item.title,
        item.id,
        if item.work_item_type.is_empty() { "Item" } else { &item.work_item_type },
        status_label(item),
        description,
    )
}

/// Render retrieved items as context blocks for the answer prompt.
pub fn context_blocks(items: &[KnowledgeItem]) -> String {
    if items.is_empty() {
        return "No relevant work items, bugs, stories, or wiki pages were found.".to_owned();
    }

    items
        .iter()
        .map(|item| match item.source.as_str() {
            "wiki" => {
                let excerpt: String = item.description.chars().take(WIKI_EXCERPT_CHARS).collect();
                format!("WIKI PAGE:\nTitle: {}\nExcerpt: {}", item.title, excerpt)
            }
            _ => format!(
                "WORK ITEM:\nTitle: {} (ID: {}, Type: {})\nDescription: {}",
                item.title, item.id, item.work_item_type, item.description
            ),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
