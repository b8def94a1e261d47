//! Collaborator traits and the shared retrieval item types.
//!
//! The engine only ever sees these traits; the HTTP clients in the sibling
//! modules are the production implementations, and the engine's test suite
//! supplies scripted ones.  Keeping the interfaces this narrow is what lets
//! every handler treat a collaborator failure as a degraded response instead
//! of a crash.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Retrieval item types
// ---------------------------------------------------------------------------

/// A single retrieved document: a tracker work item or a wiki page.
///
/// Both the similarity search and the tracker keyword search return this
/// shape, so the engine can treat "most recent retrieval results" as one
/// list regardless of where they came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Stable identifier (`"4312"` for work items, `"wiki:page"` style for
    /// wiki pages).
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Workflow state (`"Active"`, `"Closed"`, ...). Empty for wiki pages.
    #[serde(default)]
    pub status: String,
    /// `"Bug"`, `"User Story"`, `"Feature"`, or empty for wiki pages.
    #[serde(default)]
    pub work_item_type: String,
    /// Cosine similarity in `[0, 1]` when the item came from the similarity
    /// index; `0.0` for keyword-search results.
    #[serde(default)]
    pub similarity: f64,
    /// Where the item came from: `"work_item"` or `"wiki"`.
    #[serde(default)]
    pub source: String,
}

/// Tracker keyword-search results, grouped by item kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerSearchResults {
    pub bugs: Vec<KnowledgeItem>,
    pub stories: Vec<KnowledgeItem>,
    pub features: Vec<KnowledgeItem>,
    pub wikis: Vec<KnowledgeItem>,
}

impl TrackerSearchResults {
    /// Flatten the grouped results into one list, stories first to match the
    /// order the groups are searched in.
    pub fn combined(&self) -> Vec<KnowledgeItem> {
        let mut all =
            Vec::with_capacity(self.stories.len() + self.bugs.len() + self.features.len() + self.wikis.len());
        all.extend(self.stories.iter().cloned());
        all.extend(self.bugs.iter().cloned());
        all.extend(self.features.iter().cloned());
        all.extend(self.wikis.iter().cloned());
        all
    }

    pub fn is_empty(&self) -> bool {
        self.bugs.is_empty() && self.stories.is_empty() && self.features.is_empty() && self.wikis.is_empty()
    }
}

/// The kind of work item to create in the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    Bug,
    UserStory,
}

impl WorkItemKind {
    /// The tracker's name for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "Bug",
            Self::UserStory => "User Story",
        }
    }
}

impl std::fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A work item freshly created in the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedWorkItem {
    pub id: i64,
    pub title: String,
    /// Browser link to the created item, when the tracker provides one.
    pub url: Option<String>,
}

/// A short answer from the web-search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebAnswer {
    pub text: String,
    /// URL of the source the answer was drawn from.
    pub source: Option<String>,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// A stream of text chunks from the completion service, in generation order.
pub type CompletionStream = futures::stream::BoxStream<'static, Result<String>>;

/// Natural-language completion service: one request in, text out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Request a single completion and return the full text.
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String>;

    /// Request a streamed completion.  Chunks arrive in generation order and
    /// the stream ends after the final chunk.
    async fn complete_stream(&self, system: Option<&str>, user: &str) -> Result<CompletionStream>;
}

/// Semantic similarity search over the knowledge index.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return up to `k` items ranked by similarity to `text`, best first.
    async fn search_similar(&self, text: &str, k: usize) -> Result<Vec<KnowledgeItem>>;
}

/// The external work-item tracker.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Free-text search across stories, bugs, features, and wiki pages.
    /// Each group is capped at `k` items.
    async fn search_items(&self, query: &str, k: usize) -> Result<TrackerSearchResults>;

    /// Create a work item with the given field/value pairs (field names are
    /// the tracker's reference names, e.g. `System.Title`).
    async fn create_item(
        &self,
        kind: WorkItemKind,
        fields: Vec<(String, serde_json::Value)>,
    ) -> Result<CreatedWorkItem>;
}

/// Web search fallback used when the completion service comes up empty.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Return a short answer with its source for the query.
    async fn search(&self, query: &str) -> Result<WebAnswer>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
