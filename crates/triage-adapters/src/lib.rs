//! External collaborators for Triage — completion service, similarity
//! search, work-item tracker, and web search.
//!
//! Each collaborator is a trait in [`traits`] plus a thin HTTP client.  The
//! engine depends only on the traits, so every client here can be swapped
//! for a scripted implementation in tests.

pub mod completion;
pub mod error;
pub mod similarity;
pub mod tracker;
pub mod traits;
pub mod web_search;

pub use completion::{ChatCompletionClient, CompletionConfig};
pub use error::{AdapterError, Result};
pub use similarity::{VectorSearchClient, VectorSearchConfig};
pub use tracker::{AzureBoardsClient, TrackerConfig};
pub use traits::{
    CompletionService, CompletionStream, CreatedWorkItem, KnowledgeItem, SimilaritySearch,
    Tracker, TrackerSearchResults, WebAnswer, WebSearch, WorkItemKind,
};
pub use web_search::{TavilySearchClient, WebSearchConfig};
