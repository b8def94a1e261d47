//! Work-item tracker client (Azure Boards wire format).
//!
//! Two operations: a free-text search that combines a WIQL work-item query
//! with a wiki-page scan, and work-item creation via JSON-Patch.  Search is
//! forgiving -- a failed sub-query is logged and skipped so one bad wiki
//! never empties the whole result set.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{AdapterError, Result};
use crate::traits::{CreatedWorkItem, KnowledgeItem, Tracker, TrackerSearchResults, WorkItemKind};

const SERVICE: &str = "tracker";

/// REST API version sent with every request.
const API_VERSION: &str = "7.1";

/// Issue-flavored fallback keywords: when one of these appears in the query,
/// it is retried as a search term of its own before the search gives up.
const FALLBACK_KEYWORDS: &[&str] = &[
    "not working",
    "error",
    "fails",
    "issue",
    "bug",
    "filter",
    "button",
];

/// Wiki excerpts are capped at this many characters.
const WIKI_EXCERPT_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub organization: String,
    pub project: String,
    /// Personal access token, sent as the basic-auth password.
    pub pat: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl TrackerConfig {
    /// Read configuration from `ADO_ORGANIZATION`, `ADO_PROJECT`, `ADO_PAT`.
    pub fn from_env() -> Result<Self> {
        let organization = std::env::var("ADO_ORGANIZATION")
            .map_err(|_| AdapterError::MissingConfig { key: "ADO_ORGANIZATION" })?;
        let project = std::env::var("ADO_PROJECT")
            .map_err(|_| AdapterError::MissingConfig { key: "ADO_PROJECT" })?;
        let pat = std::env::var("ADO_PAT")
            .map_err(|_| AdapterError::MissingConfig { key: "ADO_PAT" })?;

        Ok(Self {
            organization,
            project,
            pat,
            timeout_secs: 15,
        })
    }

    fn api_base(&self) -> String {
        format!(
            "https://dev.azure.com/{}/{}/_apis",
            self.organization, self.project
        )
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client implementing [`Tracker`] against the Azure Boards REST API.
#[derive(Debug, Clone)]
pub struct AzureBoardsClient {
    config: TrackerConfig,
    http: reqwest::Client,
}

impl AzureBoardsClient {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdapterError::RequestFailed {
                service: SERVICE,
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).basic_auth("", Some(&self.config.pat))
    }

    /// Run one WIQL query and return the matching work-item ids.
    async fn query_work_item_ids(&self, term: &str, k: usize) -> Result<Vec<i64>> {
        let url = format!("{}/wit/wiql?api-version={API_VERSION}", self.config.api_base());
        let body = json!({ "query": wiql_query(term) });

        let response = self
            .http
            .post(&url)
            .basic_auth("", Some(&self.config.pat))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::request(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdapterError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
                detail,
            });
        }

        let body: Value = response.json().await.map_err(|e| AdapterError::InvalidResponse {
            service: SERVICE,
            reason: format!("invalid WIQL response: {e}"),
        })?;

        let ids = body
            .get("workItems")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("id").and_then(Value::as_i64))
                    .take(k)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ids)
    }

    /// Fetch full field data for a batch of work-item ids.
    async fn fetch_work_items(&self, ids: &[i64]) -> Result<Vec<KnowledgeItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        let url = format!(
            "{}/wit/workitems?ids={id_list}&$expand=fields&api-version={API_VERSION}",
            self.config.api_base()
        );

        let response = self.get(&url).send().await.map_err(|e| AdapterError::request(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdapterError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
                detail,
            });
        }

        let body: Value = response.json().await.map_err(|e| AdapterError::InvalidResponse {
            service: SERVICE,
            reason: format!("invalid work-item batch response: {e}"),
        })?;

        let items = body
            .get("value")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(work_item_from_json).collect())
            .unwrap_or_default();

        Ok(items)
    }

    /// Scan every wiki in the project for pages whose title or content
    /// mention one of the search terms.
    async fn scan_wikis(&self, terms: &[String], k: usize) -> Vec<KnowledgeItem> {
        let mut found = Vec::new();

        let wikis_url = format!("{}/wiki/wikis?api-version={API_VERSION}", self.config.api_base());
        let wikis = match self.get_json_list(&wikis_url).await {
            Ok(wikis) => wikis,
            Err(e) => {
                warn!(error = %e, "wiki listing failed, skipping wiki search");
                return found;
            }
        };

        for wiki in &wikis {
            let Some(wiki_id) = wiki.get("id").and_then(Value::as_str) else {
                continue;
            };

            let pages_url = format!(
                "{}/wiki/wikis/{wiki_id}/pages?api-version={API_VERSION}",
                self.config.api_base()
            );
            let pages = match self.get_json_list(&pages_url).await {
                Ok(pages) => pages,
                Err(e) => {
                    warn!(wiki_id, error = %e, "wiki page listing failed, skipping wiki");
                    continue;
                }
            };

            for page in &pages {
                if found.len() >= k {
                    return found;
                }

                let Some(page_id) = page.get("id").and_then(Value::as_i64) else {
                    continue;
                };
                let path = page.get("path").and_then(Value::as_str).unwrap_or_default();
                let title = path.trim_matches('/').rsplit('/').next().unwrap_or(path).to_owned();

                let content_url = format!(
                    "{}/wiki/wikis/{wiki_id}/pages/{page_id}?includeContent=True&api-version={API_VERSION}",
                    self.config.api_base()
                );
                let content = match self.get_json_value(&content_url).await {
                    Ok(v) => v.get("content").and_then(Value::as_str).unwrap_or_default().to_owned(),
                    Err(e) => {
                        warn!(wiki_id, page_id, error = %e, "wiki page fetch failed");
                        continue;
                    }
                };

                let haystack_title = title.to_lowercase();
                let haystack_content = content.to_lowercase();
                let matched = terms.iter().any(|term| {
                    let term = term.to_lowercase();
                    haystack_title.contains(&term) || haystack_content.contains(&term)
                });

                if matched {
                    found.push(KnowledgeItem {
                        id: format!("{wiki_id}:{page_id}"),
                        title,
                        description: content.chars().take(WIKI_EXCERPT_CHARS).collect(),
                        status: String::new(),
                        work_item_type: String::new(),
                        similarity: 0.0,
                        source: "wiki".into(),
                    });
                }
            }
        }

        found
    }

    async fn get_json_value(&self, url: &str) -> Result<Value> {
        let response = self.get(url).send().await.map_err(|e| AdapterError::request(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdapterError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
                detail,
            });
        }
        response.json().await.map_err(|e| AdapterError::InvalidResponse {
            service: SERVICE,
            reason: format!("invalid JSON body: {e}"),
        })
    }

    async fn get_json_list(&self, url: &str) -> Result<Vec<Value>> {
        let body = self.get_json_value(url).await?;
        Ok(body.get("value").and_then(Value::as_array).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl Tracker for AzureBoardsClient {
    async fn search_items(&self, query: &str, k: usize) -> Result<TrackerSearchResults> {
        let terms = search_terms(query);
        debug!(?terms, k, "tracker search");

        let mut results = TrackerSearchResults::default();

        // Work items: try each term until one of them matches something.
        for term in &terms {
            let ids = match self.query_work_item_ids(term, k).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(term, error = %e, "WIQL query failed, trying next term");
                    continue;
                }
            };
            if ids.is_empty() {
                continue;
            }

            let items = self.fetch_work_items(&ids).await?;
            for item in items {
                let kind = item.work_item_type.to_lowercase();
                if kind.contains("bug") {
                    results.bugs.push(item);
                } else if kind.contains("story") {
                    results.stories.push(item);
                } else if kind.contains("feature") {
                    results.features.push(item);
                }
            }
            break;
        }

        results.wikis = self.scan_wikis(&terms, k).await;

        results.bugs.truncate(k);
        results.stories.truncate(k);
        results.features.truncate(k);
        results.wikis.truncate(k);

        debug!(
            bugs = results.bugs.len(),
            stories = results.stories.len(),
            features = results.features.len(),
            wikis = results.wikis.len(),
            "tracker search completed"
        );
        Ok(results)
    }

    async fn create_item(
        &self,
        kind: WorkItemKind,
        fields: Vec<(String, Value)>,
    ) -> Result<CreatedWorkItem> {
        let url = format!(
            "{}/wit/workitems/${}?api-version={API_VERSION}",
            self.config.api_base(),
            kind.as_str()
        );

        let patch: Vec<Value> = fields
            .into_iter()
            .map(|(name, value)| {
                json!({
                    "op": "add",
                    "path": format!("/fields/{name}"),
                    "value": value,
                })
            })
            .collect();

        debug!(kind = %kind, ops = patch.len(), "creating work item");

        let response = self
            .http
            .post(&url)
            .basic_auth("", Some(&self.config.pat))
            .header(reqwest::header::CONTENT_TYPE, "application/json-patch+json")
            .body(serde_json::to_vec(&patch)?)
            .send()
            .await
            .map_err(|e| AdapterError::request(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AdapterError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
                detail,
            });
        }

        let body: Value = response.json().await.map_err(|e| AdapterError::InvalidResponse {
            service: SERVICE,
            reason: format!("invalid creation response: {e}"),
        })?;

        let id = body.get("id").and_then(Value::as_i64).ok_or_else(|| {
            AdapterError::InvalidResponse {
                service: SERVICE,
                reason: "creation response has no `id`".into(),
            }
        })?;

        let created = CreatedWorkItem {
            id,
            title: body
                .pointer("/fields/System.Title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            url: body
                .pointer("/_links/html/href")
                .and_then(Value::as_str)
                .map(String::from),
        };

        debug!(id = created.id, "work item created");
        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The ordered list of search terms for a query: the query itself, then any
/// fallback keyword it contains.
fn search_terms(query: &str) -> Vec<String> {
    let mut terms = vec![query.trim().to_owned()];
    let lowered = query.to_lowercase();
    for keyword in FALLBACK_KEYWORDS {
        if lowered.contains(keyword) && !terms.iter().any(|t| t == keyword) {
            terms.push((*keyword).to_owned());
        }
    }
    terms
}

/// Build the WIQL statement for one search term.
///
/// Single quotes are doubled: WIQL string literals use SQL-style escaping,
/// and user text flows into this query verbatim.
fn wiql_query(term: &str) -> String {
    let escaped = term.replace('\'', "''");
    format!(
        "SELECT [System.Id], [System.Title], [System.Description], [System.WorkItemType], \
         [System.State], [System.ChangedDate] FROM WorkItems WHERE \
         ([System.WorkItemType] = 'User Story' OR [System.WorkItemType] = 'Feature' OR [System.WorkItemType] = 'Bug') \
         AND ([System.Title] CONTAINS '{escaped}' OR [System.Description] CONTAINS '{escaped}') \
         ORDER BY [System.ChangedDate] DESC"
    )
}

/// Map one work-item JSON entry to a [`KnowledgeItem`].
fn work_item_from_json(entry: &Value) -> KnowledgeItem {
    let fields = entry.get("fields").cloned().unwrap_or(Value::Null);
    let text = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    KnowledgeItem {
        id: entry.get("id").and_then(Value::as_i64).map(|id| id.to_string()).unwrap_or_default(),
        title: text("System.Title"),
        description: text("System.Description"),
        status: text("System.State"),
        work_item_type: text("System.WorkItemType"),
        similarity: 0.0,
        source: "work_item".into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
