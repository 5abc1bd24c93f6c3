//! Hosted repository backend over the GitHub REST API.
//!
//! Tags are listed page by page following the `Link` header. Trees come from
//! the recursive git trees endpoint and are rendered into the same listing
//! format `git ls-tree` prints, so the pipeline cannot tell the backends
//! apart. File reads go through the blob ids of the cached tree, which keeps
//! symlink semantics intact (a link's blob is its target path).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use url::Url;

use tagdocs_shared::{GithubConfig, Result, TagdocsError};

use crate::Repository;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("tagdocs/", env!("CARGO_PKG_VERSION"));

/// Items requested per page on paginated endpoints.
const PER_PAGE: u32 = 100;

const API_VERSION: &str = "2022-11-28";

// ---------------------------------------------------------------------------
// GithubClient
// ---------------------------------------------------------------------------

/// HTTP client for one GitHub API root, built once and passed down.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    api_url: Url,
    token: Option<String>,
}

impl GithubClient {
    /// Create a client. `token` is sent as a bearer token when present.
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let mut api_url = Url::parse(api_url)
            .map_err(|e| TagdocsError::config(format!("invalid API url '{api_url}': {e}")))?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TagdocsError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url,
            token,
        })
    }

    /// API url with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| TagdocsError::config(format!("API url cannot be a base: {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        debug!(%url, "GET");
        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        request
            .send()
            .await
            .map_err(|e| TagdocsError::Network(format!("{url}: {e}")))
    }

    /// GET returning `None` on 404.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self.get(url.clone()).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(TagdocsError::Network(format!("{url}: HTTP {status}")));
        }
        let body = response
            .json()
            .await
            .map_err(|e| TagdocsError::parse(format!("{url}: invalid response body: {e}")))?;
        Ok(Some(body))
    }

    /// Collect every item of a paginated list endpoint.
    pub async fn get_paginated<T: DeserializeOwned>(&self, mut url: Url) -> Result<Vec<T>> {
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string());

        let mut items = Vec::new();
        let mut next = Some(url);
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let response = self.get(url.clone()).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TagdocsError::Network(format!("{url}: HTTP {status}")));
            }

            next = next_page(response.headers());
            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| TagdocsError::parse(format!("{url}: invalid response body: {e}")))?;
            pages += 1;
            if page.is_empty() {
                break;
            }
            items.extend(page);
        }

        debug!(pages, items = items.len(), "pagination complete");
        Ok(items)
    }
}

/// Extract the `rel="next"` target of a `Link` header.
fn next_page(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim() == "rel=\"next\"" || p.trim() == "rel=next");
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

// ---------------------------------------------------------------------------
// API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TagPayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreePayload {
    tree: Vec<TreeEntryPayload>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeEntryPayload {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BlobPayload {
    content: String,
    encoding: String,
}

// ---------------------------------------------------------------------------
// GithubRepository
// ---------------------------------------------------------------------------

type BlobIds = HashMap<String, String>;

/// One repository on a GitHub API root.
pub struct GithubRepository {
    client: GithubClient,
    owner: String,
    repo: String,
    /// Blob ids per revision, filled by `list_tree`.
    trees: Mutex<HashMap<String, Arc<BlobIds>>>,
}

impl GithubRepository {
    pub fn new(client: GithubClient, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
            trees: Mutex::new(HashMap::new()),
        }
    }

    /// Build from the `[github]` config section and an already-resolved token.
    pub fn from_config(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let client = GithubClient::new(&config.api_url, token)?;
        Ok(Self::new(client, &config.owner, &config.repo))
    }

    fn repo_endpoint(&self, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["repos", self.owner.as_str(), self.repo.as_str()];
        segments.extend_from_slice(rest);
        self.client.endpoint(&segments)
    }

    async fn fetch_tree(&self, revision: &str) -> Result<Option<Vec<TreeEntryPayload>>> {
        let mut url = self.repo_endpoint(&["git", "trees", revision])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let Some(payload) = self.client.get_json::<TreePayload>(url).await? else {
            return Ok(None);
        };
        if payload.truncated {
            warn!(revision, "tree listing truncated by the API");
        }
        Ok(Some(payload.tree))
    }

    async fn blob_ids(&self, revision: &str) -> Result<Arc<BlobIds>> {
        if let Some(ids) = self.trees.lock().await.get(revision) {
            return Ok(Arc::clone(ids));
        }

        let entries = self.fetch_tree(revision).await?.unwrap_or_default();
        let ids = Arc::new(blob_map(&entries));
        self.trees
            .lock()
            .await
            .insert(revision.to_string(), Arc::clone(&ids));
        Ok(ids)
    }
}

fn blob_map(entries: &[TreeEntryPayload]) -> BlobIds {
    entries
        .iter()
        .filter(|e| e.kind == "blob")
        .map(|e| (e.path.clone(), e.sha.clone()))
        .collect()
}

fn decode_blob(blob: &BlobPayload) -> Result<String> {
    match blob.encoding.as_str() {
        "base64" => {
            let compact: String = blob.content.split_whitespace().collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| TagdocsError::parse(format!("invalid base64 blob: {e}")))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        "utf-8" => Ok(blob.content.clone()),
        other => Err(TagdocsError::parse(format!(
            "unsupported blob encoding '{other}'"
        ))),
    }
}

#[async_trait]
impl Repository for GithubRepository {
    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    async fn list_tags(&self) -> Result<Vec<String>> {
        let url = self.repo_endpoint(&["tags"])?;
        let tags: Vec<TagPayload> = self.client.get_paginated(url).await?;
        Ok(tags.into_iter().map(|t| t.name).collect())
    }

    async fn list_tree(&self, revision: &str) -> Result<String> {
        let Some(entries) = self.fetch_tree(revision).await? else {
            debug!(revision, "revision not found, empty tree");
            return Ok(String::new());
        };

        self.trees
            .lock()
            .await
            .insert(revision.to_string(), Arc::new(blob_map(&entries)));

        Ok(entries
            .iter()
            .map(|e| format!("{} {} {}\t{}", e.mode, e.kind, e.sha, e.path))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn read_file(&self, revision: &str, path: &str) -> Result<String> {
        let not_found = || TagdocsError::NotFound {
            revision: revision.to_string(),
            path: path.to_string(),
        };

        let ids = self.blob_ids(revision).await?;
        let sha = ids.get(path).ok_or_else(not_found)?;

        let url = self.repo_endpoint(&["git", "blobs", sha])?;
        let blob: BlobPayload = self.client.get_json(url).await?.ok_or_else(not_found)?;
        decode_blob(&blob)
    }

    async fn ensure_remote(&self, name: &str, _url: &str) -> Result<()> {
        debug!(name, "remotes are not applicable to the GitHub backend");
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "github"
    }
}
