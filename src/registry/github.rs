//! GitHub REST client: pull request commits, repository contents, reviews
//! and commit statuses.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::CheckError;
use crate::registry::local::{MANIFEST_FILE, PACKAGES_DIR};
use crate::Result;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Retries after the first attempt while GitHub is still computing mergeability.
pub const MAX_MERGEABILITY_RETRIES: u32 = 10;

/// `owner/repo/pull/N`, parsed from a short reference or a pull request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = || CheckError::InvalidPullRequest {
            reference: reference.to_string(),
        };

        let trimmed = reference.trim().trim_end_matches('/');
        let path = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("github.com/"))
            .unwrap_or(trimmed);

        match path.split('/').collect::<Vec<_>>().as_slice() {
            [owner, repo, "pull" | "pulls", number]
                if !owner.is_empty() && !repo.is_empty() =>
            {
                Ok(PullRequestRef {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    number: number.parse().map_err(|_| invalid())?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// The commits a pull request check needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrCommits {
    pub merge_commit_sha: String,
    pub head_commit_sha: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestInfo {
    pub mergeable: Option<bool>,
    pub merge_commit_sha: Option<String>,
    pub head: Option<CommitRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitRef {
    pub sha: Option<String>,
}

/// One entry of a contents API directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Source of pull request metadata.
#[async_trait]
pub trait PullRequestApi: Send + Sync {
    async fn fetch_pull_request(&self, pr: u64) -> Result<PullRequestInfo>;
}

/// Read-only access to a repository at a given commit.
#[async_trait]
pub trait RepositoryContents: Send + Sync {
    /// Decoded content of a file, `None` if it does not exist.
    async fn file_content(&self, commit: &str, path: &str) -> Result<Option<String>>;

    /// Entries of a directory, empty if it does not exist.
    async fn directory_entries(&self, commit: &str, path: &str) -> Result<Vec<ContentEntry>>;
}

/// Resolve the merge and head commits of a pull request.
///
/// GitHub computes mergeability lazily and reports `null` until it is done, so
/// an unknown state is retried every `delay`, at most
/// [`MAX_MERGEABILITY_RETRIES`] times after the first attempt.
pub async fn get_pr_commits(
    api: &dyn PullRequestApi,
    pr: u64,
    delay: Duration,
) -> Result<PrCommits> {
    let mut attempt: u32 = 1;
    loop {
        let info = api.fetch_pull_request(pr).await?;
        match info.mergeable {
            None => {
                if attempt > MAX_MERGEABILITY_RETRIES {
                    return Err(CheckError::MergeabilityUnknown { attempts: attempt });
                }
                debug!(pr, attempt, "mergeability not computed yet, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Some(false) => return Err(CheckError::PullRequestNotMergeable { pr }),
            Some(true) => {
                let merge_commit_sha = info.merge_commit_sha.ok_or(CheckError::MissingCommitSha {
                    pr,
                    field: "Merge commit SHA",
                })?;
                let head_commit_sha = info.head.and_then(|h| h.sha).ok_or(
                    CheckError::MissingCommitSha {
                        pr,
                        field: "HEAD commit SHA",
                    },
                )?;
                return Ok(PrCommits {
                    merge_commit_sha,
                    head_commit_sha,
                });
            }
        }
    }
}

/// Fetch the manifests of a repository snapshot: the root `package.json`,
/// then `packages/<name>/package.json` for every directory in `packages/`.
///
/// Returns `(path, content)` pairs in that order.
pub async fn fetch_manifest_files(
    contents: &dyn RepositoryContents,
    commit: &str,
) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();

    if let Some(content) = contents.file_content(commit, MANIFEST_FILE).await? {
        files.push((MANIFEST_FILE.to_string(), content));
    }

    for entry in contents.directory_entries(commit, PACKAGES_DIR).await? {
        if entry.kind != "dir" {
            continue;
        }
        let path = format!("{}/{}", entry.path, MANIFEST_FILE);
        if let Some(content) = contents.file_content(commit, &path).await? {
            files.push((path, content));
        }
    }

    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Error,
    Failure,
    Pending,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewEvent {
    Approve,
    RequestChanges,
    Comment,
}

#[derive(Serialize)]
struct ReviewRequest<'a> {
    commit_id: &'a str,
    body: &'a str,
    event: ReviewEvent,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    state: CommitState,
    description: &'a str,
    context: &'a str,
}

/// A GitHub repository reached through the REST API.
pub struct GitHubRepository {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    token: Option<String>,
    retry_delay: Duration,
}

impl GitHubRepository {
    pub fn new(owner: &str, repo: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("green-licenses/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| CheckError::Http {
                url: DEFAULT_API_BASE.to_string(),
                source,
            })?;
        Ok(GitHubRepository {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn get_pr_commits(&self, pr: u64) -> Result<PrCommits> {
        get_pr_commits(self, pr, self.retry_delay).await
    }

    /// `POST /repos/{owner}/{repo}/pulls/{pr}/reviews`
    pub async fn create_review(
        &self,
        pr: u64,
        commit_id: &str,
        body: &str,
        event: ReviewEvent,
    ) -> Result<()> {
        let url = self.repo_url(&format!("pulls/{}/reviews", pr));
        let request = self.client.post(&url).json(&ReviewRequest {
            commit_id,
            body,
            event,
        });
        self.send(request, &url).await.map(|_| ())
    }

    /// `POST /repos/{owner}/{repo}/statuses/{sha}`
    pub async fn set_commit_status(
        &self,
        sha: &str,
        state: CommitState,
        description: &str,
        context: &str,
    ) -> Result<()> {
        let url = self.repo_url(&format!("statuses/{}", sha));
        let request = self.client.post(&url).json(&StatusRequest {
            state,
            description,
            context,
        });
        self.send(request, &url).await.map(|_| ())
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, tail
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request; `Ok(None)` on 404, an error on any other failure.
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Option<Value>> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|source| CheckError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CheckError::GitHubStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| CheckError::Http {
            url: url.to_string(),
            source,
        })?;
        if body.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|source| CheckError::ParseJson {
                path: url.to_string(),
                source,
            })
    }

    async fn get_contents(&self, commit: &str, path: &str) -> Result<Option<Value>> {
        let url = self.repo_url(&format!("contents/{}", path));
        let request = self.client.get(&url).query(&[("ref", commit)]);
        self.send(request, &url).await
    }
}

#[async_trait]
impl PullRequestApi for GitHubRepository {
    async fn fetch_pull_request(&self, pr: u64) -> Result<PullRequestInfo> {
        let url = self.repo_url(&format!("pulls/{}", pr));
        let value = self
            .send(self.client.get(&url), &url)
            .await?
            .ok_or_else(|| CheckError::GitHubStatus {
                url: url.clone(),
                status: StatusCode::NOT_FOUND.as_u16(),
            })?;
        serde_json::from_value(value).map_err(|source| CheckError::ParseJson { path: url, source })
    }
}

#[async_trait]
impl RepositoryContents for GitHubRepository {
    async fn file_content(&self, commit: &str, path: &str) -> Result<Option<String>> {
        match self.get_contents(commit, path).await? {
            Some(value @ Value::Object(_)) => decode_file_content(&value, path).map(Some),
            _ => Ok(None),
        }
    }

    async fn directory_entries(&self, commit: &str, path: &str) -> Result<Vec<ContentEntry>> {
        match self.get_contents(commit, path).await? {
            Some(value @ Value::Array(_)) => {
                serde_json::from_value(value).map_err(|source| CheckError::ParseJson {
                    path: path.to_string(),
                    source,
                })
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Decode the base64 `content` of a contents API file response.
fn decode_file_content(value: &Value, path: &str) -> Result<String> {
    let not_found = || CheckError::ContentNotFound {
        path: path.to_string(),
    };
    let encoded = value
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(not_found)?;
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|_| not_found())?;
    String::from_utf8(bytes).map_err(|_| not_found())
}
