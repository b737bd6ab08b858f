//! GitHub REST implementation of [`ReviewPlatform`].

use crate::platform::{
    PlatformError, PullRequestInfo, PullRequestRef, ReviewPlatform, ReviewSubmission,
};
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council::config::PlatformConfig;
use council::override_auth::OverrideComment;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const API_URL_ENV: &str = "GITHUB_API_URL";

const PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";

pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(
        api_url: impl Into<String>,
        token: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("council-runner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            retry,
        })
    }

    /// Client configured from `platform` settings plus `GITHUB_TOKEN` and
    /// `GITHUB_API_URL` from the environment.
    pub fn from_env(config: &PlatformConfig) -> Result<Self, reqwest::Error> {
        let api_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| config.api_url.clone());
        let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        Self::new(api_url, token, RetryPolicy::from_config(config))
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn repo_url(&self, pr: &PullRequestRef, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, pr.owner, pr.repo, tail)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_once<T: DeserializeOwned + Send>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let response = self
            .request(reqwest::Method::GET, url)
            .query(query)
            .send()
            .await
            .map_err(map_transport)?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned + Send>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        with_retry(&self.retry, url, || self.get_once(url, query)).await
    }

    /// Every page of a list endpoint, `per_page=100` until a short page.
    async fn get_all<T: DeserializeOwned + Send>(
        &self,
        url: &str,
    ) -> Result<Vec<T>, PlatformError> {
        let mut items = Vec::new();
        for page in 1.. {
            let query = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            let batch: Vec<T> = self.get(url, &query).await?;
            let short = batch.len() < PER_PAGE;
            items.extend(batch);
            if short {
                break;
            }
        }
        debug!(url, count = items.len(), "Fetched paginated list");
        Ok(items)
    }
}

fn map_transport(e: reqwest::Error) -> PlatformError {
    if e.is_decode() {
        return PlatformError::Decode(e.to_string());
    }
    PlatformError::Transient {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PlatformError::from_status(status.as_u16(), &body))
}

// Wire types

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct IssueComment {
    id: u64,
    user: Option<User>,
    #[serde(default)]
    body: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl From<IssueComment> for OverrideComment {
    fn from(c: IssueComment) -> Self {
        OverrideComment {
            actor: c.user.map(|u| u.login).unwrap_or_default(),
            body: c.body.unwrap_or_default(),
            id: Some(c.id),
            created_at: c.created_at,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct PermissionResponse {
    permission: Option<String>,
    role_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    user: User,
    head: PullHead,
}

#[derive(Debug, Deserialize)]
struct PullFile {
    filename: String,
    patch: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReviewComment<'a> {
    path: &'a str,
    position: u32,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct ReviewRequest<'a> {
    commit_id: &'a str,
    body: &'a str,
    event: String,
    comments: Vec<ReviewComment<'a>>,
}

#[async_trait]
impl ReviewPlatform for GitHubClient {
    async fn list_issue_comments(
        &self,
        pr: &PullRequestRef,
    ) -> Result<Vec<OverrideComment>, PlatformError> {
        let url = self.repo_url(pr, &format!("issues/{}/comments", pr.number));
        // the API returns issue comments oldest first
        let comments = self.get_all::<IssueComment>(&url).await?;
        Ok(comments.into_iter().map(OverrideComment::from).collect())
    }

    async fn collaborator_permission(
        &self,
        pr: &PullRequestRef,
        actor: &str,
    ) -> Result<Option<String>, PlatformError> {
        let url = self.repo_url(pr, &format!("collaborators/{}/permission", actor));
        match self.get::<PermissionResponse>(&url, &[]).await {
            // role_name distinguishes maintain/triage, permission does not
            Ok(p) => Ok(p.role_name.or(p.permission)),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn pull_request(&self, pr: &PullRequestRef) -> Result<PullRequestInfo, PlatformError> {
        let url = self.repo_url(pr, &format!("pulls/{}", pr.number));
        let pull: PullResponse = self.get(&url, &[]).await?;
        Ok(PullRequestInfo {
            author: pull.user.login,
            head_sha: pull.head.sha,
        })
    }

    async fn pull_request_patches(
        &self,
        pr: &PullRequestRef,
    ) -> Result<BTreeMap<String, String>, PlatformError> {
        let url = self.repo_url(pr, &format!("pulls/{}/files", pr.number));
        let files: Vec<PullFile> = self.get_all(&url).await?;
        Ok(files
            .into_iter()
            .filter_map(|f| f.patch.map(|p| (f.filename, p)))
            .collect())
    }

    async fn create_review(
        &self,
        pr: &PullRequestRef,
        review: &ReviewSubmission,
    ) -> Result<(), PlatformError> {
        let url = self.repo_url(pr, &format!("pulls/{}/reviews", pr.number));
        let request = ReviewRequest {
            commit_id: &review.head_sha,
            body: &review.body,
            event: review.event.to_string(),
            comments: review
                .comments
                .iter()
                .map(|c| ReviewComment {
                    path: &c.path,
                    position: c.position,
                    body: &c.body,
                })
                .collect(),
        };

        let (url, request) = (&url, &request);
        with_retry(&self.retry, "create_review", || async move {
            let response = self
                .request(reqwest::Method::POST, url)
                .json(request)
                .send()
                .await
                .map_err(map_transport)?;
            check_status(response).await.map(|_| ())
        })
        .await
    }
}
