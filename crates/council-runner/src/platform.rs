//! Hosting platform boundary
//!
//! Everything the runner needs from the code-hosting service sits behind
//! [`ReviewPlatform`], so the publisher can be driven by GitHub in
//! production and by an in-memory fake in tests.

use async_trait::async_trait;
use council::inline::InlineComment;
use council::override_auth::OverrideComment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from platform calls.
///
/// Only `Transient` is worth retrying. `PermissionDenied` is fatal: the
/// token cannot do what was asked, and asking again will not change that.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("transient platform error{}: {message}", status_suffix(.status))]
    Transient { status: Option<u16>, message: String },

    #[error("permission denied ({status}): {message}")]
    PermissionDenied { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to decode platform response: {0}")]
    Decode(String),

    #[error("platform rejected request ({status}): {message}")]
    Request { status: u16, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl PlatformError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } => *status,
            Self::PermissionDenied { status, .. } | Self::Request { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Decode(_) => None,
        }
    }

    /// Classify an HTTP error status and response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = body.chars().take(500).collect::<String>();
        match status {
            // secondary rate limits come back as 403
            403 if body.to_ascii_lowercase().contains("rate limit") => Self::Transient {
                status: Some(status),
                message,
            },
            401 | 403 => Self::PermissionDenied { status, message },
            404 => Self::NotFound(message),
            429 | 500..=599 => Self::Transient {
                status: Some(status),
                message,
            },
            _ => Self::Request { status, message },
        }
    }
}

/// Pull request address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// Parse `owner/name` plus a PR number.
    pub fn parse(slug: &str, number: u64) -> Option<Self> {
        let (owner, repo) = slug.trim().split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub author: String,
    pub head_sha: String,
}

/// Review event posted with the review body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewEvent {
    RequestChanges,
    Comment,
}

impl std::fmt::Display for ReviewEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestChanges => write!(f, "REQUEST_CHANGES"),
            Self::Comment => write!(f, "COMMENT"),
        }
    }
}

/// Everything posted in one review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSubmission {
    pub head_sha: String,
    pub body: String,
    pub event: ReviewEvent,
    pub comments: Vec<InlineComment>,
}

#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    /// Issue comments on the pull request, oldest first.
    async fn list_issue_comments(
        &self,
        pr: &PullRequestRef,
    ) -> Result<Vec<OverrideComment>, PlatformError>;

    /// Raw permission name for `actor`, `None` when the actor is not a collaborator.
    async fn collaborator_permission(
        &self,
        pr: &PullRequestRef,
        actor: &str,
    ) -> Result<Option<String>, PlatformError>;

    async fn pull_request(&self, pr: &PullRequestRef) -> Result<PullRequestInfo, PlatformError>;

    /// Per-file patch text, keyed by path. Binary or huge files have no entry.
    async fn pull_request_patches(
        &self,
        pr: &PullRequestRef,
    ) -> Result<BTreeMap<String, String>, PlatformError>;

    async fn create_review(
        &self,
        pr: &PullRequestRef,
        review: &ReviewSubmission,
    ) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(PlatformError::from_status(502, "bad gateway").is_transient());
        assert!(PlatformError::from_status(429, "").is_transient());
        assert!(PlatformError::from_status(403, "You have exceeded a secondary rate limit")
            .is_transient());
        assert!(matches!(
            PlatformError::from_status(403, "Resource not accessible by integration"),
            PlatformError::PermissionDenied { status: 403, .. }
        ));
        assert!(matches!(
            PlatformError::from_status(401, "Bad credentials"),
            PlatformError::PermissionDenied { .. }
        ));
        assert!(matches!(
            PlatformError::from_status(404, ""),
            PlatformError::NotFound(_)
        ));
        assert!(matches!(
            PlatformError::from_status(422, "Validation Failed"),
            PlatformError::Request { status: 422, .. }
        ));
    }

    #[test]
    fn test_pull_request_ref_parse() {
        let pr = PullRequestRef::parse("acme/widgets", 42).unwrap();
        assert_eq!(pr.to_string(), "acme/widgets#42");
        assert!(PullRequestRef::parse("acme", 1).is_none());
        assert!(PullRequestRef::parse("/widgets", 1).is_none());
        assert!(PullRequestRef::parse("a/b/c", 1).is_none());
    }

    #[test]
    fn test_review_event_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReviewEvent::RequestChanges).unwrap(),
            "\"REQUEST_CHANGES\""
        );
        assert_eq!(ReviewEvent::Comment.to_string(), "COMMENT");
    }
}
