//! Review publisher: aggregate a wave's verdicts and post one review.
//!
//! ```text
//! pull request ─▶ head sha, author
//! comment feed ─▶ actors ─▶ permissions (concurrent)
//!      │                         │
//!      └──▶ select_override ◀────┘   (effective policy of failing reviewers)
//!                 │
//! verdicts ──▶ aggregate ──▶ inline comments + summary ──▶ create_review
//! ```
//!
//! A post that still fails after retries is reported, not raised: the
//! council record is valid whether or not the platform accepted it.

use crate::platform::{
    PlatformError, PullRequestRef, ReviewEvent, ReviewPlatform, ReviewSubmission,
};
use council::aggregator::aggregate_set;
use council::config::{ConfigError, CouncilConfig};
use council::inline::{build_review_comments, render_summary};
use council::override_auth::{
    determine_effective_policy, ActorPermissions, Override, OverrideAuthorizer, OverrideComment,
    OverridePolicy, RepoPermission,
};
use council::record::CouncilRecord;
use council::verdict::VerdictSet;
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What happened to the review post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Posted {
        event: ReviewEvent,
        inline_comments: usize,
    },
    /// Transient failures outlasted the retry budget.
    PostFailed { error: String },
}

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub record: CouncilRecord,
    pub effective_policy: OverridePolicy,
    pub selected_override: Option<Override>,
    pub outcome: PublishOutcome,
}

pub struct ReviewPublisher<P> {
    platform: P,
    config: CouncilConfig,
    authorizer: OverrideAuthorizer,
}

impl<P: ReviewPlatform> ReviewPublisher<P> {
    pub fn new(platform: P, config: CouncilConfig) -> Result<Self, ConfigError> {
        let authorizer = OverrideAuthorizer::new(config.override_parser()?);
        Ok(Self {
            platform,
            config,
            authorizer,
        })
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Look up permissions for every distinct actor in the feed.
    ///
    /// A lookup that stays transient is logged and treated as "no
    /// permission", so it can only ever deny an override.
    async fn actor_permissions(
        &self,
        pr: &PullRequestRef,
        comments: &[OverrideComment],
    ) -> Result<ActorPermissions, PlatformError> {
        let mut actors: Vec<&str> = Vec::new();
        for comment in comments {
            let actor = comment.actor.trim();
            if !actor.is_empty() && !actors.iter().any(|a| a.eq_ignore_ascii_case(actor)) {
                actors.push(actor);
            }
        }

        let lookups = actors
            .iter()
            .map(|actor| self.platform.collaborator_permission(pr, actor));
        let results = join_all(lookups).await;

        let mut permissions = ActorPermissions::new();
        for (actor, result) in actors.into_iter().zip(results) {
            match result {
                Ok(Some(raw)) => permissions.insert(actor, RepoPermission::parse(&raw)),
                Ok(None) => permissions.insert(actor, RepoPermission::None),
                Err(e) if e.is_transient() => {
                    warn!(actor, error = %e, "Permission lookup failed, treating as none");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(permissions)
    }

    /// Aggregate `verdicts` for `pr` and post the review.
    pub async fn publish(
        &self,
        pr: &PullRequestRef,
        verdicts: &VerdictSet,
    ) -> Result<PublishReport, PlatformError> {
        let pull = self.platform.pull_request(pr).await?;
        let comments = self.platform.list_issue_comments(pr).await?;

        let policy = determine_effective_policy(
            &verdicts.verdicts,
            &self.config.reviewer_policies(),
            self.config.override_config.policy,
        );

        let permissions = match policy {
            OverridePolicy::WriteAccess | OverridePolicy::MaintainersOnly => {
                self.actor_permissions(pr, &comments).await?
            }
            OverridePolicy::PrAuthor | OverridePolicy::Unknown => ActorPermissions::new(),
        };

        let selected = self.authorizer.select(
            &comments,
            &pull.head_sha,
            policy,
            &pull.author,
            &permissions,
        );

        let verdict = aggregate_set(verdicts, &pull.head_sha, selected.as_ref());
        let patches: BTreeMap<String, String> = self.platform.pull_request_patches(pr).await?;
        let draft = build_review_comments(&verdict.findings, &patches);

        let submission = ReviewSubmission {
            head_sha: pull.head_sha.clone(),
            body: render_summary(&verdict, &draft.unanchored),
            event: if verdict.is_blocking() {
                ReviewEvent::RequestChanges
            } else {
                ReviewEvent::Comment
            },
            comments: draft.comments,
        };

        let outcome = match self.platform.create_review(pr, &submission).await {
            Ok(()) => {
                info!(
                    %pr,
                    event = %submission.event,
                    inline = submission.comments.len(),
                    outcome = %verdict.outcome,
                    "Review posted"
                );
                PublishOutcome::Posted {
                    event: submission.event,
                    inline_comments: submission.comments.len(),
                }
            }
            Err(e) if e.is_transient() => {
                warn!(%pr, error = %e, "Review post failed after retries");
                PublishOutcome::PostFailed {
                    error: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        };

        Ok(PublishReport {
            record: CouncilRecord::new(pull.head_sha, verdict),
            effective_policy: policy,
            selected_override: selected,
            outcome,
        })
    }
}
